mod orchestrator;
mod orchestrator_command;
mod orchestrator_handle;
mod room_session;
mod session_observer;
mod snapshot;

pub use orchestrator::*;
pub use orchestrator_command::*;
pub use orchestrator_handle::*;
pub use room_session::*;
pub use session_observer::*;
pub use snapshot::*;
