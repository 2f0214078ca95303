mod channel_event;
mod signaling_channel;
mod signaling_config;
mod signaling_output;

pub use channel_event::*;
pub use signaling_channel::*;
pub use signaling_config::*;
pub use signaling_output::*;
