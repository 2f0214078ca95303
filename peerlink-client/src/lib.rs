pub mod client;
pub mod error;
pub mod link;
pub mod room;
pub mod signaling;
pub mod transport;

pub use client::{Client, ClientConfig};
pub use error::{ClientError, LinkError, SignalingError};
pub use room::{
    LinkSnapshot, NoopObserver, Orchestrator, OrchestratorHandle, SessionObserver,
    SessionSnapshot,
};
