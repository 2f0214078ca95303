use std::time::Duration;

/// Backoff schedule for re-establishing a lost signaling connection.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts tolerated before the channel gives up.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (1-based), doubling up to `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SignalingConfig {
    /// `ws://`, `wss://`, `http://` or `https://` URL of the rendezvous server.
    pub endpoint: String,
    /// Opaque bearer credential presented on connect.
    pub token: Option<String>,
    pub reconnect: ReconnectPolicy,
    pub event_buffer: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:7000/ws".to_owned(),
            token: None,
            reconnect: ReconnectPolicy::default(),
            event_buffer: 256,
        }
    }
}
