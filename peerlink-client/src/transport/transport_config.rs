use peerlink_core::IceServerConfig;
use peerlink_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};

/// Peer connection settings shared by every link.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                IceServerConfig {
                    urls: vec![DEFAULT_STUN_ADDR.to_owned()],
                    username: None,
                    credential: None,
                },
                IceServerConfig {
                    urls: vec![DEFAULT_STUN_ADDR_2.to_owned()],
                    username: None,
                    credential: None,
                },
            ],
        }
    }
}

impl TransportConfig {
    /// Host candidates only. Used for loopback testing.
    pub fn without_ice_servers() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }
}
