use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default upper bound for a single frame payload: 1 GiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1 << 30;

/// Timeouts and limits of the channel transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Timeout for opening a single channel connection.
    pub connect_timeout: Duration,
    /// Timeout for sending or receiving the handshake of a channel.
    pub handshake_timeout: Duration,
    /// How often a receive worker checks whether it should stop.
    pub poll_interval: Duration,
    /// How long [`Link::receive`](super::Link::receive) waits for a frame. `None` waits
    /// forever.
    pub receive_timeout: Option<Duration>,
    /// Largest accepted frame payload in bytes.
    pub max_frame_len: usize,
    /// Disable Nagle's algorithm on channel sockets.
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
            receive_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            nodelay: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: TransportConfig = serde_json::from_str(r#"{"nodelay": false}"#).unwrap();
        assert!(!config.nodelay);
        assert_eq!(Duration::from_millis(50), config.poll_interval);
        assert_eq!(DEFAULT_MAX_FRAME_LEN, config.max_frame_len);
        assert_eq!(None, config.receive_timeout);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = TransportConfig {
            receive_timeout: Some(Duration::from_secs(3)),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(config, serde_json::from_str(&json).unwrap());
    }
}
