//! Ordered, multi-channel transport between two parties over TCP.
//!
//! Every logical channel gets its own socket with a dedicated [`SendThread`] and
//! [`ReceiveThread`]. Messages are length-prefixed [frames](encode_frame) and delivered
//! to the channel's [`ChannelQueue`] in the order they were sent. [`Link`] bundles the
//! channels to one peer.
//!
//! ```no_run
//! use polytune_primitives::transport::{
//!     ChannelId, Link, SocketListener, TransportConfig, connect, listen,
//! };
//!
//! # fn main() -> Result<(), polytune_primitives::transport::TransportError> {
//! let config = TransportConfig::default();
//! let listener = SocketListener::bind("127.0.0.1:7000")?;
//! let server = std::thread::spawn(move || listen(&listener, &[1], 2, &TransportConfig::default()));
//! let client = Link::new(connect("127.0.0.1:7000", 1, 2, &config)?, &config)?;
//! let mut sockets = server.join().expect("listener panicked")?;
//! let server = Link::new(sockets.remove(&1).unwrap_or_default(), &config)?;
//!
//! let ch = ChannelId::new(1)?;
//! client.send(ch, b"hello")?;
//! assert_eq!(&b"hello"[..], server.receive(ch)?.payload);
//! # Ok(())
//! # }
//! ```
use std::fmt;

mod config;
mod connection;
mod error;
mod frame;
mod link;
mod queue;
mod receive_thread;
mod send_thread;
mod socket;
mod worker;

pub use config::{DEFAULT_MAX_FRAME_LEN, TransportConfig};
pub use connection::{HANDSHAKE_SIZE, connect, listen};
pub use error::TransportError;
pub use frame::{HEADER_SIZE, decode_frame, encode_frame};
pub use link::Link;
pub use queue::{ChannelQueue, ReceivedFrame};
pub use receive_thread::ReceiveThread;
pub use send_thread::{SendNotification, SendTask, SendThread};
pub use socket::{Socket, SocketListener};
pub use worker::WorkerState;

/// Number of channel ids, including the reserved [`ADMIN_CHANNEL`].
pub const MAX_NUM_COMM_CHANNELS: usize = 256;

/// Channel id reserved for administrative traffic.
pub const ADMIN_CHANNEL: u8 = 255;

/// Id of a payload channel in `0..=254`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u8);

impl ChannelId {
    /// The channel with the given id. [`ADMIN_CHANNEL`] is rejected.
    pub fn new(id: u8) -> Result<Self, TransportError> {
        if id == ADMIN_CHANNEL {
            return Err(TransportError::ReservedChannel(id));
        }
        Ok(Self(id))
    }

    /// The raw id.
    pub fn get(self) -> u8 {
        self.0
    }

    /// The id as an index into per-channel tables.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = TransportError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_channel_is_reserved() {
        assert!(matches!(
            ChannelId::new(ADMIN_CHANNEL),
            Err(TransportError::ReservedChannel(255))
        ));
        assert_eq!(254, ChannelId::try_from(254).unwrap().index());
        assert_eq!("7", ChannelId::new(7).unwrap().to_string());
    }
}
