use std::{io, time::Duration};

use thiserror::Error;

use super::ChannelId;

/// Errors of the channel transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening a connection to the peer failed.
    #[error("unable to connect to {addr}")]
    Connect {
        /// Address that was dialed.
        addr: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// Binding the listening socket failed.
    #[error("unable to bind {addr}")]
    Bind {
        /// Address that was bound.
        addr: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// Accepting an incoming connection failed.
    #[error("unable to accept connection")]
    Accept(#[source] io::Error),
    /// The peer sent an invalid handshake or none at all.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// At least one channel is needed.
    #[error("at least one channel is needed")]
    NoChannels,
    /// More channels than there are payload channel ids.
    #[error("{requested} channels requested, at most {max} are supported")]
    TooManyChannels {
        /// Requested number of channels.
        requested: usize,
        /// Maximum number of payload channels.
        max: usize,
    },
    /// The id is reserved for administrative traffic.
    #[error("channel {0} is reserved")]
    ReservedChannel(u8),
    /// The link has no channel with this id.
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),
    /// The peer closed the channel, or it was shut down locally.
    #[error("channel {0} is closed")]
    ChannelClosed(ChannelId),
    /// The received frame is shorter than requested.
    #[error("expected a frame of at least {expected} bytes, got {actual}")]
    ShortFrame {
        /// Requested length.
        expected: usize,
        /// Length of the received frame.
        actual: usize,
    },
    /// No frame arrived in time.
    #[error("no frame received within {0:?}")]
    Timeout(Duration),
    /// The frame header announces more bytes than allowed.
    #[error("frame of {len} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge {
        /// Announced payload length.
        len: u64,
        /// Configured limit.
        max: usize,
    },
    /// The connection was closed in the middle of a frame.
    #[error("connection closed inside a frame with {buffered} bytes buffered")]
    TruncatedFrame {
        /// Bytes of the incomplete frame.
        buffered: usize,
    },
    /// The worker no longer accepts tasks.
    #[error("worker is stopped")]
    Stopped,
    /// The worker thread could not be spawned.
    #[error("unable to spawn worker thread")]
    Spawn(#[source] io::Error),
    /// The worker thread panicked.
    #[error("worker thread panicked")]
    WorkerPanicked,
    /// The frame was not written to the socket.
    #[error("frame was not sent")]
    SendFailed,
    /// Socket I/O failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
