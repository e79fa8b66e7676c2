//! Per-channel queues of received frames.
use std::{
    collections::VecDeque,
    io,
    sync::{Condvar, Mutex},
    time::{Duration, Instant},
};

use bytes::Bytes;
use tracing::warn;

use super::{ChannelId, TransportError};

/// A decoded frame, owned by whoever pops it from the [`ChannelQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Start id from the frame header.
    pub start_id: u64,
    /// The frame payload.
    pub payload: Bytes,
}

impl ReceivedFrame {
    /// Length of the payload in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Why the receive worker stopped feeding a queue.
#[derive(Debug, Clone)]
pub(crate) enum CloseReason {
    Eof,
    Stopped,
    Truncated { buffered: usize },
    TooLarge { len: u64, max: usize },
    Io(io::ErrorKind, String),
}

impl CloseReason {
    fn to_error(&self, channel: ChannelId) -> TransportError {
        match self {
            Self::Eof | Self::Stopped => TransportError::ChannelClosed(channel),
            Self::Truncated { buffered } => TransportError::TruncatedFrame {
                buffered: *buffered,
            },
            Self::TooLarge { len, max } => TransportError::FrameTooLarge {
                len: *len,
                max: *max,
            },
            Self::Io(kind, msg) => TransportError::Io(io::Error::new(*kind, msg.clone())),
        }
    }
}

#[derive(Debug)]
struct QueueState {
    frames: VecDeque<ReceivedFrame>,
    listening: bool,
    closed: Option<CloseReason>,
}

/// Frames received on one channel, in wire order.
///
/// Consumers block in [`ChannelQueue::receive`] until the receive worker pushes a frame
/// or closes the queue. Frames that are already queued can still be received after the
/// queue was closed.
#[derive(Debug)]
pub struct ChannelQueue {
    channel: ChannelId,
    state: Mutex<QueueState>,
    available: Condvar,
}

impl ChannelQueue {
    /// An empty, listening queue.
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            state: Mutex::new(QueueState {
                frames: VecDeque::new(),
                listening: true,
                closed: None,
            }),
            available: Condvar::new(),
        }
    }

    /// The channel this queue belongs to.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Queue a frame. Returns `false` if the frame was dropped because nobody listens.
    pub(crate) fn push(&self, frame: ReceivedFrame) -> bool {
        let mut state = self.state.lock().expect("poison");
        if !state.listening {
            return false;
        }
        state.frames.push_back(frame);
        self.available.notify_one();
        true
    }

    /// Mark the queue as closed and wake up all waiting consumers.
    pub(crate) fn close(&self, reason: CloseReason) {
        let mut state = self.state.lock().expect("poison");
        state.closed.get_or_insert(reason);
        self.available.notify_all();
    }

    /// Pop the next frame, blocking until one arrives.
    ///
    /// With a `timeout`, fails with [`TransportError::Timeout`] if no frame arrives in
    /// time. Once the queue is closed and empty, the close reason is returned, which is
    /// [`TransportError::ChannelClosed`] after a clean shutdown.
    pub fn receive(&self, timeout: Option<Duration>) -> Result<ReceivedFrame, TransportError> {
        self.wait_front(timeout, |_| Ok(()))
    }

    /// Pop the next frame and return its first `len` bytes.
    ///
    /// Fails with [`TransportError::ShortFrame`] if the next frame holds fewer than `len`
    /// bytes. That frame stays queued. Surplus bytes of a longer frame are discarded.
    pub fn receive_exact(
        &self,
        len: usize,
        timeout: Option<Duration>,
    ) -> Result<Bytes, TransportError> {
        let mut frame = self.wait_front(timeout, |front| {
            if front.len() < len {
                return Err(TransportError::ShortFrame {
                    expected: len,
                    actual: front.len(),
                });
            }
            Ok(())
        })?;
        if frame.len() > len {
            warn!(
                channel = %self.channel,
                discarded = frame.len() - len,
                "frame longer than requested"
            );
        }
        Ok(frame.payload.split_to(len))
    }

    /// Block until a frame is queued and pop it if `accept` allows. A rejected frame is
    /// left at the front of the queue.
    fn wait_front(
        &self,
        timeout: Option<Duration>,
        accept: impl Fn(&ReceivedFrame) -> Result<(), TransportError>,
    ) -> Result<ReceivedFrame, TransportError> {
        let deadline = timeout.map(|timeout| (timeout, Instant::now() + timeout));
        let mut state = self.state.lock().expect("poison");
        loop {
            if let Some(front) = state.frames.front() {
                accept(front)?;
                if let Some(frame) = state.frames.pop_front() {
                    return Ok(frame);
                }
            }
            if let Some(reason) = &state.closed {
                return Err(reason.to_error(self.channel));
            }
            state = match deadline {
                None => self.available.wait(state).expect("poison"),
                Some((timeout, deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TransportError::Timeout(timeout));
                    }
                    self.available
                        .wait_timeout(state, deadline - now)
                        .expect("poison")
                        .0
                }
            };
        }
    }

    /// Pop the next frame if one is queued.
    pub fn try_receive(&self) -> Option<ReceivedFrame> {
        self.state.lock().expect("poison").frames.pop_front()
    }

    /// Drop all queued frames and return how many were dropped.
    pub fn flush_queue(&self) -> usize {
        let mut state = self.state.lock().expect("poison");
        let dropped = state.frames.len();
        state.frames.clear();
        if dropped > 0 {
            warn!(channel = %self.channel, dropped, "flushed queued frames");
        }
        dropped
    }

    /// Flush the queue and drop every frame received until
    /// [`ChannelQueue::add_listener`] is called.
    pub fn remove_listener(&self) -> usize {
        let dropped = self.flush_queue();
        self.state.lock().expect("poison").listening = false;
        dropped
    }

    /// Queue received frames again.
    pub fn add_listener(&self) {
        self.state.lock().expect("poison").listening = true;
    }

    /// `true` unless [`ChannelQueue::remove_listener`] was called.
    pub fn is_listening(&self) -> bool {
        self.state.lock().expect("poison").listening
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.state.lock().expect("poison").frames.len()
    }

    /// `true` if no frame is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once the receive worker has stopped.
    pub fn is_closed(&self) -> bool {
        self.state.lock().expect("poison").closed.is_some()
    }
}
