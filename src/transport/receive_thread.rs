//! A worker that decodes the frames of one channel into its [`ChannelQueue`].
use std::{
    io::{ErrorKind, Read},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use bytes::BytesMut;
use tracing::{debug, error, trace, warn};

use super::{
    ChannelId, ChannelQueue, Socket, TransportConfig, TransportError, WorkerState,
    frame::decode_frame, queue::CloseReason, worker::SharedState,
};

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Owns the read half of one channel socket.
///
/// Partial frames stay buffered across reads, complete frames are pushed to the queue.
/// The queue is closed once the peer closes its write direction, the stream fails or
/// the worker is stopped.
#[derive(Debug)]
pub struct ReceiveThread {
    channel: ChannelId,
    queue: Arc<ChannelQueue>,
    pending: Option<Socket>,
    poll_interval: Duration,
    max_frame_len: usize,
    state: Arc<SharedState>,
    handle: Option<JoinHandle<()>>,
}

impl ReceiveThread {
    /// A worker reading from `socket` into `queue`. The thread is not started yet.
    pub fn new(socket: Socket, queue: Arc<ChannelQueue>, config: &TransportConfig) -> Self {
        Self {
            channel: queue.channel(),
            queue,
            pending: Some(socket),
            poll_interval: config.poll_interval,
            max_frame_len: config.max_frame_len,
            state: Arc::new(SharedState::new()),
            handle: None,
        }
    }

    /// Spawn the worker thread. Starting a started worker does nothing.
    pub fn start(&mut self) -> Result<(), TransportError> {
        let Some(socket) = self.pending.take() else {
            return Ok(());
        };
        // lets the worker notice stop requests while the peer is quiet
        socket.set_read_timeout(Some(self.poll_interval))?;
        let channel = self.channel;
        let queue = Arc::clone(&self.queue);
        let state = Arc::clone(&self.state);
        let max_frame_len = self.max_frame_len;
        state.set(WorkerState::Running);
        let handle = thread::Builder::new()
            .name(format!("recv-{channel}"))
            .spawn(move || {
                debug!(%channel, "receive thread started");
                let reason = run(socket, &queue, &state, max_frame_len);
                debug!(%channel, ?reason, "receive thread stopped");
                queue.close(reason);
                state.set(WorkerState::Terminated);
            })
            .map_err(|err| {
                self.state.set(WorkerState::Terminated);
                TransportError::Spawn(err)
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Ask the worker to stop and wait for it. Takes at most about one poll interval.
    ///
    /// Frames that were already queued can still be received afterwards.
    pub fn stop(&mut self) -> Result<(), TransportError> {
        let Some(handle) = self.handle.take() else {
            if self.pending.take().is_some() {
                self.queue.close(CloseReason::Stopped);
                self.state.set(WorkerState::Terminated);
            }
            return Ok(());
        };
        self.state.request_stop();
        handle.join().map_err(|_| TransportError::WorkerPanicked)
    }

    /// The queue frames are pushed to.
    pub fn queue(&self) -> &Arc<ChannelQueue> {
        &self.queue
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.state.get()
    }
}

impl Drop for ReceiveThread {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(channel = %self.channel, %err, "receive thread failed");
        }
    }
}

fn run(
    mut socket: Socket,
    queue: &ChannelQueue,
    state: &SharedState,
    max_frame_len: usize,
) -> CloseReason {
    let channel = queue.channel();
    let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
    let mut chunk = vec![0; READ_CHUNK_SIZE];
    loop {
        loop {
            match decode_frame(&mut buf, max_frame_len) {
                Ok(Some(frame)) => {
                    trace!(%channel, len = frame.len(), start_id = frame.start_id, "received frame");
                    if !queue.push(frame) {
                        warn!(%channel, "no listener, discarding frame");
                    }
                }
                Ok(None) => break,
                Err(TransportError::FrameTooLarge { len, max }) => {
                    error!(%channel, len, max, "frame too large");
                    return CloseReason::TooLarge { len, max };
                }
                Err(err) => return CloseReason::Io(ErrorKind::InvalidData, err.to_string()),
            }
        }
        if state.is_stopping() {
            return CloseReason::Stopped;
        }
        match socket.read(&mut chunk) {
            Ok(0) if buf.is_empty() => return CloseReason::Eof,
            Ok(0) => {
                warn!(%channel, buffered = buf.len(), "connection closed inside a frame");
                return CloseReason::Truncated {
                    buffered: buf.len(),
                };
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(err) => {
                error!(%channel, %err, "unable to read from socket");
                return CloseReason::Io(err.kind(), err.to_string());
            }
        }
    }
}
