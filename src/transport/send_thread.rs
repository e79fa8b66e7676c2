//! A worker that writes the frames of one channel in submission order.
use std::{
    net::Shutdown,
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use bytes::Bytes;
use tracing::{debug, error, trace, warn};

use super::{
    ChannelId, Socket, TransportError, WorkerState, frame::encode_frame, worker::SharedState,
};

/// An encoded frame waiting to be written to a channel.
#[derive(Debug)]
pub struct SendTask {
    channel: ChannelId,
    frame: Bytes,
    notify: Option<SyncSender<bool>>,
}

impl SendTask {
    /// Frame `payload` for `channel`.
    pub fn new(channel: ChannelId, start_id: u64, payload: &[u8]) -> Self {
        Self {
            channel,
            frame: encode_frame(start_id, payload),
            notify: None,
        }
    }

    /// Like [`SendTask::new`], plus a notification that resolves once the frame was
    /// written to the socket.
    pub fn with_notification(
        channel: ChannelId,
        start_id: u64,
        payload: &[u8],
    ) -> (Self, SendNotification) {
        let (tx, rx) = mpsc::sync_channel(1);
        let mut task = Self::new(channel, start_id, payload);
        task.notify = Some(tx);
        (task, SendNotification(rx))
    }

    /// The target channel.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Length of the encoded frame in bytes, header included.
    pub fn wire_len(&self) -> usize {
        self.frame.len()
    }

    fn complete(self, sent: bool) {
        if let Some(notify) = self.notify {
            // the receiving side may have been dropped
            let _ = notify.send(sent);
        }
    }
}

/// Resolves once the corresponding [`SendTask`] was written, or failed.
#[derive(Debug)]
pub struct SendNotification(Receiver<bool>);

impl SendNotification {
    /// Block until the frame was written.
    pub fn wait(self) -> Result<(), TransportError> {
        match self.0.recv() {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(TransportError::SendFailed),
        }
    }

    /// Block for at most `timeout` until the frame was written.
    pub fn wait_timeout(self, timeout: Duration) -> Result<(), TransportError> {
        match self.0.recv_timeout(timeout) {
            Ok(true) => Ok(()),
            Ok(false) => Err(TransportError::SendFailed),
            Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::SendFailed),
        }
    }
}

enum SendCommand {
    Task(SendTask),
    Stop,
}

/// Owns the write half of one channel socket.
///
/// Tasks can be pushed before [`SendThread::start`] and are written once the thread
/// runs. [`SendThread::stop`] writes every task pushed before it, then closes the write
/// direction of the socket, so the peer sees a clean end of stream.
#[derive(Debug)]
pub struct SendThread {
    channel: ChannelId,
    commands: Sender<SendCommand>,
    // the mutex only makes the worker `Sync`, it is never contended
    pending: Mutex<Option<(Receiver<SendCommand>, Socket)>>,
    state: Arc<SharedState>,
    handle: Option<JoinHandle<Result<(), TransportError>>>,
}

impl std::fmt::Debug for SendCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task(task) => f.debug_tuple("Task").field(&task.wire_len()).finish(),
            Self::Stop => write!(f, "Stop"),
        }
    }
}

impl SendThread {
    /// A worker for `channel` writing to `socket`. The thread is not started yet.
    pub fn new(socket: Socket, channel: ChannelId) -> Self {
        let (commands, rx) = mpsc::channel();
        Self {
            channel,
            commands,
            pending: Mutex::new(Some((rx, socket))),
            state: Arc::new(SharedState::new()),
            handle: None,
        }
    }

    /// Spawn the worker thread. Starting a started worker does nothing.
    pub fn start(&mut self) -> Result<(), TransportError> {
        let Some((commands, socket)) = self.pending.get_mut().expect("poison").take() else {
            return Ok(());
        };
        let channel = self.channel;
        let state = Arc::clone(&self.state);
        state.set(WorkerState::Running);
        let handle = thread::Builder::new()
            .name(format!("send-{channel}"))
            .spawn(move || {
                let result = run(channel, socket, &commands);
                state.set(WorkerState::Terminated);
                result
            })
            .map_err(|err| {
                self.state.set(WorkerState::Terminated);
                TransportError::Spawn(err)
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Queue `task` behind all previously pushed tasks.
    pub fn push_task(&self, task: SendTask) -> Result<(), TransportError> {
        if task.channel != self.channel {
            return Err(TransportError::UnknownChannel(task.channel));
        }
        if self.state.is_stopping() {
            return Err(TransportError::Stopped);
        }
        self.commands
            .send(SendCommand::Task(task))
            .map_err(|_| TransportError::Stopped)
    }

    /// Write all queued tasks, close the write direction and wait for the thread.
    ///
    /// A worker that was never started is started first, so queued tasks are not lost.
    /// Returns the first write error of the worker, if any.
    pub fn stop(&mut self) -> Result<(), TransportError> {
        self.start()?;
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.state.request_stop();
        // fails if the worker already exited, which join reports
        let _ = self.commands.send(SendCommand::Stop);
        handle.join().map_err(|_| TransportError::WorkerPanicked)?
    }

    /// The channel this worker writes to.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.state.get()
    }
}

impl Drop for SendThread {
    fn drop(&mut self) {
        // also starts a worker that never ran, so queued tasks are written
        if let Err(err) = self.stop() {
            warn!(channel = %self.channel, %err, "send thread failed");
        }
    }
}

fn run(
    channel: ChannelId,
    mut socket: Socket,
    commands: &Receiver<SendCommand>,
) -> Result<(), TransportError> {
    debug!(%channel, "send thread started");
    // all senders gone means the handle was dropped without stop
    while let Ok(SendCommand::Task(task)) = commands.recv() {
        trace!(%channel, len = task.wire_len(), "sending frame");
        match socket.send(&task.frame) {
            Ok(()) => task.complete(true),
            Err(err) => {
                error!(%channel, %err, "unable to send frame");
                task.complete(false);
                return Err(err);
            }
        }
    }
    if let Err(err) = socket.shutdown(Shutdown::Write) {
        warn!(%channel, %err, "unable to close write direction");
    }
    debug!(%channel, "send thread stopped");
    Ok(())
}
