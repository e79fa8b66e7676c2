use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use super::{
    ChannelId, ChannelQueue, MAX_NUM_COMM_CHANNELS, ReceiveThread, ReceivedFrame, SendNotification,
    SendTask, SendThread, Socket, TransportConfig, TransportError,
};

struct LinkChannel {
    sender: SendThread,
    receiver: ReceiveThread,
}

/// All channels to one peer, each with a running send and receive worker.
///
/// Channel `i` uses the `i`-th socket passed to [`Link::new`]. Frames sent on one channel
/// arrive in order, there is no ordering between channels.
pub struct Link {
    channels: Vec<LinkChannel>,
    receive_timeout: Option<std::time::Duration>,
}

impl Link {
    /// Start the workers for `sockets`, as returned by [`connect`](super::connect) or
    /// [`listen`](super::listen).
    pub fn new(sockets: Vec<Socket>, config: &TransportConfig) -> Result<Self, TransportError> {
        let max = MAX_NUM_COMM_CHANNELS - 1;
        if sockets.is_empty() {
            return Err(TransportError::NoChannels);
        }
        if sockets.len() > max {
            return Err(TransportError::TooManyChannels {
                requested: sockets.len(),
                max,
            });
        }
        let mut channels = Vec::with_capacity(sockets.len());
        for (index, socket) in sockets.into_iter().enumerate() {
            // index < 255
            let channel = ChannelId::new(index as u8)?;
            let queue = Arc::new(ChannelQueue::new(channel));
            let mut receiver = ReceiveThread::new(socket.try_clone()?, queue, config);
            let mut sender = SendThread::new(socket, channel);
            sender.start()?;
            receiver.start()?;
            channels.push(LinkChannel { sender, receiver });
        }
        debug!(channels = channels.len(), "link established");
        Ok(Self {
            channels,
            receive_timeout: config.receive_timeout,
        })
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    fn channel(&self, channel: ChannelId) -> Result<&LinkChannel, TransportError> {
        self.channels
            .get(channel.index())
            .ok_or(TransportError::UnknownChannel(channel))
    }

    /// Queue `payload` on `channel` with start id 0.
    pub fn send(&self, channel: ChannelId, payload: &[u8]) -> Result<(), TransportError> {
        self.send_framed(channel, 0, payload)
    }

    /// Queue `payload` on `channel` with the given start id.
    pub fn send_framed(
        &self,
        channel: ChannelId,
        start_id: u64,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.channel(channel)?
            .sender
            .push_task(SendTask::new(channel, start_id, payload))
    }

    /// Queue `payload` on `channel` and get notified once it was written.
    pub fn send_notify(
        &self,
        channel: ChannelId,
        start_id: u64,
        payload: &[u8],
    ) -> Result<SendNotification, TransportError> {
        let (task, notification) = SendTask::with_notification(channel, start_id, payload);
        self.channel(channel)?.sender.push_task(task)?;
        Ok(notification)
    }

    /// The queue of received frames of `channel`.
    pub fn queue(&self, channel: ChannelId) -> Result<&Arc<ChannelQueue>, TransportError> {
        Ok(self.channel(channel)?.receiver.queue())
    }

    /// Block until the next frame on `channel` arrives, at most for the configured
    /// receive timeout.
    pub fn receive(&self, channel: ChannelId) -> Result<ReceivedFrame, TransportError> {
        self.queue(channel)?.receive(self.receive_timeout)
    }

    /// Block until the next frame on `channel` arrives and return its first `len` bytes.
    pub fn receive_exact(&self, channel: ChannelId, len: usize) -> Result<Bytes, TransportError> {
        self.queue(channel)?.receive_exact(len, self.receive_timeout)
    }

    /// Drop all frames queued on `channel`.
    pub fn flush_queue(&self, channel: ChannelId) -> Result<usize, TransportError> {
        Ok(self.queue(channel)?.flush_queue())
    }

    /// Drop queued and future frames on `channel` until [`Link::add_listener`].
    pub fn remove_listener(&self, channel: ChannelId) -> Result<usize, TransportError> {
        Ok(self.queue(channel)?.remove_listener())
    }

    /// Queue frames on `channel` again.
    pub fn add_listener(&self, channel: ChannelId) -> Result<(), TransportError> {
        self.queue(channel)?.add_listener();
        Ok(())
    }

    /// Write all queued frames and stop all workers.
    ///
    /// The senders are stopped first, so the peer receives every frame queued before the
    /// call followed by the end of the stream. Returns the first worker error.
    pub fn shutdown(&mut self) -> Result<(), TransportError> {
        let mut result = Ok(());
        for channel in &mut self.channels {
            let stopped = channel.sender.stop();
            if result.is_ok() {
                result = stopped;
            }
        }
        for channel in &mut self.channels {
            let stopped = channel.receiver.stop();
            if result.is_ok() {
                result = stopped;
            }
        }
        result
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(%err, "link shutdown failed");
        }
    }
}
