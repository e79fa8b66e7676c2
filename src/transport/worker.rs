use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a [`SendThread`](super::SendThread) or
/// [`ReceiveThread`](super::ReceiveThread).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Created, but the thread was not started yet.
    Idle = 0,
    /// The thread is processing.
    Running = 1,
    /// The thread was asked to stop and is finishing its work.
    StopRequested = 2,
    /// The thread has exited.
    Terminated = 3,
}

/// A [`WorkerState`] shared between a worker thread and its handle.
#[derive(Debug)]
pub(crate) struct SharedState(AtomicU8);

impl SharedState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Idle as u8))
    }

    pub(crate) fn get(&self) -> WorkerState {
        match self.0.load(Ordering::Acquire) {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            2 => WorkerState::StopRequested,
            _ => WorkerState::Terminated,
        }
    }

    pub(crate) fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move from `Idle` or `Running` to `StopRequested`. A terminated worker stays
    /// terminated.
    pub(crate) fn request_stop(&self) {
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
            (state < WorkerState::StopRequested as u8).then_some(WorkerState::StopRequested as u8)
        });
    }

    /// `true` once no more work is accepted.
    pub(crate) fn is_stopping(&self) -> bool {
        matches!(
            self.get(),
            WorkerState::StopRequested | WorkerState::Terminated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let state = SharedState::new();
        assert_eq!(WorkerState::Idle, state.get());
        state.set(WorkerState::Running);
        assert!(!state.is_stopping());
        state.request_stop();
        assert_eq!(WorkerState::StopRequested, state.get());
        state.set(WorkerState::Terminated);
        state.request_stop();
        assert_eq!(WorkerState::Terminated, state.get());
    }
}
