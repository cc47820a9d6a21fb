use super::error::BatchError;
use super::result::BatchResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Shared cooperative cancellation flag.
///
/// Cancelling stops new jobs from being dispatched; jobs already running
/// finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A batch running on a background thread.
#[derive(Debug)]
pub struct BatchHandle {
    token: CancelToken,
    thread: JoinHandle<Result<BatchResult, BatchError>>,
}

impl BatchHandle {
    pub(crate) fn new(
        token: CancelToken,
        thread: JoinHandle<Result<BatchResult, BatchError>>,
    ) -> Self {
        Self { token, thread }
    }

    /// Request cancellation. Returns immediately.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// A token that cancels this batch, usable from other threads.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the batch finishes and return its result.
    pub fn wait(self) -> Result<BatchResult, BatchError> {
        self.thread.join().map_err(|_| BatchError::Panicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
