//! One-shot cancellation signal shared between a session's threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Clonable stop flag for a single playback session.
///
/// Every clone observes the same flag. A token is never reset: each session gets a
/// fresh one, so a signal aimed at an old session can't leak into the next.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent, and harmless when nothing is listening.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
