//! Per-control pause

use std::time::Duration;

/// Blocks the traversal thread between a control span opening and its results
pub trait Pause: Send + Sync {
    /// Block for `duration`
    fn pause(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl<F> Pause for F
where
    F: Fn(Duration) + Send + Sync,
{
    fn pause(&self, duration: Duration) {
        self(duration)
    }
}
