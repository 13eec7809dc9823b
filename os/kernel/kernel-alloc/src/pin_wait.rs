use kernel_sync::Parker;
use std::collections::VecDeque;
use std::sync::Arc;

/// FIFO of threads waiting for some frame to become unpinned.
///
/// Threads land here when the clock sweep finds every frame pinned. Each
/// unpin wakes the oldest waiter, which then retries frame acquisition from
/// scratch.
#[derive(Debug, Default)]
pub struct PinWaitQueue {
    waiters: VecDeque<Arc<Parker>>,
}

impl PinWaitQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
        }
    }

    /// Append a waiter. It must park only after releasing the lock that
    /// guards this queue.
    pub fn enqueue(&mut self, parker: Arc<Parker>) {
        self.waiters.push_back(parker);
    }

    /// Wake the oldest waiter, if any. Returns whether one was woken.
    pub fn wake_one(&mut self) -> bool {
        self.waiters.pop_front().is_some_and(|p| {
            p.unpark();
            true
        })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
