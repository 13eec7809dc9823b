use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread, ThreadId};

/// Suspend/resume token bound to one thread.
///
/// The token remembers a pending wake-up, so an [`unpark`](Self::unpark) that
/// races ahead of the matching [`park`](Self::park) is not lost: the later
/// `park` returns immediately and consumes it.
///
/// ### Examples
/// ```rust
/// # use kernel_sync::Parker;
/// let parker = Parker::for_current();
/// let remote = parker.clone();
/// let t = std::thread::spawn(move || remote.unpark());
/// parker.park();
/// t.join().unwrap();
/// ```
pub struct Parker {
    thread: Thread,
    notified: AtomicBool,
}

impl Parker {
    /// Token for the calling thread.
    #[must_use]
    pub fn for_current() -> Arc<Self> {
        Arc::new(Self {
            thread: thread::current(),
            notified: AtomicBool::new(false),
        })
    }

    /// Suspend the calling thread until [`unpark`](Self::unpark) is called.
    ///
    /// Must be called from the thread the token was created on.
    pub fn park(&self) {
        debug_assert_eq!(thread::current().id(), self.thread.id(), "parked on a foreign thread");
        // std may wake spuriously; only a consumed notification counts.
        while !self.notified.swap(false, Ordering::Acquire) {
            thread::park();
        }
    }

    /// Resume the owning thread, or pre-arm the next `park`.
    pub fn unpark(&self) {
        self.notified.store(true, Ordering::Release);
        self.thread.unpark();
    }

    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread.id()
    }
}

impl fmt::Debug for Parker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parker")
            .field("thread", &self.thread.id())
            .field("notified", &self.notified.load(Ordering::Relaxed))
            .finish()
    }
}
