//! # Kernel synchronization primitives
//!
//! The paging core consumes exactly two primitives from the scheduler side:
//!
//! - [`SpinLock`]: FIFO-fair mutual exclusion (ticket lock). Used for the
//!   allocator-wide lock, the process registry and per-process page tables.
//! - [`Parker`]: a suspend/resume token for one thread. A thread that must
//!   wait enqueues its parker somewhere visible, releases its locks, and
//!   parks; another thread resumes it with [`Parker::unpark`].

#![allow(unsafe_code)]

mod parker;
mod spin_lock;

pub use parker::Parker;
pub use spin_lock::{SpinLock, SpinLockGuard};
