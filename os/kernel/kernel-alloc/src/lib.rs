//! # Physical Frame Allocation
//!
//! This crate owns the shared pool of physical frames and decides which frame
//! a faulting page gets: a free one if there is one, otherwise a victim picked
//! by the clock.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    FrameTable                       │
//! │    • allocate / release / pin / unpin               │
//! │    • invariant checking                             │
//! └───┬──────────────┬──────────────┬───────────────┬───┘
//!     │              │              │               │
//! ┌───▼─────┐ ┌──────▼──────┐ ┌─────▼──────┐ ┌──────▼──────┐
//! │ Free    │ │ Frame owner │ │ Clock      │ │ Pin wait    │
//! │ list    │ │ directory   │ │ eviction   │ │ queue       │
//! └─────────┘ └─────────────┘ └────────────┘ └─────────────┘
//!
//! ┌─────────────────────────────────────────────────────┐
//! │        PhysicalMemory (frame bytes, per-frame lock) │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Free list ([`free_list`])
//! Owner-less frames. Initially every frame, lowest PFN handed out first.
//!
//! ### Frame owner directory ([`frame_directory`])
//! The inverted page table: for every frame its owner, the page it holds, a
//! pin count and the second-chance bit.
//!
//! ### Clock ([`clock`])
//! Second-chance victim selection with a persistent hand.
//!
//! ### Pin wait queue ([`pin_wait`])
//! Threads that found every frame pinned, woken one per unpin.
//!
//! ### Physical memory ([`phys_memory`])
//! The frame bytes. Not part of the table; copies go through it while the
//! frame is pinned and the table lock is released.
//!
//! ## Concurrency
//!
//! [`FrameTable`] is plain data. The kernel wraps it in a single lock; the
//! clock sweep, the free list and the directory therefore always change
//! together.
//!
//! ## Usage
//! ```rust
//! use kernel_alloc::FrameTable;
//! use kernel_memory_addresses::VirtualPageNumber;
//!
//! let mut frames = FrameTable::<u32>::new(2);
//! let pfn = frames.allocate(1, VirtualPageNumber::new(0)).unwrap();
//! frames.unpin(pfn);
//! frames.check_invariants().unwrap();
//! ```

pub mod clock;
pub mod frame_directory;
pub mod frame_table;
pub mod free_list;
pub mod phys_memory;
pub mod pin_wait;

pub use crate::clock::ClockEvictionPolicy;
pub use crate::frame_directory::{FrameInfo, FrameOwnerDirectory};
pub use crate::frame_table::{FrameTable, FrameTableError};
pub use crate::free_list::FreeFrameList;
pub use crate::phys_memory::PhysicalMemory;
pub use crate::pin_wait::PinWaitQueue;
