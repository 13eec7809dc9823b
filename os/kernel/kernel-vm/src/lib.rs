//! # Demand-Paged Virtual Memory
//!
//! The memory manager of the kernel: per-process page tables over one shared
//! pool of physical frames, pages loaded lazily on first touch, frames
//! reclaimed with the clock algorithm under pressure.
//!
//! ## Control flow
//!
//! ```text
//!  access_memory / handle_fault
//!          │
//!          ▼
//!   page table lookup ──hit──► pin ──► copy ──► mark ref/dirty ──► unpin
//!          │
//!         miss
//!          ▼
//!   free list ──empty──► clock sweep ──all pinned──► park until unpin
//!          │                  │
//!          │               victim: invalidate owner's entry,
//!          │                       save to swap if dirty, free it
//!          ▼                  ▼
//!   populate (swap copy / executable section / zeroes)
//!          │
//!          ▼
//!   install entry + directory owner ──► pinned for the caller
//! ```
//!
//! ## Usage
//! ```rust
//! use std::sync::Arc;
//! use kernel_memory_addresses::VirtualAddress;
//! use kernel_vm::{MemoryImage, MemorySwap, PagingMode, VmConfig, VmKernel};
//!
//! let kernel = VmKernel::new(VmConfig::default().with_frame_count(4), Arc::new(MemorySwap::new()));
//! let image = MemoryImage::new().with_section(".data", vec![0; 100], false);
//! let process = kernel.spawn(Arc::new(image), &["demo"], PagingMode::Demand).unwrap();
//!
//! let va = VirtualAddress::new(10);
//! assert_eq!(kernel.write_virtual_memory(&process, va, b"hi").unwrap(), 2);
//! let mut buf = [0; 2];
//! kernel.read_virtual_memory(&process, va, &mut buf).unwrap();
//! assert_eq!(&buf, b"hi");
//!
//! kernel.release_all_frames(&process);
//! assert_eq!(kernel.free_frames(), 4);
//! ```

mod accessor;
mod config;
mod error;
mod kernel;
mod loader;
mod page_fault;
mod process;
mod swap;

pub use crate::accessor::{AccessKind, PinnedFrame};
pub use crate::config::VmConfig;
pub use crate::error::{InvariantError, LoadError, SwapError, VmError};
pub use crate::kernel::{VmKernel, VmStats};
pub use crate::loader::{ExecutableImage, ImageLayout, MemoryImage, PageSource, Section};
pub use crate::page_fault::FaultState;
pub use crate::process::{DemandPager, EagerPager, Pager, PagingMode, Process, ProcessId};
pub use crate::swap::{MemorySwap, SwapStore};
pub use kernel_alloc::FrameInfo;
