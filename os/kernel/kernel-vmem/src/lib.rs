//! # Virtual Memory Support
//!
//! Per-process page tables for the demand-paged memory manager.
//!
//! ## What you get
//! - A packed 32-bit [`PageEntryBits`] bitfield holding the state of one page.
//! - A typed [`PageTableEntry`] wrapper around it.
//! - A flat [`PageTable`] indexed by [`VirtualPageNumber`](kernel_memory_addresses::VirtualPageNumber).
//!
//! ## Translation
//!
//! There is a single level. A virtual address is split into page number and
//! offset, the page number indexes the table, and a valid entry supplies the
//! frame:
//!
//! ```text
//! | 31 ............ 10 | 9 ...... 0 |
//! |        VPN         |   offset   |
//!           │
//!           ▼
//!   PageTable[VPN] ──valid──► PFN ──► PFN * PAGE_SIZE + offset
//!           │
//!           └─invalid──► page fault
//! ```
//!
//! An invalid entry (or a VPN past the end of the table) is a **miss**. The
//! caller decides whether the miss is a fault to be serviced or an address
//! outside the process.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod page_entry_bits;
mod page_table;

pub use crate::page_entry_bits::{MAX_ENTRY_PFN, PageEntryBits};
pub use crate::page_table::{PageTable, PageTableEntry, PageTableError};
