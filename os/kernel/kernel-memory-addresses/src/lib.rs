//! # Virtual and Physical Page Addressing
//!
//! Strongly typed wrappers for the address and page-number values used by the
//! paging core.
//!
//! ## Overview
//!
//! The virtual memory manager juggles four kinds of integers that are all
//! "just numbers" at the machine level, and mixing them up is the classic
//! paging bug. Each gets its own zero-cost newtype:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | A byte address in a process's linear address space. |
//! | [`VirtualPageNumber`] | Index of a page in a process's address space (VPN). |
//! | [`PhysicalFrameNumber`] | Index of a frame in the global frame array (PFN). |
//! | [`PageOffset`] | Byte offset inside a page or frame. |
//! | [`PhysicalAddress`] | A byte address in physical memory (`pfn * PAGE_SIZE + offset`). |
//!
//! Address spaces are flat and 32 bits wide; pages are [`PAGE_SIZE`] bytes.
//!
//! ```text
//! | 31 ............ 10 | 9 ...... 0 |
//! |        VPN         |   offset   |
//! ```
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0000_0C12);
//! let (vpn, off) = va.split();
//! assert_eq!(vpn.as_u32(), 3);
//! assert_eq!(off.as_usize(), 0x12);
//! assert_eq!(vpn.join(off), va);
//!
//! let pfn = PhysicalFrameNumber::new(7);
//! assert_eq!(pfn.join(off).as_usize(), 7 * PAGE_SIZE + 0x12);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod physical_address;
mod virtual_address;

use core::fmt;

pub use crate::physical_address::{PhysicalAddress, PhysicalFrameNumber};
pub use crate::virtual_address::{VirtualAddress, VirtualPageNumber};

/// log2 of the page size; number of low address bits forming the [`PageOffset`].
pub const PAGE_SHIFT: u32 = 10;

/// Page (and frame) size in bytes.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

const OFFSET_MASK: u32 = (1 << PAGE_SHIFT) - 1;

/// Byte offset within a page.
///
/// ### Invariants
/// - Always `< PAGE_SIZE` (checked in debug builds).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageOffset(u16);

impl PageOffset {
    /// Offset zero, the first byte of a page.
    pub const ZERO: Self = Self(0);

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(v: usize) -> Self {
        debug_assert!(v < PAGE_SIZE);
        Self(v as u16)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Number of bytes from this offset to the end of the page.
    #[inline]
    #[must_use]
    pub const fn remaining(self) -> usize {
        PAGE_SIZE - self.as_usize()
    }
}

impl fmt::Debug for PageOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:#05X}", self.0)
    }
}

impl fmt::Display for PageOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(PAGE_SIZE <= u16::MAX as usize);
};
