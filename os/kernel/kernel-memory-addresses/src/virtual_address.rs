use crate::{OFFSET_MASK, PAGE_SHIFT, PAGE_SIZE, PageOffset};
use core::fmt;

/// Virtual memory address in a process's flat address space.
///
/// Only carries the *kind* of address at the type level; whether the address
/// is backed by a page is decided by the owning page table.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(2 * PAGE_SIZE as u32 + 5);
/// assert_eq!(va.page(), VirtualPageNumber::new(2));
/// assert_eq!(va.offset().as_usize(), 5);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u32);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// The page containing this address.
    #[inline]
    #[must_use]
    pub const fn page(self) -> VirtualPageNumber {
        VirtualPageNumber(self.0 >> PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn offset(self) -> PageOffset {
        PageOffset::new((self.0 & OFFSET_MASK) as usize)
    }

    #[inline]
    #[must_use]
    pub const fn split(self) -> (VirtualPageNumber, PageOffset) {
        (self.page(), self.offset())
    }

    /// Advance by `bytes`, or `None` if the result leaves the 32-bit space.
    #[inline]
    #[must_use]
    pub fn checked_add(self, bytes: usize) -> Option<Self> {
        let bytes = u32::try_from(bytes).ok()?;
        self.0.checked_add(bytes).map(Self)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:08X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for VirtualAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

/// Virtual page number (VPN): index of a page within one address space.
///
/// Unique within a process. The page table of that process is indexed by it.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPageNumber(pub(crate) u32);

impl VirtualPageNumber {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// First byte of this page.
    ///
    /// ### Debug assertions
    /// - Asserts the page lies inside the 32-bit address space.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        debug_assert!(self.0 <= (u32::MAX >> PAGE_SHIFT));
        VirtualAddress(self.0 << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn join(self, off: PageOffset) -> VirtualAddress {
        VirtualAddress(self.base().0 | off.as_usize() as u32)
    }

    /// The following page.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Number of bytes covered by `pages` pages.
    #[inline]
    #[must_use]
    pub const fn bytes(pages: usize) -> usize {
        pages * PAGE_SIZE
    }
}

impl fmt::Debug for VirtualPageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VPN({})", self.0)
    }
}

impl fmt::Display for VirtualPageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vpn {}", self.0)
    }
}

impl From<u32> for VirtualPageNumber {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}
