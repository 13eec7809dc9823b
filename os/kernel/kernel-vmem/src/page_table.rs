//! # Flat per-process page table
//!
//! One [`PageTableEntry`] per virtual page of the process, indexed directly by
//! VPN. The table is created at process load with every entry invalid and is
//! dropped when the process terminates.
//!
//! ## Invariants & Notes
//!
//! - A valid entry names a frame whose directory entry is owned by this
//!   process and records this VPN. Keeping the two sides in step is the frame
//!   pool's job; the table only stores what it is told.
//! - Callers serialize access (the owning process wraps the table in a lock).

use crate::PageEntryBits;
use crate::page_entry_bits::MAX_ENTRY_PFN;
use alloc::vec::Vec;
use core::fmt;
use kernel_memory_addresses::{PhysicalFrameNumber, VirtualPageNumber};

/// Error returned by page-table updates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageTableError {
    #[error("{vpn} is outside the address space of {len} pages")]
    OutOfRange { vpn: VirtualPageNumber, len: usize },
    #[error("{0} cannot be encoded in a page table entry")]
    FrameTooLarge(PhysicalFrameNumber),
}

/// A single page table entry (PTE).
///
/// All state bits live inside the inner [`PageEntryBits`].
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct PageTableEntry(PageEntryBits);

impl PageTableEntry {
    /// Create an invalid entry.
    #[inline]
    #[must_use]
    pub const fn invalid() -> Self {
        Self(PageEntryBits::new())
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0.valid()
    }

    #[inline]
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        self.0.read_only()
    }

    #[inline]
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        self.0.dirty()
    }

    #[inline]
    #[must_use]
    pub const fn is_referenced(self) -> bool {
        self.0.referenced()
    }

    /// The backing frame if the entry is valid.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<PhysicalFrameNumber> {
        self.0.frame()
    }

    /// Expose the underlying bitfield.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> PageEntryBits {
        self.0
    }

    /// Return the raw 32-bit value.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0.into()
    }
}

impl fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("PageTableEntry");
        match self.frame() {
            Some(pfn) => d.field("pfn", &pfn),
            None => d.field("pfn", &"-"),
        };
        d.field("ro", &self.is_read_only())
            .field("dirty", &self.is_dirty())
            .field("ref", &self.is_referenced())
            .finish()
    }
}

/// The per-process page table.
#[doc(alias = "PT")]
pub struct PageTable {
    entries: Vec<PageTableEntry>,
}

impl PageTable {
    /// Create a table of `num_pages` invalid entries.
    #[must_use]
    pub fn new(num_pages: usize) -> Self {
        Self {
            entries: alloc::vec![PageTableEntry::invalid(); num_pages],
        }
    }

    /// Number of virtual pages in the address space.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, vpn: VirtualPageNumber) -> bool {
        vpn.as_usize() < self.entries.len()
    }

    /// Read the entry for `vpn`, or `None` past the end of the table.
    #[inline]
    #[must_use]
    pub fn entry(&self, vpn: VirtualPageNumber) -> Option<PageTableEntry> {
        self.entries.get(vpn.as_usize()).copied()
    }

    /// Look up the frame backing `vpn`.
    ///
    /// `None` is a miss: either the page is not resident or it lies outside
    /// the table. Use [`contains`](Self::contains) to tell the two apart.
    #[inline]
    #[must_use]
    pub fn translate(&self, vpn: VirtualPageNumber) -> Option<PhysicalFrameNumber> {
        self.entry(vpn).and_then(PageTableEntry::frame)
    }

    /// Make `vpn` resident in `pfn`.
    ///
    /// Clears `dirty`, sets `referenced` as requested and keeps the page's
    /// `read_only` attribute.
    ///
    /// # Errors
    /// [`PageTableError::OutOfRange`] for a VPN past the end of the table;
    /// [`PageTableError::FrameTooLarge`] for a PFN the entry cannot hold.
    pub fn install(
        &mut self,
        vpn: VirtualPageNumber,
        pfn: PhysicalFrameNumber,
        referenced: bool,
    ) -> Result<(), PageTableError> {
        if pfn.as_u32() > MAX_ENTRY_PFN {
            return Err(PageTableError::FrameTooLarge(pfn));
        }
        let e = self.slot(vpn)?;
        debug_assert!(!e.is_valid(), "{vpn} installed twice");
        *e = PageTableEntry(PageEntryBits::resident(pfn, e.is_read_only(), referenced));
        Ok(())
    }

    /// Drop the mapping for `vpn` and return the entry as it was.
    ///
    /// The caller inspects the returned entry's `dirty` bit to decide whether
    /// the frame content must be saved. Invalidating an invalid entry is a
    /// no-op that returns it unchanged.
    pub fn invalidate(&mut self, vpn: VirtualPageNumber) -> Option<PageTableEntry> {
        let e = self.entries.get_mut(vpn.as_usize())?;
        let old = *e;
        if old.is_valid() {
            *e = PageTableEntry(PageEntryBits::new().with_read_only(old.is_read_only()));
        }
        Some(old)
    }

    /// Restore a previously invalidated mapping unchanged.
    ///
    /// # Errors
    /// [`PageTableError::OutOfRange`] for a VPN past the end of the table.
    pub fn restore(&mut self, vpn: VirtualPageNumber, entry: PageTableEntry) -> Result<(), PageTableError> {
        *self.slot(vpn)? = entry;
        Ok(())
    }

    /// Record an access through a valid entry.
    ///
    /// Sets `referenced`, and `dirty` for writes. Ignored for invalid entries.
    pub fn mark_access(&mut self, vpn: VirtualPageNumber, write: bool) {
        if let Some(e) = self.entries.get_mut(vpn.as_usize())
            && e.is_valid()
        {
            e.0.set_referenced(true);
            if write {
                e.0.set_dirty(true);
            }
        }
    }

    /// Mark a page as belonging to a read-only section.
    ///
    /// # Errors
    /// [`PageTableError::OutOfRange`] for a VPN past the end of the table.
    pub fn set_read_only(&mut self, vpn: VirtualPageNumber, read_only: bool) -> Result<(), PageTableError> {
        self.slot(vpn)?.0.set_read_only(read_only);
        Ok(())
    }

    /// All resident pages with their frames, in VPN order.
    pub fn resident(&self) -> impl Iterator<Item = (VirtualPageNumber, PhysicalFrameNumber)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            let vpn = VirtualPageNumber::new(u32::try_from(i).ok()?);
            e.frame().map(|pfn| (vpn, pfn))
        })
    }

    /// Number of resident pages.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_valid()).count()
    }

    fn slot(&mut self, vpn: VirtualPageNumber) -> Result<&mut PageTableEntry, PageTableError> {
        let len = self.entries.len();
        self.entries
            .get_mut(vpn.as_usize())
            .ok_or(PageTableError::OutOfRange { vpn, len })
    }
}

impl fmt::Debug for PageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTable")
            .field("pages", &self.len())
            .field("resident", &self.resident_count())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const fn vpn(v: u32) -> VirtualPageNumber {
        VirtualPageNumber::new(v)
    }

    const fn pfn(v: u32) -> PhysicalFrameNumber {
        PhysicalFrameNumber::new(v)
    }

    #[test]
    fn new_table_is_all_misses() {
        let t = PageTable::new(4);
        assert_eq!(t.len(), 4);
        assert!((0..4).all(|v| t.translate(vpn(v)).is_none()));
        assert_eq!(t.resident_count(), 0);
    }

    #[test]
    fn install_then_translate() {
        let mut t = PageTable::new(4);
        t.install(vpn(2), pfn(7), true).unwrap();
        assert_eq!(t.translate(vpn(2)), Some(pfn(7)));

        let e = t.entry(vpn(2)).unwrap();
        assert!(e.is_valid());
        assert!(e.is_referenced());
        assert!(!e.is_dirty());
    }

    #[test]
    fn out_of_range_is_a_miss_and_an_error() {
        let mut t = PageTable::new(2);
        assert!(!t.contains(vpn(2)));
        assert_eq!(t.translate(vpn(2)), None);
        assert_eq!(
            t.install(vpn(2), pfn(0), false),
            Err(PageTableError::OutOfRange { vpn: vpn(2), len: 2 })
        );
        assert!(t.invalidate(vpn(9)).is_none());
    }

    #[test]
    fn invalidate_reports_dirty_and_keeps_read_only() {
        let mut t = PageTable::new(3);
        t.set_read_only(vpn(0), true).unwrap();
        t.install(vpn(0), pfn(1), false).unwrap();
        t.install(vpn(1), pfn(2), false).unwrap();
        t.mark_access(vpn(1), true);

        let clean = t.invalidate(vpn(0)).unwrap();
        assert!(!clean.is_dirty());
        assert_eq!(clean.frame(), Some(pfn(1)));
        let after = t.entry(vpn(0)).unwrap();
        assert!(!after.is_valid());
        assert!(after.is_read_only());

        let dirty = t.invalidate(vpn(1)).unwrap();
        assert!(dirty.is_dirty());
        assert!(dirty.is_referenced());
    }

    #[test]
    fn restore_puts_the_mapping_back() {
        let mut t = PageTable::new(1);
        t.install(vpn(0), pfn(5), true).unwrap();
        t.mark_access(vpn(0), true);
        let old = t.invalidate(vpn(0)).unwrap();
        assert_eq!(t.translate(vpn(0)), None);

        t.restore(vpn(0), old).unwrap();
        assert_eq!(t.translate(vpn(0)), Some(pfn(5)));
        assert!(t.entry(vpn(0)).unwrap().is_dirty());
    }

    #[test]
    fn mark_access_ignores_invalid_entries() {
        let mut t = PageTable::new(1);
        t.mark_access(vpn(0), true);
        assert_eq!(t.entry(vpn(0)), Some(PageTableEntry::invalid()));
    }

    #[test]
    fn resident_lists_valid_pages_in_order() {
        let mut t = PageTable::new(5);
        t.install(vpn(3), pfn(0), true).unwrap();
        t.install(vpn(1), pfn(2), true).unwrap();
        let got: Vec<_> = t.resident().collect();
        assert_eq!(got, [(vpn(1), pfn(2)), (vpn(3), pfn(0))]);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut t = PageTable::new(1);
        assert_eq!(
            t.install(vpn(0), pfn(MAX_ENTRY_PFN + 1), true),
            Err(PageTableError::FrameTooLarge(pfn(MAX_ENTRY_PFN + 1)))
        );
    }

    #[test]
    fn raw_layout() {
        let e = PageTableEntry(PageEntryBits::resident(pfn(1), true, false));
        assert_eq!(e.raw(), 0x0000_0103);
    }
}
