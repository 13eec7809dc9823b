//! # Frame owner directory
//!
//! The inverted table: one [`FrameInfo`] per physical frame, recording which
//! process page currently lives there. Eviction walks this table rather than
//! any page table, because it must go from a frame back to its owner.

use core::fmt;
use kernel_memory_addresses::{PhysicalFrameNumber, VirtualPageNumber};

/// Directory entry for one frame.
///
/// `O` identifies the owning address space (a process id in the kernel).
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct FrameInfo<O> {
    /// Owning address space; `None` while the frame is on the free list.
    pub owner: Option<O>,
    /// Page of `owner` held by this frame. Meaningless without an owner.
    pub vpn: VirtualPageNumber,
    /// Number of outstanding pins. A pinned frame is never evicted.
    pub pin_count: u32,
    /// Second-chance bit consulted and cleared by the clock sweep.
    pub referenced: bool,
}

impl<O> FrameInfo<O> {
    /// An owner-less entry.
    #[must_use]
    pub const fn free() -> Self {
        Self {
            owner: None,
            vpn: VirtualPageNumber::new(0),
            pin_count: 0,
            referenced: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    #[inline]
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }
}

impl<O: fmt::Debug> fmt::Debug for FrameInfo<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            None => f.write_str("FrameInfo(free)"),
            Some(owner) => f
                .debug_struct("FrameInfo")
                .field("owner", owner)
                .field("vpn", &self.vpn)
                .field("pins", &self.pin_count)
                .field("ref", &self.referenced)
                .finish(),
        }
    }
}

/// One entry per frame, indexed by PFN.
pub struct FrameOwnerDirectory<O> {
    entries: Vec<FrameInfo<O>>,
}

impl<O: Copy> FrameOwnerDirectory<O> {
    #[must_use]
    pub fn new(frame_count: usize) -> Self {
        Self {
            entries: vec![FrameInfo::free(); frame_count],
        }
    }
}

impl<O> FrameOwnerDirectory<O> {
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

    /// # Panics
    /// If `pfn` is out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, pfn: PhysicalFrameNumber) -> &FrameInfo<O> {
        &self.entries[pfn.as_usize()]
    }

    /// # Panics
    /// If `pfn` is out of range.
    #[inline]
    pub fn get_mut(&mut self, pfn: PhysicalFrameNumber) -> &mut FrameInfo<O> {
        &mut self.entries[pfn.as_usize()]
    }

    /// Hand `pfn` to `owner` for page `vpn`, with one pin held.
    ///
    /// # Panics
    /// If the frame already has an owner.
    pub fn assign(&mut self, pfn: PhysicalFrameNumber, owner: O, vpn: VirtualPageNumber) {
        let e = self.get_mut(pfn);
        assert!(e.is_free(), "{pfn} assigned while owned");
        *e = FrameInfo {
            owner: Some(owner),
            vpn,
            pin_count: 1,
            referenced: false,
        };
    }

    /// Reset `pfn` to owner-less.
    pub fn clear(&mut self, pfn: PhysicalFrameNumber) {
        *self.get_mut(pfn) = FrameInfo::free();
    }

    /// All entries with their frame numbers.
    pub fn iter(&self) -> impl Iterator<Item = (PhysicalFrameNumber, &FrameInfo<O>)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (PhysicalFrameNumber::from_index(i), e))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn assign_and_clear() {
        let mut d = FrameOwnerDirectory::<u32>::new(2);
        let pfn = PhysicalFrameNumber::new(1);
        d.assign(pfn, 7, VirtualPageNumber::new(4));

        let e = *d.get(pfn);
        assert_eq!(e.owner, Some(7));
        assert_eq!(e.vpn, VirtualPageNumber::new(4));
        assert!(e.is_pinned());

        d.clear(pfn);
        assert!(d.get(pfn).is_free());
        assert!(!d.get(pfn).is_pinned());
    }

    #[test]
    #[should_panic(expected = "assigned while owned")]
    fn double_assign_panics() {
        let mut d = FrameOwnerDirectory::<u32>::new(1);
        let pfn = PhysicalFrameNumber::new(0);
        d.assign(pfn, 1, VirtualPageNumber::new(0));
        d.assign(pfn, 2, VirtualPageNumber::new(0));
    }

    #[test]
    fn debug_shows_free_entries_compactly() {
        let d = FrameOwnerDirectory::<u32>::new(1);
        assert_eq!(format!("{:?}", d.get(PhysicalFrameNumber::new(0))), "FrameInfo(free)");
    }
}
