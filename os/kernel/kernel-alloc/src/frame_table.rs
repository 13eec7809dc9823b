//! # Frame table
//!
//! All allocator-side bookkeeping for the physical frame pool in one value:
//! free list, owner directory, clock hand and pin wait queue. The kernel keeps
//! exactly one [`FrameTable`] behind the allocator-wide lock, so every method
//! here runs serialized.
//!
//! ## Frame life cycle
//!
//! ```text
//!            allocate (pinned)            unpin
//!  ┌──────┐ ─────────────────► ┌───────┐ ──────► ┌──────────┐
//!  │ free │                    │ owned │         │ evictable│
//!  └──────┘ ◄───────────────── │ pinned│ ◄────── └──────────┘
//!      ▲        (never)        └───────┘   pin        │
//!      └────────────────────── release ───────────────┘
//! ```

use crate::clock::ClockEvictionPolicy;
use crate::free_list::FreeFrameList;
use crate::frame_directory::{FrameInfo, FrameOwnerDirectory};
use crate::pin_wait::PinWaitQueue;
use core::fmt;
use kernel_memory_addresses::{PhysicalFrameNumber, VirtualPageNumber};
use kernel_sync::Parker;
use std::sync::Arc;

/// A broken frame-table invariant, as found by [`FrameTable::check_invariants`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameTableError {
    #[error("{0} is owned and on the free list")]
    OwnedFrameOnFreeList(PhysicalFrameNumber),
    #[error("{0} has no owner and is not on the free list")]
    LeakedFrame(PhysicalFrameNumber),
    #[error("{0} is pinned without an owner")]
    PinnedFreeFrame(PhysicalFrameNumber),
    #[error("free list holds {listed} frames, directory has {free} owner-less entries")]
    FreeCountMismatch { listed: usize, free: usize },
}

/// Frame pool bookkeeping, generic over the owner identifier `O`.
pub struct FrameTable<O> {
    free: FreeFrameList,
    directory: FrameOwnerDirectory<O>,
    clock: ClockEvictionPolicy,
    waiters: PinWaitQueue,
}

impl<O: Copy + Eq + fmt::Debug> FrameTable<O> {
    /// A pool of `frame_count` free frames.
    #[must_use]
    pub fn new(frame_count: usize) -> Self {
        Self {
            free: FreeFrameList::new(frame_count),
            directory: FrameOwnerDirectory::new(frame_count),
            clock: ClockEvictionPolicy::new(),
            waiters: PinWaitQueue::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.directory.len()
    }

    #[inline]
    #[must_use]
    pub const fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Take a free frame for page `vpn` of `owner`.
    ///
    /// The frame comes back pinned once; the caller unpins it after the page
    /// table entry is installed. `None` if the free list is empty.
    pub fn allocate(&mut self, owner: O, vpn: VirtualPageNumber) -> Option<PhysicalFrameNumber> {
        let pfn = self.free.pop()?;
        self.directory.assign(pfn, owner, vpn);
        log::trace!("allocated {pfn} to {owner:?} {vpn}");
        Some(pfn)
    }

    /// Return an owned, unpinned frame to the free list.
    ///
    /// # Panics
    /// If the frame is pinned or already free.
    pub fn release(&mut self, pfn: PhysicalFrameNumber) {
        let info = self.directory.get(pfn);
        assert!(!info.is_free(), "{pfn} released while free");
        assert!(!info.is_pinned(), "{pfn} released while pinned");
        self.directory.clear(pfn);
        self.free.push(pfn);
        log::trace!("released {pfn}");
    }

    /// Take one more pin on an owned frame.
    ///
    /// # Panics
    /// If the frame has no owner.
    pub fn pin(&mut self, pfn: PhysicalFrameNumber) {
        let info = self.directory.get_mut(pfn);
        assert!(!info.is_free(), "{pfn} pinned while free");
        info.pin_count += 1;
    }

    /// Drop one pin. When the last pin goes, the oldest waiter is woken.
    ///
    /// Returns whether a waiter was woken.
    ///
    /// # Panics
    /// If the frame is not pinned.
    pub fn unpin(&mut self, pfn: PhysicalFrameNumber) -> bool {
        let info = self.directory.get_mut(pfn);
        assert!(info.is_pinned(), "{pfn} unpinned while not pinned");
        info.pin_count -= 1;
        if info.is_pinned() {
            return false;
        }
        self.waiters.wake_one()
    }

    /// Set or clear the second-chance bit of a frame.
    pub fn set_referenced(&mut self, pfn: PhysicalFrameNumber, referenced: bool) {
        self.directory.get_mut(pfn).referenced = referenced;
    }

    /// Run the clock over the directory.
    ///
    /// Only meaningful with an empty free list; the victim stays owned and
    /// must be unmapped by its owner before [`release`](Self::release).
    pub fn select_victim(&mut self) -> Option<PhysicalFrameNumber> {
        let victim = self.clock.select_victim(&mut self.directory);
        if let Some(pfn) = victim {
            log::debug!("clock chose {pfn} ({:?}), hand at {}", self.directory.get(pfn), self.clock.cursor());
        }
        victim
    }

    /// Park slot for a thread that found every frame pinned.
    pub fn enqueue_waiter(&mut self, parker: Arc<Parker>) {
        self.waiters.enqueue(parker);
    }

    /// Wake the oldest waiter, if any.
    pub fn wake_one(&mut self) -> bool {
        self.waiters.wake_one()
    }

    /// Number of threads currently queued for a frame.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    #[must_use]
    pub fn info(&self, pfn: PhysicalFrameNumber) -> FrameInfo<O> {
        *self.directory.get(pfn)
    }

    /// Frames held by `owner`, with the page each one holds.
    #[must_use]
    pub fn frames_owned_by(&self, owner: O) -> Vec<(PhysicalFrameNumber, VirtualPageNumber)> {
        self.directory
            .iter()
            .filter(|(_, e)| e.owner == Some(owner))
            .map(|(pfn, e)| (pfn, e.vpn))
            .collect()
    }

    #[must_use]
    pub const fn clock_hand(&self) -> usize {
        self.clock.cursor()
    }

    /// Verify that every frame is either free or owned by exactly one page,
    /// never both, and that pins only sit on owned frames.
    ///
    /// # Errors
    /// The first violation found.
    pub fn check_invariants(&self) -> Result<(), FrameTableError> {
        let mut owner_less = 0;
        for (pfn, info) in self.directory.iter() {
            let listed = self.free.contains(pfn);
            match (info.is_free(), listed) {
                (false, true) => return Err(FrameTableError::OwnedFrameOnFreeList(pfn)),
                (true, false) => return Err(FrameTableError::LeakedFrame(pfn)),
                _ => {}
            }
            if info.is_free() {
                owner_less += 1;
                if info.is_pinned() {
                    return Err(FrameTableError::PinnedFreeFrame(pfn));
                }
            }
        }
        if owner_less != self.free.len() {
            return Err(FrameTableError::FreeCountMismatch {
                listed: self.free.len(),
                free: owner_less,
            });
        }
        Ok(())
    }
}

impl<O> fmt::Debug for FrameTable<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTable")
            .field("frames", &self.directory.len())
            .field("free", &self.free.len())
            .field("hand", &self.clock.cursor())
            .field("waiting", &self.waiters.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vpn(v: u32) -> VirtualPageNumber {
        VirtualPageNumber::new(v)
    }

    fn pfn(v: u32) -> PhysicalFrameNumber {
        PhysicalFrameNumber::new(v)
    }

    #[test]
    fn allocation_pins_and_assigns() {
        let mut t = FrameTable::<u32>::new(2);
        let p = t.allocate(9, vpn(3)).unwrap();
        assert_eq!(p, pfn(0));

        let info = t.info(p);
        assert_eq!(info.owner, Some(9));
        assert_eq!(info.vpn, vpn(3));
        assert_eq!(info.pin_count, 1);
        assert_eq!(t.free_count(), 1);
        t.check_invariants().unwrap();
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let mut t = FrameTable::<u32>::new(1);
        assert!(t.allocate(1, vpn(0)).is_some());
        assert!(t.allocate(1, vpn(1)).is_none());
    }

    #[test]
    fn freshly_allocated_frames_are_not_victims() {
        let mut t = FrameTable::<u32>::new(2);
        let a = t.allocate(1, vpn(0)).unwrap();
        let b = t.allocate(1, vpn(1)).unwrap();
        assert_eq!(t.select_victim(), None);

        t.unpin(b);
        assert_eq!(t.select_victim(), Some(b));
        t.unpin(a);
    }

    #[test]
    fn release_returns_frame_for_reuse() {
        let mut t = FrameTable::<u32>::new(3);
        let a = t.allocate(1, vpn(0)).unwrap();
        t.unpin(a);
        t.release(a);
        assert!(t.info(a).is_free());
        assert_eq!(t.allocate(2, vpn(5)), Some(a));
        t.check_invariants().unwrap();
    }

    #[test]
    #[should_panic(expected = "released while pinned")]
    fn releasing_a_pinned_frame_panics() {
        let mut t = FrameTable::<u32>::new(1);
        let a = t.allocate(1, vpn(0)).unwrap();
        t.release(a);
    }

    #[test]
    #[should_panic(expected = "released while free")]
    fn releasing_a_free_frame_panics() {
        let mut t = FrameTable::<u32>::new(1);
        t.release(pfn(0));
    }

    #[test]
    fn pins_nest() {
        let mut t = FrameTable::<u32>::new(1);
        let a = t.allocate(1, vpn(0)).unwrap();
        t.pin(a);
        t.unpin(a);
        assert!(t.info(a).is_pinned());
        t.unpin(a);
        assert!(!t.info(a).is_pinned());
    }

    #[test]
    fn last_unpin_wakes_exactly_one_waiter() {
        let mut t = FrameTable::<u32>::new(1);
        let a = t.allocate(1, vpn(0)).unwrap();
        t.enqueue_waiter(Parker::for_current());
        t.enqueue_waiter(Parker::for_current());
        t.pin(a);

        assert!(!t.unpin(a));
        assert_eq!(t.waiting(), 2);
        assert!(t.unpin(a));
        assert_eq!(t.waiting(), 1);
    }

    #[test]
    fn frames_owned_by_lists_only_that_owner() {
        let mut t = FrameTable::<u32>::new(3);
        t.allocate(1, vpn(0)).unwrap();
        t.allocate(2, vpn(0)).unwrap();
        t.allocate(1, vpn(4)).unwrap();
        assert_eq!(t.frames_owned_by(1), [(pfn(0), vpn(0)), (pfn(2), vpn(4))]);
        assert!(t.frames_owned_by(3).is_empty());
    }

    #[test]
    fn invariant_checker_flags_a_leak() {
        let mut t = FrameTable::<u32>::new(2);
        let a = t.allocate(1, vpn(0)).unwrap();
        t.directory.clear(a);
        assert_eq!(t.check_invariants(), Err(FrameTableError::LeakedFrame(a)));
    }
}
