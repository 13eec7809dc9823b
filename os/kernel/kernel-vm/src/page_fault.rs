//! # Page-fault handling
//!
//! A fault walks a fixed sequence of states:
//!
//! ```text
//! Miss ──► AcquireFrame ──► Populate ──► Install ──► Ready
//!              │   ▲
//!   all pinned │   │ woken by unpin
//!              ▼   │
//!            (parked)
//! ```
//!
//! Everything from `AcquireFrame` to `Install` runs under the pool lock. The
//! only exit from the lock in between is parking, and a parked thread starts
//! over from the translation: by the time it wakes, another thread may have
//! faulted the page in, or the process may have lost frames to eviction.

use crate::accessor::{AccessKind, PinnedFrame};
use crate::error::VmError;
use crate::kernel::{FramePool, VmKernel};
use crate::loader::PageSource;
use crate::process::Process;
use core::fmt;
use kernel_memory_addresses::{PhysicalFrameNumber, VirtualPageNumber};
use kernel_sync::Parker;

/// Progress of one page fault.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FaultState {
    /// The translation came back invalid.
    Miss,
    /// Looking for a frame: free list, then clock.
    AcquireFrame,
    /// Filling the frame from swap, the executable or with zeroes.
    Populate,
    /// Publishing the mapping in the page table and the directory.
    Install,
    /// The page is resident and pinned for the caller.
    Ready,
}

impl fmt::Display for FaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Miss => "miss",
            Self::AcquireFrame => "acquire frame",
            Self::Populate => "populate",
            Self::Install => "install",
            Self::Ready => "ready",
        })
    }
}

/// Outcome of the acquire step.
enum Acquired {
    Frame(PhysicalFrameNumber),
    AllPinned,
}

impl VmKernel {
    /// Trap entry for an invalid-translation fault on `vpn`.
    ///
    /// Brings the page in if it is not resident. May park the calling thread
    /// until some frame is unpinned.
    ///
    /// # Errors
    /// - [`VmError::SegmentationFault`] if `vpn` lies outside the process.
    /// - [`VmError::ProcessExited`] once the memory of the process was released.
    /// - [`VmError::Load`] / [`VmError::Swap`] if the page content cannot be
    ///   produced or a victim cannot be saved.
    pub fn handle_fault(&self, process: &Process, vpn: VirtualPageNumber) -> Result<(), VmError> {
        process.pager().handle_fault(self, process, vpn)
    }

    /// Make `vpn` resident without keeping it pinned.
    ///
    /// The building block of [`Pager`](crate::Pager) implementations.
    ///
    /// # Errors
    /// As [`handle_fault`](Self::handle_fault).
    pub fn fault_in(&self, process: &Process, vpn: VirtualPageNumber) -> Result<(), VmError> {
        self.resolve(process, vpn, AccessKind::Read).map(drop)
    }

    /// Translate `vpn` and pin its frame, faulting the page in on a miss.
    ///
    /// The permission check happens before any frame is acquired, so a write
    /// to a read-only page never populates it. A process that was torn down
    /// while this thread was parked gets no frame.
    pub(crate) fn resolve(
        &self,
        process: &Process,
        vpn: VirtualPageNumber,
        kind: AccessKind,
    ) -> Result<PinnedFrame<'_>, VmError> {
        let pid = process.id();
        loop {
            let mut pool = self.pool.lock();
            if !self.processes.lock().contains_key(&pid) {
                return Err(VmError::ProcessExited(pid));
            }

            let entry = process
                .page_table()
                .entry(vpn)
                .ok_or(VmError::SegmentationFault { pid, vpn })?;
            if kind.is_write() && entry.is_read_only() {
                return Err(VmError::ReadOnlyViolation { pid, vpn });
            }
            if let Some(pfn) = entry.frame() {
                pool.frames.pin(pfn);
                pool.frames.set_referenced(pfn, true);
                return Ok(PinnedFrame::new(self, pfn, vpn));
            }

            log::trace!("{pid} {vpn}: {}", FaultState::Miss);
            log::trace!("{pid} {vpn}: {}", FaultState::AcquireFrame);
            let pfn = match self.acquire_frame(&mut pool, process, vpn)? {
                Acquired::Frame(pfn) => pfn,
                Acquired::AllPinned => {
                    let parker = Parker::for_current();
                    pool.frames.enqueue_waiter(parker.clone());
                    pool.stats.blocks += 1;
                    drop(pool);
                    log::info!("{pid} {vpn}: every frame is pinned, waiting");
                    parker.park();
                    log::trace!("{pid} {vpn}: woken, retrying");
                    continue;
                }
            };

            log::trace!("{pid} {vpn}: {} {pfn}", FaultState::Populate);
            if let Err(e) = self.populate(&mut pool, process, vpn, pfn) {
                pool.frames.unpin(pfn);
                pool.frames.release(pfn);
                return Err(e);
            }

            log::trace!("{pid} {vpn}: {}", FaultState::Install);
            let referenced = self.config.reference_on_install;
            if let Err(e) = process.page_table().install(vpn, pfn, referenced) {
                pool.frames.unpin(pfn);
                pool.frames.release(pfn);
                return Err(e.into());
            }
            pool.frames.set_referenced(pfn, referenced);
            pool.stats.faults += 1;

            log::trace!("{pid} {vpn}: {} in {pfn}", FaultState::Ready);
            // The allocation pin now belongs to the caller.
            return Ok(PinnedFrame::new(self, pfn, vpn));
        }
    }

    /// A pinned frame for `vpn` of `process`: a free one, else an evicted one.
    fn acquire_frame(
        &self,
        pool: &mut FramePool,
        process: &Process,
        vpn: VirtualPageNumber,
    ) -> Result<Acquired, VmError> {
        if let Some(pfn) = pool.frames.allocate(process.id(), vpn) {
            return Ok(Acquired::Frame(pfn));
        }
        let Some(victim) = pool.frames.select_victim() else {
            return Ok(Acquired::AllPinned);
        };
        self.evict(pool, victim)?;
        Ok(pool
            .frames
            .allocate(process.id(), vpn)
            .map_or(Acquired::AllPinned, Acquired::Frame))
    }

    /// Fill `pfn` with the content of `vpn`: the swap copy if there is one,
    /// else its executable section, else zeroes.
    fn populate(
        &self,
        pool: &mut FramePool,
        process: &Process,
        vpn: VirtualPageNumber,
        pfn: PhysicalFrameNumber,
    ) -> Result<(), VmError> {
        let mut frame = self.memory.frame(pfn);
        if self.swap.load(process.id(), vpn, &mut frame)? {
            pool.stats.swap_reads += 1;
            log::trace!("{} {vpn}: loaded from swap", process.id());
            return Ok(());
        }
        match process.layout().source(vpn) {
            Some(PageSource::Section { section, page }) => {
                process.image().load_page(section, page, &mut frame)?;
            }
            Some(PageSource::ZeroFill) => frame.fill(0),
            None => {
                return Err(VmError::SegmentationFault {
                    pid: process.id(),
                    vpn,
                });
            }
        }
        Ok(())
    }
}
