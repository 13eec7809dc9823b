//! # The memory-manager kernel object
//!
//! [`VmKernel`] ties the frame pool, the physical memory, the swap store and
//! the process registry together. Its lifetime is the kernel's: created at
//! boot, dropped at shutdown.
//!
//! ## Locks
//!
//! Taken strictly in this order, never the reverse:
//!
//! 1. the pool lock ([`FramePool`]: frame table and statistics),
//! 2. the process registry,
//! 3. a process's page table,
//! 4. one frame of physical memory.
//!
//! Byte copies into user memory hold only (4), with the frame pinned.

use crate::config::VmConfig;
use crate::error::{InvariantError, VmError};
use crate::loader::{ExecutableImage, ImageLayout};
use crate::process::{PagingMode, Process, ProcessId};
use crate::swap::SwapStore;
use core::sync::atomic::{AtomicU32, Ordering};
use kernel_alloc::{FrameInfo, FrameTable, PhysicalMemory};
use kernel_info::memory::{ARGV_POINTER_SIZE, MAX_ARGUMENT_BYTES};
use kernel_memory_addresses::{PhysicalFrameNumber, VirtualAddress};
use kernel_sync::SpinLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Counters kept under the pool lock.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VmStats {
    /// Faults that had to bring a page in.
    pub faults: u64,
    /// Frames taken away from their owner by the clock.
    pub evictions: u64,
    pub swap_writes: u64,
    pub swap_reads: u64,
    /// Times a thread parked because every frame was pinned.
    pub blocks: u64,
}

/// State behind the pool lock.
pub(crate) struct FramePool {
    pub(crate) frames: FrameTable<ProcessId>,
    pub(crate) stats: VmStats,
}

/// The demand-paged memory manager.
pub struct VmKernel {
    pub(crate) config: VmConfig,
    pub(crate) pool: SpinLock<FramePool>,
    pub(crate) processes: SpinLock<BTreeMap<ProcessId, Arc<Process>>>,
    pub(crate) memory: PhysicalMemory,
    pub(crate) swap: Arc<dyn SwapStore>,
    next_pid: AtomicU32,
}

impl VmKernel {
    /// Boot the memory manager: all frames free, clock hand at frame 0.
    ///
    /// # Panics
    /// If `config.frame_count` is zero.
    #[must_use]
    pub fn new(config: VmConfig, swap: Arc<dyn SwapStore>) -> Self {
        assert!(config.frame_count > 0, "memory manager needs at least one frame");
        log::info!(
            "vm: {} frames, {} stack pages, reference on install: {}",
            config.frame_count,
            config.stack_pages,
            config.reference_on_install
        );
        Self {
            config,
            pool: SpinLock::new(FramePool {
                frames: FrameTable::new(config.frame_count),
                stats: VmStats::default(),
            }),
            processes: SpinLock::new(BTreeMap::new()),
            memory: PhysicalMemory::new(config.frame_count),
            swap,
            next_pid: AtomicU32::new(1),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &VmConfig {
        &self.config
    }

    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.config.frame_count
    }

    /// Create a process for `image`, write `args` into its argument page and
    /// prepare its pages according to `mode`.
    ///
    /// # Errors
    /// - [`VmError::FragmentedExecutable`] for sections not contiguous from page 0.
    /// - [`VmError::ArgumentsTooLong`] if `args` do not fit the argument page.
    /// - [`VmError::InsufficientMemory`] for an eager image larger than physical memory.
    /// - Any fault error while preparing pages or writing `args`.
    pub fn spawn(
        &self,
        image: Arc<dyn ExecutableImage>,
        args: &[&str],
        mode: PagingMode,
    ) -> Result<Arc<Process>, VmError> {
        let layout = ImageLayout::new(image.sections(), self.config.stack_pages)?;

        let args_size: usize = args.iter().map(|a| ARGV_POINTER_SIZE + a.len() + 1).sum();
        if args_size > MAX_ARGUMENT_BYTES {
            return Err(VmError::ArgumentsTooLong(args_size));
        }

        let pid = ProcessId::new(self.next_pid.fetch_add(1, Ordering::Relaxed));
        let process = Arc::new(Process::new(pid, image, layout, mode, args.len())?);
        {
            let _pool = self.pool.lock();
            self.processes.lock().insert(pid, Arc::clone(&process));
        }

        if let Err(e) = self.prepare(&process, args) {
            log::info!("{pid}: spawn failed: {e}");
            self.release_all_frames(&process);
            return Err(e);
        }

        log::info!(
            "{pid}: spawned, {} pages, {mode:?} paging, entry {}, sp {}",
            process.num_pages(),
            process.entry_point(),
            process.initial_stack_pointer()
        );
        Ok(process)
    }

    /// Load sections and lay out `argv`: a table of little-endian `u32`
    /// pointers followed by the NUL-terminated strings.
    fn prepare(&self, process: &Process, args: &[&str]) -> Result<(), VmError> {
        process.pager().load_sections(self, process)?;

        let table = process.argv();
        let mut strings = table
            .checked_add(args.len() * ARGV_POINTER_SIZE)
            .ok_or(VmError::ArgumentsTooLong(args.len() * ARGV_POINTER_SIZE))?;
        for (i, arg) in args.iter().enumerate() {
            let slot = table
                .checked_add(i * ARGV_POINTER_SIZE)
                .ok_or(VmError::ArgumentsTooLong(i * ARGV_POINTER_SIZE))?;
            self.write_all(process, slot, &strings.as_u32().to_le_bytes())?;

            let mut bytes = Vec::with_capacity(arg.len() + 1);
            bytes.extend_from_slice(arg.as_bytes());
            bytes.push(0);
            self.write_all(process, strings, &bytes)?;
            strings = strings
                .checked_add(bytes.len())
                .ok_or(VmError::ArgumentsTooLong(bytes.len()))?;
        }
        Ok(())
    }

    fn write_all(&self, process: &Process, vaddr: VirtualAddress, bytes: &[u8]) -> Result<(), VmError> {
        let written = self.write_virtual_memory(process, vaddr, bytes)?;
        if written == bytes.len() {
            Ok(())
        } else {
            Err(VmError::SegmentationFault {
                pid: process.id(),
                vpn: vaddr.page(),
            })
        }
    }

    /// Tear down the memory of `process`: unregister it, return all its frames
    /// to the free list and drop its swap copies.
    ///
    /// Wakes one waiter per released frame. Calling it twice is harmless.
    ///
    /// # Panics
    /// If one of the frames is still pinned, i.e. a copy into this process is
    /// still in flight.
    pub fn release_all_frames(&self, process: &Process) {
        let pid = process.id();
        let mut pool = self.pool.lock();
        self.processes.lock().remove(&pid);

        let owned = pool.frames.frames_owned_by(pid);
        {
            let mut table = process.page_table();
            for &(pfn, vpn) in &owned {
                table.invalidate(vpn);
                pool.frames.release(pfn);
                pool.frames.wake_one();
            }
        }
        drop(pool);

        self.swap.discard(pid);
        log::info!("{pid}: released {} frames", owned.len());
    }

    /// Take `victim` away from its owner and put it on the free list.
    ///
    /// A dirty page is saved to swap first. If that fails the mapping is put
    /// back as it was and the frame stays with its owner.
    pub(crate) fn evict(&self, pool: &mut FramePool, victim: PhysicalFrameNumber) -> Result<(), VmError> {
        let info = pool.frames.info(victim);
        let Some(owner) = info.owner else {
            panic!("clock chose free {victim}");
        };
        assert!(!info.is_pinned(), "clock chose pinned {victim}");

        let Some(process) = self.processes.lock().get(&owner).cloned() else {
            panic!("{victim} owned by unregistered {owner}");
        };

        {
            let mut table = process.page_table();
            let old = process.pager().invalidate(&mut table, info.vpn);
            let Some(old) = old.filter(|e| e.frame() == Some(victim)) else {
                panic!("{owner} {} does not map {victim}", info.vpn);
            };

            if old.is_dirty() {
                let stored = self.swap.store(owner, info.vpn, &self.memory.frame(victim));
                if let Err(e) = stored {
                    log::debug!("evicting {victim} ({owner} {}) failed: {e}", info.vpn);
                    table.restore(info.vpn, old)?;
                    return Err(e.into());
                }
                pool.stats.swap_writes += 1;
            }
            log::debug!(
                "evicted {owner} {} from {victim}{}",
                info.vpn,
                if old.is_dirty() { " to swap" } else { "" }
            );
        }

        pool.frames.release(victim);
        pool.stats.evictions += 1;
        Ok(())
    }

    /// Frames on the free list.
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.pool.lock().frames.free_count()
    }

    /// Threads parked waiting for an unpinned frame.
    #[must_use]
    pub fn blocked_threads(&self) -> usize {
        self.pool.lock().frames.waiting()
    }

    /// Directory entry of `pfn`, or `None` past the last frame.
    #[must_use]
    pub fn frame_info(&self, pfn: PhysicalFrameNumber) -> Option<FrameInfo<ProcessId>> {
        (pfn.as_usize() < self.frame_count()).then(|| self.pool.lock().frames.info(pfn))
    }

    /// Position of the clock hand.
    #[must_use]
    pub fn clock_hand(&self) -> usize {
        self.pool.lock().frames.clock_hand()
    }

    #[must_use]
    pub fn stats(&self) -> VmStats {
        self.pool.lock().stats
    }

    /// Registered process by id.
    #[must_use]
    pub fn process(&self, pid: ProcessId) -> Option<Arc<Process>> {
        let _pool = self.pool.lock();
        self.processes.lock().get(&pid).cloned()
    }

    /// Verify that the frame directory and all page tables agree.
    ///
    /// Every frame is free or owned by exactly one registered process, and
    /// that process maps the recorded page to it. Every valid entry of every
    /// registered process points at a frame attributed to that page.
    ///
    /// # Errors
    /// The first disagreement found.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let pool = self.pool.lock();
        pool.frames.check_invariants()?;

        let processes = self.processes.lock();
        for i in 0..pool.frames.frame_count() {
            let pfn = PhysicalFrameNumber::from_index(i);
            let info = pool.frames.info(pfn);
            let Some(owner) = info.owner else { continue };
            let process = processes
                .get(&owner)
                .ok_or(InvariantError::UnknownOwner { pfn, owner })?;
            if process.page_table().translate(info.vpn) != Some(pfn) {
                return Err(InvariantError::StaleDirectoryEntry {
                    pfn,
                    owner,
                    vpn: info.vpn,
                });
            }
        }

        for (&owner, process) in processes.iter() {
            for (vpn, pfn) in process.page_table().resident() {
                let info = pool.frames.info(pfn);
                if info.owner != Some(owner) || info.vpn != vpn {
                    return Err(InvariantError::StaleMapping { pfn, owner, vpn });
                }
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for VmKernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VmKernel")
            .field("config", &self.config)
            .field("pool", &self.pool.lock().frames)
            .finish_non_exhaustive()
    }
}
