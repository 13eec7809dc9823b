//! # Processes and pagers
//!
//! A [`Process`] owns its page table and the layout of its address space. The
//! frame directory refers back to it only by [`ProcessId`], looked up in the
//! kernel's registry.
//!
//! How pages get populated is decided once at spawn by the [`PagingMode`]:
//!
//! | Mode     | At spawn                          | On fault         |
//! |----------|-----------------------------------|------------------|
//! | `Eager`  | every page faulted in up front    | demand load      |
//! | `Demand` | nothing, every entry invalid      | demand load      |
//!
//! An eagerly loaded process can still fault later, once memory pressure from
//! other processes has evicted some of its pages.

use crate::error::VmError;
use crate::kernel::VmKernel;
use crate::loader::{ExecutableImage, ImageLayout};
use core::fmt;
use kernel_memory_addresses::{PhysicalFrameNumber, VirtualAddress, VirtualPageNumber};
use kernel_sync::{SpinLock, SpinLockGuard};
use kernel_vmem::{PageTable, PageTableEntry};
use std::sync::Arc;

/// Identity of a process as recorded in the frame directory.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ProcessId(u32);

impl ProcessId {
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
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID({})", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Capability interface of a paging variant.
pub trait Pager: Send + Sync {
    /// Prepare the address space right after the process is registered.
    ///
    /// # Errors
    /// Whatever populating pages can fail with.
    fn load_sections(&self, kernel: &VmKernel, process: &Process) -> Result<(), VmError>;

    /// Service a fault on `vpn`.
    ///
    /// # Errors
    /// See [`VmKernel::handle_fault`].
    fn handle_fault(&self, kernel: &VmKernel, process: &Process, vpn: VirtualPageNumber) -> Result<(), VmError> {
        kernel.fault_in(process, vpn)
    }

    /// Owner-side half of an eviction: drop the mapping, hand back the entry.
    fn invalidate(&self, table: &mut PageTable, vpn: VirtualPageNumber) -> Option<PageTableEntry> {
        table.invalidate(vpn)
    }
}

/// Loads every page of the image when the process starts.
#[derive(Debug, Default, Copy, Clone)]
pub struct EagerPager;

impl Pager for EagerPager {
    fn load_sections(&self, kernel: &VmKernel, process: &Process) -> Result<(), VmError> {
        let needed = process.num_pages();
        let available = kernel.frame_count();
        if needed > available {
            log::debug!("{}: {needed} pages do not fit {available} frames", process.id());
            return Err(VmError::InsufficientMemory { needed, available });
        }
        for v in 0..needed {
            let vpn = VirtualPageNumber::new(u32::try_from(v).unwrap_or(u32::MAX));
            kernel.fault_in(process, vpn)?;
        }
        Ok(())
    }
}

/// Loads pages on first touch.
#[derive(Debug, Default, Copy, Clone)]
pub struct DemandPager;

impl Pager for DemandPager {
    fn load_sections(&self, _kernel: &VmKernel, process: &Process) -> Result<(), VmError> {
        log::trace!("{}: {} pages left to demand paging", process.id(), process.num_pages());
        Ok(())
    }
}

/// Selects the [`Pager`] of a new process.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum PagingMode {
    Eager,
    #[default]
    Demand,
}

impl PagingMode {
    #[must_use]
    pub const fn pager(self) -> &'static dyn Pager {
        match self {
            Self::Eager => &EagerPager,
            Self::Demand => &DemandPager,
        }
    }
}

/// A user process as seen by the memory manager.
pub struct Process {
    id: ProcessId,
    image: Arc<dyn ExecutableImage>,
    layout: ImageLayout,
    page_table: SpinLock<PageTable>,
    mode: PagingMode,
    argc: usize,
    argv: VirtualAddress,
}

impl Process {
    /// A process with every page invalid and read-only sections marked.
    pub(crate) fn new(
        id: ProcessId,
        image: Arc<dyn ExecutableImage>,
        layout: ImageLayout,
        mode: PagingMode,
        argc: usize,
    ) -> Result<Self, VmError> {
        let mut table = PageTable::new(layout.num_pages());
        for section in (0..image.sections().len()).filter(|&i| image.is_read_only(i)) {
            for vpn in layout.section_pages(section) {
                table.set_read_only(vpn, true)?;
            }
        }
        let argv = layout.argument_page().base();
        Ok(Self {
            id,
            image,
            layout,
            page_table: SpinLock::new(table),
            mode,
            argc,
            argv,
        })
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> ProcessId {
        self.id
    }

    #[must_use]
    pub fn image(&self) -> &dyn ExecutableImage {
        self.image.as_ref()
    }

    #[must_use]
    pub const fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    #[must_use]
    pub const fn num_pages(&self) -> usize {
        self.layout.num_pages()
    }

    #[must_use]
    pub const fn paging_mode(&self) -> PagingMode {
        self.mode
    }

    #[must_use]
    pub const fn pager(&self) -> &'static dyn Pager {
        self.mode.pager()
    }

    #[must_use]
    pub fn entry_point(&self) -> VirtualAddress {
        self.image.entry_point()
    }

    #[must_use]
    pub const fn initial_stack_pointer(&self) -> VirtualAddress {
        self.layout.stack_top()
    }

    #[must_use]
    pub const fn argc(&self) -> usize {
        self.argc
    }

    /// Address of the `argv` pointer table.
    #[must_use]
    pub const fn argv(&self) -> VirtualAddress {
        self.argv
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, vpn: VirtualPageNumber) -> bool {
        vpn.as_usize() < self.layout.num_pages()
    }

    /// Current translation of `vpn`.
    #[must_use]
    pub fn translate(&self, vpn: VirtualPageNumber) -> Option<PhysicalFrameNumber> {
        self.page_table.lock().translate(vpn)
    }

    /// Current entry of `vpn`.
    #[must_use]
    pub fn entry(&self, vpn: VirtualPageNumber) -> Option<PageTableEntry> {
        self.page_table.lock().entry(vpn)
    }

    #[must_use]
    pub fn resident_pages(&self) -> usize {
        self.page_table.lock().resident_count()
    }

    pub(crate) fn page_table(&self) -> SpinLockGuard<'_, PageTable> {
        self.page_table.lock()
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("pages", &self.layout.num_pages())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
