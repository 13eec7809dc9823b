use crate::process::ProcessId;
use kernel_alloc::FrameTableError;
use kernel_memory_addresses::{PhysicalFrameNumber, VirtualPageNumber};
use kernel_vmem::PageTableError;

/// Failure of a memory-manager operation on behalf of a process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("segmentation fault: {vpn} is outside the address space of {pid}")]
    SegmentationFault { pid: ProcessId, vpn: VirtualPageNumber },
    #[error("{0} has released its memory")]
    ProcessExited(ProcessId),
    #[error("{pid} wrote to read-only {vpn}")]
    ReadOnlyViolation { pid: ProcessId, vpn: VirtualPageNumber },
    #[error("insufficient physical memory: {needed} pages requested, {available} available")]
    InsufficientMemory { needed: usize, available: usize },
    #[error("failed to load page content: {0}")]
    Load(#[from] LoadError),
    #[error("swap store failure: {0}")]
    Swap(#[from] SwapError),
    #[error("argument block of {0} bytes does not fit the argument page")]
    ArgumentsTooLong(usize),
    #[error("section {section} starts at {found}, expected {expected}")]
    FragmentedExecutable {
        section: usize,
        expected: VirtualPageNumber,
        found: VirtualPageNumber,
    },
    #[error(transparent)]
    PageTable(#[from] PageTableError),
}

/// Failure of the executable loader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("no section {0}")]
    NoSuchSection(usize),
    #[error("section {section} has no page {page}")]
    PageOutOfRange { section: usize, page: usize },
}

/// Failure of the swap store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("swap store is full ({capacity} slots)")]
    Full { capacity: usize },
    #[error("frame buffer of {0} bytes is not one page")]
    BadFrameSize(usize),
}

/// A broken cross-structure invariant, as found by
/// [`VmKernel::check_invariants`](crate::VmKernel::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantError {
    #[error(transparent)]
    FrameTable(#[from] FrameTableError),
    #[error("{pfn} is owned by {owner}, which is not registered")]
    UnknownOwner { pfn: PhysicalFrameNumber, owner: ProcessId },
    #[error("{pfn} records {owner} {vpn}, but that page does not map it")]
    StaleDirectoryEntry {
        pfn: PhysicalFrameNumber,
        owner: ProcessId,
        vpn: VirtualPageNumber,
    },
    #[error("{owner} {vpn} maps {pfn}, which the directory gives to someone else")]
    StaleMapping {
        pfn: PhysicalFrameNumber,
        owner: ProcessId,
        vpn: VirtualPageNumber,
    },
}
