//! # Copying between kernel buffers and user memory
//!
//! A copy walks the virtual range one page at a time. Each page is resolved
//! (faulting it in if needed) and pinned, copied, marked referenced and, for
//! writes, dirty, then unpinned before the next page is touched. The pin
//! keeps the evictor away from the frame for exactly the duration of that
//! page's copy.

use crate::error::VmError;
use crate::kernel::VmKernel;
use crate::process::Process;
use core::fmt;
use core::ops::Range;
use kernel_memory_addresses::{PhysicalFrameNumber, VirtualAddress, VirtualPageNumber};

/// Direction of a user-memory access.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    #[inline]
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Write)
    }
}

/// A resident frame that cannot be evicted while this guard lives.
///
/// Dropping the guard unpins the frame and, if that was the last pin, wakes
/// one thread waiting for a frame.
#[must_use = "dropping the guard unpins the frame immediately"]
pub struct PinnedFrame<'k> {
    kernel: &'k VmKernel,
    pfn: PhysicalFrameNumber,
    vpn: VirtualPageNumber,
}

impl<'k> PinnedFrame<'k> {
    pub(crate) const fn new(kernel: &'k VmKernel, pfn: PhysicalFrameNumber, vpn: VirtualPageNumber) -> Self {
        Self { kernel, pfn, vpn }
    }

    #[inline]
    #[must_use]
    pub const fn pfn(&self) -> PhysicalFrameNumber {
        self.pfn
    }

    #[inline]
    #[must_use]
    pub const fn vpn(&self) -> VirtualPageNumber {
        self.vpn
    }
}

impl Drop for PinnedFrame<'_> {
    fn drop(&mut self) {
        self.kernel.pool.lock().frames.unpin(self.pfn);
    }
}

impl fmt::Debug for PinnedFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedFrame")
            .field("pfn", &self.pfn)
            .field("vpn", &self.vpn)
            .finish()
    }
}

impl VmKernel {
    /// Make `vpn` resident and pin it until the returned guard is dropped.
    ///
    /// # Errors
    /// - [`VmError::SegmentationFault`] if `vpn` lies outside the process.
    /// - [`VmError::ReadOnlyViolation`] when pinning a read-only page for writing.
    /// - Load and swap failures of the fault path.
    pub fn pin_page(
        &self,
        process: &Process,
        vpn: VirtualPageNumber,
        kind: AccessKind,
    ) -> Result<PinnedFrame<'_>, VmError> {
        self.resolve(process, vpn, kind)
    }

    /// Copy `length` bytes between `buffer[offset..]` and user memory at
    /// `vaddr`, in the direction given by `kind`.
    ///
    /// Returns the number of bytes transferred. The copy stops early, without
    /// error, at the first page outside the address space.
    ///
    /// # Errors
    /// - [`VmError::ReadOnlyViolation`] when writing to a read-only page.
    /// - Load and swap failures of the fault path.
    ///
    /// # Panics
    /// If `offset + length` exceeds `buffer.len()`.
    pub fn access_memory(
        &self,
        process: &Process,
        vaddr: VirtualAddress,
        buffer: &mut [u8],
        offset: usize,
        length: usize,
        kind: AccessKind,
    ) -> Result<usize, VmError> {
        assert!(
            offset.checked_add(length).is_some_and(|end| end <= buffer.len()),
            "buffer range {offset}+{length} exceeds {} bytes",
            buffer.len()
        );
        let buffer = &mut buffer[offset..offset + length];
        match kind {
            AccessKind::Read => self.transfer(process, vaddr, length, kind, |frame, r| {
                buffer[r].copy_from_slice(frame);
            }),
            AccessKind::Write => self.transfer(process, vaddr, length, kind, |frame, r| {
                frame.copy_from_slice(&buffer[r]);
            }),
        }
    }

    /// Fill `data` from user memory at `vaddr`.
    ///
    /// # Errors
    /// See [`access_memory`](Self::access_memory).
    pub fn read_virtual_memory(&self, process: &Process, vaddr: VirtualAddress, data: &mut [u8]) -> Result<usize, VmError> {
        let len = data.len();
        self.transfer(process, vaddr, len, AccessKind::Read, |frame, r| {
            data[r].copy_from_slice(frame);
        })
    }

    /// Copy `data` into user memory at `vaddr`.
    ///
    /// # Errors
    /// See [`access_memory`](Self::access_memory).
    pub fn write_virtual_memory(&self, process: &Process, vaddr: VirtualAddress, data: &[u8]) -> Result<usize, VmError> {
        self.transfer(process, vaddr, data.len(), AccessKind::Write, |frame, r| {
            frame.copy_from_slice(&data[r]);
        })
    }

    /// Read a NUL-terminated string of at most `max_len` bytes at `vaddr`.
    ///
    /// Returns `None` if no terminator appears within `max_len + 1` bytes or
    /// before the end of the address space. Invalid UTF-8 is replaced.
    ///
    /// # Errors
    /// See [`access_memory`](Self::access_memory).
    pub fn read_virtual_memory_string(
        &self,
        process: &Process,
        vaddr: VirtualAddress,
        max_len: usize,
    ) -> Result<Option<String>, VmError> {
        let remaining = VirtualPageNumber::bytes(process.num_pages()).saturating_sub(vaddr.as_usize());
        let mut bytes = vec![0; max_len.saturating_add(1).min(remaining)];
        let read = self.read_virtual_memory(process, vaddr, &mut bytes)?;
        Ok(bytes[..read]
            .iter()
            .position(|&b| b == 0)
            .map(|end| String::from_utf8_lossy(&bytes[..end]).into_owned()))
    }

    /// Page-by-page driver shared by all copies.
    ///
    /// `copy` receives the frame bytes of one page piece and the matching
    /// range of the caller's buffer.
    fn transfer(
        &self,
        process: &Process,
        vaddr: VirtualAddress,
        length: usize,
        kind: AccessKind,
        mut copy: impl FnMut(&mut [u8], Range<usize>),
    ) -> Result<usize, VmError> {
        let mut done = 0;
        let mut va = vaddr;
        while done < length {
            let (vpn, off) = va.split();
            if !process.contains(vpn) {
                log::trace!("{} {kind:?} stopped at {va} after {done} bytes", process.id());
                break;
            }
            let amount = (length - done).min(off.remaining());

            let pinned = self.resolve(process, vpn, kind)?;
            {
                let mut frame = self.memory.frame(pinned.pfn());
                copy(
                    &mut frame[off.as_usize()..off.as_usize() + amount],
                    done..done + amount,
                );
            }
            process.page_table().mark_access(vpn, kind.is_write());
            drop(pinned);

            done += amount;
            match va.checked_add(amount) {
                Some(next) => va = next,
                None => break,
            }
        }
        Ok(done)
    }
}
