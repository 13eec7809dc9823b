//! Simulated physical memory.
//!
//! Each frame sits behind its own lock so copies into different frames run
//! in parallel. Callers pin a frame before touching its bytes; the lock only
//! serializes concurrent copies into the same pinned frame.

use kernel_memory_addresses::{PAGE_SIZE, PageOffset, PhysicalFrameNumber};
use kernel_sync::{SpinLock, SpinLockGuard};

pub struct PhysicalMemory {
    frames: Vec<SpinLock<Box<[u8]>>>,
}

impl PhysicalMemory {
    /// `frame_count` zeroed frames.
    #[must_use]
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: (0..frame_count)
                .map(|_| SpinLock::new(vec![0; PAGE_SIZE].into_boxed_slice()))
                .collect(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Lock one frame for direct access.
    ///
    /// # Panics
    /// If `pfn` is out of range.
    pub fn frame(&self, pfn: PhysicalFrameNumber) -> SpinLockGuard<'_, Box<[u8]>> {
        self.frames[pfn.as_usize()].lock()
    }

    /// Copy `dst.len()` bytes out of `pfn` starting at `offset`.
    ///
    /// # Panics
    /// If the range crosses the end of the frame.
    pub fn read(&self, pfn: PhysicalFrameNumber, offset: PageOffset, dst: &mut [u8]) {
        let start = offset.as_usize();
        dst.copy_from_slice(&self.frame(pfn)[start..start + dst.len()]);
    }

    /// Copy `src` into `pfn` starting at `offset`.
    ///
    /// # Panics
    /// If the range crosses the end of the frame.
    pub fn write(&self, pfn: PhysicalFrameNumber, offset: PageOffset, src: &[u8]) {
        let start = offset.as_usize();
        self.frame(pfn)[start..start + src.len()].copy_from_slice(src);
    }

    pub fn zero(&self, pfn: PhysicalFrameNumber) {
        self.frame(pfn).fill(0);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frames_are_independent() {
        let mem = PhysicalMemory::new(2);
        mem.write(PhysicalFrameNumber::new(1), PageOffset::new(4), b"abc");

        let mut buf = [0u8; 3];
        mem.read(PhysicalFrameNumber::new(1), PageOffset::new(4), &mut buf);
        assert_eq!(&buf, b"abc");

        mem.read(PhysicalFrameNumber::new(0), PageOffset::new(4), &mut buf);
        assert_eq!(buf, [0; 3]);
    }

    #[test]
    fn zero_clears_the_whole_frame() {
        let mem = PhysicalMemory::new(1);
        let pfn = PhysicalFrameNumber::new(0);
        mem.frame(pfn).fill(0xAA);
        mem.zero(pfn);
        assert!(mem.frame(pfn).iter().all(|&b| b == 0));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn copy_past_frame_end_panics() {
        let mem = PhysicalMemory::new(1);
        mem.write(PhysicalFrameNumber::new(0), PageOffset::new(PAGE_SIZE - 1), b"xy");
    }
}
