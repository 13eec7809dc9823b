use crate::frame_directory::FrameOwnerDirectory;
use kernel_memory_addresses::PhysicalFrameNumber;

/// Second-chance (clock) victim selection over the frame directory.
///
/// The hand starts at frame 0 and only ever moves forward, wrapping at the
/// frame count. One sweep visits each frame at most once:
///
/// | Frame state             | Action                                        |
/// |-------------------------|-----------------------------------------------|
/// | free or pinned          | skip, `referenced` untouched                  |
/// | unpinned, unreferenced  | victim, stop                                  |
/// | unpinned, referenced    | clear `referenced`, remember the first one    |
///
/// A sweep that finds no victim falls back to the first remembered frame.
/// Only when every frame is pinned does the sweep come back empty.
#[derive(Debug, Default)]
pub struct ClockEvictionPolicy {
    cursor: usize,
}

impl ClockEvictionPolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Position the next sweep starts at.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Run one sweep and return the victim, leaving the hand just past it.
    pub fn select_victim<O: Copy>(
        &mut self,
        directory: &mut FrameOwnerDirectory<O>,
    ) -> Option<PhysicalFrameNumber> {
        let n = directory.len();
        if n == 0 {
            return None;
        }

        let mut victim = None;
        let mut candidate = None;
        for step in 0..n {
            let pfn = PhysicalFrameNumber::from_index((self.cursor + step) % n);
            let info = directory.get_mut(pfn);
            if info.is_free() || info.is_pinned() {
                continue;
            }
            if !info.referenced {
                victim = Some(pfn);
                break;
            }
            info.referenced = false;
            candidate.get_or_insert(pfn);
        }

        let chosen = victim.or(candidate)?;
        self.cursor = (chosen.as_usize() + 1) % n;
        Some(chosen)
    }
}
