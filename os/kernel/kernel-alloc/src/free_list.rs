use kernel_memory_addresses::PhysicalFrameNumber;

/// The set of frames that have no owner.
///
/// Kept as a stack: the most recently released frame is handed out first,
/// and the initial fill yields frames lowest PFN first.
///
/// ```text
///  push(release) ──►┌─────┐
///                   │ pfn │ ◄── top, next to be allocated
///                   ├─────┤
///                   │ ... │
///                   └─────┘
/// ```
///
/// # Invariants
/// - A frame is on the list at most once (`on_list` mirrors membership).
/// - Every frame on the list is owner-less in the directory; the frame table
///   enforces this side.
pub struct FreeFrameList {
    stack: Vec<PhysicalFrameNumber>,
    on_list: Vec<bool>,
}

impl FreeFrameList {
    /// A list holding all `frame_count` frames.
    #[must_use]
    pub fn new(frame_count: usize) -> Self {
        Self {
            stack: (0..frame_count).rev().map(PhysicalFrameNumber::from_index).collect(),
            on_list: vec![true; frame_count],
        }
    }

    /// Take a frame off the list.
    pub fn pop(&mut self) -> Option<PhysicalFrameNumber> {
        let pfn = self.stack.pop()?;
        self.on_list[pfn.as_usize()] = false;
        Some(pfn)
    }

    /// Return a frame to the list.
    ///
    /// # Panics
    /// If the frame is already on the list (double free) or out of range.
    pub fn push(&mut self, pfn: PhysicalFrameNumber) {
        let slot = &mut self.on_list[pfn.as_usize()];
        assert!(!*slot, "{pfn} released twice");
        *slot = true;
        self.stack.push(pfn);
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, pfn: PhysicalFrameNumber) -> bool {
        self.on_list.get(pfn.as_usize()).copied().unwrap_or(false)
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Frames currently on the list, next-to-allocate first.
    pub fn iter(&self) -> impl Iterator<Item = PhysicalFrameNumber> + '_ {
        self.stack.iter().rev().copied()
    }
}
