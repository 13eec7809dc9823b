use kernel_info::memory::{DEFAULT_FRAME_COUNT, STACK_PAGES};

/// Runtime parameters of the memory manager.
///
/// ### Example
/// ```rust
/// # use kernel_vm::VmConfig;
/// let config = VmConfig::default().with_frame_count(4).with_stack_pages(2);
/// assert_eq!(config.frame_count, 4);
/// assert!(config.reference_on_install);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Frames in the shared physical pool.
    pub frame_count: usize,
    /// Zero-filled stack pages placed after the executable sections.
    pub stack_pages: usize,
    /// Initial second-chance bit of a freshly installed frame.
    ///
    /// With `true`, a page that was just faulted in survives one clock pass
    /// before it can be chosen.
    pub reference_on_install: bool,
}

impl VmConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frame_count: DEFAULT_FRAME_COUNT,
            stack_pages: STACK_PAGES,
            reference_on_install: true,
        }
    }

    #[must_use]
    pub const fn with_frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = frame_count;
        self
    }

    #[must_use]
    pub const fn with_stack_pages(mut self, stack_pages: usize) -> Self {
        self.stack_pages = stack_pages;
        self
    }

    #[must_use]
    pub const fn with_reference_on_install(mut self, referenced: bool) -> Self {
        self.reference_on_install = referenced;
        self
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self::new()
    }
}
