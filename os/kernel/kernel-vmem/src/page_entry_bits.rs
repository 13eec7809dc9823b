use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalFrameNumber;

/// Largest frame number an entry can encode.
pub const MAX_ENTRY_PFN: u32 = (1 << 24) - 1;

/// Represents a single 32-bit page table entry in its raw bitfield form.
///
/// The table is flat and indexed by VPN, so the entry does not store its own
/// page number. Every other piece of per-page state lives here.
///
/// ### Bit layout
///
/// | Bits   | Name         | Meaning |
/// |--------|--------------|---------|
/// | 0      | `valid`      | Page is resident; `pfn` may be dereferenced |
/// | 1      | `read_only`  | Writes through this entry are rejected |
/// | 2      | `dirty`      | Written since it was installed |
/// | 3      | `referenced` | Touched since it was installed |
/// | 4..=7  | OS available | Ignored by the paging core |
/// | 8..=31 | `pfn`        | Frame backing the page while `valid` |
///
/// ### Notes
/// - When `valid` is clear, the `pfn` bits are stale and must not be used.
/// - `read_only` survives invalidation; it describes the page, not the frame.
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalFrameNumber;
/// # use kernel_vmem::PageEntryBits;
/// let mut e = PageEntryBits::new();
/// e.set_valid(true);
/// e.set_frame(PhysicalFrameNumber::new(3));
/// assert!(e.valid());
/// assert_eq!(e.frame(), Some(PhysicalFrameNumber::new(3)));
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Valid (bit 0).
    ///
    /// Set while the page is resident in the frame named by `pfn`. A clear
    /// bit means any access must go through the fault handler first.
    pub valid: bool,

    /// Read-only (bit 1).
    ///
    /// Set for pages of read-only executable sections.
    pub read_only: bool,

    /// Dirty (bit 2).
    ///
    /// Set on the first write after installation. A dirty page must be
    /// written to swap before its frame is reused.
    pub dirty: bool,

    /// Referenced (bit 3).
    pub referenced: bool,

    /// OS-available (bits 4..=7).
    #[bits(4)]
    pub os_available: u8,

    /// Frame number (bits 8..=31).
    #[bits(24)]
    pfn_bits: u32,
}

impl PageEntryBits {
    /// Store the frame number.
    ///
    /// ### Debug assertions
    /// - Asserts the PFN fits the 24-bit field.
    #[inline]
    pub const fn set_frame(&mut self, pfn: PhysicalFrameNumber) {
        debug_assert!(pfn.as_u32() <= MAX_ENTRY_PFN);
        self.set_pfn_bits(pfn.as_u32());
    }

    /// The backing frame, or `None` if the entry is not valid.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> Option<PhysicalFrameNumber> {
        if self.valid() {
            Some(PhysicalFrameNumber::new(self.pfn_bits()))
        } else {
            None
        }
    }

    /// A resident entry for `pfn` with clean access bits.
    #[inline]
    #[must_use]
    pub const fn resident(pfn: PhysicalFrameNumber, read_only: bool, referenced: bool) -> Self {
        let mut e = Self::new()
            .with_valid(true)
            .with_read_only(read_only)
            .with_dirty(false)
            .with_referenced(referenced);
        e.set_frame(pfn);
        e
    }
}
