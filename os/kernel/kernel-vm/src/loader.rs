//! # Executable images
//!
//! The fault handler never parses executables. It asks an [`ExecutableImage`]
//! for the content of one page of one section, and uses [`ImageLayout`] to
//! decide which section (if any) backs a virtual page.

use crate::error::{LoadError, VmError};
use kernel_info::memory::{ARGUMENT_PAGES, MAX_PROCESS_PAGES};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, VirtualPageNumber};

/// One loadable section of an executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    /// Page the section starts at.
    pub first_vpn: VirtualPageNumber,
    /// Length in pages.
    pub pages: usize,
    pub read_only: bool,
}

/// Source of executable content, consumed by the page-fault handler.
///
/// Implementations are called with the allocator lock held and must not call
/// back into the memory manager.
pub trait ExecutableImage: Send + Sync {
    /// Sections in ascending address order.
    fn sections(&self) -> &[Section];

    fn entry_point(&self) -> VirtualAddress;

    /// Fill `frame` with page `page_index` of section `section`.
    ///
    /// # Errors
    /// [`LoadError`] if the section or page does not exist.
    fn load_page(&self, section: usize, page_index: usize, frame: &mut [u8]) -> Result<(), LoadError>;

    /// Whether section `section` is mapped read-only.
    fn is_read_only(&self, section: usize) -> bool {
        self.sections().get(section).is_some_and(|s| s.read_only)
    }
}

/// An executable held entirely in memory.
///
/// ### Example
/// ```rust
/// # use kernel_vm::{ExecutableImage, MemoryImage};
/// let image = MemoryImage::new()
///     .with_section(".text", vec![0x90; 1500], true)
///     .with_section(".data", b"hello".to_vec(), false);
/// assert_eq!(image.sections()[0].pages, 2);
/// assert_eq!(image.sections()[1].first_vpn.as_u32(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    sections: Vec<Section>,
    contents: Vec<Vec<u8>>,
    entry_point: VirtualAddress,
}

impl MemoryImage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_entry_point(mut self, entry: VirtualAddress) -> Self {
        self.entry_point = entry;
        self
    }

    /// Append a section right after the previous one.
    #[must_use]
    pub fn with_section(self, name: &str, bytes: Vec<u8>, read_only: bool) -> Self {
        let first = self
            .sections
            .last()
            .map_or(0, |s| s.first_vpn.as_usize() + s.pages);
        let first = VirtualPageNumber::new(u32::try_from(first).unwrap_or(u32::MAX));
        self.with_section_at(name, first, bytes, read_only)
    }

    /// Append a section at an explicit page.
    #[must_use]
    pub fn with_section_at(
        mut self,
        name: &str,
        first_vpn: VirtualPageNumber,
        bytes: Vec<u8>,
        read_only: bool,
    ) -> Self {
        self.sections.push(Section {
            name: name.into(),
            first_vpn,
            pages: bytes.len().div_ceil(PAGE_SIZE),
            read_only,
        });
        self.contents.push(bytes);
        self
    }
}

impl ExecutableImage for MemoryImage {
    fn sections(&self) -> &[Section] {
        &self.sections
    }

    fn entry_point(&self) -> VirtualAddress {
        self.entry_point
    }

    fn load_page(&self, section: usize, page_index: usize, frame: &mut [u8]) -> Result<(), LoadError> {
        let bytes = self.contents.get(section).ok_or(LoadError::NoSuchSection(section))?;
        let start = page_index * PAGE_SIZE;
        if page_index >= self.sections[section].pages {
            return Err(LoadError::PageOutOfRange {
                section,
                page: page_index,
            });
        }
        let chunk = &bytes[start..bytes.len().min(start + PAGE_SIZE)];
        frame[..chunk.len()].copy_from_slice(chunk);
        frame[chunk.len()..].fill(0);
        Ok(())
    }
}

/// Where the content of a virtual page comes from on first touch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PageSource {
    /// Page `page` of executable section `section`.
    Section { section: usize, page: usize },
    /// Stack or argument page.
    ZeroFill,
}

/// Address-space layout derived from an executable.
///
/// ```text
/// 0 ── sections ── code_pages ── stack ── argument_page ── num_pages
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLayout {
    /// `(first_vpn, pages)` per section.
    sections: Vec<(usize, usize)>,
    code_pages: usize,
    num_pages: usize,
}

impl ImageLayout {
    /// Lay out `sections` from page 0 followed by `stack_pages` stack pages and
    /// the argument page.
    ///
    /// # Errors
    /// - [`VmError::FragmentedExecutable`] if the sections leave a gap or overlap.
    /// - [`VmError::InsufficientMemory`] if the layout exceeds the address space.
    pub fn new(sections: &[Section], stack_pages: usize) -> Result<Self, VmError> {
        let mut next = 0usize;
        let mut ranges = Vec::with_capacity(sections.len());
        for (i, s) in sections.iter().enumerate() {
            if s.first_vpn.as_usize() != next {
                return Err(VmError::FragmentedExecutable {
                    section: i,
                    expected: VirtualPageNumber::new(u32::try_from(next).unwrap_or(u32::MAX)),
                    found: s.first_vpn,
                });
            }
            ranges.push((next, s.pages));
            next += s.pages;
        }

        let num_pages = next + stack_pages + ARGUMENT_PAGES;
        if num_pages > MAX_PROCESS_PAGES {
            return Err(VmError::InsufficientMemory {
                needed: num_pages,
                available: MAX_PROCESS_PAGES,
            });
        }

        Ok(Self {
            sections: ranges,
            code_pages: next,
            num_pages,
        })
    }

    /// Pages in the address space.
    #[must_use]
    pub const fn num_pages(&self) -> usize {
        self.num_pages
    }

    /// Pages backed by executable sections.
    #[must_use]
    pub const fn code_pages(&self) -> usize {
        self.code_pages
    }

    /// The page holding `argv`, last in the address space.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn argument_page(&self) -> VirtualPageNumber {
        VirtualPageNumber::new((self.num_pages - ARGUMENT_PAGES) as u32)
    }

    /// Initial stack pointer: the top of the stack, just below `argv`.
    #[must_use]
    pub const fn stack_top(&self) -> VirtualAddress {
        self.argument_page().base()
    }

    /// Content source of `vpn`, or `None` outside the address space.
    #[must_use]
    pub fn source(&self, vpn: VirtualPageNumber) -> Option<PageSource> {
        let v = vpn.as_usize();
        if v >= self.num_pages {
            return None;
        }
        let found = self
            .sections
            .iter()
            .enumerate()
            .find(|(_, (first, pages))| (*first..first + pages).contains(&v));
        Some(match found {
            Some((section, (first, _))) => PageSource::Section {
                section,
                page: v - first,
            },
            None => PageSource::ZeroFill,
        })
    }

    /// Pages backed by section `section`; empty for an unknown section.
    pub fn section_pages(&self, section: usize) -> impl Iterator<Item = VirtualPageNumber> + '_ {
        self.sections
            .get(section)
            .into_iter()
            .flat_map(|&(first, pages)| first..first + pages)
            .filter_map(|v| u32::try_from(v).ok().map(VirtualPageNumber::new))
    }
}
