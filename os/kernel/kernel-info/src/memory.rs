//! # Memory Layout

use kernel_memory_addresses::PAGE_SIZE;

/// Number of physical frames in the pool when no explicit count is configured.
pub const DEFAULT_FRAME_COUNT: usize = 32;

/// Stack pages reserved after the executable sections of every process.
pub const STACK_PAGES: usize = 8;

/// Pages reserved at the top of the image for `argv`.
pub const ARGUMENT_PAGES: usize = 1;

/// Bytes consumed in the argument page per `argv` pointer.
pub const ARGV_POINTER_SIZE: usize = size_of::<u32>();

/// Upper bound for the argument block (pointers plus NUL-terminated strings).
pub const MAX_ARGUMENT_BYTES: usize = ARGUMENT_PAGES * PAGE_SIZE;

/// Largest address space a single process may request, in pages.
///
/// Chosen so that every page base still fits a 32-bit virtual address.
pub const MAX_PROCESS_PAGES: usize = (u32::MAX as usize >> kernel_memory_addresses::PAGE_SHIFT) + 1;

const _: () = {
    assert!(DEFAULT_FRAME_COUNT > 0);
    assert!(ARGUMENT_PAGES == 1);
    assert!(MAX_ARGUMENT_BYTES.is_multiple_of(PAGE_SIZE));
};
