//! # Paging Configuration Constants
//!
//! Compile-time layout of user address spaces and the default size of the
//! physical frame pool. The frame allocator, the page-fault handler and the
//! process loader all read their defaults from here.
//!
//! ## User Address Space Layout
//!
//! Every process image is laid out contiguously from virtual page 0:
//!
//! ```text
//! VPN 0                 ┌─────────────────────────────────┐
//!                       │   Executable sections           │
//!                       │   (code, read-only data, data)  │
//!                       ├─────────────────────────────────┤
//!                       │   Stack                         │
//!                       │   (STACK_PAGES, zero-fill)      │
//! initial SP ──────────►├─────────────────────────────────┤
//!                       │   Argument page                 │
//!                       │   (argv pointers + strings)     │
//! num_pages             └─────────────────────────────────┘
//! ```
//!
//! Executable pages are populated from their section on first touch, stack
//! and argument pages are zero-filled.
//!
//! ## Physical Memory
//!
//! Physical memory is an array of [`DEFAULT_FRAME_COUNT`](memory::DEFAULT_FRAME_COUNT) frames of
//! [`PAGE_SIZE`](kernel_memory_addresses::PAGE_SIZE) bytes, shared by every
//! process.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
