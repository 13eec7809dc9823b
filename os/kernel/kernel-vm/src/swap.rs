//! Backing store for evicted dirty pages.

use crate::error::SwapError;
use crate::process::ProcessId;
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_memory_addresses::{PAGE_SIZE, VirtualPageNumber};
use kernel_sync::SpinLock;
use std::collections::HashMap;

/// Page-granular store keyed by owner and virtual page.
///
/// The memory manager calls into the store only while holding the allocator
/// lock, so at most one eviction or population uses it at a time.
pub trait SwapStore: Send + Sync {
    /// Save one frame's bytes for `(owner, vpn)`, replacing any earlier copy.
    ///
    /// # Errors
    /// [`SwapError`] if the copy could not be saved.
    fn store(&self, owner: ProcessId, vpn: VirtualPageNumber, frame: &[u8]) -> Result<(), SwapError>;

    /// Fill `frame` with the saved copy of `(owner, vpn)`.
    ///
    /// Returns `false` if there is no saved copy; `frame` is then untouched.
    ///
    /// # Errors
    /// [`SwapError`] if a saved copy exists but cannot be read.
    fn load(&self, owner: ProcessId, vpn: VirtualPageNumber, frame: &mut [u8]) -> Result<bool, SwapError>;

    /// Forget every copy belonging to `owner`.
    fn discard(&self, owner: ProcessId);
}

/// Heap-backed swap store with optional slot limit and usage counters.
#[derive(Debug, Default)]
pub struct MemorySwap {
    slots: SpinLock<HashMap<(ProcessId, VirtualPageNumber), Box<[u8]>>>,
    capacity: Option<usize>,
    stores: AtomicUsize,
    loads: AtomicUsize,
}

impl MemorySwap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses new slots beyond `capacity`.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Successful `store` calls so far.
    #[must_use]
    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::Relaxed)
    }

    /// `load` calls that found a copy.
    #[must_use]
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Whether a copy of `(owner, vpn)` is held.
    #[must_use]
    pub fn contains(&self, owner: ProcessId, vpn: VirtualPageNumber) -> bool {
        self.slots.with_lock(|s| s.contains_key(&(owner, vpn)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.with_lock(|s| s.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SwapStore for MemorySwap {
    fn store(&self, owner: ProcessId, vpn: VirtualPageNumber, frame: &[u8]) -> Result<(), SwapError> {
        if frame.len() != PAGE_SIZE {
            return Err(SwapError::BadFrameSize(frame.len()));
        }
        let mut slots = self.slots.lock();
        let key = (owner, vpn);
        if let Some(capacity) = self.capacity
            && !slots.contains_key(&key)
            && slots.len() >= capacity
        {
            return Err(SwapError::Full { capacity });
        }
        slots.insert(key, frame.into());
        self.stores.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn load(&self, owner: ProcessId, vpn: VirtualPageNumber, frame: &mut [u8]) -> Result<bool, SwapError> {
        if frame.len() != PAGE_SIZE {
            return Err(SwapError::BadFrameSize(frame.len()));
        }
        let slots = self.slots.lock();
        let Some(saved) = slots.get(&(owner, vpn)) else {
            return Ok(false);
        };
        frame.copy_from_slice(saved);
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn discard(&self, owner: ProcessId) {
        self.slots.with_lock(|s| s.retain(|(o, _), _| *o != owner));
    }
}
