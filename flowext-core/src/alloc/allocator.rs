//! ## flowext-core::alloc::allocator
//! **Size-classed extension buffer allocation**
//!
//! A buffer's capacity class is fixed when it is allocated. A later growth
//! that still fits the class is done in place; anything larger relocates.

use std::sync::atomic::AtomicU64;

use crate::align::{checked_align_up, WORD};

/// Source of zeroed word buffers for extension growth.
pub trait BlobAllocator: Send + Sync {
    /// Returns a zeroed buffer of at least `size` bytes, or `None` when the
    /// allocation cannot be satisfied.
    fn allocate(&self, size: usize) -> Option<Box<[AtomicU64]>>;
}

/// Rounds requests up to a minimum capacity and, optionally, to power-of-two
/// size classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClassAllocator {
    min_capacity: usize,
    power_of_two_classes: bool,
}

impl SizeClassAllocator {
    pub const DEFAULT_MIN_CAPACITY: usize = 32;

    pub fn new(min_capacity: usize, power_of_two_classes: bool) -> Self {
        Self {
            min_capacity,
            power_of_two_classes,
        }
    }

    /// Allocates exactly the requested (word-rounded) size, so every growth
    /// relocates.
    pub fn exact() -> Self {
        Self::new(0, false)
    }

    /// Capacity in bytes handed out for a `size` byte request.
    pub fn capacity_for(&self, size: usize) -> Option<usize> {
        let size = size.max(self.min_capacity);
        let size = if self.power_of_two_classes {
            size.checked_next_power_of_two()?
        } else {
            size
        };
        checked_align_up(size, WORD)
    }
}

impl Default for SizeClassAllocator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_CAPACITY, true)
    }
}

impl BlobAllocator for SizeClassAllocator {
    fn allocate(&self, size: usize) -> Option<Box<[AtomicU64]>> {
        let words = self.capacity_for(size)? / WORD;
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(words).ok()?;
        buffer.resize_with(words, || AtomicU64::new(0));
        Some(buffer.into_boxed_slice())
    }
}

impl<A: BlobAllocator + ?Sized> BlobAllocator for &A {
    fn allocate(&self, size: usize) -> Option<Box<[AtomicU64]>> {
        (**self).allocate(size)
    }
}

impl<A: BlobAllocator + ?Sized> BlobAllocator for std::sync::Arc<A> {
    fn allocate(&self, size: usize) -> Option<Box<[AtomicU64]>> {
        (**self).allocate(size)
    }
}
