//! ## flowext-core::ext::cell
//! **Growth and publication of the extension buffer**
//!
//! [`ExtCell`] is the extension pointer field a flow object embeds. Readers
//! load it under a pinned epoch guard and never lock. Writers take the
//! cell's writer lock and grow the buffer through [`ExtWriter::grow`]:
//!
//! 1. if the current capacity covers the new size, the tail is zeroed and
//!    filled in place, then the new in-use size is released;
//! 2. otherwise a new buffer is allocated, the in-use prefix copied, the
//!    tail filled, and the pointer swapped. The old buffer is retired with
//!    `defer_destroy` and freed once every guard pinned before the swap
//!    is dropped.
//!
//! Either way a reader sees the old state or the complete new one.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::epoch::{self, Atomic, Guard, Owned};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::trace;

use crate::align::{align_up, WORD};
use crate::alloc::{stats, BlobAllocator};
use crate::ext::blob::ExtBlob;
use crate::object::SlotKind;

/// Why a growth was abandoned. The cell is unchanged in either case.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GrowError {
    #[error("failed to allocate {size} bytes for extension growth")]
    OutOfMemory { size: usize },

    #[error("write at offset {offset} falls outside the grown region")]
    OutOfRange { offset: usize },
}

/// How a growth was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthKind {
    /// The object had no buffer; a fresh one was published.
    Fresh,
    /// The existing buffer's capacity covered the new size.
    InPlace,
    /// A new buffer replaced the old one, which was retired.
    Relocated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Growth {
    /// In-use size before the growth.
    pub previous_used: usize,
    /// In-use size after the growth.
    pub used: usize,
    pub kind: GrowthKind,
}

/// The extension pointer of a flow object.
pub struct ExtCell {
    blob: Atomic<ExtBlob>,
    writer: Mutex<()>,
}

impl ExtCell {
    pub fn new() -> Self {
        Self {
            blob: Atomic::null(),
            writer: Mutex::new(()),
        }
    }

    /// Loads the published buffer. The reference stays valid for as long as
    /// `guard` is pinned, even if a writer replaces the buffer meanwhile.
    pub fn load<'g>(&'g self, guard: &'g Guard) -> Option<&'g ExtBlob> {
        let shared = self.blob.load(Ordering::Acquire, guard);
        // SAFETY: a published buffer is only freed through `defer_destroy` or
        // by dropping the cell, which the `'g` borrow of `self` rules out.
        unsafe { shared.as_ref() }
    }

    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.load(&guard).is_none()
    }

    /// Snapshot of the in-use bytes, empty when there is no buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let guard = epoch::pin();
        self.load(&guard)
            .map(ExtBlob::to_bytes)
            .unwrap_or_default()
    }

    /// Serialises writers on this cell. Readers are unaffected.
    pub fn writer(&self) -> ExtWriter<'_> {
        ExtWriter {
            cell: self,
            _lock: self.writer.lock(),
        }
    }
}

impl Default for ExtCell {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ExtCell {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no reader can hold a reference obtained
        // through `load`, so the buffer can be freed immediately.
        unsafe {
            let guard = epoch::unprotected();
            let shared = self.blob.load(Ordering::Relaxed, guard);
            if !shared.is_null() {
                drop(shared.into_owned());
            }
        }
    }
}

impl std::fmt::Debug for ExtCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = epoch::pin();
        f.debug_struct("ExtCell")
            .field("blob", &self.load(&guard))
            .finish()
    }
}

/// Exclusive writer access to an [`ExtCell`].
pub struct ExtWriter<'c> {
    cell: &'c ExtCell,
    _lock: MutexGuard<'c, ()>,
}

impl<'c> ExtWriter<'c> {
    pub fn current<'g>(&self, guard: &'g Guard) -> Option<&'g ExtBlob>
    where
        'c: 'g,
    {
        self.cell.load(guard)
    }

    /// Grows the in-use size to `new_size` (rounded up to a word) and lets
    /// `prepare` fill the new tail before anything is published.
    ///
    /// Bytes below the previous in-use size are preserved exactly and the
    /// tail starts zeroed. A request that does not exceed the current in-use
    /// size leaves it unchanged but still runs `prepare` on an empty tail.
    /// If `prepare` attempts a write outside the tail, nothing is published.
    pub fn grow<F>(
        &mut self,
        new_size: usize,
        allocator: &dyn BlobAllocator,
        guard: &Guard,
        prepare: F,
    ) -> Result<Growth, GrowError>
    where
        F: FnOnce(&mut Tail<'_>),
    {
        let new_size = align_up(new_size, WORD);
        let current = self.cell.blob.load(Ordering::Acquire, guard);

        // SAFETY: see `ExtCell::load`; we also hold the writer lock.
        let Some(old) = (unsafe { current.as_ref() }) else {
            let blob = self.allocate(allocator, new_size)?;
            let mut tail = Tail::new(&blob.words, 0, new_size);
            prepare(&mut tail);
            tail.commit(&blob, new_size)?;
            self.cell.blob.store(Owned::new(blob), Ordering::Release);
            trace!(size = new_size, "published fresh extension buffer");
            return Ok(Growth {
                previous_used: 0,
                used: new_size,
                kind: GrowthKind::Fresh,
            });
        };

        let previous_used = old.used();
        let new_size = new_size.max(previous_used);

        if new_size <= old.capacity() {
            let mut tail = Tail::new(&old.words, previous_used, new_size);
            tail.zero();
            prepare(&mut tail);
            // Only words above the in-use size were touched; readers cannot see them.
            tail.commit(old, new_size)?;
            stats::global().increment_in_place_growths();
            trace!(from = previous_used, to = new_size, "grew extension buffer in place");
            return Ok(Growth {
                previous_used,
                used: new_size,
                kind: GrowthKind::InPlace,
            });
        }

        let blob = self.allocate(allocator, new_size)?;
        blob.copy_prefix_from(old, previous_used);
        let mut tail = Tail::new(&blob.words, previous_used, new_size);
        tail.zero();
        prepare(&mut tail);
        tail.commit(&blob, new_size)?;

        let retired = self
            .cell
            .blob
            .swap(Owned::new(blob), Ordering::AcqRel, guard);
        // SAFETY: the swap unlinked `retired`; only readers pinned before it
        // can still reach the buffer, and destruction waits for them.
        unsafe { guard.defer_destroy(retired) };
        stats::global().increment_relocations();
        trace!(from = previous_used, to = new_size, "relocated extension buffer");

        Ok(Growth {
            previous_used,
            used: new_size,
            kind: GrowthKind::Relocated,
        })
    }

    fn allocate(&self, allocator: &dyn BlobAllocator, size: usize) -> Result<ExtBlob, GrowError> {
        let words = allocator
            .allocate(size)
            .filter(|words| words.len() * WORD >= size)
            .ok_or(GrowError::OutOfMemory { size })?;
        stats::global().increment_buffers_allocated();
        Ok(ExtBlob::new(words))
    }
}

/// The not-yet-published tail of a growing buffer, `[start, end)`.
///
/// Header updates requested here are applied only when the growth commits,
/// after the new in-use size.
pub struct Tail<'a> {
    words: &'a [AtomicU64],
    start: usize,
    end: usize,
    compact_len: Option<u8>,
    slot: Option<(SlotKind, u16)>,
    refused: Option<usize>,
}

impl<'a> Tail<'a> {
    fn new(words: &'a [AtomicU64], start: usize, end: usize) -> Self {
        Self {
            words,
            start,
            end,
            compact_len: None,
            slot: None,
            refused: None,
        }
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    fn zero(&self) {
        for word in &self.words[self.start / WORD..self.end / WORD] {
            word.store(0, Ordering::Relaxed);
        }
    }

    /// Writes a word at byte `offset`. A write outside the tail is dropped
    /// and makes the whole growth fail with [`GrowError::OutOfRange`].
    pub fn store_word(&mut self, offset: usize, value: u64) {
        let inside = offset % WORD == 0
            && offset >= self.start
            && offset.checked_add(WORD).is_some_and(|end| end <= self.end);
        if !inside {
            self.refused.get_or_insert(offset);
            return;
        }
        self.words[offset / WORD].store(value, Ordering::Relaxed);
    }

    /// Sets the compact record locator on commit.
    pub fn set_compact_len(&mut self, len: u8) {
        self.compact_len = Some(len);
    }

    /// Records the side slot `kind` at `offset` on commit.
    pub fn set_slot(&mut self, kind: SlotKind, offset: u16) {
        self.slot = Some((kind, offset));
    }

    fn commit(self, blob: &ExtBlob, used: usize) -> Result<(), GrowError> {
        if let Some(offset) = self.refused {
            trace!(offset, "tail write refused, abandoning growth");
            return Err(GrowError::OutOfRange { offset });
        }
        blob.used.store(used, Ordering::Release);
        if let Some((kind, offset)) = self.slot {
            blob.slots[kind.index()].store(offset, Ordering::Release);
        }
        if let Some(len) = self.compact_len {
            blob.compact_len.store(len, Ordering::Release);
        }
        Ok(())
    }
}
