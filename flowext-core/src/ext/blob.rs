//! ## flowext-core::ext::blob
//! **The shared extension buffer**
//!
//! A word arena with a small header kept beside it: the in-use byte size,
//! the compact record locator and the side-slot offset table. Bytes below
//! `used` are what readers may look at; the rest of the capacity is spare
//! room for in-place growth.

use std::sync::atomic::{AtomicU16, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::align::WORD;
use crate::alloc::stats;
use crate::ext::view::SlotView;
use crate::object::{SlotKind, MAX_SLOT_KINDS};

pub(crate) const SLOT_ABSENT: u16 = u16::MAX;

pub struct ExtBlob {
    pub(crate) words: Box<[AtomicU64]>,
    pub(crate) used: AtomicUsize,
    pub(crate) compact_len: AtomicU8,
    pub(crate) slots: [AtomicU16; MAX_SLOT_KINDS],
}

impl ExtBlob {
    /// Wraps a zeroed word buffer. Nothing is in use yet.
    pub(crate) fn new(words: Box<[AtomicU64]>) -> Self {
        Self {
            words,
            used: AtomicUsize::new(0),
            compact_len: AtomicU8::new(0),
            slots: std::array::from_fn(|_| AtomicU16::new(SLOT_ABSENT)),
        }
    }

    /// Copies the header and the first `used` bytes of `old`.
    pub(crate) fn copy_prefix_from(&self, old: &ExtBlob, used: usize) {
        for (dst, src) in self.words.iter().zip(old.words.iter()).take(used / WORD) {
            dst.store(src.load(Ordering::Relaxed), Ordering::Relaxed);
        }
        for (dst, src) in self.slots.iter().zip(old.slots.iter()) {
            dst.store(src.load(Ordering::Acquire), Ordering::Relaxed);
        }
        self.compact_len
            .store(old.compact_len.load(Ordering::Acquire), Ordering::Relaxed);
        self.used.store(used, Ordering::Relaxed);
    }

    /// Allocated size in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.words.len() * WORD
    }

    /// In-use size in bytes; the next slot is placed at or after it.
    #[inline]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Record locator in units of the layout's scale factor.
    #[inline]
    pub fn compact_len(&self) -> u8 {
        self.compact_len.load(Ordering::Acquire)
    }

    pub fn slot_offset(&self, kind: SlotKind) -> Option<usize> {
        match self.slots[kind.index()].load(Ordering::Acquire) {
            SLOT_ABSENT => None,
            offset => Some(offset as usize),
        }
    }

    /// Reads the word at byte `offset`, if it lies inside the in-use range.
    pub fn word(&self, offset: usize) -> Option<u64> {
        if offset % WORD != 0 || offset.checked_add(WORD)? > self.used() {
            return None;
        }
        self.words
            .get(offset / WORD)
            .map(|w| w.load(Ordering::Relaxed))
    }

    /// View of `len` bytes at byte `offset`, if the whole region is in use.
    pub fn view(&self, offset: usize, len: usize) -> Option<SlotView<'_>> {
        if offset % WORD != 0 || offset.checked_add(len)? > self.used() {
            return None;
        }
        let first = offset / WORD;
        let count = len.div_ceil(WORD);
        self.words
            .get(first..first + count)
            .map(|words| SlotView::new(words, len))
    }

    /// Little-endian copy of the in-use bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let used = self.used();
        self.view(0, used)
            .map(|view| view.to_bytes())
            .unwrap_or_default()
    }
}

impl Drop for ExtBlob {
    fn drop(&mut self) {
        stats::global().increment_buffers_released();
    }
}

impl std::fmt::Debug for ExtBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtBlob")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .field("compact_len", &self.compact_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{BlobAllocator, SizeClassAllocator};

    fn blob_with(size: usize) -> ExtBlob {
        let blob = ExtBlob::new(SizeClassAllocator::exact().allocate(size).unwrap());
        blob.used.store(size, Ordering::Release);
        blob
    }

    #[test]
    fn test_word_reads_are_bounded_by_used() {
        let blob = blob_with(16);
        blob.words[1].store(7, Ordering::Relaxed);
        assert_eq!(blob.word(8), Some(7));
        assert_eq!(blob.word(16), None);
        assert_eq!(blob.word(4), None);
        blob.used.store(8, Ordering::Release);
        assert_eq!(blob.word(8), None);
    }

    #[test]
    fn test_view_bounds() {
        let blob = blob_with(32);
        assert_eq!(blob.view(8, 24).map(|v| v.len()), Some(24));
        assert!(blob.view(8, 25).is_none());
        assert!(blob.view(usize::MAX - 3, 8).is_none());
    }

    #[test]
    fn test_copy_prefix_preserves_header_and_bytes() {
        let old = blob_with(16);
        old.words[0].store(0x1122_3344, Ordering::Relaxed);
        old.words[1].store(0x5566_7788, Ordering::Relaxed);
        old.slots[2].store(8, Ordering::Release);
        old.compact_len.store(3, Ordering::Release);

        let new = ExtBlob::new(SizeClassAllocator::exact().allocate(64).unwrap());
        new.copy_prefix_from(&old, 16);

        assert_eq!(new.to_bytes(), old.to_bytes());
        assert_eq!(new.slot_offset(SlotKind::new(2).unwrap()), Some(8));
        assert_eq!(new.slot_offset(SlotKind::new(1).unwrap()), None);
        assert_eq!(new.compact_len(), 3);
        assert_eq!(new.capacity(), 64);
    }
}
