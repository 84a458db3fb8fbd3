//! Word-granular view over a region of an extension buffer.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::align::WORD;

/// A shared view of `len` bytes starting at a word boundary.
///
/// Words are accessed with relaxed atomics, so consumers may update their
/// region while other readers hold views of the same buffer.
#[derive(Clone, Copy)]
pub struct SlotView<'a> {
    words: &'a [AtomicU64],
    len: usize,
}

impl<'a> SlotView<'a> {
    pub(crate) fn new(words: &'a [AtomicU64], len: usize) -> Self {
        debug_assert!(len <= words.len() * WORD);
        Self { words, len }
    }

    /// Size of the region in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn load_u64(&self, index: usize) -> Option<u64> {
        self.words.get(index).map(|w| w.load(Ordering::Relaxed))
    }

    /// Stores `value` at word `index`. Returns `false` if out of range.
    pub fn store_u64(&self, index: usize, value: u64) -> bool {
        match self.words.get(index) {
            Some(word) => {
                word.store(value, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Copies `bytes` into the region from its start, zero-padding the last
    /// touched word. Returns `false` without writing if `bytes` does not fit.
    pub fn write_bytes(&self, bytes: &[u8]) -> bool {
        if bytes.len() > self.len {
            return false;
        }
        for (word, chunk) in self.words.iter().zip(bytes.chunks(WORD)) {
            let mut raw = [0u8; WORD];
            raw[..chunk.len()].copy_from_slice(chunk);
            word.store(u64::from_le_bytes(raw), Ordering::Relaxed);
        }
        true
    }

    /// Little-endian copy of the region.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.words.len() * WORD);
        for word in self.words {
            out.extend_from_slice(&word.load(Ordering::Relaxed).to_le_bytes());
        }
        out.truncate(self.len);
        out
    }

    pub fn is_zeroed(&self) -> bool {
        self.to_bytes().iter().all(|b| *b == 0)
    }

    /// Address of the first word, for identity comparisons.
    #[inline]
    pub fn as_ptr(&self) -> *const AtomicU64 {
        self.words.as_ptr()
    }
}

impl std::fmt::Debug for SlotView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotView")
            .field("addr", &self.as_ptr())
            .field("len", &self.len)
            .finish()
    }
}
