//! ## flowext-core::layout
//! **Geometry of the flow extension record**
//!
//! The buffer records where the record lives in a single byte, counted in
//! units of the scale factor. That byte bounds the largest usable offset.

use crate::align::{align_up, is_aligned, WORD};
use crate::error::ExtError;
use crate::record::{DESCRIPTOR_SIZE, PAYLOAD_ALIGN};

/// Largest value of the compact length field.
pub const COMPACT_LEN_MAX: usize = u8::MAX as usize;

/// Offset of the first slot in a freshly allocated buffer. The buffer header
/// (slot table, lengths) lives beside the arena, not inside it.
pub const BASE_OFFSET: usize = 0;

/// Allocation granularity of extension buffers.
pub const ALLOC_GRANULARITY: usize = WORD;

const MAX_SCALE_FACTOR: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    scale_factor: usize,
    max_offset: usize,
    payload_size: usize,
}

impl Layout {
    pub const DEFAULT_SCALE_FACTOR: usize = 64;
    pub const DEFAULT_PAYLOAD_SIZE: usize = 128;

    /// Validates and builds a layout.
    ///
    /// `scale_factor` must be a power of two between [`WORD`] and 256,
    /// `max_offset` a multiple of it that the compact length can still encode.
    pub fn new(
        scale_factor: usize,
        max_offset: usize,
        payload_size: usize,
    ) -> Result<Self, ExtError> {
        if !scale_factor.is_power_of_two() {
            return Err(ExtError::InvalidLayout("scale factor must be a power of two"));
        }
        if !(WORD..=MAX_SCALE_FACTOR).contains(&scale_factor) {
            return Err(ExtError::InvalidLayout("scale factor out of range"));
        }
        if !is_aligned(max_offset, scale_factor) {
            return Err(ExtError::InvalidLayout(
                "max offset must be a multiple of the scale factor",
            ));
        }
        if max_offset > COMPACT_LEN_MAX * scale_factor {
            return Err(ExtError::InvalidLayout(
                "max offset exceeds the compact length encoding",
            ));
        }
        if payload_size == 0 || payload_size > u32::MAX as usize {
            return Err(ExtError::InvalidLayout("payload size out of range"));
        }
        Ok(Self {
            scale_factor,
            max_offset,
            payload_size,
        })
    }

    /// Layout using the full range of the compact encoding.
    pub fn with_scale_factor(scale_factor: usize, payload_size: usize) -> Result<Self, ExtError> {
        Self::new(
            scale_factor,
            COMPACT_LEN_MAX.saturating_mul(scale_factor),
            payload_size,
        )
    }

    #[inline]
    pub fn scale_factor(&self) -> usize {
        self.scale_factor
    }

    #[inline]
    pub fn max_offset(&self) -> usize {
        self.max_offset
    }

    #[inline]
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// Bytes from the descriptor start to the payload start.
    #[inline]
    pub fn descriptor_span(&self) -> usize {
        align_up(DESCRIPTOR_SIZE, PAYLOAD_ALIGN)
    }

    /// Bytes occupied by descriptor plus payload.
    #[inline]
    pub fn record_span(&self) -> usize {
        self.descriptor_span() + align_up(self.payload_size, WORD)
    }

    #[inline]
    pub fn offset_from_compact(&self, len: u8) -> usize {
        len as usize * self.scale_factor
    }

    /// Encodes an offset into the compact length field, truncating toward the
    /// previous scale-factor boundary.
    pub fn compact_from_offset(&self, offset: usize) -> Option<u8> {
        u8::try_from(offset / self.scale_factor).ok()
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            scale_factor: Self::DEFAULT_SCALE_FACTOR,
            max_offset: COMPACT_LEN_MAX * Self::DEFAULT_SCALE_FACTOR,
            payload_size: Self::DEFAULT_PAYLOAD_SIZE,
        }
    }
}
