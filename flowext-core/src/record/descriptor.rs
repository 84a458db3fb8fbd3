//! ## flowext-core::record::descriptor
//! **Slot descriptor encoding**
//!
//! Two little-endian words in front of every payload:
//!
//! | bytes  | field         |
//! |--------|---------------|
//! | 0..4   | magic         |
//! | 4..8   | owner tag     |
//! | 8..12  | payload bytes |
//! | 12..16 | reserved (0)  |

use crate::align::WORD;
use crate::ext::ExtBlob;

/// Marks a region as a flow extension record.
pub const MAGIC: u32 = 0x4658_4c46;

/// Encoded size of a [`SlotDescriptor`].
pub const DESCRIPTOR_SIZE: usize = 2 * WORD;

/// Alignment of the payload following a descriptor.
pub const PAYLOAD_ALIGN: usize = WORD;

/// Owner tag of an object identity: its low 32 bits.
#[inline]
pub fn owner_tag(identity: u64) -> u32 {
    (identity & 0xffff_ffff) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDescriptor {
    pub magic: u32,
    pub owner_tag: u32,
    pub payload_len: u32,
}

impl SlotDescriptor {
    /// Descriptor for a record owned by the object with `identity`.
    pub fn new(identity: u64, payload_len: u32) -> Self {
        Self {
            magic: MAGIC,
            owner_tag: owner_tag(identity),
            payload_len,
        }
    }

    pub fn encode(&self) -> [u64; 2] {
        [
            u64::from(self.magic) | (u64::from(self.owner_tag) << 32),
            u64::from(self.payload_len),
        ]
    }

    pub fn decode(words: [u64; 2]) -> Self {
        Self {
            magic: words[0] as u32,
            owner_tag: (words[0] >> 32) as u32,
            payload_len: words[1] as u32,
        }
    }

    /// Reads the descriptor at `offset`, if both words are in use.
    pub fn read(blob: &ExtBlob, offset: usize) -> Option<Self> {
        let first = blob.word(offset)?;
        let second = blob.word(offset.checked_add(WORD)?)?;
        Some(Self::decode([first, second]))
    }

    /// Whether this descriptor marks a record of at least `payload_len`
    /// bytes owned by `identity`.
    pub fn validates(&self, identity: u64, payload_len: usize) -> bool {
        self.magic == MAGIC
            && self.owner_tag == owner_tag(identity)
            && self.payload_len as usize >= payload_len
    }
}
