//! ## flowext-conntrack::ext
//! **Side-slot kinds of a connection's extension buffer**
//!
//! Every kind has a fixed size and alignment and owns one entry of the
//! buffer's slot table.

use std::fmt;
use std::str::FromStr;

use flowext_core::SlotKind;

use crate::error::ConnError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtKind {
    Helper,
    Nat,
    SeqAdj,
    Acct,
    Timestamp,
}

/// Size and alignment of a side slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtType {
    pub size: usize,
    pub align: usize,
}

impl ExtKind {
    pub const ALL: [ExtKind; 5] = [
        ExtKind::Helper,
        ExtKind::Nat,
        ExtKind::SeqAdj,
        ExtKind::Acct,
        ExtKind::Timestamp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExtKind::Helper => "helper",
            ExtKind::Nat => "nat",
            ExtKind::SeqAdj => "seqadj",
            ExtKind::Acct => "acct",
            ExtKind::Timestamp => "timestamp",
        }
    }

    pub fn ext_type(self) -> ExtType {
        match self {
            // helper pointer plus private data
            ExtKind::Helper => ExtType { size: 32, align: 8 },
            ExtKind::Nat => ExtType { size: 16, align: 8 },
            // one sequence adjustment per direction
            ExtKind::SeqAdj => ExtType { size: 24, align: 8 },
            // packets and bytes per direction
            ExtKind::Acct => ExtType { size: 32, align: 8 },
            ExtKind::Timestamp => ExtType { size: 16, align: 8 },
        }
    }

    /// Slot table entry of this kind.
    pub fn slot(self) -> SlotKind {
        let index = match self {
            ExtKind::Helper => 0,
            ExtKind::Nat => 1,
            ExtKind::SeqAdj => 2,
            ExtKind::Acct => 3,
            ExtKind::Timestamp => 4,
        };
        // Indices above are all below MAX_SLOT_KINDS.
        SlotKind::new(index).unwrap_or_else(|| unreachable!("slot index {index} out of range"))
    }

    pub fn from_slot(slot: SlotKind) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.slot() == slot)
    }
}

impl fmt::Display for ExtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExtKind {
    type Err = ConnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConnError::UnknownExtension(s.to_string()))
    }
}
