//! ## flowext-core::object
//! **Collaboration contract with the flow-tracking subsystem**
//!
//! The core never owns a flow object. It only needs the handful of
//! capabilities captured by [`FlowObject`].

use std::fmt;

use crate::ext::ExtCell;

/// Number of side-slot kinds an extension buffer can index.
pub const MAX_SLOT_KINDS: usize = 8;

/// Index of a collaborator-owned side slot in the buffer's slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKind(u8);

impl SlotKind {
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_SLOT_KINDS {
            Some(Self(index))
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Geometry of a collaborator-owned side slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideSlot {
    pub size: usize,
    /// Power of two; slots are never placed below word alignment.
    pub align: usize,
}

/// A tracked flow record that can carry an extension buffer.
///
/// Implementations must keep [`identity`](FlowObject::identity) stable for the
/// whole lifetime of the object, and must only report `is_confirmed` once the
/// object has become visible to other readers.
pub trait FlowObject {
    /// Error reported when a side slot cannot be registered.
    type SlotError: std::error::Error;

    /// Stable identity; its low 32 bits become the record's owner tag.
    fn identity(&self) -> u64;

    fn is_confirmed(&self) -> bool;

    /// The object's extension pointer field.
    fn extension(&self) -> &ExtCell;

    /// Describes side slot `kind` for registration, or refuses it.
    ///
    /// The store registers a missing prerequisite slot in the same growth
    /// that appends its record, so a failed attach never leaves a slot
    /// behind.
    fn side_slot(&self, kind: SlotKind) -> Result<SideSlot, Self::SlotError>;

    fn has_side_slot(&self, kind: SlotKind) -> bool {
        let guard = crossbeam::epoch::pin();
        self.extension()
            .load(&guard)
            .and_then(|blob| blob.slot_offset(kind))
            .is_some()
    }
}
