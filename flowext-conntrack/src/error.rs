use thiserror::Error;

use flowext_core::SlotKind;

use crate::conn::FlowTuple;
use crate::ext::ExtKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnError {
    #[error("connection already confirmed, cannot add {0} extension")]
    Confirmed(ExtKind),

    #[error("no memory for {kind} extension ({size} bytes)")]
    NoMemory { kind: ExtKind, size: usize },

    #[error("{kind} extension offset {offset} does not fit the slot table")]
    ExtTooLarge { kind: ExtKind, offset: usize },

    #[error("unknown extension kind: {0}")]
    UnknownExtension(String),

    #[error("slot {0} is not a connection extension")]
    UnknownSlot(SlotKind),

    #[error("a confirmed connection already exists for {0}")]
    Clash(FlowTuple),
}
