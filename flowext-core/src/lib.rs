//! # flowext-core
//!
//! Attaches a tagged, fixed-size record to the shared extension buffer of a
//! long-lived flow object, and finds it again without false positives.
//!
//! ### Guarantees:
//! - Readers never lock; they pin a `crossbeam::epoch` guard and read a published buffer
//! - Buffers replaced by growth are retired, not freed, until every pinned reader is gone
//! - A record is only reported present when both its magic and owner tag match
//!
//! ### Key Submodules:
//! - `align`: power-of-two offset arithmetic
//! - `alloc`: buffer size classes and process-wide statistics
//! - `ext`: the extension buffer, its cell and the growth/publish protocol
//! - `record`: slot descriptor encoding and the payload view
//! - `store`: `ensure` / `lookup`, the public entry points

pub mod align;
pub mod alloc;
pub mod error;
pub mod ext;
pub mod layout;
pub mod object;
pub mod record;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub mod prelude {
    pub use crate::alloc::*;
    pub use crate::error::*;
    pub use crate::ext::*;
    pub use crate::layout::Layout;
    pub use crate::object::*;
    pub use crate::record::*;
    pub use crate::store::*;
}

pub use crossbeam::epoch::{pin, Guard};
pub use error::ExtError;
pub use layout::Layout;
pub use object::{FlowObject, SideSlot, SlotKind};
pub use store::ExtensionStore;
