//! ## flowext-core::ext
//! **The extension buffer of a flow object**
//!
//! ### Key Submodules:
//! - `blob`: the word arena with its in-use size, record locator and slot table
//! - `cell`: the epoch-protected pointer field and the growth/publish protocol
//! - `view`: word-granular shared views into a buffer region

pub mod blob;
pub mod cell;
pub mod view;

pub use blob::ExtBlob;
pub use cell::{ExtCell, ExtWriter, GrowError, Growth, GrowthKind, Tail};
pub use view::SlotView;
