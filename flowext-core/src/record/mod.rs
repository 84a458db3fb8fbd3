//! ## flowext-core::record
//! **The flow extension record: descriptor plus payload**

pub mod descriptor;
pub mod payload;

pub use descriptor::{owner_tag, SlotDescriptor, DESCRIPTOR_SIZE, MAGIC, PAYLOAD_ALIGN};
pub use payload::Payload;
