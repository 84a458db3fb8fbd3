//! ## flowext-core::alloc
//! **Buffer allocation and statistics**
//!
//! ### Key Submodules:
//! - `allocator`: size-classed, fallible allocation of zeroed word buffers
//! - `stats`: process-wide growth and `ensure` outcome counters

pub mod allocator;
pub mod stats;

pub use allocator::{BlobAllocator, SizeClassAllocator};
pub use stats::{ExtStats, StatsSnapshot};
