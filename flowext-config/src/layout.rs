//! Extension geometry and buffer allocation parameters.

use serde::{Deserialize, Serialize};
use validator::Validate;

use flowext_core::alloc::SizeClassAllocator;
use flowext_core::layout::COMPACT_LEN_MAX;
use flowext_core::Layout;

use crate::validation;
use crate::ConfigError;

/// Where and how large the flow extension record is.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct LayoutConfig {
    /// Unit of the compact record locator (bytes, power of two).
    #[serde(default = "default_scale_factor")]
    #[validate(range(min = 8, max = 256))]
    pub scale_factor: usize,

    /// Largest offset a record may start at. Defaults to the full range of
    /// the compact locator.
    #[serde(default)]
    pub max_offset: Option<usize>,

    /// Payload bytes following the slot descriptor.
    #[serde(default = "default_payload_size")]
    #[validate(range(min = 8, max = 4096))]
    pub payload_size: usize,
}

fn default_scale_factor() -> usize {
    Layout::DEFAULT_SCALE_FACTOR
}

fn default_payload_size() -> usize {
    Layout::DEFAULT_PAYLOAD_SIZE
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            scale_factor: default_scale_factor(),
            max_offset: None,
            payload_size: default_payload_size(),
        }
    }
}

impl LayoutConfig {
    pub fn to_layout(&self) -> Result<Layout, ConfigError> {
        validation::validate_power_of_two(self.scale_factor).map_err(|err| {
            let mut errors = validator::ValidationErrors::new();
            errors.add("scale_factor", err);
            ConfigError::Validation(errors)
        })?;
        let max_offset = self
            .max_offset
            .unwrap_or(COMPACT_LEN_MAX * self.scale_factor);
        Ok(Layout::new(self.scale_factor, max_offset, self.payload_size)?)
    }
}

/// Extension buffer size classes.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct AllocatorConfig {
    /// Smallest buffer handed out (bytes).
    #[serde(default = "default_min_capacity")]
    #[validate(range(min = 8, max = 65536))]
    pub min_capacity: usize,

    /// Round capacities up to powers of two, leaving room for in-place growth.
    #[serde(default = "default_true")]
    pub power_of_two_classes: bool,
}

fn default_min_capacity() -> usize {
    SizeClassAllocator::DEFAULT_MIN_CAPACITY
}

fn default_true() -> bool {
    true
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            min_capacity: default_min_capacity(),
            power_of_two_classes: default_true(),
        }
    }
}

impl AllocatorConfig {
    pub fn to_allocator(&self) -> SizeClassAllocator {
        SizeClassAllocator::new(self.min_capacity, self.power_of_two_classes)
    }
}
