//! Logging verbosity.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Telemetry configuration.
#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TelemetryConfig {
    /// Debug bitmask: 1=error, 2=warn, 4=info, 8=debug, 16=trace, 31=all, 0=off.
    #[serde(default)]
    #[validate(range(max = 31))]
    pub debug: u32,
}
