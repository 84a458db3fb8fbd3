//! # Flow Extension Telemetry
//!
//! Log initialisation driven by the debug bitmask, and a Prometheus view of
//! the extension store statistics.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
