//! ## flowext-telemetry::logging
//! **Structured logging with tracing**
//!
//! Verbosity comes from a debug bitmask (1=error, 2=warn, 4=info, 8=debug,
//! 16=trace). The highest set bit selects the level and 0 turns logging off.
//! `RUST_LOG`, when set, takes precedence over the mask.

use flowext_config::TelemetryConfig;
use flowext_core::alloc::stats::StatsSnapshot;
use tracing::info_span;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Install the global subscriber. Fails if one is already installed.
    pub fn init(debug_mask: u32) -> Result<(), InitError> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::default().add_directive(Self::level_for(debug_mask).into())
        });
        fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .try_init()
    }

    /// Install the global subscriber at the configured verbosity.
    pub fn from_config(config: &TelemetryConfig) -> Result<(), InitError> {
        Self::init(config.debug)
    }

    /// Level selected by the highest set bit of `debug_mask`.
    pub fn level_for(debug_mask: u32) -> LevelFilter {
        match debug_mask {
            0 => LevelFilter::OFF,
            m if m & 16 != 0 => LevelFilter::TRACE,
            m if m & 8 != 0 => LevelFilter::DEBUG,
            m if m & 4 != 0 => LevelFilter::INFO,
            m if m & 2 != 0 => LevelFilter::WARN,
            m if m & 1 != 0 => LevelFilter::ERROR,
            _ => LevelFilter::TRACE,
        }
    }

    /// Emit one event carrying the store counters.
    pub fn log_stats(snapshot: &StatsSnapshot) {
        let _span = info_span!("ext_stats").entered();
        tracing::info!(
            buffers_allocated = snapshot.buffers_allocated,
            in_place_growths = snapshot.in_place_growths,
            relocations = snapshot.relocations,
            buffers_retired = snapshot.buffers_retired,
            buffers_released = snapshot.buffers_released,
            records_attached = snapshot.records_attached,
            too_late = snapshot.too_late,
            prerequisite_failures = snapshot.prerequisite_failures,
            capacity_exceeded = snapshot.capacity_exceeded,
            allocation_failures = snapshot.allocation_failures,
            "extension store statistics"
        );
    }
}
