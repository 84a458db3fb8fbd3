//! ## flowext-telemetry::metrics
//! **Prometheus exporter for extension store counters**

use flowext_core::alloc::stats::{self, StatsSnapshot};
use prometheus::{IntGaugeVec, Opts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub ext_events: IntGaugeVec,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let ext_events = IntGaugeVec::new(
            Opts::new("flowext_events", "Extension store events since start"),
            &["event"],
        )?;
        registry.register(Box::new(ext_events.clone()))?;

        Ok(Self {
            registry,
            ext_events,
        })
    }

    /// Publish a statistics snapshot.
    pub fn observe(&self, snapshot: &StatsSnapshot) {
        for (event, value) in snapshot.counters() {
            self.ext_events
                .with_label_values(&[event])
                .set(i64::try_from(value).unwrap_or(i64::MAX));
        }
    }

    /// Publish the process-wide counters.
    pub fn observe_global(&self) {
        self.observe(&stats::global().snapshot());
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
