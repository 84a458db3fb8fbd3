use flowext_config::{FlowExtConfig, TelemetryConfig};
use flowext_telemetry::EventLogger;
use tracing_subscriber::filter::LevelFilter;

#[test]
fn logger_installs_once_from_config() {
    let config = FlowExtConfig {
        telemetry: TelemetryConfig { debug: 7 },
        ..Default::default()
    };
    assert_eq!(
        EventLogger::level_for(config.telemetry.debug),
        LevelFilter::INFO
    );

    EventLogger::from_config(&config.telemetry).unwrap();
    tracing::info!("logger installed");

    // The global subscriber is already set.
    assert!(EventLogger::init(31).is_err());
}
