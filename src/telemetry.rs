use anyhow::Result;
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

use crate::config::TelemetryConfig;

/// Serves the relay's own counters when a listen address is configured.
/// Without one the metric macros stay no-ops.
pub fn install(config: &TelemetryConfig) -> Result<()> {
    let Some(addr) = config.metrics_listen_addr else {
        return Ok(());
    };

    install_exporter(addr)?;
    describe();
    info!("Serving relay metrics on http://{}/metrics", addr);
    Ok(())
}

fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}

fn describe() {
    describe_counter!(
        "relay_lines_published_total",
        Unit::Count,
        "Metric lines submitted to Kafka"
    );
    describe_counter!(
        "relay_scrape_failures_total",
        Unit::Count,
        "Source tasks that stopped early, by reason"
    );
    describe_counter!(
        "relay_delivery_failures_total",
        Unit::Count,
        "Messages Kafka reported as undeliverable"
    );
    describe_counter!(
        "relay_unflushed_messages_total",
        Unit::Count,
        "Messages still in flight when the flush timeout expired"
    );
    describe_histogram!(
        "relay_round_duration_seconds",
        Unit::Seconds,
        "Wall time of one scrape round"
    );
}
