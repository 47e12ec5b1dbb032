use metrics::counter;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::publisher::{Publisher, PublisherFactory};
use crate::error::ScrapeError;
use crate::exporter::{parse_line, ExporterClient, MetricSource};

/// The furthest stage a source task reached before it closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStage {
    CreatingProducer,
    Fetching,
    Streaming,
    Flushing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    ProducerFailed,
    FetchFailed,
    BadStatus(u16),
    /// Lines were streamed and the producer flushed. `read_error` is set when
    /// the body ended early.
    Forwarded { read_error: bool },
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: String,
    pub stage: SourceStage,
    pub outcome: SourceOutcome,
    pub submitted: usize,
    pub unflushed: usize,
    pub failed_deliveries: usize,
}

impl SourceReport {
    fn new(source: &MetricSource) -> Self {
        Self {
            source: source.name.clone(),
            stage: SourceStage::CreatingProducer,
            outcome: SourceOutcome::ProducerFailed,
            submitted: 0,
            unflushed: 0,
            failed_deliveries: 0,
        }
    }

    fn closed(mut self, outcome: SourceOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// Scrapes one source and forwards every data line to its topic.
///
/// Failures are logged and recorded in the report; they never escape the task.
pub async fn forward_source<F: PublisherFactory>(
    source: &MetricSource,
    client: &ExporterClient,
    factory: &F,
    flush_timeout: Duration,
) -> SourceReport {
    let mut report = SourceReport::new(source);

    let mut publisher = match factory.create(source) {
        Ok(publisher) => publisher,
        Err(e) => {
            error!("Creating producer for {} failed: {}", source.name, e);
            record_failure(source, "producer");
            return report.closed(SourceOutcome::ProducerFailed);
        }
    };

    info!("Scraping {} ({})", source.name, source.url);
    report.stage = SourceStage::Fetching;
    let mut body = match client.open(&source.url).await {
        Ok(body) => body,
        Err(e) => {
            error!("Scraping {} failed: {}", source.name, e);
            record_failure(source, e.reason());
            let outcome = match e {
                ScrapeError::Status { status } => SourceOutcome::BadStatus(status.as_u16()),
                _ => SourceOutcome::FetchFailed,
            };
            publisher.close(Duration::ZERO).await;
            return report.closed(outcome);
        }
    };

    report.stage = SourceStage::Streaming;
    let mut read_error = false;
    loop {
        match body.next_lines().await {
            Ok(Some(lines)) => {
                for line in lines.iter().filter_map(|l| parse_line(l)) {
                    match publisher.publish(&line) {
                        Ok(()) => report.submitted += 1,
                        Err(e) => warn!("Dropping {} line {}: {}", source.name, line.key, e),
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Reading metrics from {} failed: {}", source.name, e);
                record_failure(source, e.reason());
                read_error = true;
                break;
            }
        }
    }
    drop(body);

    report.stage = SourceStage::Flushing;
    debug!("Flushing {} messages for {}", report.submitted, source.name);
    let closed = publisher.close(flush_timeout).await;
    report.unflushed = closed.unflushed;
    report.failed_deliveries = closed.failed_deliveries;

    counter!("relay_lines_published_total", "source" => source.name.clone())
        .increment(report.submitted as u64);
    if report.unflushed > 0 {
        warn!(
            "{} messages from {} were not delivered within {:?}",
            report.unflushed, source.name, flush_timeout
        );
        counter!("relay_unflushed_messages_total", "source" => source.name.clone())
            .increment(report.unflushed as u64);
    } else {
        info!(
            "Forwarded {} metrics from {} to topic {}, {} delivery failures",
            report.submitted, source.name, source.topic, report.failed_deliveries
        );
    }

    report.closed(SourceOutcome::Forwarded { read_error })
}

fn record_failure(source: &MetricSource, reason: &'static str) {
    counter!(
        "relay_scrape_failures_total",
        "source" => source.name.clone(),
        "reason" => reason
    )
    .increment(1);
}
