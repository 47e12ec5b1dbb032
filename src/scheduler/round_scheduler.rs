use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::histogram;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::exporter::{ExporterClient, MetricSource};
use crate::forwarder::{forward_source, PublisherFactory, SourceOutcome, SourceReport};

pub struct RoundScheduler<F> {
    config: Arc<Config>,
    sources: Vec<MetricSource>,
    client: ExporterClient,
    factory: Arc<F>,
}

#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: u64,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub sources: Vec<SourceReport>,
}

impl RoundReport {
    fn log_summary(&self) {
        for source in &self.sources {
            debug!(
                "{} stopped at {:?} with {:?}, {} submitted, {} unflushed, {} delivery failures",
                source.source,
                source.stage,
                source.outcome,
                source.submitted,
                source.unflushed,
                source.failed_deliveries
            );
        }

        let failed: Vec<&str> = self
            .sources
            .iter()
            .filter(|s| !matches!(s.outcome, SourceOutcome::Forwarded { .. }))
            .map(|s| s.source.as_str())
            .collect();
        let submitted: usize = self.sources.iter().map(|s| s.submitted).sum();

        if failed.is_empty() {
            info!(
                "Round {} (started {}) finished in {:?}, {} lines submitted",
                self.round, self.started_at, self.duration, submitted
            );
        } else {
            warn!(
                "Round {} (started {}) finished in {:?}, {} lines submitted, failed sources: {}",
                self.round,
                self.started_at,
                self.duration,
                submitted,
                failed.join(", ")
            );
        }
    }
}

impl<F: PublisherFactory> RoundScheduler<F> {
    pub fn new(config: Arc<Config>, factory: F) -> Result<Self> {
        let sources = MetricSource::configured(&config.exporters);
        Self::with_sources(config, sources, factory)
    }

    pub fn with_sources(config: Arc<Config>, sources: Vec<MetricSource>, factory: F) -> Result<Self> {
        let client = ExporterClient::new(&config.exporters)?;

        Ok(Self {
            config,
            sources,
            client,
            factory: Arc::new(factory),
        })
    }

    /// Runs a round now and then once per interval until the task is dropped.
    pub async fn start_scheduling_loop(&self) {
        info!(
            "Forwarding {} sources every {:?}",
            self.sources.len(),
            self.config.schedule.interval
        );

        let mut ticker = interval(self.config.schedule.interval);
        // An overrunning round gets one immediate follow-up, not a burst.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut round = 0u64;
        loop {
            ticker.tick().await;
            round += 1;
            self.run_round(round).await;
        }
    }

    /// Scrapes every source concurrently and returns once all of them are done.
    pub async fn run_round(&self, round: u64) -> RoundReport {
        let span = info_span!("round", round);
        async {
            let started_at = Utc::now();
            let started = Instant::now();
            info!("Starting round");

            let mut handles = Vec::with_capacity(self.sources.len());
            for source in &self.sources {
                let source = source.clone();
                let client = self.client.clone();
                let factory = self.factory.clone();
                let flush_timeout = self.config.schedule.flush_timeout;

                handles.push(tokio::spawn(
                    async move { forward_source(&source, &client, factory.as_ref(), flush_timeout).await }
                        .in_current_span(),
                ));
            }

            let mut sources = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.await {
                    Ok(report) => sources.push(report),
                    Err(e) => error!("Source task failed: {}", e),
                }
            }

            let report = RoundReport {
                round,
                started_at,
                duration: started.elapsed(),
                sources,
            };
            histogram!("relay_round_duration_seconds").record(report.duration.as_secs_f64());
            report.log_summary();
            report
        }
        .instrument(span)
        .await
    }
}
