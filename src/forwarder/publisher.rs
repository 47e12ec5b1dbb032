use async_trait::async_trait;
use std::time::Duration;

use crate::error::PublishError;
use crate::exporter::{MetricLine, MetricSource};

/// Sink for the lines of one source during one round.
#[async_trait]
pub trait Publisher: Send {
    /// Submits a line without waiting for it to be acknowledged.
    fn publish(&mut self, line: &MetricLine) -> Result<(), PublishError>;

    /// Waits up to `timeout` for outstanding messages, then releases the
    /// publisher.
    async fn close(self, timeout: Duration) -> CloseReport;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseReport {
    /// Messages still unacknowledged when the flush gave up.
    pub unflushed: usize,
    /// Messages the broker reported as undeliverable.
    pub failed_deliveries: usize,
}

/// Builds a fresh publisher for each source task.
pub trait PublisherFactory: Send + Sync + 'static {
    type Publisher: Publisher + 'static;

    fn create(&self, source: &MetricSource) -> Result<Self::Publisher, PublishError>;
}
