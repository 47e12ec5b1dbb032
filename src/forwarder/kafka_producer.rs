use async_trait::async_trait;
use metrics::counter;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaResult;
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error};

use super::publisher::{CloseReport, Publisher, PublisherFactory};
use crate::config::KafkaConfig;
use crate::error::PublishError;
use crate::exporter::{MetricLine, MetricSource};

/// Every message goes to the first partition of its topic.
const PARTITION: i32 = 0;

const LISTENER_GRACE: Duration = Duration::from_secs(1);

pub struct KafkaPublisherFactory {
    config: KafkaConfig,
}

impl KafkaPublisherFactory {
    pub fn new(config: &KafkaConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl PublisherFactory for KafkaPublisherFactory {
    type Publisher = KafkaPublisher;

    fn create(&self, source: &MetricSource) -> Result<KafkaPublisher, PublishError> {
        KafkaPublisher::new(&self.config, &source.topic)
    }
}

/// A producer bound to one topic, plus the task that drains its delivery reports.
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    submitted: usize,
    deliveries: mpsc::UnboundedSender<DeliveryFuture>,
    listener: JoinHandle<usize>,
}

impl KafkaPublisher {
    pub fn new(config: &KafkaConfig, topic: &str) -> Result<Self, PublishError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.brokers)
            .set("acks", "all")
            .set("retries", "5");
        if let Some(timeout) = config.message_timeout {
            client_config.set("message.timeout.ms", timeout.as_millis().to_string());
        }
        let producer: FutureProducer = client_config.create().map_err(PublishError::Create)?;

        let (deliveries, receiver) = mpsc::unbounded_channel();
        let listener = tokio::spawn(drain_deliveries(topic.to_string(), receiver));

        Ok(Self {
            producer,
            topic: topic.to_string(),
            submitted: 0,
            deliveries,
            listener,
        })
    }
}

/// Logs every failed delivery and returns how many there were.
async fn drain_deliveries(
    topic: String,
    mut receiver: mpsc::UnboundedReceiver<DeliveryFuture>,
) -> usize {
    let mut failed = 0;
    while let Some(delivery) = receiver.recv().await {
        match delivery.await {
            Ok(Ok(_)) => continue,
            Ok(Err((e, _message))) => error!("Delivery to {} failed: {}", topic, e),
            Err(_) => error!("Delivery to {} was cancelled before completing", topic),
        }
        failed += 1;
        counter!("relay_delivery_failures_total", "topic" => topic.clone()).increment(1);
    }
    debug!("Delivery listener for {} stopped after {} failures", topic, failed);
    failed
}

/// Messages left over after the blocking flush. A flush task that died
/// counts every submitted message as unflushed.
fn unflushed_after(
    topic: &str,
    flushed: Result<(KafkaResult<()>, usize), JoinError>,
    submitted: usize,
) -> usize {
    match flushed {
        Ok((Ok(()), remaining)) => remaining,
        Ok((Err(e), remaining)) => {
            debug!("Flush of {} did not complete: {}", topic, e);
            remaining
        }
        Err(e) => {
            error!("Flush task for {} failed: {}", topic, e);
            submitted
        }
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    fn publish(&mut self, line: &MetricLine) -> Result<(), PublishError> {
        let record = FutureRecord::to(&self.topic)
            .partition(PARTITION)
            .key(line.key.as_str())
            .payload(line.value.as_str());

        match self.producer.send_result(record) {
            Ok(delivery) => {
                // The listener only stops once the sender is dropped in `close`.
                let _ = self.deliveries.send(delivery);
                self.submitted += 1;
                Ok(())
            }
            Err((e, _)) => Err(PublishError::Enqueue(e)),
        }
    }

    async fn close(self, timeout: Duration) -> CloseReport {
        let KafkaPublisher {
            producer,
            topic,
            submitted,
            deliveries,
            mut listener,
        } = self;
        drop(deliveries);

        // flush blocks the calling thread, and so does tearing the producer down.
        let flushed = tokio::task::spawn_blocking(move || {
            let result = producer.flush(timeout);
            let remaining = match result {
                Ok(()) => 0,
                Err(_) => producer.in_flight_count().max(0) as usize,
            };
            drop(producer);
            (result, remaining)
        })
        .await;

        let mut report = CloseReport {
            unflushed: unflushed_after(&topic, flushed, submitted),
            failed_deliveries: 0,
        };

        if report.unflushed == 0 {
            // Delivery reports may still be in transit from the poll thread.
            match tokio::time::timeout(LISTENER_GRACE, &mut listener).await {
                Ok(Ok(failed)) => report.failed_deliveries = failed,
                Ok(Err(e)) => error!("Delivery listener for {} failed: {}", topic, e),
                Err(_) => debug!("Delivery listener for {} still waiting, dropping it", topic),
            }
        }
        listener.abort();

        report
    }
}
