//! Fake exporters and an in-memory publisher for the pipeline tests.

use async_trait::async_trait;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::error::PublishError;
use crate::exporter::{MetricLine, MetricSource};
use crate::forwarder::{CloseReport, Publisher, PublisherFactory};

pub const SAMPLE_BODY: &str = "# HELP x\n\nmetric_a 1\nmetric_b{l=\"v\"} 2\n";

pub enum Exporter {
    Ok,
    Unavailable,
    Slow(Duration),
}

impl Exporter {
    pub fn url(&self, addr: SocketAddr) -> String {
        match self {
            Exporter::Ok => format!("http://{addr}/metrics"),
            Exporter::Unavailable => format!("http://{addr}/unavailable"),
            Exporter::Slow(delay) => format!("http://{addr}/slow/{}", delay.as_millis()),
        }
    }
}

pub async fn spawn_exporter() -> SocketAddr {
    let app = Router::new()
        .route("/metrics", get(|| async { SAMPLE_BODY }))
        .route(
            "/unavailable",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "exporter down") }),
        )
        .route(
            "/slow/:millis",
            get(|Path(millis): Path<u64>| async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                SAMPLE_BODY
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Answers every connection with a `200` that promises 1000 bytes, sends
/// `body` and hangs up.
pub async fn spawn_truncating_exporter(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 1000\r\n\r\n";
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.flush().await;
            let _ = socket.shutdown().await;
        }
    });
    addr
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub key: String,
    pub value: String,
}

/// Records what would have been sent to Kafka.
#[derive(Default)]
pub struct RecordingFactory {
    pub published: Arc<Mutex<Vec<Published>>>,
    pub created: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<Mutex<usize>>,
    fail_once: Mutex<HashSet<String>>,
    rejected_key: Option<String>,
    close_report: CloseReport,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next producer created for `source` fails.
    pub fn fail_next_create(self, source: &str) -> Self {
        self.fail_once.lock().unwrap().insert(source.to_string());
        self
    }

    /// Every close reports this many messages as still in flight.
    pub fn with_unflushed(mut self, unflushed: usize) -> Self {
        self.close_report.unflushed = unflushed;
        self
    }

    /// Every close reports this many messages as undeliverable.
    pub fn with_failed_deliveries(mut self, failed: usize) -> Self {
        self.close_report.failed_deliveries = failed;
        self
    }

    /// Lines with this key fail to enqueue, as if the producer queue were full.
    pub fn reject_key(mut self, key: &str) -> Self {
        self.rejected_key = Some(key.to_string());
        self
    }

    pub fn published_to(&self, topic: &str) -> Vec<Published> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }
}

impl PublisherFactory for RecordingFactory {
    type Publisher = RecordingPublisher;

    fn create(&self, source: &MetricSource) -> Result<Self::Publisher, PublishError> {
        if self.fail_once.lock().unwrap().remove(&source.name) {
            return Err(PublishError::Create(KafkaError::ClientCreation(
                "broker refused".to_string(),
            )));
        }
        self.created.lock().unwrap().push(source.name.clone());

        Ok(RecordingPublisher {
            topic: source.topic.clone(),
            published: self.published.clone(),
            closed: self.closed.clone(),
            rejected_key: self.rejected_key.clone(),
            close_report: self.close_report,
        })
    }
}

pub struct RecordingPublisher {
    topic: String,
    published: Arc<Mutex<Vec<Published>>>,
    closed: Arc<Mutex<usize>>,
    rejected_key: Option<String>,
    close_report: CloseReport,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn publish(&mut self, line: &MetricLine) -> Result<(), PublishError> {
        if self.rejected_key.as_deref() == Some(line.key.as_str()) {
            return Err(PublishError::Enqueue(KafkaError::MessageProduction(
                RDKafkaErrorCode::QueueFull,
            )));
        }
        self.published.lock().unwrap().push(Published {
            topic: self.topic.clone(),
            key: line.key.clone(),
            value: line.value.clone(),
        });
        Ok(())
    }

    async fn close(self, _timeout: Duration) -> CloseReport {
        *self.closed.lock().unwrap() += 1;
        self.close_report
    }
}
