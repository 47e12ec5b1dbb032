use rdkafka::error::KafkaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required environment variable '{0}' is not set")]
    MissingVar(&'static str),

    #[error("Invalid value for '{key}': {message}")]
    Invalid {
        key: &'static str,
        message: String,
    },

    #[error("Failed to read environment: {0}")]
    Source(#[from] ::config::ConfigError),
}

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Unexpected response status {status}")]
    Status {
        status: reqwest::StatusCode,
    },

    #[error("Failed to read response body: {0}")]
    Read(#[source] reqwest::Error),
}

impl ScrapeError {
    /// Short label used when counting failures.
    pub fn reason(&self) -> &'static str {
        match self {
            ScrapeError::Request(_) => "request",
            ScrapeError::Status { .. } => "status",
            ScrapeError::Read(_) => "read",
        }
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Kafka producer creation failed: {0}")]
    Create(#[source] KafkaError),

    #[error("Failed to enqueue message: {0}")]
    Enqueue(#[source] KafkaError),
}
