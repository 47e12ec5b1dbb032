use ::config::{Environment, Map};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_SCRAPE_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_FLUSH_TIMEOUT_SECONDS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub exporters: ExporterConfig,
    pub schedule: ScheduleConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    /// Overrides librdkafka's `message.timeout.ms` when set.
    pub message_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub node_url: String,
    pub spring_url: String,
    pub mysql_url: String,
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub interval: Duration,
    pub flush_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub metrics_listen_addr: Option<SocketAddr>,
}

/// Flat view of the environment. Keys are lowercased by the `config` crate,
/// so `KAFKA_BROKER` lands in `kafka_broker`.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    kafka_broker: Option<String>,
    exporter_url_node: Option<String>,
    exporter_url_spring: Option<String>,
    exporter_url_mysql: Option<String>,
    scrape_interval_seconds: Option<String>,
    flush_timeout_seconds: Option<String>,
    http_timeout_seconds: Option<String>,
    kafka_message_timeout_ms: Option<String>,
    metrics_listen_addr: Option<String>,
}

impl Config {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    /// Loads the configuration from an explicit set of variables instead of
    /// the process environment.
    pub fn from_vars(vars: Map<String, String>) -> Result<Self, ConfigError> {
        Self::load(Environment::default().source(Some(vars)))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let raw: RawSettings = ::config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        // Checked in this order so the first missing variable is the one reported.
        let brokers = require(raw.kafka_broker, "KAFKA_BROKER")?;
        let node_url = require(raw.exporter_url_node, "EXPORTER_URL_NODE")?;
        let spring_url = require(raw.exporter_url_spring, "EXPORTER_URL_SPRING")?;
        let mysql_url = require(raw.exporter_url_mysql, "EXPORTER_URL_MYSQL")?;

        let interval_secs = parse_number(
            raw.scrape_interval_seconds,
            "SCRAPE_INTERVAL_SECONDS",
        )?
        .unwrap_or(DEFAULT_SCRAPE_INTERVAL_SECONDS);
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "SCRAPE_INTERVAL_SECONDS",
                message: "must be greater than zero".to_string(),
            });
        }

        let flush_secs = parse_number(raw.flush_timeout_seconds, "FLUSH_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_FLUSH_TIMEOUT_SECONDS);
        let request_timeout = parse_number(raw.http_timeout_seconds, "HTTP_TIMEOUT_SECONDS")?
            .map(Duration::from_secs);

        let message_timeout = parse_number(raw.kafka_message_timeout_ms, "KAFKA_MESSAGE_TIMEOUT_MS")?
            .map(Duration::from_millis);

        let metrics_listen_addr = match raw.metrics_listen_addr {
            Some(addr) => Some(addr.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                key: "METRICS_LISTEN_ADDR",
                message: e.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            kafka: KafkaConfig {
                brokers,
                message_timeout,
            },
            exporters: ExporterConfig {
                node_url,
                spring_url,
                mysql_url,
                request_timeout,
            },
            schedule: ScheduleConfig {
                interval: Duration::from_secs(interval_secs),
                flush_timeout: Duration::from_secs(flush_secs),
            },
            telemetry: TelemetryConfig { metrics_listen_addr },
        })
    }
}

fn require(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value.ok_or(ConfigError::MissingVar(key))
}

fn parse_number(value: Option<String>, key: &'static str) -> Result<Option<u64>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key,
                message: e.to_string(),
            })
        })
        .transpose()
}
