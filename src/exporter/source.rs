use crate::config::ExporterConfig;

/// One scrapeable endpoint and the topic its lines are forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSource {
    pub name: String,
    pub url: String,
    pub topic: String,
}

impl MetricSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            topic: topic.into(),
        }
    }

    /// The three exporters this deployment scrapes.
    pub fn configured(config: &ExporterConfig) -> Vec<Self> {
        vec![
            Self::new("Node Exporter", &config.node_url, "node-exporter-metrics"),
            Self::new("Spring BE Actuator", &config.spring_url, "spring-actuator-metrics"),
            Self::new("MySQL Exporter", &config.mysql_url, "mysql-exporter-metrics"),
        ]
    }
}
