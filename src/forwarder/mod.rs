pub mod collector;
pub mod kafka_producer;
pub mod publisher;

pub use collector::{forward_source, SourceOutcome, SourceReport};
pub use kafka_producer::KafkaPublisherFactory;
pub use publisher::{CloseReport, Publisher, PublisherFactory};
