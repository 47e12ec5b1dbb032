pub mod fetcher;
pub mod parser;
pub mod source;

pub use fetcher::ExporterClient;
pub use parser::{parse_line, MetricLine};
pub use source::MetricSource;
