pub mod round_scheduler;

pub use round_scheduler::{RoundReport, RoundScheduler};
