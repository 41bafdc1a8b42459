pub mod orchestrator;
pub mod report;

pub use orchestrator::BulkProcessor;
pub use report::{BulkEntry, BulkReport};
