// Batch distribution of many submissions

pub mod runner;
pub mod summary;

pub use runner::{BatchRunner, Submission};
pub use summary::{DistributionSummary, RecordError};
