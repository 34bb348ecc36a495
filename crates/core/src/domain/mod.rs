// Domain Layer - Commands, jobs and result records

pub mod error;
pub mod job;
pub mod result;

// Re-exports
pub use error::DomainError;
pub use job::{Command, Job, JobId};
pub use result::{DispatcherStats, JobResult, Tally};
