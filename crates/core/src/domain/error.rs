// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A result was reported for a job the dispatcher never handed out
    #[error("Result reported for unknown job: {0}")]
    UnknownJob(String),

    #[error("Dispatcher is closed")]
    DispatcherClosed,

    /// Every handle was dropped while jobs were still outstanding
    #[error("Dispatcher abandoned with {outstanding} job(s) outstanding")]
    Abandoned { outstanding: u64 },
}
