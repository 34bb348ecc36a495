// Command Sink Port
// Where a command source posts commands: the local dispatcher or a remote manager

use crate::domain::{Command, JobId};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Enqueue one command, returning the id it was tracked under
    async fn submit(&self, command: Command) -> Result<JobId>;

    /// No more commands will follow
    async fn signal_end_of_input(&self) -> Result<()>;
}
