// Port Layer - Interfaces for external dependencies

pub mod command_executor; // worker side
pub mod command_sink;
pub mod completion_log;
pub mod id_provider; // For deterministic testing
pub mod time_provider;
pub mod worker_client; // dispatcher side

// Re-exports
pub use command_executor::{CommandExecutor, ExecutionError, ExecutionResult};
pub use command_sink::CommandSink;
pub use completion_log::{CompletionLog, NullCompletionLog};
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
pub use worker_client::{CallError, WorkerClient, WorkerConnector};
