// Application Layer - Dispatcher, worker proxies and the command source

pub mod command_source;
pub mod dispatcher;
pub mod registry;
pub mod worker;

// Re-exports
pub use command_source::{post_command_file, post_commands, CommandReader, SourceError};
pub use dispatcher::{Completion, CompletionToken, Dispatcher, DispatcherHandle};
pub use registry::{WorkerPool, WorkerRegistry};
pub use worker::{rpc_url, worker_url, ProxyExit, WorkerProxy};
