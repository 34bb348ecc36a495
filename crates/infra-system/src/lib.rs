// Distribute Infrastructure - System Adapters
// Implements: CommandExecutor (shell), CompletionLog (append-only files)

pub mod file_completion_log;
pub mod shell_executor;

pub use file_completion_log::FileCompletionLog;
pub use shell_executor::ShellExecutor;
