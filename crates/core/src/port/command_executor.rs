// Command Executor Port (worker side)
// Abstraction for running one shell command and capturing its combined output

use crate::domain::Command;
use async_trait::async_trait;
use thiserror::Error;

/// Result of a successful execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub duration_ms: i64,
    /// stdout and stderr interleaved as written
    pub output: String,
}

/// Execution errors
///
/// Every variant means "the command ran and did not succeed" (or never started).
/// None of them is a transport problem, so none of them is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Process exited non-zero, or was killed by a signal (`code` is None)
    #[error("{label}: [{output}]", label = exit_label(.code))]
    Exited { code: Option<i32>, output: String },

    #[error("exit status: spawn failed: {0}")]
    SpawnFailed(String),

    #[error("exit status: killed after {after_ms}ms: [{output}]")]
    TimedOut { after_ms: i64, output: String },

    #[error("exit status: IO error: {0}")]
    IoError(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "exit status: terminated by signal".to_string(),
    }
}

impl ExecutionError {
    /// Captured combined output, empty when the process never produced any
    pub fn output(&self) -> &str {
        match self {
            ExecutionError::Exited { output, .. } | ExecutionError::TimedOut { output, .. } => {
                output
            }
            ExecutionError::SpawnFailed(_) | ExecutionError::IoError(_) => "",
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionError::Exited { code, .. } => *code,
            _ => None,
        }
    }

    /// Keep only the last `max_bytes` of captured output
    ///
    /// The kept tail is prefixed with `[<n> bytes truncated]`.
    pub fn truncated(self, max_bytes: usize) -> Self {
        match self {
            ExecutionError::Exited { code, output } => ExecutionError::Exited {
                code,
                output: output_tail(output, max_bytes),
            },
            ExecutionError::TimedOut { after_ms, output } => ExecutionError::TimedOut {
                after_ms,
                output: output_tail(output, max_bytes),
            },
            other => other,
        }
    }
}

fn output_tail(output: String, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output;
    }
    let mut start = output.len() - max_bytes;
    while !output.is_char_boundary(start) {
        start += 1;
    }
    format!("[{} bytes truncated]{}", start, &output[start..])
}

/// Command Executor trait
///
/// Implementations:
/// - ShellExecutor: `/bin/sh -c <command>` with a shared stdout/stderr pipe
///
/// Implementations hold no per-invocation shared state; concurrent calls must be safe.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion
    ///
    /// # Errors
    /// - ExecutionError::Exited if the process exits non-zero
    /// - ExecutionError::SpawnFailed if the shell cannot be started
    /// - ExecutionError::TimedOut if a configured max runtime elapsed
    async fn execute(&self, command: &Command) -> Result<ExecutionResult, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock executor understanding just enough shell for tests:
    /// `true` succeeds, `false` fails, `echo X` succeeds with output X,
    /// `sleep N` waits N milliseconds then succeeds.
    #[derive(Clone, Default)]
    pub struct MockCommandExecutor {
        executed: Arc<Mutex<Vec<String>>>,
    }

    impl MockCommandExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn execute(&self, command: &Command) -> Result<ExecutionResult, ExecutionError> {
            self.executed.lock().unwrap().push(command.to_string());

            let text = command.as_str().trim();
            if text == "false" {
                return Err(ExecutionError::Exited {
                    code: Some(1),
                    output: String::new(),
                });
            }
            if let Some(ms) = text.strip_prefix("sleep ") {
                let ms: u64 = ms.parse().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            let output = text
                .strip_prefix("echo ")
                .map(|s| format!("{}\n", s))
                .unwrap_or_default();
            Ok(ExecutionResult {
                duration_ms: 1,
                output,
            })
        }
    }
}
