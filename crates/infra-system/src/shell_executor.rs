// Shell executor implementation
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use std::io::Read;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use distribute_core::application::worker::constants::DEFAULT_SHELL;
use distribute_core::domain;
use distribute_core::port::command_executor::{CommandExecutor, ExecutionError, ExecutionResult};
use distribute_core::port::TimeProvider;

/// Background read of the shared output pipe
type Reading = JoinHandle<std::io::Result<Vec<u8>>>;

/// Runs each command as `<shell> -c <command>`.
///
/// stdout and stderr share one pipe, so the captured output interleaves exactly as the
/// command wrote it. The executor keeps no state between calls.
pub struct ShellExecutor {
    time_provider: Arc<dyn TimeProvider>,
    shell: PathBuf,
    max_runtime: Option<Duration>,
}

impl ShellExecutor {
    /// Create a shell executor using `/bin/sh` and no runtime limit
    ///
    /// # Example
    /// ```ignore
    /// let executor = ShellExecutor::new(Arc::new(SystemTimeProvider))
    ///     .with_max_runtime(Some(Duration::from_secs(600)));
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            time_provider,
            shell: PathBuf::from(DEFAULT_SHELL),
            max_runtime: None,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Kill the command's whole process group once this much time has passed
    pub fn with_max_runtime(mut self, max_runtime: Option<Duration>) -> Self {
        self.max_runtime = max_runtime;
        self
    }

    /// Spawn the shell with both output streams on one pipe
    fn spawn(&self, command: &domain::Command) -> Result<(Child, Reading), ExecutionError> {
        let (mut reader, writer) =
            std::io::pipe().map_err(|e| ExecutionError::SpawnFailed(e.to_string()))?;
        let stderr_writer = writer
            .try_clone()
            .map_err(|e| ExecutionError::SpawnFailed(e.to_string()))?;

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command.as_str())
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer)
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(e.to_string()))?;
        // Our copies of the write end must go, or the reader never sees EOF
        drop(cmd);

        let reading = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).map(|_| buf)
        });
        Ok((child, reading))
    }

    async fn collect(reading: Reading) -> Result<String, ExecutionError> {
        match reading.await {
            Ok(Ok(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Ok(Err(e)) => Err(ExecutionError::IoError(e.to_string())),
            Err(e) => Err(ExecutionError::IoError(e.to_string())),
        }
    }

    /// Wait for exit, enforcing the max runtime if one is set
    async fn wait(&self, child: &mut Child) -> Result<Option<ExitStatus>, ExecutionError> {
        let Some(limit) = self.max_runtime else {
            let status = child
                .wait()
                .await
                .map_err(|e| ExecutionError::IoError(e.to_string()))?;
            return Ok(Some(status));
        };

        match timeout(limit, child.wait()).await {
            Ok(status) => status
                .map(Some)
                .map_err(|e| ExecutionError::IoError(e.to_string())),
            Err(_) => {
                Self::kill_group(child);
                let _ = child.wait().await;
                Ok(None)
            }
        }
    }

    /// SIGKILL the process group so grandchildren release the pipe too
    fn kill_group(child: &mut Child) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                warn!(pid = %pid, "Max runtime exceeded, killing process group");
                if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                    warn!(pid = %pid, error = %e, "killpg failed, killing shell only");
                    let _ = child.start_kill();
                }
            }
        }

        #[cfg(not(unix))]
        {
            warn!("Max runtime exceeded, killing process");
            let _ = child.start_kill();
        }
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &domain::Command) -> Result<ExecutionResult, ExecutionError> {
        let start_time = self.time_provider.now_millis();
        info!(command = %command, shell = %self.shell.display(), "Executing");

        let (mut child, reading) = self.spawn(command)?;
        let status = self.wait(&mut child).await?;
        let output = Self::collect(reading).await?;
        let duration_ms = self.time_provider.now_millis() - start_time;

        match status {
            Some(status) if status.success() => {
                info!(command = %command, duration_ms = %duration_ms, "Succeeded");
                Ok(ExecutionResult {
                    duration_ms,
                    output,
                })
            }
            Some(status) => {
                info!(
                    command = %command,
                    exit_code = ?status.code(),
                    duration_ms = %duration_ms,
                    "Failed"
                );
                Err(ExecutionError::Exited {
                    code: status.code(),
                    output,
                })
            }
            None => Err(ExecutionError::TimedOut {
                after_ms: duration_ms,
                output,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distribute_core::domain::Command as Cmd;
    use distribute_core::port::time_provider::SystemTimeProvider;

    fn executor() -> ShellExecutor {
        ShellExecutor::new(Arc::new(SystemTimeProvider))
    }

    #[tokio::test]
    async fn test_execute_success() {
        let result = executor().execute(&Cmd::new("echo hello")).await.unwrap();
        assert_eq!(result.output, "hello\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_process_failure() {
        let err = executor().execute(&Cmd::new("false")).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
        assert!(err.to_string().starts_with("exit status 1"));
    }

    #[tokio::test]
    async fn test_output_is_combined_in_order() {
        let err = executor()
            .execute(&Cmd::new("echo out; echo err >&2; echo again; exit 3"))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(3));
        assert_eq!(err.output(), "out\nerr\nagain\n");
        assert_eq!(err.to_string(), "exit status 3: [out\nerr\nagain\n]");
    }

    #[tokio::test]
    async fn test_missing_shell_is_spawn_failure() {
        let err = tokio_test::assert_err!(
            executor()
                .with_shell("/nonexistent/shell")
                .execute(&Cmd::new("true"))
                .await
        );
        assert!(matches!(err, ExecutionError::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn test_max_runtime_kills_command() {
        let started = std::time::Instant::now();
        let err = executor()
            .with_max_runtime(Some(Duration::from_millis(200)))
            .execute(&Cmd::new("echo started; sleep 10"))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            ExecutionError::TimedOut { output, .. } => assert_eq!(output, "started\n"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_isolated() {
        let exec = executor();
        let (ca, cb, cc) = (
            Cmd::new("sleep 0.2; echo a"),
            Cmd::new("echo b"),
            Cmd::new("echo c >&2; false"),
        );
        let (a, b, c) = tokio::join!(exec.execute(&ca), exec.execute(&cb), exec.execute(&cc));

        assert_eq!(a.unwrap().output, "a\n");
        assert_eq!(b.unwrap().output, "b\n");
        assert_eq!(c.unwrap_err().output(), "c\n");
    }
}
