// Completion Log Port
// Durable record of terminal results: one log for successes, one for failures

use crate::domain::Command;

/// Sink for terminal results, written from inside the dispatcher loop.
///
/// Called synchronously; implementations must not block on anything but local I/O.
pub trait CompletionLog: Send + Sync {
    fn record_ok(&self, command: &Command) -> std::io::Result<()>;

    fn record_failure(&self, command: &Command, output: &str) -> std::io::Result<()>;
}

/// Discards everything (dispatchers that only report counts)
pub struct NullCompletionLog;

impl CompletionLog for NullCompletionLog {
    fn record_ok(&self, _command: &Command) -> std::io::Result<()> {
        Ok(())
    }

    fn record_failure(&self, _command: &Command, _output: &str) -> std::io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Keeps entries in memory
    #[derive(Default)]
    pub struct InMemoryCompletionLog {
        ok: Mutex<Vec<String>>,
        failed: Mutex<Vec<(String, String)>>,
    }

    impl InMemoryCompletionLog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ok_entries(&self) -> Vec<String> {
            self.ok.lock().unwrap().clone()
        }

        pub fn failed_entries(&self) -> Vec<(String, String)> {
            self.failed.lock().unwrap().clone()
        }
    }

    impl CompletionLog for InMemoryCompletionLog {
        fn record_ok(&self, command: &Command) -> std::io::Result<()> {
            self.ok.lock().unwrap().push(command.to_string());
            Ok(())
        }

        fn record_failure(&self, command: &Command, output: &str) -> std::io::Result<()> {
            self.failed
                .lock()
                .unwrap()
                .push((command.to_string(), output.to_string()));
            Ok(())
        }
    }

    /// Fails every write
    pub struct BrokenCompletionLog;

    impl CompletionLog for BrokenCompletionLog {
        fn record_ok(&self, _command: &Command) -> std::io::Result<()> {
            Err(std::io::Error::other("disk full"))
        }

        fn record_failure(&self, _command: &Command, _output: &str) -> std::io::Result<()> {
            Err(std::io::Error::other("disk full"))
        }
    }
}
