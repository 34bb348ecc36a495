// File-backed completion log
// reason: plain append-only text files, one per outcome

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use distribute_core::domain::Command;
use distribute_core::port::{CompletionLog, TimeProvider};

/// Appends one line per terminal result to `ok.log` / `fail.log`
///
/// Lines look like `2024-05-01T10:00:00Z [command]` and, for failures,
/// `2024-05-01T10:00:00Z [command] exit status 1: [output]`. Existing files are
/// appended to, never truncated.
pub struct FileCompletionLog {
    ok: Mutex<File>,
    failed: Mutex<File>,
    time_provider: Arc<dyn TimeProvider>,
}

impl FileCompletionLog {
    pub fn open(
        ok_path: impl AsRef<Path>,
        fail_path: impl AsRef<Path>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> io::Result<Self> {
        Ok(Self {
            ok: Mutex::new(Self::append(ok_path.as_ref())?),
            failed: Mutex::new(Self::append(fail_path.as_ref())?),
            time_provider,
        })
    }

    fn append(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn write_line(file: &Mutex<File>, line: String) -> io::Result<()> {
        let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
        // One write_all per entry
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

impl CompletionLog for FileCompletionLog {
    fn record_ok(&self, command: &Command) -> io::Result<()> {
        let line = format!("{} [{}]\n", self.time_provider.now_rfc3339(), command);
        Self::write_line(&self.ok, line)
    }

    fn record_failure(&self, command: &Command, output: &str) -> io::Result<()> {
        let line = format!(
            "{} [{}] {}\n",
            self.time_provider.now_rfc3339(),
            command,
            output.trim_end()
        );
        Self::write_line(&self.failed, line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distribute_core::port::time_provider::FixedTimeProvider;

    fn open_in(dir: &Path) -> FileCompletionLog {
        FileCompletionLog::open(
            dir.join("ok.log"),
            dir.join("fail.log"),
            Arc::new(FixedTimeProvider(0)),
        )
        .unwrap()
    }

    #[test]
    fn test_records_go_to_their_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = open_in(dir.path());

        log.record_ok(&Command::new("echo 1")).unwrap();
        log.record_failure(&Command::new("false"), "exit status 1: []")
            .unwrap();

        let ok = std::fs::read_to_string(dir.path().join("ok.log")).unwrap();
        let fail = std::fs::read_to_string(dir.path().join("fail.log")).unwrap();
        assert_eq!(ok, "1970-01-01T00:00:00Z [echo 1]\n");
        assert_eq!(fail, "1970-01-01T00:00:00Z [false] exit status 1: []\n");
    }

    #[test]
    fn test_failure_output_trailing_newline_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let log = open_in(dir.path());

        log.record_failure(&Command::new("ls /nope"), "exit status 2: [no such file]\n")
            .unwrap();

        let fail = std::fs::read_to_string(dir.path().join("fail.log")).unwrap();
        assert_eq!(fail.lines().count(), 1);
        assert!(fail.ends_with("[ls /nope] exit status 2: [no such file]\n"));
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        open_in(dir.path()).record_ok(&Command::new("a")).unwrap();
        open_in(dir.path()).record_ok(&Command::new("b")).unwrap();

        let ok = std::fs::read_to_string(dir.path().join("ok.log")).unwrap();
        assert_eq!(ok.lines().count(), 2);
        assert!(ok.lines().last().unwrap().ends_with("[b]"));
    }

    #[test]
    fn test_unwritable_location_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileCompletionLog::open(
            dir.path().join("missing/ok.log"),
            dir.path().join("fail.log"),
            Arc::new(FixedTimeProvider(0)),
        );
        assert!(result.is_err());
    }
}
