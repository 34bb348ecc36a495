// Worker constants (no magic values)
use std::time::Duration;

/// Port a worker listens on when none is given
pub const DEFAULT_WORKER_PORT: u16 = 1234;

/// Port a manager listens on for registrations and remote submissions
pub const DEFAULT_MANAGER_PORT: u16 = 1235;

/// Shell used to run commands on the worker
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Command file read by the command source when none is given
pub const DEFAULT_COMMAND_FILE: &str = "cmds";

/// Append-only log of successful commands
pub const DEFAULT_OK_LOG: &str = "ok.log";

/// Append-only log of failed commands with their output
pub const DEFAULT_FAIL_LOG: &str = "fail.log";

/// Stand-in for "no deadline" where the HTTP client insists on one (365 days)
pub const UNBOUNDED_CALL_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Deadline for the session check made when a proxy connects (10s)
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tail of captured output kept in a process failure (256 KiB)
///
/// Failure replies carry the output twice (message and data), escaped, and must stay
/// well under the 10 MB JSON-RPC response limit.
pub const MAX_FAILURE_OUTPUT_BYTES: usize = 256 * 1024;
