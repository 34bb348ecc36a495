// Job Domain Model

use serde::{Deserialize, Serialize};

/// Job ID (UUID v4 in production)
pub type JobId = String;

/// One shell command line, continuation lines already joined.
///
/// Opaque on purpose: the dispatcher never parses or validates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(String);

impl Command {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Command {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A submitted command instance tracked by the dispatcher.
///
/// Submitting the same text twice yields two jobs with distinct ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub command: Command,
}

impl Job {
    pub fn new(id: impl Into<JobId>, command: impl Into<Command>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
        }
    }
}
