// Result records and bookkeeping snapshots

use super::job::Job;
use serde::{Deserialize, Serialize};

/// Outcome of one RPC attempt, reported by a worker proxy to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    /// Command ran and exited zero
    Ok(Job),
    /// Command ran (or failed to start) and did not succeed; terminal
    Fail { job: Job, output: String },
    /// Transport failed; the job goes back on the queue and stays outstanding
    Repost(Job),
}

impl JobResult {
    pub fn job(&self) -> &Job {
        match self {
            JobResult::Ok(job) | JobResult::Repost(job) => job,
            JobResult::Fail { job, .. } => job,
        }
    }

    /// True for Ok and Fail
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobResult::Repost(_))
    }
}

/// Terminal result counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub ok: u64,
    pub failed: u64,
}

impl Tally {
    pub fn completed(&self) -> u64 {
        self.ok + self.failed
    }
}

impl std::fmt::Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} completed",
            self.ok,
            self.failed,
            self.completed()
        )
    }
}

/// Point-in-time view of the dispatcher bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    pub outstanding: u64,
    pub queued: usize,
    pub in_flight: usize,
    pub ok: u64,
    pub failed: u64,
    /// Transport failures that sent a job back to the queue
    pub reposted: u64,
    pub got_eof: bool,
    pub closed: bool,
}

impl DispatcherStats {
    pub fn tally(&self) -> Tally {
        Tally {
            ok: self.ok,
            failed: self.failed,
        }
    }
}
