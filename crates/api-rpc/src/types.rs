//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results for the worker and manager surfaces.

use distribute_core::domain::{DispatcherStats, Tally};
use serde::{Deserialize, Serialize};

/// worker.execute.v1 - Run one shell command
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub command: String,
}

/// worker.ping.v1 - Session check
#[derive(Debug, Default, Deserialize)]
pub struct PingRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct PingResponse {
    pub version: String,
}

/// manager.register.v1 - A worker announces itself
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub accepted: bool,
}

/// jobs.submit.v1 - Post one command
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// jobs.eof.v1 - End of input; answered once the dispatcher closes
#[derive(Debug, Default, Deserialize)]
pub struct EofRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct EofResponse {
    pub succeeded: u64,
    pub failed: u64,
    pub completed: u64,
}

impl From<Tally> for EofResponse {
    fn from(tally: Tally) -> Self {
        Self {
            succeeded: tally.ok,
            failed: tally.failed,
            completed: tally.completed(),
        }
    }
}

/// admin.stats.v1 - Running summary
#[derive(Debug, Default, Deserialize)]
pub struct StatsRequest {
    // No parameters needed
}

pub type StatsResponse = DispatcherStats;
