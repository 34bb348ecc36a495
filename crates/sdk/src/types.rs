//! SDK Request/Response Types
//!
//! Mirrors the JSON-RPC types from the api-rpc crate.

use serde::{Deserialize, Serialize};

pub use distribute_core::domain::DispatcherStats;

/// Error code a worker uses for "the command ran and did not succeed"
pub const PROCESS_FAILED_CODE: i32 = 4100;

/// Response from worker.ping.v1
#[derive(Debug, Clone, Deserialize)]
pub struct PingResponse {
    pub version: String,
}

/// Response from manager.register.v1
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub accepted: bool,
}

/// Response from jobs.submit.v1
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Final counts returned by jobs.eof.v1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EofResponse {
    pub succeeded: u64,
    pub failed: u64,
    pub completed: u64,
}

/// `data` of a PROCESS_FAILED error
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessFailureData {
    pub exit_code: Option<i32>,
    pub output: String,
}
