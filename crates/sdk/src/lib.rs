//! Distribute SDK - Rust Client Library
//!
//! Clients for the two JSON-RPC surfaces: a worker's Execution Service
//! ([`WorkerRpcClient`], wrapped by [`HttpWorkerConnector`] for worker proxies) and a
//! manager ([`ManagerClient`], which is also a `CommandSink` for the command source).
//!
//! # Example
//!
//! ```no_run
//! use distribute_sdk::ManagerClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ManagerClient::connect("http://127.0.0.1:1235")?;
//!
//!     // Hand a worker to the manager
//!     let accepted = manager.register("10.0.0.7:1234").await?;
//!     println!("Worker accepted: {}", accepted);
//!
//!     let stats = manager.stats().await?;
//!     println!("Outstanding: {}", stats.outstanding);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::{HttpWorkerConnector, ManagerClient, WorkerRpcClient};
pub use error::{Result, SdkError};
pub use types::{
    DispatcherStats, EofResponse, PingResponse, ProcessFailureData, RegisterResponse,
    SubmitResponse, PROCESS_FAILED_CODE,
};
