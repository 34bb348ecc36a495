//! JSON-RPC API Layer
//!
//! Worker Execution Service and manager surface over JSON-RPC 2.0 (HTTP).

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{ManagerRpcServer, RpcServerConfig, WorkerRpcServer};
pub use jsonrpsee::server::ServerHandle;
