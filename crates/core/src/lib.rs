// Distribute Core - Dispatcher, Worker Proxy & Ports
// NO infrastructure dependencies (RPC and process adapters live in their own crates)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
