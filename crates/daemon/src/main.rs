//! Distribute Worker - Main Entry Point
//! Serves worker.execute.v1 until stopped

mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// Import workspace crates
use distribute_api_rpc::{RpcServerConfig, WorkerRpcServer};
use distribute_core::application::worker::constants::{DEFAULT_SHELL, DEFAULT_WORKER_PORT};
use distribute_core::port::time_provider::SystemTimeProvider;
use distribute_infra_system::ShellExecutor;
use distribute_sdk::ManagerClient;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_HOST: &str = "0.0.0.0";

#[derive(Parser, Debug)]
#[command(name = "distribute-worker")]
#[command(about = "Runs shell commands on behalf of a distribute dispatcher", long_about = None)]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "DISTRIBUTE_WORKER_PORT", default_value_t = DEFAULT_WORKER_PORT)]
    port: u16,

    /// Interface to bind
    #[arg(long, env = "DISTRIBUTE_WORKER_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Manager to register with at startup
    #[arg(long, env = "DISTRIBUTE_MANAGER")]
    manager: Option<String>,

    /// Address the manager should use to reach this worker (default: <hostname>:<port>)
    #[arg(long, env = "DISTRIBUTE_ADVERTISE")]
    advertise: Option<String>,

    /// Kill a command's process group after this many seconds
    #[arg(long = "max-runtime", value_name = "SECS")]
    max_runtime: Option<u64>,

    /// Shell used as `<shell> -c <command>`
    #[arg(long, default_value = DEFAULT_SHELL)]
    shell: String,

    /// Also write the operational log (JSON) to this file
    #[arg(long, env = "DISTRIBUTE_LOG_FILE")]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Initialize logging
    let log_file = args
        .log_file
        .as_deref()
        .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()));
    let _log_guard = logging::init(log_file.as_deref())?;

    info!("Distribute worker v{} starting...", VERSION);

    // 2. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let max_runtime = args.max_runtime.map(Duration::from_secs);
    let executor = Arc::new(
        ShellExecutor::new(time_provider)
            .with_shell(shellexpand::tilde(&args.shell).into_owned())
            .with_max_runtime(max_runtime),
    );
    info!(shell = %args.shell, max_runtime_secs = ?args.max_runtime, "Executor configured");

    // 3. Start JSON-RPC server
    let config = RpcServerConfig::new(args.host.clone(), args.port);
    let (addr, rpc_handle) = WorkerRpcServer::new(config, executor)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 4. Announce ourselves to the manager, if any
    if let Some(manager) = &args.manager {
        let advertise = match &args.advertise {
            Some(advertise) => advertise.clone(),
            None => default_advertise(addr.port())?,
        };
        register(manager, &advertise).await;
    }

    info!(addr = %addr, "Worker ready");
    info!("Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 6. Graceful shutdown
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;

    info!("Shutdown complete.");

    Ok(())
}

/// Registration failure is not fatal: the manager may still list us with --worker
async fn register(manager: &str, advertise: &str) {
    let client = match ManagerClient::connect(manager) {
        Ok(client) => client,
        Err(e) => {
            warn!(manager = %manager, error = %e, "Invalid manager address, not registering");
            return;
        }
    };

    match client.register(advertise).await {
        Ok(accepted) => info!(
            manager = %client.url(),
            advertise = %advertise,
            accepted,
            "Registered with manager"
        ),
        Err(e) => warn!(manager = %client.url(), error = %e, "Registration failed"),
    }
}

#[cfg(unix)]
fn default_advertise(port: u16) -> Result<String> {
    let hostname = nix::unistd::gethostname().context("Failed to read hostname")?;
    let hostname = hostname
        .into_string()
        .map_err(|_| anyhow::anyhow!("Hostname is not valid UTF-8; pass --advertise"))?;
    Ok(format!("{}:{}", hostname, port))
}

#[cfg(not(unix))]
fn default_advertise(_port: u16) -> Result<String> {
    anyhow::bail!("--advertise is required with --manager on this platform")
}
