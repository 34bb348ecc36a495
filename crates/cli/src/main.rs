//! Distribute CLI - dispatcher, manager and operator commands
//!
//! `run` reads a command file and farms it out to workers in one process. `manager`
//! hosts only the dispatcher and accepts commands over RPC from `submit`.

mod logging;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tracing::{error, info, warn};

use distribute_api_rpc::{ManagerRpcServer, RpcServerConfig, ServerHandle};
use distribute_core::application::worker::constants::{
    DEFAULT_COMMAND_FILE, DEFAULT_FAIL_LOG, DEFAULT_OK_LOG,
};
use distribute_core::application::{
    post_command_file, worker_url, Dispatcher, DispatcherHandle, ProxyExit, WorkerPool,
};
use distribute_core::domain::{DispatcherStats, DomainError, Tally};
use distribute_core::port::id_provider::UuidProvider;
use distribute_core::port::time_provider::SystemTimeProvider;
use distribute_infra_system::FileCompletionLog;
use distribute_sdk::{HttpWorkerConnector, ManagerClient};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_MANAGER_LISTEN: &str = "0.0.0.0:1235";
const DEFAULT_MANAGER_ADDR: &str = "127.0.0.1";

#[derive(Parser)]
#[command(name = "distribute")]
#[command(about = "Run a file of shell commands across remote workers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Also write the operational log (JSON) to this file
    #[arg(long, global = true, env = "DISTRIBUTE_LOG_FILE")]
    log_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read commands and dispatch them to workers until all are done
    Run {
        /// File of newline-terminated commands (`\` at end of line continues it)
        #[arg(long, env = "DISTRIBUTE_CMDFILE", default_value = DEFAULT_COMMAND_FILE)]
        cmdfile: String,

        #[command(flatten)]
        dispatch: DispatchArgs,

        /// Also accept worker registrations on this address
        #[arg(long)]
        listen: Option<String>,
    },

    /// Host a dispatcher that takes commands from `distribute submit`
    Manager {
        #[command(flatten)]
        dispatch: DispatchArgs,

        /// Address for registrations and submissions
        #[arg(long, env = "DISTRIBUTE_LISTEN", default_value = DEFAULT_MANAGER_LISTEN)]
        listen: String,
    },

    /// Send a command file to a manager and wait for the final counts
    Submit {
        #[arg(long, env = "DISTRIBUTE_MANAGER", default_value = DEFAULT_MANAGER_ADDR)]
        manager: String,

        #[arg(long, env = "DISTRIBUTE_CMDFILE", default_value = DEFAULT_COMMAND_FILE)]
        cmdfile: String,
    },

    /// Show a manager's running summary
    Status {
        #[arg(long, env = "DISTRIBUTE_MANAGER", default_value = DEFAULT_MANAGER_ADDR)]
        manager: String,

        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Options shared by every process that owns a dispatcher
#[derive(Args, Debug)]
struct DispatchArgs {
    /// Worker address (`host`, `host:port` or URL); repeatable
    #[arg(long = "worker", env = "DISTRIBUTE_WORKERS", value_delimiter = ',')]
    workers: Vec<String>,

    /// Append-only log of successful commands
    #[arg(long, default_value = DEFAULT_OK_LOG)]
    ok_log: String,

    /// Append-only log of failed commands with their output
    #[arg(long, default_value = DEFAULT_FAIL_LOG)]
    fail_log: String,

    /// Give up on a remote call after this many seconds and repost its command
    #[arg(long = "call-timeout", value_name = "SECS")]
    call_timeout: Option<u64>,
}

#[derive(Tabled)]
struct SummaryRow {
    succeeded: u64,
    failed: u64,
    completed: u64,
}

#[derive(Tabled)]
struct StatRow {
    field: &'static str,
    value: String,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Dispatcher, proxies and completion logs of one process
struct DispatchSession {
    dispatcher: DispatcherHandle,
    join: tokio::task::JoinHandle<std::result::Result<Tally, DomainError>>,
    pool: Arc<WorkerPool>,
}

impl DispatchSession {
    fn start(args: &DispatchArgs) -> Result<Self> {
        let completion_log = FileCompletionLog::open(
            expand(&args.ok_log),
            expand(&args.fail_log),
            Arc::new(SystemTimeProvider),
        )
        .context("Failed to open completion logs")?;

        let (dispatcher, join) =
            Dispatcher::spawn(Arc::new(completion_log), Arc::new(UuidProvider));

        let call_timeout = args.call_timeout.map(Duration::from_secs);
        let pool = Arc::new(
            WorkerPool::new(
                dispatcher.clone(),
                Arc::new(HttpWorkerConnector::new(call_timeout)),
            )
            .with_call_timeout(call_timeout),
        );
        for worker in &args.workers {
            pool.add_worker(&worker_url(worker));
        }

        Ok(Self {
            dispatcher,
            join,
            pool,
        })
    }

    async fn serve(&self, listen: &str) -> Result<ServerHandle> {
        let config = RpcServerConfig::from_listen(listen).map_err(|e| anyhow::anyhow!(e))?;
        let (addr, handle) =
            ManagerRpcServer::new(config, self.dispatcher.clone(), self.pool.clone())
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("Manager RPC server start failed: {}", e))?;
        info!(addr = %addr, "Accepting registrations");
        Ok(handle)
    }

    /// Wait for Closed, then for every proxy to wind down
    async fn finish(self) -> Result<Tally> {
        let tally = match self.join.await.context("Dispatcher task failed")? {
            Ok(tally) => tally,
            Err(e) => {
                error!(error = %e, "Dispatcher aborted");
                anyhow::bail!("dispatcher aborted: {}", e);
            }
        };

        let exits = self.pool.join_all().await;
        let lost = exits.iter().filter(|e| **e != ProxyExit::Drained).count();
        if lost > 0 {
            warn!(lost, "Some workers were lost along the way");
        }

        info!(
            succeeded = tally.ok,
            failed = tally.failed,
            completed = tally.completed(),
            "All jobs completed"
        );
        Ok(tally)
    }
}

async fn stop_server(handle: Option<ServerHandle>) {
    if let Some(handle) = handle {
        if handle.stop().is_ok() {
            handle.stopped().await;
        }
    }
}

fn print_summary(tally: Tally) {
    let row = SummaryRow {
        succeeded: tally.ok,
        failed: tally.failed,
        completed: tally.completed(),
    };
    let headline = if tally.failed == 0 {
        "✓ All commands succeeded".green().bold()
    } else {
        format!("✗ {} command(s) failed", tally.failed).red().bold()
    };

    println!("{}", headline);
    println!();
    println!("{}", Table::new(vec![row]));
}

fn print_stats(manager: &str, stats: &DispatcherStats) {
    let state = if stats.closed {
        "CLOSED".yellow()
    } else if stats.got_eof {
        "DRAINING".cyan()
    } else {
        "RUNNING".green()
    };
    println!("{}", "Dispatcher Status".cyan().bold());
    println!("  {} {}", "Manager:".bold(), manager);
    println!("  {} {}", "State:".bold(), state);
    println!();

    let rows: Vec<StatRow> = [
        ("outstanding", stats.outstanding.to_string()),
        ("queued", stats.queued.to_string()),
        ("in flight", stats.in_flight.to_string()),
        ("succeeded", stats.ok.to_string()),
        ("failed", stats.failed.to_string()),
        ("reposted", stats.reposted.to_string()),
        ("end of input", stats.got_eof.to_string()),
    ]
    .into_iter()
    .map(|(field, value)| StatRow { field, value })
    .collect();
    println!("{}", Table::new(rows));
}

async fn run(cmdfile: &str, dispatch: &DispatchArgs, listen: Option<&str>) -> Result<Tally> {
    if dispatch.workers.is_empty() && listen.is_none() {
        anyhow::bail!("no workers: give at least one --worker or --listen for registrations");
    }

    let session = DispatchSession::start(dispatch)?;
    let server = match listen {
        Some(listen) => Some(session.serve(listen).await?),
        None => None,
    };

    let posted = post_command_file(&expand(cmdfile), &session.dispatcher)
        .await
        .context("Command source failed")?;
    info!(posted, "All commands posted");

    let tally = session.finish().await;
    stop_server(server).await;
    tally
}

async fn manager(dispatch: &DispatchArgs, listen: &str) -> Result<Tally> {
    let session = DispatchSession::start(dispatch)?;
    let server = session.serve(listen).await?;
    info!("Waiting for commands; `distribute submit` ends the session");

    let tally = session.finish().await;
    stop_server(Some(server)).await;
    tally
}

async fn submit(manager: &str, cmdfile: &str) -> Result<Tally> {
    let client = ManagerClient::connect(manager)?;
    info!(manager = %client.url(), "Submitting commands");

    let posted = post_command_file(&expand(cmdfile), &client)
        .await
        .context("Submission failed")?;
    let summary = client
        .summary()
        .context("Manager did not report final counts")?;
    info!(
        posted,
        succeeded = summary.succeeded,
        failed = summary.failed,
        completed = summary.completed,
        "Manager finished"
    );

    Ok(Tally {
        ok: summary.succeeded,
        failed: summary.failed,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_file = cli.log_file.as_deref().map(expand);
    let _log_guard = logging::init(log_file.as_deref())?;

    info!("distribute v{}", VERSION);

    match cli.command {
        Commands::Run {
            cmdfile,
            dispatch,
            listen,
        } => {
            let tally = run(&cmdfile, &dispatch, listen.as_deref()).await?;
            print_summary(tally);
        }

        Commands::Manager { dispatch, listen } => {
            let tally = manager(&dispatch, &listen).await?;
            print_summary(tally);
        }

        Commands::Submit { manager, cmdfile } => {
            let tally = submit(&manager, &cmdfile).await?;
            print_summary(tally);
        }

        Commands::Status { manager, json } => {
            let client = ManagerClient::connect(&manager)?;
            let stats = client
                .stats()
                .await
                .with_context(|| format!("Failed to reach manager at {}", client.url()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(client.url(), &stats);
            }
        }
    }

    Ok(())
}
