// Worker Proxy - dispatcher-side loop driving one remote worker

pub mod constants;

use self::constants::DEFAULT_WORKER_PORT;
use crate::application::dispatcher::DispatcherHandle;
use crate::domain::{Command, JobResult};
use crate::port::{CallError, WorkerClient, WorkerConnector};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Why a proxy loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyExit {
    /// Dispatcher closed; no more work
    Drained,
    /// A call failed in transport; the job was reposted and the session abandoned
    Disconnected,
    /// The worker could not be reached; no work was taken
    ConnectFailed,
}

/// Canonical form of an RPC address: `host` becomes `http://host:<default_port>`
///
/// A port or scheme that is already present is kept.
pub fn rpc_url(address: &str, default_port: u16) -> String {
    let address = address.trim().trim_end_matches('/');
    let (scheme, rest) = address.split_once("://").unwrap_or(("http", address));
    let has_port = rest
        .rfind(':')
        .is_some_and(|i| !rest[i..].contains(']'));

    if has_port {
        format!("{}://{}", scheme, rest)
    } else {
        format!("{}://{}:{}", scheme, rest, default_port)
    }
}

/// [`rpc_url`] with the worker port (1234)
pub fn worker_url(address: &str) -> String {
    rpc_url(address, DEFAULT_WORKER_PORT)
}

/// Pulls jobs from the dispatcher and runs them on one remote worker
pub struct WorkerProxy {
    address: String,
    connector: Arc<dyn WorkerConnector>,
    dispatcher: DispatcherHandle,
    call_timeout: Option<Duration>,
}

impl WorkerProxy {
    pub fn new(
        address: impl Into<String>,
        connector: Arc<dyn WorkerConnector>,
        dispatcher: DispatcherHandle,
    ) -> Self {
        Self {
            address: address.into(),
            connector,
            dispatcher,
            call_timeout: None,
        }
    }

    /// Bound each remote call; an elapsed call counts as a transport failure
    pub fn with_call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run until the dispatcher closes or the connection breaks
    pub async fn run(self) -> ProxyExit {
        info!(worker = %self.address, "Worker proxy started");

        let client = match self.connector.connect(&self.address).await {
            Ok(client) => client,
            Err(e) => {
                warn!(worker = %self.address, error = %e, "Worker unreachable");
                return ProxyExit::ConnectFailed;
            }
        };
        info!(worker = %self.address, "Worker connected");

        while let Some(job) = self.dispatcher.request_work().await {
            info!(
                worker = %self.address,
                job_id = %job.id,
                command = %job.command,
                "Dispatched"
            );

            let (result, exit) = match self.call(client.as_ref(), &job.command).await {
                Ok(()) => (JobResult::Ok(job), None),
                Err(CallError::ProcessFailure { output }) => {
                    (JobResult::Fail { job, output }, None)
                }
                Err(CallError::Transport(reason)) => {
                    warn!(
                        worker = %self.address,
                        job_id = %job.id,
                        error = %reason,
                        "RPC error, reposting and dropping connection"
                    );
                    (JobResult::Repost(job), Some(ProxyExit::Disconnected))
                }
            };

            if let Err(e) = self.dispatcher.report_result(result) {
                error!(worker = %self.address, error = %e, "Dispatcher gone while reporting");
                return ProxyExit::Drained;
            }
            if let Some(exit) = exit {
                return exit;
            }
        }

        info!(worker = %self.address, "Worker proxy done");
        ProxyExit::Drained
    }

    async fn call(&self, client: &dyn WorkerClient, command: &Command) -> Result<(), CallError> {
        let Some(limit) = self.call_timeout else {
            return client.execute(command).await;
        };

        match timeout(limit, client.execute(command)).await {
            Ok(result) => result,
            Err(_) => Err(CallError::Transport(format!(
                "call timed out after {}ms",
                limit.as_millis()
            ))),
        }
    }
}
