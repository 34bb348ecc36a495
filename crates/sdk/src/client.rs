//! Distribute Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{
    DispatcherStats, EofResponse, PingResponse, RegisterResponse, SubmitResponse,
    PROCESS_FAILED_CODE,
};
use async_trait::async_trait;
use distribute_core::application::rpc_url;
use distribute_core::application::worker::constants::{
    CONNECT_TIMEOUT, DEFAULT_MANAGER_PORT, UNBOUNDED_CALL_TIMEOUT,
};
use distribute_core::application::worker_url;
use distribute_core::domain::{Command, JobId};
use distribute_core::port::{CallError, CommandSink, WorkerClient, WorkerConnector};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Process failure only for the dedicated error code; everything else is transport
fn classify(err: ClientError) -> CallError {
    match err {
        ClientError::Call(obj) if obj.code() == PROCESS_FAILED_CODE => {
            CallError::ProcessFailure {
                output: obj.message().to_string(),
            }
        }
        other => CallError::Transport(other.to_string()),
    }
}

fn http_client(url: &str, request_timeout: Duration) -> std::result::Result<HttpClient, String> {
    HttpClientBuilder::default()
        .request_timeout(request_timeout)
        .build(url)
        .map_err(|e| format!("Failed to create client for {}: {}", url, e))
}

/// Client for one worker's Execution Service
pub struct WorkerRpcClient {
    address: String,
    client: HttpClient,
}

impl WorkerRpcClient {
    /// Build a client for `address` (`host`, `host:port` or a full URL)
    ///
    /// Nothing is sent until the first call.
    pub fn new(address: &str, request_timeout: Duration) -> std::result::Result<Self, CallError> {
        let address = worker_url(address);
        let client = http_client(&address, request_timeout).map_err(CallError::Transport)?;
        Ok(Self { address, client })
    }

    /// worker.ping.v1
    pub async fn ping(&self) -> std::result::Result<PingResponse, CallError> {
        self.client
            .request("worker.ping.v1", rpc_params![])
            .await
            .map_err(classify)
    }
}

#[async_trait]
impl WorkerClient for WorkerRpcClient {
    fn address(&self) -> &str {
        &self.address
    }

    /// worker.execute.v1
    async fn execute(&self, command: &Command) -> std::result::Result<(), CallError> {
        let mut params = ObjectParams::new();
        params
            .insert("command", command.as_str())
            .map_err(|e| CallError::Transport(e.to_string()))?;

        self.client
            .request::<(), _>("worker.execute.v1", params)
            .await
            .map_err(classify)
    }
}

/// Opens [`WorkerRpcClient`] sessions, checked with a ping
pub struct HttpWorkerConnector {
    call_timeout: Option<Duration>,
}

impl HttpWorkerConnector {
    /// `call_timeout` of None means calls may take as long as the command runs
    pub fn new(call_timeout: Option<Duration>) -> Self {
        Self { call_timeout }
    }
}

#[async_trait]
impl WorkerConnector for HttpWorkerConnector {
    async fn connect(
        &self,
        address: &str,
    ) -> std::result::Result<Arc<dyn WorkerClient>, CallError> {
        let client = WorkerRpcClient::new(
            address,
            self.call_timeout.unwrap_or(UNBOUNDED_CALL_TIMEOUT),
        )?;

        let pong = timeout(CONNECT_TIMEOUT, client.ping())
            .await
            .map_err(|_| {
                CallError::Transport(format!(
                    "no answer from {} within {}s",
                    client.address(),
                    CONNECT_TIMEOUT.as_secs()
                ))
            })??;
        debug!(worker = %client.address(), version = %pong.version, "Worker answered ping");

        Ok(Arc::new(client))
    }
}

/// Client for a manager's submission and registration surface
///
/// # Example
///
/// ```no_run
/// use distribute_sdk::ManagerClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ManagerClient::connect("127.0.0.1")?;
/// let job_id = client.submit_command("make -j4").await?;
/// let summary = client.end_of_input().await?;
/// println!("{}: {} succeeded", job_id, summary.succeeded);
/// # Ok(())
/// # }
/// ```
pub struct ManagerClient {
    url: String,
    client: HttpClient,
    summary: Mutex<Option<EofResponse>>,
}

impl ManagerClient {
    /// `address` without a port gets the manager port (1235)
    pub fn connect(address: &str) -> Result<Self> {
        let url = rpc_url(address, DEFAULT_MANAGER_PORT);
        // jobs.eof.v1 answers only once every job is done
        let client = http_client(&url, UNBOUNDED_CALL_TIMEOUT).map_err(SdkError::Connection)?;

        Ok(Self {
            url,
            client,
            summary: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// manager.register.v1; false if the manager already drives this worker
    pub async fn register(&self, address: &str) -> Result<bool> {
        let mut params = ObjectParams::new();
        params.insert("address", address)?;
        let response: RegisterResponse = self.client.request("manager.register.v1", params).await?;

        Ok(response.accepted)
    }

    /// jobs.submit.v1
    pub async fn submit_command(&self, command: &str) -> Result<JobId> {
        let mut params = ObjectParams::new();
        params.insert("command", command)?;
        let response: SubmitResponse = self.client.request("jobs.submit.v1", params).await?;

        Ok(response.job_id)
    }

    /// jobs.eof.v1; waits until the manager's dispatcher closes
    pub async fn end_of_input(&self) -> Result<EofResponse> {
        let response: EofResponse = self.client.request("jobs.eof.v1", rpc_params![]).await?;
        *self.summary.lock().unwrap_or_else(PoisonError::into_inner) = Some(response);

        Ok(response)
    }

    /// Final counts from the last [`ManagerClient::end_of_input`], if any
    pub fn summary(&self) -> Option<EofResponse> {
        *self.summary.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> Result<DispatcherStats> {
        let response: DispatcherStats = self.client.request("admin.stats.v1", rpc_params![]).await?;

        Ok(response)
    }
}

#[async_trait]
impl CommandSink for ManagerClient {
    async fn submit(&self, command: Command) -> distribute_core::Result<JobId> {
        Ok(self.submit_command(command.as_str()).await?)
    }

    async fn signal_end_of_input(&self) -> distribute_core::Result<()> {
        self.end_of_input().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::types::ErrorObjectOwned;

    #[test]
    fn test_process_failed_code_is_process_failure() {
        let err = ClientError::Call(ErrorObjectOwned::owned(
            PROCESS_FAILED_CODE,
            "exit status 1: []",
            None::<()>,
        ));
        assert_eq!(
            classify(err),
            CallError::ProcessFailure {
                output: "exit status 1: []".to_string()
            }
        );
    }

    #[test]
    fn test_other_error_codes_are_transport() {
        let err = ClientError::Call(ErrorObjectOwned::owned(
            -32601,
            "Method not found",
            None::<()>,
        ));
        assert!(classify(err).is_transport());
        assert!(classify(ClientError::RequestTimeout).is_transport());
    }

    #[test]
    fn test_worker_client_normalizes_address() {
        let client = WorkerRpcClient::new("h1", Duration::from_secs(1)).unwrap();
        assert_eq!(client.address(), "http://h1:1234");
    }

    #[test]
    fn test_manager_client_uses_manager_port() {
        let client = ManagerClient::connect("mgr").unwrap();
        assert_eq!(client.url(), "http://mgr:1235");
        assert!(client.summary().is_none());
    }
}
