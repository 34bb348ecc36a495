//! RPC Method Handlers
//!
//! Worker side: run commands. Manager side: accept registrations and remote
//! submissions for a dispatcher.

use crate::error::{process_failure, to_rpc_error};
use crate::types::{
    EofRequest, EofResponse, ExecuteRequest, PingRequest, PingResponse, RegisterRequest,
    RegisterResponse, StatsRequest, StatsResponse, SubmitRequest, SubmitResponse,
};
use distribute_core::application::worker::constants::MAX_FAILURE_OUTPUT_BYTES;
use distribute_core::application::{worker_url, DispatcherHandle, WorkerPool};
use distribute_core::domain::{Command, DomainError};
use distribute_core::error::AppError;
use distribute_core::port::CommandExecutor;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::{info, warn};

/// Handler for the worker-side Execution Service
pub struct WorkerHandler {
    executor: Arc<dyn CommandExecutor>,
}

impl WorkerHandler {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// worker.execute.v1
    pub async fn execute(&self, params: ExecuteRequest) -> Result<(), ErrorObjectOwned> {
        let command = Command::new(params.command);

        match self.executor.execute(&command).await {
            Ok(result) => {
                info!(command = %command, duration_ms = result.duration_ms, "Command succeeded");
                Ok(())
            }
            Err(e) => {
                let e = e.truncated(MAX_FAILURE_OUTPUT_BYTES);
                info!(command = %command, error = %e, "Command failed");
                Err(process_failure(&e))
            }
        }
    }

    /// worker.ping.v1
    pub async fn ping(&self, _params: PingRequest) -> Result<PingResponse, ErrorObjectOwned> {
        Ok(PingResponse {
            version: distribute_core::VERSION.to_string(),
        })
    }
}

/// Handler for the manager surface in front of one dispatcher
pub struct ManagerHandler {
    dispatcher: DispatcherHandle,
    pool: Arc<WorkerPool>,
}

impl ManagerHandler {
    pub fn new(dispatcher: DispatcherHandle, pool: Arc<WorkerPool>) -> Self {
        Self { dispatcher, pool }
    }

    /// manager.register.v1
    pub async fn register(
        &self,
        params: RegisterRequest,
    ) -> Result<RegisterResponse, ErrorObjectOwned> {
        if params.address.trim().is_empty() {
            return Err(to_rpc_error(AppError::Validation(
                "address must not be empty".to_string(),
            )));
        }

        let address = worker_url(&params.address);
        let accepted = self.pool.add_worker(&address);
        info!(worker = %address, accepted, "Worker registration");

        Ok(RegisterResponse { accepted })
    }

    /// jobs.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        if params.command.trim().is_empty() {
            return Err(to_rpc_error(AppError::Validation(
                "command must not be empty".to_string(),
            )));
        }

        let job_id = self
            .dispatcher
            .submit(params.command)
            .map_err(|e| to_rpc_error(e.into()))?;

        Ok(SubmitResponse { job_id })
    }

    /// jobs.eof.v1
    ///
    /// Replies once the dispatcher has closed, with the final counts.
    pub async fn eof(&self, _params: EofRequest) -> Result<EofResponse, ErrorObjectOwned> {
        match self.dispatcher.signal_end_of_input() {
            Ok(()) | Err(DomainError::DispatcherClosed) => {}
            Err(e) => return Err(to_rpc_error(e.into())),
        }

        let tally = self.dispatcher.closed().await.map_err(|e| {
            warn!(error = %e, "Dispatcher stopped without closing");
            to_rpc_error(e.into())
        })?;

        Ok(tally.into())
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> Result<StatsResponse, ErrorObjectOwned> {
        Ok(self.dispatcher.stats().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use distribute_core::application::Dispatcher;
    use distribute_core::port::command_executor::mocks::MockCommandExecutor;
    use distribute_core::port::id_provider::SequentialIdProvider;
    use distribute_core::port::worker_client::mocks::{MockConnector, MockWorkerClient};
    use distribute_core::port::NullCompletionLog;

    fn manager() -> (ManagerHandler, DispatcherHandle) {
        let (dispatcher, _join) = Dispatcher::spawn(
            Arc::new(NullCompletionLog),
            Arc::new(SequentialIdProvider::new()),
        );
        let pool = Arc::new(WorkerPool::new(
            dispatcher.clone(),
            Arc::new(MockConnector::new()),
        ));
        (ManagerHandler::new(dispatcher.clone(), pool), dispatcher)
    }

    #[tokio::test]
    async fn test_execute_failure_uses_process_failed_code() {
        let executor = Arc::new(MockCommandExecutor::new());
        let handler = WorkerHandler::new(executor.clone());

        tokio_test::assert_ok!(
            handler
                .execute(ExecuteRequest {
                    command: "echo hi".to_string()
                })
                .await
        );

        let err = handler
            .execute(ExecuteRequest {
                command: "false".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::PROCESS_FAILED);
        assert!(err.message().starts_with("exit status 1"));
        assert_eq!(executor.executed(), vec!["echo hi".to_string(), "false".to_string()]);
    }

    #[tokio::test]
    async fn test_submit_then_stats() {
        let (handler, _dispatcher) = manager();

        let resp = handler
            .submit(SubmitRequest {
                command: "true".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(resp.job_id, "job-1");

        let stats = handler.stats(StatsRequest {}).await.unwrap();
        assert_eq!(stats.outstanding, 1);
        assert_eq!(stats.queued, 1);
    }

    #[tokio::test]
    async fn test_empty_submit_rejected() {
        let (handler, _dispatcher) = manager();
        let err = handler
            .submit(SubmitRequest {
                command: "  ".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_eof_with_nothing_outstanding_returns_zero_counts() {
        let (handler, dispatcher) = manager();

        let resp = handler.eof(EofRequest {}).await.unwrap();
        assert_eq!(resp.completed, 0);
        assert!(dispatcher.is_closed());

        // A second end-of-input after close still answers with the final counts
        let again = handler.eof(EofRequest {}).await.unwrap();
        assert_eq!(again.succeeded, 0);
    }

    #[tokio::test]
    async fn test_submit_after_close_is_conflict() {
        let (handler, _dispatcher) = manager();
        handler.eof(EofRequest {}).await.unwrap();

        let err = handler
            .submit(SubmitRequest {
                command: "true".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::CONFLICT);
    }

    #[tokio::test]
    async fn test_register_normalizes_and_dedupes() {
        let (dispatcher, _join) = Dispatcher::spawn(
            Arc::new(NullCompletionLog),
            Arc::new(SequentialIdProvider::new()),
        );
        let connector = Arc::new(MockConnector::new());
        connector.add(Arc::new(MockWorkerClient::new(
            "http://h1:1234",
            Arc::new(MockCommandExecutor::new()),
        )));
        let pool = Arc::new(WorkerPool::new(dispatcher.clone(), connector));
        let handler = ManagerHandler::new(dispatcher, pool.clone());

        let first = handler
            .register(RegisterRequest {
                address: "h1".to_string(),
            })
            .await
            .unwrap();
        let second = handler
            .register(RegisterRequest {
                address: "http://h1:1234".to_string(),
            })
            .await
            .unwrap();

        assert!(first.accepted);
        assert!(!second.accepted);
        assert_eq!(pool.registry().addresses(), vec!["http://h1:1234"]);
    }
}
