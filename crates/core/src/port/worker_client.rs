// Worker Client Port (dispatcher side)
// One RPC session to a remote Execution Service

use crate::domain::Command;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a failed remote call, classified at the RPC boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The command ran on the worker and did not succeed (terminal, not retried)
    #[error("remote process failed: {output}")]
    ProcessFailure { output: String },

    /// The call itself failed: refused, dropped, timed out, malformed reply
    #[error("transport failure: {0}")]
    Transport(String),
}

impl CallError {
    pub fn is_transport(&self) -> bool {
        matches!(self, CallError::Transport(_))
    }
}

/// An open RPC session to one worker
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Address this session talks to (for logging)
    fn address(&self) -> &str;

    /// Execute one command remotely, blocking until the worker replies
    async fn execute(&self, command: &Command) -> Result<(), CallError>;
}

/// Establishes sessions to worker addresses
#[async_trait]
pub trait WorkerConnector: Send + Sync {
    /// # Errors
    /// - CallError::Transport if the worker cannot be reached
    async fn connect(&self, address: &str) -> Result<Arc<dyn WorkerClient>, CallError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::command_executor::CommandExecutor;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;

    /// What a mock session does on its next call
    #[derive(Debug, Clone)]
    pub enum MockCall {
        /// Run through the wrapped executor and classify like a real worker would
        Execute,
        /// Drop the connection mid-call
        Drop,
    }

    /// Mock session backed by an in-process executor.
    ///
    /// Scripted calls are consumed first; once the script is exhausted every call executes.
    pub struct MockWorkerClient {
        address: String,
        executor: Arc<dyn CommandExecutor>,
        script: Mutex<VecDeque<MockCall>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockWorkerClient {
        pub fn new(address: impl Into<String>, executor: Arc<dyn CommandExecutor>) -> Self {
            Self {
                address: address.into(),
                executor,
                script: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_script(self, script: impl IntoIterator<Item = MockCall>) -> Self {
            self.script.lock().unwrap().extend(script);
            self
        }

        /// Commands received, including ones whose call was dropped
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkerClient for MockWorkerClient {
        fn address(&self) -> &str {
            &self.address
        }

        async fn execute(&self, command: &Command) -> Result<(), CallError> {
            self.calls.lock().unwrap().push(command.to_string());
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(MockCall::Execute);

            match next {
                MockCall::Drop => Err(CallError::Transport("connection reset by peer".to_string())),
                MockCall::Execute => match self.executor.execute(command).await {
                    Ok(_) => Ok(()),
                    Err(e) => Err(CallError::ProcessFailure {
                        output: e.to_string(),
                    }),
                },
            }
        }
    }

    /// Mock connector handing out pre-built sessions by address
    #[derive(Default)]
    pub struct MockConnector {
        clients: Mutex<HashMap<String, Arc<MockWorkerClient>>>,
        unreachable: Mutex<HashSet<String>>,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add(&self, client: Arc<MockWorkerClient>) {
            self.clients
                .lock()
                .unwrap()
                .insert(client.address().to_string(), client);
        }

        pub fn add_unreachable(&self, address: impl Into<String>) {
            self.unreachable.lock().unwrap().insert(address.into());
        }
    }

    #[async_trait]
    impl WorkerConnector for MockConnector {
        async fn connect(&self, address: &str) -> Result<Arc<dyn WorkerClient>, CallError> {
            if self.unreachable.lock().unwrap().contains(address) {
                return Err(CallError::Transport(format!(
                    "connection refused: {}",
                    address
                )));
            }
            let client = self.clients.lock().unwrap().get(address).cloned();
            match client {
                Some(client) => Ok(client),
                None => Err(CallError::Transport(format!("no route to {}", address))),
            }
        }
    }
}
