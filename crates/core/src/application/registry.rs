// Worker registry and proxy pool

use crate::application::dispatcher::DispatcherHandle;
use crate::application::worker::{ProxyExit, WorkerProxy};
use crate::port::WorkerConnector;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Addresses that currently have a live proxy
#[derive(Default)]
pub struct WorkerRegistry {
    known: Mutex<BTreeSet<String>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the address was already known
    pub fn add(&self, address: &str) -> bool {
        self.lock().insert(address.to_string())
    }

    pub fn remove(&self, address: &str) -> bool {
        self.lock().remove(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.lock().contains(address)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawns one proxy per worker address and waits for all of them
pub struct WorkerPool {
    dispatcher: DispatcherHandle,
    connector: Arc<dyn WorkerConnector>,
    registry: Arc<WorkerRegistry>,
    call_timeout: Option<Duration>,
    tasks: Mutex<Vec<JoinHandle<ProxyExit>>>,
}

impl WorkerPool {
    pub fn new(dispatcher: DispatcherHandle, connector: Arc<dyn WorkerConnector>) -> Self {
        Self {
            dispatcher,
            connector,
            registry: Arc::new(WorkerRegistry::new()),
            call_timeout: None,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Start a proxy for `address` unless one is already running
    ///
    /// Returns false for a known address or once the dispatcher has closed. A proxy
    /// that ends by losing its worker releases the address, so the worker can be
    /// added again (for example by registering after a restart).
    pub fn add_worker(&self, address: &str) -> bool {
        if self.dispatcher.is_closed() {
            warn!(worker = %address, "Dispatcher closed, worker not added");
            return false;
        }
        if !self.registry.add(address) {
            debug!(worker = %address, "Worker already has a proxy");
            return false;
        }

        let proxy = WorkerProxy::new(address, self.connector.clone(), self.dispatcher.clone())
            .with_call_timeout(self.call_timeout);
        let registry = Arc::clone(&self.registry);
        let address = address.to_string();

        let handle = tokio::spawn(async move {
            let exit = proxy.run().await;
            if exit != ProxyExit::Drained {
                registry.remove(&address);
                info!(worker = %address, exit = ?exit, "Worker released");
            }
            exit
        });
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        true
    }

    /// Wait for every proxy, including ones added while waiting
    pub async fn join_all(&self) -> Vec<ProxyExit> {
        let mut exits = Vec::new();
        loop {
            let batch =
                std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                match handle.await {
                    Ok(exit) => exits.push(exit),
                    Err(e) => error!(error = %e, "Worker proxy task failed"),
                }
            }
        }
        exits
    }
}
