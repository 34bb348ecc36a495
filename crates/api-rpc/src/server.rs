//! JSON-RPC Servers
//!
//! Two servers over HTTP: the worker's Execution Service and the manager surface.

use crate::handler::{ManagerHandler, WorkerHandler};
use crate::types::{
    EofRequest, ExecuteRequest, PingRequest, RegisterRequest, StatsRequest, SubmitRequest,
};
use distribute_core::application::worker::constants::{DEFAULT_MANAGER_PORT, DEFAULT_WORKER_PORT};
use distribute_core::application::{DispatcherHandle, WorkerPool};
use distribute_core::port::CommandExecutor;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "0.0.0.0";

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl RpcServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Defaults for a manager (port 1235)
    pub fn manager() -> Self {
        Self::new(DEFAULT_RPC_HOST, DEFAULT_MANAGER_PORT)
    }

    /// Parse a `host:port` listen address; a bare host gets the manager port
    pub fn from_listen(listen: &str) -> Result<Self, String> {
        let listen = listen.trim();
        let Some((host, port)) = listen.rsplit_once(':').filter(|(_, p)| !p.contains(']')) else {
            return Ok(Self::new(listen, DEFAULT_MANAGER_PORT));
        };
        let port = port
            .parse()
            .map_err(|e| format!("invalid port in listen address {}: {}", listen, e))?;
        let host = if host.is_empty() { DEFAULT_RPC_HOST } else { host };

        Ok(Self::new(host, port))
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for RpcServerConfig {
    /// Defaults for a worker (port 1234)
    fn default() -> Self {
        Self::new(DEFAULT_RPC_HOST, DEFAULT_WORKER_PORT)
    }
}

/// Bind and start serving `module`; returns the bound address (useful with port 0)
async fn serve(
    config: &RpcServerConfig,
    module: RpcModule<()>,
) -> Result<(SocketAddr, ServerHandle), String> {
    let addr = config.addr();
    let server = Server::builder()
        .build(&addr)
        .await
        .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
    let local_addr = server
        .local_addr()
        .map_err(|e| format!("Failed to read bound address: {}", e))?;

    Ok((local_addr, server.start(module)))
}

/// Worker-side server: worker.execute.v1, worker.ping.v1
pub struct WorkerRpcServer {
    config: RpcServerConfig,
    handler: Arc<WorkerHandler>,
}

impl WorkerRpcServer {
    pub fn new(config: RpcServerConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            config,
            handler: Arc::new(WorkerHandler::new(executor)),
        }
    }

    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("worker.execute.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ExecuteRequest = params.parse()?;
                    handler.execute(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("worker.ping.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: PingRequest = params.parse::<Option<_>>()?.unwrap_or_default();
                    handler.ping(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let (addr, handle) = serve(&self.config, module).await?;
        info!(addr = %addr, "Worker RPC server started");
        Ok((addr, handle))
    }
}

/// Manager-side server: registration, remote submission, stats
pub struct ManagerRpcServer {
    config: RpcServerConfig,
    handler: Arc<ManagerHandler>,
}

impl ManagerRpcServer {
    pub fn new(
        config: RpcServerConfig,
        dispatcher: DispatcherHandle,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(ManagerHandler::new(dispatcher, pool)),
        }
    }

    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("manager.register.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: RegisterRequest = params.parse()?;
                    handler.register(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("jobs.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SubmitRequest = params.parse()?;
                    handler.submit(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("jobs.eof.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: EofRequest = params.parse::<Option<_>>()?.unwrap_or_default();
                    handler.eof(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.stats.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StatsRequest = params.parse::<Option<_>>()?.unwrap_or_default();
                    handler.stats(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let (addr, handle) = serve(&self.config, module).await?;
        info!(addr = %addr, "Manager RPC server started");
        Ok((addr, handle))
    }
}
