//! Shared fixtures: real workers on ephemeral ports, file-backed dispatchers

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use distribute_api_rpc::{RpcServerConfig, ServerHandle, WorkerRpcServer};
use distribute_core::application::{Dispatcher, DispatcherHandle, WorkerPool};
use distribute_core::domain::{DomainError, Tally};
use distribute_core::port::id_provider::SequentialIdProvider;
use distribute_core::port::time_provider::SystemTimeProvider;
use distribute_infra_system::{FileCompletionLog, ShellExecutor};
use distribute_sdk::HttpWorkerConnector;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Upper bound for any single scenario
pub const SCENARIO_TIMEOUT: Duration = Duration::from_secs(30);

/// A worker running the real shell executor, bound to 127.0.0.1:0
pub async fn start_worker() -> (String, ServerHandle) {
    let executor = Arc::new(ShellExecutor::new(Arc::new(SystemTimeProvider)));
    let (addr, handle) = WorkerRpcServer::new(RpcServerConfig::new("127.0.0.1", 0), executor)
        .start()
        .await
        .expect("worker should start");
    (addr.to_string(), handle)
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub dispatcher: DispatcherHandle,
    pub join: JoinHandle<Result<Tally, DomainError>>,
    pub pool: Arc<WorkerPool>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = FileCompletionLog::open(
            dir.path().join("ok.log"),
            dir.path().join("fail.log"),
            Arc::new(SystemTimeProvider),
        )
        .expect("completion logs");
        let (dispatcher, join) =
            Dispatcher::spawn(Arc::new(log), Arc::new(SequentialIdProvider::new()));
        let pool = Arc::new(WorkerPool::new(
            dispatcher.clone(),
            Arc::new(HttpWorkerConnector::new(None)),
        ));

        Self {
            dir,
            dispatcher,
            join,
            pool,
        }
    }

    pub fn write_cmdfile(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join("cmds");
        std::fs::write(&path, contents).expect("write cmds");
        path
    }

    pub fn ok_log(&self) -> String {
        read(&self.dir.path().join("ok.log"))
    }

    pub fn fail_log(&self) -> String {
        read(&self.dir.path().join("fail.log"))
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

/// A fake worker that answers worker.ping.v1 and then hangs up on the first
/// worker.execute.v1, as if the host died mid-command.
pub async fn start_dropping_worker() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_until_execute(stream));
        }
    });

    addr
}

async fn serve_until_execute(mut stream: TcpStream) {
    while let Some(body) = read_http_body(&mut stream).await {
        let request: serde_json::Value = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(_) => return,
        };
        if request["method"] != "worker.ping.v1" {
            // Drop the connection without answering
            return;
        }

        let reply = serde_json::json!({
            "jsonrpc": "2.0",
            "result": { "version": "flaky" },
            "id": request["id"],
        })
        .to_string();
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
            reply.len(),
            reply
        );
        if stream.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

async fn read_http_body(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let length: usize = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())?;

    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(buf[header_end..header_end + length].to_vec())
}
