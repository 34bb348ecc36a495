//! Manager surface: self-registering workers and remote submission

mod common;

use common::{start_worker, Fixture, SCENARIO_TIMEOUT};
use distribute_api_rpc::{ManagerRpcServer, RpcServerConfig, ServerHandle};
use distribute_core::application::{post_commands, ProxyExit};
use distribute_core::domain::Tally;
use distribute_sdk::{EofResponse, ManagerClient};
use tokio::time::timeout;

async fn start_manager(fx: &Fixture) -> (ManagerClient, ServerHandle) {
    let (addr, handle) = ManagerRpcServer::new(
        RpcServerConfig::new("127.0.0.1", 0),
        fx.dispatcher.clone(),
        fx.pool.clone(),
    )
    .start()
    .await
    .unwrap();
    (ManagerClient::connect(&addr.to_string()).unwrap(), handle)
}

#[tokio::test]
async fn test_registered_worker_runs_submitted_commands() {
    let fx = Fixture::new();
    let (manager, manager_handle) = start_manager(&fx).await;
    let (worker, worker_handle) = start_worker().await;

    assert!(manager.register(&worker).await.unwrap());
    // Same worker, spelled differently
    assert!(!manager
        .register(&format!("http://{}", worker))
        .await
        .unwrap());

    let posted = timeout(
        SCENARIO_TIMEOUT,
        post_commands("echo a\nfalse\necho \\\nb\n".as_bytes(), &manager),
    )
    .await
    .expect("submission should finish")
    .unwrap();
    assert_eq!(posted, 3);

    assert_eq!(
        manager.summary(),
        Some(EofResponse {
            succeeded: 2,
            failed: 1,
            completed: 3
        })
    );
    assert_eq!(
        fx.dispatcher.closed().await,
        Ok(Tally { ok: 2, failed: 1 })
    );
    assert_eq!(fx.pool.join_all().await, vec![ProxyExit::Drained]);
    assert!(fx.ok_log().contains("[echo b]"));

    manager_handle.stop().unwrap();
    worker_handle.stop().unwrap();
}

#[tokio::test]
async fn test_stats_while_running_and_after_close() {
    let fx = Fixture::new();
    let (manager, manager_handle) = start_manager(&fx).await;

    manager.submit_command("true").await.unwrap();
    manager.submit_command("false").await.unwrap();

    // No worker yet: everything waits in the queue
    let stats = manager.stats().await.unwrap();
    assert_eq!(stats.outstanding, 2);
    assert_eq!(stats.queued, 2);
    assert!(!stats.got_eof);

    let (worker, worker_handle) = start_worker().await;
    assert!(manager.register(&worker).await.unwrap());

    let summary = timeout(SCENARIO_TIMEOUT, manager.end_of_input())
        .await
        .expect("end of input should be answered")
        .unwrap();
    assert_eq!(summary.completed, 2);

    let stats = manager.stats().await.unwrap();
    assert!(stats.closed);
    assert_eq!(stats.tally(), Tally { ok: 1, failed: 1 });

    manager_handle.stop().unwrap();
    worker_handle.stop().unwrap();
}

#[tokio::test]
async fn test_submit_after_close_is_rejected() {
    let fx = Fixture::new();
    let (manager, manager_handle) = start_manager(&fx).await;

    let summary = manager.end_of_input().await.unwrap();
    assert_eq!(summary.completed, 0);

    assert!(manager.submit_command("true").await.is_err());
    // Registration after close is refused rather than spawning an idle proxy
    assert!(!manager.register("127.0.0.1:1").await.unwrap());

    manager_handle.stop().unwrap();
}
