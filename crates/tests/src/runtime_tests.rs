//! Integration tests for the runtime: wiring, persistence, hydration and schedulers.
//!
//! Tests use `tokio::time::timeout` so a broken shutdown path fails instead of hanging.

use crate::mock_infrastructure::{ledger_record, LedgerMockBuilder, RpcMockBuilder};
use alloy_primitives::{Address, I256};
use flowsnap_core::{
    config::{AppConfig, ChainConfig},
    runtime::{RuntimeError, SnapshotRuntime},
    types::SnapshotKey,
};
use std::path::Path;
use tokio::time::{sleep, timeout, Duration};

const CHAIN_ID: u64 = 10;

fn token() -> Address {
    Address::repeat_byte(0x5f)
}

fn create_test_config(ledger_url: &str, rpc_url: &str, data_dir: &Path) -> AppConfig {
    let mut config = AppConfig {
        chains: vec![ChainConfig {
            chain_id: CHAIN_ID,
            name: "optimism".to_string(),
            rpc_url: rpc_url.to_string(),
            ledger_url: ledger_url.to_string(),
            tokens: vec![token().to_string()],
            timeout_seconds: 5,
        }],
        ..Default::default()
    };
    config.storage.data_dir = data_dir.display().to_string();
    config.verifier.base_delay_ms = 1;
    config.verifier.max_delay_ms = 10;
    config.scheduler.run_on_startup = false;
    config
}

async fn mocks() -> (LedgerMockBuilder, RpcMockBuilder) {
    let mut ledger = LedgerMockBuilder::new().await;
    ledger.mock_page_repeated(
        token(),
        "",
        &[
            ledger_record(Address::with_last_byte(1), token(), "300", "0", 20),
            ledger_record(Address::with_last_byte(2), token(), "200", "0", 20),
        ],
    );
    let mut rpc = RpcMockBuilder::new().await;
    rpc.mock_block_number(64);
    (ledger, rpc)
}

#[tokio::test]
async fn test_run_persists_and_new_runtime_hydrates() {
    let (ledger, rpc) = mocks().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&ledger.url(), &rpc.url(), dir.path());
    let key = SnapshotKey::new(CHAIN_ID, token());

    let runtime = SnapshotRuntime::builder().with_config(config.clone()).build().unwrap();
    let report = runtime.pipeline(CHAIN_ID).unwrap().run(token()).await.unwrap();
    assert!(report.persisted);
    assert!(dir.path().join(format!("{}.json", key.file_stem())).exists());

    let restarted = SnapshotRuntime::builder().with_config(config).build().unwrap();
    assert!(restarted.store().get(&key).is_none());
    assert_eq!(restarted.hydrate().await, 1);

    let hydrated = restarted.store().get(&key).unwrap();
    let original = runtime.store().get(&key).unwrap();
    assert_eq!(hydrated.block_number, 64);
    assert_eq!(hydrated.holders, original.holders);
    assert_eq!(hydrated.holders[0].balance, I256::try_from(300i64).unwrap());
}

#[tokio::test]
async fn test_in_memory_runtime_writes_nothing() {
    let (ledger, rpc) = mocks().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&ledger.url(), &rpc.url(), dir.path());

    let runtime =
        SnapshotRuntime::builder().with_config(config).disable_persistence().build().unwrap();
    runtime.pipeline(CHAIN_ID).unwrap().run(token()).await.unwrap();

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(runtime.store().keys(), vec![SnapshotKey::new(CHAIN_ID, token())]);
}

#[tokio::test]
async fn test_schedulers_publish_on_startup_and_stop_on_shutdown() {
    let (ledger, rpc) = mocks().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&ledger.url(), &rpc.url(), dir.path());
    config.scheduler.run_on_startup = true;
    config.scheduler.interval_seconds = 3600;

    let mut runtime =
        SnapshotRuntime::builder().with_config(config).disable_persistence().build().unwrap();
    assert_eq!(runtime.start_schedulers(), 1);

    let key = SnapshotKey::new(CHAIN_ID, token());
    let store = runtime.store().clone();
    timeout(Duration::from_secs(5), async {
        while store.get(&key).is_none() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("scheduler should publish on startup");

    timeout(Duration::from_secs(5), runtime.shutdown())
        .await
        .expect("shutdown should not hang");
}

#[tokio::test]
async fn test_shutdown_notifies_every_receiver() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config("http://127.0.0.1:1", "http://127.0.0.1:1", dir.path());
    let mut runtime = SnapshotRuntime::builder().with_config(config).build().unwrap();

    let receivers: Vec<_> = (0..3).map(|_| runtime.shutdown_receiver()).collect();
    let tasks: Vec<_> = receivers
        .into_iter()
        .map(|mut rx| tokio::spawn(async move { rx.recv().await.is_ok() }))
        .collect();

    runtime.shutdown().await;

    for task in tasks {
        let notified = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(notified);
    }
}

#[tokio::test]
async fn test_builder_rejects_invalid_token() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config("http://127.0.0.1:1", "http://127.0.0.1:1", dir.path());
    config.chains[0].tokens.push("0xnot-a-token".to_string());

    let result = SnapshotRuntime::builder().with_config(config).build();

    assert!(matches!(result, Err(RuntimeError::ConfigValidation(_))));
}
