//! Integration tests for a full snapshot run.
//!
//! The pipeline is wired with the production `SubgraphClient` and
//! `JsonRpcChainClient` pointed at mockito servers, so these tests cover the
//! GraphQL and JSON-RPC wire formats as well as reconciliation.

use crate::mock_infrastructure::{
    ledger_record, numbered_address, record_id, with_pool_membership, LedgerMockBuilder,
    RpcMockBuilder, LEDGER_TIMESTAMP,
};
use alloy_primitives::{Address, I256, U256};
use chrono::{DateTime, TimeZone, Utc};
use flowsnap_core::{
    ledger::{LedgerError, SubgraphClient},
    pipeline::{PipelineConfig, PipelineError, SnapshotPipeline},
    rpc::{HttpClient, JsonRpcChainClient, RetryPolicy, VerifierConfig},
    snapshot::SnapshotStore,
    types::SnapshotKey,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;

const CHAIN_ID: u64 = 137;
const HEAD: u64 = 100;

fn token() -> Address {
    Address::repeat_byte(0x70)
}

fn int(value: i64) -> I256 {
    I256::try_from(value).unwrap()
}

/// One hour after every fixture record's last update.
fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(i64::try_from(LEDGER_TIMESTAMP).unwrap() + 3600, 0).unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        multiplier: 2.0,
        max_delay: Duration::from_millis(10),
    }
}

fn create_pipeline(ledger_url: &str, rpc_url: &str, store: Arc<SnapshotStore>) -> SnapshotPipeline {
    let http_client = Arc::new(HttpClient::new().expect("HTTP client"));
    let ledger = Arc::new(SubgraphClient::new(
        ledger_url,
        http_client.clone(),
        Duration::from_secs(5),
    ));
    let chain = Arc::new(JsonRpcChainClient::new(rpc_url, http_client, Duration::from_secs(5)));
    let config = PipelineConfig {
        verifier: VerifierConfig { batch_size: 10, retry: fast_retry() },
        ..PipelineConfig::default()
    };

    SnapshotPipeline::new(CHAIN_ID, ledger, chain, store, config, Arc::new(Semaphore::new(16)))
}

#[tokio::test]
async fn test_end_to_end_publishes_sorted_snapshot() {
    let static_holder = Address::with_last_byte(0xa1);
    let streaming = Address::with_last_byte(0xb2);
    let empty = Address::with_last_byte(0xc3);
    let pool_member = Address::with_last_byte(0xd4);

    let mut ledger = LedgerMockBuilder::new().await;
    ledger.mock_page(
        token(),
        "",
        &[
            ledger_record(static_holder, token(), "100", "0", 90),
            ledger_record(streaming, token(), "10", "5", 90),
            ledger_record(empty, token(), "0", "0", 90),
            with_pool_membership(
                ledger_record(pool_member, token(), "0", "0", 90),
                Address::with_last_byte(0xee),
                "10",
                "3",
                true,
            ),
        ],
    );

    let mut rpc = RpcMockBuilder::new().await;
    rpc.mock_block_number(HEAD)
        .mock_balance_of(token(), streaming, HEAD, U256::from(500))
        .mock_balance_of(token(), pool_member, HEAD, U256::from(42));

    let store = Arc::new(SnapshotStore::in_memory());
    let pipeline = create_pipeline(&ledger.url(), &rpc.url(), store.clone());

    let report = pipeline.run_at(token(), now()).await.expect("run should succeed");

    assert_eq!(report.block_number, HEAD);
    assert_eq!(report.ledger_records, 4);
    // The zero-balance account resolves from the ledger and is then dropped.
    assert_eq!(report.assembly.trusted, 2);
    assert_eq!(report.assembly.verified, 2);
    assert_eq!(report.assembly.dropped_non_positive, 1);
    assert_eq!(report.assembly.unresolved, 0);
    assert!(ledger.verify_all_called());
    assert!(rpc.verify_all_called());

    let snapshot = store.get(&SnapshotKey::new(CHAIN_ID, token())).expect("published");
    let holders: Vec<_> = snapshot.holders.iter().map(|h| (h.address, h.balance)).collect();
    assert_eq!(
        holders,
        vec![(streaming, int(500)), (static_holder, int(100)), (pool_member, int(42))]
    );
    assert_eq!(snapshot.holders[0].net_flow_rate, int(5));
}

#[tokio::test]
async fn test_pagination_fetches_exactly_two_pages_for_1001_records() {
    let records: Vec<_> = (1..=1001u64)
        .map(|n| ledger_record(numbered_address(n), token(), &n.to_string(), "0", 50))
        .collect();

    let mut ledger = LedgerMockBuilder::new().await;
    ledger
        .mock_page(token(), "", &records[..1000])
        .mock_page(token(), &record_id(numbered_address(1000), token()), &records[1000..]);

    let mut rpc = RpcMockBuilder::new().await;
    rpc.mock_block_number(HEAD);

    let store = Arc::new(SnapshotStore::in_memory());
    let pipeline = create_pipeline(&ledger.url(), &rpc.url(), store.clone());

    let report = pipeline.run_at(token(), now()).await.expect("run should succeed");

    assert!(ledger.verify_all_called(), "each page must be requested exactly once");
    assert_eq!(report.ledger_records, 1001);
    assert_eq!(report.holders, 1001);
    assert!(report.verification.is_none(), "static balances need no on-chain reads");

    let snapshot = store.get(&SnapshotKey::new(CHAIN_ID, token())).unwrap();
    assert_eq!(snapshot.holders[0].address, numbered_address(1001));
    assert_eq!(snapshot.holders[1000].balance, int(1));
}

#[tokio::test]
async fn test_unreachable_account_does_not_block_publication() {
    let healthy = Address::with_last_byte(0x01);
    let unreachable = Address::with_last_byte(0x02);

    let mut ledger = LedgerMockBuilder::new().await;
    ledger.mock_page(
        token(),
        "",
        &[
            ledger_record(healthy, token(), "10", "1", 90),
            ledger_record(unreachable, token(), "10", "1", 90),
        ],
    );

    let mut rpc = RpcMockBuilder::new().await;
    rpc.mock_block_number(HEAD)
        .mock_balance_of(token(), healthy, HEAD, U256::from(300))
        .mock_balance_of_unavailable(token(), unreachable, HEAD);

    let store = Arc::new(SnapshotStore::in_memory());
    let pipeline = create_pipeline(&ledger.url(), &rpc.url(), store.clone());

    let report = pipeline.run_at(token(), now()).await.expect("run should succeed");

    let stats = report.verification.expect("accounts were verified");
    assert_eq!(stats.failed_count, 1);
    assert!(stats.retries_count >= 2, "unexpected retries: {}", stats.retries_count);
    assert_eq!(report.assembly.unresolved, 1);

    let snapshot = store.get(&SnapshotKey::new(CHAIN_ID, token())).unwrap();
    assert_eq!(snapshot.holders.len(), 1);
    assert_eq!(snapshot.holders[0].address, healthy);
    assert_eq!(snapshot.holders[0].balance, int(300));
}

#[tokio::test]
async fn test_ledger_ahead_of_chain_head_is_verified() {
    let account = Address::with_last_byte(0x33);

    let mut ledger = LedgerMockBuilder::new().await;
    ledger.mock_page(token(), "", &[ledger_record(account, token(), "999", "0", HEAD + 50)]);

    let mut rpc = RpcMockBuilder::new().await;
    rpc.mock_block_number(HEAD).mock_balance_of(token(), account, HEAD, U256::from(77));

    let store = Arc::new(SnapshotStore::in_memory());
    let pipeline = create_pipeline(&ledger.url(), &rpc.url(), store.clone());

    let report = pipeline.run_at(token(), now()).await.unwrap();

    assert_eq!(report.assembly.verified, 1);
    let snapshot = store.get(&SnapshotKey::new(CHAIN_ID, token())).unwrap();
    assert_eq!(snapshot.holders[0].balance, int(77));
}

#[tokio::test]
async fn test_chain_head_failure_keeps_previous_snapshot() {
    let account = Address::with_last_byte(0x44);
    let mut ledger = LedgerMockBuilder::new().await;
    ledger.mock_page_repeated(token(), "", &[ledger_record(account, token(), "5", "0", 10)]);

    let mut healthy_rpc = RpcMockBuilder::new().await;
    healthy_rpc.mock_block_number(HEAD);
    let mut failing_rpc = RpcMockBuilder::new().await;
    failing_rpc.mock_server_error();

    let store = Arc::new(SnapshotStore::in_memory());
    create_pipeline(&ledger.url(), &healthy_rpc.url(), store.clone())
        .run_at(token(), now())
        .await
        .expect("first run should succeed");

    let result = create_pipeline(&ledger.url(), &failing_rpc.url(), store.clone())
        .run_at(token(), now())
        .await;

    assert!(matches!(result, Err(PipelineError::ChainHead(_))), "got {result:?}");
    let snapshot = store.get(&SnapshotKey::new(CHAIN_ID, token())).unwrap();
    assert_eq!(snapshot.block_number, HEAD);
    assert_eq!(snapshot.holders.len(), 1);
}

#[tokio::test]
async fn test_graphql_errors_abort_run() {
    let mut ledger = LedgerMockBuilder::new().await;
    ledger.mock_graphql_error("indexing_error");
    let mut rpc = RpcMockBuilder::new().await;
    rpc.mock_block_number(HEAD);

    let store = Arc::new(SnapshotStore::in_memory());
    let pipeline = create_pipeline(&ledger.url(), &rpc.url(), store.clone());

    let result = pipeline.run_at(token(), now()).await;

    match result {
        Err(PipelineError::Ledger(LedgerError::GraphQl(message))) => {
            assert!(message.contains("indexing_error"), "{message}");
        }
        other => panic!("expected a GraphQL error, got {other:?}"),
    }
    assert!(store.get(&SnapshotKey::new(CHAIN_ID, token())).is_none());
}

#[tokio::test]
async fn test_ledger_outage_aborts_run() {
    let mut ledger = LedgerMockBuilder::new().await;
    ledger.mock_server_error();
    let mut rpc = RpcMockBuilder::new().await;
    rpc.mock_block_number(HEAD);

    let store = Arc::new(SnapshotStore::in_memory());
    let pipeline = create_pipeline(&ledger.url(), &rpc.url(), store.clone());

    let result = pipeline.run_at(token(), now()).await;

    assert!(matches!(result, Err(PipelineError::Ledger(LedgerError::Transport(_)))));
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_repeat_runs_over_unchanged_state_are_identical() {
    let a = Address::with_last_byte(0x0a);
    let b = Address::with_last_byte(0x0b);
    let mut ledger = LedgerMockBuilder::new().await;
    ledger.mock_page_repeated(
        token(),
        "",
        &[ledger_record(a, token(), "50", "0", 10), ledger_record(b, token(), "1", "2", 10)],
    );
    let mut rpc = RpcMockBuilder::new().await;
    rpc.mock_block_number(HEAD).mock_balance_of(token(), b, HEAD, U256::from(50));

    let store = Arc::new(SnapshotStore::in_memory());
    let pipeline = create_pipeline(&ledger.url(), &rpc.url(), store.clone());
    let key = SnapshotKey::new(CHAIN_ID, token());

    pipeline.run_at(token(), now()).await.unwrap();
    let first = store.get(&key).unwrap();
    pipeline.run_at(token(), now()).await.unwrap();
    let second = store.get(&key).unwrap();

    assert_eq!(first.holders, second.holders);
    // Equal balances are ordered by address.
    assert_eq!(second.holders[0].address, a);
    assert_eq!(second.holders[1].address, b);
}

#[tokio::test]
async fn test_min_balance_filter_on_published_snapshot() {
    let mut ledger = LedgerMockBuilder::new().await;
    ledger.mock_page(
        token(),
        "",
        &[
            ledger_record(Address::with_last_byte(0xa), token(), "100", "0", 10),
            ledger_record(Address::with_last_byte(0xb), token(), "50", "0", 10),
            ledger_record(Address::with_last_byte(0xc), token(), "0", "0", 10),
        ],
    );
    let mut rpc = RpcMockBuilder::new().await;
    rpc.mock_block_number(HEAD);

    let store = Arc::new(SnapshotStore::in_memory());
    create_pipeline(&ledger.url(), &rpc.url(), store.clone()).run_at(token(), now()).await.unwrap();

    let page = store.list_holders(CHAIN_ID, token(), 100, 0, Some("60")).unwrap().unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.holders[0].address, Address::with_last_byte(0xa));
    assert_eq!(page.holders[0].balance, int(100));
}
