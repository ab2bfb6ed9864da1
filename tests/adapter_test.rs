//! Connection adapter behavior against the mock ledger

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use job_market_adapter::backend::mock::{MockClientFactory, MockReply, MockRuntimeLoader};
use job_market_adapter::queries::GET_JOBS;
use job_market_adapter::{
    AdapterConfig, AdapterError, ApplicationBinding, ConnectionAdapter, ErrorKind, Notification,
    RetryPolicy, Session,
};

const ADDRESS: &str = "0xd23e5b1c9a47f0e2";
const APP_ID: &str = "58e1c0a4f7d2";

fn setup() -> (ConnectionAdapter, MockClientFactory, Arc<MockRuntimeLoader>) {
    let factory = MockClientFactory::new();
    let loader = Arc::new(MockRuntimeLoader::new());
    let adapter = ConnectionAdapter::new(
        AdapterConfig::default().with_application_id(APP_ID),
        Arc::new(factory.clone()),
        loader.clone(),
    );
    (adapter, factory, loader)
}

async fn bound() -> (ConnectionAdapter, MockClientFactory) {
    let (adapter, factory, _) = setup();
    adapter.connect(ADDRESS).await.unwrap();
    adapter.connect_application(APP_ID).await.unwrap();
    (adapter, factory)
}

fn counting_listener(adapter: &ConnectionAdapter) -> Arc<AtomicU32> {
    let count = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&count);
    adapter.subscribe(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    count
}

fn retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        attempt_timeout: Duration::from_secs(1),
        base_delay: Duration::from_secs(5),
    }
}

// =============================================================================
// Session
// =============================================================================

#[tokio::test]
async fn test_concurrent_connects_are_coalesced() {
    let (adapter, factory, loader) = setup();
    factory.set_claim_delay(Duration::from_millis(50));

    let first = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.connect("0xABC").await }
    });
    let second = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.connect("0xABC").await }
    });

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();

    assert!(Session::ptr_eq(&a, &b));
    assert_eq!(factory.claim_calls(), 1);
    assert_eq!(loader.call_count(), 1);
}

#[tokio::test]
async fn test_reconnect_with_case_variant_reuses_session() {
    let (adapter, factory, _) = setup();

    let first = adapter.connect("0xabc").await.unwrap();
    let second = adapter.connect("0xABC").await.unwrap();

    assert!(Session::ptr_eq(&first, &second));
    assert_eq!(second.identity(), "0xabc");
    assert_eq!(factory.open_calls(), 1);
    assert_eq!(factory.claim_calls(), 1);
    assert_eq!(adapter.address().as_deref(), Some("0xabc"));
    assert_eq!(adapter.chain_id().unwrap().0, "chain-0xabc");
}

#[tokio::test]
async fn test_connect_runs_steps_in_order() {
    let (adapter, factory, loader) = setup();

    adapter.connect(ADDRESS).await.unwrap();

    assert_eq!(loader.call_count(), 1);
    assert_eq!(factory.open_calls(), 1);
    assert_eq!(factory.wallet_calls(), 1);
    assert_eq!(factory.claim_calls(), 1);
    assert_eq!(factory.client_calls(), 1);
    assert!(adapter.is_connected());
    assert!(!adapter.is_application_connected());
}

#[tokio::test]
async fn test_empty_identity_is_config_error() {
    let (adapter, factory, _) = setup();

    let err = adapter.connect("   ").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(factory.open_calls(), 0);
}

#[tokio::test]
async fn test_connect_failure_clears_session_and_notifies() {
    let (adapter, factory, _) = setup();
    let notified = counting_listener(&adapter);
    factory.set_claim_error(Some(AdapterError::Network("faucet unavailable".into())));

    let err = adapter.connect(ADDRESS).await.unwrap_err();

    assert_eq!(err, AdapterError::Network("faucet unavailable".into()));
    assert!(!adapter.is_connected());
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    // No retry at the connect layer; the next call starts fresh.
    factory.set_claim_error(None);
    adapter.connect(ADDRESS).await.unwrap();
    assert_eq!(factory.claim_calls(), 2);
    assert_eq!(notified.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_runtime_failure_fails_connect() {
    let (adapter, factory, loader) = setup();
    loader.push_outcome(Err(AdapterError::Initialization("no runtime".into())));

    let err = adapter.connect(ADDRESS).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Initialization);
    assert_eq!(factory.open_calls(), 0);
    assert!(!adapter.is_connected());
}

#[tokio::test]
async fn test_other_identity_requires_disconnect() {
    let (adapter, factory, _) = setup();
    adapter.connect("0xaaa").await.unwrap();

    let err = adapter.connect("0xbbb").await.unwrap_err();
    assert_eq!(
        err,
        AdapterError::SessionActive {
            current: "0xaaa".into(),
            requested: "0xbbb".into(),
        }
    );
    assert_eq!(adapter.address().as_deref(), Some("0xaaa"));

    adapter.disconnect();
    adapter.connect("0xbbb").await.unwrap();
    assert_eq!(adapter.address().as_deref(), Some("0xbbb"));
    assert_eq!(factory.claim_calls(), 2);
}

#[tokio::test]
async fn test_disconnect_overtakes_in_flight_connect() {
    let (adapter, factory, _) = setup();
    factory.set_claim_delay(Duration::from_millis(100));

    let pending = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.connect(ADDRESS).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    adapter.disconnect();

    // The waiter still gets its answer, but the session is not installed.
    pending.await.unwrap().unwrap();
    assert!(!adapter.is_connected());
}

// =============================================================================
// Application binding
// =============================================================================

#[tokio::test]
async fn test_bind_requires_session() {
    let (adapter, factory, _) = setup();

    let err = adapter.connect_application(APP_ID).await.unwrap_err();

    assert_eq!(err, AdapterError::NotConnected);
    assert_eq!(factory.bind_calls(), 0);
}

#[tokio::test]
async fn test_bind_rejects_empty_application_id() {
    let (adapter, _, _) = setup();
    adapter.connect(ADDRESS).await.unwrap();

    let err = adapter.connect_application("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn test_configured_application_requires_config() {
    let factory = MockClientFactory::new();
    let adapter = ConnectionAdapter::new(
        AdapterConfig::default(),
        Arc::new(factory),
        Arc::new(MockRuntimeLoader::new()),
    );
    adapter.connect(ADDRESS).await.unwrap();

    let err = adapter.connect_configured_application().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn test_bind_failure_clears_binding_and_notifies() {
    let (adapter, factory, _) = setup();
    adapter.connect(ADDRESS).await.unwrap();
    let notified = counting_listener(&adapter);
    factory.set_bind_error(Some(AdapterError::Application("unknown application".into())));

    let err = adapter.connect_application(APP_ID).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Application);
    assert!(!adapter.is_application_connected());
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(factory.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_rebinding_other_application_replaces_subscription() {
    let (adapter, factory) = bound().await;
    assert_eq!(factory.active_subscriptions(), 1);

    let binding = adapter.connect_application("7f00aa").await.unwrap();

    assert_eq!(binding.application_id().0, "7f00aa");
    assert_eq!(adapter.application_id().unwrap().0, "7f00aa");
    assert_eq!(factory.active_subscriptions(), 1);
    assert_eq!(factory.bind_calls(), 2);
}

#[tokio::test]
async fn test_new_block_notifies_listeners() {
    let (adapter, factory) = bound().await;
    let notified = counting_listener(&adapter);

    factory.push_notification(Notification::NewBlock { height: Some(5), hash: None });
    factory.push_notification(Notification::Other("NewIncomingBundle".into()));

    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Query & mutate
// =============================================================================

#[tokio::test]
async fn test_get_jobs_scenario() {
    let (adapter, factory, _) = setup();

    adapter.connect(ADDRESS).await.unwrap();
    let binding = adapter.connect_application(APP_ID).await.unwrap();

    factory.push_reply(MockReply::data(json!({ "jobs": [] })));
    let jobs: Value = adapter.query(GET_JOBS, None, None).await.unwrap();
    assert_eq!(jobs, json!({ "jobs": [] }));

    let payload: Value = serde_json::from_str(&factory.payloads()[0]).unwrap();
    assert_eq!(payload["query"], GET_JOBS);
    assert!(payload.get("variables").is_none());

    let again = adapter.connect_application(APP_ID).await.unwrap();
    assert!(ApplicationBinding::ptr_eq(&binding, &again));
    assert_eq!(factory.bind_calls(), 1);
}

#[tokio::test]
async fn test_query_reports_first_graphql_error() {
    let (adapter, factory) = bound().await;
    factory.push_reply(MockReply::errors(&["Job not found: 42", "ignored"]));

    let err = adapter
        .query::<Value>("query { job(id: 42) { id } }", None, None)
        .await
        .unwrap_err();

    assert_eq!(err, AdapterError::Query("Job not found: 42".into()));
}

#[tokio::test(start_paused = true)]
async fn test_query_times_out() {
    let (adapter, factory) = bound().await;
    factory.push_reply(MockReply::Hang);

    let err = adapter
        .query::<Value>(GET_JOBS, None, Some(Duration::from_secs(2)))
        .await
        .unwrap_err();

    assert_eq!(err, AdapterError::Timeout { timeout_ms: 2000 });
    assert_eq!(factory.query_calls(), 1);
}

#[tokio::test]
async fn test_mutate_fails_fast_on_non_timeout() {
    let (adapter, factory) = bound().await;
    factory.push_reply(MockReply::Fail(AdapterError::Application("bid rejected".into())));

    let err = adapter
        .mutate::<Value>("mutation { placeBid(jobId: 1) }", None, Some(retry_policy()))
        .await
        .unwrap_err();

    assert_eq!(err, AdapterError::Application("bid rejected".into()));
    assert_eq!(factory.query_calls(), 1);
}

#[tokio::test]
async fn test_mutate_does_not_retry_graphql_errors() {
    let (adapter, factory) = bound().await;
    factory.push_reply(MockReply::errors(&["Not authorized"]));

    let err = adapter
        .mutate::<Value>("mutation { completeJob(jobId: 1) }", None, Some(retry_policy()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Query);
    assert_eq!(factory.query_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mutate_retries_timeouts_with_linear_backoff() {
    let (adapter, factory) = bound().await;
    for _ in 0..3 {
        factory.push_reply(MockReply::Hang);
    }
    factory.push_reply(MockReply::data(json!({ "postJob": "a1b2" })));

    let started = tokio::time::Instant::now();
    let result: Value = adapter
        .mutate(
            "mutation { postJob(description: \"x\", payment: \"1\") }",
            None,
            Some(retry_policy()),
        )
        .await
        .unwrap();

    assert_eq!(result["postJob"], "a1b2");
    assert_eq!(factory.query_calls(), 4);
    // Three 1s timeouts plus 5s + 10s + 15s of backoff.
    assert!(started.elapsed() >= Duration::from_secs(33));
}

#[tokio::test(start_paused = true)]
async fn test_mutate_exhaustion_is_distinct_from_timeout() {
    let (adapter, factory) = bound().await;
    for _ in 0..4 {
        factory.push_reply(MockReply::Hang);
    }

    let err = adapter
        .mutate::<Value>("mutation { placeBid(jobId: 1) }", None, Some(retry_policy()))
        .await
        .unwrap_err();

    assert_eq!(err, AdapterError::RetriesExhausted { attempts: 4 });
    assert!(!err.is_timeout());
    assert_eq!(factory.query_calls(), 4);
}

// =============================================================================
// Listeners & disconnect
// =============================================================================

#[tokio::test]
async fn test_failing_listener_does_not_block_others() {
    let (adapter, _, _) = setup();
    let counts: Vec<Arc<AtomicU32>> = (0..3).map(|_| Arc::new(AtomicU32::new(0))).collect();

    for (i, count) in counts.iter().enumerate() {
        let count = Arc::clone(count);
        adapter.subscribe(move || {
            count.fetch_add(1, Ordering::SeqCst);
            if i == 1 {
                panic!("listener exploded");
            }
        });
    }

    adapter.disconnect();

    for count in &counts {
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_unsubscribed_listener_is_not_called() {
    let (adapter, _, _) = setup();
    let count = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&count);
    let handle = adapter.subscribe(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    handle.unsubscribe();
    adapter.disconnect();

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disconnect_clears_all_state() {
    let (adapter, factory) = bound().await;
    assert!(adapter.is_connected());
    assert!(adapter.is_application_connected());

    adapter.disconnect();

    assert!(!adapter.is_connected());
    assert!(!adapter.is_application_connected());
    assert_eq!(adapter.address(), None);
    assert_eq!(adapter.application_id(), None);
    assert_eq!(factory.active_subscriptions(), 0);

    let err = adapter.query::<Value>(GET_JOBS, None, None).await.unwrap_err();
    assert_eq!(err, AdapterError::NotBound);

    // Idempotent
    adapter.disconnect();
    assert!(!adapter.is_connected());
}
