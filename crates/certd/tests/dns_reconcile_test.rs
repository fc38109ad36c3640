//! Integration tests for record set reconciliation against an in-memory zone

mod common;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use rover_certd::acme::dns::{
    challenge_record, AddressPublisher, DnsProviderError, ReconcileOutcome, RecordSet,
};

use common::{reconciler, txt, MockDnsProvider, TEST_POLL_INTERVAL};

const CHALLENGE_NAME: &str = "_acme-challenge.rover.example.com.";

fn cancel_after(cancel: &CancellationToken, after: Duration) {
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        trigger.cancel();
    });
}

// ============================================================================
// Convergence
// ============================================================================

#[tokio::test]
async fn test_identical_record_is_untouched() {
    let provider = Arc::new(MockDnsProvider::with_records(vec![txt(
        CHALLENGE_NAME,
        60,
        "abc",
    )]));
    let reconciler = reconciler(&provider);

    let outcome = reconciler
        .reconcile(&CancellationToken::new(), &txt(CHALLENGE_NAME, 60, "abc"), false)
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert_eq!(provider.list_calls(), 1);
    assert_eq!(provider.create_calls(), 0);
    assert_eq!(provider.get_calls(), 0);
}

#[tokio::test]
async fn test_stale_record_replaced_in_one_change() {
    let provider = Arc::new(MockDnsProvider::with_records(vec![txt(
        CHALLENGE_NAME,
        300,
        "old",
    )]));
    let reconciler = reconciler(&provider);

    let outcome = reconciler
        .reconcile(&CancellationToken::new(), &txt(CHALLENGE_NAME, 60, "new"), false)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ReconcileOutcome::Applied { max_ttl: 300, .. }
    ));
    assert_eq!(provider.create_calls(), 1);

    let changes = provider.submitted_changes();
    assert_eq!(changes[0].deletions, vec![txt(CHALLENGE_NAME, 300, "old")]);
    assert_eq!(changes[0].additions, vec![txt(CHALLENGE_NAME, 60, "new")]);
    assert_eq!(provider.records(), vec![txt(CHALLENGE_NAME, 60, "new")]);
}

#[tokio::test]
async fn test_missing_record_is_added() {
    let provider = Arc::new(MockDnsProvider::new());
    let reconciler = reconciler(&provider);

    let outcome = reconciler
        .reconcile(&CancellationToken::new(), &txt(CHALLENGE_NAME, 60, "abc"), false)
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Applied { max_ttl: 60, .. }));
    let changes = provider.submitted_changes();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].deletions.is_empty());
    assert_eq!(provider.records(), vec![txt(CHALLENGE_NAME, 60, "abc")]);
}

#[tokio::test]
async fn test_reconcile_twice_is_idempotent() {
    let provider = Arc::new(MockDnsProvider::with_records(vec![txt(
        CHALLENGE_NAME,
        60,
        "old",
    )]));
    let reconciler = reconciler(&provider);
    let cancel = CancellationToken::new();
    let desired = txt(CHALLENGE_NAME, 60, "new");

    reconciler.reconcile(&cancel, &desired, false).await.unwrap();
    let second = reconciler.reconcile(&cancel, &desired, false).await.unwrap();

    assert_eq!(second, ReconcileOutcome::Unchanged);
    assert_eq!(provider.create_calls(), 1);
    assert_eq!(provider.list_calls(), 2);
}

#[tokio::test]
async fn test_all_pages_are_listed() {
    let provider = Arc::new(
        MockDnsProvider::with_records(vec![
            txt(CHALLENGE_NAME, 60, "stale-1"),
            txt(CHALLENGE_NAME, 60, "current"),
            txt(CHALLENGE_NAME, 120, "stale-2"),
        ])
        .with_page_size(1),
    );
    let reconciler = reconciler(&provider);

    let outcome = reconciler
        .reconcile(
            &CancellationToken::new(),
            &txt(CHALLENGE_NAME, 60, "current"),
            false,
        )
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Applied { max_ttl: 120, .. }));
    assert_eq!(provider.list_calls(), 3);

    let changes = provider.submitted_changes();
    assert!(changes[0].additions.is_empty());
    assert_eq!(changes[0].deletions.len(), 2);
    assert_eq!(provider.records(), vec![txt(CHALLENGE_NAME, 60, "current")]);
}

#[tokio::test]
async fn test_other_record_types_are_ignored() {
    let provider = Arc::new(MockDnsProvider::with_records(vec![
        RecordSet::new("rover.example.com.", "A", 300, vec!["192.0.2.1".to_string()]),
        RecordSet::new("rover.example.com.", "TXT", 300, vec!["\"v=spf1 -all\"".to_string()]),
    ]));
    let reconciler = reconciler(&provider);

    let desired = RecordSet::new("rover.example.com.", "A", 60, vec!["192.0.2.7".to_string()]);
    reconciler
        .reconcile(&CancellationToken::new(), &desired, false)
        .await
        .unwrap();

    let records = provider.records();
    assert_eq!(records.len(), 2);
    assert!(records.contains(&desired));
    assert!(records.iter().any(|r| r.record_type == "TXT"));
}

// ============================================================================
// Change completion
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_waits_until_change_done() {
    let provider = Arc::new(MockDnsProvider::new().with_pending_polls(2));
    let reconciler = reconciler(&provider);

    reconciler
        .reconcile(&CancellationToken::new(), &txt(CHALLENGE_NAME, 60, "abc"), false)
        .await
        .unwrap();

    assert_eq!(provider.get_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_done_change_is_not_polled() {
    let provider = Arc::new(MockDnsProvider::new());
    let reconciler = reconciler(&provider);

    reconciler
        .reconcile(&CancellationToken::new(), &txt(CHALLENGE_NAME, 60, "abc"), false)
        .await
        .unwrap();

    assert_eq!(provider.get_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_observed_within_one_poll_interval() {
    let provider = Arc::new(MockDnsProvider::new().with_pending_polls(usize::MAX));
    let reconciler = reconciler(&provider);
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(1_200));

    let started = Instant::now();
    let result = reconciler
        .reconcile(&cancel, &txt(CHALLENGE_NAME, 60, "abc"), false)
        .await;

    assert!(matches!(result, Err(DnsProviderError::Cancelled)));
    assert!(started.elapsed() < Duration::from_millis(1_200) + TEST_POLL_INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_provider_error_while_polling_is_fatal() {
    let provider = Arc::new(MockDnsProvider::new().with_pending_polls(1));
    provider.fail_get_change("backend unavailable");
    let reconciler = reconciler(&provider);

    let result = reconciler
        .reconcile(&CancellationToken::new(), &txt(CHALLENGE_NAME, 60, "abc"), false)
        .await;

    match result {
        Err(DnsProviderError::ApiRequest(message)) => {
            assert!(message.contains("backend unavailable"))
        }
        other => panic!("expected API error, got {:?}", other),
    }
    assert_eq!(provider.get_calls(), 1);
}

// ============================================================================
// Propagation wait
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_propagation_wait_covers_largest_ttl() {
    let provider = Arc::new(MockDnsProvider::with_records(vec![txt(
        CHALLENGE_NAME,
        300,
        "old",
    )]));
    let reconciler = reconciler(&provider);

    let started = Instant::now();
    reconciler
        .reconcile(&CancellationToken::new(), &txt(CHALLENGE_NAME, 60, "new"), true)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn test_no_wait_when_unchanged() {
    let provider = Arc::new(MockDnsProvider::with_records(vec![txt(
        CHALLENGE_NAME,
        60,
        "abc",
    )]));
    let reconciler = reconciler(&provider);

    let started = Instant::now();
    reconciler
        .reconcile(&CancellationToken::new(), &txt(CHALLENGE_NAME, 60, "abc"), true)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_propagation_wait_honors_cancel() {
    let provider = Arc::new(MockDnsProvider::new());
    let reconciler = reconciler(&provider);
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_secs(10));

    let started = Instant::now();
    let result = reconciler
        .reconcile(&cancel, &challenge_record("rover.example.com", "abc"), true)
        .await;

    assert!(matches!(result, Err(DnsProviderError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(provider.create_calls(), 1);
}

// ============================================================================
// Address records
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_address_record_replaces_previous_address() {
    let provider = Arc::new(MockDnsProvider::with_records(vec![RecordSet::new(
        "rover.example.com.",
        "A",
        60,
        vec!["192.0.2.1".to_string()],
    )]));
    let publisher = AddressPublisher::new(reconciler(&provider), "rover.example.com");

    let ip: IpAddr = "203.0.113.9".parse().unwrap();
    publisher
        .update_address_record(&CancellationToken::new(), ip)
        .await
        .unwrap();

    assert_eq!(
        provider.records(),
        vec![RecordSet::new(
            "rover.example.com.",
            "A",
            60,
            vec!["203.0.113.9".to_string()]
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_ipv6_address_publishes_aaaa() {
    let provider = Arc::new(MockDnsProvider::new());
    let publisher = AddressPublisher::new(reconciler(&provider), "rover.example.com");

    publisher
        .update_address_str(&CancellationToken::new(), "2001:db8::7")
        .await
        .unwrap();

    let records = provider.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_type, "AAAA");
    assert_eq!(records[0].rrdatas, vec!["2001:db8::7".to_string()]);
}

#[tokio::test]
async fn test_invalid_address_string_rejected() {
    let provider = Arc::new(MockDnsProvider::new());
    let publisher = AddressPublisher::new(reconciler(&provider), "rover.example.com");

    let result = publisher
        .update_address_str(&CancellationToken::new(), "not-an-ip")
        .await;

    assert!(matches!(result, Err(DnsProviderError::Configuration(_))));
    assert_eq!(provider.list_calls(), 0);
}
