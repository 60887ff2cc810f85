//! Verification flow through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{manual_fields, success_response, MockService, TestHarness};
use receipt_check::{Error, ExtraFields, StatusCode, VerificationRequest};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Service response in scenario form: total 100000 kopecks parses to 1000.00.
#[tokio::test]
async fn test_valid_receipt_is_parsed() {
    let harness = TestHarness::setup(MockService::always_valid());

    let receipt = harness
        .verifier
        .verify(VerificationRequest::manual(manual_fields("1")), &ExtraFields::new())
        .await;

    assert!(receipt.is_valid());
    assert!(receipt.error_message().is_none());
    let details = receipt.details().expect("verified");
    assert_eq!(details.total_sum, Decimal::new(100_000, 2));
    assert_eq!(details.items.len(), 2);
    assert_eq!(details.items[1].quantity, Decimal::new(995, 3));
    assert_eq!(details.html, "<table></table>");
}

/// A QR payload carrying the same fiscal fields as an earlier manual
/// request is served from the cache.
#[tokio::test]
async fn test_qr_payload_hits_manual_cache_entry() {
    let harness = TestHarness::setup(MockService::always_valid());

    let first = harness
        .verifier
        .verify(VerificationRequest::manual(manual_fields("77")), &ExtraFields::new())
        .await;
    let second = harness
        .verifier
        .verify(
            VerificationRequest::raw_qr(
                "t=20240305T0915&s=1000.00&fn=9282440300682838&i=77&fp=1273019065&n=1",
            ),
            &ExtraFields::new(),
        )
        .await;

    assert!(first.is_valid());
    assert_eq!(first, second);
    assert_eq!(harness.service.request_count(), 1);
}

#[tokio::test]
async fn test_capacity_evicts_oldest_through_verifier() {
    let harness =
        TestHarness::setup_with_config(MockService::always_valid(), |c| c.cache.capacity = 2);
    let extra = ExtraFields::new();

    for doc in ["A", "B", "C"] {
        let _ = harness
            .verifier
            .verify(VerificationRequest::manual(manual_fields(doc)), &extra)
            .await;
    }
    assert_eq!(harness.service.request_count(), 3);

    // B and C are cached, A was evicted.
    let _ = harness
        .verifier
        .verify(VerificationRequest::manual(manual_fields("C")), &extra)
        .await;
    assert_eq!(harness.service.request_count(), 3);
    let _ = harness
        .verifier
        .verify(VerificationRequest::manual(manual_fields("A")), &extra)
        .await;
    assert_eq!(harness.service.request_count(), 4);
}

#[tokio::test]
async fn test_concurrent_distinct_receipts_fill_cache() {
    let harness = TestHarness::setup(MockService::always_valid());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let verifier = Arc::clone(&harness.verifier);
            tokio::spawn(async move {
                verifier
                    .verify(
                        VerificationRequest::manual(manual_fields(&i.to_string())),
                        &ExtraFields::new(),
                    )
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.expect("join").is_valid());
    }

    assert_eq!(harness.service.request_count(), 8);
    let stats = harness.verifier.cache_stats();
    assert_eq!(stats.size, 8);
    assert_eq!(stats.misses, 8);

    harness.verifier.clear_cache();
    assert_eq!(harness.verifier.cache_stats().size, 0);
    assert_eq!(harness.verifier.cache_stats().misses, 0);
}

#[tokio::test]
async fn test_concurrent_same_receipt_then_cache_hit() {
    let harness = TestHarness::setup(MockService::always_valid());

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let verifier = Arc::clone(&harness.verifier);
            tokio::spawn(async move {
                verifier
                    .verify(
                        VerificationRequest::manual(manual_fields("500")),
                        &ExtraFields::new(),
                    )
                    .await
            })
        })
        .collect();

    let mut receipts = Vec::new();
    for task in tasks {
        receipts.push(task.await.expect("join"));
    }
    assert!(receipts.iter().all(receipt_check::Receipt::is_valid));

    // Callers racing on a cold entry may each reach the service.
    let concurrent_requests = harness.service.request_count();
    assert!((1..=4).contains(&concurrent_requests));
    assert_eq!(harness.verifier.cache_stats().size, 1);

    let later = harness
        .verifier
        .verify(
            VerificationRequest::raw_qr(
                "fn=9282440300682838&i=500&fp=1273019065&t=20240305T0915&s=1000.00&n=1",
            ),
            &ExtraFields::new(),
        )
        .await;

    assert!(later.is_valid());
    assert_eq!(harness.service.request_count(), concurrent_requests);
    let stats = harness.verifier.cache_stats();
    assert_eq!(stats.size, 1);
    assert!(stats.hits >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_then_verified() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let service = MockService::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
            json!({"code": 2})
        } else {
            success_response("9282440300682838", "5")
        }
    });
    let harness = TestHarness::setup(service);

    let started = tokio::time::Instant::now();
    let receipt = harness
        .verifier
        .verify(VerificationRequest::qr_url("https://example.com/qr.png"), &ExtraFields::new())
        .await;

    assert!(receipt.is_valid());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 1.0s then 1.5s
    assert_eq!(started.elapsed(), std::time::Duration::from_millis(2500));
}

#[tokio::test]
async fn test_terminal_response_maps_to_api_error() {
    let service = MockService::new(|_| json!({"code": 5}));
    let harness = TestHarness::setup(service);

    let receipt = harness
        .verifier
        .verify(VerificationRequest::raw_qr("t=1&s=2"), &ExtraFields::new())
        .await;

    assert!(!receipt.is_valid());
    assert_eq!(receipt.status(), StatusCode::Unavailable);
    assert_eq!(harness.service.request_count(), 1);
    assert!(matches!(
        receipt.into_result(),
        Err(Error::Api { code: 5, .. })
    ));
}

#[tokio::test]
async fn test_request_body_carries_token_and_extras() {
    let harness = TestHarness::setup(MockService::always_valid());
    let extra = ExtraFields::new()
        .with_promo_id(11)
        .with_userdata("user", "alice")
        .with_userdata("chat", "7");

    let _ = harness
        .verifier
        .verify(VerificationRequest::manual(manual_fields("9")), &extra)
        .await;

    let requests = harness.service.requests();
    let form = &requests[0];
    assert_eq!(form.get("token"), Some("e2e-token"));
    assert_eq!(form.get("fd"), Some("9"));
    assert_eq!(form.get("qr"), Some("0"));
    assert_eq!(form.get("promo_id"), Some("11"));
    assert_eq!(form.get("userdata_user"), Some("alice"));
    assert_eq!(form.get("userdata_chat"), Some("7"));
}

#[test]
fn test_missing_qr_file_fails_before_network() {
    let result = VerificationRequest::qr_file("/no/such/qr.png");
    assert!(matches!(result, Err(Error::FileNotFound(_))));
}
