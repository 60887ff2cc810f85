//! Verify-then-export flow.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{manual_fields, MockService, TestHarness};
use receipt_check::export::{to_text, write_csv, write_raw_json};
use receipt_check::{ExtraFields, VerificationRequest};
use serde_json::json;

#[tokio::test]
async fn test_csv_items_match_receipt() {
    let harness = TestHarness::setup(MockService::always_valid());
    let receipt = harness
        .verifier
        .verify(VerificationRequest::manual(manual_fields("46534")), &ExtraFields::new())
        .await;

    let out_dir = harness.dir.path().join("receipts");
    let path = write_csv(&receipt, &out_dir)
        .expect("write")
        .expect("verified receipts are exported");
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("2024-03-05_09-15-42_9282440300682838_46534_1273019065.csv")
    );

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&path)
        .expect("open");
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.expect("row").iter().map(str::to_string).collect())
        .collect();

    let header = rows
        .iter()
        .position(|r| r.first().map(String::as_str) == Some("Item Name"))
        .expect("items section");
    assert_eq!(rows[header + 1], ["Кофе", "450.00", "2", "900.00"]);
    assert_eq!(rows[header + 2], ["Печенье", "100.50", "0.995", "100.00"]);
    assert_eq!(rows[header + 3], ["Payment Method", "Amount (₽)"]);
    assert!(rows.contains(&vec!["TOTAL".to_string(), "1000.00".to_string()]));
    assert!(rows.contains(&vec!["VAT 20%".to_string(), "166.67".to_string()]));
}

#[tokio::test]
async fn test_rejected_receipt_exports_nothing() {
    let service = MockService::new(|_| json!({"code": 7, "error": "Wrong token"}));
    let harness = TestHarness::setup(service);
    let receipt = harness
        .verifier
        .verify(VerificationRequest::raw_qr("t=1"), &ExtraFields::new())
        .await;

    assert_eq!(to_text(&receipt), "❌ Wrong token");
    assert!(write_csv(&receipt, harness.dir.path()).expect("ok").is_none());
}

#[tokio::test]
async fn test_raw_json_is_verbatim() {
    let harness = TestHarness::setup(MockService::always_valid());
    let receipt = harness
        .verifier
        .verify(VerificationRequest::manual(manual_fields("3")), &ExtraFields::new())
        .await;

    let path = write_raw_json(&receipt, harness.dir.path()).expect("write");
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).expect("read")).expect("json");
    assert_eq!(saved["data"]["json"]["fiscalDocumentNumber"], "3");
    assert_eq!(&saved, receipt.raw());
}
