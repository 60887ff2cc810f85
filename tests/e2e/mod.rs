//! End-to-end tests for receipt-check.
//!
//! These tests drive the public API (request building, verification with
//! retries and caching, export) against an in-process mock of the
//! verification service.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test e2e
//! ```

mod export_flow;
mod harness;
mod verify_flow;
