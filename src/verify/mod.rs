//! Receipt verification engine.
//!
//! This module implements the verification strategy:
//! 1. Serve receipts that were already verified from the LRU cache
//! 2. Otherwise ask the service, retrying the codes that may clear up
//!
//! # Architecture
//!
//! ```text
//! verify(request) received
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Check LRU cache     │  (manual / raw QR requests only)
//! └─────────┬───────────┘
//!           │
//!    ┌──────┴──────┐
//!    │             │
//!   HIT          MISS
//!    │             │
//!    ▼             ▼
//! Return       POST to service ◄──────────┐
//!                  │                      │
//!       ┌──────────┼───────────┐          │
//!       │          │           │          │
//!    code 1    code 2/3/4   other    backoff (RetryPolicy)
//!       │          │           │          │
//!       ▼          └───────────┼──────────┘
//!  Cache + return              ▼
//!                      Return invalid receipt
//! ```

mod cache;
mod retry;
mod transport;
mod verifier;

pub use cache::{CacheStats, ReceiptCache, DEFAULT_CACHE_CAPACITY};
pub use retry::{RetryDecision, RetryPolicy};
pub use transport::{HttpTransport, ReceiptTransport};
pub use verifier::Verifier;
