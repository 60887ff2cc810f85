//! # receipt-check
//!
//! Verification of Russian fiscal receipts against the proverkacheka
//! service.
//!
//! A [`VerificationRequest`] is built from one of four inputs (manual fiscal
//! fields, a raw QR payload, a QR image URL or a QR image file) and handed
//! to a [`Verifier`], which serves repeats from its cache, retries the
//! service's transient status codes with backoff and parses the answer into
//! a [`Receipt`]. The [`export`] module renders receipts as text and CSV.
//!
//! ```rust,ignore
//! use receipt_check::{ExtraFields, VerificationRequest, Verifier, VerifierConfig};
//!
//! let verifier = Verifier::from_config(&VerifierConfig::default())?;
//! let receipt = verifier
//!     .verify(VerificationRequest::raw_qr(qr), &ExtraFields::new())
//!     .await;
//! println!("{}", receipt_check::export::to_text(&receipt));
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod receipt;
pub mod request;
pub mod verify;

pub use config::VerifierConfig;
pub use error::{Error, Result};
pub use receipt::{Receipt, ReceiptDetails, ReceiptItem, StatusCode};
pub use request::{ExtraFields, Fingerprint, ManualFields, VerificationRequest};
pub use verify::{ReceiptCache, ReceiptTransport, RetryPolicy, Verifier};
