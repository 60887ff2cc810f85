//! Test harness wrapping a verifier around a mock verification service.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use parking_lot::Mutex;
use receipt_check::request::{AttachmentPart, RequestForm};
use receipt_check::{ManualFields, ReceiptTransport, Result, Verifier, VerifierConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

type Responder = dyn Fn(&RequestForm) -> Value + Send + Sync;

/// In-process stand-in for the verification service.
#[derive(Clone)]
pub struct MockService {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<RequestForm>>>,
}

impl MockService {
    /// Service answering every request with `responder(form)`.
    pub fn new(responder: impl Fn(&RequestForm) -> Value + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            requests: Arc::default(),
        }
    }

    /// Service that verifies every receipt, echoing back the fiscal fields.
    pub fn always_valid() -> Self {
        Self::new(|form| {
            let drive = form.get("fn").unwrap_or("9282440300682838");
            let document = form.get("fd").unwrap_or("46534");
            success_response(drive, document)
        })
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Copies of the received request forms.
    pub fn requests(&self) -> Vec<RequestForm> {
        self.requests.lock().clone()
    }
}

impl ReceiptTransport for MockService {
    async fn submit(
        &self,
        form: &RequestForm,
        _attachment: Option<&AttachmentPart>,
    ) -> Result<Value> {
        self.requests.lock().push(form.clone());
        // Yield so concurrent callers interleave.
        tokio::task::yield_now().await;
        Ok((self.responder)(form))
    }
}

/// Successful service payload with two items.
pub fn success_response(drive: &str, document: &str) -> Value {
    json!({
        "code": 1,
        "data": {
            "json": {
                "dateTime": "2024-03-05T09:15:42",
                "user": "ООО Ромашка",
                "userInn": "7701234567",
                "retailPlace": "Магазин №1",
                "retailPlaceAddress": "Москва, ул. Ленина, 1",
                "operator": "Иванова",
                "requestNumber": 12,
                "shiftNumber": 34,
                "fiscalDriveNumber": drive,
                "fiscalDocumentNumber": document,
                "fiscalSign": "1273019065",
                "operationType": 1,
                "totalSum": 100_000,
                "cashTotalSum": 40000,
                "ecashTotalSum": 60000,
                "nds18": 16667,
                "nds": 0,
                "nds0": 0,
                "ndsNo": 0,
                "items": [
                    {"name": "Кофе", "price": 45000, "quantity": 2, "sum": 90000},
                    {"name": "Печенье", "price": 10050, "quantity": 0.995, "sum": 10000}
                ]
            },
            "html": "<table></table>"
        }
    })
}

/// Manual fields for the document number `document`.
pub fn manual_fields(document: &str) -> ManualFields {
    ManualFields {
        fiscal_drive: "9282440300682838".to_string(),
        fiscal_document: document.to_string(),
        fiscal_sign: "1273019065".to_string(),
        timestamp: "20240305T0915".to_string(),
        operation: "1".to_string(),
        total: "1000.00".to_string(),
        qr_scanned: false,
    }
}

/// Verifier plus mock service plus a scratch directory for exports.
pub struct TestHarness {
    /// Shared verifier.
    pub verifier: Arc<Verifier<MockService>>,
    /// The mock service behind it.
    pub service: MockService,
    /// Scratch directory, removed on drop.
    pub dir: TempDir,
}

impl TestHarness {
    /// Harness with default configuration and the given service.
    pub fn setup(service: MockService) -> Self {
        Self::setup_with_config(service, |_| {})
    }

    /// Harness with a tweaked configuration.
    pub fn setup_with_config(
        service: MockService,
        tweak: impl FnOnce(&mut VerifierConfig),
    ) -> Self {
        let mut config = VerifierConfig::default();
        config.token = "e2e-token".to_string();
        tweak(&mut config);

        let verifier = Verifier::with_transport(&config, service.clone()).expect("verifier");
        Self {
            verifier: Arc::new(verifier),
            service,
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }
}
