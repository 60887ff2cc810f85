//! HTTP transport to the verification service.

use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::request::{AttachmentPart, RequestForm};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Sends one request to the verification service and decodes the JSON body.
///
/// Implementations report network-level problems (connection, HTTP status,
/// undecodable body) as `Error::Transport`; service status codes are left in
/// the returned JSON for the caller to interpret.
pub trait ReceiptTransport: Send + Sync {
    /// Submit `form`, uploading `attachment` as a multipart file part if given.
    fn submit(
        &self,
        form: &RequestForm,
        attachment: Option<&AttachmentPart>,
    ) -> impl Future<Output = Result<Value>> + Send;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
}

impl HttpTransport {
    /// Create a transport for `api_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("receipt-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }

    /// Create a transport from the verifier configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &VerifierConfig) -> Result<Self> {
        Self::new(config.api_url.clone(), config.request_timeout())
    }

    /// Endpoint requests are sent to.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl ReceiptTransport for HttpTransport {
    async fn submit(
        &self,
        form: &RequestForm,
        attachment: Option<&AttachmentPart>,
    ) -> Result<Value> {
        let request = self.client.post(&self.api_url);
        let request = match attachment {
            Some(part) => {
                debug!(
                    "Uploading {} ({} bytes) as {}",
                    part.file_name,
                    part.bytes.len(),
                    part.field
                );
                let multipart = form
                    .fields()
                    .iter()
                    .fold(Form::new(), |acc, (key, value)| {
                        acc.text(key.clone(), value.clone())
                    })
                    .part(
                        part.field,
                        Part::stream(part.bytes.clone()).file_name(part.file_name.clone()),
                    );
                request.multipart(multipart)
            }
            None => request.form(form.fields()),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Transport(e.to_string()))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::Transport(format!("invalid response body: {e}")))
    }
}
