//! Main receipt verifier combining the result cache, the retry policy and
//! the service transport.

use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::receipt::Receipt;
use crate::request::{ExtraFields, VerificationRequest};
use crate::verify::cache::{CacheStats, ReceiptCache};
use crate::verify::retry::{RetryDecision, RetryPolicy};
use crate::verify::transport::{HttpTransport, ReceiptTransport};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Verifies receipts against the service.
///
/// Combines:
/// 1. LRU cache of previously verified receipts, keyed by request fingerprint
/// 2. Status-code driven retry loop with backoff
/// 3. The service transport
///
/// One verifier is meant to be shared by every caller; the cache is the
/// only mutable state and is internally synchronized.
pub struct Verifier<T = HttpTransport> {
    transport: T,
    cache: ReceiptCache,
    policy: RetryPolicy,
    token: String,
    max_attempts: u32,
}

impl Verifier<HttpTransport> {
    /// Create a verifier talking HTTP to the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &VerifierConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: ReceiptTransport> Verifier<T> {
    /// Create a verifier with a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_transport(config: &VerifierConfig, transport: T) -> Result<Self> {
        config.validate()?;
        if config.token.is_empty() {
            warn!("No API token configured - the service will reject requests");
        }

        info!(
            "Receipt verifier initialized (cache_capacity={}, max_attempts={}, base_delay={}s)",
            config.cache.capacity, config.retry.max_attempts, config.retry.base_delay_secs
        );

        Ok(Self {
            transport,
            cache: ReceiptCache::with_capacity(config.cache.capacity),
            policy: RetryPolicy::new(config.retry.base_delay_secs),
            token: config.token.clone(),
            max_attempts: config.retry.max_attempts,
        })
    }

    /// Verify a receipt.
    ///
    /// Failures never surface as `Err`: the returned receipt is invalid and
    /// carries the reason. Use [`Receipt::into_result`] to convert.
    pub async fn verify(&self, request: VerificationRequest, extra: &ExtraFields) -> Receipt {
        self.run(request, extra, None).await
    }

    /// Verify a receipt, giving up when `shutdown` turns `true`.
    ///
    /// The signal is checked before every attempt and while waiting to
    /// retry; a cancelled call returns [`Receipt::cancelled`].
    pub async fn verify_with_shutdown(
        &self,
        request: VerificationRequest,
        extra: &ExtraFields,
        shutdown: watch::Receiver<bool>,
    ) -> Receipt {
        self.run(request, extra, Some(shutdown)).await
    }

    async fn run(
        &self,
        request: VerificationRequest,
        extra: &ExtraFields,
        mut shutdown: Option<watch::Receiver<bool>>,
    ) -> Receipt {
        let kind = request.kind();

        // Step 1: Check cache (fast path)
        let fingerprint = request.fingerprint();
        if let Some(fingerprint) = fingerprint {
            if let Some(cached) = self.cache.get(&fingerprint) {
                debug!("Receipt {fingerprint} found in cache");
                return cached;
            }
        }

        // Step 2: Build the request body
        let (mut form, image) = request.into_parts();
        form.push("token", self.token.as_str());
        extra.apply(&mut form);

        let attachment = match image {
            Some(image) => {
                let path = image.path().to_path_buf();
                match image.into_part().await {
                    Ok(part) => Some(part),
                    Err(e) => {
                        warn!("Failed to read QR image {}: {e}", path.display());
                        return Receipt::network_error(format!(
                            "failed to read QR image {}: {e}",
                            path.display()
                        ));
                    }
                }
            }
            None => None,
        };

        // Step 3: Retry loop
        for attempt in 0..self.max_attempts {
            if is_cancelled(shutdown.as_ref()) {
                info!("Verification ({kind}) cancelled before attempt {}", attempt + 1);
                return Receipt::cancelled();
            }

            let attempts_left = attempt + 1 < self.max_attempts;
            debug!(
                "Submitting {kind} request (attempt {}/{})",
                attempt + 1,
                self.max_attempts
            );

            match self.transport.submit(&form, attachment.as_ref()).await {
                Err(e) => {
                    let message = match e {
                        Error::Transport(message) => message,
                        other => other.to_string(),
                    };
                    warn!("Request failed: {message}");
                    if !attempts_left {
                        return Receipt::network_error(message);
                    }
                    let delay = self.policy.transport_delay(attempt);
                    info!("Network error, retrying in {:.2}s", delay.as_secs_f64());
                    if !wait_or_cancel(delay, shutdown.as_mut()).await {
                        info!("Verification ({kind}) cancelled during backoff");
                        return Receipt::cancelled();
                    }
                }
                Ok(response) => {
                    let code = response.get("code").and_then(Value::as_i64).unwrap_or(-1);
                    match self.policy.decide(code, attempt) {
                        RetryDecision::Accept => {
                            let receipt = Receipt::from_service_response(response);
                            if let Some(fingerprint) = fingerprint {
                                if self.cache.put(fingerprint, receipt.clone()) {
                                    debug!("Cached receipt {fingerprint}");
                                }
                            }
                            info!("Receipt verified ({kind}) on attempt {}", attempt + 1);
                            return receipt;
                        }
                        RetryDecision::Retry(delay) => {
                            if !attempts_left {
                                warn!(
                                    "Code {code} on final attempt {}/{}, giving up",
                                    attempt + 1,
                                    self.max_attempts
                                );
                                return Receipt::from_service_response(response);
                            }
                            info!(
                                "Code {code} received, retrying in {:.2}s (attempt {}/{})",
                                delay.as_secs_f64(),
                                attempt + 1,
                                self.max_attempts
                            );
                            if !wait_or_cancel(delay, shutdown.as_mut()).await {
                                info!("Verification ({kind}) cancelled during backoff");
                                return Receipt::cancelled();
                            }
                        }
                        RetryDecision::Terminal => {
                            debug!("Terminal code {code} for {kind} request");
                            return Receipt::from_service_response(response);
                        }
                    }
                }
            }
        }

        warn!(
            "Verification ({kind}) gave up after {} attempts",
            self.max_attempts
        );
        Receipt::retry_exhausted(None)
    }

    /// The shared result cache.
    #[must_use]
    pub fn cache(&self) -> &ReceiptCache {
        &self.cache
    }

    /// Get cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Remove all cached receipts and reset the statistics.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The retry policy in use.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Maximum attempts per verification.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

fn is_cancelled(shutdown: Option<&watch::Receiver<bool>>) -> bool {
    shutdown.is_some_and(|rx| *rx.borrow())
}

/// Sleep for `delay`. Returns `false` if `shutdown` turned `true` first.
async fn wait_or_cancel(delay: Duration, shutdown: Option<&mut watch::Receiver<bool>>) -> bool {
    let Some(rx) = shutdown else {
        tokio::time::sleep(delay).await;
        return true;
    };
    if *rx.borrow() {
        return false;
    }

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return true,
            changed = rx.changed() => {
                if changed.is_err() {
                    // Sender gone: nobody can cancel any more.
                    (&mut sleep).await;
                    return true;
                }
                if *rx.borrow() {
                    return false;
                }
            }
        }
    }
}
