//! Request construction for the verification service.
//!
//! The service accepts four request shapes: manual fiscal fields, a raw QR
//! payload string, a QR image URL and an uploaded QR image. Each is
//! normalized into a [`RequestForm`] plus an optional binary attachment.

use crate::error::{Error, Result};
use bytes::Bytes;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Multipart field name used for QR image uploads.
pub const QR_FILE_FIELD: &str = "qrfile";

/// Deterministic cache key for a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint over the identifying fiscal fields `(fn, fd, fp, t)`.
    #[must_use]
    pub fn from_fiscal_fields(drive: &str, document: &str, sign: &str, timestamp: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"fiscal\0");
        for part in [drive, document, sign, timestamp] {
            hasher.update(part.as_bytes());
            hasher.update(b"\0");
        }
        Self(hasher.finalize().into())
    }

    /// Fingerprint over an opaque QR payload.
    #[must_use]
    pub fn from_payload(payload: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"qrraw\0");
        hasher.update(payload.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Raw hash bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Ordered key/value parameters sent as the request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestForm {
    fields: Vec<(String, String)>,
}

impl RequestForm {
    /// Create an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field, replacing any earlier value for the same key.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    /// Look up a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All fields in insertion order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Fiscal fields entered by hand (or read off a paper receipt).
///
/// The builder does not check these; call [`ManualFields::validate`] when
/// the input did not come through an already-validating front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualFields {
    /// Fiscal drive serial (`fn`).
    pub fiscal_drive: String,
    /// Fiscal document number (`fd`).
    pub fiscal_document: String,
    /// Fiscal sign (`fp`).
    pub fiscal_sign: String,
    /// Timestamp in `YYYYMMDDTHHmm` form (`t`).
    pub timestamp: String,
    /// Operation type 1-4 (`n`).
    pub operation: String,
    /// Total amount in rubles as a decimal string (`s`).
    pub total: String,
    /// Whether the fields were obtained by scanning a QR code (`qr`).
    pub qr_scanned: bool,
}

impl ManualFields {
    /// Fingerprint over `(fn, fd, fp, t)`.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_fiscal_fields(
            &self.fiscal_drive,
            &self.fiscal_document,
            &self.fiscal_sign,
            &self.timestamp,
        )
    }

    /// Check field formats.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` naming the first malformed field.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("fn", &self.fiscal_drive),
            ("fd", &self.fiscal_document),
            ("fp", &self.fiscal_sign),
        ] {
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::Validation(format!(
                    "{name} must contain only digits, got {value:?}"
                )));
            }
        }

        if !is_qr_timestamp(&self.timestamp) {
            return Err(Error::Validation(format!(
                "t must be in YYYYMMDDTHHmm format, got {:?}",
                self.timestamp
            )));
        }

        if !matches!(self.operation.as_str(), "1" | "2" | "3" | "4") {
            return Err(Error::Validation(format!(
                "n must be 1, 2, 3 or 4, got {:?}",
                self.operation
            )));
        }

        match Decimal::from_str(self.total.trim()) {
            Ok(total) if !total.is_sign_negative() => Ok(()),
            _ => Err(Error::Validation(format!(
                "s must be a non-negative amount, got {:?}",
                self.total
            ))),
        }
    }

    fn to_form(&self) -> RequestForm {
        let mut form = RequestForm::new();
        form.push("fn", self.fiscal_drive.as_str());
        form.push("fd", self.fiscal_document.as_str());
        form.push("fp", self.fiscal_sign.as_str());
        form.push("t", self.timestamp.as_str());
        form.push("n", self.operation.as_str());
        form.push("s", self.total.as_str());
        form.push("qr", if self.qr_scanned { "1" } else { "0" });
        form
    }
}

fn is_qr_timestamp(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 13
        && bytes[8] == b'T'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 8 || b.is_ascii_digit())
}

/// Fiscal fields found in a raw QR payload such as
/// `t=20200924T1837&s=349.93&fn=9282440300682838&i=46534&fp=1273019065&n=1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QrFields {
    /// `t`
    pub timestamp: Option<String>,
    /// `s`
    pub total: Option<String>,
    /// `fn`
    pub fiscal_drive: Option<String>,
    /// `i` (or `fd`)
    pub fiscal_document: Option<String>,
    /// `fp`
    pub fiscal_sign: Option<String>,
    /// `n`
    pub operation: Option<String>,
}

impl QrFields {
    /// Extract the known keys from a `k=v&k=v` payload. Unknown keys and
    /// pairs without `=` are ignored.
    #[must_use]
    pub fn parse(payload: &str) -> Self {
        let mut fields = Self::default();
        for pair in payload.trim().split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = Some(value.to_string());
            match key {
                "t" => fields.timestamp = value,
                "s" => fields.total = value,
                "fn" => fields.fiscal_drive = value,
                "i" | "fd" => fields.fiscal_document = value,
                "fp" => fields.fiscal_sign = value,
                "n" => fields.operation = value,
                _ => {}
            }
        }
        fields
    }

    /// Fiscal-field fingerprint, if all four identifying fields are present.
    #[must_use]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match (
            &self.fiscal_drive,
            &self.fiscal_document,
            &self.fiscal_sign,
            &self.timestamp,
        ) {
            (Some(drive), Some(document), Some(sign), Some(timestamp)) => Some(
                Fingerprint::from_fiscal_fields(drive, document, sign, timestamp),
            ),
            _ => None,
        }
    }
}

/// Binary part uploaded alongside the form.
#[derive(Debug, Clone)]
pub struct AttachmentPart {
    /// Multipart field name.
    pub field: &'static str,
    /// File name reported to the service.
    pub file_name: String,
    /// File contents.
    pub bytes: Bytes,
}

/// Open handle to a QR image on disk.
///
/// The handle is acquired when the request is built and released when the
/// image is consumed by [`QrImage::into_part`] or dropped, whichever comes
/// first.
#[derive(Debug)]
pub struct QrImage {
    path: PathBuf,
    file: std::fs::File,
}

impl QrImage {
    /// Open the image without reading it.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the path does not exist, or an I/O
    /// error if it cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        debug!("Opened QR image {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Path the image was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the image and release the handle.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails. The handle is released either way.
    pub async fn into_part(self) -> Result<AttachmentPart> {
        let file_name = self
            .path
            .file_name()
            .map_or_else(|| "qr.png".to_string(), |n| n.to_string_lossy().into_owned());

        let mut file = tokio::fs::File::from_std(self.file);
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        Ok(AttachmentPart {
            field: QR_FILE_FIELD,
            file_name,
            bytes: Bytes::from(buf),
        })
    }
}

/// Optional fields appended to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFields {
    /// Promo campaign id (`promo_id`).
    pub promo_id: Option<u64>,
    /// Caller key/value pairs, sent as `userdata_<key>`.
    pub userdata: Vec<(String, String)>,
}

impl ExtraFields {
    /// No extra fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the promo campaign id.
    #[must_use]
    pub fn with_promo_id(mut self, promo_id: u64) -> Self {
        self.promo_id = Some(promo_id);
        self
    }

    /// Add a user data pair.
    #[must_use]
    pub fn with_userdata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.userdata.push((key.into(), value.into()));
        self
    }

    /// Append the fields to a form.
    pub fn apply(&self, form: &mut RequestForm) {
        if let Some(promo_id) = self.promo_id {
            form.push("promo_id", promo_id.to_string());
        }
        for (key, value) in &self.userdata {
            form.push(format!("userdata_{key}"), value.as_str());
        }
    }
}

/// A single verification request in one of the four supported shapes.
#[derive(Debug)]
pub enum VerificationRequest {
    /// Manually supplied fiscal fields.
    Manual(ManualFields),
    /// Raw QR payload string.
    RawQr {
        /// The payload, e.g. `t=...&s=...&fn=...&i=...&fp=...&n=1`.
        payload: String,
    },
    /// URL of a QR image the service downloads itself.
    QrUrl {
        /// Image URL.
        url: String,
    },
    /// QR image uploaded from disk.
    QrFile(QrImage),
}

impl VerificationRequest {
    /// Request from manual fiscal fields.
    #[must_use]
    pub fn manual(fields: ManualFields) -> Self {
        Self::Manual(fields)
    }

    /// Request from a raw QR payload.
    #[must_use]
    pub fn raw_qr(payload: impl Into<String>) -> Self {
        Self::RawQr {
            payload: payload.into(),
        }
    }

    /// Request from a QR image URL.
    #[must_use]
    pub fn qr_url(url: impl Into<String>) -> Self {
        Self::QrUrl { url: url.into() }
    }

    /// Request from a QR image file.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the path does not exist.
    pub fn qr_file(path: impl AsRef<Path>) -> Result<Self> {
        QrImage::open(path).map(Self::QrFile)
    }

    /// Short name of the request shape, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Manual(_) => "manual",
            Self::RawQr { .. } => "qrraw",
            Self::QrUrl { .. } => "qrurl",
            Self::QrFile(_) => "qrfile",
        }
    }

    /// Cache key, if one can be derived before contacting the service.
    ///
    /// Manual requests hash `(fn, fd, fp, t)`. Raw QR payloads hash the same
    /// fields when the payload carries all of them and the payload itself
    /// otherwise. Image requests have no fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match self {
            Self::Manual(fields) => Some(fields.fingerprint()),
            Self::RawQr { payload } => Some(
                QrFields::parse(payload)
                    .fingerprint()
                    .unwrap_or_else(|| Fingerprint::from_payload(payload)),
            ),
            Self::QrUrl { .. } | Self::QrFile(_) => None,
        }
    }

    /// Split into the request form and the image handle, if any.
    #[must_use]
    pub fn into_parts(self) -> (RequestForm, Option<QrImage>) {
        match self {
            Self::Manual(fields) => (fields.to_form(), None),
            Self::RawQr { payload } => {
                let mut form = RequestForm::new();
                form.push("qrraw", payload);
                (form, None)
            }
            Self::QrUrl { url } => {
                let mut form = RequestForm::new();
                form.push("qrurl", url);
                (form, None)
            }
            Self::QrFile(image) => (RequestForm::new(), Some(image)),
        }
    }
}
