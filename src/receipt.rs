//! Receipt domain model and the parser for verification service responses.
//!
//! Monetary values arrive from the service as integer kopecks and are kept
//! as exact [`Decimal`] rubles.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Local status for a network-level failure.
pub const STATUS_NETWORK_ERROR: i64 = -1;
/// Local status for a verification that ran out of attempts.
pub const STATUS_RETRY_EXHAUSTED: i64 = -2;
/// Local status for a cancelled verification.
pub const STATUS_CANCELLED: i64 = -3;

/// Timestamp format used in the service payload.
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Status code reported by the verification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 0: the receipt is not valid.
    Invalid,
    /// 1: the receipt was verified.
    Success,
    /// 2: data is not yet available.
    NotReady,
    /// 3: request limit exceeded.
    RateLimited,
    /// 4: wait before retrying.
    WaitBeforeRetry,
    /// 5: data could not be obtained.
    Unavailable,
    /// Any other code.
    Other(i64),
}

impl StatusCode {
    /// Numeric code.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Invalid => 0,
            Self::Success => 1,
            Self::NotReady => 2,
            Self::RateLimited => 3,
            Self::WaitBeforeRetry => 4,
            Self::Unavailable => 5,
            Self::Other(code) => code,
        }
    }

    /// Fixed message for the codes the service does not explain itself.
    #[must_use]
    pub fn canned_message(self) -> Option<&'static str> {
        match self {
            Self::Invalid => Some("Invalid receipt"),
            Self::NotReady => Some("Receipt data not yet available"),
            Self::RateLimited => Some("Request limit exceeded"),
            Self::WaitBeforeRetry => Some("Wait before retrying"),
            Self::Unavailable => Some("Data not received"),
            Self::Success | Self::Other(_) => None,
        }
    }
}

impl From<i64> for StatusCode {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Invalid,
            1 => Self::Success,
            2 => Self::NotReady,
            3 => Self::RateLimited,
            4 => Self::WaitBeforeRetry,
            5 => Self::Unavailable,
            other => Self::Other(other),
        }
    }
}

/// Receipt operation type (`n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    /// 1: income (sale).
    Income,
    /// 2: return of income.
    IncomeReturn,
    /// 3: expense.
    Expense,
    /// 4: return of expense.
    ExpenseReturn,
}

impl OperationType {
    /// Map the numeric code.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Income),
            2 => Some(Self::IncomeReturn),
            3 => Some(Self::Expense),
            4 => Some(Self::ExpenseReturn),
            _ => None,
        }
    }
}

/// Single line of a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptItem {
    /// Product name.
    pub name: String,
    /// Unit price in rubles.
    pub price: Decimal,
    /// Quantity, possibly fractional.
    pub quantity: Decimal,
    /// Line sum in rubles.
    pub sum: Decimal,
}

/// Business content of a verified receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptDetails {
    /// Receipt date and time; `None` if the service value did not parse.
    pub timestamp: Option<NaiveDateTime>,
    /// Organization name.
    pub organization: String,
    /// Retail place address.
    pub address: String,
    /// Organization tax id (INN).
    pub inn: String,
    /// Retail place name.
    pub place: String,
    /// Cashier name.
    pub cashier: String,
    /// Receipt number within the shift.
    pub request_number: String,
    /// Shift number.
    pub shift_number: String,
    /// Fiscal drive serial.
    pub fiscal_drive_number: String,
    /// Fiscal document number.
    pub fiscal_document_number: String,
    /// Fiscal sign.
    pub fiscal_sign: String,
    /// Raw operation type code.
    pub operation_type: i64,
    /// Receipt lines in service order.
    pub items: Vec<ReceiptItem>,
    /// Total in rubles.
    pub total_sum: Decimal,
    /// Cash part in rubles.
    pub cash_sum: Decimal,
    /// Card part in rubles.
    pub card_sum: Decimal,
    /// VAT at 20%.
    pub vat_20: Decimal,
    /// VAT at 10%.
    pub vat_10: Decimal,
    /// VAT at 0%.
    pub vat_0: Decimal,
    /// Amount not subject to VAT.
    pub vat_none: Decimal,
    /// HTML rendering embedded in the response.
    pub html: String,
}

impl ReceiptDetails {
    /// Receipt date as `YYYY-MM-DD`, empty if unknown.
    #[must_use]
    pub fn date(&self) -> String {
        self.timestamp
            .map(|ts| ts.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    /// Receipt time as `HH:MM:SS`, empty if unknown.
    #[must_use]
    pub fn time(&self) -> String {
        self.timestamp
            .map(|ts| ts.format("%H:%M:%S").to_string())
            .unwrap_or_default()
    }

    /// Typed operation type, if the code is known.
    #[must_use]
    pub fn operation_type(&self) -> Option<OperationType> {
        OperationType::from_code(self.operation_type)
    }
}

/// Why a receipt could not be verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The service answered with a terminal non-success code.
    Service,
    /// The service could not be reached.
    Transport,
    /// Every attempt returned a retryable code.
    RetryExhausted,
    /// The caller cancelled the verification.
    Cancelled,
}

/// Verification outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The receipt was verified.
    Verified(Box<ReceiptDetails>),
    /// The receipt was not verified.
    Rejected {
        /// Failure category.
        reason: RejectReason,
        /// Human-readable reason.
        message: String,
    },
}

/// Result of verifying one receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    code: i64,
    checked_at: DateTime<Utc>,
    verdict: Verdict,
    raw: Value,
}

impl Receipt {
    /// Build a receipt from the decoded service response.
    ///
    /// Known error codes carry their fixed message, any other non-success
    /// code carries the service-supplied `error` text. The full response is
    /// retained for export in both cases.
    #[must_use]
    pub fn from_service_response(response: Value) -> Self {
        let code = response.get("code").and_then(Value::as_i64).unwrap_or(-1);
        let status = StatusCode::from(code);

        if status != StatusCode::Success {
            let message = status.canned_message().map_or_else(
                || match response.get("error") {
                    Some(Value::String(text)) if !text.is_empty() => text.clone(),
                    Some(Value::String(_) | Value::Null) | None => "Unknown error".to_string(),
                    Some(other) => other.to_string(),
                },
                str::to_string,
            );
            return Self::rejected(code, RejectReason::Service, message, response);
        }

        let data = response.get("data");
        let json = data.and_then(|d| d.get("json"));
        let field = |key: &str| json.and_then(|j| j.get(key));
        let first = |keys: &[&str]| keys.iter().find_map(|key| field(*key));

        let timestamp = field("dateTime")
            .and_then(Value::as_str)
            .and_then(|s| NaiveDateTime::parse_from_str(s, DATE_TIME_FORMAT).ok());

        let items = field("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(parse_item).collect())
            .unwrap_or_default();

        let details = ReceiptDetails {
            timestamp,
            organization: text(field("user")),
            address: text(field("retailPlaceAddress")),
            inn: text(field("userInn")),
            place: text(field("retailPlace")),
            cashier: text(field("operator")),
            request_number: text(field("requestNumber")),
            shift_number: text(field("shiftNumber")),
            fiscal_drive_number: text(field("fiscalDriveNumber")),
            fiscal_document_number: text(field("fiscalDocumentNumber")),
            fiscal_sign: text(field("fiscalSign")),
            operation_type: field("operationType").and_then(Value::as_i64).unwrap_or(0),
            items,
            total_sum: rubles(field("totalSum")),
            cash_sum: rubles(field("cashTotalSum")),
            card_sum: rubles(field("ecashTotalSum")),
            vat_20: rubles(first(&["nds18", "nds20"])),
            vat_10: rubles(first(&["nds", "nds10"])),
            vat_0: rubles(field("nds0")),
            vat_none: rubles(field("ndsNo")),
            html: text(data.and_then(|d| d.get("html"))),
        };

        Self {
            code,
            checked_at: Utc::now(),
            verdict: Verdict::Verified(Box::new(details)),
            raw: response,
        }
    }

    /// Receipt for a service error that produced no usable response body.
    #[must_use]
    pub fn network_error(message: impl std::fmt::Display) -> Self {
        Self::rejected(
            STATUS_NETWORK_ERROR,
            RejectReason::Transport,
            format!("Network error: {message}"),
            Value::Null,
        )
    }

    /// Receipt for a verification that ran out of attempts.
    #[must_use]
    pub fn retry_exhausted(last_reason: Option<&str>) -> Self {
        let message = last_reason.map_or_else(
            || "Max retries exceeded".to_string(),
            |reason| format!("Max retries exceeded: {reason}"),
        );
        Self::rejected(
            STATUS_RETRY_EXHAUSTED,
            RejectReason::RetryExhausted,
            message,
            Value::Null,
        )
    }

    /// Receipt for a cancelled verification.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::rejected(
            STATUS_CANCELLED,
            RejectReason::Cancelled,
            "Verification cancelled".to_string(),
            Value::Null,
        )
    }

    fn rejected(code: i64, reason: RejectReason, message: String, raw: Value) -> Self {
        Self {
            code,
            checked_at: Utc::now(),
            verdict: Verdict::Rejected { reason, message },
            raw,
        }
    }

    /// Status code (service code, or a negative local status).
    #[must_use]
    pub fn code(&self) -> i64 {
        self.code
    }

    /// Typed status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from(self.code)
    }

    /// Whether the receipt was verified.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self.verdict, Verdict::Verified(_))
    }

    /// Verification outcome.
    #[must_use]
    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// Business content, for verified receipts.
    #[must_use]
    pub fn details(&self) -> Option<&ReceiptDetails> {
        match &self.verdict {
            Verdict::Verified(details) => Some(details),
            Verdict::Rejected { .. } => None,
        }
    }

    /// Failure message, for receipts that were not verified.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.verdict {
            Verdict::Verified(_) => None,
            Verdict::Rejected { message, .. } => Some(message),
        }
    }

    /// When this result was produced.
    #[must_use]
    pub fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }

    /// The service response this receipt was built from, verbatim.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Turn a rejected receipt into the matching error.
    ///
    /// # Errors
    ///
    /// Returns `Error::Api`, `Error::Transport`, `Error::RetryExhausted` or
    /// `Error::Cancelled` according to why the receipt was rejected.
    pub fn into_result(self) -> Result<Self> {
        match &self.verdict {
            Verdict::Verified(_) => Ok(self),
            Verdict::Rejected { reason, message } => Err(match reason {
                RejectReason::Service => Error::Api {
                    code: self.code,
                    message: message.clone(),
                },
                RejectReason::Transport => Error::Transport(message.clone()),
                RejectReason::RetryExhausted => Error::RetryExhausted(message.clone()),
                RejectReason::Cancelled => Error::Cancelled,
            }),
        }
    }
}

fn parse_item(item: &Value) -> ReceiptItem {
    ReceiptItem {
        name: text(item.get("name")),
        price: rubles(item.get("price")),
        quantity: decimal(item.get("quantity")),
        sum: rubles(item.get("sum")),
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn decimal(value: Option<&Value>) -> Decimal {
    let repr = match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => return Decimal::ZERO,
    };
    Decimal::from_str(&repr)
        .or_else(|_| Decimal::from_scientific(&repr))
        .unwrap_or(Decimal::ZERO)
}

fn rubles(value: Option<&Value>) -> Decimal {
    decimal(value) / Decimal::ONE_HUNDRED
}
