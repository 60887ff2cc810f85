//! Command-line interface definition.

use clap::{Parser, Subcommand};
use receipt_check::config::default_config_path;
use receipt_check::{ExtraFields, ManualFields, VerificationRequest, VerifierConfig};
use std::path::PathBuf;

/// Verify Russian fiscal receipts and export them as CSV.
#[derive(Parser, Debug)]
#[command(name = "receipt-check")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Verification service API token.
    #[arg(long, global = true, env = "RECEIPT_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Verification service endpoint.
    #[arg(long, global = true, env = "RECEIPT_CHECK_API_URL")]
    pub api_url: Option<String>,

    /// Directory exported receipts are written to.
    #[arg(long, global = true, env = "RECEIPT_CHECK_DIR")]
    pub receipts_dir: Option<PathBuf>,

    /// Maximum number of attempts per verification.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Base backoff delay in seconds.
    #[arg(long, global = true)]
    pub base_delay: Option<f64>,

    /// Promo campaign id sent with the request.
    #[arg(long, global = true)]
    pub promo_id: Option<u64>,

    /// Extra `key=value` pair sent as `userdata_<key>` (repeatable).
    #[arg(long = "userdata", global = true, value_parser = parse_key_value)]
    pub userdata: Vec<(String, String)>,

    /// Also save the raw service response as JSON.
    #[arg(long, global = true)]
    pub save_json: bool,

    /// Do not write a CSV file.
    #[arg(long, global = true)]
    pub no_csv: bool,

    /// Log level.
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Input to verify.
    #[command(subcommand)]
    pub command: Command,
}

/// Verification input.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify from fiscal fields printed on the receipt.
    Manual {
        /// Fiscal drive serial (FN).
        #[arg(long = "fn")]
        fiscal_drive: String,
        /// Fiscal document number (FD).
        #[arg(long = "fd")]
        fiscal_document: String,
        /// Fiscal sign (FP).
        #[arg(long = "fp")]
        fiscal_sign: String,
        /// Date and time as YYYYMMDDTHHmm.
        #[arg(long = "t")]
        timestamp: String,
        /// Operation type: 1 income, 2 income return, 3 expense, 4 expense return.
        #[arg(long = "n", default_value = "1")]
        operation: String,
        /// Total in rubles.
        #[arg(long = "s")]
        total: String,
        /// Mark the fields as scanned from a QR code.
        #[arg(long)]
        qr: bool,
    },
    /// Verify from the text encoded in the receipt's QR code.
    Qr {
        /// QR payload, e.g. `t=20200924T1837&s=349.93&fn=...&i=...&fp=...&n=1`.
        payload: String,
    },
    /// Verify from a QR image URL.
    Url {
        /// Image URL.
        url: String,
    },
    /// Verify from a QR image file.
    File {
        /// Image path.
        path: PathBuf,
    },
}

impl Cli {
    /// Build the verifier configuration: file, then CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<VerifierConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            VerifierConfig::from_file(path)?
        } else {
            let path = default_config_path();
            if path.exists() {
                VerifierConfig::from_file(&path)?
            } else {
                VerifierConfig::default()
            }
        };

        // Override with CLI arguments
        if let Some(ref token) = self.token {
            config.token.clone_from(token);
        }
        if let Some(ref api_url) = self.api_url {
            config.api_url.clone_from(api_url);
        }
        if let Some(ref dir) = self.receipts_dir {
            config.receipts_dir.clone_from(dir);
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(base_delay) = self.base_delay {
            config.retry.base_delay_secs = base_delay;
        }
        config.log_level.clone_from(&self.log_level);

        config.validate()?;
        Ok(config)
    }

    /// Optional request fields from the command line.
    #[must_use]
    pub fn extra_fields(&self) -> ExtraFields {
        ExtraFields {
            promo_id: self.promo_id,
            userdata: self.userdata.clone(),
        }
    }
}

impl Command {
    /// Build the verification request.
    ///
    /// # Errors
    ///
    /// Returns an error if manual fields are malformed or the image file is
    /// missing.
    pub fn into_request(self) -> receipt_check::Result<VerificationRequest> {
        match self {
            Self::Manual {
                fiscal_drive,
                fiscal_document,
                fiscal_sign,
                timestamp,
                operation,
                total,
                qr,
            } => {
                let fields = ManualFields {
                    fiscal_drive,
                    fiscal_document,
                    fiscal_sign,
                    timestamp,
                    operation,
                    total,
                    qr_scanned: qr,
                };
                fields.validate()?;
                Ok(VerificationRequest::manual(fields))
            }
            Self::Qr { payload } => Ok(VerificationRequest::raw_qr(payload)),
            Self::Url { url } => Ok(VerificationRequest::qr_url(url)),
            Self::File { path } => VerificationRequest::qr_file(path),
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manual() {
        let cli = Cli::try_parse_from([
            "receipt-check",
            "--token",
            "t0k",
            "--max-attempts",
            "5",
            "manual",
            "--fn",
            "9282440300682838",
            "--fd",
            "46534",
            "--fp",
            "1273019065",
            "--t",
            "20200924T1837",
            "--s",
            "349.93",
        ])
        .expect("should parse");

        assert_eq!(cli.token.as_deref(), Some("t0k"));
        assert_eq!(cli.max_attempts, Some(5));
        let request = cli.command.into_request().expect("valid");
        assert_eq!(request.kind(), "manual");
    }

    #[test]
    fn test_manual_validation_runs() {
        let cli = Cli::try_parse_from([
            "receipt-check",
            "manual",
            "--fn",
            "x",
            "--fd",
            "1",
            "--fp",
            "1",
            "--t",
            "20200924T1837",
            "--s",
            "1",
        ])
        .expect("should parse");
        assert!(cli.command.into_request().is_err());
    }

    #[test]
    fn test_userdata_pairs() {
        let cli = Cli::try_parse_from([
            "receipt-check",
            "qr",
            "t=1",
            "--userdata",
            "chat=42",
            "--promo-id",
            "3",
        ])
        .expect("should parse");

        let extra = cli.extra_fields();
        assert_eq!(extra.promo_id, Some(3));
        assert_eq!(extra.userdata, vec![("chat".to_string(), "42".to_string())]);
    }

    #[test]
    fn test_bad_userdata_rejected() {
        let result = Cli::try_parse_from(["receipt-check", "qr", "t=1", "--userdata", "nokey"]);
        assert!(result.is_err());
    }
}
