//! receipt-check CLI entry point.

mod cli;

use clap::Parser;
use cli::Cli;
use receipt_check::{export, Verifier};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("receipt-check v{}", env!("CARGO_PKG_VERSION"));

    // Build configuration and verifier
    let config = cli.to_config()?;
    let verifier = Verifier::from_config(&config)?;
    let extra = cli.extra_fields();
    let (save_json, no_csv) = (cli.save_json, cli.no_csv);
    let request = cli.command.into_request()?;

    // Ctrl-C aborts any pending retry wait
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, cancelling verification");
            let _ = shutdown_tx.send(true);
        }
    });

    let receipt = verifier
        .verify_with_shutdown(request, &extra, shutdown_rx)
        .await;
    println!("{}", export::to_text(&receipt));

    if receipt.is_valid() {
        if !no_csv {
            match export::write_csv(&receipt, &config.receipts_dir) {
                Ok(Some(path)) => println!("\n✅ CSV saved to: {}", path.display()),
                Ok(None) => {}
                Err(e) => warn!("Failed to save CSV: {e}"),
            }
        }
        if save_json {
            let path = export::write_raw_json(&receipt, &config.receipts_dir)?;
            println!("Raw response saved to: {}", path.display());
        }
    }

    let stats = verifier.cache_stats();
    debug!(
        "Cache: {} hits, {} misses ({:.2}%), {} entries",
        stats.hits,
        stats.misses,
        stats.hit_rate(),
        stats.size
    );

    receipt.into_result()?;
    Ok(())
}
