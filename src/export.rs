//! Text and CSV rendering of verified receipts.
//!
//! The CSV layout is consumed by downstream tooling; section order, labels
//! and row order must stay as they are.

use crate::error::Result;
use crate::receipt::{Receipt, ReceiptDetails};
use csv::{Terminator, WriterBuilder};
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LINE_END: &[u8] = b"\r\n";

/// Human-readable summary. Rejected receipts render as a single line.
#[must_use]
pub fn to_text(receipt: &Receipt) -> String {
    let Some(details) = receipt.details() else {
        return format!("❌ {}", receipt.error_message().unwrap_or("Unknown error"));
    };

    let mut out = String::from("✅ Receipt verified\n\n");
    let _ = writeln!(out, "Organization: {}", details.organization);
    let _ = writeln!(out, "Address: {}", details.address);
    let _ = writeln!(out, "INN: {}", details.inn);
    let _ = writeln!(out, "Date: {}", details.date());
    let _ = writeln!(out, "Total: {} ₽", money(details.total_sum));
    let _ = writeln!(out, "Cash: {} ₽", money(details.cash_sum));
    let _ = writeln!(out, "Card: {} ₽", money(details.card_sum));

    if !details.items.is_empty() {
        out.push_str("\nItems:\n");
        for item in &details.items {
            let _ = writeln!(
                out,
                "  • {} - {} ₽ x {}",
                item.name,
                money(item.price),
                item.quantity.normalize()
            );
        }
    }
    out
}

/// Default CSV file name: `date_time_fn_fd_fp.csv`, with `-` in place of
/// the colons in the time.
#[must_use]
pub fn csv_file_name(details: &ReceiptDetails) -> String {
    let (date, time) = match details.timestamp {
        Some(_) => (details.date(), details.time().replace(':', "-")),
        None => ("undated".to_string(), "00-00-00".to_string()),
    };
    format!(
        "{date}_{time}_{}_{}_{}.csv",
        details.fiscal_drive_number, details.fiscal_document_number, details.fiscal_sign
    )
}

/// Write a verified receipt as CSV into `dir`, creating it if needed.
///
/// Returns `Ok(None)` for receipts that were not verified.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_csv(receipt: &Receipt, dir: &Path) -> Result<Option<PathBuf>> {
    let Some(details) = receipt.details() else {
        debug!("Not exporting unverified receipt");
        return Ok(None);
    };

    std::fs::create_dir_all(dir)?;
    let path = dir.join(csv_file_name(details));
    write_csv_to(details, &path)?;
    info!("Receipt saved to {}", path.display());
    Ok(Some(path))
}

/// Write the CSV rendering of `details` to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_csv_to(details: &ReceiptDetails, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;

    write_section(&mut file, |wtr| {
        wtr.write_record(["Receipt Information"])?;
        wtr.write_record(["Organization", details.organization.as_str()])?;
        wtr.write_record(["Place", details.place.as_str()])?;
        wtr.write_record(["Address", details.address.as_str()])?;
        wtr.write_record(["INN", details.inn.as_str()])?;
        wtr.write_record(["Date", details.date().as_str()])?;
        wtr.write_record(["Time", details.time().as_str()])?;
        wtr.write_record(["Cashier", details.cashier.as_str()])?;
        wtr.write_record(["Receipt Number", details.request_number.as_str()])?;
        wtr.write_record(["Shift", details.shift_number.as_str()])?;
        wtr.write_record(["Fiscal Drive Number", details.fiscal_drive_number.as_str()])?;
        wtr.write_record(["Fiscal Document Number", details.fiscal_document_number.as_str()])?;
        wtr.write_record(["Fiscal Sign", details.fiscal_sign.as_str()])?;
        Ok(())
    })?;
    file.write_all(LINE_END)?;

    write_section(&mut file, |wtr| {
        wtr.write_record(["Item Name", "Price (₽)", "Quantity", "Sum (₽)"])?;
        for item in &details.items {
            wtr.write_record([
                item.name.clone(),
                money(item.price),
                item.quantity.normalize().to_string(),
                money(item.sum),
            ])?;
        }
        Ok(())
    })?;
    file.write_all(LINE_END)?;

    write_section(&mut file, |wtr| {
        wtr.write_record(["Payment Method", "Amount (₽)"])?;
        wtr.write_record(["Cash".to_string(), money(details.cash_sum)])?;
        wtr.write_record(["Card".to_string(), money(details.card_sum)])?;
        wtr.write_record(["TOTAL".to_string(), money(details.total_sum)])?;
        Ok(())
    })?;
    file.write_all(LINE_END)?;

    write_section(&mut file, |wtr| {
        wtr.write_record(["VAT Information"])?;
        wtr.write_record(["VAT 20%".to_string(), money(details.vat_20)])?;
        wtr.write_record(["VAT 10%".to_string(), money(details.vat_10)])?;
        wtr.write_record(["VAT 0%".to_string(), money(details.vat_0)])?;
        wtr.write_record(["No VAT".to_string(), money(details.vat_none)])?;
        Ok(())
    })?;

    file.flush()?;
    Ok(())
}

/// Write the raw service response as pretty-printed JSON into `dir`.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_raw_json(receipt: &Receipt, dir: &Path) -> Result<PathBuf> {
    let (drive, document) = receipt.details().map_or(("", ""), |d| {
        (
            d.fiscal_drive_number.as_str(),
            d.fiscal_document_number.as_str(),
        )
    });
    let name = format!(
        "receipt_{}_{drive}_{document}.json",
        receipt.checked_at().format("%Y%m%d_%H%M%S")
    );

    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let content = serde_json::to_string_pretty(receipt.raw())?;
    std::fs::write(&path, content)?;
    info!("Raw response saved to {}", path.display());
    Ok(path)
}

// One csv writer per section: csv writes a lone `""` for an empty record,
// while sections are separated by a bare line break written to the file.
fn write_section<W: Write>(
    out: &mut W,
    body: impl FnOnce(&mut csv::Writer<&mut W>) -> Result<()>,
) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::CRLF)
        .from_writer(out);
    body(&mut wtr)?;
    wtr.flush()?;
    Ok(())
}

fn money(value: Decimal) -> String {
    format!("{value:.2}")
}
