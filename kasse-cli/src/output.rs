//! Output formatting utilities

use anyhow::{bail, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use kasse_core::domain::swipe::format_minor_units;
use kasse_core::{ResultCode, SwipeReport};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Minor units as a decimal amount, negative amounts in red
pub fn amount(minor: i64) -> String {
    let text = format_minor_units(minor);
    if minor < 0 {
        text.red().to_string()
    } else {
        text
    }
}

/// One line for the swipe display
pub fn print_report(report: &SwipeReport) {
    let balance = format_minor_units(report.balance);
    match report.code {
        ResultCode::PaymentMade => success(&format!("Paid. {}: {} left", report.user, balance)),
        ResultCode::LowBalance => warning(&format!(
            "Paid, balance is low. {}: {} left",
            report.user, balance
        )),
        ResultCode::AccountEmpty => error(&format!(
            "Not paid, insufficient funds. {}: {}",
            report.user, balance
        )),
        ResultCode::CardNotFound => error(&format!("Unknown card {}", report.card)),
    }
}

/// Parse a decimal amount like `12`, `12.5` or `12.50` into minor units
pub fn parse_amount(input: &str) -> Result<i64> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    if whole.is_empty() && fraction.is_empty()
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        bail!("Invalid amount: {:?}", input);
    }
    if fraction.len() > 2 {
        bail!("Invalid amount {:?}: at most two decimal places", input);
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse()? };
    let cents: i64 = format!("{:0<2}", fraction).parse()?;
    let minor = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(cents))
        .ok_or_else(|| anyhow::anyhow!("Amount too large: {}", input))?;
    Ok(if negative { -minor } else { minor })
}
