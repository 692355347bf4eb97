//! Status command - show store summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use kasse_core::domain::swipe::format_minor_units;

use super::{get_context, log_command};

pub fn run(json: bool) -> Result<()> {
    log_command("status");
    let ctx = get_context()?;
    let status = ctx.status.get_status(&ctx.config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Kasse Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Users", &status.total_users.to_string()]);
    table.add_row(vec!["Cards", &status.total_cards.to_string()]);
    table.add_row(vec!["Transactions", &status.total_transactions.to_string()]);
    table.add_row(vec!["Total balance", &format_minor_units(status.total_balance)]);
    table.add_row(vec!["Charge per swipe", &format_minor_units(status.debit_amount)]);
    table.add_row(vec![
        "Low balance below",
        &format_minor_units(status.low_balance_threshold),
    ]);

    println!("{}", table);
    println!();

    if let Some(last) = &status.last_transaction {
        println!("Last transaction: {}", last);
    }
    println!("Database: {}", status.database.dimmed());

    Ok(())
}
