//! Balance command

use anyhow::Result;
use colored::Colorize;

use super::{get_context, log_command};
use crate::output;

pub fn run(user: &str, json: bool) -> Result<()> {
    log_command("balance");
    let ctx = get_context()?;
    let summary = ctx.accounts.balance(user)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}: {}", summary.user.bold(), output::amount(summary.balance));
    if summary.balance < ctx.config.low_balance_threshold {
        output::warning("Balance is low");
    }
    Ok(())
}
