//! Top-up command - credit a user's balance

use anyhow::Result;
use kasse_core::domain::swipe::format_minor_units;

use super::{get_context, log_command};
use crate::output;

pub fn run(user: &str, amount: &str, json: bool) -> Result<()> {
    log_command("topup");
    let amount = output::parse_amount(amount)?;
    let ctx = get_context()?;
    let tx = ctx.accounts.top_up(user, amount)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
        return Ok(());
    }
    let balance = ctx.repository.get_balance(tx.user_id)?;
    output::success(&format!(
        "Added {} for {}, balance is now {}",
        format_minor_units(tx.amount),
        user,
        format_minor_units(balance)
    ));
    Ok(())
}
