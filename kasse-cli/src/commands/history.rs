//! History command - a user's transactions, newest first

use anyhow::Result;

use super::{get_context, log_command};
use crate::output;

pub fn run(user: &str, limit: usize, json: bool) -> Result<()> {
    log_command("history");
    let ctx = get_context()?;
    let transactions = ctx.accounts.history(user, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&transactions)?);
        return Ok(());
    }
    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Time (UTC)", "Kind", "Card", "Amount"]);
    for tx in transactions {
        table.add_row(vec![
            tx.id.to_string(),
            tx.time.format("%Y-%m-%d %H:%M:%S").to_string(),
            tx.kind,
            tx.card_id.map(|c| c.to_hex()).unwrap_or_default(),
            output::amount(tx.amount),
        ]);
    }
    println!("{}", table);
    Ok(())
}
