//! Swipe command - charge a card once without running the service

use anyhow::Result;
use kasse_core::services::{EntryPoint, LogEvent};
use kasse_core::CardId;

use super::{get_context, get_logger, log_event};
use crate::output;

pub fn run(card: &str, json: bool) -> Result<()> {
    let card = CardId::from_hex(card)?;
    let ctx = get_context()?;
    let result = ctx.ledger.handle_swipe(&card)?;

    log_event(
        &get_logger(EntryPoint::Cli),
        LogEvent::new("swipe_processed")
            .with_command("swipe")
            .with_outcome(result.code.as_str()),
    );

    let report = result.to_report();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_report(&report);
    }
    Ok(())
}
