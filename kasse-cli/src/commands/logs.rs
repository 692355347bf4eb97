//! Logs command - view and manage the event log

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use dialoguer::Confirm;
use kasse_core::services::{EntryPoint, LoggingService};

use super::get_data_dir;
use crate::output;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show event counts and database path
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn get_logging_service() -> Result<LoggingService> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: LogsCommands) -> Result<()> {
    let service = get_logging_service()?;
    match command {
        LogsCommands::List { limit, errors, json } => {
            let entries = if errors {
                service.get_errors(limit)?
            } else {
                service.get_recent(limit)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Time", "Entry", "Event", "Command", "Outcome", "Error"]);

            for entry in entries {
                let error_indicator = if entry.error_message.is_some() {
                    "!".red().to_string()
                } else {
                    String::new()
                };
                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    entry.entry_point,
                    entry.event,
                    entry.command.unwrap_or_default(),
                    entry.outcome.unwrap_or_default(),
                    error_indicator,
                ]);
            }
            println!("{}", table);

            if !errors {
                let recent_errors = service.get_errors(3)?;
                if !recent_errors.is_empty() {
                    println!();
                    println!("{}", "Recent Errors:".red().bold());
                    for err in recent_errors {
                        println!(
                            "  {} [{}]: {}",
                            format_timestamp(err.timestamp).dimmed(),
                            err.event,
                            err.error_message.as_deref().unwrap_or("Unknown error")
                        );
                    }
                }
            }
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            let cutoff_ms =
                Utc::now().timestamp_millis() - (older_than_days as i64 * 24 * 60 * 60 * 1000);

            if !force
                && !json
                && !Confirm::new()
                    .with_prompt(format!("Delete logs older than {} days?", older_than_days))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            let deleted = service.delete_before(cutoff_ms)?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                output::success(&format!("Deleted {} log entries", deleted));
            }
        }
        LogsCommands::Stats { json } => {
            let total = service.count()?;
            let counts = service.get_event_counts()?;
            let db_path = service.db_path().to_path_buf();

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "total_entries": total,
                        "events": counts,
                        "database_path": db_path.to_string_lossy(),
                    })
                );
                return Ok(());
            }

            println!("{}", "Log Statistics".bold());
            println!("  Total entries: {}", total);
            println!("  Database: {}", db_path.display());
            if !counts.is_empty() {
                println!();
                let mut table = output::create_table();
                table.set_header(vec!["Event", "Outcome", "Count"]);
                for count in counts {
                    table.add_row(vec![
                        count.event,
                        count.outcome.unwrap_or_default(),
                        count.count.to_string(),
                    ]);
                }
                println!("{}", table);
            }
        }
    }

    Ok(())
}
