//! CLI command implementations

pub mod balance;
pub mod card;
pub mod history;
pub mod logs;
pub mod serve;
pub mod status;
pub mod swipe;
pub mod topup;
pub mod user;

use std::path::PathBuf;

use anyhow::{Context, Result};
use dialoguer::Password;
use kasse_core::services::{EntryPoint, LogEvent, LoggingService};
use kasse_core::KasseContext;

/// Get the logging service
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger(entry_point: EntryPoint) -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, entry_point, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        if let Err(e) = l.log(event) {
            tracing::debug!(error = %e, "failed to write event log");
        }
    }
}

/// Record that a CLI command ran
pub fn log_command(command: &str) {
    log_event(&get_logger(EntryPoint::Cli), LogEvent::new("command_executed").with_command(command));
}

/// Data directory from `KASSE_DIR`, or `~/.kasse`
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("KASSE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".kasse"))
        .context("Could not find home directory; set KASSE_DIR")
}

/// Open the context for the data directory, creating the directory if needed
pub fn get_context() -> Result<KasseContext> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    KasseContext::new(&data_dir).context("Failed to initialize kasse context")
}

/// Password from the command line, or prompted for without echo
pub fn read_password(given: Option<String>, prompt: &str, confirm: bool) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    let mut input = Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Repeat password", "Passwords do not match");
    }
    Ok(input.interact()?)
}
