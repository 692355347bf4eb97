//! Logging service - structured event logging to DuckDB
//!
//! Keeps a privacy-safe event log in `logs.duckdb`, separate from the ledger.
//! Only event names and classifications are recorded: no user names, card
//! identifiers, balances or amounts ever end up here.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use chrono::Utc;
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::log_migrations::LOG_MIGRATIONS;
use crate::services::MigrationService;

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    // Lower 16 bits: counter, upper bits: unix ms
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | counter
}

/// Current unix timestamp in milliseconds
fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Which front end recorded the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    /// One-shot CLI commands
    Cli,
    /// The long-running ingestion service (`kasse serve`)
    Service,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Service => "service",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Classification of what happened, e.g. a swipe result code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            command: None,
            outcome: None,
            error_message: None,
            error_details: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub command: Option<String>,
    pub outcome: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

/// Number of entries per event and outcome
#[derive(Debug, Clone, Serialize)]
pub struct EventCount {
    pub event: String,
    pub outcome: Option<String>,
    pub count: i64,
}

const SELECT_ENTRY: &str = "SELECT id, timestamp, entry_point, app_version, platform,
       event, command, outcome, error_message, error_details
FROM sys_logs";

/// Service for structured event logging
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create `logs.duckdb` in the data directory and run pending
    /// migrations
    pub fn new(data_dir: &Path, entry_point: EntryPoint, app_version: impl Into<String>) -> Result<Self> {
        let db_path = data_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;
        MigrationService::new(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Record an event; entry point, version and platform are filled in
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_logs (
                id, timestamp, entry_point, app_version, platform,
                event, command, outcome, error_message, error_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            duckdb::params![
                generate_id(),
                now_ms(),
                self.entry_point.as_str(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.command,
                &event.outcome,
                &event.error_message,
                &event.error_details,
            ],
        )?;
        Ok(())
    }

    pub fn log_event(&self, event: &str) -> Result<()> {
        self.log(LogEvent::new(event))
    }

    pub fn log_command(&self, command: &str) -> Result<()> {
        self.log(LogEvent::new("command_executed").with_command(command))
    }

    pub fn log_error(&self, event: &str, message: &str, details: Option<&str>) -> Result<()> {
        let mut log_event = LogEvent::new(event).with_error(message);
        if let Some(d) = details {
            log_event = log_event.with_error_details(d);
        }
        self.log(log_event)
    }

    /// Most recent entries first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query_entries(&format!("{} ORDER BY timestamp DESC, id DESC LIMIT ?", SELECT_ENTRY), limit)
    }

    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query_entries(
            &format!(
                "{} WHERE error_message IS NOT NULL ORDER BY timestamp DESC, id DESC LIMIT ?",
                SELECT_ENTRY
            ),
            limit,
        )
    }

    fn query_entries(&self, sql: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let entries = stmt
            .query_map([limit as i64], |row| {
                Ok(LogEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    entry_point: row.get(2)?,
                    app_version: row.get(3)?,
                    platform: row.get(4)?,
                    event: row.get(5)?,
                    command: row.get(6)?,
                    outcome: row.get(7)?,
                    error_message: row.get(8)?,
                    error_details: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Entry counts grouped by event and outcome, most frequent first
    pub fn get_event_counts(&self) -> Result<Vec<EventCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT event, outcome, COUNT(*) AS n
             FROM sys_logs
             GROUP BY event, outcome
             ORDER BY n DESC, event, outcome",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok(EventCount {
                    event: row.get(0)?,
                    outcome: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete logs older than the given unix timestamp in milliseconds
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
