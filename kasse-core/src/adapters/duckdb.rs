//! DuckDB repository implementation
//!
//! All access goes through one connection behind a mutex. That mutex is the
//! store's serialization point: an atomic unit started with
//! [`DuckDbRepository::atomically`] holds it from the first read to commit,
//! so two units can never observe the same pre-charge balance.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use duckdb::{params, Connection, OptionalExt};
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{Card, CardId, NewTransaction, Transaction, User};
use crate::migrations::MIGRATIONS;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
        || lower.contains("file is already open")
}

fn is_constraint_violation(err: &duckdb::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("constraint error") || msg.contains("duplicate key")
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the database file at `db_path`
    ///
    /// Retries with exponential backoff while another process holds the file
    /// lock, e.g. a `kasse serve` that is just shutting down.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    attempt += 1;
                    if !is_retryable_error(&err_msg) || attempt >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt - 1));
                    tracing::warn!(
                        delay_ms = delay.as_millis() as u64,
                        attempt,
                        max = MAX_RETRIES,
                        error = %err_msg,
                        "database busy, retrying"
                    );
                    thread::sleep(delay);
                }
            }
        }
    }

    /// In-memory database, used by tests and dry runs
    pub fn in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> std::result::Result<Connection, duckdb::Error> {
        // Extension autoloading off: cached extensions may fail code signing on macOS
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Connection lock poisoned: {}", e)))
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn, MIGRATIONS)
            .run_pending()
            .map_err(|e| Error::database(format!("Migration failed: {:#}", e)))
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            tracing::info!(applied = ?result.applied, "applied database migrations");
        }
        Ok(())
    }

    // === Atomic units ===

    /// Run `f` inside one database transaction while holding the connection
    ///
    /// Commits when `f` returns `Ok`, rolls back on `Err` (or panic), so
    /// nothing `f` wrote is visible unless the whole unit succeeds.
    pub fn atomically<T>(&self, f: impl FnOnce(&LedgerTx<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let value = f(&LedgerTx { conn: &tx })?;
        tx.commit()?;
        Ok(value)
    }

    // === Users ===

    /// Insert a user. Fails with [`Error::UserExists`] if the name is taken.
    pub fn create_user(&self, name: &str, password_hash: &str) -> Result<User> {
        let conn = self.conn()?;
        if select_user_by_name(&conn, name)?.is_some() {
            return Err(Error::UserExists);
        }
        let id: i64 = conn
            .query_row(
                "INSERT INTO users (name, password_hash) VALUES (?, ?) RETURNING user_id",
                params![name, password_hash],
                |row| row.get(0),
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    Error::UserExists
                } else {
                    e.into()
                }
            })?;
        Ok(User::new(id, name, password_hash))
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        select_user_by_name(&conn, name)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT user_id, name, password_hash FROM users WHERE user_id = ?",
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT user_id, name, password_hash FROM users ORDER BY name")?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET password_hash = ? WHERE user_id = ?",
            params![password_hash, user_id],
        )?;
        if updated == 0 {
            return Err(Error::not_found(format!("User {}", user_id)));
        }
        Ok(())
    }

    // === Cards ===

    /// Bind a card to its user. Fails with [`Error::CardExists`] if the
    /// identifier is bound to anyone already; nothing is written then.
    pub fn add_card(&self, card: &Card) -> Result<()> {
        let conn = self.conn()?;
        let hex = card.id.to_hex();

        let taken: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cards WHERE card_id = ?",
            params![hex],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(Error::CardExists);
        }

        conn.execute(
            "INSERT INTO cards (card_id, user_id, description) VALUES (?, ?, ?)",
            params![hex, card.user_id, card.description],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                Error::CardExists
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    pub fn get_card(&self, id: &CardId) -> Result<Option<Card>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                "SELECT card_id, user_id, description FROM cards WHERE card_id = ?",
                params![id.to_hex()],
                RawCard::from_row,
            )
            .optional()?;
        raw.map(RawCard::into_card).transpose()
    }

    pub fn get_cards_for_user(&self, user_id: i64) -> Result<Vec<Card>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT card_id, user_id, description FROM cards WHERE user_id = ? ORDER BY card_id",
        )?;
        let raws = stmt
            .query_map(params![user_id], RawCard::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawCard::into_card).collect()
    }

    pub fn get_cards(&self) -> Result<Vec<Card>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT card_id, user_id, description FROM cards ORDER BY user_id, card_id")?;
        let raws = stmt
            .query_map([], RawCard::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawCard::into_card).collect()
    }

    /// Returns false if the user owns no such card
    pub fn update_card_description(
        &self,
        id: &CardId,
        user_id: i64,
        description: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE cards SET description = ? WHERE card_id = ? AND user_id = ?",
            params![description, id.to_hex(), user_id],
        )?;
        Ok(updated > 0)
    }

    /// Returns false if the user owns no such card. Transactions made with
    /// the card are kept.
    pub fn remove_card(&self, id: &CardId, user_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM cards WHERE card_id = ? AND user_id = ?",
            params![id.to_hex(), user_id],
        )?;
        Ok(deleted > 0)
    }

    // === Transactions ===

    /// Append a single transaction outside of any larger unit
    pub fn append_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        let conn = self.conn()?;
        insert_transaction(&conn, tx)
    }

    /// Sum of all transaction amounts of the user
    pub fn get_balance(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        select_balance(&conn, user_id)
    }

    /// Transactions of the user, newest first. `limit == 0` returns all.
    pub fn get_transactions(&self, user_id: i64, limit: usize) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = "SELECT transaction_id, user_id, card_id, occurred_at::VARCHAR, amount, kind
                   FROM transactions WHERE user_id = ?
                   ORDER BY occurred_at DESC, transaction_id DESC";
        let raws = if limit == 0 {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params![user_id], RawTransaction::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            let limit = i64::try_from(limit)
                .map_err(|_| Error::validation(format!("History limit too large: {}", limit)))?;
            let mut stmt = conn.prepare(&format!("{} LIMIT ?", sql))?;
            let rows = stmt
                .query_map(params![user_id, limit], RawTransaction::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        raws.into_iter().map(RawTransaction::into_transaction).collect()
    }

    pub fn count_transactions(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // === Statistics ===

    pub fn get_store_stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM cards),
                (SELECT COUNT(*) FROM transactions),
                (SELECT CAST(COALESCE(SUM(amount), 0) AS BIGINT) FROM transactions),
                (SELECT MAX(occurred_at)::VARCHAR FROM transactions)",
            [],
            |row| {
                Ok(StoreStats {
                    users: row.get(0)?,
                    cards: row.get(1)?,
                    transactions: row.get(2)?,
                    total_balance: row.get(3)?,
                    last_transaction: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }
}

/// Handle to the store inside an atomic unit, see [`DuckDbRepository::atomically`]
pub struct LedgerTx<'a> {
    conn: &'a Connection,
}

impl LedgerTx<'_> {
    /// Owner of the card, if it is bound to anyone
    pub fn card_owner(&self, card: &CardId) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT u.user_id, u.name, u.password_hash
                 FROM cards c JOIN users u ON u.user_id = c.user_id
                 WHERE c.card_id = ?",
                params![card.to_hex()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn balance(&self, user_id: i64) -> Result<i64> {
        select_balance(self.conn, user_id)
    }

    pub fn append(&self, tx: NewTransaction) -> Result<Transaction> {
        insert_transaction(self.conn, tx)
    }
}

/// Row counts and totals across the store
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub users: i64,
    pub cards: i64,
    pub transactions: i64,
    pub total_balance: i64,
    pub last_transaction: Option<String>,
}

// Helper functions

fn row_to_user(row: &duckdb::Row<'_>) -> duckdb::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        password_hash: row.get(2)?,
    })
}

fn select_user_by_name(conn: &Connection, name: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT user_id, name, password_hash FROM users WHERE name = ?",
            params![name],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

fn select_balance(conn: &Connection, user_id: i64) -> Result<i64> {
    // SUM over BIGINT yields HUGEINT in DuckDB
    let balance = conn.query_row(
        "SELECT CAST(COALESCE(SUM(amount), 0) AS BIGINT) FROM transactions WHERE user_id = ?",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(balance)
}

fn insert_transaction(conn: &Connection, tx: NewTransaction) -> Result<Transaction> {
    let id: i64 = conn.query_row(
        "INSERT INTO transactions (user_id, card_id, occurred_at, amount, kind)
         VALUES (?, ?, ?, ?, ?)
         RETURNING transaction_id",
        params![
            tx.user_id,
            tx.card_id.as_ref().map(CardId::to_hex),
            format_timestamp(&tx.time),
            tx.amount,
            tx.kind,
        ],
        |row| row.get(0),
    )?;
    Ok(tx.into_transaction(id))
}

struct RawCard {
    id: String,
    user_id: i64,
    description: Option<String>,
}

impl RawCard {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            description: row.get(2)?,
        })
    }

    fn into_card(self) -> Result<Card> {
        Ok(Card {
            id: stored_card_id(&self.id)?,
            user_id: self.user_id,
            description: self.description,
        })
    }
}

struct RawTransaction {
    id: i64,
    user_id: i64,
    card_id: Option<String>,
    time: String,
    amount: i64,
    kind: String,
}

impl RawTransaction {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            card_id: row.get(2)?,
            time: row.get(3)?,
            amount: row.get(4)?,
            kind: row.get(5)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            id: self.id,
            user_id: self.user_id,
            card_id: self.card_id.as_deref().map(stored_card_id).transpose()?,
            time: parse_timestamp(&self.time)?,
            amount: self.amount,
            kind: self.kind,
        })
    }
}

fn stored_card_id(hex: &str) -> Result<CardId> {
    CardId::from_hex(hex).map_err(|e| Error::database(format!("Corrupt card id in store: {}", e)))
}

/// Timestamps are stored as naive UTC
fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| Error::database(format!("Invalid timestamp {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> DuckDbRepository {
        let repo = DuckDbRepository::in_memory().unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error("IO Error: Could not set lock on file \"kasse.duckdb\""));
        assert!(is_retryable_error("Database is locked"));
        assert!(!is_retryable_error("Catalog Error: Table does not exist"));
    }

    #[test]
    fn test_timestamp_round_trip_formats() {
        let t = parse_timestamp("2015-04-06 21:59:03").unwrap();
        assert_eq!(format_timestamp(&t), "2015-04-06 21:59:03.000000");
        assert!(parse_timestamp("2015-04-06 21:59:03.123456").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_create_user_assigns_ids_and_rejects_duplicates() {
        let repo = repo();
        let mero = repo.create_user("Merovius", "hash1").unwrap();
        let koebi = repo.create_user("Koebi", "hash2").unwrap();
        assert_ne!(mero.id, koebi.id);

        assert!(matches!(repo.create_user("Merovius", "hash3"), Err(Error::UserExists)));
        assert_eq!(repo.get_users().unwrap().len(), 2);
        assert_eq!(repo.get_user_by_name("Merovius").unwrap().unwrap().password_hash, "hash1");
    }

    #[test]
    fn test_transaction_limit_out_of_range() {
        let repo = repo();
        let mero = repo.create_user("Merovius", "h").unwrap();
        repo.append_transaction(NewTransaction::top_up(mero.id, 500)).unwrap();

        assert!(matches!(
            repo.get_transactions(mero.id, usize::MAX),
            Err(Error::Validation(_))
        ));
        assert_eq!(repo.get_transactions(mero.id, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_add_card_rejects_bound_identifier() {
        let repo = repo();
        let mero = repo.create_user("Merovius", "h").unwrap();
        let koebi = repo.create_user("Koebi", "h").unwrap();
        let id = CardId::new(b"aaaa".to_vec());

        repo.add_card(&Card::new(id.clone(), mero.id)).unwrap();
        assert!(matches!(
            repo.add_card(&Card::new(id.clone(), koebi.id)),
            Err(Error::CardExists)
        ));

        let card = repo.get_card(&id).unwrap().unwrap();
        assert_eq!(card.user_id, mero.id);
        assert!(repo.get_cards_for_user(koebi.id).unwrap().is_empty());
    }

    #[test]
    fn test_card_edit_and_remove_are_scoped_to_owner() {
        let repo = repo();
        let mero = repo.create_user("Merovius", "h").unwrap();
        let koebi = repo.create_user("Koebi", "h").unwrap();
        let id = CardId::new(b"aaab".to_vec());
        repo.add_card(&Card::new(id.clone(), mero.id)).unwrap();

        assert!(!repo.update_card_description(&id, koebi.id, Some("stolen")).unwrap());
        assert!(repo.update_card_description(&id, mero.id, Some("keychain")).unwrap());
        assert_eq!(
            repo.get_card(&id).unwrap().unwrap().description.as_deref(),
            Some("keychain")
        );

        assert!(!repo.remove_card(&id, koebi.id).unwrap());
        assert!(repo.remove_card(&id, mero.id).unwrap());
        assert!(repo.get_card(&id).unwrap().is_none());
    }

    #[test]
    fn test_transactions_newest_first_with_limit() {
        let repo = repo();
        let mero = repo.create_user("Merovius", "h").unwrap();
        let card = CardId::new(b"aaaa".to_vec());

        let first = repo.append_transaction(NewTransaction::top_up(mero.id, 1000)).unwrap();
        let second = repo
            .append_transaction(NewTransaction::swipe_charge(mero.id, card.clone(), 100))
            .unwrap();
        assert!(second.id > first.id);

        let all = repo.get_transactions(mero.id, 0).unwrap();
        assert_eq!(all.iter().map(|t| t.amount).collect::<Vec<_>>(), vec![-100, 1000]);
        assert_eq!(all[0].card_id.as_ref(), Some(&card));

        let last = repo.get_transactions(mero.id, 1).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].id, second.id);

        assert_eq!(repo.get_balance(mero.id).unwrap(), 900);
    }

    #[test]
    fn test_atomic_unit_rolls_back_on_error() {
        let repo = repo();
        let mero = repo.create_user("Merovius", "h").unwrap();

        let result: Result<()> = repo.atomically(|tx| {
            tx.append(NewTransaction::top_up(mero.id, 500))?;
            Err(Error::Other("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(repo.count_transactions(mero.id).unwrap(), 0);

        repo.atomically(|tx| tx.append(NewTransaction::top_up(mero.id, 500)))
            .unwrap();
        assert_eq!(repo.get_balance(mero.id).unwrap(), 500);
    }

    #[test]
    fn test_store_stats() {
        let repo = repo();
        let stats = repo.get_store_stats().unwrap();
        assert_eq!(stats.users, 0);
        assert!(stats.last_transaction.is_none());

        let mero = repo.create_user("Merovius", "h").unwrap();
        repo.append_transaction(NewTransaction::top_up(mero.id, 250)).unwrap();
        let stats = repo.get_store_stats().unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.transactions, 1);
        assert_eq!(stats.total_balance, 250);
        assert!(stats.last_transaction.is_some());
    }
}
