//! Migration service - applies embedded schema migrations
//!
//! Used for both the ledger database and the event log database. Applied
//! migrations are tracked by name in `sys_migrations`; the `000_` entry of a
//! migration set must create that table.

use anyhow::{anyhow, Result};
use duckdb::Connection;

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: &'static [(&'static str, &'static str)],
}

impl<'a> MigrationService<'a> {
    pub fn new(conn: &'a Connection, migrations: &'static [(&'static str, &'static str)]) -> Self {
        Self { conn, migrations }
    }

    /// Run all pending migrations, bootstrapping `sys_migrations` first
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let mut applied = Vec::new();

        let (bootstrap_name, bootstrap_sql) = self
            .migrations
            .first()
            .ok_or_else(|| anyhow!("Migration set is empty"))?;

        let bootstrapped = if !self.migrations_table_exists()? {
            self.conn.execute_batch(bootstrap_sql)?;
            self.record_migration(bootstrap_name)?;
            applied.push(bootstrap_name.to_string());
            true
        } else {
            false
        };

        let known = self.get_applied()?;
        let already_applied = if bootstrapped {
            known.len().saturating_sub(1)
        } else {
            known.len()
        };

        for (name, sql) in self.migrations.iter().skip(1) {
            if known.iter().any(|k| k == name) {
                continue;
            }
            self.conn.execute_batch(sql)?;
            self.record_migration(name)?;
            applied.push(name.to_string());
        }

        Ok(MigrationResult {
            applied,
            already_applied,
        })
    }

    fn migrations_table_exists(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Names of already applied migrations, sorted
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for name in names {
            result.push(name?);
        }
        Ok(result)
    }

    /// Names of migrations not yet applied
    pub fn get_pending(&self) -> Result<Vec<String>> {
        let applied = self.get_applied()?;
        Ok(self
            .migrations
            .iter()
            .filter(|(name, _)| !applied.iter().any(|a| a == name))
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn record_migration(&self, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            [name],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_migrations::LOG_MIGRATIONS;
    use crate::migrations::MIGRATIONS;

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::new(&conn, MIGRATIONS);

        let result = service.run_pending().unwrap();
        assert_eq!(result.applied.len(), MIGRATIONS.len());
        assert_eq!(result.already_applied, 0);

        let again = service.run_pending().unwrap();
        assert!(again.applied.is_empty());
        assert_eq!(again.already_applied, MIGRATIONS.len());
    }

    #[test]
    fn test_get_pending_after_bootstrap() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0].1).unwrap();
        conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            [MIGRATIONS[0].0],
        )
        .unwrap();

        let service = MigrationService::new(&conn, MIGRATIONS);
        assert_eq!(service.get_pending().unwrap().len(), MIGRATIONS.len() - 1);
    }

    #[test]
    fn test_log_migrations_apply() {
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::new(&conn, LOG_MIGRATIONS);
        service.run_pending().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
