//! Status service - store summary

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::config::Config;
use crate::domain::result::Result;

pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    pub fn get_status(&self, config: &Config) -> Result<StatusSummary> {
        let stats = self.repository.get_store_stats()?;
        Ok(StatusSummary {
            database: self
                .repository
                .db_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string()),
            total_users: stats.users,
            total_cards: stats.cards,
            total_transactions: stats.transactions,
            total_balance: stats.total_balance,
            last_transaction: stats.last_transaction,
            debit_amount: config.debit_amount,
            low_balance_threshold: config.low_balance_threshold,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub database: String,
    pub total_users: i64,
    pub total_cards: i64,
    pub total_transactions: i64,
    /// Sum of all users' balances
    pub total_balance: i64,
    pub last_transaction: Option<String>,
    pub debit_amount: i64,
    pub low_balance_threshold: i64,
}
