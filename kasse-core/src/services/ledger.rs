//! Ledger service - balance check and debit for a single swipe

use std::sync::Arc;

use crate::adapters::duckdb::DuckDbRepository;
use crate::config::Config;
use crate::domain::result::Result;
use crate::domain::{CardId, NewTransaction, ResultCode, SwipeResult};

/// Charges swipes against users' balances
///
/// Each call to [`LedgerService::handle_swipe`] is one atomic unit: owner
/// lookup, balance read and the debit commit together or not at all.
pub struct LedgerService {
    repository: Arc<DuckDbRepository>,
    debit_amount: i64,
    low_balance_threshold: i64,
}

impl LedgerService {
    pub fn new(repository: Arc<DuckDbRepository>, config: &Config) -> Self {
        Self {
            repository,
            debit_amount: config.debit_amount,
            low_balance_threshold: config.low_balance_threshold,
        }
    }

    pub fn debit_amount(&self) -> i64 {
        self.debit_amount
    }

    /// Charge the owner of `card` once
    ///
    /// Unknown cards and uncovered balances are ordinary results, not
    /// errors. An `Err` always means nothing was written.
    pub fn handle_swipe(&self, card: &CardId) -> Result<SwipeResult> {
        let result = self.repository.atomically(|tx| {
            let Some(user) = tx.card_owner(card)? else {
                return Ok(SwipeResult::card_not_found(card.clone()));
            };

            let balance = tx.balance(user.id)?;
            let code = classify(balance, self.debit_amount, self.low_balance_threshold);
            let balance = if code.is_charged() {
                tx.append(NewTransaction::swipe_charge(user.id, card.clone(), self.debit_amount))?;
                balance - self.debit_amount
            } else {
                balance
            };

            Ok(SwipeResult {
                code,
                user: Some(user.name),
                balance,
                card: card.clone(),
            })
        })?;

        tracing::debug!(card = %card, code = %result.code, "swipe handled");
        Ok(result)
    }
}

/// Outcome for a known card given the balance before the charge
fn classify(balance: i64, debit: i64, low_threshold: i64) -> ResultCode {
    if balance < debit {
        ResultCode::AccountEmpty
    } else if balance < low_threshold {
        ResultCode::LowBalance
    } else {
        ResultCode::PaymentMade
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::Error;
    use crate::domain::Card;

    fn setup(balance: i64) -> (LedgerService, Arc<DuckDbRepository>, i64, CardId) {
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        repo.ensure_schema().unwrap();
        let user = repo.create_user("Merovius", "hash").unwrap();
        let card = CardId::new(b"aaaa".to_vec());
        repo.add_card(&Card::new(card.clone(), user.id)).unwrap();
        if balance != 0 {
            repo.append_transaction(NewTransaction::top_up(user.id, balance))
                .unwrap();
        }
        let ledger = LedgerService::new(Arc::clone(&repo), &Config::default());
        (ledger, repo, user.id, card)
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(99, 100, 600), ResultCode::AccountEmpty);
        assert_eq!(classify(100, 100, 600), ResultCode::LowBalance);
        assert_eq!(classify(599, 100, 600), ResultCode::LowBalance);
        assert_eq!(classify(600, 100, 600), ResultCode::PaymentMade);
        assert_eq!(classify(-50, 100, 600), ResultCode::AccountEmpty);
    }

    #[test]
    fn test_configured_debit_is_charged() {
        let (_, repo, user_id, card) = setup(800);
        let config = Config {
            debit_amount: 250,
            ..Config::default()
        };
        let ledger = LedgerService::new(Arc::clone(&repo), &config);
        assert_eq!(ledger.debit_amount(), 250);

        let result = ledger.handle_swipe(&card).unwrap();
        assert_eq!(result.code, ResultCode::PaymentMade);
        assert_eq!(result.balance, 550);
        assert_eq!(repo.get_balance(user_id).unwrap(), 550);
    }

    #[test]
    fn test_payment_made() {
        let (ledger, repo, user_id, card) = setup(800);

        let result = ledger.handle_swipe(&card).unwrap();
        assert_eq!(result.code, ResultCode::PaymentMade);
        assert_eq!(result.user.as_deref(), Some("Merovius"));
        assert_eq!(result.balance, 700);
        assert_eq!(repo.get_balance(user_id).unwrap(), 700);

        let last = &repo.get_transactions(user_id, 1).unwrap()[0];
        assert_eq!(last.amount, -100);
        assert_eq!(last.card_id.as_ref(), Some(&card));
    }

    #[test]
    fn test_account_empty_writes_nothing() {
        let (ledger, repo, user_id, card) = setup(99);

        let result = ledger.handle_swipe(&card).unwrap();
        assert_eq!(result.code, ResultCode::AccountEmpty);
        assert_eq!(result.balance, 99);
        assert_eq!(repo.count_transactions(user_id).unwrap(), 1);
    }

    #[test]
    fn test_unknown_card() {
        let (ledger, repo, user_id, _) = setup(800);

        let result = ledger.handle_swipe(&CardId::new(b"foobar".to_vec())).unwrap();
        assert_eq!(result.code, ResultCode::CardNotFound);
        assert_eq!(result.user, None);
        assert_eq!(repo.count_transactions(user_id).unwrap(), 1);
    }

    #[test]
    fn test_configured_amounts() {
        let (_, repo, user_id, card) = setup(1000);
        let config = Config {
            debit_amount: 250,
            low_balance_threshold: 1000,
            ..Config::default()
        };
        let ledger = LedgerService::new(Arc::clone(&repo), &config);

        let result = ledger.handle_swipe(&card).unwrap();
        assert_eq!(result.code, ResultCode::PaymentMade);
        assert_eq!(result.balance, 750);

        let result = ledger.handle_swipe(&card).unwrap();
        assert_eq!(result.code, ResultCode::LowBalance);
        assert_eq!(repo.get_balance(user_id).unwrap(), 500);
    }

    #[test]
    fn test_storage_failure_is_an_error() {
        // Schema never created: every query fails
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        let ledger = LedgerService::new(repo, &Config::default());

        let err = ledger.handle_swipe(&CardId::new(b"aaaa".to_vec())).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }
}
