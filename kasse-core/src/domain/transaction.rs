//! Transaction domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::card::CardId;

/// Kind tag of a debit caused by a card swipe
pub const KIND_SWIPE_CHARGE: &str = "swipe-charge";

/// Kind tag of a manually added credit
pub const KIND_TOP_UP: &str = "top-up";

/// A single append-only balance movement
///
/// Amounts are signed minor currency units (cents). A user's balance is the
/// sum of all their transaction amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    /// Card that caused the transaction, `None` for manual top-ups
    pub card_id: Option<CardId>,
    pub time: DateTime<Utc>,
    pub amount: i64,
    pub kind: String,
}

/// A transaction about to be appended; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub card_id: Option<CardId>,
    pub time: DateTime<Utc>,
    pub amount: i64,
    pub kind: String,
}

impl NewTransaction {
    /// Debit of `amount` minor units caused by swiping `card_id`
    pub fn swipe_charge(user_id: i64, card_id: CardId, amount: i64) -> Self {
        Self {
            user_id,
            card_id: Some(card_id),
            time: Utc::now(),
            amount: -amount,
            kind: KIND_SWIPE_CHARGE.to_string(),
        }
    }

    /// Manual credit of `amount` minor units
    pub fn top_up(user_id: i64, amount: i64) -> Self {
        Self {
            user_id,
            card_id: None,
            time: Utc::now(),
            amount,
            kind: KIND_TOP_UP.to_string(),
        }
    }

    pub fn into_transaction(self, id: i64) -> Transaction {
        Transaction {
            id,
            user_id: self.user_id,
            card_id: self.card_id,
            time: self.time,
            amount: self.amount,
            kind: self.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swipe_charge_is_negative() {
        let tx = NewTransaction::swipe_charge(1, CardId::new(b"aaaa".to_vec()), 100);
        assert_eq!(tx.amount, -100);
        assert_eq!(tx.kind, KIND_SWIPE_CHARGE);
        assert!(tx.card_id.is_some());
    }

    #[test]
    fn test_top_up_has_no_card() {
        let tx = NewTransaction::top_up(1, 1000).into_transaction(7);
        assert_eq!(tx.id, 7);
        assert_eq!(tx.amount, 1000);
        assert_eq!(tx.kind, KIND_TOP_UP);
        assert!(tx.card_id.is_none());
    }
}
