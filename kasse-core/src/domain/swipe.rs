//! Swipe outcomes

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::card::CardId;

/// Classification of a processed swipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// Charged, balance was comfortably high
    PaymentMade,
    /// Charged, but the balance before the charge was below the warning threshold
    LowBalance,
    /// Not charged, balance does not cover the debit
    AccountEmpty,
    /// Not charged, the card is not bound to any user
    CardNotFound,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::PaymentMade => "payment_made",
            ResultCode::LowBalance => "low_balance",
            ResultCode::AccountEmpty => "account_empty",
            ResultCode::CardNotFound => "card_not_found",
        }
    }

    /// True if the swipe appended a debit
    pub fn is_charged(&self) -> bool {
        matches!(self, ResultCode::PaymentMade | ResultCode::LowBalance)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a swipe was refused, for callers that want the error view of a
/// [`SwipeResult`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeRejection {
    #[error("Card not found")]
    CardNotFound,
    #[error("Insufficient funds")]
    InsufficientFunds,
}

/// Result of handling one swipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwipeResult {
    pub code: ResultCode,
    /// Name of the card owner, `None` when the card is unknown
    pub user: Option<String>,
    /// Balance after the swipe (unchanged when nothing was charged)
    pub balance: i64,
    pub card: CardId,
}

impl SwipeResult {
    pub fn card_not_found(card: CardId) -> Self {
        Self {
            code: ResultCode::CardNotFound,
            user: None,
            balance: 0,
            card,
        }
    }

    pub fn rejection(&self) -> Option<SwipeRejection> {
        match self.code {
            ResultCode::CardNotFound => Some(SwipeRejection::CardNotFound),
            ResultCode::AccountEmpty => Some(SwipeRejection::InsufficientFunds),
            ResultCode::PaymentMade | ResultCode::LowBalance => None,
        }
    }

    pub fn to_report(&self) -> SwipeReport {
        SwipeReport {
            code: self.code,
            user: self.user.clone().unwrap_or_default(),
            balance: self.balance,
            card: self.card.to_hex(),
        }
    }
}

impl fmt::Display for SwipeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user {
            Some(user) => write!(
                f,
                "{} for {} (card {}), balance {}",
                self.code, user, self.card, format_minor_units(self.balance)
            ),
            None => write!(f, "{} (card {})", self.code, self.card),
        }
    }
}

/// Flat, serializable form of a [`SwipeResult`] handed to displays and
/// long-poll clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeReport {
    pub code: ResultCode,
    /// Empty when the card is unknown
    pub user: String,
    pub balance: i64,
    pub card: String,
}

/// Event flowing from the reader task to the router
#[derive(Debug)]
pub enum CardEvent {
    Swiped(CardId),
    ReaderFailed(super::result::Error),
}

/// Render minor units as a decimal amount, e.g. `-150` as `-1.50`
pub fn format_minor_units(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections() {
        let card = CardId::new(b"foobar".to_vec());
        assert_eq!(
            SwipeResult::card_not_found(card.clone()).rejection(),
            Some(SwipeRejection::CardNotFound)
        );

        let empty = SwipeResult {
            code: ResultCode::AccountEmpty,
            user: Some("Koebi".to_string()),
            balance: 0,
            card: card.clone(),
        };
        assert_eq!(empty.rejection(), Some(SwipeRejection::InsufficientFunds));

        let paid = SwipeResult {
            code: ResultCode::PaymentMade,
            ..empty
        };
        assert_eq!(paid.rejection(), None);
        assert!(paid.code.is_charged());
    }

    #[test]
    fn test_report_for_unknown_card_has_empty_user() {
        let report = SwipeResult::card_not_found(CardId::new(vec![0xab])).to_report();
        assert_eq!(report.user, "");
        assert_eq!(report.card, "ab");
        assert_eq!(
            serde_json::to_value(&report).unwrap()["code"],
            serde_json::json!("card_not_found")
        );
    }

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(700), "7.00");
        assert_eq!(format_minor_units(5), "0.05");
        assert_eq!(format_minor_units(-150), "-1.50");
        assert_eq!(format_minor_units(0), "0.00");
    }
}
