//! Card event router - decides whether a swipe registers or charges

use std::sync::Arc;
use std::time::Duration;

use crate::domain::result::{Error, Result};
use crate::domain::{Card, CardId, SwipeResult, User};
use crate::services::{CardService, LedgerService, Registration};

/// What happened to a routed swipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Claimed by the open registration window; the ledger was not touched
    Registered(CardId),
    /// Handled by the ledger
    Swiped(SwipeResult),
}

/// Single arbitration point between card registration and charging
///
/// Every swipe goes to exactly one of the two.
pub struct CardRouter {
    registration: Arc<Registration>,
    ledger: Arc<LedgerService>,
    cards: Arc<CardService>,
    registration_timeout: Duration,
}

impl CardRouter {
    pub fn new(
        registration: Arc<Registration>,
        ledger: Arc<LedgerService>,
        cards: Arc<CardService>,
        registration_timeout: Duration,
    ) -> Self {
        Self {
            registration,
            ledger,
            cards,
            registration_timeout,
        }
    }

    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    /// Route one swipe
    pub async fn route(&self, card: CardId) -> Result<RouteOutcome> {
        let card = match self.registration.offer(card.clone()) {
            Ok(()) => {
                tracing::info!(card = %card, "card claimed by registration window");
                return Ok(RouteOutcome::Registered(card));
            }
            Err(card) => card,
        };

        let ledger = Arc::clone(&self.ledger);
        let result = tokio::task::spawn_blocking(move || ledger.handle_swipe(&card))
            .await
            .map_err(|e| Error::Other(format!("Ledger task failed: {}", e)))??;
        Ok(RouteOutcome::Swiped(result))
    }

    /// Bind the next swiped card to `user`
    ///
    /// Waits for a free registration slot, then up to the configured timeout
    /// for a swipe. Returns `None` if no card arrived in time. Swipes must be
    /// flowing through [`CardRouter::route`] concurrently.
    pub async fn enroll(&self, user: &User, description: Option<&str>) -> Result<Option<Card>> {
        let window = self.registration.begin().await?;
        tracing::info!(user_id = user.id, "waiting for a card to register");

        let Some(id) = window.wait(self.registration_timeout).await else {
            tracing::info!(user_id = user.id, "no card swiped before the registration window closed");
            return Ok(None);
        };

        let cards = Arc::clone(&self.cards);
        let user = user.clone();
        let description = description.map(str::to_string);
        let card = tokio::task::spawn_blocking(move || {
            cards.add_card(&user, id, description.as_deref())
        })
        .await
        .map_err(|e| Error::Other(format!("Card task failed: {}", e)))??;
        Ok(Some(card))
    }
}
