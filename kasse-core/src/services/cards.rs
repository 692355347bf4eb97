//! Card service - binding reader identifiers to users

use std::sync::Arc;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Card, CardId, User};

pub struct CardService {
    repository: Arc<DuckDbRepository>,
}

impl CardService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Bind `id` to `user`. Fails with [`Error::CardExists`] if any user
    /// holds the identifier already.
    pub fn add_card(&self, user: &User, id: CardId, description: Option<&str>) -> Result<Card> {
        if id.is_empty() {
            return Err(Error::validation("Card identifier must not be empty"));
        }
        let card = Card {
            id,
            user_id: user.id,
            description: normalize(description),
        };
        self.repository.add_card(&card)?;
        tracing::info!(user_id = user.id, "card registered");
        Ok(card)
    }

    pub fn get_card(&self, id: &CardId) -> Result<Option<Card>> {
        self.repository.get_card(id)
    }

    pub fn list_cards(&self, user: &User) -> Result<Vec<Card>> {
        self.repository.get_cards_for_user(user.id)
    }

    pub fn list_all(&self) -> Result<Vec<Card>> {
        self.repository.get_cards()
    }

    /// Empty or blank descriptions clear the field
    pub fn update_description(&self, user: &User, id: &CardId, description: Option<&str>) -> Result<()> {
        if !self
            .repository
            .update_card_description(id, user.id, normalize(description).as_deref())?
        {
            return Err(Error::not_found(format!("Card {} of user {}", id, user.name)));
        }
        Ok(())
    }

    pub fn remove_card(&self, user: &User, id: &CardId) -> Result<()> {
        if !self.repository.remove_card(id, user.id)? {
            return Err(Error::not_found(format!("Card {} of user {}", id, user.name)));
        }
        tracing::info!(user_id = user.id, "card removed");
        Ok(())
    }
}

fn normalize(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}
