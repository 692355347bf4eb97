//! Account service - users, credentials, top-ups and history

use std::sync::{Arc, OnceLock};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{NewTransaction, Transaction, User};

/// Account service for user management
pub struct AccountService {
    repository: Arc<DuckDbRepository>,
}

/// Balance of one user
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSummary {
    pub user: String,
    pub balance: i64,
    pub transactions: i64,
}

impl AccountService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Create a user with a password. Fails with [`Error::UserExists`] if the
    /// name is taken.
    pub fn register(&self, name: &str, password: &str) -> Result<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("User name must not be empty"));
        }
        if password.is_empty() {
            return Err(Error::validation("Password must not be empty"));
        }
        let user = self.repository.create_user(name, &hash_password(password)?)?;
        tracing::info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Check credentials. Unknown users and wrong passwords both fail with
    /// [`Error::WrongAuth`].
    pub fn authenticate(&self, name: &str, password: &str) -> Result<User> {
        match self.repository.get_user_by_name(name.trim())? {
            Some(user) if verify_password(password, &user.password_hash) => Ok(user),
            Some(_) => Err(Error::WrongAuth),
            None => {
                // Same hashing cost as for known users
                verify_password(password, dummy_hash());
                Err(Error::WrongAuth)
            }
        }
    }

    pub fn change_password(&self, name: &str, old_password: &str, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            return Err(Error::validation("Password must not be empty"));
        }
        let user = self.authenticate(name, old_password)?;
        self.repository
            .update_password_hash(user.id, &hash_password(new_password)?)
    }

    pub fn get_user(&self, name: &str) -> Result<User> {
        self.repository
            .get_user_by_name(name.trim())?
            .ok_or_else(|| Error::not_found(format!("User {}", name.trim())))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.repository.get_users()
    }

    /// Credit `amount` minor units to the user
    pub fn top_up(&self, name: &str, amount: i64) -> Result<Transaction> {
        if amount <= 0 {
            return Err(Error::validation(format!(
                "Top-up amount must be positive, got {}",
                amount
            )));
        }
        let user = self.get_user(name)?;
        self.repository
            .append_transaction(NewTransaction::top_up(user.id, amount))
    }

    pub fn balance(&self, name: &str) -> Result<BalanceSummary> {
        let user = self.get_user(name)?;
        Ok(BalanceSummary {
            balance: self.repository.get_balance(user.id)?,
            transactions: self.repository.count_transactions(user.id)?,
            user: user.name,
        })
    }

    /// Newest first; `limit == 0` returns everything
    pub fn history(&self, name: &str, limit: usize) -> Result<Vec<Transaction>> {
        let user = self.get_user(name)?;
        self.repository.get_transactions(user.id, limit)
    }
}

/// Argon2id PHC string with a random salt
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Other(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is not a valid PHC string");
            false
        }
    }
}

fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("kasse-dummy-password").unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AccountService {
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        repo.ensure_schema().unwrap();
        AccountService::new(repo)
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password("secret").unwrap();
        let b = hash_password("secret").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2"));
        assert!(verify_password("secret", &a));
        assert!(!verify_password("Secret", &a));
        assert!(!verify_password("secret", "not a hash"));
    }

    #[test]
    fn test_register_and_authenticate() {
        let accounts = service();
        let user = accounts.register("Merovius", "hunter2").unwrap();
        assert_ne!(user.password_hash, "hunter2");

        assert_eq!(accounts.authenticate("Merovius", "hunter2").unwrap().id, user.id);
        assert!(matches!(accounts.authenticate("Merovius", "hunter3"), Err(Error::WrongAuth)));
        assert!(matches!(accounts.authenticate("Koebi", "hunter2"), Err(Error::WrongAuth)));
    }

    #[test]
    fn test_register_duplicate_and_empty() {
        let accounts = service();
        accounts.register("Merovius", "a").unwrap();
        assert!(matches!(accounts.register("Merovius", "b"), Err(Error::UserExists)));
        assert!(matches!(accounts.register("  ", "b"), Err(Error::Validation(_))));
        assert!(matches!(accounts.register("Koebi", ""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_change_password() {
        let accounts = service();
        accounts.register("Merovius", "old").unwrap();

        assert!(matches!(
            accounts.change_password("Merovius", "wrong", "new"),
            Err(Error::WrongAuth)
        ));
        accounts.change_password("Merovius", "old", "new").unwrap();
        assert!(accounts.authenticate("Merovius", "old").is_err());
        assert!(accounts.authenticate("Merovius", "new").is_ok());
    }

    #[test]
    fn test_top_up_balance_history() {
        let accounts = service();
        accounts.register("Merovius", "pw").unwrap();

        accounts.top_up("Merovius", 1000).unwrap();
        accounts.top_up("Merovius", 250).unwrap();
        assert!(matches!(accounts.top_up("Merovius", 0), Err(Error::Validation(_))));
        assert!(matches!(accounts.top_up("Koebi", 10), Err(Error::NotFound(_))));

        let summary = accounts.balance("Merovius").unwrap();
        assert_eq!(summary.balance, 1250);
        assert_eq!(summary.transactions, 2);

        let history = accounts.history("Merovius", 1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 250);
    }
}
