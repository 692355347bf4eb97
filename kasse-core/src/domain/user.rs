//! User domain model

use serde::{Deserialize, Serialize};

/// A registered user of the register
///
/// `password_hash` is an Argon2 PHC string and is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            password_hash: password_hash.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new(1, "Merovius", "$argon2id$secret");
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("Merovius"));
        assert!(!json.contains("secret"));
    }
}
