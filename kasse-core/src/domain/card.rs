//! Card domain model

use std::fmt;

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Opaque card identifier as reported by the reader (e.g. an NFC UID)
///
/// Displayed and persisted as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CardId(Vec<u8>);

impl CardId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex string. Surrounding whitespace is ignored, case is not
    /// significant.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::validation("Card ID must not be empty"));
        }
        hex::decode(s)
            .map(Self)
            .map_err(|e| Error::validation(format!("Invalid card ID {:?}: {}", s, e)))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<&[u8]> for CardId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for CardId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for CardId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CardId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CardId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A card bound to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub user_id: i64,
    pub description: Option<String>,
}

impl Card {
    pub fn new(id: CardId, user_id: i64) -> Self {
        Self {
            id,
            user_id,
            description: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_id_hex() {
        let id = CardId::new(b"aaaa".to_vec());
        assert_eq!(id.to_hex(), "61616161");
        assert_eq!(CardId::from_hex("61616161").unwrap(), id);
        assert_eq!(CardId::from_hex(" 6A6b \n").unwrap().as_bytes(), &[0x6a, 0x6b]);
    }

    #[test]
    fn test_card_id_rejects_bad_hex() {
        assert!(matches!(CardId::from_hex(""), Err(Error::Validation(_))));
        assert!(matches!(CardId::from_hex("abc"), Err(Error::Validation(_))));
        assert!(matches!(CardId::from_hex("zz"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_card_id_serializes_as_hex() {
        let id = CardId::new(vec![0xde, 0xad]);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dead\"");
        let back: CardId = serde_json::from_str("\"dead\"").unwrap();
        assert_eq!(back, id);
    }
}
