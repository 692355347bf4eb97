//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod card;
pub mod result;
pub mod swipe;
pub mod transaction;
mod user;

pub use card::{Card, CardId};
pub use swipe::{CardEvent, ResultCode, SwipeRejection, SwipeReport, SwipeResult};
pub use transaction::{NewTransaction, Transaction};
pub use user::User;
