//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod reader;
mod reporter;

pub use reader::{CardReader, CardScanner};
pub use reporter::ResultReporter;
