//! Result reporter port

use async_trait::async_trait;

use crate::domain::{CardId, SwipeResult};

/// Renders the outcome of a swipe to whoever is watching
///
/// Reporting is best effort: a reporter that cannot deliver logs and moves
/// on, it never stalls ingestion.
#[async_trait]
pub trait ResultReporter: Send + Sync {
    async fn report(&self, result: &SwipeResult);

    /// A card was claimed by a registration window instead of being charged
    async fn report_registration(&self, _card: &CardId) {}
}
