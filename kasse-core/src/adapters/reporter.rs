//! Result reporter adapters

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{CardId, SwipeReport, SwipeResult};
use crate::ports::ResultReporter;

/// Reports results as structured log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

#[async_trait]
impl ResultReporter for TracingReporter {
    async fn report(&self, result: &SwipeResult) {
        tracing::info!(
            code = %result.code,
            user = result.user.as_deref().unwrap_or(""),
            balance = result.balance,
            card = %result.card,
            "swipe result"
        );
    }

    async fn report_registration(&self, card: &CardId) {
        tracing::info!(card = %card, "card handed to registration");
    }
}

/// Fans results out to any number of subscribers, e.g. a display or
/// long-poll clients
///
/// Subscribers that fall behind lose the oldest reports. Reports sent while
/// nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastReporter {
    tx: broadcast::Sender<SwipeReport>,
}

impl BroadcastReporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwipeReport> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl ResultReporter for BroadcastReporter {
    async fn report(&self, result: &SwipeResult) {
        if self.tx.send(result.to_report()).is_err() {
            tracing::debug!("no display subscribed, dropping swipe report");
        }
    }
}
