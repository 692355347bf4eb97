//! Ingestion service - reader task, event channel and the consumer loop

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::result::{Error, Result};
use crate::domain::{CardEvent, CardId};
use crate::ports::{CardReader, ResultReporter};
use crate::services::{CardRouter, LogEvent, LoggingService, RouteOutcome};

/// Drives swipes from a reader through the router to a reporter
///
/// One task owns the reader and is the only producer. It blocks on a
/// channel of capacity one while the consumer is busy, so swipes are
/// handled strictly one after another in arrival order.
pub struct IngestService {
    router: Arc<CardRouter>,
    reporter: Arc<dyn ResultReporter>,
    logger: Option<Arc<LoggingService>>,
}

impl IngestService {
    pub fn new(router: Arc<CardRouter>, reporter: Arc<dyn ResultReporter>) -> Self {
        Self {
            router,
            reporter,
            logger: None,
        }
    }

    /// Record swipe classifications and reader faults in the event log
    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Run until the reader closes (`Ok`) or fails (`Err` with the reader's
    /// error). Storage failures on single swipes are logged and skipped.
    pub async fn run(&self, reader: Box<dyn CardReader>) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(1);
        let reader_task = tokio::spawn(read_events(reader, tx));
        tracing::info!("ingestion started");

        let outcome = loop {
            let Some(event) = rx.recv().await else {
                break Ok(());
            };
            match event {
                CardEvent::Swiped(card) => self.dispatch(card).await,
                CardEvent::ReaderFailed(Error::ReaderClosed) => {
                    tracing::info!("reader closed");
                    break Ok(());
                }
                CardEvent::ReaderFailed(err) => {
                    tracing::error!(error = %err, "reader failed");
                    self.record(LogEvent::new("reader_error").with_error(err.to_string()));
                    break Err(err);
                }
            }
        };

        drop(rx);
        if let Err(e) = reader_task.await {
            tracing::warn!(error = %e, "reader task did not finish cleanly");
        }
        outcome
    }

    async fn dispatch(&self, card: CardId) {
        match self.router.route(card.clone()).await {
            Ok(RouteOutcome::Swiped(result)) => {
                tracing::info!(card = %card, code = %result.code, "swipe processed");
                self.record(LogEvent::new("swipe_processed").with_outcome(result.code.as_str()));
                self.reporter.report(&result).await;
            }
            Ok(RouteOutcome::Registered(card)) => {
                self.record(LogEvent::new("card_registered"));
                self.reporter.report_registration(&card).await;
            }
            Err(err) => {
                tracing::error!(card = %card, error = %err, "swipe could not be processed");
                self.record(LogEvent::new("swipe_failed").with_error(err.to_string()));
            }
        }
    }

    fn record(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log(event) {
                tracing::warn!(error = %e, "failed to write event log");
            }
        }
    }
}

/// Reader task: forwards identifiers until the reader fails or closes, then
/// closes the reader
async fn read_events(mut reader: Box<dyn CardReader>, tx: mpsc::Sender<CardEvent>) {
    loop {
        let event = match reader.next_uid().await {
            Ok(uid) if uid.is_empty() => {
                tracing::warn!("reader reported an empty identifier, ignoring");
                continue;
            }
            Ok(uid) => CardEvent::Swiped(CardId::new(uid)),
            Err(err) => CardEvent::ReaderFailed(err),
        };
        let last = matches!(event, CardEvent::ReaderFailed(_));
        if tx.send(event).await.is_err() || last {
            break;
        }
    }
    if let Err(e) = reader.close().await {
        tracing::warn!(error = %e, "failed to close reader");
    }
}
