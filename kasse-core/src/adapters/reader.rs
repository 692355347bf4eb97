//! Card reader adapters
//!
//! - [`PollingReader`] drives a hardware [`CardScanner`] at a fixed interval
//! - [`LineReader`] reads hex identifiers from a text stream (stdin, a pipe)
//! - [`ChannelReader`] is fed in-process through a [`ReaderHandle`]

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

use crate::domain::result::{Error, Result};
use crate::domain::CardId;
use crate::ports::{CardReader, CardScanner};

/// Polls a [`CardScanner`] until a card enters the field
///
/// A card that stays in the field is reported once; it is reported again
/// only after the field was empty in between. When several targets are
/// present the first one wins. A scan error is returned once and polling
/// stops for good.
pub struct PollingReader<S> {
    scanner: Option<S>,
    interval: Duration,
    present: Option<Vec<u8>>,
    stopped: bool,
}

impl<S: CardScanner + 'static> PollingReader<S> {
    pub fn new(scanner: S, interval: Duration) -> Self {
        Self {
            scanner: Some(scanner),
            interval,
            present: None,
            stopped: false,
        }
    }

    async fn scan(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut scanner = self.scanner.take().ok_or(Error::ReaderClosed)?;
        // Device I/O blocks
        let (scanner, targets) = tokio::task::spawn_blocking(move || {
            let targets = scanner.scan();
            (scanner, targets)
        })
        .await
        .map_err(|e| Error::reader(format!("Scanner task failed: {}", e)))?;
        self.scanner = Some(scanner);
        targets
    }
}

#[async_trait]
impl<S: CardScanner + 'static> CardReader for PollingReader<S> {
    async fn next_uid(&mut self) -> Result<Vec<u8>> {
        if self.stopped {
            return Err(Error::ReaderClosed);
        }
        loop {
            let targets = match self.scan().await {
                Ok(targets) => targets,
                Err(e) => {
                    self.stopped = true;
                    return Err(e);
                }
            };

            match targets.split_first() {
                None => self.present = None,
                Some((first, rest)) => {
                    if !rest.is_empty() {
                        tracing::warn!(targets = targets.len(), "more than one card in the field, using the first");
                    }
                    if self.present.as_ref() != Some(first) {
                        self.present = Some(first.clone());
                        return Ok(first.clone());
                    }
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stopped = true;
        self.scanner = None;
        Ok(())
    }
}

/// One hex card identifier per line
///
/// Blank lines are skipped, malformed ones are logged and skipped. End of
/// input closes the reader.
pub struct LineReader<R> {
    lines: Lines<R>,
    closed: bool,
}

impl<R: AsyncBufRead + Unpin + Send> LineReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            lines: input.lines(),
            closed: false,
        }
    }
}

impl LineReader<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> CardReader for LineReader<R> {
    async fn next_uid(&mut self) -> Result<Vec<u8>> {
        while !self.closed {
            let Some(line) = self.lines.next_line().await? else {
                self.closed = true;
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match CardId::from_hex(&line) {
                Ok(id) => return Ok(id.as_bytes().to_vec()),
                Err(e) => tracing::warn!(error = %e, "ignoring malformed card id"),
            }
        }
        Err(Error::ReaderClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

const CHANNEL_READER_CAPACITY: usize = 64;

/// Reader fed by a [`ReaderHandle`], for tests and embedding applications
/// that receive identifiers by other means
pub struct ChannelReader {
    rx: mpsc::Receiver<Result<Vec<u8>>>,
    closed: bool,
}

/// Sending side of a [`ChannelReader`]. Dropping every handle closes the
/// reader once queued events are consumed.
#[derive(Clone)]
pub struct ReaderHandle {
    tx: mpsc::Sender<Result<Vec<u8>>>,
}

impl ChannelReader {
    pub fn new() -> (Self, ReaderHandle) {
        let (tx, rx) = mpsc::channel(CHANNEL_READER_CAPACITY);
        (Self { rx, closed: false }, ReaderHandle { tx })
    }
}

impl ReaderHandle {
    /// Present a card. Fails with [`Error::ReaderClosed`] once the reader is
    /// gone.
    pub async fn swipe(&self, uid: impl Into<Vec<u8>>) -> Result<()> {
        self.tx
            .send(Ok(uid.into()))
            .await
            .map_err(|_| Error::ReaderClosed)
    }

    /// Report a hardware fault
    pub async fn fail(&self, error: Error) -> Result<()> {
        self.tx.send(Err(error)).await.map_err(|_| Error::ReaderClosed)
    }
}

#[async_trait]
impl CardReader for ChannelReader {
    async fn next_uid(&mut self) -> Result<Vec<u8>> {
        if self.closed {
            return Err(Error::ReaderClosed);
        }
        match self.rx.recv().await {
            Some(event) => event,
            None => {
                self.closed = true;
                Err(Error::ReaderClosed)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.rx.close();
        Ok(())
    }
}
