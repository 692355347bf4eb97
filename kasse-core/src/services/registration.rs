//! Card registration rendezvous
//!
//! At most one registration window is open system-wide. While it is open,
//! the next swipe is handed to the window's owner instead of being charged.
//!
//! The window is an owned semaphore permit (the owner token) plus a
//! single-slot mailbox holding the sending half of a oneshot channel. The
//! mailbox lock is only taken to open or close the window and to hand a card
//! over, never across the wait.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::domain::result::{Error, Result};
use crate::domain::CardId;

type Mailbox = Arc<Mutex<Option<oneshot::Sender<CardId>>>>;

fn lock(mailbox: &Mailbox) -> MutexGuard<'_, Option<oneshot::Sender<CardId>>> {
    // The guarded value is a plain Option, a panicking holder cannot leave
    // it half-updated
    mailbox.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The shared rendezvous point between registration listeners and the router
pub struct Registration {
    slot: Arc<Semaphore>,
    mailbox: Mailbox,
}

impl Default for Registration {
    fn default() -> Self {
        Self::new()
    }
}

impl Registration {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            mailbox: Arc::new(Mutex::new(None)),
        }
    }

    /// Open a window, queueing behind a window that is already open
    pub async fn begin(&self) -> Result<RegistrationWindow> {
        let permit = Arc::clone(&self.slot)
            .acquire_owned()
            .await
            .map_err(|_| Error::Other("Registration slot closed".to_string()))?;
        Ok(self.open(permit))
    }

    /// Open a window, failing with [`Error::RegistrationBusy`] if another one
    /// is open
    pub fn try_begin(&self) -> Result<RegistrationWindow> {
        match Arc::clone(&self.slot).try_acquire_owned() {
            Ok(permit) => Ok(self.open(permit)),
            Err(TryAcquireError::NoPermits) => Err(Error::RegistrationBusy),
            Err(TryAcquireError::Closed) => Err(Error::Other("Registration slot closed".to_string())),
        }
    }

    fn open(&self, permit: OwnedSemaphorePermit) -> RegistrationWindow {
        let (tx, rx) = oneshot::channel();
        *lock(&self.mailbox) = Some(tx);
        tracing::debug!("registration window opened");
        RegistrationWindow {
            rx: Some(rx),
            mailbox: Arc::clone(&self.mailbox),
            _permit: permit,
        }
    }

    /// True while a window is waiting for a card
    pub fn is_open(&self) -> bool {
        lock(&self.mailbox).is_some()
    }

    /// Hand `card` to the open window
    ///
    /// Returns the card back when no window is open (or its owner is gone),
    /// in which case the caller must charge it.
    pub fn offer(&self, card: CardId) -> std::result::Result<(), CardId> {
        let mut mailbox = lock(&self.mailbox);
        match mailbox.take() {
            Some(tx) => tx.send(card),
            None => Err(card),
        }
    }
}

/// An open registration window
///
/// Dropping it closes the window and frees the slot for the next listener,
/// whether it got a card, timed out, or its task was cancelled.
pub struct RegistrationWindow {
    rx: Option<oneshot::Receiver<CardId>>,
    mailbox: Mailbox,
    // Dropped after `Drop::drop` cleared the mailbox
    _permit: OwnedSemaphorePermit,
}

impl RegistrationWindow {
    /// Wait up to `timeout` for the next swipe
    ///
    /// Returns `None` on expiry. A card handed over while the window was
    /// expiring is still returned.
    pub async fn wait(mut self, timeout: Duration) -> Option<CardId> {
        let mut rx = self.rx.take()?;
        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(card) => card.ok(),
            Err(_) => {
                self.close();
                let card = rx.try_recv().ok();
                if card.is_none() {
                    tracing::debug!("registration window expired");
                }
                card
            }
        }
    }

    fn close(&self) {
        lock(&self.mailbox).take();
    }
}

impl Drop for RegistrationWindow {
    fn drop(&mut self) {
        self.close();
        if let Some(card) = self.rx.as_mut().and_then(|rx| rx.try_recv().ok()) {
            tracing::warn!(card = %card, "registration window dropped with an unclaimed card");
        }
    }
}
