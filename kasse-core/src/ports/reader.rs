//! Card reader port

use async_trait::async_trait;

use crate::domain::result::Result;

/// Serial source of raw card identifiers
///
/// A reader has exactly one consumer. `next_uid` blocks until a card is
/// presented or the hardware fails; it never reports the same physical
/// presentation twice.
#[async_trait]
pub trait CardReader: Send {
    /// Wait for the next card identifier
    ///
    /// Fails with [`crate::Error::ReaderClosed`] once the reader was closed
    /// or its underlying stream ended. Any other error is a hardware fault.
    async fn next_uid(&mut self) -> Result<Vec<u8>>;

    /// Release the underlying device
    async fn close(&mut self) -> Result<()>;
}

/// One synchronous poll of an RF field
///
/// Implemented by device drivers. Returns the identifiers of all targets
/// currently in the field, empty when there is none.
pub trait CardScanner: Send {
    fn scan(&mut self) -> Result<Vec<Vec<u8>>>;
}
