use async_trait::async_trait;

use crate::{Result, SnapshotBatch, SourceMode, Universe};

/// Abstraction over where market data comes from.
///
/// `KiteQuoteSource` implements this for live quotes.
/// `SnapshotFileSource` implements this for replaying the last saved batch.
///
/// The source is picked once when the session is built; nothing downstream
/// branches on which one is active.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Live or fallback. Informational only.
    fn mode(&self) -> SourceMode;

    /// Fetch one complete batch for the universe. Instruments the source has
    /// no data for are simply absent from the batch; an `Err` means the whole
    /// tick has no data.
    async fn fetch(&self, universe: &Universe) -> Result<SnapshotBatch>;
}
