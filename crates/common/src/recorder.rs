use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Error, Result, TradeEvent};

/// Append-only sink for entry and exit records.
///
/// Records carry the position id, so implementations must treat a repeated
/// record as a no-op. The outbox relies on that when it retries.
#[async_trait]
pub trait OutcomeRecorder: Send + Sync {
    async fn record(&self, event: &TradeEvent) -> Result<()>;
}

/// In-memory recorder for dry runs and tests.
///
/// `fail_next(n)` makes the next `n` calls fail with `Error::Recorder`
/// without storing anything.
#[derive(Clone, Default)]
pub struct MemoryRecorder {
    events: Arc<RwLock<Vec<TradeEvent>>>,
    failures_left: Arc<AtomicUsize>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<TradeEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl OutcomeRecorder for MemoryRecorder {
    async fn record(&self, event: &TradeEvent) -> Result<()> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(Error::Recorder(format!(
                "simulated failure recording {}",
                event.id()
            )));
        }

        let mut events = self.events.write().await;
        if !events.iter().any(|e| same_record(e, event)) {
            events.push(event.clone());
        }
        Ok(())
    }
}

fn same_record(a: &TradeEvent, b: &TradeEvent) -> bool {
    matches!(
        (a, b),
        (TradeEvent::Entry(_), TradeEvent::Entry(_)) | (TradeEvent::Exit(_), TradeEvent::Exit(_))
    ) && a.id() == b.id()
}
