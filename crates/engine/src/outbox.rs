use std::collections::VecDeque;

use common::{OutcomeRecorder, Result, TradeEvent};

/// Records decided by the position manager but not yet accepted by the
/// recorder. Position state is final before a record lands here, so a failed
/// send is retried from the queue and never re-runs the decision.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: VecDeque<TradeEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: impl Into<TradeEvent>) {
        self.pending.push_back(event.into());
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Send queued records in order. Stops at the first failure and leaves
    /// that record and everything after it queued. Returns how many were sent.
    pub async fn flush(&mut self, recorder: &dyn OutcomeRecorder) -> Result<usize> {
        let mut sent = 0;
        while let Some(event) = self.pending.front() {
            recorder.record(event).await?;
            self.pending.pop_front();
            sent += 1;
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{EntryEvent, MemoryRecorder};

    fn entry(id: &str) -> EntryEvent {
        EntryEvent {
            id: id.into(),
            symbol: "INFY".into(),
            entry_price: 100.0,
            quantity: 1,
            entry_volume_ratio: 2.0,
            entry_timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn flush_sends_in_order() {
        let rec = MemoryRecorder::new();
        let mut outbox = Outbox::new();
        outbox.push(entry("a"));
        outbox.push(entry("b"));

        assert_eq!(outbox.flush(&rec).await.unwrap(), 2);
        assert!(outbox.is_empty());
        let ids: Vec<String> = rec.events().await.iter().map(|e| e.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failure_keeps_remaining_records_for_retry() {
        let rec = MemoryRecorder::new();
        let mut outbox = Outbox::new();
        outbox.push(entry("a"));
        outbox.push(entry("b"));

        rec.fail_next(1);
        assert!(outbox.flush(&rec).await.is_err());
        assert_eq!(outbox.len(), 2);
        assert!(rec.events().await.is_empty());

        assert_eq!(outbox.flush(&rec).await.unwrap(), 2);
        assert_eq!(rec.events().await.len(), 2);
    }
}
