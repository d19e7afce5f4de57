use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use common::{
    Error, InstrumentSnapshot, Result, SnapshotBatch, SnapshotSource, SourceMode, Universe,
};

use crate::baseline::BaselineVolumes;
use crate::config::{FeedConfig, ReferencePrice};
use crate::history::KiteHistory;
use crate::rest::KiteRest;
use crate::snapshot_file::save_snapshot;

/// Live quotes from the Kite Connect v3 REST API.
///
/// The universe is requested in batches of `batch_size` instruments. A failed
/// batch only drops its own instruments; the fetch fails as a whole only when
/// nothing came back. Every successful fetch is saved for the fallback source.
pub struct KiteQuoteSource {
    rest: KiteRest,
    config: FeedConfig,
    baselines: BaselineVolumes,
    snapshot_path: Option<PathBuf>,
}

impl KiteQuoteSource {
    pub fn new(rest: KiteRest, config: FeedConfig, baselines: BaselineVolumes) -> Self {
        info!(
            batch_size = config.batch_size,
            reference = ?config.reference,
            baselines = baselines.len(),
            "KiteQuoteSource initialized"
        );
        Self {
            rest,
            config,
            baselines,
            snapshot_path: None,
        }
    }

    /// Save each successful batch to `path` for later fallback replay.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Daily-history client on the same connection and exchange.
    pub fn history(&self) -> KiteHistory {
        KiteHistory::new(
            self.rest.clone(),
            self.config.exchange.clone(),
            self.config.batch_pause_ms,
        )
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<String> {
        let params: Vec<(&str, String)> = symbols
            .iter()
            .map(|s| ("i", format!("{}:{}", self.config.exchange, s)))
            .collect();
        self.rest.get("/quote", &params).await
    }
}

#[async_trait]
impl SnapshotSource for KiteQuoteSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Live
    }

    async fn fetch(&self, universe: &Universe) -> Result<SnapshotBatch> {
        let taken_at = Utc::now();
        let mut snapshots = Vec::with_capacity(universe.len());
        let mut failed_batches = 0usize;

        for (i, chunk) in universe.symbols().chunks(self.config.batch_size).enumerate() {
            if i > 0 && self.config.batch_pause_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.batch_pause_ms)).await;
            }

            let parsed = self.fetch_quotes(chunk).await.and_then(|body| {
                parse_quotes(
                    &body,
                    &self.config.exchange,
                    self.config.reference,
                    &self.baselines,
                    taken_at,
                )
            });

            match parsed {
                Ok(mut batch) => snapshots.append(&mut batch),
                Err(e) => {
                    failed_batches += 1;
                    warn!(
                        batch = i,
                        size = chunk.len(),
                        error = %e,
                        "Quote batch failed, skipping"
                    );
                }
            }
        }

        if snapshots.is_empty() && !universe.is_empty() {
            return Err(Error::DataUnavailable(format!(
                "no quotes returned ({failed_batches} batch(es) failed)"
            )));
        }

        let missing = universe.len().saturating_sub(snapshots.len());
        debug!(instruments = snapshots.len(), missing, "Live quotes fetched");

        let batch = SnapshotBatch::new(taken_at, SourceMode::Live, snapshots);
        if let Some(path) = &self.snapshot_path {
            if let Err(e) = save_snapshot(path, &batch).await {
                warn!(path = %path.display(), error = %e, "Failed to save snapshot");
            }
        }
        Ok(batch)
    }
}

// ─── Kite quote JSON parsing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct QuoteResponse {
    status: String,
    #[serde(default)]
    data: HashMap<String, serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct Quote {
    last_price: f64,
    #[serde(default)]
    volume: u64,
    ohlc: Ohlc,
}

#[derive(Deserialize)]
struct Ohlc {
    open: f64,
    close: f64,
}

/// Turn a `/quote` response body into snapshots, sorted by symbol.
///
/// Keys look like `NSE:INFY`; keys for other exchanges are ignored. Each
/// instrument is decoded on its own, so a malformed entry is logged and
/// dropped without losing the rest of the response.
pub fn parse_quotes(
    body: &str,
    exchange: &str,
    reference: ReferencePrice,
    baselines: &BaselineVolumes,
    taken_at: DateTime<Utc>,
) -> Result<Vec<InstrumentSnapshot>> {
    let resp: QuoteResponse = serde_json::from_str(body)?;
    if resp.status != "success" {
        return Err(Error::Feed(
            resp.message.unwrap_or_else(|| format!("status '{}'", resp.status)),
        ));
    }

    let prefix = format!("{exchange}:");
    let mut snapshots: Vec<InstrumentSnapshot> = resp
        .data
        .into_iter()
        .filter_map(|(key, value)| {
            let symbol = key.strip_prefix(&prefix)?.to_string();
            let quote: Quote = match serde_json::from_value(value) {
                Ok(q) => q,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Skipping malformed quote");
                    return None;
                }
            };
            let reference_price = match reference {
                ReferencePrice::Open => quote.ohlc.open,
                ReferencePrice::PriorClose => quote.ohlc.close,
            };
            Some(InstrumentSnapshot {
                baseline_avg_volume: baselines.get(&symbol),
                symbol,
                last_price: quote.last_price,
                reference_price,
                current_volume: quote.volume,
                timestamp: taken_at,
            })
        })
        .collect();

    snapshots.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Ok(snapshots)
}
