use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use common::{OutcomeRecorder, Result, TradeEvent};

const ENTRIES_FILE: &str = "entries.csv";
const TRADES_FILE: &str = "realized_trades.csv";

/// Appends entries and realized trades to CSV files in one session directory
/// (usually `logs/YYYYMMDD`).
///
/// Ids already present in the files are loaded at startup, so a record is
/// written at most once even across restarts.
pub struct CsvRecorder {
    dir: PathBuf,
    seen: Mutex<Seen>,
}

#[derive(Default)]
struct Seen {
    entries: HashSet<String>,
    trades: HashSet<String>,
}

impl CsvRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let seen = Seen {
            entries: existing_ids(&dir.join(ENTRIES_FILE))?,
            trades: existing_ids(&dir.join(TRADES_FILE))?,
        };
        info!(
            dir = %dir.display(),
            entries = seen.entries.len(),
            trades = seen.trades.len(),
            "CSV recorder ready"
        );
        Ok(Self {
            dir,
            seen: Mutex::new(seen),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl OutcomeRecorder for CsvRecorder {
    async fn record(&self, event: &TradeEvent) -> Result<()> {
        let mut seen = self.seen.lock().await;
        let (ids, file) = match event {
            TradeEvent::Entry(_) => (&mut seen.entries, ENTRIES_FILE),
            TradeEvent::Exit(_) => (&mut seen.trades, TRADES_FILE),
        };
        if ids.contains(event.id()) {
            debug!(id = event.id(), "Already recorded, skipping");
            return Ok(());
        }

        let path = self.dir.join(file);
        match event {
            TradeEvent::Entry(entry) => append_row(&path, entry)?,
            TradeEvent::Exit(outcome) => append_row(&path, outcome)?,
        }
        ids.insert(event.id().to_string());
        debug!(id = event.id(), symbol = event.symbol(), file, "Recorded to CSV");
        Ok(())
    }
}

/// Append one row, writing the header only when the file is new or empty.
fn append_row<T: Serialize>(path: &Path, row: &T) -> Result<()> {
    let fresh = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(fresh)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

fn existing_ids(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let Some(col) = reader.headers()?.iter().position(|h| h == "id") else {
        return Ok(HashSet::new());
    };
    let mut ids = HashSet::new();
    for record in reader.records() {
        if let Some(id) = record?.get(col) {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}
