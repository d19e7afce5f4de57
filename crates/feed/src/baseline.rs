use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::Result;

#[derive(Debug, Serialize, Deserialize)]
struct BaselineRow {
    symbol: String,
    avg_volume: f64,
}

/// N-day average daily volume per symbol, loaded once per session.
///
/// File format (header required):
/// ```text
/// symbol,avg_volume
/// INFY,6512345.5
/// ```
#[derive(Debug, Clone, Default)]
pub struct BaselineVolumes {
    volumes: HashMap<String, f64>,
}

impl BaselineVolumes {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let mut volumes = HashMap::new();

        for row in reader.deserialize::<BaselineRow>() {
            let row = row?;
            if !row.avg_volume.is_finite() || row.avg_volume < 0.0 {
                warn!(
                    symbol = %row.symbol,
                    avg_volume = row.avg_volume,
                    "Ignoring unusable baseline"
                );
                continue;
            }
            volumes.insert(row.symbol.trim().to_string(), row.avg_volume);
        }

        info!(path = %path.display(), symbols = volumes.len(), "Baseline volumes loaded");
        Ok(Self { volumes })
    }

    /// Write the baselines in the format `load` reads, sorted by symbol.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut rows: Vec<_> = self.volumes.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));

        let mut writer = csv::Writer::from_path(path)?;
        for (symbol, avg_volume) in rows {
            writer.serialize(BaselineRow {
                symbol: symbol.clone(),
                avg_volume: *avg_volume,
            })?;
        }
        writer.flush()?;

        info!(path = %path.display(), symbols = self.volumes.len(), "Baseline volumes saved");
        Ok(())
    }

    /// Last modification time of a cached baseline file, if it exists.
    pub fn cached_at(path: impl AsRef<Path>) -> Option<DateTime<Utc>> {
        let modified = std::fs::metadata(path).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    pub fn from_map(volumes: HashMap<String, f64>) -> Self {
        Self { volumes }
    }

    /// Baseline for `symbol`, zero when unknown (which disqualifies it).
    pub fn get(&self, symbol: &str) -> f64 {
        self.volumes.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_rows_and_defaults_to_zero() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"symbol,avg_volume\nINFY,400000\nTCS,-5\nSBIN,1250000.5\n")
            .unwrap();

        let b = BaselineVolumes::load(f.path()).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b.get("INFY"), 400_000.0);
        assert_eq!(b.get("SBIN"), 1_250_000.5);
        assert_eq!(b.get("TCS"), 0.0);
        assert_eq!(b.get("MISSING"), 0.0);
    }

    #[test]
    fn saved_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("baseline_volumes.csv");
        assert!(BaselineVolumes::cached_at(&path).is_none());

        let built = BaselineVolumes::from_map(HashMap::from([
            ("TCS".to_string(), 0.0),
            ("INFY".to_string(), 512_345.5),
        ]));
        built.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "symbol,avg_volume\nINFY,512345.5\nTCS,0.0\n");

        let loaded = BaselineVolumes::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("INFY"), 512_345.5);
        assert!(BaselineVolumes::cached_at(&path).is_some());
    }
}
