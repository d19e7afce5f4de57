use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use common::{Error, Result, SnapshotBatch, SnapshotSource, SourceMode, Universe};

/// Replays the last batch saved by the live source.
///
/// Used when the market is closed or no credentials are configured. Every
/// fetch re-reads the file, restricted to the session universe.
pub struct SnapshotFileSource {
    path: PathBuf,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!(path = %path.display(), "Using saved snapshot fallback");
        Self { path }
    }
}

#[async_trait]
impl SnapshotSource for SnapshotFileSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Fallback
    }

    async fn fetch(&self, universe: &Universe) -> Result<SnapshotBatch> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::DataUnavailable(format!(
                    "saved snapshot not found at '{}'; run once during market hours to create it",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let saved: SnapshotBatch = serde_json::from_str(&content)?;
        let snapshots: Vec<_> = saved
            .snapshots
            .into_iter()
            .filter(|s| universe.contains(&s.symbol))
            .collect();

        debug!(
            saved_at = %saved.taken_at,
            instruments = snapshots.len(),
            "Loaded saved snapshot"
        );
        Ok(SnapshotBatch::new(saved.taken_at, SourceMode::Fallback, snapshots))
    }
}

/// Persist a batch so a later session can replay it.
pub async fn save_snapshot(path: &Path, batch: &SnapshotBatch) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_string_pretty(batch)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
