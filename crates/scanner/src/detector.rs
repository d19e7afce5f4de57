use tracing::debug;

use common::{Candidate, InstrumentSnapshot, SnapshotBatch};

use crate::config::SignalConfig;

/// Why a snapshot did not become a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Reference price not positive, or a price is not finite.
    InvalidPrice,
    BelowPctChange,
    BelowAbsVolume,
    /// No usable baseline volume, so the ratio is undefined.
    ZeroBaseline,
    BelowVolumeRatio,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InvalidPrice => write!(f, "invalid price"),
            SkipReason::BelowPctChange => write!(f, "pct change below threshold"),
            SkipReason::BelowAbsVolume => write!(f, "volume below absolute minimum"),
            SkipReason::ZeroBaseline => write!(f, "no baseline volume"),
            SkipReason::BelowVolumeRatio => write!(f, "volume ratio below multiplier"),
        }
    }
}

/// Result of screening one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Candidate(Candidate),
    Skipped(SkipReason),
}

impl Screen {
    pub fn into_candidate(self) -> Option<Candidate> {
        match self {
            Screen::Candidate(c) => Some(c),
            Screen::Skipped(_) => None,
        }
    }
}

/// Classifies snapshots as momentum candidates: price up more than
/// `min_pct_change`, volume above `min_abs_volume`, and volume above
/// `volume_multiplier` times the baseline. Pure; holds only its thresholds.
#[derive(Debug, Clone)]
pub struct SignalDetector {
    config: SignalConfig,
}

impl SignalDetector {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn screen(&self, snapshot: &InstrumentSnapshot) -> Screen {
        let Some(pct_change) = snapshot.pct_change() else {
            return Screen::Skipped(SkipReason::InvalidPrice);
        };
        if !(pct_change > self.config.min_pct_change) {
            return Screen::Skipped(SkipReason::BelowPctChange);
        }
        if snapshot.current_volume <= self.config.min_abs_volume {
            return Screen::Skipped(SkipReason::BelowAbsVolume);
        }
        let Some(volume_ratio) = snapshot.volume_ratio() else {
            return Screen::Skipped(SkipReason::ZeroBaseline);
        };
        if !(volume_ratio > self.config.volume_multiplier) {
            return Screen::Skipped(SkipReason::BelowVolumeRatio);
        }

        Screen::Candidate(Candidate {
            symbol: snapshot.symbol.clone(),
            last_price: snapshot.last_price,
            pct_change,
            volume_ratio,
            current_volume: snapshot.current_volume,
            timestamp: snapshot.timestamp,
        })
    }

    /// Returns a candidate iff all three entry thresholds are exceeded.
    pub fn evaluate(&self, snapshot: &InstrumentSnapshot) -> Option<Candidate> {
        self.screen(snapshot).into_candidate()
    }

    /// Screen every snapshot in a batch. Each instrument is judged on its own;
    /// a bad snapshot only removes itself.
    pub fn scan(&self, batch: &SnapshotBatch) -> Vec<Candidate> {
        batch
            .snapshots
            .iter()
            .filter_map(|s| match self.screen(s) {
                Screen::Candidate(c) => Some(c),
                Screen::Skipped(reason) => {
                    debug!(symbol = %s.symbol, %reason, "Skipping instrument");
                    None
                }
            })
            .collect()
    }
}
