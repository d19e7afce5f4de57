use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Entry thresholds. Loaded from the `[signal]` table of the scan config.
///
/// ```toml
/// [signal]
/// min_pct_change = 2.0
/// min_abs_volume = 1000000
/// volume_multiplier = 1.5
/// top_n = 50
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Percent move from the reference price that must be exceeded.
    pub min_pct_change: f64,
    /// Absolute session volume that must be exceeded.
    pub min_abs_volume: u64,
    /// Multiple of the baseline average volume that must be exceeded.
    pub volume_multiplier: f64,
    /// Shortlist size after ranking.
    pub top_n: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_pct_change: 2.0,
            min_abs_volume: 1_000_000,
            volume_multiplier: 1.5,
            top_n: 50,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_pct_change.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "signal.min_pct_change must be finite, got {}",
                self.min_pct_change
            )));
        }
        if !self.volume_multiplier.is_finite() || self.volume_multiplier <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "signal.volume_multiplier must be positive, got {}",
                self.volume_multiplier
            )));
        }
        if self.top_n == 0 {
            return Err(Error::InvalidConfiguration(
                "signal.top_n must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SignalConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_multiplier() {
        let cfg = SignalConfig {
            volume_multiplier: 0.0,
            ..SignalConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_zero_top_n_and_nan_pct() {
        let cfg = SignalConfig {
            top_n: 0,
            ..SignalConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = SignalConfig {
            min_pct_change: f64::NAN,
            ..SignalConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
