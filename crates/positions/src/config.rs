use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Exit rules and sizing for simulated positions.
/// Loaded from the `[positions]` table of the scan config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    /// Adverse move from entry that closes a position (e.g. 0.01 = 1%).
    pub stop_loss_pct: f64,
    /// Close when volume falls below this multiple of the baseline.
    pub exit_volume_multiplier: f64,
    /// Cap on simultaneously open positions. `None` = no cap.
    pub max_open_positions: Option<usize>,
    /// Notional per simulated entry; quantity = max(1, floor(capital / price)).
    pub capital_per_trade: f64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.01,
            exit_volume_multiplier: 1.0,
            max_open_positions: None,
            capital_per_trade: 20_000.0,
        }
    }
}

impl PositionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.stop_loss_pct.is_finite() || self.stop_loss_pct <= 0.0 || self.stop_loss_pct >= 1.0
        {
            return Err(Error::InvalidConfiguration(format!(
                "positions.stop_loss_pct must be in (0, 1), got {}",
                self.stop_loss_pct
            )));
        }
        if !self.exit_volume_multiplier.is_finite() || self.exit_volume_multiplier < 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "positions.exit_volume_multiplier must be >= 0, got {}",
                self.exit_volume_multiplier
            )));
        }
        if self.max_open_positions == Some(0) {
            return Err(Error::InvalidConfiguration(
                "positions.max_open_positions must be at least 1 when set".into(),
            ));
        }
        if !self.capital_per_trade.is_finite() || self.capital_per_trade <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "positions.capital_per_trade must be positive, got {}",
                self.capital_per_trade
            )));
        }
        Ok(())
    }

    /// Whole shares bought with `capital_per_trade` at `price`, at least one.
    pub fn quantity_for(&self, price: f64) -> u64 {
        ((self.capital_per_trade / price).floor() as u64).max(1)
    }
}
