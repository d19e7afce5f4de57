use std::path::Path;

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};

use common::{Error, Result};
use feed::FeedConfig;
use positions::PositionConfig;
use scanner::SignalConfig;

use crate::clock::MarketClock;

/// Session timing. Loaded from the `[session]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between ticks.
    pub scan_interval_secs: u64,
    /// Stop after this many ticks. `None` = run until market close.
    pub max_ticks: Option<u64>,
    /// Local market open, `HH:MM`.
    pub market_open: String,
    /// Local market close, `HH:MM`.
    pub market_close: String,
    /// Exchange time zone as a fixed offset from UTC.
    pub utc_offset_minutes: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 90,
            max_ticks: None,
            market_open: "09:15".to_string(),
            market_close: "15:30".to_string(),
            utc_offset_minutes: 330,
        }
    }
}

impl SessionConfig {
    pub fn market_clock(&self) -> Result<MarketClock> {
        let open = parse_time("session.market_open", &self.market_open)?;
        let close = parse_time("session.market_close", &self.market_close)?;
        if open >= close {
            return Err(Error::InvalidConfiguration(format!(
                "session.market_open ({}) must be before session.market_close ({})",
                self.market_open, self.market_close
            )));
        }
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "session.utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })?;
        Ok(MarketClock::new(open, close, offset))
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_secs == 0 {
            return Err(Error::InvalidConfiguration(
                "session.scan_interval_secs must be at least 1".into(),
            ));
        }
        if self.max_ticks == Some(0) {
            return Err(Error::InvalidConfiguration(
                "session.max_ticks must be at least 1 when set".into(),
            ));
        }
        self.market_clock().map(|_| ())
    }
}

fn parse_time(field: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
        Error::InvalidConfiguration(format!("{field} must be HH:MM, got '{value}': {e}"))
    })
}

/// Everything the scan config file holds.
///
/// Example `config/surge.toml`:
/// ```toml
/// [signal]
/// min_pct_change = 2.0
/// min_abs_volume = 1000000
/// volume_multiplier = 1.5
/// top_n = 50
///
/// [positions]
/// stop_loss_pct = 0.01
/// exit_volume_multiplier = 1.0
/// max_open_positions = 5
/// capital_per_trade = 20000.0
///
/// [session]
/// scan_interval_secs = 90
///
/// [feed]
/// reference = "open"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub signal: SignalConfig,
    pub positions: PositionConfig,
    pub session: SessionConfig,
    pub feed: FeedConfig,
}

impl ScanConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfiguration(format!(
                "failed to read scan config at '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: ScanConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.signal.validate()?;
        self.positions.validate()?;
        self.session.validate()?;
        self.feed.validate()?;

        // Exits are evaluated on the entry tick too; an exit bar at or above
        // the entry bar would close every new position immediately.
        if self.positions.exit_volume_multiplier >= self.signal.volume_multiplier {
            return Err(Error::InvalidConfiguration(format!(
                "positions.exit_volume_multiplier ({}) must be below signal.volume_multiplier ({})",
                self.positions.exit_volume_multiplier, self.signal.volume_multiplier
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = ScanConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ScanConfig::default());
        assert_eq!(cfg.signal.top_n, 50);
    }

    #[test]
    fn partial_tables_merge_with_defaults() {
        let cfg = ScanConfig::from_toml_str(
            r#"
            [signal]
            min_pct_change = 1.0
            volume_multiplier = 2.0

            [positions]
            stop_loss_pct = 0.02
            max_open_positions = 5

            [feed]
            reference = "prior_close"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.signal.min_pct_change, 1.0);
        assert_eq!(cfg.signal.min_abs_volume, 1_000_000);
        assert_eq!(cfg.positions.max_open_positions, Some(5));
        assert_eq!(cfg.feed.reference, feed::ReferencePrice::PriorClose);
    }

    #[test]
    fn negative_stop_loss_fails_to_start() {
        let err = ScanConfig::from_toml_str("[positions]\nstop_loss_pct = -0.5\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn bad_market_hours_are_rejected() {
        assert!(ScanConfig::from_toml_str("[session]\nmarket_open = \"9am\"\n").is_err());
        assert!(ScanConfig::from_toml_str(
            "[session]\nmarket_open = \"15:30\"\nmarket_close = \"09:15\"\n"
        )
        .is_err());
        assert!(ScanConfig::from_toml_str("[session]\nscan_interval_secs = 0\n").is_err());
    }

    #[test]
    fn exit_volume_bar_must_sit_below_entry_bar() {
        let err = ScanConfig::from_toml_str(
            "[signal]\nvolume_multiplier = 1.5\n[positions]\nexit_volume_multiplier = 2.0\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));

        let with_exit = |m: f64| {
            format!(
                "[signal]\nvolume_multiplier = 1.5\n[positions]\nexit_volume_multiplier = {m}\n"
            )
        };
        assert!(ScanConfig::from_toml_str(&with_exit(1.5)).is_err());
        assert!(ScanConfig::from_toml_str(&with_exit(1.2)).is_ok());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            ScanConfig::from_toml_str("[signal]\ntop_n = \"many\"\n"),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn missing_file_is_invalid_configuration() {
        let err = ScanConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }
}
