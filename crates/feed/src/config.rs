use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Kite caps a single quote request at 500 instruments.
pub const MAX_QUOTE_BATCH: usize = 500;

/// Which price a move is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePrice {
    /// Today's session open.
    #[default]
    Open,
    /// Previous session close.
    PriorClose,
}

/// Live feed settings. Loaded from the `[feed]` table of the scan config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub reference: ReferencePrice,
    /// Instruments per quote request.
    pub batch_size: usize,
    /// Pause between quote requests, to stay under the API rate limit.
    pub batch_pause_ms: u64,
    pub base_url: String,
    pub exchange: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reference: ReferencePrice::Open,
            batch_size: 200,
            batch_pause_ms: 400,
            base_url: "https://api.kite.trade".to_string(),
            exchange: "NSE".to_string(),
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_QUOTE_BATCH {
            return Err(Error::InvalidConfiguration(format!(
                "feed.batch_size must be in 1..={MAX_QUOTE_BATCH}, got {}",
                self.batch_size
            )));
        }
        if self.base_url.trim().is_empty() || self.exchange.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "feed.base_url and feed.exchange must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_bounds() {
        assert!(FeedConfig::default().validate().is_ok());
        let too_big = FeedConfig {
            batch_size: 501,
            ..FeedConfig::default()
        };
        assert!(too_big.validate().is_err());
        let zero = FeedConfig {
            batch_size: 0,
            ..FeedConfig::default()
        };
        assert!(zero.validate().is_err());
    }
}
