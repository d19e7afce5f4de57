use std::collections::HashMap;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde::Deserialize;
use tracing::{debug, info, warn};

use common::{Error, Result, Universe};

use crate::baseline::BaselineVolumes;
use crate::rest::KiteRest;

/// Calendar days of daily bars requested per symbol.
pub const BASELINE_LOOKBACK_DAYS: u64 = 14;
/// Most recent non-zero bars averaged into a baseline.
pub const BASELINE_BARS: usize = 10;
/// Fewer non-zero bars than this gives a zero baseline.
pub const MIN_BASELINE_BARS: usize = 5;

/// Builds baseline volumes from Kite daily history.
///
/// Resolves each symbol to its instrument token through the exchange dump,
/// then averages the recent daily volumes. Symbols that cannot be resolved
/// or fetched are logged and left out, which gives them a zero baseline.
pub struct KiteHistory {
    rest: KiteRest,
    exchange: String,
    pause_ms: u64,
}

impl KiteHistory {
    pub fn new(rest: KiteRest, exchange: impl Into<String>, pause_ms: u64) -> Self {
        Self {
            rest,
            exchange: exchange.into(),
            pause_ms,
        }
    }

    /// Trading symbol to instrument token for the configured exchange.
    pub async fn instrument_tokens(&self) -> Result<HashMap<String, u64>> {
        let body = self
            .rest
            .get(&format!("/instruments/{}", self.exchange), &[])
            .await?;
        let tokens = parse_instruments(&body)?;
        info!(
            exchange = %self.exchange,
            instruments = tokens.len(),
            "Instrument list loaded"
        );
        Ok(tokens)
    }

    /// Daily volumes for `token` between `from` and `to`, oldest first.
    pub async fn daily_volumes(
        &self,
        token: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<u64>> {
        let query = [
            ("from", from.format("%Y-%m-%d").to_string()),
            ("to", to.format("%Y-%m-%d").to_string()),
        ];
        let body = self
            .rest
            .get(&format!("/instruments/historical/{token}/day"), &query)
            .await?;
        parse_daily_volumes(&body)
    }

    /// Baselines for every symbol in `universe` as of `today`.
    pub async fn fetch_baselines(
        &self,
        universe: &Universe,
        today: NaiveDate,
    ) -> Result<BaselineVolumes> {
        let tokens = self.instrument_tokens().await?;
        let from = today
            .checked_sub_days(Days::new(BASELINE_LOOKBACK_DAYS))
            .unwrap_or(today);

        let mut volumes = HashMap::with_capacity(universe.len());
        let mut requested = 0usize;
        for symbol in universe.symbols() {
            let Some(&token) = tokens.get(symbol) else {
                warn!(
                    symbol = %symbol,
                    exchange = %self.exchange,
                    "No instrument token, skipping"
                );
                continue;
            };

            if requested > 0 && self.pause_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.pause_ms)).await;
            }
            requested += 1;

            match self.daily_volumes(token, from, today).await {
                Ok(bars) => {
                    let avg = average_volume(&bars);
                    debug!(
                        symbol = %symbol,
                        bars = bars.len(),
                        avg_volume = avg,
                        "Baseline built"
                    );
                    volumes.insert(symbol.clone(), avg);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Daily history failed, skipping");
                }
            }
        }

        info!(
            symbols = volumes.len(),
            universe = universe.len(),
            "Baseline volumes built from daily history"
        );
        Ok(BaselineVolumes::from_map(volumes))
    }
}

/// Mean of the last `BASELINE_BARS` non-zero volumes, or zero when fewer
/// than `MIN_BASELINE_BARS` non-zero bars exist.
pub fn average_volume(volumes: &[u64]) -> f64 {
    let traded: Vec<u64> = volumes.iter().copied().filter(|v| *v > 0).collect();
    if traded.len() < MIN_BASELINE_BARS {
        return 0.0;
    }
    let recent = &traded[traded.len().saturating_sub(BASELINE_BARS)..];
    recent.iter().map(|v| *v as f64).sum::<f64>() / recent.len() as f64
}

#[derive(Deserialize)]
struct InstrumentRow {
    instrument_token: u64,
    tradingsymbol: String,
}

/// Parse the `/instruments/{exchange}` CSV dump. The first row wins when a
/// trading symbol repeats.
pub fn parse_instruments(body: &str) -> Result<HashMap<String, u64>> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut tokens = HashMap::new();
    for row in reader.deserialize::<InstrumentRow>() {
        let row = row?;
        tokens.entry(row.tradingsymbol).or_insert(row.instrument_token);
    }
    Ok(tokens)
}

#[derive(Deserialize)]
struct HistoryResponse {
    status: String,
    #[serde(default)]
    data: Option<HistoryData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct HistoryData {
    #[serde(default)]
    candles: Vec<Vec<serde_json::Value>>,
}

/// Volumes from a historical candles response.
///
/// Candles are `[timestamp, open, high, low, close, volume, ..]`; a candle
/// without a usable volume is skipped.
pub fn parse_daily_volumes(body: &str) -> Result<Vec<u64>> {
    let resp: HistoryResponse = serde_json::from_str(body)?;
    if resp.status != "success" {
        return Err(Error::Feed(
            resp.message.unwrap_or_else(|| format!("status '{}'", resp.status)),
        ));
    }

    let candles = resp.data.map(|d| d.candles).unwrap_or_default();
    Ok(candles
        .iter()
        .filter_map(|c| {
            let v = c.get(5)?;
            v.as_u64().or_else(|| {
                v.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_http::serve;

    #[test]
    fn averages_last_ten_traded_bars() {
        // twelve traded bars and one zero-volume holiday
        let bars = [100, 200, 0, 300, 400, 500, 600, 700, 800, 900, 1000, 1100, 1200];
        // non-zero tail of ten: 300..=1200
        assert_eq!(average_volume(&bars), 750.0);
    }

    #[test]
    fn too_few_traded_bars_is_zero() {
        assert_eq!(average_volume(&[]), 0.0);
        assert_eq!(average_volume(&[100, 0, 200, 300, 400]), 0.0);
        assert_eq!(average_volume(&[100, 200, 300, 400, 500]), 300.0);
    }

    #[test]
    fn instruments_map_symbol_to_token() {
        let body = "instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,\
                    strike,tick_size,lot_size,instrument_type,segment,exchange\n\
                    408065,1594,INFY,INFOSYS,0,,0,0.05,1,EQ,NSE,NSE\n\
                    2953217,11532,TCS,TATA CONSULTANCY SERV LT,0,,0,0.05,1,EQ,NSE,NSE\n\
                    999,9,INFY,DUPLICATE,0,,0,0.05,1,EQ,NSE,NSE\n";
        let tokens = parse_instruments(body).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens["INFY"], 408065);
        assert_eq!(tokens["TCS"], 2953217);
    }

    #[test]
    fn candles_yield_volumes() {
        let body = r#"{"status": "success", "data": {"candles": [
            ["2024-06-03T00:00:00+0530", 1500, 1510, 1490, 1505, 4000000],
            ["2024-06-04T00:00:00+0530", 1505, 1520, 1500, 1515, 3500000.0],
            ["2024-06-05T00:00:00+0530", 1515, 1525]
        ]}}"#;
        assert_eq!(parse_daily_volumes(body).unwrap(), vec![4_000_000, 3_500_000]);

        let err = parse_daily_volumes(r#"{"status": "error", "message": "Invalid token"}"#);
        assert!(matches!(err, Err(Error::Feed(_))));
    }

    fn candles(volumes: &[u64]) -> String {
        let rows: Vec<String> = volumes
            .iter()
            .map(|v| format!(r#"["2024-06-03T00:00:00+0530", 100, 101, 99, 100, {v}]"#))
            .collect();
        format!(
            r#"{{"status": "success", "data": {{"candles": [{}]}}}}"#,
            rows.join(",")
        )
    }

    #[tokio::test]
    async fn builds_baselines_for_the_universe() {
        let server = serve(|target| {
            if target.starts_with("/instruments/NSE") {
                let csv = "instrument_token,tradingsymbol\n\
                           408065,INFY\n2953217,TCS\n779521,SBIN\n";
                (200, csv.to_string())
            } else if target.starts_with("/instruments/historical/408065/day") {
                (200, candles(&[100, 200, 300, 400, 500, 600]))
            } else if target.starts_with("/instruments/historical/2953217/day") {
                (200, candles(&[100, 200]))
            } else {
                (500, r#"{"status": "error", "message": "down"}"#.to_string())
            }
        })
        .await;

        let rest = KiteRest::new("key", "secret", &server.base_url).unwrap();
        let history = KiteHistory::new(rest, "NSE", 0);
        let universe = Universe::from_symbols(["INFY", "TCS", "SBIN", "UNLISTED"]);
        let today = NaiveDate::from_ymd_opt(2024, 6, 17).unwrap();

        let baselines = history.fetch_baselines(&universe, today).await.unwrap();
        assert_eq!(baselines.get("INFY"), 350.0);
        // too few bars and failed history both give zero
        assert_eq!(baselines.get("TCS"), 0.0);
        assert_eq!(baselines.get("SBIN"), 0.0);
        assert_eq!(baselines.len(), 2);

        let targets = server.targets();
        // instrument list plus one request per resolved symbol
        assert_eq!(targets.len(), 4);
        assert!(targets
            .iter()
            .any(|t| t == "/instruments/historical/408065/day?from=2024-06-03&to=2024-06-17"));
    }

    #[tokio::test]
    async fn instrument_list_failure_is_an_error() {
        let server = serve(|_| {
            (403, r#"{"status": "error", "message": "denied"}"#.to_string())
        })
        .await;
        let rest = KiteRest::new("key", "secret", &server.base_url).unwrap();
        let history = KiteHistory::new(rest, "NSE", 0);
        let today = NaiveDate::from_ymd_opt(2024, 6, 17).unwrap();

        let err = history
            .fetch_baselines(&Universe::from_symbols(["INFY"]), today)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Feed(_)));
    }
}
