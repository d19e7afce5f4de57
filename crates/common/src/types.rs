use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price and volume picture of one instrument at one tick.
/// Produced by a `SnapshotSource`; never mutated after the batch is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub symbol: String,
    pub last_price: f64,
    /// Prior close or session open, depending on the feed configuration.
    pub reference_price: f64,
    pub current_volume: u64,
    /// N-day average daily volume. Zero when no history is known.
    pub baseline_avg_volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl InstrumentSnapshot {
    /// Percent move from the reference price. `None` when the reference is
    /// not a positive finite number or the last price is not finite.
    pub fn pct_change(&self) -> Option<f64> {
        if !self.reference_price.is_finite() || self.reference_price <= 0.0 {
            return None;
        }
        if !self.last_price.is_finite() {
            return None;
        }
        Some((self.last_price - self.reference_price) / self.reference_price * 100.0)
    }

    /// `current_volume / baseline_avg_volume`. `None` when the baseline is
    /// zero, negative or not finite.
    pub fn volume_ratio(&self) -> Option<f64> {
        if self.baseline_avg_volume.is_finite() && self.baseline_avg_volume > 0.0 {
            Some(self.current_volume as f64 / self.baseline_avg_volume)
        } else {
            None
        }
    }
}

/// Which concrete source produced a batch. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Live,
    Fallback,
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMode::Live => write!(f, "live"),
            SourceMode::Fallback => write!(f, "fallback"),
        }
    }
}

/// One complete tick of market data. The fetch stage finishes building the
/// batch before any detector or position logic sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotBatch {
    pub taken_at: DateTime<Utc>,
    pub mode: SourceMode,
    pub snapshots: Vec<InstrumentSnapshot>,
}

impl SnapshotBatch {
    pub fn new(
        taken_at: DateTime<Utc>,
        mode: SourceMode,
        snapshots: Vec<InstrumentSnapshot>,
    ) -> Self {
        Self {
            taken_at,
            mode,
            snapshots,
        }
    }

    pub fn empty(taken_at: DateTime<Utc>, mode: SourceMode) -> Self {
        Self::new(taken_at, mode, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// An instrument that passed entry screening on a given tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    /// Last observed price; becomes the entry price if a position opens.
    pub last_price: f64,
    pub pct_change: f64,
    pub volume_ratio: f64,
    pub current_volume: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionState {
    Open,
    Closed,
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionState::Open => write!(f, "OPEN"),
            PositionState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// A simulated long position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub entry_price: f64,
    pub quantity: u64,
    pub entry_volume_ratio: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub peak_price_since_entry: f64,
    pub state: PositionState,
}

impl Position {
    /// Open a position on a candidate at its last observed price.
    pub fn open(candidate: &Candidate, quantity: u64, at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: candidate.symbol.clone(),
            entry_price: candidate.last_price,
            quantity,
            entry_volume_ratio: candidate.volume_ratio,
            entry_timestamp: at,
            peak_price_since_entry: candidate.last_price,
            state: PositionState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == PositionState::Open
    }

    /// Mark-to-market P&L in currency units.
    pub fn unrealized_amount(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity as f64
    }
}

/// Percent return from `entry` to `exit`.
pub fn pct_return(entry: f64, exit: f64) -> f64 {
    (exit - entry) / entry * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    VolumeDecay,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "STOP_LOSS"),
            ExitReason::VolumeDecay => write!(f, "VOLUME_DECAY"),
        }
    }
}

/// Emitted once when a position opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryEvent {
    /// Id of the position this entry opened.
    pub id: String,
    pub symbol: String,
    pub entry_price: f64,
    pub quantity: u64,
    pub entry_volume_ratio: f64,
    pub entry_timestamp: DateTime<Utc>,
}

impl From<&Position> for EntryEvent {
    fn from(p: &Position) -> Self {
        Self {
            id: p.id.clone(),
            symbol: p.symbol.clone(),
            entry_price: p.entry_price,
            quantity: p.quantity,
            entry_volume_ratio: p.entry_volume_ratio,
            entry_timestamp: p.entry_timestamp,
        }
    }
}

/// Realized result of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    /// Id of the position that closed.
    pub id: String,
    pub symbol: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: u64,
    pub entry_timestamp: DateTime<Utc>,
    pub exit_timestamp: DateTime<Utc>,
    pub pnl_pct: f64,
    pub pnl_amount: f64,
    pub exit_reason: ExitReason,
}

impl TradeOutcome {
    pub fn close(
        position: &Position,
        exit_price: f64,
        at: DateTime<Utc>,
        reason: ExitReason,
    ) -> Self {
        Self {
            id: position.id.clone(),
            symbol: position.symbol.clone(),
            entry_price: position.entry_price,
            exit_price,
            quantity: position.quantity,
            entry_timestamp: position.entry_timestamp,
            exit_timestamp: at,
            pnl_pct: pct_return(position.entry_price, exit_price),
            pnl_amount: position.unrealized_amount(exit_price),
            exit_reason: reason,
        }
    }
}

/// Unit of work handed to an `OutcomeRecorder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TradeEvent {
    Entry(EntryEvent),
    Exit(TradeOutcome),
}

impl TradeEvent {
    pub fn id(&self) -> &str {
        match self {
            TradeEvent::Entry(e) => &e.id,
            TradeEvent::Exit(o) => &o.id,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            TradeEvent::Entry(e) => &e.symbol,
            TradeEvent::Exit(o) => &o.symbol,
        }
    }
}

impl From<EntryEvent> for TradeEvent {
    fn from(e: EntryEvent) -> Self {
        TradeEvent::Entry(e)
    }
}

impl From<TradeOutcome> for TradeEvent {
    fn from(o: TradeOutcome) -> Self {
        TradeEvent::Exit(o)
    }
}

/// Ordered set of symbols scanned for the whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Universe {
    symbols: Vec<String>,
}

impl Universe {
    /// Build from raw symbols: trims, drops blanks, keeps first occurrence.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let symbols = symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .collect();
        Self { symbols }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Lifecycle of the session driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Commands sent to the session driver via its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(last: f64, reference: f64, volume: u64, baseline: f64) -> InstrumentSnapshot {
        InstrumentSnapshot {
            symbol: "INFY".into(),
            last_price: last,
            reference_price: reference,
            current_volume: volume,
            baseline_avg_volume: baseline,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn pct_change_requires_positive_reference() {
        assert!(snapshot(10.0, 0.0, 1, 1.0).pct_change().is_none());
        assert!(snapshot(10.0, -5.0, 1, 1.0).pct_change().is_none());
        let pct = snapshot(102.5, 100.0, 1, 1.0).pct_change().unwrap();
        assert!((pct - 2.5).abs() < 1e-9);
    }

    #[test]
    fn volume_ratio_is_none_on_zero_baseline() {
        assert!(snapshot(1.0, 1.0, 500, 0.0).volume_ratio().is_none());
        assert!(snapshot(1.0, 1.0, 500, f64::NAN).volume_ratio().is_none());
        assert_eq!(snapshot(1.0, 1.0, 1_200_000, 400_000.0).volume_ratio(), Some(3.0));
    }

    #[test]
    fn outcome_pnl_matches_formula() {
        let candidate = Candidate {
            symbol: "TCS".into(),
            last_price: 200.0,
            pct_change: 3.0,
            volume_ratio: 2.0,
            current_volume: 10,
            timestamp: Utc::now(),
        };
        let position = Position::open(&candidate, 5, Utc::now());
        let outcome = TradeOutcome::close(&position, 190.0, Utc::now(), ExitReason::StopLoss);
        assert!((outcome.pnl_pct - (-5.0)).abs() < 1e-9);
        assert!((outcome.pnl_amount - (-50.0)).abs() < 1e-9);
        assert_eq!(outcome.id, position.id);
    }

    #[test]
    fn universe_dedupes_in_order() {
        let u = Universe::from_symbols(["INFY", " TCS ", "", "INFY", "SBIN"]);
        assert_eq!(u.symbols(), &["INFY", "TCS", "SBIN"]);
        assert!(u.contains("TCS"));
        assert!(!u.contains("HDFC"));
    }

    #[test]
    fn trade_event_serializes_with_kind_tag() {
        let event = TradeEvent::Entry(EntryEvent {
            id: "p1".into(),
            symbol: "INFY".into(),
            entry_price: 100.0,
            quantity: 1,
            entry_volume_ratio: 3.0,
            entry_timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "entry");
        assert_eq!(event.symbol(), "INFY");
    }
}
