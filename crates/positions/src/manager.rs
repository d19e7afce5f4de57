use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use common::{
    Candidate, EntryEvent, ExitReason, InstrumentSnapshot, Position, PositionState, TradeOutcome,
};

use crate::config::PositionConfig;
use crate::summary::PnlSummary;

/// Owns every simulated position of the session and moves them through
/// `NoPosition -> Open -> Closed`, one tick at a time.
///
/// Invariants:
/// - at most one open position per symbol (the open index is keyed by symbol);
/// - a position closes exactly once, with exactly one exit reason;
/// - closed positions and their outcomes are kept for reporting, never mutated.
///
/// Not `Sync`-shared: a single task drives it.
pub struct PositionManager {
    config: PositionConfig,
    open: BTreeMap<String, Position>,
    closed: Vec<Position>,
    outcomes: Vec<TradeOutcome>,
}

impl PositionManager {
    pub fn new(config: PositionConfig) -> Self {
        Self {
            config,
            open: BTreeMap::new(),
            closed: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn config(&self) -> &PositionConfig {
        &self.config
    }

    /// Open a position for every ranked candidate not already held.
    /// Returns the entry records to hand to the recorder, in candidate order.
    pub fn on_candidates(
        &mut self,
        ranked: &[Candidate],
        tick_time: DateTime<Utc>,
    ) -> Vec<EntryEvent> {
        let mut entries = Vec::new();

        for candidate in ranked {
            if self.open.contains_key(&candidate.symbol) {
                debug!(symbol = %candidate.symbol, "Already holding, entry suppressed");
                continue;
            }
            if let Some(max) = self.config.max_open_positions {
                if self.open.len() >= max {
                    info!(max, "Max open positions reached, skipping remaining candidates");
                    break;
                }
            }
            if !candidate.last_price.is_finite() || candidate.last_price <= 0.0 {
                warn!(
                    symbol = %candidate.symbol,
                    price = candidate.last_price,
                    "Unusable entry price"
                );
                continue;
            }

            let quantity = self.config.quantity_for(candidate.last_price);
            let position = Position::open(candidate, quantity, tick_time);
            info!(
                symbol = %position.symbol,
                price = position.entry_price,
                qty = position.quantity,
                volume_ratio = candidate.volume_ratio,
                pct_change = candidate.pct_change,
                "Entry"
            );
            entries.push(EntryEvent::from(&position));
            self.open.insert(position.symbol.clone(), position);
        }

        entries
    }

    /// Track peaks and evaluate exit rules for every open position.
    ///
    /// A position with no usable snapshot this tick is carried forward
    /// unchanged. Returns the outcomes of the positions closed this tick.
    pub fn on_tick(
        &mut self,
        snapshots: &[InstrumentSnapshot],
        tick_time: DateTime<Utc>,
    ) -> Vec<TradeOutcome> {
        let mut latest: HashMap<&str, &InstrumentSnapshot> =
            HashMap::with_capacity(snapshots.len());
        for s in snapshots {
            latest.entry(s.symbol.as_str()).or_insert(s);
        }

        let mut exits: Vec<(String, f64, ExitReason)> = Vec::new();

        for position in self.open.values_mut() {
            let Some(snapshot) = latest.get(position.symbol.as_str()) else {
                debug!(
                    symbol = %position.symbol,
                    "No snapshot this tick, carrying position forward"
                );
                continue;
            };
            if !snapshot.last_price.is_finite() || snapshot.last_price <= 0.0 {
                warn!(
                    symbol = %position.symbol,
                    price = snapshot.last_price,
                    "Unusable price, carrying position forward"
                );
                continue;
            }

            position.peak_price_since_entry =
                position.peak_price_since_entry.max(snapshot.last_price);

            match exit_reason(&self.config, position, snapshot) {
                Some(reason) => exits.push((position.symbol.clone(), snapshot.last_price, reason)),
                None => debug!(
                    symbol = %position.symbol,
                    entry = position.entry_price,
                    price = snapshot.last_price,
                    peak = position.peak_price_since_entry,
                    "Holding"
                ),
            }
        }

        let mut outcomes = Vec::with_capacity(exits.len());
        for (symbol, exit_price, reason) in exits {
            let Some(mut position) = self.open.remove(&symbol) else {
                continue;
            };
            position.state = PositionState::Closed;
            let outcome = TradeOutcome::close(&position, exit_price, tick_time, reason);
            info!(
                symbol = %outcome.symbol,
                reason = %outcome.exit_reason,
                entry = outcome.entry_price,
                exit = outcome.exit_price,
                pnl_pct = outcome.pnl_pct,
                pnl = outcome.pnl_amount,
                "Exit"
            );
            self.closed.push(position);
            self.outcomes.push(outcome.clone());
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Open positions in symbol order.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn open_position(&self, symbol: &str) -> Option<&Position> {
        self.open.get(symbol)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Closed positions, in close order.
    pub fn closed_positions(&self) -> &[Position] {
        &self.closed
    }

    /// Realized outcomes, in close order.
    pub fn history(&self) -> &[TradeOutcome] {
        &self.outcomes
    }

    /// Realized and unrealized P&L, marking open positions at the latest
    /// snapshot price (entry price when the instrument has no snapshot).
    pub fn summary(&self, snapshots: &[InstrumentSnapshot]) -> PnlSummary {
        PnlSummary::compute(self.open.values(), &self.outcomes, snapshots)
    }
}

/// Exit rule for one open position against one snapshot.
/// Stop-loss is checked first and wins when both rules hold.
pub fn exit_reason(
    config: &PositionConfig,
    position: &Position,
    snapshot: &InstrumentSnapshot,
) -> Option<ExitReason> {
    let stop_price = position.entry_price * (1.0 - config.stop_loss_pct);
    if snapshot.last_price <= stop_price {
        return Some(ExitReason::StopLoss);
    }

    // Undefined ratio (no baseline) never signals decay.
    match snapshot.volume_ratio() {
        Some(ratio) if ratio < config.exit_volume_multiplier => Some(ExitReason::VolumeDecay),
        _ => None,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
