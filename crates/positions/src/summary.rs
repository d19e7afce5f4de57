use std::collections::HashMap;

use serde::Serialize;

use common::{pct_return, InstrumentSnapshot, Position, TradeOutcome};

/// Mark-to-market view of one open position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionMark {
    pub symbol: String,
    pub quantity: u64,
    pub entry_price: f64,
    /// Latest snapshot price, or the entry price when none is available.
    pub mark_price: f64,
    pub unrealized_amount: f64,
    pub unrealized_pct: f64,
}

/// Session P&L at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct PnlSummary {
    pub marks: Vec<PositionMark>,
    pub closed_trades: usize,
    pub realized_amount: f64,
    pub unrealized_amount: f64,
    /// Sum of entry notionals of the open positions.
    pub capital_in_use: f64,
}

impl PnlSummary {
    pub fn compute<'a>(
        open: impl IntoIterator<Item = &'a Position>,
        outcomes: &[TradeOutcome],
        snapshots: &[InstrumentSnapshot],
    ) -> Self {
        let prices: HashMap<&str, f64> = snapshots
            .iter()
            .filter(|s| s.last_price.is_finite() && s.last_price > 0.0)
            .map(|s| (s.symbol.as_str(), s.last_price))
            .collect();

        let marks: Vec<PositionMark> = open
            .into_iter()
            .map(|p| {
                let mark_price = prices.get(p.symbol.as_str()).copied().unwrap_or(p.entry_price);
                PositionMark {
                    symbol: p.symbol.clone(),
                    quantity: p.quantity,
                    entry_price: p.entry_price,
                    mark_price,
                    unrealized_amount: p.unrealized_amount(mark_price),
                    unrealized_pct: pct_return(p.entry_price, mark_price),
                }
            })
            .collect();

        Self {
            closed_trades: outcomes.len(),
            realized_amount: outcomes.iter().map(|o| o.pnl_amount).sum(),
            unrealized_amount: marks.iter().map(|m| m.unrealized_amount).sum(),
            capital_in_use: marks.iter().map(|m| m.entry_price * m.quantity as f64).sum(),
            marks,
        }
    }

    pub fn open_positions(&self) -> usize {
        self.marks.len()
    }

    pub fn total_amount(&self) -> f64 {
        self.realized_amount + self.unrealized_amount
    }
}
