// Cost-basis P&L engine
//
// Consumes classified trades in chronological order and computes realized
// profit/loss per instrument with an average-cost method. The engine itself
// does no sorting; callers sort fills by timestamp before feeding it
// (`realized_pnl_for` does this defensively).

use std::collections::HashMap;

use crate::analytics::types::{NftTrade, TokenTrade, TradeSide};
use crate::logger::{self, LogTag};

/// Per-instrument running position state.
///
/// total_cost always equals total_units times the average acquisition cost;
/// both stay non-negative.
#[derive(Debug, Clone, Default)]
pub struct Position {
    pub total_cost: f64,
    pub total_units: f64,
}

impl Position {
    pub fn average_cost(&self) -> f64 {
        if self.total_units > 0.0 {
            self.total_cost / self.total_units
        } else {
            0.0
        }
    }
}

/// One normalized trade ready for cost-basis accounting.
///
/// The instrument is a fungible mint address or, for NFTs, the collection
/// identifier.
#[derive(Debug, Clone)]
pub struct Fill {
    pub instrument: String,
    pub side: TradeSide,
    pub amount: f64,
    pub price: f64,
    pub timestamp_ms: i64,
}

impl From<&TokenTrade> for Fill {
    fn from(trade: &TokenTrade) -> Self {
        Fill {
            instrument: trade.mint.clone(),
            side: trade.side,
            amount: trade.amount,
            price: trade.price_sol,
            timestamp_ms: trade.timestamp_ms,
        }
    }
}

impl From<&NftTrade> for Fill {
    fn from(trade: &NftTrade) -> Self {
        Fill {
            instrument: trade.collection.clone(),
            side: trade.side,
            amount: 1.0,
            price: trade.price_sol,
            timestamp_ms: trade.timestamp_ms,
        }
    }
}

/// Average-cost realized P&L accumulator
#[derive(Debug, Default)]
pub struct CostBasisEngine {
    positions: HashMap<String, Position>,
    realized_pnl: f64,
}

impl CostBasisEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    /// Apply one fill. Requires chronological input for correct averages.
    pub fn apply(&mut self, fill: &Fill) {
        let position = self.positions.entry(fill.instrument.clone()).or_default();

        match fill.side {
            TradeSide::Buy => {
                position.total_cost += fill.amount * fill.price;
                position.total_units += fill.amount;
            }
            TradeSide::Sell => {
                if position.total_units <= 0.0 {
                    // Sold units that were never tracked (acquired before the
                    // lookback window): zero contribution rather than a guess
                    logger::debug(
                        LogTag::Pnl,
                        &format!("untracked sell ignored for {}", fill.instrument),
                    );
                    return;
                }

                let average_cost = position.total_cost / position.total_units;
                // Upstream inconsistencies can sell more than was tracked;
                // only the tracked portion realizes P&L
                let units = fill.amount.min(position.total_units);
                let proceeds = units * fill.price;
                let cost_basis = units * average_cost;
                self.realized_pnl += proceeds - cost_basis;

                position.total_units -= units;
                position.total_cost = position.total_units * average_cost;
            }
        }
    }
}

/// Realized P&L over a set of fills, sorted chronologically first
pub fn realized_pnl_for(mut fills: Vec<Fill>) -> f64 {
    fills.sort_by_key(|fill| fill.timestamp_ms);

    let mut engine = CostBasisEngine::new();
    for fill in &fills {
        engine.apply(fill);
    }
    engine.realized_pnl()
}
