// Rug-check gate
// Evaluates a token's synthesized quality signals against the configured filters.

use crate::buffer::EventLog;
use crate::market::{MarketSignals, MarketSource};
use crate::settings::{Filters, GateSettings, SimulationSettings};
use std::fmt;

/// Why a token was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateFailure {
    WhaleConcentration { top_holder_pct: u32, max_pct: u32 },
    MarketCapTooLow { market_cap: i64, min: i64 },
    LiquidityTooLow { liquidity: i64, min: i64 },
}

impl fmt::Display for GateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateFailure::WhaleConcentration { top_holder_pct, max_pct } => write!(
                f,
                "top holder owns {}% (max {}%)",
                top_holder_pct, max_pct
            ),
            GateFailure::MarketCapTooLow { market_cap, min } => {
                write!(f, "marketcap too low (${} < ${})", market_cap, min)
            }
            GateFailure::LiquidityTooLow { liquidity, min } => {
                write!(f, "liquidity too low (${} < ${})", liquidity, min)
            }
        }
    }
}

/// Result of one gate evaluation, with the trace the UI shows as reasoning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateEvaluation {
    pub failure: Option<GateFailure>,
    pub messages: Vec<String>,
}

impl GateEvaluation {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Decide pass/fail for `token`. Checks run in a fixed order and stop at the
/// first failure, so a rejected token only carries the trace up to it.
pub fn check_token(
    token: &str,
    signals: &MarketSignals,
    filters: &Filters,
    gate: &GateSettings,
    tag: &str,
) -> GateEvaluation {
    let mut messages = Vec::with_capacity(4);

    messages.push(format!(
        "{}🧪 Rug-check {}: top holder {}% (max {}%)",
        tag, token, signals.top_holder_pct, gate.max_top_holder_pct
    ));
    if signals.top_holder_pct > gate.max_top_holder_pct {
        let failure = GateFailure::WhaleConcentration {
            top_holder_pct: signals.top_holder_pct,
            max_pct: gate.max_top_holder_pct,
        };
        messages.push(format!("{}❌ Rug-check fail {}: {}", tag, token, failure));
        return GateEvaluation { failure: Some(failure), messages };
    }

    messages.push(format!(
        "{}🧪 Rug-check {}: mc=${} (min ${})",
        tag, token, signals.market_cap, filters.marketcap_min
    ));
    if signals.market_cap < filters.marketcap_min {
        let failure = GateFailure::MarketCapTooLow {
            market_cap: signals.market_cap,
            min: filters.marketcap_min,
        };
        messages.push(format!("{}❌ Rug-check fail {}: {}", tag, token, failure));
        return GateEvaluation { failure: Some(failure), messages };
    }

    messages.push(format!(
        "{}🧪 Rug-check {}: liq=${} (min ${})",
        tag, token, signals.liquidity, filters.liquidity_min
    ));
    if signals.liquidity < filters.liquidity_min {
        let failure = GateFailure::LiquidityTooLow {
            liquidity: signals.liquidity,
            min: filters.liquidity_min,
        };
        messages.push(format!("{}❌ Rug-check fail {}: {}", tag, token, failure));
        return GateEvaluation { failure: Some(failure), messages };
    }

    messages.push(format!("{}✅ Rug-check passed for {}", tag, token));
    GateEvaluation { failure: None, messages }
}

/// Sample signals for `token`, run the checks and append the trace to the
/// event log. Returns whether the token passed.
pub async fn evaluate<M: MarketSource + ?Sized>(
    token: &str,
    filters: &Filters,
    sim: &SimulationSettings,
    market: &mut M,
    log: &EventLog,
    tag: &str,
) -> bool {
    let signals = market.signals(token, &sim.market);
    let evaluation = check_token(token, &signals, filters, &sim.gate, tag);
    let passed = evaluation.passed();
    log.push_all(evaluation.messages).await;
    passed
}
