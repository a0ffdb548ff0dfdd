use crate::models::Position;
use crate::settings::RiskSettings;

#[derive(Debug, Clone, PartialEq)]
pub enum TradeAction {
    Hold,
    Close(ExitReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    TakeProfit(f64), // change_percent
    StopLoss(f64),   // change_percent
}

impl ExitReason {
    pub fn change_percent(&self) -> f64 {
        match self {
            ExitReason::TakeProfit(pct) | ExitReason::StopLoss(pct) => *pct,
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::TakeProfit(pct) => write!(f, "TP ({:+.2}%)", pct),
            ExitReason::StopLoss(pct) => write!(f, "SL ({:+.2}%)", pct),
        }
    }
}

/// Percent change from `entry` to `current`.
pub fn change_percent(entry_price: f64, current_price: f64) -> f64 {
    if entry_price == 0.0 {
        return 0.0;
    }
    ((current_price - entry_price) / entry_price) * 100.0
}

/// Decide whether an open position should be closed at `current_price`.
/// `stop_loss` is a positive percentage; the position closes once the loss
/// reaches it.
pub fn evaluate_position(position: &Position, current_price: f64, risk: &RiskSettings) -> TradeAction {
    let change = change_percent(position.entry_price, current_price);

    if change >= risk.take_profit as f64 {
        TradeAction::Close(ExitReason::TakeProfit(change))
    } else if change <= -(risk.stop_loss as f64) {
        TradeAction::Close(ExitReason::StopLoss(change))
    } else {
        TradeAction::Hold
    }
}
