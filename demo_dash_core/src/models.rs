use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wall-clock stamp used by every user-visible record (`HH:MM:SS`, local).
pub fn clock_stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Round to two decimals, folding `-0.0` into `0.0` so it renders with a `+`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0 + 0.0
}

/// Signed percentage with an explicit `+` for non-negative values.
pub fn format_pl(pl_percent: f64) -> String {
    let pl = round2(pl_percent);
    if pl >= 0.0 {
        format!("+{:.2}%", pl)
    } else {
        format!("{:.2}%", pl)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: clock_stamp(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "Buy"),
            TradeSide::Sell => write!(f, "Sell"),
        }
    }
}

/// Which background loop produced a trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOrigin {
    Bot,
    Sniper,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TradeRecord {
    #[serde(rename = "time")]
    pub timestamp: String,
    pub token: String,
    #[serde(rename = "type")]
    pub side: TradeSide,
    #[serde(rename = "usd")]
    pub usd_amount: f64,
    #[serde(rename = "pl", serialize_with = "serialize_pl")]
    pub pl_percent: f64,
    pub origin: TradeOrigin,
}

impl TradeRecord {
    pub fn now(
        token: impl Into<String>,
        side: TradeSide,
        usd_amount: f64,
        pl_percent: f64,
        origin: TradeOrigin,
    ) -> Self {
        Self {
            timestamp: clock_stamp(),
            token: token.into(),
            side,
            usd_amount: round2(usd_amount),
            pl_percent: round2(pl_percent),
            origin,
        }
    }

    pub fn pl_display(&self) -> String {
        format_pl(self.pl_percent)
    }
}

fn serialize_pl<S: Serializer>(pl: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_pl(*pl))
}

/// An open simulated long.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub token: String,
    pub entry_price: f64,
    pub usd_amount: f64,
    pub opened_at: DateTime<Utc>,
}

/// A row of the copy-wallet table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletStats {
    pub address: String,
    pub trades: u64,
    pub profit: f64,
    pub pl: String,
}

impl WalletStats {
    pub fn watching(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            trades: 0,
            profit: 0.0,
            pl: format_pl(0.0),
        }
    }

    /// Placeholder rows shown before any copy wallet is configured.
    pub fn demo_rows() -> Vec<WalletStats> {
        vec![
            WalletStats {
                address: "Wallet1...abc".to_string(),
                trades: 45,
                profit: 230.0,
                pl: "+10%".to_string(),
            },
            WalletStats {
                address: "Wallet2...xyz".to_string(),
                trades: 32,
                profit: -50.0,
                pl: "-3%".to_string(),
            },
        ]
    }
}

/// Display record for `/tokens`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenView {
    pub name: String,
    pub address: String,
    pub price: f64,
    pub volume: u64,
}

impl TokenView {
    pub fn placeholder(address: impl Into<String>) -> Self {
        Self {
            name: "DemoToken".to_string(),
            address: address.into(),
            price: round4(1.23),
            volume: 12345,
        }
    }
}
