use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest loop sleep accepted from configuration, in seconds.
pub const MAX_SLEEP_SECS: f64 = 3_600.0;

/// Dashboard configuration as persisted in `config.json`.
///
/// Field names on disk keep the dashboard's upper-case keys. Keys this
/// struct does not know about are captured in `extra` and written back
/// untouched, so a save never drops anything that was in the file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(rename = "DEMO_MODE", default = "default_demo_mode")]
    pub demo_mode: bool,
    #[serde(rename = "TAKE_PROFIT", default = "default_take_profit")]
    pub take_profit: i64,
    #[serde(rename = "STOP_LOSS", default = "default_stop_loss")]
    pub stop_loss: i64,
    #[serde(rename = "MARKETCAP_FILTER", default)]
    pub marketcap_filter: i64,
    #[serde(rename = "LIQUIDITY_FILTER", default)]
    pub liquidity_filter: i64,
    #[serde(rename = "TOKENS", default)]
    pub tokens: Vec<String>,
    #[serde(rename = "COPY_WALLETS", default)]
    pub copy_wallets: Vec<String>,
    #[serde(rename = "RPC_URL", default)]
    pub rpc_url: Option<String>,
    #[serde(rename = "SIMULATION", default)]
    pub simulation: SimulationSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tuning knobs for the simulated market and the two trading loops.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationSettings {
    pub log_capacity: usize,
    pub trade_capacity: usize,
    /// Chance that a passing gate on a flat token actually opens a position.
    pub entry_probability: f64,
    pub market: MarketSettings,
    pub gate: GateSettings,
    pub bot: BotLoopSettings,
    pub sniper: SniperLoopSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MarketSettings {
    pub price_base: (f64, f64),
    pub price_noise: (f64, f64),
    pub top_holder_pct: (u32, u32),
    pub marketcap: (i64, i64),
    pub liquidity: (i64, i64),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GateSettings {
    /// Tokens whose top holder owns more than this share are rejected.
    pub max_top_holder_pct: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BotLoopSettings {
    pub amount_usd: (f64, f64),
    pub sleep_secs: (f64, f64),
    pub gate_fail_sleep_secs: (f64, f64),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SniperLoopSettings {
    pub amount_usd: (f64, f64),
    pub pl_percent: (f64, f64),
    pub sleep_secs: (f64, f64),
    pub gate_fail_sleep_secs: (f64, f64),
}

/// The gate's admission thresholds, mutated by `save_filters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(rename = "marketcap")]
    pub marketcap_min: i64,
    #[serde(rename = "liquidity")]
    pub liquidity_min: i64,
}

/// Take-profit and stop-loss thresholds, both positive percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSettings {
    pub take_profit: i64,
    pub stop_loss: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            demo_mode: default_demo_mode(),
            take_profit: default_take_profit(),
            stop_loss: default_stop_loss(),
            marketcap_filter: 0,
            liquidity_filter: 0,
            tokens: Vec::new(),
            copy_wallets: Vec::new(),
            rpc_url: None,
            simulation: SimulationSettings::default(),
            extra: Map::new(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            log_capacity: 100,
            trade_capacity: 50,
            entry_probability: 0.6,
            market: MarketSettings::default(),
            gate: GateSettings::default(),
            bot: BotLoopSettings::default(),
            sniper: SniperLoopSettings::default(),
        }
    }
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            price_base: (0.5, 1.5),
            price_noise: (-0.05, 0.05),
            top_holder_pct: (1, 100),
            marketcap: (10_000, 200_000),
            liquidity: (1_000, 50_000),
        }
    }
}

impl Default for GateSettings {
    fn default() -> Self {
        Self { max_top_holder_pct: 40 }
    }
}

impl Default for BotLoopSettings {
    fn default() -> Self {
        Self {
            amount_usd: (50.0, 500.0),
            sleep_secs: (3.0, 6.0),
            gate_fail_sleep_secs: (5.0, 8.0),
        }
    }
}

impl Default for SniperLoopSettings {
    fn default() -> Self {
        Self {
            amount_usd: (100.0, 800.0),
            pl_percent: (-3.0, 8.0),
            sleep_secs: (5.0, 10.0),
            gate_fail_sleep_secs: (5.0, 8.0),
        }
    }
}

impl Settings {
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn filters(&self) -> Filters {
        Filters {
            marketcap_min: self.marketcap_filter,
            liquidity_min: self.liquidity_filter,
        }
    }

    /// The RPC endpoint, treating a blank `RPC_URL` as not configured.
    pub fn rpc_endpoint(&self) -> Option<&str> {
        self.rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn risk(&self) -> RiskSettings {
        RiskSettings {
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
        }
    }

    /// Validate settings ranges and constraints
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.take_profit <= 0 {
            return Err(CoreError::Validation("take_profit must be > 0".to_string()));
        }
        if self.stop_loss <= 0 {
            return Err(CoreError::Validation("stop_loss must be > 0".to_string()));
        }
        if self.marketcap_filter < 0 {
            return Err(CoreError::Validation("marketcap filter must be >= 0".to_string()));
        }
        if self.liquidity_filter < 0 {
            return Err(CoreError::Validation("liquidity filter must be >= 0".to_string()));
        }
        if let Some(url) = self.rpc_endpoint() {
            let parsed = url::Url::parse(url)?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(CoreError::Validation(format!(
                    "RPC_URL must be http(s), got {}",
                    parsed.scheme()
                )));
            }
        }
        self.simulation.validate()
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.log_capacity == 0 {
            return Err(CoreError::Validation("log_capacity must be > 0".to_string()));
        }
        if self.trade_capacity == 0 {
            return Err(CoreError::Validation("trade_capacity must be > 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.entry_probability) {
            return Err(CoreError::Validation(
                "entry_probability must be within [0, 1]".to_string(),
            ));
        }
        check_range("market.price_base", self.market.price_base)?;
        check_range("market.price_noise", self.market.price_noise)?;
        check_range("market.top_holder_pct", self.market.top_holder_pct)?;
        check_range("market.marketcap", self.market.marketcap)?;
        check_range("market.liquidity", self.market.liquidity)?;
        if self.market.price_base.0 + self.market.price_noise.0 <= 0.0 {
            return Err(CoreError::Validation(
                "market prices must stay above zero".to_string(),
            ));
        }
        check_range("bot.amount_usd", self.bot.amount_usd)?;
        check_range("bot.sleep_secs", self.bot.sleep_secs)?;
        check_range("bot.gate_fail_sleep_secs", self.bot.gate_fail_sleep_secs)?;
        check_range("sniper.amount_usd", self.sniper.amount_usd)?;
        check_range("sniper.pl_percent", self.sniper.pl_percent)?;
        check_range("sniper.sleep_secs", self.sniper.sleep_secs)?;
        check_range("sniper.gate_fail_sleep_secs", self.sniper.gate_fail_sleep_secs)?;
        let sleeps = [
            self.bot.sleep_secs,
            self.bot.gate_fail_sleep_secs,
            self.sniper.sleep_secs,
            self.sniper.gate_fail_sleep_secs,
        ];
        if sleeps
            .iter()
            .any(|(lo, hi)| !(*lo >= 0.0) || !hi.is_finite() || *hi > MAX_SLEEP_SECS)
        {
            return Err(CoreError::Validation(format!(
                "sleep ranges must lie within [0, {}] seconds",
                MAX_SLEEP_SECS
            )));
        }
        Ok(())
    }
}

/// Ensure a `(low, high)` pair is ordered.
pub fn check_range<T: PartialOrd + std::fmt::Debug>(
    name: &str,
    range: (T, T),
) -> Result<(), CoreError> {
    if range.0 > range.1 {
        return Err(CoreError::Validation(format!(
            "{} low bound {:?} exceeds high bound {:?}",
            name, range.0, range.1
        )));
    }
    Ok(())
}

/// Split a comma-separated token list, trimming whitespace and dropping
/// empty entries.
pub fn parse_token_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_demo_mode() -> bool { true }
fn default_take_profit() -> i64 { 50 }
fn default_stop_loss() -> i64 { 20 }
