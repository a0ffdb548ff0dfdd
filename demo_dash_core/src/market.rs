// Market data abstraction
// The demo implementation fabricates everything from an RNG; tests script it.

use crate::models::{round4, TradeSide};
use crate::settings::MarketSettings;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Quality signals the rug-check gate looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketSignals {
    /// Share of supply held by the largest holder, in percent.
    pub top_holder_pct: u32,
    pub market_cap: i64,
    pub liquidity: i64,
}

/// Source of prices, gate signals and trade signals for a token.
pub trait MarketSource: Send {
    fn price(&mut self, token: &str, cfg: &MarketSettings) -> f64;

    fn signals(&mut self, token: &str, cfg: &MarketSettings) -> MarketSignals;

    /// The side the market "suggests" for this tick.
    fn trade_signal(&mut self, token: &str) -> TradeSide;
}

/// Randomly generated market. Nothing here is a time series: every call is
/// an independent sample.
pub struct DemoMarket {
    rng: StdRng,
}

impl DemoMarket {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl MarketSource for DemoMarket {
    fn price(&mut self, _token: &str, cfg: &MarketSettings) -> f64 {
        let base = self.rng.gen_range(cfg.price_base.0..=cfg.price_base.1);
        let spike = self.rng.gen_range(cfg.price_noise.0..=cfg.price_noise.1);
        round4(base + spike)
    }

    fn signals(&mut self, _token: &str, cfg: &MarketSettings) -> MarketSignals {
        MarketSignals {
            top_holder_pct: self.rng.gen_range(cfg.top_holder_pct.0..=cfg.top_holder_pct.1),
            market_cap: self.rng.gen_range(cfg.marketcap.0..=cfg.marketcap.1),
            liquidity: self.rng.gen_range(cfg.liquidity.0..=cfg.liquidity.1),
        }
    }

    fn trade_signal(&mut self, _token: &str) -> TradeSide {
        if self.rng.gen_bool(0.5) {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        }
    }
}
