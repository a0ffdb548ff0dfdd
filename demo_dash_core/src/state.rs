// Application state shared by the HTTP handlers and the background loops.

use crate::buffer::{EventLog, TradeLedger};
use crate::config_store::ConfigStore;
use crate::error::CoreError;
use crate::market::{DemoMarket, MarketSource};
use crate::models::{LogEntry, TokenView, TradeRecord, WalletStats};
use crate::positions::PositionTracker;
use crate::rpc_client::RpcProbe;
use crate::settings::{parse_token_list, Filters, RiskSettings, Settings};
use crate::simulation::{run_bot_loop, run_sniper_loop, LoopController, SimContext, SNIPER_TAG};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BotStatus {
    pub demo: bool,
    pub running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardStatus {
    pub demo: bool,
    pub running: bool,
    pub sniper: bool,
}

/// Everything the dashboard owns. Built once at startup and shared behind
/// an `Arc`; each field carries its own lock.
pub struct DashboardState {
    sim: SimContext,
    bot: LoopController,
    sniper: LoopController,
    rpc: RpcProbe,
}

impl DashboardState {
    pub async fn new(config: ConfigStore, rpc_timeout: Duration) -> Result<Self, CoreError> {
        let settings = config.snapshot().await;
        let sim = SimContext {
            config: Arc::new(config),
            logs: Arc::new(EventLog::new(settings.simulation.log_capacity)),
            trades: Arc::new(TradeLedger::new(settings.simulation.trade_capacity)),
            positions: Arc::new(PositionTracker::new()),
        };
        sim.logs.push("✅ Dashboard initialized").await;

        Ok(Self {
            sim,
            bot: LoopController::new("bot"),
            sniper: LoopController::new("sniper"),
            rpc: RpcProbe::new(rpc_timeout)?,
        })
    }

    pub fn context(&self) -> &SimContext {
        &self.sim
    }

    pub async fn settings(&self) -> Settings {
        self.sim.config.snapshot().await
    }

    pub async fn status(&self) -> DashboardStatus {
        DashboardStatus {
            demo: self.settings().await.demo_mode,
            running: self.bot.is_enabled(),
            sniper: self.sniper.is_enabled(),
        }
    }

    pub async fn toggle_demo(&self) -> Result<BotStatus, CoreError> {
        let updated = self.sim.config.update(|s| s.demo_mode = !s.demo_mode).await?;
        info!("Demo mode set to {}", updated.demo_mode);
        Ok(BotStatus {
            demo: updated.demo_mode,
            running: self.bot.is_enabled(),
        })
    }

    /// Start or stop the standard loop against a fresh random market.
    pub async fn toggle_bot(&self) -> BotStatus {
        self.toggle_bot_with(DemoMarket::from_entropy(), StdRng::from_entropy())
            .await
    }

    /// Like [`toggle_bot`](Self::toggle_bot) but trades against `market`
    /// with `rng` if this call starts the loop.
    pub async fn toggle_bot_with<M: MarketSource + 'static>(&self, market: M, rng: StdRng) -> BotStatus {
        let ctx = self.sim.clone();
        let (running, generation) = self
            .bot
            .toggle(move |signal| async move {
                ctx.logs
                    .push(format!("✅ Bot started (loop #{})", signal.generation()))
                    .await;
                run_bot_loop(ctx, market, rng, signal).await;
            })
            .await;
        if !running {
            self.sim
                .logs
                .push(format!("⏹️ Bot stopped (loop #{})", generation))
                .await;
        }
        BotStatus {
            demo: self.settings().await.demo_mode,
            running,
        }
    }

    pub async fn toggle_sniper(&self) -> bool {
        self.toggle_sniper_with(DemoMarket::from_entropy(), StdRng::from_entropy())
            .await
    }

    pub async fn toggle_sniper_with<M: MarketSource + 'static>(&self, market: M, rng: StdRng) -> bool {
        let ctx = self.sim.clone();
        let (enabled, generation) = self
            .sniper
            .toggle(move |signal| async move {
                ctx.logs
                    .push(format!("{}🎯 Sniper enabled (loop #{})", SNIPER_TAG, signal.generation()))
                    .await;
                run_sniper_loop(ctx, market, rng, signal).await;
            })
            .await;
        if !enabled {
            self.sim
                .logs
                .push(format!("{}⏹️ Sniper disabled (loop #{})", SNIPER_TAG, generation))
                .await;
        }
        enabled
    }

    /// Stop both loops and wait for them to exit.
    pub async fn shutdown(&self) {
        self.bot.stop().await;
        self.sniper.stop().await;
    }

    pub async fn risk(&self) -> RiskSettings {
        self.settings().await.risk()
    }

    pub async fn filters(&self) -> Filters {
        self.settings().await.filters()
    }

    /// Update whichever thresholds are given and persist.
    pub async fn save_risk(
        &self,
        take_profit: Option<i64>,
        stop_loss: Option<i64>,
    ) -> Result<RiskSettings, CoreError> {
        let updated = self
            .sim
            .config
            .update(|s| {
                if let Some(tp) = take_profit {
                    s.take_profit = tp;
                }
                if let Some(sl) = stop_loss {
                    s.stop_loss = sl;
                }
            })
            .await?;
        let risk = updated.risk();
        self.sim
            .logs
            .push(format!(
                "⚙️ Risk settings updated: TP {}%, SL {}%",
                risk.take_profit, risk.stop_loss
            ))
            .await;
        Ok(risk)
    }

    pub async fn save_filters(
        &self,
        marketcap: Option<i64>,
        liquidity: Option<i64>,
    ) -> Result<Filters, CoreError> {
        let updated = self
            .sim
            .config
            .update(|s| {
                if let Some(mc) = marketcap {
                    s.marketcap_filter = mc;
                }
                if let Some(liq) = liquidity {
                    s.liquidity_filter = liq;
                }
            })
            .await?;
        let filters = updated.filters();
        self.sim
            .logs
            .push(format!(
                "⚙️ Filters updated: marketcap >= ${}, liquidity >= ${}",
                filters.marketcap_min, filters.liquidity_min
            ))
            .await;
        Ok(filters)
    }

    /// Replace the token list from a comma-separated string.
    pub async fn update_tokens(&self, raw: &str) -> Result<Vec<String>, CoreError> {
        let tokens = parse_token_list(raw);
        let updated = self
            .sim
            .config
            .update(|s| s.tokens = tokens)
            .await?;
        self.sim
            .logs
            .push(format!("⚙️ Tokens updated: {}", updated.tokens.join(", ")))
            .await;
        Ok(updated.tokens)
    }

    pub async fn trades(&self) -> Vec<TradeRecord> {
        self.sim.trades.snapshot().await
    }

    pub async fn logs(&self) -> Vec<LogEntry> {
        self.sim.logs.snapshot().await
    }

    pub async fn wallets(&self) -> Vec<WalletStats> {
        let mut rows = WalletStats::demo_rows();
        rows.extend(
            self.settings()
                .await
                .copy_wallets
                .into_iter()
                .map(WalletStats::watching),
        );
        rows
    }

    pub async fn tokens(&self) -> Vec<TokenView> {
        self.settings()
            .await
            .tokens
            .into_iter()
            .map(TokenView::placeholder)
            .collect()
    }

    /// Ask the configured RPC node for its current slot.
    pub async fn test_rpc(&self) -> Result<Value, CoreError> {
        let settings = self.settings().await;
        let url = settings
            .rpc_endpoint()
            .ok_or_else(|| CoreError::Config("RPC_URL not configured".to_string()))?;
        self.rpc.get_slot(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeSide;
    use crate::simulation::testing::{fast_settings, ScriptedMarket};
    use std::collections::HashSet;
    use tempfile::TempDir;

    async fn state_with(settings: Settings) -> DashboardState {
        DashboardState::new(ConfigStore::in_memory(settings), Duration::from_secs(1))
            .await
            .unwrap()
    }

    async fn messages(state: &DashboardState) -> Vec<String> {
        state.logs().await.into_iter().map(|e| e.message).collect()
    }

    #[tokio::test]
    async fn starts_with_init_entry() {
        let state = state_with(Settings::default()).await;
        assert_eq!(messages(&state).await, vec!["✅ Dashboard initialized"]);
        assert_eq!(
            state.status().await,
            DashboardStatus { demo: true, running: false, sniper: false }
        );
    }

    fn roomy_settings(tokens: &[&str]) -> Settings {
        let mut settings = fast_settings(tokens);
        settings.simulation.log_capacity = 1_000;
        settings
    }

    #[tokio::test]
    async fn bot_start_and_stop_markers() {
        let state = state_with(roomy_settings(&["A", "B"])).await;

        let started = state.toggle_bot_with(DemoMarket::seeded(1), StdRng::seed_from_u64(1)).await;
        assert!(started.running);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(messages(&state).await.contains(&"✅ Bot started (loop #1)".to_string()));

        let stopped = state.toggle_bot().await;
        assert!(!stopped.running);
        let after_stop = messages(&state).await;
        assert_eq!(after_stop.last().unwrap(), "⏹️ Bot stopped (loop #1)");

        let trades = state.trades().await.len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(messages(&state).await, after_stop);
        assert_eq!(state.trades().await.len(), trades);
    }

    #[tokio::test]
    async fn concurrent_toggles_leave_one_loop_and_no_duplicate_trades() {
        let mut settings = roomy_settings(&["A", "B", "C"]);
        settings.simulation.gate.max_top_holder_pct = 100;
        settings.simulation.bot.sleep_secs = (0.02, 0.02);
        let state = Arc::new(state_with(settings).await);

        let mut handles = Vec::new();
        for seed in 0..3u64 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                state
                    .toggle_bot_with(ScriptedMarket::new(&[1.0], TradeSide::Buy), StdRng::seed_from_u64(seed))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // on, off, on: one loop left, on its second generation
        assert!(state.status().await.running);
        assert_eq!(state.bot.live_tasks(), 1);
        assert_eq!(state.bot.generation(), 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        state.shutdown().await;

        let trades = state.trades().await;
        assert!(!trades.is_empty());
        let mut seen = HashSet::new();
        for t in &trades {
            assert!(
                seen.insert((t.timestamp.clone(), t.token.clone(), t.side)),
                "duplicate trade {:?}",
                t
            );
        }
        // a flat price never closes, so each token is bought at most once
        assert!(trades.iter().all(|t| t.side == TradeSide::Buy));
        assert!(trades.len() <= 3);
    }

    #[tokio::test]
    async fn bot_and_sniper_run_side_by_side() {
        let state = state_with(roomy_settings(&["A"])).await;
        state.toggle_bot_with(DemoMarket::seeded(4), StdRng::seed_from_u64(4)).await;
        assert!(state.toggle_sniper_with(DemoMarket::seeded(5), StdRng::seed_from_u64(5)).await);
        assert_eq!(
            state.status().await,
            DashboardStatus { demo: true, running: true, sniper: true }
        );

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!state.toggle_sniper().await);
        assert!(state.status().await.running);
        state.shutdown().await;
        assert!(!state.status().await.running);

        let log = messages(&state).await;
        assert!(log.iter().any(|m| m.starts_with("[SNIPER] 🎯 Sniper enabled")));
        assert!(log.iter().any(|m| m.starts_with("[SNIPER] ⏹️ Sniper disabled")));
        assert!(log
            .iter()
            .filter(|m| m.contains(SNIPER_TAG.trim_end()) || m.contains("Sniped") || m.contains("Sniper "))
            .all(|m| m.starts_with(SNIPER_TAG)));
    }

    #[tokio::test]
    async fn risk_round_trip_is_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::load(&path).await.unwrap();
        let state = DashboardState::new(store, Duration::from_secs(1)).await.unwrap();

        let risk = state.save_risk(Some(10), Some(5)).await.unwrap();
        assert_eq!(risk, RiskSettings { take_profit: 10, stop_loss: 5 });
        assert_eq!(state.risk().await, risk);

        let partial = state.save_risk(None, Some(7)).await.unwrap();
        assert_eq!(partial, RiskSettings { take_profit: 10, stop_loss: 7 });

        let on_disk = ConfigStore::load(&path).await.unwrap().snapshot().await;
        assert_eq!(on_disk.risk(), partial);
        assert!(messages(&state).await.iter().any(|m| m.starts_with("⚙️ Risk settings updated")));
    }

    #[tokio::test]
    async fn rejected_risk_leaves_settings_alone() {
        let state = state_with(Settings::default()).await;
        assert!(state.save_risk(Some(-5), None).await.is_err());
        assert_eq!(state.risk().await.take_profit, 50);
    }

    #[tokio::test]
    async fn filters_and_tokens_update() {
        let state = state_with(Settings::default()).await;
        let filters = state.save_filters(Some(20_000), None).await.unwrap();
        assert_eq!(filters, Filters { marketcap_min: 20_000, liquidity_min: 0 });

        let tokens = state.update_tokens("A, B ,C").await.unwrap();
        assert_eq!(tokens, vec!["A", "B", "C"]);
        let views = state.tokens().await;
        assert_eq!(views.len(), 3);
        assert_eq!(views[1].address, "B");
        assert_eq!(views[1].name, "DemoToken");
    }

    #[tokio::test]
    async fn wallets_list_demo_rows_then_copy_wallets() {
        let mut settings = Settings::default();
        settings.copy_wallets = vec!["Copy1".to_string()];
        let state = state_with(settings).await;
        let wallets = state.wallets().await;
        assert_eq!(wallets.len(), 3);
        assert_eq!(wallets[0].address, "Wallet1...abc");
        assert_eq!(wallets[2].address, "Copy1");
        assert_eq!(wallets[2].trades, 0);
    }

    #[tokio::test]
    async fn rpc_without_url_is_a_config_error() {
        let state = state_with(Settings::default()).await;
        assert!(matches!(state.test_rpc().await, Err(CoreError::Config(_))));
    }

    #[tokio::test]
    async fn blank_rpc_url_in_file_loads_and_reports_unset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"RPC_URL": "", "TOKENS": ["A"]}"#).unwrap();

        let store = ConfigStore::load(&path).await.unwrap();
        let state = DashboardState::new(store, Duration::from_secs(1)).await.unwrap();
        match state.test_rpc().await {
            Err(CoreError::Config(msg)) => assert!(msg.contains("RPC_URL not configured")),
            other => panic!("expected a config error, got {:?}", other),
        }

        // later mutations still validate with the blank URL in place
        state.save_risk(Some(10), None).await.unwrap();
        let on_disk = ConfigStore::load(&path).await.unwrap().snapshot().await;
        assert_eq!(on_disk.rpc_url.as_deref(), Some(""));
        assert_eq!(on_disk.take_profit, 10);
    }

    #[tokio::test]
    async fn demo_toggle_flips_and_reports_bot() {
        let state = state_with(Settings::default()).await;
        let status = state.toggle_demo().await.unwrap();
        assert_eq!(status, BotStatus { demo: false, running: false });
        assert!(state.toggle_demo().await.unwrap().demo);
    }
}
