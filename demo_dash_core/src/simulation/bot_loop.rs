use super::{guarded, pick_token, sample_delay, uniform, Guarded, LoopSignal, SimContext};
use crate::error::CoreError;
use crate::gate;
use crate::market::MarketSource;
use crate::models::{format_pl, round2, Position, TradeOrigin, TradeRecord, TradeSide};
use crate::settings::Settings;
use crate::strategy::{evaluate_position, ExitReason, TradeAction};
use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::Rng;

/// What a single bot iteration did.
#[derive(Debug, Clone, PartialEq)]
pub enum BotTick {
    Opened(Position),
    Closed { token: String, reason: ExitReason },
    Held,
    GateFailed,
    EntrySkipped,
    /// Sell signal on a token we do not hold.
    Idle,
}

/// One pass of the standard loop: pick a token, sample a price, then either
/// manage its open position or try to open one.
pub async fn bot_tick<M: MarketSource + ?Sized>(
    ctx: &SimContext,
    settings: &Settings,
    market: &mut M,
    rng: &mut StdRng,
) -> Result<BotTick, CoreError> {
    let token = pick_token(&settings.tokens, rng);
    let price = market.price(&token, &settings.simulation.market);
    if price <= 0.0 {
        return Err(CoreError::Simulation(format!("non-positive price {} for {}", price, token)));
    }

    if let Some(position) = ctx.positions.get(&token).await {
        return match evaluate_position(&position, price, &settings.risk()) {
            TradeAction::Hold => Ok(BotTick::Held),
            TradeAction::Close(reason) => close_position(ctx, position, price, reason).await,
        };
    }

    if market.trade_signal(&token) == TradeSide::Sell {
        debug!("No open position in {}, ignoring sell signal", token);
        return Ok(BotTick::Idle);
    }

    let filters = settings.filters();
    if !gate::evaluate(&token, &filters, &settings.simulation, market, &ctx.logs, "").await {
        return Ok(BotTick::GateFailed);
    }

    let roll: f64 = rng.gen();
    if roll >= settings.simulation.entry_probability {
        ctx.logs
            .push(format!("⏭️ Entry skipped for {} (roll {:.2})", token, roll))
            .await;
        return Ok(BotTick::EntrySkipped);
    }

    let usd = round2(uniform(rng, settings.simulation.bot.amount_usd, "bot.amount_usd")?);
    let Some(position) = ctx.positions.open(&token, price, usd).await else {
        return Ok(BotTick::Held);
    };

    let trade = TradeRecord::now(&token, TradeSide::Buy, usd, 0.0, TradeOrigin::Bot);
    ctx.trades.record(trade).await;
    ctx.logs
        .push(format!("🟢 Buy signal {} @ {:.4} for ${:.2}", token, price, usd))
        .await;
    Ok(BotTick::Opened(position))
}

async fn close_position(
    ctx: &SimContext,
    position: Position,
    price: f64,
    reason: ExitReason,
) -> Result<BotTick, CoreError> {
    if ctx.positions.close(&position.token).await.is_none() {
        return Ok(BotTick::Held);
    }
    let change = reason.change_percent();
    let proceeds = position.usd_amount * (1.0 + change / 100.0);
    let trade = TradeRecord::now(&position.token, TradeSide::Sell, proceeds, change, TradeOrigin::Bot);
    let label = match reason {
        ExitReason::TakeProfit(_) => "💰 Take-profit",
        ExitReason::StopLoss(_) => "🛑 Stop-loss",
    };
    ctx.logs
        .push(format!(
            "{} {} @ {:.4} ({}), sold for ${:.2}",
            label,
            position.token,
            price,
            format_pl(change),
            trade.usd_amount
        ))
        .await;
    ctx.trades.record(trade).await;
    Ok(BotTick::Closed {
        token: position.token,
        reason,
    })
}

/// Run the standard loop until `signal` says stop. Failures inside an
/// iteration are logged and the loop carries on.
pub async fn run_bot_loop<M: MarketSource>(
    ctx: SimContext,
    mut market: M,
    mut rng: StdRng,
    mut signal: LoopSignal,
) {
    let generation = signal.generation();
    info!("Bot loop #{} running", generation);

    while signal.is_running() {
        let settings = ctx.config.snapshot().await;
        let outcome = guarded(bot_tick(&ctx, &settings, &mut market, &mut rng)).await;

        let delay_range = match outcome {
            Guarded::Done(BotTick::GateFailed) => settings.simulation.bot.gate_fail_sleep_secs,
            Guarded::Done(tick) => {
                debug!("Bot loop #{} tick: {:?}", generation, tick);
                settings.simulation.bot.sleep_secs
            }
            Guarded::Failed(e) => {
                error!("Bot loop #{} iteration failed: {}", generation, e);
                ctx.logs.push(format!("⚠️ Bot iteration failed: {}", e)).await;
                settings.simulation.bot.sleep_secs
            }
            Guarded::Panicked(msg) => {
                error!("Bot loop #{} iteration panicked: {}", generation, msg);
                ctx.logs.push(format!("⚠️ Bot iteration crashed: {}", msg)).await;
                settings.simulation.bot.sleep_secs
            }
        };

        let delay = sample_delay(&mut rng, delay_range);
        if !signal.sleep(delay).await {
            break;
        }
    }

    info!("Bot loop #{} exited", generation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::testing::{context, fast_settings, messages, ScriptedMarket};
    use crate::simulation::LoopController;
    use rand::SeedableRng;
    use std::time::Duration;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(5)
    }

    #[tokio::test]
    async fn flat_token_opens_then_takes_profit() {
        let settings = fast_settings(&["A"]);
        let ctx = context(settings.clone());
        let mut market = ScriptedMarket::new(&[1.0, 1.6], TradeSide::Buy);
        let mut rng = rng();

        let first = bot_tick(&ctx, &settings, &mut market, &mut rng).await.unwrap();
        match first {
            BotTick::Opened(p) => {
                assert_eq!(p.token, "A");
                assert_eq!(p.entry_price, 1.0);
            }
            other => panic!("expected open, got {:?}", other),
        }
        assert!(ctx.positions.is_open("A").await);
        assert_eq!(ctx.trades.len().await, 1);

        let second = bot_tick(&ctx, &settings, &mut market, &mut rng).await.unwrap();
        assert!(matches!(second, BotTick::Closed { reason: ExitReason::TakeProfit(_), .. }));
        assert!(!ctx.positions.is_open("A").await);

        let trades = ctx.trades.snapshot().await;
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert_eq!(trades[0].pl_display(), "+0.00%");
        assert_eq!(trades[1].side, TradeSide::Sell);
        assert_eq!(trades[1].pl_display(), "+60.00%");
        assert_eq!(trades[1].usd_amount, round2(trades[0].usd_amount * 1.6));

        let log = messages(&ctx).await;
        assert!(log.iter().any(|m| m.starts_with("🟢 Buy signal A")));
        assert!(log.iter().any(|m| m.starts_with("💰 Take-profit A")));
    }

    #[tokio::test]
    async fn stop_loss_closes_position() {
        let settings = fast_settings(&["A"]);
        let ctx = context(settings.clone());
        let mut market = ScriptedMarket::new(&[1.0, 0.7], TradeSide::Buy);
        let mut rng = rng();

        bot_tick(&ctx, &settings, &mut market, &mut rng).await.unwrap();
        let tick = bot_tick(&ctx, &settings, &mut market, &mut rng).await.unwrap();
        assert!(matches!(tick, BotTick::Closed { reason: ExitReason::StopLoss(_), .. }));
        assert_eq!(ctx.positions.len().await, 0);
        let trades = ctx.trades.snapshot().await;
        assert_eq!(trades[1].pl_display(), "-30.00%");
        assert!(messages(&ctx).await.iter().any(|m| m.starts_with("🛑 Stop-loss A")));
    }

    #[tokio::test]
    async fn holding_between_thresholds_is_silent() {
        let settings = fast_settings(&["A"]);
        let ctx = context(settings.clone());
        let mut market = ScriptedMarket::new(&[1.0, 1.1], TradeSide::Buy);
        let mut rng = rng();

        bot_tick(&ctx, &settings, &mut market, &mut rng).await.unwrap();
        let logs_before = ctx.logs.len().await;
        let tick = bot_tick(&ctx, &settings, &mut market, &mut rng).await.unwrap();
        assert_eq!(tick, BotTick::Held);
        assert_eq!(ctx.logs.len().await, logs_before);
        assert_eq!(ctx.trades.len().await, 1);
        assert!(ctx.positions.is_open("A").await);
    }

    #[tokio::test]
    async fn failed_gate_opens_nothing() {
        let settings = fast_settings(&["A"]);
        let ctx = context(settings.clone());
        let mut market = ScriptedMarket::new(&[1.0], TradeSide::Buy);
        market.signals.top_holder_pct = 95;
        let mut rng = rng();

        let tick = bot_tick(&ctx, &settings, &mut market, &mut rng).await.unwrap();
        assert_eq!(tick, BotTick::GateFailed);
        assert_eq!(ctx.positions.len().await, 0);
        assert_eq!(ctx.trades.len().await, 0);
        let log = messages(&ctx).await;
        assert_eq!(log.len(), 2);
        assert!(log[1].contains("Rug-check fail A"));
    }

    #[tokio::test]
    async fn sell_signal_on_flat_token_is_ignored() {
        let settings = fast_settings(&["A"]);
        let ctx = context(settings.clone());
        let mut market = ScriptedMarket::new(&[1.0], TradeSide::Sell);
        let tick = bot_tick(&ctx, &settings, &mut market, &mut rng()).await.unwrap();
        assert_eq!(tick, BotTick::Idle);
        assert_eq!(ctx.logs.len().await, 0);
    }

    #[tokio::test]
    async fn losing_entry_roll_skips() {
        let mut settings = fast_settings(&["A"]);
        settings.simulation.entry_probability = 0.0;
        let ctx = context(settings.clone());
        let mut market = ScriptedMarket::new(&[1.0], TradeSide::Buy);
        let tick = bot_tick(&ctx, &settings, &mut market, &mut rng()).await.unwrap();
        assert_eq!(tick, BotTick::EntrySkipped);
        assert_eq!(ctx.positions.len().await, 0);
    }

    #[tokio::test]
    async fn no_tokens_trades_demo() {
        let settings = fast_settings(&[]);
        let ctx = context(settings.clone());
        let mut market = ScriptedMarket::new(&[1.0], TradeSide::Buy);
        let tick = bot_tick(&ctx, &settings, &mut market, &mut rng()).await.unwrap();
        assert!(matches!(tick, BotTick::Opened(p) if p.token == "DEMO"));
    }

    #[tokio::test]
    async fn loop_survives_failing_iterations() {
        let mut settings = fast_settings(&["A"]);
        settings.simulation.bot.amount_usd = (500.0, 50.0);
        let ctx = context(settings);
        let ctl = LoopController::new("bot");

        let loop_ctx = ctx.clone();
        ctl.start(move |signal| {
            run_bot_loop(loop_ctx, ScriptedMarket::new(&[1.0], TradeSide::Buy), StdRng::seed_from_u64(3), signal)
        })
        .await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(ctl.live_tasks(), 1);
        ctl.stop().await;

        let failures = messages(&ctx)
            .await
            .into_iter()
            .filter(|m| m.contains("Bot iteration failed"))
            .count();
        assert!(failures >= 2, "expected repeated failures, saw {}", failures);
        assert_eq!(ctx.trades.len().await, 0);
    }
}
