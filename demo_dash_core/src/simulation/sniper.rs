use super::{guarded, pick_token, sample_delay, uniform, Guarded, LoopSignal, SimContext};
use crate::error::CoreError;
use crate::gate;
use crate::market::MarketSource;
use crate::models::{TradeOrigin, TradeRecord, TradeSide};
use crate::settings::Settings;
use log::{debug, error, info};
use rand::rngs::StdRng;

/// Prefix on every event-log line the sniper writes.
pub const SNIPER_TAG: &str = "[SNIPER] ";

#[derive(Debug, Clone, PartialEq)]
pub enum SniperTick {
    Sniped(TradeRecord),
    GateFailed,
}

/// One sniper attempt. Sniped buys are recorded with their simulated
/// outcome straight away and never enter the position tracker.
pub async fn sniper_tick<M: MarketSource + ?Sized>(
    ctx: &SimContext,
    settings: &Settings,
    market: &mut M,
    rng: &mut StdRng,
) -> Result<SniperTick, CoreError> {
    let token = pick_token(&settings.tokens, rng);
    let filters = settings.filters();
    if !gate::evaluate(&token, &filters, &settings.simulation, market, &ctx.logs, SNIPER_TAG).await {
        return Ok(SniperTick::GateFailed);
    }

    let sniper = &settings.simulation.sniper;
    let usd = uniform(rng, sniper.amount_usd, "sniper.amount_usd")?;
    let pl = uniform(rng, sniper.pl_percent, "sniper.pl_percent")?;
    let trade = TradeRecord::now(&token, TradeSide::Buy, usd, pl, TradeOrigin::Sniper);

    ctx.logs
        .push(format!(
            "{}🎯 Sniped {} for ${:.2} ({})",
            SNIPER_TAG,
            token,
            trade.usd_amount,
            trade.pl_display()
        ))
        .await;
    ctx.trades.record(trade.clone()).await;
    Ok(SniperTick::Sniped(trade))
}

pub async fn run_sniper_loop<M: MarketSource>(
    ctx: SimContext,
    mut market: M,
    mut rng: StdRng,
    mut signal: LoopSignal,
) {
    let generation = signal.generation();
    info!("Sniper loop #{} running", generation);

    let wallets = ctx.config.snapshot().await.copy_wallets;
    for wallet in &wallets {
        ctx.logs
            .push(format!("{}👀 Watching wallet {} for snipes...", SNIPER_TAG, wallet))
            .await;
    }

    while signal.is_running() {
        let settings = ctx.config.snapshot().await;
        let sniper = &settings.simulation.sniper;

        let delay_range = match guarded(sniper_tick(&ctx, &settings, &mut market, &mut rng)).await {
            Guarded::Done(SniperTick::GateFailed) => sniper.gate_fail_sleep_secs,
            Guarded::Done(SniperTick::Sniped(trade)) => {
                debug!("Sniper loop #{} sniped {}", generation, trade.token);
                sniper.sleep_secs
            }
            Guarded::Failed(e) => {
                error!("Sniper loop #{} iteration failed: {}", generation, e);
                ctx.logs
                    .push(format!("{}⚠️ Iteration failed: {}", SNIPER_TAG, e))
                    .await;
                sniper.sleep_secs
            }
            Guarded::Panicked(msg) => {
                error!("Sniper loop #{} iteration panicked: {}", generation, msg);
                ctx.logs
                    .push(format!("{}⚠️ Iteration crashed: {}", SNIPER_TAG, msg))
                    .await;
                sniper.sleep_secs
            }
        };

        if !signal.sleep(sample_delay(&mut rng, delay_range)).await {
            break;
        }
    }

    info!("Sniper loop #{} exited", generation);
}
