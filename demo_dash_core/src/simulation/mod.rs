// Background trading simulation
// The standard bot loop, the sniper loop and the controller that supervises them.

mod bot_loop;
mod controller;
mod sniper;

pub use bot_loop::{bot_tick, run_bot_loop, BotTick};
pub use controller::{LoopController, LoopSignal};
pub use sniper::{run_sniper_loop, sniper_tick, SniperTick, SNIPER_TAG};

use crate::buffer::{EventLog, TradeLedger};
use crate::config_store::ConfigStore;
use crate::error::CoreError;
use crate::positions::PositionTracker;
use crate::settings::MAX_SLEEP_SECS;
use futures_util::FutureExt;
use rand::seq::SliceRandom;
use rand::Rng;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Token used when no tokens are configured.
pub const FALLBACK_TOKEN: &str = "DEMO";

/// Shared state the loops read and write.
#[derive(Clone)]
pub struct SimContext {
    pub config: Arc<ConfigStore>,
    pub logs: Arc<EventLog>,
    pub trades: Arc<TradeLedger>,
    pub positions: Arc<PositionTracker>,
}

pub(crate) fn pick_token<R: Rng>(tokens: &[String], rng: &mut R) -> String {
    tokens
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| FALLBACK_TOKEN.to_string())
}

pub(crate) fn uniform<R: Rng>(rng: &mut R, range: (f64, f64), name: &str) -> Result<f64, CoreError> {
    if !(range.0 <= range.1) {
        return Err(CoreError::Simulation(format!(
            "{} range [{}, {}] is empty",
            name, range.0, range.1
        )));
    }
    Ok(rng.gen_range(range.0..=range.1))
}

/// Sample a sleep from `range` (seconds). Never fails: a misordered range is
/// swapped and both ends are clamped to `[0, MAX_SLEEP_SECS]`.
pub(crate) fn sample_delay<R: Rng>(rng: &mut R, range: (f64, f64)) -> Duration {
    let (lo, hi) = if range.0 <= range.1 { range } else { (range.1, range.0) };
    let lo = if lo.is_nan() { 0.0 } else { lo.clamp(0.0, MAX_SLEEP_SECS) };
    let hi = if hi.is_nan() { lo } else { hi.clamp(lo, MAX_SLEEP_SECS) };
    Duration::from_secs_f64(rng.gen_range(lo..=hi))
}

/// Outcome of one guarded iteration.
pub(crate) enum Guarded<T> {
    Done(T),
    Failed(CoreError),
    Panicked(String),
}

/// Run one loop iteration, turning both errors and panics into values so the
/// loop itself never dies.
pub(crate) async fn guarded<T, Fut>(iteration: Fut) -> Guarded<T>
where
    Fut: Future<Output = Result<T, CoreError>>,
{
    match AssertUnwindSafe(iteration).catch_unwind().await {
        Ok(Ok(value)) => Guarded::Done(value),
        Ok(Err(e)) => Guarded::Failed(e),
        Err(payload) => Guarded::Panicked(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
