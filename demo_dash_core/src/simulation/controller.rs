// Supervised task slot for one kind of background loop.

use log::{error, info};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Handed to a loop when it is spawned. The loop polls it at every
/// iteration boundary and sleeps through it so a stop wakes it up.
#[derive(Debug, Clone)]
pub struct LoopSignal {
    generation: u64,
    rx: watch::Receiver<bool>,
}

impl LoopSignal {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `duration`, returning early if the loop is told to stop.
    /// Returns whether the loop should keep going.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if !self.is_running() {
            return false;
        }
        let sender_gone = tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            changed = self.rx.changed() => changed.is_err(),
        };
        !sender_gone && self.is_running()
    }
}

struct ActiveLoop {
    generation: u64,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owns at most one running task for a loop kind. Start and stop are
/// serialized on the slot lock, and stop joins the task before releasing
/// it, so a quick off/on can never leave two loops alive.
pub struct LoopController {
    name: &'static str,
    slot: Mutex<Option<ActiveLoop>>,
    enabled: AtomicBool,
    generation: AtomicU64,
    live: Arc<AtomicUsize>,
}

impl LoopController {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(None),
            enabled: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Generation of the most recently spawned loop (0 if never started).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Number of spawned tasks that have not finished yet.
    pub fn live_tasks(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Spawn the loop built by `make` unless one is already running.
    /// Returns the new generation, or `None` if nothing was spawned.
    pub async fn start<F, Fut>(&self, make: F) -> Option<u64>
    where
        F: FnOnce(LoopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return None;
        }
        Some(self.spawn_into(&mut slot, make))
    }

    /// Signal the running loop to stop and wait for it to exit.
    /// Returns the generation that was stopped.
    pub async fn stop(&self) -> Option<u64> {
        let mut slot = self.slot.lock().await;
        self.join_slot(&mut slot).await
    }

    /// Flip the loop on or off. Returns the new enabled state together with
    /// the generation that was started or stopped.
    pub async fn toggle<F, Fut>(&self, make: F) -> (bool, u64)
    where
        F: FnOnce(LoopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            let generation = self.join_slot(&mut slot).await.unwrap_or_default();
            (false, generation)
        } else {
            (true, self.spawn_into(&mut slot, make))
        }
    }

    fn spawn_into<F, Fut>(&self, slot: &mut Option<ActiveLoop>, make: F) -> u64
    where
        F: FnOnce(LoopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (stop_tx, rx) = watch::channel(true);
        let future = make(LoopSignal { generation, rx });

        self.live.fetch_add(1, Ordering::SeqCst);
        let guard = LiveGuard(self.live.clone());
        let handle = tokio::spawn(async move {
            let _guard = guard;
            future.await;
        });

        self.enabled.store(true, Ordering::SeqCst);
        info!("{} loop #{} spawned", self.name, generation);
        *slot = Some(ActiveLoop {
            generation,
            stop_tx,
            handle,
        });
        generation
    }

    async fn join_slot(&self, slot: &mut Option<ActiveLoop>) -> Option<u64> {
        let active = slot.take()?;
        self.enabled.store(false, Ordering::SeqCst);
        let _ = active.stop_tx.send(false);
        if let Err(e) = active.handle.await {
            error!("{} loop #{} ended abnormally: {}", self.name, active.generation, e);
        }
        info!("{} loop #{} joined", self.name, active.generation);
        Some(active.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn ticking_loop(counter: Arc<AtomicU32>) -> impl FnOnce(LoopSignal) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> {
        move |mut signal: LoopSignal| {
            Box::pin(async move {
                while signal.is_running() {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if !signal.sleep(Duration::from_millis(5)).await {
                        break;
                    }
                }
            })
        }
    }

    #[tokio::test]
    async fn start_then_stop() {
        let ctl = LoopController::new("test");
        let counter = Arc::new(AtomicU32::new(0));
        assert_eq!(ctl.start(ticking_loop(counter.clone())).await, Some(1));
        assert!(ctl.is_enabled());
        assert_eq!(ctl.start(ticking_loop(counter.clone())).await, None);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(ctl.stop().await, Some(1));
        assert!(!ctl.is_enabled());
        assert_eq!(ctl.live_tasks(), 0);

        let after_stop = counter.load(Ordering::SeqCst);
        assert!(after_stop > 0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
        assert_eq!(ctl.stop().await, None);
    }

    #[tokio::test]
    async fn stop_wakes_a_sleeping_loop() {
        let ctl = LoopController::new("sleepy");
        ctl.start(|mut signal: LoopSignal| async move {
            while signal.is_running() {
                if !signal.sleep(Duration::from_secs(3600)).await {
                    break;
                }
            }
        })
        .await;
        let stopped = tokio::time::timeout(Duration::from_secs(1), ctl.stop()).await;
        assert_eq!(stopped.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn rapid_toggles_leave_at_most_one_loop() {
        let ctl = Arc::new(LoopController::new("toggle"));
        let counter = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..7 {
            let ctl = ctl.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                ctl.toggle(ticking_loop(counter)).await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // odd number of toggles from off: exactly one loop left running
        assert!(ctl.is_enabled());
        assert_eq!(ctl.live_tasks(), 1);
        assert_eq!(ctl.generation(), 4);

        let (enabled, generation) = ctl.toggle(ticking_loop(counter)).await;
        assert!(!enabled);
        assert_eq!(generation, 4);
        assert_eq!(ctl.live_tasks(), 0);
    }

    #[tokio::test]
    async fn panicking_loop_is_reaped_on_stop() {
        let ctl = LoopController::new("panicky");
        ctl.start(|_signal: LoopSignal| async move {
            panic!("boom");
        })
        .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ctl.live_tasks(), 0);
        assert_eq!(ctl.stop().await, Some(1));
        assert!(!ctl.is_enabled());
    }
}
