//! The periodic effect scheduler: snapshots the connected players,
//! fans every due effect out in parallel, traps all errors, and keeps
//! per-effect wall-time metrics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinSet;

use game_core::constants::METRICS_LOG_EVERY_TICKS;

use crate::error::GameError;
use crate::messaging::MessageSender;
use crate::repository::PlayerRepo;
use crate::spatial::SpatialIndex;

/// Whether an effect runs once per connected player or exactly once per
/// scheduler iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectScope {
    PerPlayer,
    GlobalOncePerTick,
}

#[async_trait]
pub trait TickEffect: Send + Sync {
    fn name(&self) -> &'static str;

    fn scope(&self) -> EffectScope {
        EffectScope::PerPlayer
    }

    /// Seconds between firings; `0.0` fires every scheduler tick.
    fn interval_seconds(&self) -> f64;

    /// For global effects `user_id` is 0 and `sender` is `None`.
    async fn apply(
        &self,
        user_id: i32,
        player_repo: &Arc<dyn PlayerRepo>,
        sender: Option<&MessageSender>,
    ) -> Result<(), GameError>;
}

/// Scheduler-owned record per registered effect: firing period and the
/// run state the global-once guarantee needs.
struct RegisteredEffect {
    effect: Arc<dyn TickEffect>,
    period: Duration,
    last_fire: Option<Instant>,
}

#[derive(Debug, Default, Clone)]
pub struct EffectMetrics {
    pub count: u64,
    pub errors: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Default, Clone)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_ms: f64,
    pub max_tick_ms: f64,
    pub per_effect: HashMap<&'static str, EffectMetrics>,
}

pub struct TickScheduler {
    effects: Vec<RegisteredEffect>,
    player_repo: Arc<dyn PlayerRepo>,
    spatial: Arc<SpatialIndex>,
    tick_interval: Duration,
    metrics: Mutex<TickMetrics>,
}

impl TickScheduler {
    pub fn new(
        player_repo: Arc<dyn PlayerRepo>,
        spatial: Arc<SpatialIndex>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            effects: Vec::new(),
            player_repo,
            spatial,
            tick_interval,
            metrics: Mutex::new(TickMetrics::default()),
        }
    }

    pub fn add_effect(&mut self, effect: Arc<dyn TickEffect>) {
        log::info!("effect registered: {}", effect.name());
        self.effects.push(RegisteredEffect {
            period: Duration::from_secs_f64(effect.interval_seconds()),
            effect,
            last_fire: None,
        });
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    pub fn metrics_snapshot(&self) -> TickMetrics {
        self.metrics.lock().clone()
    }

    /// One scheduler iteration. Per-player effects spawn a task per
    /// (effect, user); global effects run in exactly one task no matter
    /// how many players are connected. Every task failure is trapped.
    pub async fn tick_once(&mut self) {
        let tick_start = Instant::now();
        let users = self.spatial.all_connected_user_ids();

        let mut join_set: JoinSet<(&'static str, f64, Result<(), GameError>)> = JoinSet::new();

        for registered in &mut self.effects {
            let due = match registered.last_fire {
                None => true,
                Some(at) => tick_start.duration_since(at) >= registered.period,
            };
            if !due {
                continue;
            }
            registered.last_fire = Some(tick_start);

            match registered.effect.scope() {
                EffectScope::GlobalOncePerTick => {
                    let effect = registered.effect.clone();
                    let repo = self.player_repo.clone();
                    join_set.spawn(async move {
                        let start = Instant::now();
                        let result = effect.apply(0, &repo, None).await;
                        (effect.name(), start.elapsed().as_secs_f64() * 1000.0, result)
                    });
                }
                EffectScope::PerPlayer => {
                    for &user_id in &users {
                        let effect = registered.effect.clone();
                        let repo = self.player_repo.clone();
                        let sender = self.spatial.sender_for(user_id);
                        join_set.spawn(async move {
                            let start = Instant::now();
                            let result = effect.apply(user_id, &repo, sender.as_ref()).await;
                            (effect.name(), start.elapsed().as_secs_f64() * 1000.0, result)
                        });
                    }
                }
            }
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, elapsed_ms, result)) => {
                    let mut metrics = self.metrics.lock();
                    let entry = metrics.per_effect.entry(name).or_default();
                    entry.count += 1;
                    entry.total_ms += elapsed_ms;
                    entry.max_ms = entry.max_ms.max(elapsed_ms);
                    if let Err(err) = result {
                        entry.errors += 1;
                        drop(metrics);
                        log::error!("effect {name} failed: {err}");
                    }
                }
                Err(err) => {
                    log::error!("effect task panicked: {err}");
                }
            }
        }

        let elapsed_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
        let total_ticks = {
            let mut metrics = self.metrics.lock();
            metrics.total_ticks += 1;
            metrics.total_ms += elapsed_ms;
            metrics.max_tick_ms = metrics.max_tick_ms.max(elapsed_ms);
            metrics.total_ticks
        };
        if total_ticks % METRICS_LOG_EVERY_TICKS == 0 {
            self.log_metrics();
        }
    }

    fn log_metrics(&self) {
        let metrics = self.metrics.lock();
        let avg = if metrics.total_ticks > 0 {
            metrics.total_ms / metrics.total_ticks as f64
        } else {
            0.0
        };
        log::info!(
            "tick metrics: {} ticks, avg={avg:.2}ms, max={:.2}ms",
            metrics.total_ticks,
            metrics.max_tick_ms
        );
        for (name, entry) in &metrics.per_effect {
            if entry.count == 0 {
                continue;
            }
            log::info!(
                "  effect '{name}': {} call(s), avg={:.2}ms, max={:.2}ms, errors={}",
                entry.count,
                entry.total_ms / entry.count as f64,
                entry.max_ms,
                entry.errors
            );
        }
    }

    /// Ticks until `shutdown` flips; the last in-flight fan-out always
    /// completes before returning.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        log::info!(
            "tick scheduler started (interval {:?}, {} effect(s))",
            self.tick_interval,
            self.effects.len()
        );
        loop {
            self.tick_once().await;
            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::info!("tick scheduler stopped");
    }
}
