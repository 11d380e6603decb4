//! Poison damage over every poisoned NPC, processed in parallel. Runs
//! exactly once per tick; NPC deaths route to the death service with
//! the poisoner credited as killer.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;

use game_core::constants::{POISON_DAMAGE_PER_TICK, POISON_TICK_INTERVAL};

use crate::error::GameError;
use crate::helpers::now_secs;
use crate::messaging::MessageSender;
use crate::npc::NpcRegistry;
use crate::npc_death::NpcDeathService;
use crate::repository::{NpcRepo, PlayerRepo};
use crate::tick::{EffectScope, TickEffect};

pub struct NpcPoisonEffect {
    registry: Arc<NpcRegistry>,
    npc_repo: Arc<dyn NpcRepo>,
    npc_death: Arc<NpcDeathService>,
    interval_seconds: f64,
}

impl NpcPoisonEffect {
    pub fn new(
        registry: Arc<NpcRegistry>,
        npc_repo: Arc<dyn NpcRepo>,
        npc_death: Arc<NpcDeathService>,
    ) -> Self {
        Self {
            registry,
            npc_repo,
            npc_death,
            interval_seconds: POISON_TICK_INTERVAL,
        }
    }

    async fn process_poisoned_npc(
        registry: Arc<NpcRegistry>,
        npc_repo: Arc<dyn NpcRepo>,
        npc_death: Arc<NpcDeathService>,
        instance_id: u64,
        now: f64,
    ) -> Result<(), GameError> {
        let Some(npc) = registry.get(instance_id) else {
            return Ok(());
        };

        if now >= npc.poisoned_until || npc.hp <= 0 {
            registry.with_npc_mut(instance_id, |n| {
                n.poisoned_until = 0.0;
                n.poisoned_by_user_id = 0;
            });
            npc_repo
                .update_npc_poisoned_until(instance_id, 0.0, 0)
                .await?;
            log::debug!("poison expired for npc {}", npc.name);
            return Ok(());
        }

        let new_hp = (npc.hp - POISON_DAMAGE_PER_TICK).max(0);
        registry.with_npc_mut(instance_id, |n| n.hp = new_hp);
        npc_repo.update_npc_hp(instance_id, new_hp).await?;

        if new_hp == 0 {
            let poisoner = npc.poisoned_by_user_id;
            log::info!(
                "npc {} died of poison (poisoned by user {poisoner})",
                npc.name
            );
            registry.with_npc_mut(instance_id, |n| {
                n.poisoned_until = 0.0;
                n.poisoned_by_user_id = 0;
                n.hp = 0;
            });
            npc_repo
                .update_npc_poisoned_until(instance_id, 0.0, 0)
                .await?;
            let killer = (poisoner > 0).then_some(poisoner);
            let mut corpse = npc;
            corpse.hp = 0;
            npc_death.handle_death(&corpse, killer).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TickEffect for NpcPoisonEffect {
    fn name(&self) -> &'static str {
        "NPCPoison"
    }

    fn scope(&self) -> EffectScope {
        EffectScope::GlobalOncePerTick
    }

    fn interval_seconds(&self) -> f64 {
        self.interval_seconds
    }

    async fn apply(
        &self,
        _user_id: i32,
        _player_repo: &Arc<dyn PlayerRepo>,
        _sender: Option<&MessageSender>,
    ) -> Result<(), GameError> {
        let now = now_secs();
        let poisoned = self.registry.poisoned();
        if poisoned.is_empty() {
            return Ok(());
        }

        let mut join_set = JoinSet::new();
        for npc in &poisoned {
            let registry = self.registry.clone();
            let npc_repo = self.npc_repo.clone();
            let npc_death = self.npc_death.clone();
            let instance_id = npc.instance_id;
            join_set.spawn(async move {
                Self::process_poisoned_npc(registry, npc_repo, npc_death, instance_id, now).await
            });
        }

        let mut errors = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    errors += 1;
                    log::warn!("npc poison processing failed: {err}");
                }
                Err(err) => {
                    errors += 1;
                    log::warn!("npc poison task panicked: {err}");
                }
            }
        }
        if errors > 0 {
            log::warn!("poison errors on {errors}/{} npc(s)", poisoned.len());
        }
        Ok(())
    }
}
