//! Drives the pursuit/attack AI over every hostile NPC once per tick.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GameError;
use crate::messaging::MessageSender;
use crate::npc::NpcRegistry;
use crate::npc_ai::NpcAi;
use crate::repository::PlayerRepo;
use crate::tick::{EffectScope, TickEffect};

pub struct NpcAiEffect {
    registry: Arc<NpcRegistry>,
    ai: Arc<NpcAi>,
    interval_seconds: f64,
}

impl NpcAiEffect {
    pub fn new(registry: Arc<NpcRegistry>, ai: Arc<NpcAi>, interval_seconds: f64) -> Self {
        Self {
            registry,
            ai,
            interval_seconds,
        }
    }
}

#[async_trait]
impl TickEffect for NpcAiEffect {
    fn name(&self) -> &'static str {
        "NPCAI"
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
        let mut errors = 0usize;
        let hostiles = self.registry.hostiles();
        for npc in &hostiles {
            if let Err(err) = self.ai.process_hostile_npc(npc).await {
                errors += 1;
                log::warn!("npc ai failed for {}: {err}", npc.name);
            }
        }
        if errors > 0 {
            log::warn!("ai errors on {errors}/{} npc(s)", hostiles.len());
        }
        Ok(())
    }
}
