//! Summoned pets walk back toward their owner when they fall too far
//! behind on the same map.

use std::sync::Arc;

use async_trait::async_trait;

use game_core::constants::MAX_PET_FOLLOW_DISTANCE;

use crate::error::GameError;
use crate::helpers::{manhattan, step_towards};
use crate::messaging::MessageSender;
use crate::npc::NpcRegistry;
use crate::npc_engine::NpcEngine;
use crate::repository::PlayerRepo;
use crate::tick::{EffectScope, TickEffect};

pub struct PetFollowEffect {
    registry: Arc<NpcRegistry>,
    npc_engine: Arc<NpcEngine>,
    interval_seconds: f64,
}

impl PetFollowEffect {
    pub fn new(registry: Arc<NpcRegistry>, npc_engine: Arc<NpcEngine>, interval_seconds: f64) -> Self {
        Self {
            registry,
            npc_engine,
            interval_seconds,
        }
    }
}

#[async_trait]
impl TickEffect for PetFollowEffect {
    fn name(&self) -> &'static str {
        "PetFollow"
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
        player_repo: &Arc<dyn PlayerRepo>,
        _sender: Option<&MessageSender>,
    ) -> Result<(), GameError> {
        for pet in self.registry.pets() {
            let Some(owner_position) = player_repo.get_position(pet.summoned_by_user_id).await?
            else {
                continue;
            };
            if owner_position.map != pet.map_id {
                // Pets cannot follow across maps.
                continue;
            }

            let distance = manhattan(pet.x, pet.y, owner_position.x, owner_position.y);
            if distance <= MAX_PET_FOLLOW_DISTANCE {
                continue;
            }

            let (new_x, new_y, heading) =
                step_towards(pet.x, pet.y, owner_position.x, owner_position.y);
            // Paralysis and blocked/occupied tiles are the engine's
            // checks.
            self.npc_engine
                .move_npc(pet.instance_id, new_x, new_y, heading)
                .await?;
        }
        Ok(())
    }
}
