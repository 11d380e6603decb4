//! Despawns summoned pets whose time ran out.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GameError;
use crate::helpers::now_secs;
use crate::messaging::MessageSender;
use crate::npc::NpcRegistry;
use crate::npc_engine::NpcEngine;
use crate::repository::PlayerRepo;
use crate::tick::{EffectScope, TickEffect};

pub struct SummonExpiryEffect {
    registry: Arc<NpcRegistry>,
    npc_engine: Arc<NpcEngine>,
    interval_seconds: f64,
}

impl SummonExpiryEffect {
    pub fn new(registry: Arc<NpcRegistry>, npc_engine: Arc<NpcEngine>, interval_seconds: f64) -> Self {
        Self {
            registry,
            npc_engine,
            interval_seconds,
        }
    }
}

#[async_trait]
impl TickEffect for SummonExpiryEffect {
    fn name(&self) -> &'static str {
        "SummonExpiry"
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
        for pet in self.registry.expired_pets(now_secs()) {
            log::info!(
                "expired pet removed: {} (owner user {})",
                pet.name,
                pet.summoned_by_user_id
            );
            self.npc_engine.remove_npc(&pet).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::maps::{MapData, MapRegistry};
    use crate::npc::{NpcCatalog, NpcTemplate, SpawnEntry};
    use crate::repository::MemoryRepository;
    use crate::spatial::SpatialIndex;

    fn wolf() -> NpcTemplate {
        NpcTemplate {
            npc_id: 2,
            name: "Lobo".into(),
            description: String::new(),
            body: 20,
            head: 0,
            max_hp: 30,
            level: 2,
            hostile: false,
            attackable: true,
            merchant: false,
            banker: false,
            movement: crate::npc::MovementType::Static,
            respawn_min: 0.0,
            respawn_max: 0.0,
            gold_min: 0,
            gold_max: 0,
            attack_damage: 2,
            attack_cooldown: 2.0,
            aggro_range: 8,
            stock: Vec::new(),
            loot_table: None,
        }
    }

    async fn world_with_pet(until: f64) -> (SummonExpiryEffect, Arc<NpcEngine>, Arc<dyn PlayerRepo>, u64) {
        let repo = Arc::new(MemoryRepository::new());
        let spatial = Arc::new(SpatialIndex::new());
        let maps = Arc::new(MapRegistry::from_maps(vec![MapData::open(1, 100, 100)]));
        let broadcaster = Arc::new(Broadcaster::new(spatial.clone(), repo.clone(), repo.clone()));
        let engine = NpcEngine::new(
            Arc::new(NpcCatalog::from_templates(vec![wolf()])),
            Arc::new(NpcRegistry::default()),
            repo.clone(),
            maps,
            spatial,
            broadcaster,
        );
        engine
            .spawn_from_config(&[SpawnEntry {
                map_id: 1,
                npc_id: 2,
                x: 10,
                y: 10,
                heading: 3,
            }])
            .await
            .unwrap();
        let pet = engine.registry().all().pop().unwrap();
        engine.registry().with_npc_mut(pet.instance_id, |n| {
            n.summoned_by_user_id = 7;
            n.summoned_until = until;
        });
        let effect = SummonExpiryEffect::new(engine.registry().clone(), engine.clone(), 5.0);
        let player_repo: Arc<dyn PlayerRepo> = repo;
        (effect, engine, player_repo, pet.instance_id)
    }

    #[tokio::test]
    async fn expired_pet_is_despawned() {
        let (effect, engine, player_repo, pet_id) = world_with_pet(now_secs() - 1.0).await;
        effect.apply(0, &player_repo, None).await.unwrap();
        assert!(engine.registry().get(pet_id).is_none());
    }

    #[tokio::test]
    async fn live_pet_survives() {
        let (effect, engine, player_repo, pet_id) = world_with_pet(now_secs() + 60.0).await;
        effect.apply(0, &player_repo, None).await.unwrap();
        assert!(engine.registry().get(pet_id).is_some());
    }
}
