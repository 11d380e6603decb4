//! Ambient hostile-NPC movement: a random sample of hostiles either
//! closes in on a nearby player or wanders. Runs once per tick, with
//! the sample processed in parallel chunks.

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::task::JoinSet;

use game_core::constants::{
    DEFAULT_MAX_NPCS_PER_TICK, DEFAULT_NPC_CHUNK_SIZE, NPC_NOTICE_RANGE, NPC_WANDER_RADIUS,
};

use crate::error::GameError;
use crate::helpers::{manhattan, now_secs, step_towards};
use crate::messaging::MessageSender;
use crate::npc::{Npc, NpcRegistry};
use crate::npc_engine::NpcEngine;
use crate::repository::{Heading, PlayerRepo};
use crate::spatial::SpatialIndex;
use crate::tick::{EffectScope, TickEffect};

pub struct NpcMovementEffect {
    registry: Arc<NpcRegistry>,
    npc_engine: Arc<NpcEngine>,
    spatial: Arc<SpatialIndex>,
    interval_seconds: f64,
    max_npcs_per_tick: usize,
    chunk_size: usize,
}

impl NpcMovementEffect {
    pub fn new(
        registry: Arc<NpcRegistry>,
        npc_engine: Arc<NpcEngine>,
        spatial: Arc<SpatialIndex>,
        interval_seconds: f64,
    ) -> Self {
        Self {
            registry,
            npc_engine,
            spatial,
            interval_seconds,
            max_npcs_per_tick: DEFAULT_MAX_NPCS_PER_TICK,
            chunk_size: DEFAULT_NPC_CHUNK_SIZE,
        }
    }

    pub fn with_limits(mut self, max_npcs_per_tick: usize, chunk_size: usize) -> Self {
        self.max_npcs_per_tick = max_npcs_per_tick;
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn closest_player(
        spatial: &SpatialIndex,
        player_repo: &Arc<dyn PlayerRepo>,
        npc: &Npc,
    ) -> Result<Option<(i32, i32)>, GameError> {
        let mut closest = None;
        let mut min_distance = i32::MAX;
        for user_id in spatial.players_in_map(npc.map_id, None) {
            let Some(position) = player_repo.get_position(user_id).await? else {
                continue;
            };
            let distance = manhattan(npc.x, npc.y, position.x, position.y);
            if distance <= NPC_NOTICE_RANGE && distance < min_distance {
                min_distance = distance;
                closest = Some((position.x, position.y));
            }
        }
        Ok(closest)
    }

    async fn move_npc_with_ai(
        npc_engine: Arc<NpcEngine>,
        spatial: Arc<SpatialIndex>,
        player_repo: Arc<dyn PlayerRepo>,
        npc: Npc,
    ) -> Result<(), GameError> {
        if npc.is_paralyzed(now_secs()) {
            return Ok(());
        }

        match Self::closest_player(&spatial, &player_repo, &npc).await? {
            Some((target_x, target_y)) => {
                let (new_x, new_y, heading) = step_towards(npc.x, npc.y, target_x, target_y);
                npc_engine
                    .move_npc(npc.instance_id, new_x, new_y, heading)
                    .await?;
            }
            None => {
                let direction = rand::thread_rng().gen_range(1..=4);
                let heading = Heading::from_u8(direction).unwrap_or(Heading::South);
                let (dx, dy) = crate::helpers::heading_delta(heading);
                let (new_x, new_y) = (npc.x + dx, npc.y + dy);
                // Wandering stays inside a tight radius of the current
                // tile.
                if manhattan(npc.x, npc.y, new_x, new_y) > NPC_WANDER_RADIUS {
                    return Ok(());
                }
                npc_engine
                    .move_npc(npc.instance_id, new_x, new_y, heading)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TickEffect for NpcMovementEffect {
    fn name(&self) -> &'static str {
        "NPCMovement"
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
        let mut hostiles = self.registry.hostiles();
        if hostiles.is_empty() {
            return Ok(());
        }

        hostiles.shuffle(&mut rand::thread_rng());
        hostiles.truncate(self.max_npcs_per_tick);

        let mut errors = 0usize;
        let total = hostiles.len();
        for chunk in hostiles.chunks(self.chunk_size) {
            let mut join_set = JoinSet::new();
            for npc in chunk {
                let npc_engine = self.npc_engine.clone();
                let spatial = self.spatial.clone();
                let repo = player_repo.clone();
                let npc = npc.clone();
                join_set
                    .spawn(
                        async move { Self::move_npc_with_ai(npc_engine, spatial, repo, npc).await },
                    );
            }
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        errors += 1;
                        log::warn!("npc movement failed: {err}");
                    }
                    Err(err) => {
                        errors += 1;
                        log::warn!("npc movement task panicked: {err}");
                    }
                }
            }
        }
        if errors > 0 {
            log::warn!("movement errors on {errors}/{total} npc(s)");
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
    use crate::repository::{Account, MemoryRepository, PlayerStats, Position};

    fn goblin() -> NpcTemplate {
        NpcTemplate {
            npc_id: 1,
            name: "Goblin".into(),
            description: String::new(),
            body: 12,
            head: 0,
            max_hp: 50,
            level: 3,
            hostile: true,
            attackable: true,
            merchant: false,
            banker: false,
            movement: crate::npc::MovementType::Random,
            respawn_min: 0.0,
            respawn_max: 0.0,
            gold_min: 0,
            gold_max: 0,
            attack_damage: 4,
            attack_cooldown: 2.0,
            aggro_range: 8,
            stock: Vec::new(),
            loot_table: None,
        }
    }

    struct Wilds {
        effect: NpcMovementEffect,
        engine: Arc<NpcEngine>,
        repo: Arc<MemoryRepository>,
        player_repo: Arc<dyn PlayerRepo>,
    }

    async fn wilds() -> Wilds {
        let repo = Arc::new(MemoryRepository::new());
        let spatial = Arc::new(SpatialIndex::new());
        let maps = Arc::new(MapRegistry::from_maps(vec![MapData::open(1, 100, 100)]));
        let broadcaster = Arc::new(Broadcaster::new(spatial.clone(), repo.clone(), repo.clone()));
        let engine = NpcEngine::new(
            Arc::new(NpcCatalog::from_templates(vec![goblin()])),
            Arc::new(NpcRegistry::default()),
            repo.clone(),
            maps,
            spatial.clone(),
            broadcaster,
        );
        engine
            .spawn_from_config(&[SpawnEntry {
                map_id: 1,
                npc_id: 1,
                x: 50,
                y: 50,
                heading: 3,
            }])
            .await
            .unwrap();
        let effect = NpcMovementEffect::new(
            engine.registry().clone(),
            engine.clone(),
            spatial.clone(),
            5.0,
        );
        let player_repo: Arc<dyn PlayerRepo> = repo.clone();
        Wilds {
            effect,
            engine,
            repo,
            player_repo,
        }
    }

    fn join(wilds: &Wilds, user_id: i32, x: i32, y: i32) {
        wilds.repo.seed_player(
            Account {
                user_id,
                username: format!("u{user_id}"),
                password: "pw".into(),
                char_body: 1,
                char_head: 1,
                char_class: 1,
            },
            PlayerStats::default(),
            Position {
                map: 1,
                x,
                y,
                heading: Heading::South,
            },
        );
        let outbox = Arc::new(crate::session::Outbox::new(64));
        wilds.effect.spatial.add_player(
            1,
            user_id,
            MessageSender::new(outbox, format!("u{user_id}")),
            &format!("u{user_id}"),
        );
    }

    #[tokio::test]
    async fn nearby_player_pulls_the_npc_one_step() {
        let w = wilds().await;
        join(&w, 1, 55, 50);

        w.effect.apply(0, &w.player_repo, None).await.unwrap();
        let npc = w.engine.registry().all().pop().unwrap();
        assert_eq!((npc.x, npc.y), (51, 50));
        assert_eq!(npc.heading, Heading::East);
    }

    #[tokio::test]
    async fn lonely_npcs_wander_one_tile_at_most() {
        let w = wilds().await;

        w.effect.apply(0, &w.player_repo, None).await.unwrap();
        let npc = w.engine.registry().all().pop().unwrap();
        assert!(manhattan(npc.x, npc.y, 50, 50) <= 1);
    }

    #[tokio::test]
    async fn paralyzed_npcs_hold_still() {
        let w = wilds().await;
        join(&w, 1, 55, 50);
        let instance_id = w.engine.registry().all().pop().unwrap().instance_id;
        w.engine
            .registry()
            .with_npc_mut(instance_id, |n| n.paralyzed_until = now_secs() + 60.0);

        w.effect.apply(0, &w.player_repo, None).await.unwrap();
        let npc = w.engine.registry().get(instance_id).unwrap();
        assert_eq!((npc.x, npc.y), (50, 50));
    }

    #[tokio::test]
    async fn sample_cap_limits_processing() {
        let w = wilds().await;
        let effect = NpcMovementEffect::new(
            w.engine.registry().clone(),
            w.engine.clone(),
            w.effect.spatial.clone(),
            5.0,
        )
        .with_limits(0, 4);

        effect.apply(0, &w.player_repo, None).await.unwrap();
        let npc = w.engine.registry().all().pop().unwrap();
        // Zero budget: nobody moved.
        assert_eq!((npc.x, npc.y), (50, 50));
    }
}
