//! Hostile NPC behavior: pick the nearest living player in aggro range,
//! swing when adjacent and off cooldown, otherwise chase one A* step.

use std::sync::Arc;

use crate::combat::{CombatEngine, NpcAttackOutcome};
use crate::error::GameError;
use crate::helpers::{manhattan, now_secs};
use crate::npc::Npc;
use crate::npc_engine::NpcEngine;
use crate::path_finding::{Pathfinder, DEFAULT_MAX_DEPTH};
use crate::repository::PlayerRepo;
use crate::spatial::SpatialIndex;

pub struct NpcAi {
    spatial: Arc<SpatialIndex>,
    player_repo: Arc<dyn PlayerRepo>,
    combat: Arc<CombatEngine>,
    npc_engine: Arc<NpcEngine>,
    pathfinder: Arc<Pathfinder>,
}

impl NpcAi {
    pub fn new(
        spatial: Arc<SpatialIndex>,
        player_repo: Arc<dyn PlayerRepo>,
        combat: Arc<CombatEngine>,
        npc_engine: Arc<NpcEngine>,
        pathfinder: Arc<Pathfinder>,
    ) -> Self {
        Self {
            spatial,
            player_repo,
            combat,
            npc_engine,
            pathfinder,
        }
    }

    /// Nearest living player within the NPC's aggro range (Manhattan).
    pub async fn find_nearest_player(
        &self,
        npc: &Npc,
    ) -> Result<Option<(i32, i32, i32)>, GameError> {
        let mut nearest: Option<(i32, i32, i32)> = None;
        let mut min_distance = i32::MAX;

        for user_id in self.spatial.players_in_map(npc.map_id, None) {
            if !self.player_repo.is_alive(user_id).await? {
                continue;
            }
            let Some(position) = self.player_repo.get_position(user_id).await? else {
                continue;
            };
            if position.map != npc.map_id {
                continue;
            }
            let distance = manhattan(npc.x, npc.y, position.x, position.y);
            if distance <= npc.aggro_range && distance < min_distance {
                min_distance = distance;
                nearest = Some((user_id, position.x, position.y));
            }
        }
        Ok(nearest)
    }

    /// Adjacent swing honoring the NPC's attack cadence.
    pub async fn try_attack_player(
        &self,
        npc: &Npc,
        target_user_id: i32,
    ) -> Result<bool, GameError> {
        if !self.player_repo.is_alive(target_user_id).await? {
            return Ok(false);
        }
        let Some(target) = self.player_repo.get_position(target_user_id).await? else {
            return Ok(false);
        };
        if target.map != npc.map_id || manhattan(npc.x, npc.y, target.x, target.y) != 1 {
            return Ok(false);
        }

        let now = now_secs();
        if now - npc.last_attack_time < npc.attack_cooldown {
            return Ok(false);
        }

        let Some(outcome) = self
            .combat
            .npc_attacks_player(npc.instance_id, target_user_id)
            .await?
        else {
            return Ok(false);
        };
        self.npc_engine
            .registry()
            .with_npc_mut(npc.instance_id, |n| n.last_attack_time = now);

        let result = match outcome {
            NpcAttackOutcome::Hit(result) => result,
            NpcAttackOutcome::Dodged => return Ok(false),
        };

        if let Some(sender) = self.spatial.sender_for(target_user_id) {
            if let Some(stats) = self.player_repo.get_stats(target_user_id).await? {
                sender.update_user_stats(&stats);
            }
            if result.player_died {
                sender.console_msg(&format!("¡Has sido asesinado por {}!", npc.name));
                self.handle_player_death(target_user_id).await?;
            }
        }

        log::info!(
            "npc {} attacked player {target_user_id} for {}",
            npc.name,
            result.damage
        );
        Ok(true)
    }

    /// Interim death handling: refill HP and resend stats. A dedicated
    /// death/respawn module replaces this seam.
    async fn handle_player_death(&self, user_id: i32) -> Result<(), GameError> {
        let Some(stats) = self.player_repo.get_stats(user_id).await? else {
            return Ok(());
        };
        self.player_repo.update_hp(user_id, stats.max_hp).await?;
        if let Some(sender) = self.spatial.sender_for(user_id) {
            if let Some(updated) = self.player_repo.get_stats(user_id).await? {
                sender.update_user_stats(&updated);
            }
        }
        log::info!("player {user_id} died and was revived at full hp");
        Ok(())
    }

    /// One re-planned pursuit step; occupied destinations wait a tick.
    pub async fn try_move_towards(
        &self,
        npc: &Npc,
        target_x: i32,
        target_y: i32,
    ) -> Result<bool, GameError> {
        let Some((next_x, next_y, heading)) = self.pathfinder.next_step(
            npc.map_id,
            npc.x,
            npc.y,
            target_x,
            target_y,
            DEFAULT_MAX_DEPTH,
        ) else {
            return Ok(false);
        };
        if self.spatial.is_tile_occupied(npc.map_id, next_x, next_y) {
            return Ok(false);
        }
        self.npc_engine
            .move_npc(npc.instance_id, next_x, next_y, heading)
            .await
    }

    /// One AI turn for a hostile NPC.
    pub async fn process_hostile_npc(&self, npc: &Npc) -> Result<(), GameError> {
        if !npc.is_hostile() {
            return Ok(());
        }

        let Some((target_id, target_x, target_y)) = self.find_nearest_player(npc).await? else {
            // Idle; the movement effect's random walk owns this case.
            return Ok(());
        };

        let distance = manhattan(npc.x, npc.y, target_x, target_y);
        if distance == 1 {
            self.try_attack_player(npc, target_id).await?;
        } else if !npc.is_paralyzed(now_secs()) {
            // The path is re-planned next tick; a failed step is fine.
            self.try_move_towards(npc, target_x, target_y).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::combat::CombatEngine;
    use crate::config::CombatSection;
    use crate::items::{ItemCatalog, LootTables};
    use crate::maps::{MapData, MapRegistry};
    use crate::messaging::MessageSender;
    use crate::npc::{NpcCatalog, NpcRegistry, NpcTemplate, SpawnEntry};
    use crate::npc_death::NpcDeathService;
    use crate::repository::{Account, Heading, MemoryRepository, PlayerStats, Position};
    use crate::session::Outbox;

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

    struct Den {
        ai: NpcAi,
        npc_engine: Arc<NpcEngine>,
        spatial: Arc<SpatialIndex>,
        repo: Arc<MemoryRepository>,
    }

    async fn den(blocked: &[(i32, i32)]) -> Den {
        let repo = Arc::new(MemoryRepository::new());
        let spatial = Arc::new(SpatialIndex::new());
        let mut map = MapData::open(1, 100, 100);
        for &(x, y) in blocked {
            map.block(x, y);
        }
        let maps = Arc::new(MapRegistry::from_maps(vec![map]));
        let broadcaster = Arc::new(Broadcaster::new(spatial.clone(), repo.clone(), repo.clone()));
        let npc_engine = NpcEngine::new(
            Arc::new(NpcCatalog::from_templates(vec![goblin()])),
            Arc::new(NpcRegistry::default()),
            repo.clone(),
            maps.clone(),
            spatial.clone(),
            broadcaster.clone(),
        );
        npc_engine
            .spawn_from_config(&[SpawnEntry {
                map_id: 1,
                npc_id: 1,
                x: 10,
                y: 10,
                heading: 3,
            }])
            .await
            .unwrap();
        let death = Arc::new(NpcDeathService::new(
            spatial.clone(),
            repo.clone(),
            broadcaster,
            npc_engine.clone(),
            Arc::new(LootTables::default()),
            Arc::new(ItemCatalog::default()),
        ));
        let combat = Arc::new(CombatEngine::new(
            repo.clone(),
            repo.clone(),
            Arc::new(ItemCatalog::default()),
            npc_engine.registry().clone(),
            repo.clone(),
            death,
            CombatSection {
                base_dodge_chance: 0.0,
                dodge_agi_modifier: 0.0,
                ..CombatSection::default()
            },
        ));
        let pathfinder = Arc::new(Pathfinder::new(maps, spatial.clone()));
        let ai = NpcAi::new(
            spatial.clone(),
            repo.clone(),
            combat,
            npc_engine.clone(),
            pathfinder,
        );
        Den {
            ai,
            npc_engine,
            spatial,
            repo,
        }
    }

    fn join(den: &Den, user_id: i32, name: &str, x: i32, y: i32) -> Arc<Outbox> {
        den.repo.seed_player(
            Account {
                user_id,
                username: name.into(),
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
        let outbox = Arc::new(Outbox::new(256));
        den.spatial
            .add_player(1, user_id, MessageSender::new(outbox.clone(), name), name);
        outbox
    }

    #[tokio::test]
    async fn nearest_living_player_wins() {
        let den = den(&[]).await;
        join(&den, 1, "near", 13, 10);
        join(&den, 2, "far", 16, 10);
        join(&den, 3, "dead", 11, 10);
        den.repo.update_hp(3, 0).await.unwrap();

        let npc = den.npc_engine.registry().find_at(1, 10, 10).unwrap();
        let nearest = den.ai.find_nearest_player(&npc).await.unwrap();
        assert_eq!(nearest, Some((1, 13, 10)));
    }

    #[tokio::test]
    async fn out_of_aggro_range_is_ignored() {
        let den = den(&[]).await;
        join(&den, 1, "far", 30, 30);
        let npc = den.npc_engine.registry().find_at(1, 10, 10).unwrap();
        assert!(den.ai.find_nearest_player(&npc).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn adjacent_attack_respects_cooldown() {
        let den = den(&[]).await;
        let outbox = join(&den, 1, "victim", 11, 10);
        let npc = den.npc_engine.registry().find_at(1, 10, 10).unwrap();

        assert!(den.ai.try_attack_player(&npc, 1).await.unwrap());
        let stats = den.repo.get_stats(1).await.unwrap().unwrap();
        assert!(stats.min_hp < 100);
        assert!(!outbox.is_empty()); // UPDATE_USER_STATS pushed

        // Second swing inside the cooldown window fails.
        let npc = den.npc_engine.registry().get(npc.instance_id).unwrap();
        assert!(!den.ai.try_attack_player(&npc, 1).await.unwrap());
    }

    #[tokio::test]
    async fn pursuit_detours_around_obstacles() {
        // Tile between NPC (10,10) and player (12,10) is blocked.
        let den = den(&[(11, 10)]).await;
        join(&den, 1, "prey", 12, 10);
        let npc = den.npc_engine.registry().find_at(1, 10, 10).unwrap();

        den.ai.process_hostile_npc(&npc).await.unwrap();
        let moved = den.npc_engine.registry().get(npc.instance_id).unwrap();
        // Valid detour steps off the blocked row.
        assert!((moved.x, moved.y) == (10, 9) || (moved.x, moved.y) == (10, 11));
    }

    #[tokio::test]
    async fn killed_player_gets_console_line_and_revive() {
        let den = den(&[]).await;
        let outbox = join(&den, 1, "victim", 11, 10);
        den.repo.update_hp(1, 1).await.unwrap();
        let npc = den.npc_engine.registry().find_at(1, 10, 10).unwrap();

        assert!(den.ai.try_attack_player(&npc, 1).await.unwrap());
        // Reference behavior: revived at full hp, death handling is an
        // external module's seam.
        let stats = den.repo.get_stats(1).await.unwrap().unwrap();
        assert_eq!(stats.min_hp, stats.max_hp);
        assert!(outbox.len() >= 3); // stats, console, stats-after-revive
    }
}
