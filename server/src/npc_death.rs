//! Everything that happens when an NPC's hp hits zero: loot on the
//! tile, broadcasts, XP for the killer, and the respawn timer.

use std::sync::Arc;

use rand::Rng;

use game_core::constants::{GOLD_GRH_INDEX, GOLD_ITEM_ID};

use crate::broadcast::Broadcaster;
use crate::error::GameError;
use crate::items::{ItemCatalog, LootTables};
use crate::npc::Npc;
use crate::npc_engine::NpcEngine;
use crate::repository::PlayerRepo;
use crate::spatial::{GroundItem, SpatialIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathRewards {
    pub experience: i32,
    pub gold: i32,
}

pub struct NpcDeathService {
    spatial: Arc<SpatialIndex>,
    player_repo: Arc<dyn PlayerRepo>,
    broadcaster: Arc<Broadcaster>,
    npc_engine: Arc<NpcEngine>,
    loot_tables: Arc<LootTables>,
    item_catalog: Arc<ItemCatalog>,
}

impl NpcDeathService {
    pub fn new(
        spatial: Arc<SpatialIndex>,
        player_repo: Arc<dyn PlayerRepo>,
        broadcaster: Arc<Broadcaster>,
        npc_engine: Arc<NpcEngine>,
        loot_tables: Arc<LootTables>,
        item_catalog: Arc<ItemCatalog>,
    ) -> Self {
        Self {
            spatial,
            player_repo,
            broadcaster,
            npc_engine,
            loot_tables,
            item_catalog,
        }
    }

    fn roll_experience(npc: &Npc) -> i32 {
        let base = npc.level * 10;
        let bonus = if npc.level > 0 {
            rand::thread_rng().gen_range(0..=npc.level * 2)
        } else {
            0
        };
        base + bonus
    }

    fn roll_gold(npc: &Npc) -> i32 {
        if npc.gold_max <= 0 {
            return 0;
        }
        if npc.gold_max > npc.gold_min {
            rand::thread_rng().gen_range(npc.gold_min..=npc.gold_max)
        } else {
            npc.gold_min
        }
    }

    /// Removes the NPC from the world, drops its loot on the corpse
    /// tile, rewards the killer, and schedules the respawn.
    pub async fn handle_death(
        &self,
        npc: &Npc,
        killer_user_id: Option<i32>,
    ) -> Result<DeathRewards, GameError> {
        let gold = Self::roll_gold(npc);
        if gold > 0 {
            self.spatial.add_ground_item(
                npc.map_id,
                npc.x,
                npc.y,
                GroundItem {
                    item_id: GOLD_ITEM_ID,
                    quantity: gold,
                    grh_index: GOLD_GRH_INDEX,
                    owner_id: None,
                    spawn_time: None,
                },
            );
            self.broadcaster
                .broadcast_object_create(npc.map_id, npc.x, npc.y, GOLD_GRH_INDEX);
            log::info!(
                "npc {} dropped {gold} gold at ({}, {})",
                npc.name,
                npc.x,
                npc.y
            );
        }

        if let Some(table_id) = npc.loot_table {
            for (item_id, quantity) in self.loot_tables.roll(table_id) {
                let Some(def) = self.item_catalog.get(item_id) else {
                    log::warn!("loot table {table_id} references unknown item {item_id}");
                    continue;
                };
                self.spatial.add_ground_item(
                    npc.map_id,
                    npc.x,
                    npc.y,
                    GroundItem {
                        item_id,
                        quantity,
                        grh_index: def.grh_index,
                        owner_id: killer_user_id,
                        spawn_time: None,
                    },
                );
                self.broadcaster
                    .broadcast_object_create(npc.map_id, npc.x, npc.y, def.grh_index);
            }
        }

        self.npc_engine.remove_npc(npc).await?;

        let experience = Self::roll_experience(npc);
        if let Some(killer) = killer_user_id {
            self.award_experience(killer, experience).await?;
        }

        self.npc_engine.schedule_respawn(npc);

        Ok(DeathRewards { experience, gold })
    }

    async fn award_experience(&self, user_id: i32, experience: i32) -> Result<(), GameError> {
        let Some(mut stats) = self.player_repo.get_stats(user_id).await? else {
            return Ok(());
        };
        stats.exp += experience;
        self.player_repo
            .update_experience(user_id, stats.exp)
            .await?;
        if let Some(sender) = self.spatial.sender_for(user_id) {
            sender.update_user_stats(&stats);
        }
        log::info!("player {user_id} earned {experience} xp (total {})", stats.exp);
        Ok(())
    }
}
