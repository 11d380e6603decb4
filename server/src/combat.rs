//! Melee combat arbitration. Every formula parameter comes from
//! `game.combat` so operators tune balance and tests pin values.

use std::sync::Arc;

use rand::Rng;

use game_core::constants::{BASE_ARMOR_REDUCTION, BASE_FIST_DAMAGE, MAX_ARMOR_REDUCTION};

use crate::config::CombatSection;
use crate::error::GameError;
use crate::helpers::{manhattan, now_secs};
use crate::items::ItemCatalog;
use crate::npc::NpcRegistry;
use crate::npc_death::NpcDeathService;
use crate::repository::{EquipmentKind, InventoryRepo, NpcRepo, PlayerRepo, Position};

/// A landed player hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackResult {
    pub damage: i32,
    pub critical: bool,
    pub npc_died: bool,
    pub experience: Option<i32>,
    pub gold: Option<i32>,
}

/// A landed NPC hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NpcAttackResult {
    pub damage: i32,
    pub player_died: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    Hit(AttackResult),
    Dodged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcAttackOutcome {
    Hit(NpcAttackResult),
    Dodged,
}

pub struct CombatEngine {
    player_repo: Arc<dyn PlayerRepo>,
    inventory_repo: Arc<dyn InventoryRepo>,
    item_catalog: Arc<ItemCatalog>,
    npc_registry: Arc<NpcRegistry>,
    npc_repo: Arc<dyn NpcRepo>,
    npc_death: Arc<NpcDeathService>,
    config: CombatSection,
}

impl CombatEngine {
    pub fn new(
        player_repo: Arc<dyn PlayerRepo>,
        inventory_repo: Arc<dyn InventoryRepo>,
        item_catalog: Arc<ItemCatalog>,
        npc_registry: Arc<NpcRegistry>,
        npc_repo: Arc<dyn NpcRepo>,
        npc_death: Arc<NpcDeathService>,
        config: CombatSection,
    ) -> Self {
        Self {
            player_repo,
            inventory_repo,
            item_catalog,
            npc_registry,
            npc_repo,
            npc_death,
            config,
        }
    }

    pub fn config(&self) -> &CombatSection {
        &self.config
    }

    /// Melee reach check, Manhattan metric.
    pub fn can_attack(&self, attacker: &Position, target: &Position) -> bool {
        attacker.map == target.map
            && manhattan(attacker.x, attacker.y, target.x, target.y) == self.config.melee_range
    }

    /// Effective strength/agility: base attribute plus any live buff.
    async fn effective_attributes(&self, user_id: i32) -> Result<(i32, i32), GameError> {
        let attributes = self
            .player_repo
            .get_attributes(user_id)
            .await?
            .unwrap_or_default();
        let now = now_secs();
        let mut strength = attributes.strength;
        let mut agility = attributes.agility;

        let str_mod = self.player_repo.get_strength_modifier(user_id).await?;
        if str_mod.until > now {
            strength += str_mod.delta;
        }
        let agi_mod = self.player_repo.get_agility_modifier(user_id).await?;
        if agi_mod.until > now {
            agility += agi_mod.delta;
        }
        Ok((strength, agility))
    }

    async fn weapon_damage(&self, user_id: i32) -> Result<i32, GameError> {
        let equipment = self.inventory_repo.get_equipment(user_id).await?;
        let Some(slot) = equipment.get(EquipmentKind::Weapon) else {
            return Ok(BASE_FIST_DAMAGE);
        };
        let Some(slot_data) = self.inventory_repo.get_slot(user_id, slot).await? else {
            return Ok(BASE_FIST_DAMAGE);
        };
        match self.item_catalog.weapon_damage(slot_data.item_id) {
            Some((min_hit, max_hit)) if max_hit >= min_hit => {
                Ok(rand::thread_rng().gen_range(min_hit..=max_hit))
            }
            _ => Ok(BASE_FIST_DAMAGE),
        }
    }

    async fn armor_reduction(&self, user_id: i32) -> Result<f64, GameError> {
        let equipment = self.inventory_repo.get_equipment(user_id).await?;
        let Some(slot) = equipment.get(EquipmentKind::Armor) else {
            return Ok(BASE_ARMOR_REDUCTION);
        };
        let Some(slot_data) = self.inventory_repo.get_slot(user_id, slot).await? else {
            return Ok(BASE_ARMOR_REDUCTION);
        };
        match self.item_catalog.armor_defense(slot_data.item_id) {
            Some((min_def, max_def)) => {
                let average = f64::from(min_def + max_def) / 2.0;
                Ok((BASE_ARMOR_REDUCTION + average / 100.0).min(MAX_ARMOR_REDUCTION))
            }
            None => Ok(BASE_ARMOR_REDUCTION),
        }
    }

    fn critical_chance(&self, agility: i32) -> f64 {
        let bonus =
            f64::from(agility - self.config.base_agility) * self.config.critical_agi_modifier;
        (self.config.base_critical_chance + bonus).clamp(0.0, self.config.max_critical_chance)
    }

    fn dodge_chance(&self, agility: i32) -> f64 {
        let bonus = f64::from(agility - self.config.base_agility) * self.config.dodge_agi_modifier;
        (self.config.base_dodge_chance + bonus).clamp(0.0, self.config.max_dodge_chance)
    }

    /// Player melee against an NPC. Returns `None` when the attack is
    /// invalid (missing stats, untargetable NPC); a landed hit always
    /// deals at least 1 damage.
    pub async fn player_attacks_npc(
        &self,
        user_id: i32,
        instance_id: u64,
    ) -> Result<Option<AttackOutcome>, GameError> {
        let Some(npc) = self.npc_registry.get(instance_id) else {
            return Ok(None);
        };
        if !npc.is_attackable() {
            log::warn!("attack attempt on untargetable npc {}", npc.name);
            return Ok(None);
        }
        if self.player_repo.get_stats(user_id).await?.is_none() {
            log::error!("no stats found for user {user_id}");
            return Ok(None);
        }

        let (strength, agility) = self.effective_attributes(user_id).await?;

        // Dodge resolves before any damage is computed.
        if rand::thread_rng().gen_bool(self.config.base_dodge_chance.clamp(0.0, 1.0)) {
            return Ok(Some(AttackOutcome::Dodged));
        }

        let base_damage = strength / 2 + self.weapon_damage(user_id).await?;
        let defense = f64::from(npc.level) * self.config.defense_per_level;
        let mut damage = (f64::from(base_damage) * (1.0 - defense)) as i32;
        damage = damage.max(1);

        let critical = rand::thread_rng().gen_bool(self.critical_chance(agility));
        if critical {
            damage = (f64::from(damage) * self.config.critical_damage_multiplier) as i32;
        }

        let new_hp = (npc.hp - damage).max(0);
        let npc_died = new_hp == 0;
        self.npc_registry
            .with_npc_mut(instance_id, |n| n.hp = new_hp);

        log::info!(
            "player {user_id} hit {} for {damage} (critical={critical}, died={npc_died})",
            npc.name
        );

        let mut result = AttackResult {
            damage,
            critical,
            npc_died,
            experience: None,
            gold: None,
        };

        if npc_died {
            let rewards = self.npc_death.handle_death(&npc, Some(user_id)).await?;
            result.experience = Some(rewards.experience);
            result.gold = Some(rewards.gold);
        } else {
            self.npc_repo.update_npc_hp(instance_id, new_hp).await?;
        }

        Ok(Some(AttackOutcome::Hit(result)))
    }

    /// NPC melee against a player. Marks the player dead at hp 0; the
    /// death/respawn policy itself lives outside the engine.
    pub async fn npc_attacks_player(
        &self,
        instance_id: u64,
        user_id: i32,
    ) -> Result<Option<NpcAttackOutcome>, GameError> {
        let Some(npc) = self.npc_registry.get(instance_id) else {
            return Ok(None);
        };
        let Some(stats) = self.player_repo.get_stats(user_id).await? else {
            log::error!("no stats found for user {user_id}");
            return Ok(None);
        };

        let (_, agility) = self.effective_attributes(user_id).await?;
        if rand::thread_rng().gen_bool(self.dodge_chance(agility)) {
            return Ok(Some(NpcAttackOutcome::Dodged));
        }

        let base = f64::from(npc.level * npc.attack_damage);
        let variation = rand::thread_rng().gen_range(0.8..=1.2);
        let reduction = self.armor_reduction(user_id).await?;
        let damage = ((base * variation) * (1.0 - reduction)) as i32;
        let damage = damage.max(1);

        let new_hp = (stats.min_hp - damage).max(0);
        let player_died = new_hp == 0;
        self.player_repo.update_hp(user_id, new_hp).await?;

        log::info!(
            "npc {} hit player {user_id} for {damage} (died={player_died})",
            npc.name
        );

        Ok(Some(NpcAttackOutcome::Hit(NpcAttackResult {
            damage,
            player_died,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::items::LootTables;
    use crate::maps::{MapData, MapRegistry};
    use crate::npc::{NpcCatalog, NpcTemplate, SpawnEntry};
    use crate::npc_engine::NpcEngine;
    use crate::repository::{Account, Heading, MemoryRepository, PlayerStats};
    use crate::spatial::SpatialIndex;

    fn goblin(level: i32, max_hp: i32) -> NpcTemplate {
        NpcTemplate {
            npc_id: 1,
            name: "Goblin".into(),
            description: String::new(),
            body: 12,
            head: 0,
            max_hp,
            level,
            hostile: true,
            attackable: true,
            merchant: false,
            banker: false,
            movement: crate::npc::MovementType::Random,
            respawn_min: 0.0,
            respawn_max: 0.0,
            gold_min: 5,
            gold_max: 5,
            attack_damage: 3,
            attack_cooldown: 2.0,
            aggro_range: 8,
            stock: Vec::new(),
            loot_table: None,
        }
    }

    /// Deterministic config: no dodge, no critical.
    fn pinned_config() -> CombatSection {
        CombatSection {
            base_critical_chance: 0.0,
            base_dodge_chance: 0.0,
            critical_agi_modifier: 0.0,
            dodge_agi_modifier: 0.0,
            ..CombatSection::default()
        }
    }

    struct Arena {
        combat: CombatEngine,
        engine: Arc<NpcEngine>,
        repo: Arc<MemoryRepository>,
    }

    async fn arena(template: NpcTemplate, config: CombatSection) -> Arena {
        let repo = Arc::new(MemoryRepository::new());
        let spatial = Arc::new(SpatialIndex::new());
        let maps = Arc::new(MapRegistry::from_maps(vec![MapData::open(1, 100, 100)]));
        let broadcaster = Arc::new(Broadcaster::new(spatial.clone(), repo.clone(), repo.clone()));
        let engine = NpcEngine::new(
            Arc::new(NpcCatalog::from_templates(vec![template])),
            Arc::new(crate::npc::NpcRegistry::default()),
            repo.clone(),
            maps,
            spatial.clone(),
            broadcaster.clone(),
        );
        engine
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
            spatial,
            repo.clone(),
            broadcaster,
            engine.clone(),
            Arc::new(LootTables::default()),
            Arc::new(ItemCatalog::default()),
        ));
        let combat = CombatEngine::new(
            repo.clone(),
            repo.clone(),
            Arc::new(ItemCatalog::default()),
            engine.registry().clone(),
            repo.clone(),
            death,
            config,
        );

        repo.seed_player(
            Account {
                user_id: 7,
                username: "Alice".into(),
                password: "pw".into(),
                char_body: 1,
                char_head: 1,
                char_class: 1,
            },
            PlayerStats::default(),
            Position {
                map: 1,
                x: 11,
                y: 10,
                heading: Heading::West,
            },
        );

        Arena {
            combat,
            engine,
            repo,
        }
    }

    #[tokio::test]
    async fn melee_range_is_manhattan_one() {
        let arena = arena(goblin(3, 50), pinned_config()).await;
        let at = |x, y| Position {
            map: 1,
            x,
            y,
            heading: Heading::South,
        };
        assert!(arena.combat.can_attack(&at(10, 10), &at(11, 10)));
        assert!(arena.combat.can_attack(&at(10, 10), &at(10, 9)));
        assert!(!arena.combat.can_attack(&at(10, 10), &at(12, 10)));
        assert!(!arena.combat.can_attack(&at(10, 10), &at(11, 11)));
        assert!(!arena.combat.can_attack(&at(10, 10), &at(10, 10)));
    }

    #[tokio::test]
    async fn landed_hits_always_deal_at_least_one() {
        // Level 20 with 0.1 defense/level wipes out the base damage.
        let arena = arena(goblin(20, 1000), pinned_config()).await;
        let npc = arena.engine.registry().find_at(1, 10, 10).unwrap();
        for _ in 0..5 {
            match arena
                .combat
                .player_attacks_npc(7, npc.instance_id)
                .await
                .unwrap()
                .unwrap()
            {
                AttackOutcome::Hit(result) => assert!(result.damage >= 1),
                AttackOutcome::Dodged => panic!("dodge disabled by config"),
            }
        }
    }

    #[tokio::test]
    async fn killing_blow_reports_rewards() {
        let arena = arena(goblin(1, 1), pinned_config()).await;
        let npc = arena.engine.registry().find_at(1, 10, 10).unwrap();
        let outcome = arena
            .combat
            .player_attacks_npc(7, npc.instance_id)
            .await
            .unwrap()
            .unwrap();
        match outcome {
            AttackOutcome::Hit(result) => {
                assert!(result.npc_died);
                assert_eq!(result.gold, Some(5));
                assert!(result.experience.unwrap() >= 10);
                assert!(arena.engine.registry().get(npc.instance_id).is_none());
            }
            AttackOutcome::Dodged => panic!("dodge disabled by config"),
        }
    }

    #[tokio::test]
    async fn guaranteed_critical_multiplies_damage() {
        let config = CombatSection {
            base_critical_chance: 1.0,
            max_critical_chance: 1.0,
            base_dodge_chance: 0.0,
            critical_agi_modifier: 0.0,
            dodge_agi_modifier: 0.0,
            defense_per_level: 0.0,
            ..CombatSection::default()
        };
        let arena = arena(goblin(1, 1000), config).await;
        let npc = arena.engine.registry().find_at(1, 10, 10).unwrap();
        match arena
            .combat
            .player_attacks_npc(7, npc.instance_id)
            .await
            .unwrap()
            .unwrap()
        {
            AttackOutcome::Hit(result) => {
                assert!(result.critical);
                // STR 10 / 2 + fists 5 = 10 base, x1.5 critical.
                assert_eq!(result.damage, 15);
            }
            AttackOutcome::Dodged => panic!("dodge disabled by config"),
        }
    }

    #[tokio::test]
    async fn guaranteed_dodge_prevents_damage() {
        let config = CombatSection {
            base_dodge_chance: 1.0,
            max_dodge_chance: 1.0,
            dodge_agi_modifier: 0.0,
            ..CombatSection::default()
        };
        let arena = arena(goblin(3, 50), config).await;
        let npc = arena.engine.registry().find_at(1, 10, 10).unwrap();

        // NPC swing at the player is dodged.
        let outcome = arena
            .combat
            .npc_attacks_player(npc.instance_id, 7)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, NpcAttackOutcome::Dodged);
        assert_eq!(
            arena.repo.get_stats(7).await.unwrap().unwrap().min_hp,
            100
        );
    }

    #[tokio::test]
    async fn npc_hit_reduces_player_hp_and_marks_death() {
        let arena = arena(goblin(3, 50), pinned_config()).await;
        let npc = arena.engine.registry().find_at(1, 10, 10).unwrap();

        match arena
            .combat
            .npc_attacks_player(npc.instance_id, 7)
            .await
            .unwrap()
            .unwrap()
        {
            NpcAttackOutcome::Hit(result) => {
                assert!(result.damage >= 1);
                assert!(!result.player_died);
                let stats = arena.repo.get_stats(7).await.unwrap().unwrap();
                assert_eq!(stats.min_hp, 100 - result.damage);
            }
            NpcAttackOutcome::Dodged => panic!("dodge disabled by config"),
        }

        // A player at 1 hp dies to any landed hit.
        arena.repo.update_hp(7, 1).await.unwrap();
        match arena
            .combat
            .npc_attacks_player(npc.instance_id, 7)
            .await
            .unwrap()
            .unwrap()
        {
            NpcAttackOutcome::Hit(result) => {
                assert!(result.player_died);
                assert!(!arena.repo.is_alive(7).await.unwrap());
            }
            NpcAttackOutcome::Dodged => panic!("dodge disabled by config"),
        }
    }
}
