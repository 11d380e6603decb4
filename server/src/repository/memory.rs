//! In-memory repository backing tests and store-less runs. One struct
//! implements every repository trait over plain hash maps.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::GameError;
use crate::npc::Npc;

use super::{
    Account, AccountRepo, AttributeModifier, Attributes, Equipment, EquipmentKind, Heading,
    HungerThirst, InventoryRepo, InventorySlotData, MorphedAppearance, NpcRepo, PlayerRepo,
    PlayerStats, Position, ServerRepo,
};

#[derive(Debug, Default)]
struct PlayerState {
    stats: Option<PlayerStats>,
    position: Option<Position>,
    attributes: Option<Attributes>,
    hunger_thirst: Option<HungerThirst>,
    poisoned_until: f64,
    paralyzed_until: f64,
    strength_modifier: AttributeModifier,
    agility_modifier: AttributeModifier,
    morphed: Option<MorphedAppearance>,
    meditating: bool,
    spells: HashMap<u8, i32>,
    inventory: HashMap<u8, InventorySlotData>,
    bank: HashMap<u8, InventorySlotData>,
    equipment: Equipment,
}

#[derive(Default)]
pub struct MemoryRepository {
    players: Mutex<HashMap<i32, PlayerState>>,
    accounts: Mutex<HashMap<String, Account>>,
    npcs: Mutex<HashMap<u64, Npc>>,
    effect_config: Mutex<HashMap<String, String>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account and its player state in one call.
    pub fn seed_player(&self, account: Account, stats: PlayerStats, position: Position) {
        let user_id = account.user_id;
        self.accounts
            .lock()
            .insert(account.username.to_lowercase(), account);
        let mut players = self.players.lock();
        let state = players.entry(user_id).or_default();
        state.stats = Some(stats);
        state.position = Some(position);
        state.attributes = Some(Attributes::default());
        state.hunger_thirst = Some(HungerThirst::default());
    }

    pub fn set_effect_config(&self, key: &str, value: &str) {
        self.effect_config
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    fn with_player<R>(
        &self,
        user_id: i32,
        f: impl FnOnce(&mut PlayerState) -> R,
    ) -> Result<R, GameError> {
        let mut players = self.players.lock();
        Ok(f(players.entry(user_id).or_default()))
    }
}

#[async_trait]
impl PlayerRepo for MemoryRepository {
    async fn get_stats(&self, user_id: i32) -> Result<Option<PlayerStats>, GameError> {
        self.with_player(user_id, |p| p.stats.clone())
    }

    async fn set_stats(&self, user_id: i32, stats: &PlayerStats) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.stats = Some(stats.clone()))
    }

    async fn update_hp(&self, user_id: i32, hp: i32) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            if let Some(stats) = p.stats.as_mut() {
                stats.min_hp = hp.clamp(0, stats.max_hp);
            }
        })
    }

    async fn update_mana(&self, user_id: i32, mana: i32) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            if let Some(stats) = p.stats.as_mut() {
                stats.min_mana = mana.clamp(0, stats.max_mana);
            }
        })
    }

    async fn update_stamina(&self, user_id: i32, stamina: i32) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            if let Some(stats) = p.stats.as_mut() {
                stats.min_sta = stamina.clamp(0, stats.max_sta);
            }
        })
    }

    async fn update_gold(&self, user_id: i32, gold: i32) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            if let Some(stats) = p.stats.as_mut() {
                stats.gold = gold.max(0);
            }
        })
    }

    async fn update_experience(&self, user_id: i32, exp: i32) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            if let Some(stats) = p.stats.as_mut() {
                stats.exp = exp;
            }
        })
    }

    async fn get_position(&self, user_id: i32) -> Result<Option<Position>, GameError> {
        self.with_player(user_id, |p| p.position)
    }

    async fn set_position(&self, user_id: i32, position: &Position) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.position = Some(*position))
    }

    async fn set_heading(&self, user_id: i32, heading: Heading) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            if let Some(position) = p.position.as_mut() {
                position.heading = heading;
            }
        })
    }

    async fn get_attributes(&self, user_id: i32) -> Result<Option<Attributes>, GameError> {
        self.with_player(user_id, |p| p.attributes)
    }

    async fn set_attributes(
        &self,
        user_id: i32,
        attributes: &Attributes,
    ) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.attributes = Some(*attributes))
    }

    async fn get_hunger_thirst(&self, user_id: i32) -> Result<Option<HungerThirst>, GameError> {
        self.with_player(user_id, |p| p.hunger_thirst.clone())
    }

    async fn set_hunger_thirst(
        &self,
        user_id: i32,
        value: &HungerThirst,
    ) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.hunger_thirst = Some(value.clone()))
    }

    async fn get_poisoned_until(&self, user_id: i32) -> Result<f64, GameError> {
        self.with_player(user_id, |p| p.poisoned_until)
    }

    async fn update_poisoned_until(&self, user_id: i32, until: f64) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.poisoned_until = until)
    }

    async fn get_paralyzed_until(&self, user_id: i32) -> Result<f64, GameError> {
        self.with_player(user_id, |p| p.paralyzed_until)
    }

    async fn update_paralyzed_until(&self, user_id: i32, until: f64) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.paralyzed_until = until)
    }

    async fn get_strength_modifier(&self, user_id: i32) -> Result<AttributeModifier, GameError> {
        self.with_player(user_id, |p| p.strength_modifier)
    }

    async fn set_strength_modifier(
        &self,
        user_id: i32,
        modifier: AttributeModifier,
    ) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.strength_modifier = modifier)
    }

    async fn get_agility_modifier(&self, user_id: i32) -> Result<AttributeModifier, GameError> {
        self.with_player(user_id, |p| p.agility_modifier)
    }

    async fn set_agility_modifier(
        &self,
        user_id: i32,
        modifier: AttributeModifier,
    ) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.agility_modifier = modifier)
    }

    async fn get_morphed_appearance(
        &self,
        user_id: i32,
    ) -> Result<Option<MorphedAppearance>, GameError> {
        self.with_player(user_id, |p| p.morphed)
    }

    async fn set_morphed_appearance(
        &self,
        user_id: i32,
        appearance: &MorphedAppearance,
    ) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.morphed = Some(*appearance))
    }

    async fn clear_morphed_appearance(&self, user_id: i32) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.morphed = None)
    }

    async fn is_alive(&self, user_id: i32) -> Result<bool, GameError> {
        self.with_player(user_id, |p| {
            p.stats.as_ref().map(|s| s.min_hp > 0).unwrap_or(false)
        })
    }

    async fn is_meditating(&self, user_id: i32) -> Result<bool, GameError> {
        self.with_player(user_id, |p| p.meditating)
    }

    async fn set_meditating(&self, user_id: i32, meditating: bool) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.meditating = meditating)
    }

    async fn get_spells(&self, user_id: i32) -> Result<Vec<(u8, i32)>, GameError> {
        self.with_player(user_id, |p| {
            let mut spells: Vec<(u8, i32)> = p.spells.iter().map(|(&s, &id)| (s, id)).collect();
            spells.sort_by_key(|(slot, _)| *slot);
            spells
        })
    }

    async fn get_spell_slot(&self, user_id: i32, slot: u8) -> Result<Option<i32>, GameError> {
        self.with_player(user_id, |p| p.spells.get(&slot).copied())
    }

    async fn set_spell_slot(
        &self,
        user_id: i32,
        slot: u8,
        spell_id: i32,
    ) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            p.spells.insert(slot, spell_id);
        })
    }
}

#[async_trait]
impl NpcRepo for MemoryRepository {
    async fn create_npc_instance(&self, npc: &Npc) -> Result<(), GameError> {
        self.npcs.lock().insert(npc.instance_id, npc.clone());
        Ok(())
    }

    async fn get_npc(&self, instance_id: u64) -> Result<Option<Npc>, GameError> {
        Ok(self.npcs.lock().get(&instance_id).cloned())
    }

    async fn update_npc_hp(&self, instance_id: u64, hp: i32) -> Result<(), GameError> {
        if let Some(npc) = self.npcs.lock().get_mut(&instance_id) {
            npc.hp = hp.clamp(0, npc.max_hp);
        }
        Ok(())
    }

    async fn update_npc_position(
        &self,
        instance_id: u64,
        x: i32,
        y: i32,
        heading: Heading,
    ) -> Result<(), GameError> {
        if let Some(npc) = self.npcs.lock().get_mut(&instance_id) {
            npc.x = x;
            npc.y = y;
            npc.heading = heading;
        }
        Ok(())
    }

    async fn update_npc_poisoned_until(
        &self,
        instance_id: u64,
        until: f64,
        poisoned_by_user_id: i32,
    ) -> Result<(), GameError> {
        if let Some(npc) = self.npcs.lock().get_mut(&instance_id) {
            npc.poisoned_until = until;
            npc.poisoned_by_user_id = poisoned_by_user_id;
        }
        Ok(())
    }

    async fn remove_npc(&self, instance_id: u64) -> Result<(), GameError> {
        self.npcs.lock().remove(&instance_id);
        Ok(())
    }

    async fn get_all_npcs(&self) -> Result<Vec<Npc>, GameError> {
        Ok(self.npcs.lock().values().cloned().collect())
    }

    async fn clear_all_npcs(&self) -> Result<(), GameError> {
        self.npcs.lock().clear();
        Ok(())
    }
}

#[async_trait]
impl AccountRepo for MemoryRepository {
    async fn get_account(&self, username: &str) -> Result<Option<Account>, GameError> {
        Ok(self.accounts.lock().get(&username.to_lowercase()).cloned())
    }

    async fn get_account_by_user_id(&self, user_id: i32) -> Result<Option<Account>, GameError> {
        Ok(self
            .accounts
            .lock()
            .values()
            .find(|a| a.user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl InventoryRepo for MemoryRepository {
    async fn get_slot(
        &self,
        user_id: i32,
        slot: u8,
    ) -> Result<Option<InventorySlotData>, GameError> {
        self.with_player(user_id, |p| p.inventory.get(&slot).copied())
    }

    async fn set_slot(
        &self,
        user_id: i32,
        slot: u8,
        data: InventorySlotData,
    ) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            p.inventory.insert(slot, data);
        })
    }

    async fn clear_slot(&self, user_id: i32, slot: u8) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            p.inventory.remove(&slot);
        })
    }

    async fn slots(&self, user_id: i32) -> Result<Vec<(u8, InventorySlotData)>, GameError> {
        self.with_player(user_id, |p| {
            let mut slots: Vec<_> = p.inventory.iter().map(|(&s, &d)| (s, d)).collect();
            slots.sort_by_key(|(slot, _)| *slot);
            slots
        })
    }

    async fn get_equipment(&self, user_id: i32) -> Result<Equipment, GameError> {
        self.with_player(user_id, |p| p.equipment)
    }

    async fn set_equipped(
        &self,
        user_id: i32,
        kind: EquipmentKind,
        slot: Option<u8>,
    ) -> Result<(), GameError> {
        self.with_player(user_id, |p| p.equipment.set(kind, slot))
    }

    async fn bank_slots(&self, user_id: i32) -> Result<Vec<(u8, InventorySlotData)>, GameError> {
        self.with_player(user_id, |p| {
            let mut slots: Vec<_> = p.bank.iter().map(|(&s, &d)| (s, d)).collect();
            slots.sort_by_key(|(slot, _)| *slot);
            slots
        })
    }

    async fn set_bank_slot(
        &self,
        user_id: i32,
        slot: u8,
        data: InventorySlotData,
    ) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            p.bank.insert(slot, data);
        })
    }

    async fn clear_bank_slot(&self, user_id: i32, slot: u8) -> Result<(), GameError> {
        self.with_player(user_id, |p| {
            p.bank.remove(&slot);
        })
    }
}

#[async_trait]
impl ServerRepo for MemoryRepository {
    async fn get_effect_config_bool(&self, key: &str, default: bool) -> bool {
        self.effect_config
            .lock()
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    async fn get_effect_config_int(&self, key: &str, default: i64) -> i64 {
        self.effect_config
            .lock()
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    async fn get_effect_config_float(&self, key: &str, default: f64) -> f64 {
        self.effect_config
            .lock()
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
