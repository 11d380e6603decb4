//! Repository traits over the external key/value store, plus the record
//! types they exchange. Storage keys are opaque to the rest of the
//! server; only these interfaces are visible.

use async_trait::async_trait;

use crate::error::GameError;
use crate::npc::Npc;

pub mod memory;
pub mod redis;

pub use memory::MemoryRepository;
pub use redis::RedisRepository;

// =============================================================================
// Records
// =============================================================================

/// Facing direction on the wire: 1=North, 2=East, 3=South, 4=West.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Heading {
    North = 1,
    East = 2,
    South = 3,
    West = 4,
}

impl Heading {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::North),
            2 => Some(Self::East),
            3 => Some(Self::South),
            4 => Some(Self::West),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStats {
    pub max_hp: i32,
    pub min_hp: i32,
    pub max_mana: i32,
    pub min_mana: i32,
    pub max_sta: i32,
    pub min_sta: i32,
    pub gold: i32,
    pub level: i32,
    pub elu: i32,
    pub exp: i32,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            max_hp: 100,
            min_hp: 100,
            max_mana: 100,
            min_mana: 100,
            max_sta: 100,
            min_sta: 100,
            gold: 0,
            level: 1,
            elu: 300,
            exp: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub map: i32,
    pub x: i32,
    pub y: i32,
    pub heading: Heading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub strength: i32,
    pub agility: i32,
    pub intelligence: i32,
    pub charisma: i32,
    pub constitution: i32,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            strength: 10,
            agility: 10,
            intelligence: 10,
            charisma: 10,
            constitution: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HungerThirst {
    pub max_water: i32,
    pub min_water: i32,
    pub max_hunger: i32,
    pub min_hunger: i32,
    pub water_counter: i32,
    pub hunger_counter: i32,
    pub thirst_flag: bool,
    pub hunger_flag: bool,
}

impl Default for HungerThirst {
    fn default() -> Self {
        Self {
            max_water: 100,
            min_water: 100,
            max_hunger: 100,
            min_hunger: 100,
            water_counter: 0,
            hunger_counter: 0,
            thirst_flag: false,
            hunger_flag: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphedAppearance {
    pub body: i32,
    pub head: i32,
    pub until: f64,
}

/// A temporary attribute buff: delta applied until the timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttributeModifier {
    pub delta: i32,
    pub until: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: i32,
    pub username: String,
    pub password: String,
    pub char_body: i32,
    pub char_head: i32,
    pub char_class: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventorySlotData {
    pub item_id: i32,
    pub quantity: i32,
    pub equipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipmentKind {
    Weapon,
    Armor,
    Helmet,
    Shield,
}

impl EquipmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Armor => "armor",
            Self::Helmet => "helmet",
            Self::Shield => "shield",
        }
    }
}

/// Equipment points into occupied inventory slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Equipment {
    pub weapon: Option<u8>,
    pub armor: Option<u8>,
    pub helmet: Option<u8>,
    pub shield: Option<u8>,
}

impl Equipment {
    pub fn get(&self, kind: EquipmentKind) -> Option<u8> {
        match kind {
            EquipmentKind::Weapon => self.weapon,
            EquipmentKind::Armor => self.armor,
            EquipmentKind::Helmet => self.helmet,
            EquipmentKind::Shield => self.shield,
        }
    }

    pub fn set(&mut self, kind: EquipmentKind, slot: Option<u8>) {
        match kind {
            EquipmentKind::Weapon => self.weapon = slot,
            EquipmentKind::Armor => self.armor = slot,
            EquipmentKind::Helmet => self.helmet = slot,
            EquipmentKind::Shield => self.shield = slot,
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

#[async_trait]
pub trait PlayerRepo: Send + Sync {
    async fn get_stats(&self, user_id: i32) -> Result<Option<PlayerStats>, GameError>;
    async fn set_stats(&self, user_id: i32, stats: &PlayerStats) -> Result<(), GameError>;
    async fn update_hp(&self, user_id: i32, hp: i32) -> Result<(), GameError>;
    async fn update_mana(&self, user_id: i32, mana: i32) -> Result<(), GameError>;
    async fn update_stamina(&self, user_id: i32, stamina: i32) -> Result<(), GameError>;
    async fn update_gold(&self, user_id: i32, gold: i32) -> Result<(), GameError>;
    async fn update_experience(&self, user_id: i32, exp: i32) -> Result<(), GameError>;

    async fn get_position(&self, user_id: i32) -> Result<Option<Position>, GameError>;
    async fn set_position(&self, user_id: i32, position: &Position) -> Result<(), GameError>;
    async fn set_heading(&self, user_id: i32, heading: Heading) -> Result<(), GameError>;

    async fn get_attributes(&self, user_id: i32) -> Result<Option<Attributes>, GameError>;
    async fn set_attributes(&self, user_id: i32, attributes: &Attributes)
        -> Result<(), GameError>;

    async fn get_hunger_thirst(&self, user_id: i32) -> Result<Option<HungerThirst>, GameError>;
    async fn set_hunger_thirst(&self, user_id: i32, value: &HungerThirst)
        -> Result<(), GameError>;

    async fn get_poisoned_until(&self, user_id: i32) -> Result<f64, GameError>;
    async fn update_poisoned_until(&self, user_id: i32, until: f64) -> Result<(), GameError>;

    async fn get_paralyzed_until(&self, user_id: i32) -> Result<f64, GameError>;
    async fn update_paralyzed_until(&self, user_id: i32, until: f64) -> Result<(), GameError>;

    async fn get_strength_modifier(&self, user_id: i32) -> Result<AttributeModifier, GameError>;
    async fn set_strength_modifier(
        &self,
        user_id: i32,
        modifier: AttributeModifier,
    ) -> Result<(), GameError>;
    async fn get_agility_modifier(&self, user_id: i32) -> Result<AttributeModifier, GameError>;
    async fn set_agility_modifier(
        &self,
        user_id: i32,
        modifier: AttributeModifier,
    ) -> Result<(), GameError>;

    async fn get_morphed_appearance(
        &self,
        user_id: i32,
    ) -> Result<Option<MorphedAppearance>, GameError>;
    async fn set_morphed_appearance(
        &self,
        user_id: i32,
        appearance: &MorphedAppearance,
    ) -> Result<(), GameError>;
    async fn clear_morphed_appearance(&self, user_id: i32) -> Result<(), GameError>;

    async fn is_alive(&self, user_id: i32) -> Result<bool, GameError>;
    async fn is_meditating(&self, user_id: i32) -> Result<bool, GameError>;
    async fn set_meditating(&self, user_id: i32, meditating: bool) -> Result<(), GameError>;

    async fn get_spells(&self, user_id: i32) -> Result<Vec<(u8, i32)>, GameError>;
    async fn get_spell_slot(&self, user_id: i32, slot: u8) -> Result<Option<i32>, GameError>;
    async fn set_spell_slot(&self, user_id: i32, slot: u8, spell_id: i32)
        -> Result<(), GameError>;
}

#[async_trait]
pub trait NpcRepo: Send + Sync {
    async fn create_npc_instance(&self, npc: &Npc) -> Result<(), GameError>;
    async fn get_npc(&self, instance_id: u64) -> Result<Option<Npc>, GameError>;
    async fn update_npc_hp(&self, instance_id: u64, hp: i32) -> Result<(), GameError>;
    async fn update_npc_position(
        &self,
        instance_id: u64,
        x: i32,
        y: i32,
        heading: Heading,
    ) -> Result<(), GameError>;
    async fn update_npc_poisoned_until(
        &self,
        instance_id: u64,
        until: f64,
        poisoned_by_user_id: i32,
    ) -> Result<(), GameError>;
    async fn remove_npc(&self, instance_id: u64) -> Result<(), GameError>;
    async fn get_all_npcs(&self) -> Result<Vec<Npc>, GameError>;
    async fn clear_all_npcs(&self) -> Result<(), GameError>;
}

#[async_trait]
pub trait AccountRepo: Send + Sync {
    async fn get_account(&self, username: &str) -> Result<Option<Account>, GameError>;
    async fn get_account_by_user_id(&self, user_id: i32) -> Result<Option<Account>, GameError>;

    /// Credential check happens storage-side so the hashing scheme stays
    /// with the account-creation tool.
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Account>, GameError> {
        match self.get_account(username).await? {
            Some(account) if account.password == password => Ok(Some(account)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
pub trait InventoryRepo: Send + Sync {
    async fn get_slot(
        &self,
        user_id: i32,
        slot: u8,
    ) -> Result<Option<InventorySlotData>, GameError>;
    async fn set_slot(
        &self,
        user_id: i32,
        slot: u8,
        data: InventorySlotData,
    ) -> Result<(), GameError>;
    async fn clear_slot(&self, user_id: i32, slot: u8) -> Result<(), GameError>;
    async fn slots(&self, user_id: i32) -> Result<Vec<(u8, InventorySlotData)>, GameError>;

    async fn get_equipment(&self, user_id: i32) -> Result<Equipment, GameError>;
    async fn set_equipped(
        &self,
        user_id: i32,
        kind: EquipmentKind,
        slot: Option<u8>,
    ) -> Result<(), GameError>;

    async fn bank_slots(&self, user_id: i32) -> Result<Vec<(u8, InventorySlotData)>, GameError>;
    async fn set_bank_slot(
        &self,
        user_id: i32,
        slot: u8,
        data: InventorySlotData,
    ) -> Result<(), GameError>;
    async fn clear_bank_slot(&self, user_id: i32, slot: u8) -> Result<(), GameError>;
}

/// Runtime-tunable effect settings. Lookups are infallible: a storage
/// failure logs and yields the caller's default.
#[async_trait]
pub trait ServerRepo: Send + Sync {
    async fn get_effect_config_bool(&self, key: &str, default: bool) -> bool;
    async fn get_effect_config_int(&self, key: &str, default: i64) -> i64;
    async fn get_effect_config_float(&self, key: &str, default: f64) -> f64;
}
