//! NPC model: catalog templates, live instances, and the in-memory
//! registry every task shares.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use bitflags::bitflags;
use parking_lot::RwLock;
use serde::Deserialize;

use game_core::constants::NPC_CHAR_INDEX_BASE;

use crate::repository::Heading;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NpcFlags: u8 {
        const HOSTILE    = 0b0001;
        const ATTACKABLE = 0b0010;
        const MERCHANT   = 0b0100;
        const BANKER     = 0b1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Static,
    Random,
    Patrol,
}

/// One entry of the NPC catalog. The TOML loader that produces these is
/// an external tool; the server only consumes templates.
#[derive(Debug, Clone, Deserialize)]
pub struct NpcTemplate {
    pub npc_id: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub body: i32,
    #[serde(default)]
    pub head: i32,
    pub max_hp: i32,
    pub level: i32,
    #[serde(default)]
    pub hostile: bool,
    #[serde(default = "default_true")]
    pub attackable: bool,
    #[serde(default)]
    pub merchant: bool,
    #[serde(default)]
    pub banker: bool,
    #[serde(default = "default_movement")]
    pub movement: MovementType,
    #[serde(default)]
    pub respawn_min: f64,
    #[serde(default)]
    pub respawn_max: f64,
    #[serde(default)]
    pub gold_min: i32,
    #[serde(default)]
    pub gold_max: i32,
    #[serde(default = "default_attack_damage")]
    pub attack_damage: i32,
    #[serde(default = "default_attack_cooldown")]
    pub attack_cooldown: f64,
    #[serde(default = "default_aggro_range")]
    pub aggro_range: i32,
    /// Item ids a merchant offers.
    #[serde(default)]
    pub stock: Vec<i32>,
    /// Loot table id rolled on death.
    #[serde(default)]
    pub loot_table: Option<i32>,
}

fn default_true() -> bool {
    true
}

fn default_movement() -> MovementType {
    MovementType::Static
}

fn default_attack_damage() -> i32 {
    3
}

fn default_attack_cooldown() -> f64 {
    2.0
}

fn default_aggro_range() -> i32 {
    8
}

impl NpcTemplate {
    pub fn flags(&self) -> NpcFlags {
        let mut flags = NpcFlags::empty();
        if self.hostile {
            flags |= NpcFlags::HOSTILE;
        }
        if self.attackable {
            flags |= NpcFlags::ATTACKABLE;
        }
        if self.merchant {
            flags |= NpcFlags::MERCHANT;
        }
        if self.banker {
            flags |= NpcFlags::BANKER;
        }
        flags
    }
}

#[derive(Debug, Default)]
pub struct NpcCatalog {
    templates: HashMap<i32, NpcTemplate>,
}

impl NpcCatalog {
    pub fn from_templates(templates: Vec<NpcTemplate>) -> Self {
        let templates = templates.into_iter().map(|t| (t.npc_id, t)).collect();
        Self { templates }
    }

    pub fn get(&self, npc_id: i32) -> Option<&NpcTemplate> {
        self.templates.get(&npc_id)
    }

    pub fn exists(&self, npc_id: i32) -> bool {
        self.templates.contains_key(&npc_id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// World-start spawn list entry, `(map, npc, x, y, heading)`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SpawnEntry {
    pub map_id: i32,
    pub npc_id: i32,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_spawn_heading")]
    pub heading: u8,
}

fn default_spawn_heading() -> u8 {
    game_core::constants::HEADING_SOUTH
}

/// A live NPC instance.
#[derive(Debug, Clone)]
pub struct Npc {
    pub instance_id: u64,
    pub npc_id: i32,
    /// Opaque network id, unique among live characters, >= 10001.
    pub char_index: i32,
    pub map_id: i32,
    pub x: i32,
    pub y: i32,
    pub heading: Heading,
    pub name: String,
    pub description: String,
    pub body: i32,
    pub head: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub level: i32,
    pub flags: NpcFlags,
    pub movement: MovementType,
    pub respawn_min: f64,
    pub respawn_max: f64,
    pub gold_min: i32,
    pub gold_max: i32,
    pub attack_damage: i32,
    pub attack_cooldown: f64,
    pub aggro_range: i32,
    pub loot_table: Option<i32>,
    pub stock: Vec<i32>,
    pub last_attack_time: f64,
    pub poisoned_until: f64,
    pub poisoned_by_user_id: i32,
    pub paralyzed_until: f64,
    pub summoned_by_user_id: i32,
    pub summoned_until: f64,
}

impl Npc {
    pub fn from_template(
        template: &NpcTemplate,
        instance_id: u64,
        char_index: i32,
        map_id: i32,
        x: i32,
        y: i32,
        heading: Heading,
    ) -> Self {
        Self {
            instance_id,
            npc_id: template.npc_id,
            char_index,
            map_id,
            x,
            y,
            heading,
            name: template.name.clone(),
            description: template.description.clone(),
            body: template.body,
            head: template.head,
            hp: template.max_hp,
            max_hp: template.max_hp,
            level: template.level,
            flags: template.flags(),
            movement: template.movement,
            respawn_min: template.respawn_min,
            respawn_max: template.respawn_max,
            gold_min: template.gold_min,
            gold_max: template.gold_max,
            attack_damage: template.attack_damage,
            attack_cooldown: template.attack_cooldown,
            aggro_range: template.aggro_range,
            loot_table: template.loot_table,
            stock: template.stock.clone(),
            last_attack_time: 0.0,
            poisoned_until: 0.0,
            poisoned_by_user_id: 0,
            paralyzed_until: 0.0,
            summoned_by_user_id: 0,
            summoned_until: 0.0,
        }
    }

    pub fn is_hostile(&self) -> bool {
        self.flags.contains(NpcFlags::HOSTILE)
    }

    pub fn is_attackable(&self) -> bool {
        self.flags.contains(NpcFlags::ATTACKABLE)
    }

    pub fn is_merchant(&self) -> bool {
        self.flags.contains(NpcFlags::MERCHANT)
    }

    pub fn is_banker(&self) -> bool {
        self.flags.contains(NpcFlags::BANKER)
    }

    pub fn is_pet(&self) -> bool {
        self.summoned_by_user_id > 0 && self.summoned_until > 0.0
    }

    pub fn is_paralyzed(&self, now: f64) -> bool {
        self.paralyzed_until > 0.0 && now < self.paralyzed_until
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned_until > 0.0
    }
}

/// Allocates charIndexes and instance ids monotonically.
#[derive(Debug)]
pub struct NpcIdAllocator {
    next_char_index: AtomicI32,
    next_instance_id: AtomicU64,
}

impl Default for NpcIdAllocator {
    fn default() -> Self {
        Self {
            next_char_index: AtomicI32::new(NPC_CHAR_INDEX_BASE),
            next_instance_id: AtomicU64::new(1),
        }
    }
}

impl NpcIdAllocator {
    pub fn next_char_index(&self) -> i32 {
        self.next_char_index.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_instance_id(&self) -> u64 {
        self.next_instance_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.next_char_index
            .store(NPC_CHAR_INDEX_BASE, Ordering::Relaxed);
    }
}

/// The live NPC registry shared by handlers and effects. Mutations go
/// through `with_npc_mut` so readers always observe a complete NPC.
#[derive(Debug, Default)]
pub struct NpcRegistry {
    npcs: RwLock<HashMap<u64, Npc>>,
}

impl NpcRegistry {
    pub fn insert(&self, npc: Npc) {
        self.npcs.write().insert(npc.instance_id, npc);
    }

    pub fn remove(&self, instance_id: u64) -> Option<Npc> {
        self.npcs.write().remove(&instance_id)
    }

    pub fn get(&self, instance_id: u64) -> Option<Npc> {
        self.npcs.read().get(&instance_id).cloned()
    }

    pub fn all(&self) -> Vec<Npc> {
        self.npcs.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.npcs.read().len()
    }

    pub fn clear(&self) {
        self.npcs.write().clear();
    }

    pub fn in_map(&self, map_id: i32) -> Vec<Npc> {
        self.npcs
            .read()
            .values()
            .filter(|n| n.map_id == map_id)
            .cloned()
            .collect()
    }

    pub fn find_at(&self, map_id: i32, x: i32, y: i32) -> Option<Npc> {
        self.npcs
            .read()
            .values()
            .find(|n| n.map_id == map_id && n.x == x && n.y == y)
            .cloned()
    }

    pub fn find_by_char_index(&self, char_index: i32) -> Option<Npc> {
        self.npcs
            .read()
            .values()
            .find(|n| n.char_index == char_index)
            .cloned()
    }

    pub fn hostiles(&self) -> Vec<Npc> {
        self.npcs
            .read()
            .values()
            .filter(|n| n.is_hostile())
            .cloned()
            .collect()
    }

    pub fn pets(&self) -> Vec<Npc> {
        self.npcs
            .read()
            .values()
            .filter(|n| n.is_pet())
            .cloned()
            .collect()
    }

    pub fn poisoned(&self) -> Vec<Npc> {
        self.npcs
            .read()
            .values()
            .filter(|n| n.is_poisoned() && n.hp > 0)
            .cloned()
            .collect()
    }

    pub fn expired_pets(&self, now: f64) -> Vec<Npc> {
        self.npcs
            .read()
            .values()
            .filter(|n| n.is_pet() && now >= n.summoned_until)
            .cloned()
            .collect()
    }

    pub fn with_npc_mut<R>(&self, instance_id: u64, f: impl FnOnce(&mut Npc) -> R) -> Option<R> {
        self.npcs.write().get_mut(&instance_id).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::now_secs;

    fn goblin_template() -> NpcTemplate {
        NpcTemplate {
            npc_id: 1,
            name: "Goblin".into(),
            description: "Una criatura verde y hostil.".into(),
            body: 12,
            head: 0,
            max_hp: 50,
            level: 3,
            hostile: true,
            attackable: true,
            merchant: false,
            banker: false,
            movement: MovementType::Random,
            respawn_min: 30.0,
            respawn_max: 45.0,
            gold_min: 10,
            gold_max: 25,
            attack_damage: 4,
            attack_cooldown: 2.0,
            aggro_range: 8,
            stock: Vec::new(),
            loot_table: None,
        }
    }

    #[test]
    fn template_flags() {
        let template = goblin_template();
        let flags = template.flags();
        assert!(flags.contains(NpcFlags::HOSTILE));
        assert!(flags.contains(NpcFlags::ATTACKABLE));
        assert!(!flags.contains(NpcFlags::MERCHANT));
    }

    #[test]
    fn instance_from_template() {
        let npc = Npc::from_template(&goblin_template(), 1, 10001, 1, 50, 50, Heading::South);
        assert_eq!(npc.hp, npc.max_hp);
        assert!(npc.is_hostile());
        assert!(!npc.is_pet());
        assert!(!npc.is_paralyzed(now_secs()));
    }

    #[test]
    fn allocator_is_monotonic_from_base() {
        let alloc = NpcIdAllocator::default();
        assert_eq!(alloc.next_char_index(), 10001);
        assert_eq!(alloc.next_char_index(), 10002);
        assert_ne!(alloc.next_instance_id(), alloc.next_instance_id());
    }

    #[test]
    fn registry_queries() {
        let registry = NpcRegistry::default();
        let template = goblin_template();
        let a = Npc::from_template(&template, 1, 10001, 1, 10, 10, Heading::South);
        let mut b = Npc::from_template(&template, 2, 10002, 2, 20, 20, Heading::North);
        b.summoned_by_user_id = 7;
        b.summoned_until = now_secs() + 60.0;
        registry.insert(a);
        registry.insert(b);

        assert_eq!(registry.count(), 2);
        assert_eq!(registry.in_map(1).len(), 1);
        assert!(registry.find_at(1, 10, 10).is_some());
        assert!(registry.find_at(1, 11, 10).is_none());
        assert_eq!(registry.hostiles().len(), 2);
        assert_eq!(registry.pets().len(), 1);
        assert!(registry.expired_pets(now_secs()).is_empty());

        registry.with_npc_mut(1, |npc| npc.hp = 1);
        assert_eq!(registry.get(1).unwrap().hp, 1);

        let removed = registry.remove(1).unwrap();
        assert_eq!(removed.char_index, 10001);
        assert_eq!(registry.count(), 1);
    }
}
