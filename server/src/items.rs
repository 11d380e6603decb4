//! Item definitions and loot tables. The TOML catalogue files are
//! parsed by external tooling; the server receives ready-made entries.

use std::collections::HashMap;

use rand::Rng;
use serde::Deserialize;

use game_core::protocol::outbound::SlotItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Weapon,
    Armor,
    Helmet,
    Shield,
    Consumable,
    Gold,
    Other,
}

impl ItemType {
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Weapon => 1,
            Self::Armor => 2,
            Self::Helmet => 3,
            Self::Shield => 4,
            Self::Consumable => 5,
            Self::Gold => 6,
            Self::Other => 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemDef {
    pub id: i32,
    pub name: String,
    pub grh_index: i16,
    pub item_type: ItemType,
    #[serde(default)]
    pub min_hit: i32,
    #[serde(default)]
    pub max_hit: i32,
    #[serde(default)]
    pub min_def: i32,
    #[serde(default)]
    pub max_def: i32,
    #[serde(default)]
    pub sale_price: f32,
}

impl ItemDef {
    pub fn to_slot_item(&self, amount: i32, equipped: bool) -> SlotItem {
        SlotItem {
            item_id: self.id as i16,
            name: self.name.clone(),
            amount: amount as i16,
            equipped,
            grh_index: self.grh_index,
            item_type: self.item_type.wire_code(),
            max_hit: self.max_hit as i16,
            min_hit: self.min_hit as i16,
            max_def: self.max_def as i16,
            min_def: self.min_def as i16,
            sale_price: self.sale_price,
        }
    }
}

#[derive(Debug, Default)]
pub struct ItemCatalog {
    items: HashMap<i32, ItemDef>,
}

impl ItemCatalog {
    pub fn from_items(items: Vec<ItemDef>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id, i)).collect(),
        }
    }

    pub fn get(&self, item_id: i32) -> Option<&ItemDef> {
        self.items.get(&item_id)
    }

    /// `(min_hit, max_hit)` when the item is a weapon.
    pub fn weapon_damage(&self, item_id: i32) -> Option<(i32, i32)> {
        self.items
            .get(&item_id)
            .filter(|i| i.item_type == ItemType::Weapon)
            .map(|i| (i.min_hit, i.max_hit))
    }

    /// `(min_def, max_def)` when the item is body armor.
    pub fn armor_defense(&self, item_id: i32) -> Option<(i32, i32)> {
        self.items
            .get(&item_id)
            .filter(|i| i.item_type == ItemType::Armor)
            .map(|i| (i.min_def, i.max_def))
    }
}

/// One possible drop in a loot table.
#[derive(Debug, Clone, Deserialize)]
pub struct LootEntry {
    pub item_id: i32,
    pub chance: f64,
    pub min_quantity: i32,
    pub max_quantity: i32,
}

#[derive(Debug, Default)]
pub struct LootTables {
    tables: HashMap<i32, Vec<LootEntry>>,
}

impl LootTables {
    pub fn from_tables(tables: HashMap<i32, Vec<LootEntry>>) -> Self {
        Self { tables }
    }

    /// Independent roll per entry; `(item_id, quantity)` for each hit.
    pub fn roll(&self, table_id: i32) -> Vec<(i32, i32)> {
        let Some(entries) = self.tables.get(&table_id) else {
            return Vec::new();
        };
        let mut rng = rand::thread_rng();
        let mut drops = Vec::new();
        for entry in entries {
            if rng.gen_bool(entry.chance.clamp(0.0, 1.0)) {
                let quantity = if entry.max_quantity > entry.min_quantity {
                    rng.gen_range(entry.min_quantity..=entry.max_quantity)
                } else {
                    entry.min_quantity
                };
                if quantity > 0 {
                    drops.push((entry.item_id, quantity));
                }
            }
        }
        drops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sword() -> ItemDef {
        ItemDef {
            id: 44,
            name: "Espada larga".into(),
            grh_index: 820,
            item_type: ItemType::Weapon,
            min_hit: 4,
            max_hit: 9,
            min_def: 0,
            max_def: 0,
            sale_price: 120.0,
        }
    }

    fn leather_armor() -> ItemDef {
        ItemDef {
            id: 60,
            name: "Armadura de cuero".into(),
            grh_index: 830,
            item_type: ItemType::Armor,
            min_hit: 0,
            max_hit: 0,
            min_def: 2,
            max_def: 6,
            sale_price: 80.0,
        }
    }

    #[test]
    fn catalog_lookups_respect_item_type() {
        let catalog = ItemCatalog::from_items(vec![sword(), leather_armor()]);
        assert_eq!(catalog.weapon_damage(44), Some((4, 9)));
        assert_eq!(catalog.weapon_damage(60), None);
        assert_eq!(catalog.armor_defense(60), Some((2, 6)));
        assert_eq!(catalog.armor_defense(44), None);
        assert!(catalog.get(999).is_none());
    }

    #[test]
    fn slot_item_projection() {
        let slot = sword().to_slot_item(1, true);
        assert_eq!(slot.item_id, 44);
        assert!(slot.equipped);
        assert_eq!(slot.item_type, ItemType::Weapon.wire_code());
    }

    #[test]
    fn certain_loot_always_drops() {
        let tables = LootTables::from_tables(HashMap::from([(
            1,
            vec![LootEntry {
                item_id: 60,
                chance: 1.0,
                min_quantity: 2,
                max_quantity: 2,
            }],
        )]));
        for _ in 0..10 {
            assert_eq!(tables.roll(1), vec![(60, 2)]);
        }
    }

    #[test]
    fn impossible_loot_never_drops() {
        let tables = LootTables::from_tables(HashMap::from([(
            1,
            vec![LootEntry {
                item_id: 60,
                chance: 0.0,
                min_quantity: 1,
                max_quantity: 1,
            }],
        )]));
        for _ in 0..10 {
            assert!(tables.roll(1).is_empty());
        }
        assert!(tables.roll(99).is_empty());
    }
}
