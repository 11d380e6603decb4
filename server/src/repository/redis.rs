//! Redis/KeyDB-backed repositories. One hash per entity; field names are
//! the storage contract with the account and catalogue tooling.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::error::GameError;
use crate::npc::{MovementType, Npc, NpcFlags};

use super::{
    Account, AccountRepo, AttributeModifier, Attributes, Equipment, EquipmentKind, Heading,
    HungerThirst, InventoryRepo, InventorySlotData, MorphedAppearance, NpcRepo, PlayerRepo,
    PlayerStats, Position, ServerRepo,
};

#[derive(Clone)]
pub struct RedisRepository {
    con: MultiplexedConnection,
}

impl RedisRepository {
    pub fn new(con: MultiplexedConnection) -> Self {
        Self { con }
    }

    pub async fn connect(url: &str) -> Result<Self, GameError> {
        let client = redis::Client::open(url)?;
        let con = client.get_multiplexed_async_connection().await?;
        Ok(Self { con })
    }

    fn con(&self) -> MultiplexedConnection {
        self.con.clone()
    }
}

fn field_i32(map: &HashMap<String, String>, field: &str, default: i32) -> i32 {
    map.get(field).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn field_f64(map: &HashMap<String, String>, field: &str, default: f64) -> f64 {
    map.get(field).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn field_bool(map: &HashMap<String, String>, field: &str) -> bool {
    matches!(map.get(field).map(String::as_str), Some("1") | Some("true"))
}

fn stats_key(user_id: i32) -> String {
    format!("player:{user_id}:stats")
}

fn position_key(user_id: i32) -> String {
    format!("player:{user_id}:position")
}

fn attributes_key(user_id: i32) -> String {
    format!("player:{user_id}:attributes")
}

fn hunger_key(user_id: i32) -> String {
    format!("player:{user_id}:hunger_thirst")
}

fn state_key(user_id: i32) -> String {
    format!("player:{user_id}:state")
}

fn spells_key(user_id: i32) -> String {
    format!("player:{user_id}:spells")
}

fn inventory_key(user_id: i32) -> String {
    format!("inventory:{user_id}")
}

fn bank_key(user_id: i32) -> String {
    format!("bank:{user_id}")
}

fn equipment_key(user_id: i32) -> String {
    format!("equipment:{user_id}")
}

fn npc_key(instance_id: u64) -> String {
    format!("npc:{instance_id}")
}

const NPC_INDEX_KEY: &str = "npcs";

fn encode_slot(data: &InventorySlotData) -> String {
    format!(
        "{}:{}:{}",
        data.item_id,
        data.quantity,
        u8::from(data.equipped)
    )
}

fn decode_slot(raw: &str) -> Option<InventorySlotData> {
    let mut parts = raw.split(':');
    let item_id = parts.next()?.parse().ok()?;
    let quantity = parts.next()?.parse().ok()?;
    let equipped = parts.next()? == "1";
    Some(InventorySlotData {
        item_id,
        quantity,
        equipped,
    })
}

fn decode_slot_map(raw: HashMap<String, String>) -> Vec<(u8, InventorySlotData)> {
    let mut slots: Vec<(u8, InventorySlotData)> = raw
        .iter()
        .filter_map(|(slot, value)| Some((slot.parse().ok()?, decode_slot(value)?)))
        .collect();
    slots.sort_by_key(|(slot, _)| *slot);
    slots
}

#[async_trait]
impl PlayerRepo for RedisRepository {
    async fn get_stats(&self, user_id: i32) -> Result<Option<PlayerStats>, GameError> {
        let map: HashMap<String, String> = self.con().hgetall(stats_key(user_id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        Ok(Some(PlayerStats {
            max_hp: field_i32(&map, "max_hp", 100),
            min_hp: field_i32(&map, "min_hp", 100),
            max_mana: field_i32(&map, "max_mana", 100),
            min_mana: field_i32(&map, "min_mana", 100),
            max_sta: field_i32(&map, "max_sta", 100),
            min_sta: field_i32(&map, "min_sta", 100),
            gold: field_i32(&map, "gold", 0),
            level: field_i32(&map, "level", 1),
            elu: field_i32(&map, "elu", 300),
            exp: field_i32(&map, "exp", 0),
        }))
    }

    async fn set_stats(&self, user_id: i32, stats: &PlayerStats) -> Result<(), GameError> {
        let items = [
            ("max_hp", stats.max_hp.to_string()),
            ("min_hp", stats.min_hp.to_string()),
            ("max_mana", stats.max_mana.to_string()),
            ("min_mana", stats.min_mana.to_string()),
            ("max_sta", stats.max_sta.to_string()),
            ("min_sta", stats.min_sta.to_string()),
            ("gold", stats.gold.to_string()),
            ("level", stats.level.to_string()),
            ("elu", stats.elu.to_string()),
            ("exp", stats.exp.to_string()),
        ];
        self.con()
            .hset_multiple::<_, _, _, ()>(stats_key(user_id), &items)
            .await?;
        Ok(())
    }

    async fn update_hp(&self, user_id: i32, hp: i32) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(stats_key(user_id), "min_hp", hp.max(0))
            .await?;
        Ok(())
    }

    async fn update_mana(&self, user_id: i32, mana: i32) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(stats_key(user_id), "min_mana", mana.max(0))
            .await?;
        Ok(())
    }

    async fn update_stamina(&self, user_id: i32, stamina: i32) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(stats_key(user_id), "min_sta", stamina.max(0))
            .await?;
        Ok(())
    }

    async fn update_gold(&self, user_id: i32, gold: i32) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(stats_key(user_id), "gold", gold.max(0))
            .await?;
        Ok(())
    }

    async fn update_experience(&self, user_id: i32, exp: i32) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(stats_key(user_id), "exp", exp)
            .await?;
        Ok(())
    }

    async fn get_position(&self, user_id: i32) -> Result<Option<Position>, GameError> {
        let map: HashMap<String, String> = self.con().hgetall(position_key(user_id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        let heading = Heading::from_u8(field_i32(&map, "heading", 3) as u8)
            .unwrap_or(Heading::South);
        Ok(Some(Position {
            map: field_i32(&map, "map", 1),
            x: field_i32(&map, "x", 1),
            y: field_i32(&map, "y", 1),
            heading,
        }))
    }

    async fn set_position(&self, user_id: i32, position: &Position) -> Result<(), GameError> {
        let items = [
            ("map", position.map.to_string()),
            ("x", position.x.to_string()),
            ("y", position.y.to_string()),
            ("heading", (position.heading as u8).to_string()),
        ];
        self.con()
            .hset_multiple::<_, _, _, ()>(position_key(user_id), &items)
            .await?;
        Ok(())
    }

    async fn set_heading(&self, user_id: i32, heading: Heading) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(position_key(user_id), "heading", heading as u8)
            .await?;
        Ok(())
    }

    async fn get_attributes(&self, user_id: i32) -> Result<Option<Attributes>, GameError> {
        let map: HashMap<String, String> = self.con().hgetall(attributes_key(user_id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        Ok(Some(Attributes {
            strength: field_i32(&map, "strength", 10),
            agility: field_i32(&map, "agility", 10),
            intelligence: field_i32(&map, "intelligence", 10),
            charisma: field_i32(&map, "charisma", 10),
            constitution: field_i32(&map, "constitution", 10),
        }))
    }

    async fn set_attributes(
        &self,
        user_id: i32,
        attributes: &Attributes,
    ) -> Result<(), GameError> {
        let items = [
            ("strength", attributes.strength.to_string()),
            ("agility", attributes.agility.to_string()),
            ("intelligence", attributes.intelligence.to_string()),
            ("charisma", attributes.charisma.to_string()),
            ("constitution", attributes.constitution.to_string()),
        ];
        self.con()
            .hset_multiple::<_, _, _, ()>(attributes_key(user_id), &items)
            .await?;
        Ok(())
    }

    async fn get_hunger_thirst(&self, user_id: i32) -> Result<Option<HungerThirst>, GameError> {
        let map: HashMap<String, String> = self.con().hgetall(hunger_key(user_id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        Ok(Some(HungerThirst {
            max_water: field_i32(&map, "max_water", 100),
            min_water: field_i32(&map, "min_water", 100),
            max_hunger: field_i32(&map, "max_hunger", 100),
            min_hunger: field_i32(&map, "min_hunger", 100),
            water_counter: field_i32(&map, "water_counter", 0),
            hunger_counter: field_i32(&map, "hunger_counter", 0),
            thirst_flag: field_bool(&map, "thirst_flag"),
            hunger_flag: field_bool(&map, "hunger_flag"),
        }))
    }

    async fn set_hunger_thirst(
        &self,
        user_id: i32,
        value: &HungerThirst,
    ) -> Result<(), GameError> {
        let items = [
            ("max_water", value.max_water.to_string()),
            ("min_water", value.min_water.to_string()),
            ("max_hunger", value.max_hunger.to_string()),
            ("min_hunger", value.min_hunger.to_string()),
            ("water_counter", value.water_counter.to_string()),
            ("hunger_counter", value.hunger_counter.to_string()),
            ("thirst_flag", u8::from(value.thirst_flag).to_string()),
            ("hunger_flag", u8::from(value.hunger_flag).to_string()),
        ];
        self.con()
            .hset_multiple::<_, _, _, ()>(hunger_key(user_id), &items)
            .await?;
        Ok(())
    }

    async fn get_poisoned_until(&self, user_id: i32) -> Result<f64, GameError> {
        let value: Option<String> = self
            .con()
            .hget(state_key(user_id), "poisoned_until")
            .await?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0.0))
    }

    async fn update_poisoned_until(&self, user_id: i32, until: f64) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(state_key(user_id), "poisoned_until", until)
            .await?;
        Ok(())
    }

    async fn get_paralyzed_until(&self, user_id: i32) -> Result<f64, GameError> {
        let value: Option<String> = self
            .con()
            .hget(state_key(user_id), "paralyzed_until")
            .await?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0.0))
    }

    async fn update_paralyzed_until(&self, user_id: i32, until: f64) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(state_key(user_id), "paralyzed_until", until)
            .await?;
        Ok(())
    }

    async fn get_strength_modifier(&self, user_id: i32) -> Result<AttributeModifier, GameError> {
        let map: HashMap<String, String> = self.con().hgetall(state_key(user_id)).await?;
        Ok(AttributeModifier {
            delta: field_i32(&map, "str_mod_delta", 0),
            until: field_f64(&map, "str_mod_until", 0.0),
        })
    }

    async fn set_strength_modifier(
        &self,
        user_id: i32,
        modifier: AttributeModifier,
    ) -> Result<(), GameError> {
        let items = [
            ("str_mod_delta", modifier.delta.to_string()),
            ("str_mod_until", modifier.until.to_string()),
        ];
        self.con()
            .hset_multiple::<_, _, _, ()>(state_key(user_id), &items)
            .await?;
        Ok(())
    }

    async fn get_agility_modifier(&self, user_id: i32) -> Result<AttributeModifier, GameError> {
        let map: HashMap<String, String> = self.con().hgetall(state_key(user_id)).await?;
        Ok(AttributeModifier {
            delta: field_i32(&map, "agi_mod_delta", 0),
            until: field_f64(&map, "agi_mod_until", 0.0),
        })
    }

    async fn set_agility_modifier(
        &self,
        user_id: i32,
        modifier: AttributeModifier,
    ) -> Result<(), GameError> {
        let items = [
            ("agi_mod_delta", modifier.delta.to_string()),
            ("agi_mod_until", modifier.until.to_string()),
        ];
        self.con()
            .hset_multiple::<_, _, _, ()>(state_key(user_id), &items)
            .await?;
        Ok(())
    }

    async fn get_morphed_appearance(
        &self,
        user_id: i32,
    ) -> Result<Option<MorphedAppearance>, GameError> {
        let map: HashMap<String, String> = self.con().hgetall(state_key(user_id)).await?;
        let until = field_f64(&map, "morph_until", 0.0);
        if until <= 0.0 {
            return Ok(None);
        }
        Ok(Some(MorphedAppearance {
            body: field_i32(&map, "morph_body", 1),
            head: field_i32(&map, "morph_head", 1),
            until,
        }))
    }

    async fn set_morphed_appearance(
        &self,
        user_id: i32,
        appearance: &MorphedAppearance,
    ) -> Result<(), GameError> {
        let items = [
            ("morph_body", appearance.body.to_string()),
            ("morph_head", appearance.head.to_string()),
            ("morph_until", appearance.until.to_string()),
        ];
        self.con()
            .hset_multiple::<_, _, _, ()>(state_key(user_id), &items)
            .await?;
        Ok(())
    }

    async fn clear_morphed_appearance(&self, user_id: i32) -> Result<(), GameError> {
        self.con()
            .hdel::<_, _, ()>(
                state_key(user_id),
                &["morph_body", "morph_head", "morph_until"],
            )
            .await?;
        Ok(())
    }

    async fn is_alive(&self, user_id: i32) -> Result<bool, GameError> {
        let hp: Option<String> = self.con().hget(stats_key(user_id), "min_hp").await?;
        Ok(hp.and_then(|v| v.parse::<i32>().ok()).unwrap_or(0) > 0)
    }

    async fn is_meditating(&self, user_id: i32) -> Result<bool, GameError> {
        let value: Option<String> = self.con().hget(state_key(user_id), "meditating").await?;
        Ok(matches!(value.as_deref(), Some("1") | Some("true")))
    }

    async fn set_meditating(&self, user_id: i32, meditating: bool) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(state_key(user_id), "meditating", u8::from(meditating))
            .await?;
        Ok(())
    }

    async fn get_spells(&self, user_id: i32) -> Result<Vec<(u8, i32)>, GameError> {
        let map: HashMap<String, String> = self.con().hgetall(spells_key(user_id)).await?;
        let mut spells: Vec<(u8, i32)> = map
            .iter()
            .filter_map(|(slot, id)| Some((slot.parse().ok()?, id.parse().ok()?)))
            .collect();
        spells.sort_by_key(|(slot, _)| *slot);
        Ok(spells)
    }

    async fn get_spell_slot(&self, user_id: i32, slot: u8) -> Result<Option<i32>, GameError> {
        let value: Option<String> = self.con().hget(spells_key(user_id), slot).await?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    async fn set_spell_slot(
        &self,
        user_id: i32,
        slot: u8,
        spell_id: i32,
    ) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(spells_key(user_id), slot, spell_id)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NpcRepo for RedisRepository {
    async fn create_npc_instance(&self, npc: &Npc) -> Result<(), GameError> {
        let items = [
            ("npc_id", npc.npc_id.to_string()),
            ("char_index", npc.char_index.to_string()),
            ("map_id", npc.map_id.to_string()),
            ("x", npc.x.to_string()),
            ("y", npc.y.to_string()),
            ("heading", (npc.heading as u8).to_string()),
            ("name", npc.name.clone()),
            ("description", npc.description.clone()),
            ("body", npc.body.to_string()),
            ("head", npc.head.to_string()),
            ("hp", npc.hp.to_string()),
            ("max_hp", npc.max_hp.to_string()),
            ("level", npc.level.to_string()),
            ("hostile", u8::from(npc.is_hostile()).to_string()),
            ("attackable", u8::from(npc.is_attackable()).to_string()),
            ("merchant", u8::from(npc.is_merchant()).to_string()),
            ("banker", u8::from(npc.is_banker()).to_string()),
            (
                "movement",
                match npc.movement {
                    MovementType::Static => "static".into(),
                    MovementType::Random => "random".into(),
                    MovementType::Patrol => "patrol".into(),
                },
            ),
            ("respawn_min", npc.respawn_min.to_string()),
            ("respawn_max", npc.respawn_max.to_string()),
            ("gold_min", npc.gold_min.to_string()),
            ("gold_max", npc.gold_max.to_string()),
            ("attack_damage", npc.attack_damage.to_string()),
            ("attack_cooldown", npc.attack_cooldown.to_string()),
            ("aggro_range", npc.aggro_range.to_string()),
            ("poisoned_until", npc.poisoned_until.to_string()),
            ("poisoned_by", npc.poisoned_by_user_id.to_string()),
            ("paralyzed_until", npc.paralyzed_until.to_string()),
            ("summoned_by", npc.summoned_by_user_id.to_string()),
            ("summoned_until", npc.summoned_until.to_string()),
        ];
        let key = npc_key(npc.instance_id);
        self.con().hset_multiple::<_, _, _, ()>(&key, &items).await?;
        self.con()
            .sadd::<_, _, ()>(NPC_INDEX_KEY, npc.instance_id)
            .await?;
        Ok(())
    }

    async fn get_npc(&self, instance_id: u64) -> Result<Option<Npc>, GameError> {
        let map: HashMap<String, String> = self.con().hgetall(npc_key(instance_id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        Ok(Some(npc_from_hash(instance_id, &map)))
    }

    async fn update_npc_hp(&self, instance_id: u64, hp: i32) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(npc_key(instance_id), "hp", hp.max(0))
            .await?;
        Ok(())
    }

    async fn update_npc_position(
        &self,
        instance_id: u64,
        x: i32,
        y: i32,
        heading: Heading,
    ) -> Result<(), GameError> {
        let items = [
            ("x", x.to_string()),
            ("y", y.to_string()),
            ("heading", (heading as u8).to_string()),
        ];
        self.con()
            .hset_multiple::<_, _, _, ()>(npc_key(instance_id), &items)
            .await?;
        Ok(())
    }

    async fn update_npc_poisoned_until(
        &self,
        instance_id: u64,
        until: f64,
        poisoned_by_user_id: i32,
    ) -> Result<(), GameError> {
        let items = [
            ("poisoned_until", until.to_string()),
            ("poisoned_by", poisoned_by_user_id.to_string()),
        ];
        self.con()
            .hset_multiple::<_, _, _, ()>(npc_key(instance_id), &items)
            .await?;
        Ok(())
    }

    async fn remove_npc(&self, instance_id: u64) -> Result<(), GameError> {
        self.con().del::<_, ()>(npc_key(instance_id)).await?;
        self.con()
            .srem::<_, _, ()>(NPC_INDEX_KEY, instance_id)
            .await?;
        Ok(())
    }

    async fn get_all_npcs(&self) -> Result<Vec<Npc>, GameError> {
        let ids: Vec<u64> = self.con().smembers(NPC_INDEX_KEY).await?;
        let mut npcs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(npc) = self.get_npc(id).await? {
                npcs.push(npc);
            }
        }
        Ok(npcs)
    }

    async fn clear_all_npcs(&self) -> Result<(), GameError> {
        let ids: Vec<u64> = self.con().smembers(NPC_INDEX_KEY).await?;
        for id in ids {
            self.con().del::<_, ()>(npc_key(id)).await?;
        }
        self.con().del::<_, ()>(NPC_INDEX_KEY).await?;
        Ok(())
    }
}

fn npc_from_hash(instance_id: u64, map: &HashMap<String, String>) -> Npc {
    let mut flags = NpcFlags::empty();
    if field_bool(map, "hostile") {
        flags |= NpcFlags::HOSTILE;
    }
    if field_bool(map, "attackable") {
        flags |= NpcFlags::ATTACKABLE;
    }
    if field_bool(map, "merchant") {
        flags |= NpcFlags::MERCHANT;
    }
    if field_bool(map, "banker") {
        flags |= NpcFlags::BANKER;
    }
    Npc {
        instance_id,
        npc_id: field_i32(map, "npc_id", 0),
        char_index: field_i32(map, "char_index", 0),
        map_id: field_i32(map, "map_id", 1),
        x: field_i32(map, "x", 1),
        y: field_i32(map, "y", 1),
        heading: Heading::from_u8(field_i32(map, "heading", 3) as u8).unwrap_or(Heading::South),
        name: map.get("name").cloned().unwrap_or_default(),
        description: map.get("description").cloned().unwrap_or_default(),
        body: field_i32(map, "body", 1),
        head: field_i32(map, "head", 0),
        hp: field_i32(map, "hp", 0),
        max_hp: field_i32(map, "max_hp", 0),
        level: field_i32(map, "level", 1),
        flags,
        movement: match map.get("movement").map(String::as_str) {
            Some("random") => MovementType::Random,
            Some("patrol") => MovementType::Patrol,
            _ => MovementType::Static,
        },
        respawn_min: field_f64(map, "respawn_min", 0.0),
        respawn_max: field_f64(map, "respawn_max", 0.0),
        gold_min: field_i32(map, "gold_min", 0),
        gold_max: field_i32(map, "gold_max", 0),
        attack_damage: field_i32(map, "attack_damage", 3),
        attack_cooldown: field_f64(map, "attack_cooldown", 2.0),
        aggro_range: field_i32(map, "aggro_range", 8),
        loot_table: None,
        stock: Vec::new(),
        last_attack_time: 0.0,
        poisoned_until: field_f64(map, "poisoned_until", 0.0),
        poisoned_by_user_id: field_i32(map, "poisoned_by", 0),
        paralyzed_until: field_f64(map, "paralyzed_until", 0.0),
        summoned_by_user_id: field_i32(map, "summoned_by", 0),
        summoned_until: field_f64(map, "summoned_until", 0.0),
    }
}

#[async_trait]
impl AccountRepo for RedisRepository {
    async fn get_account(&self, username: &str) -> Result<Option<Account>, GameError> {
        let key = format!("account:{}", username.to_lowercase());
        let map: HashMap<String, String> = self.con().hgetall(key).await?;
        if map.is_empty() {
            return Ok(None);
        }
        Ok(Some(Account {
            user_id: field_i32(&map, "user_id", 0),
            username: map
                .get("username")
                .cloned()
                .unwrap_or_else(|| username.to_string()),
            password: map.get("password").cloned().unwrap_or_default(),
            char_body: field_i32(&map, "char_race", 1).max(1),
            char_head: field_i32(&map, "char_head", 1),
            char_class: field_i32(&map, "char_class", 1) as u8,
        }))
    }

    async fn get_account_by_user_id(&self, user_id: i32) -> Result<Option<Account>, GameError> {
        let username: Option<String> = self.con().get(format!("account_id:{user_id}")).await?;
        match username {
            Some(name) => self.get_account(&name).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl InventoryRepo for RedisRepository {
    async fn get_slot(
        &self,
        user_id: i32,
        slot: u8,
    ) -> Result<Option<InventorySlotData>, GameError> {
        let value: Option<String> = self.con().hget(inventory_key(user_id), slot).await?;
        Ok(value.as_deref().and_then(decode_slot))
    }

    async fn set_slot(
        &self,
        user_id: i32,
        slot: u8,
        data: InventorySlotData,
    ) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(inventory_key(user_id), slot, encode_slot(&data))
            .await?;
        Ok(())
    }

    async fn clear_slot(&self, user_id: i32, slot: u8) -> Result<(), GameError> {
        self.con()
            .hdel::<_, _, ()>(inventory_key(user_id), slot)
            .await?;
        Ok(())
    }

    async fn slots(&self, user_id: i32) -> Result<Vec<(u8, InventorySlotData)>, GameError> {
        let raw: HashMap<String, String> = self.con().hgetall(inventory_key(user_id)).await?;
        Ok(decode_slot_map(raw))
    }

    async fn get_equipment(&self, user_id: i32) -> Result<Equipment, GameError> {
        let map: HashMap<String, String> = self.con().hgetall(equipment_key(user_id)).await?;
        let slot = |kind: EquipmentKind| map.get(kind.as_str()).and_then(|v| v.parse().ok());
        Ok(Equipment {
            weapon: slot(EquipmentKind::Weapon),
            armor: slot(EquipmentKind::Armor),
            helmet: slot(EquipmentKind::Helmet),
            shield: slot(EquipmentKind::Shield),
        })
    }

    async fn set_equipped(
        &self,
        user_id: i32,
        kind: EquipmentKind,
        slot: Option<u8>,
    ) -> Result<(), GameError> {
        match slot {
            Some(slot) => {
                self.con()
                    .hset::<_, _, _, ()>(equipment_key(user_id), kind.as_str(), slot)
                    .await?
            }
            None => {
                self.con()
                    .hdel::<_, _, ()>(equipment_key(user_id), kind.as_str())
                    .await?
            }
        }
        Ok(())
    }

    async fn bank_slots(&self, user_id: i32) -> Result<Vec<(u8, InventorySlotData)>, GameError> {
        let raw: HashMap<String, String> = self.con().hgetall(bank_key(user_id)).await?;
        Ok(decode_slot_map(raw))
    }

    async fn set_bank_slot(
        &self,
        user_id: i32,
        slot: u8,
        data: InventorySlotData,
    ) -> Result<(), GameError> {
        self.con()
            .hset::<_, _, _, ()>(bank_key(user_id), slot, encode_slot(&data))
            .await?;
        Ok(())
    }

    async fn clear_bank_slot(&self, user_id: i32, slot: u8) -> Result<(), GameError> {
        self.con().hdel::<_, _, ()>(bank_key(user_id), slot).await?;
        Ok(())
    }
}

#[async_trait]
impl ServerRepo for RedisRepository {
    async fn get_effect_config_bool(&self, key: &str, default: bool) -> bool {
        let value: Result<Option<String>, _> =
            self.con().get(format!("config:effects:{key}")).await;
        match value {
            Ok(Some(v)) => matches!(v.as_str(), "1" | "true"),
            Ok(None) => default,
            Err(err) => {
                log::error!("effect config read failed for {key}: {err}");
                default
            }
        }
    }

    async fn get_effect_config_int(&self, key: &str, default: i64) -> i64 {
        let value: Result<Option<String>, _> =
            self.con().get(format!("config:effects:{key}")).await;
        match value {
            Ok(Some(v)) => v.parse().unwrap_or(default),
            Ok(None) => default,
            Err(err) => {
                log::error!("effect config read failed for {key}: {err}");
                default
            }
        }
    }

    async fn get_effect_config_float(&self, key: &str, default: f64) -> f64 {
        let value: Result<Option<String>, _> =
            self.con().get(format!("config:effects:{key}")).await;
        match value {
            Ok(Some(v)) => v.parse().unwrap_or(default),
            Ok(None) => default,
            Err(err) => {
                log::error!("effect config read failed for {key}: {err}");
                default
            }
        }
    }
}
