//! Server configuration: `config.toml` plus `PYAO_*` environment
//! overrides with double-underscore nesting, e.g.
//! `PYAO_SERVER__PORT=7667` or `PYAO_GAME__COMBAT__BASE_CRITICAL_CHANCE=0.2`.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::GameError;

const ENV_PREFIX: &str = "PYAO_";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub buffer_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 7666,
            max_connections: 1000,
            buffer_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CombatSection {
    pub melee_range: i32,
    pub base_critical_chance: f64,
    pub base_dodge_chance: f64,
    pub defense_per_level: f64,
    pub armor_reduction: f64,
    pub critical_damage_multiplier: f64,
    pub critical_agi_modifier: f64,
    pub dodge_agi_modifier: f64,
    pub max_critical_chance: f64,
    pub max_dodge_chance: f64,
    pub base_agility: i32,
}

impl Default for CombatSection {
    fn default() -> Self {
        Self {
            melee_range: 1,
            base_critical_chance: 0.05,
            base_dodge_chance: 0.05,
            defense_per_level: 0.1,
            armor_reduction: 0.1,
            critical_damage_multiplier: 1.5,
            critical_agi_modifier: 0.005,
            dodge_agi_modifier: 0.007,
            max_critical_chance: 0.50,
            max_dodge_chance: 0.40,
            base_agility: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaminaSection {
    pub max_stamina: i32,
    pub cost_walk: i32,
    pub cost_attack: i32,
    pub cost_spell: i32,
    pub regen_tick: i32,
    pub regen_resting: i32,
}

impl Default for StaminaSection {
    fn default() -> Self {
        Self {
            max_stamina: 100,
            cost_walk: 1,
            cost_attack: 2,
            cost_spell: 3,
            regen_tick: 2,
            regen_resting: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HungerThirstSection {
    pub enabled: bool,
    pub interval_sed: i32,
    pub interval_hambre: i32,
    pub reduccion_agua: i32,
    pub reduccion_hambre: i32,
}

impl Default for HungerThirstSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_sed: 180,
            interval_hambre: 180,
            reduccion_agua: 10,
            reduccion_hambre: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GoldDecaySection {
    pub enabled: bool,
    pub percentage: f64,
    pub interval_seconds: f64,
}

impl Default for GoldDecaySection {
    fn default() -> Self {
        Self {
            enabled: true,
            percentage: 1.0,
            interval_seconds: 60.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InventorySection {
    pub max_slots: u8,
}

impl Default for InventorySection {
    fn default() -> Self {
        Self { max_slots: 30 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BankSection {
    pub max_slots: u8,
}

impl Default for BankSection {
    fn default() -> Self {
        Self { max_slots: 40 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CharacterSection {
    pub hp_per_con: i32,
    pub mana_per_int: i32,
    pub initial_gold: i32,
    pub initial_elu: i32,
    pub elu_exponent: f64,
}

impl Default for CharacterSection {
    fn default() -> Self {
        Self {
            hp_per_con: 10,
            mana_per_int: 10,
            initial_gold: 0,
            initial_elu: 300,
            elu_exponent: 1.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameSection {
    pub max_players_per_map: usize,
    pub respawn_check_interval: f64,
    pub npc_respawn_base_time: f64,
    pub npc_respawn_random_variance: f64,
    pub combat: CombatSection,
    pub stamina: StaminaSection,
    pub hunger_thirst: HungerThirstSection,
    pub gold_decay: GoldDecaySection,
    pub inventory: InventorySection,
    pub bank: BankSection,
    pub character: CharacterSection,
}

impl Default for GameSection {
    fn default() -> Self {
        Self {
            max_players_per_map: 100,
            respawn_check_interval: 5.0,
            npc_respawn_base_time: 30.0,
            npc_respawn_random_variance: 15.0,
            combat: CombatSection::default(),
            stamina: StaminaSection::default(),
            hunger_thirst: HungerThirstSection::default(),
            gold_decay: GoldDecaySection::default(),
            inventory: InventorySection::default(),
            bank: BankSection::default(),
            character: CharacterSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: Some("logs/server.log".into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSection {
    pub host: String,
    pub port: u16,
    pub db: u8,
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6379,
            db: 0,
        }
    }
}

impl RedisSection {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub server: ServerSection,
    pub game: GameSection,
    pub logging: LoggingSection,
    pub redis: RedisSection,
}

impl GameConfig {
    /// File config if present, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, GameError> {
        let mut config = match path {
            Some(p) if p.exists() => Self::from_toml(p)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(path: &Path) -> Result<Self, GameError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| GameError::Storage(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| GameError::InvalidInput(format!("bad config {}: {e}", path.display())))
    }

    /// `PYAO_A__B__C=value` overrides field `a.b.c`. Unknown keys are
    /// logged at warn and skipped; bad values keep the previous setting.
    pub fn apply_env_overrides(&mut self) {
        let vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        for (key, value) in vars {
            let path = key[ENV_PREFIX.len()..].to_lowercase();
            let segments: Vec<&str> = path.split("__").collect();
            if !self.apply_override(&segments, &value) {
                log::warn!("ignoring unknown config override {}", key);
            }
        }
    }

    fn apply_override(&mut self, segments: &[&str], value: &str) -> bool {
        fn set<T: std::str::FromStr>(target: &mut T, value: &str) -> bool {
            match value.parse::<T>() {
                Ok(parsed) => {
                    *target = parsed;
                    true
                }
                Err(_) => {
                    log::warn!("unparseable config override value {value:?}");
                    false
                }
            }
        }

        match segments {
            ["server", "host"] => set(&mut self.server.host, value),
            ["server", "port"] => set(&mut self.server.port, value),
            ["server", "max_connections"] => set(&mut self.server.max_connections, value),
            ["server", "buffer_size"] => set(&mut self.server.buffer_size, value),
            ["game", "max_players_per_map"] => set(&mut self.game.max_players_per_map, value),
            ["game", "respawn_check_interval"] => set(&mut self.game.respawn_check_interval, value),
            ["game", "npc_respawn_base_time"] => set(&mut self.game.npc_respawn_base_time, value),
            ["game", "npc_respawn_random_variance"] => {
                set(&mut self.game.npc_respawn_random_variance, value)
            }
            ["game", "combat", "melee_range"] => set(&mut self.game.combat.melee_range, value),
            ["game", "combat", "base_critical_chance"] => {
                set(&mut self.game.combat.base_critical_chance, value)
            }
            ["game", "combat", "base_dodge_chance"] => {
                set(&mut self.game.combat.base_dodge_chance, value)
            }
            ["game", "combat", "defense_per_level"] => {
                set(&mut self.game.combat.defense_per_level, value)
            }
            ["game", "combat", "armor_reduction"] => {
                set(&mut self.game.combat.armor_reduction, value)
            }
            ["game", "combat", "critical_damage_multiplier"] => {
                set(&mut self.game.combat.critical_damage_multiplier, value)
            }
            ["game", "combat", "critical_agi_modifier"] => {
                set(&mut self.game.combat.critical_agi_modifier, value)
            }
            ["game", "combat", "dodge_agi_modifier"] => {
                set(&mut self.game.combat.dodge_agi_modifier, value)
            }
            ["game", "combat", "max_critical_chance"] => {
                set(&mut self.game.combat.max_critical_chance, value)
            }
            ["game", "combat", "max_dodge_chance"] => {
                set(&mut self.game.combat.max_dodge_chance, value)
            }
            ["game", "combat", "base_agility"] => set(&mut self.game.combat.base_agility, value),
            ["game", "stamina", "max_stamina"] => set(&mut self.game.stamina.max_stamina, value),
            ["game", "stamina", "cost_walk"] => set(&mut self.game.stamina.cost_walk, value),
            ["game", "stamina", "cost_attack"] => set(&mut self.game.stamina.cost_attack, value),
            ["game", "stamina", "cost_spell"] => set(&mut self.game.stamina.cost_spell, value),
            ["game", "stamina", "regen_tick"] => set(&mut self.game.stamina.regen_tick, value),
            ["game", "stamina", "regen_resting"] => {
                set(&mut self.game.stamina.regen_resting, value)
            }
            ["game", "hunger_thirst", "enabled"] => {
                set(&mut self.game.hunger_thirst.enabled, value)
            }
            ["game", "hunger_thirst", "interval_sed"] => {
                set(&mut self.game.hunger_thirst.interval_sed, value)
            }
            ["game", "hunger_thirst", "interval_hambre"] => {
                set(&mut self.game.hunger_thirst.interval_hambre, value)
            }
            ["game", "hunger_thirst", "reduccion_agua"] => {
                set(&mut self.game.hunger_thirst.reduccion_agua, value)
            }
            ["game", "hunger_thirst", "reduccion_hambre"] => {
                set(&mut self.game.hunger_thirst.reduccion_hambre, value)
            }
            ["game", "gold_decay", "enabled"] => set(&mut self.game.gold_decay.enabled, value),
            ["game", "gold_decay", "percentage"] => {
                set(&mut self.game.gold_decay.percentage, value)
            }
            ["game", "gold_decay", "interval_seconds"] => {
                set(&mut self.game.gold_decay.interval_seconds, value)
            }
            ["game", "inventory", "max_slots"] => set(&mut self.game.inventory.max_slots, value),
            ["game", "bank", "max_slots"] => set(&mut self.game.bank.max_slots, value),
            ["game", "character", "hp_per_con"] => set(&mut self.game.character.hp_per_con, value),
            ["game", "character", "mana_per_int"] => {
                set(&mut self.game.character.mana_per_int, value)
            }
            ["game", "character", "initial_gold"] => {
                set(&mut self.game.character.initial_gold, value)
            }
            ["game", "character", "initial_elu"] => {
                set(&mut self.game.character.initial_elu, value)
            }
            ["game", "character", "elu_exponent"] => {
                set(&mut self.game.character.elu_exponent, value)
            }
            ["logging", "level"] => set(&mut self.logging.level, value),
            ["logging", "file"] => {
                self.logging.file = if value.is_empty() || value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(value.to_string())
                };
                true
            }
            ["redis", "host"] => set(&mut self.redis.host, value),
            ["redis", "port"] => set(&mut self.redis.port, value),
            ["redis", "db"] => set(&mut self.redis.db, value),
            _ => false,
        }
    }
}
