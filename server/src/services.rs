//! Composition root: the dependency graph is built once at startup and
//! handed into every component as plain references.

use std::sync::Arc;
use std::time::{Duration, Instant};

use game_core::constants::DEFAULT_TICK_INTERVAL;

use crate::broadcast::Broadcaster;
use crate::combat::CombatEngine;
use crate::config::GameConfig;
use crate::effects::{
    AttributeModifiersEffect, GoldDecayEffect, HungerThirstEffect, MeditationEffect,
    MorphExpiryEffect, NpcAiEffect, NpcMovementEffect, NpcPoisonEffect, PetFollowEffect,
    PoisonEffect, StaminaRegenEffect, SummonExpiryEffect,
};
use crate::items::{ItemCatalog, LootTables};
use crate::maps::MapRegistry;
use crate::npc::{NpcCatalog, NpcRegistry};
use crate::npc_ai::NpcAi;
use crate::npc_death::NpcDeathService;
use crate::npc_engine::NpcEngine;
use crate::path_finding::Pathfinder;
use crate::repository::{
    AccountRepo, InventoryRepo, MemoryRepository, NpcRepo, PlayerRepo, RedisRepository, ServerRepo,
};
use crate::spatial::SpatialIndex;
use crate::spells::{SpellCatalog, SpellEngine};
use crate::tick::TickScheduler;

/// The repository bundle the world runs against.
#[derive(Clone)]
pub struct Repositories {
    pub player: Arc<dyn PlayerRepo>,
    pub account: Arc<dyn AccountRepo>,
    pub inventory: Arc<dyn InventoryRepo>,
    pub npc: Arc<dyn NpcRepo>,
    pub server: Arc<dyn ServerRepo>,
}

impl Repositories {
    pub fn from_memory(repo: Arc<MemoryRepository>) -> Self {
        Self {
            player: repo.clone(),
            account: repo.clone(),
            inventory: repo.clone(),
            npc: repo.clone(),
            server: repo,
        }
    }

    pub fn from_redis(repo: RedisRepository) -> Self {
        let repo = Arc::new(repo);
        Self {
            player: repo.clone(),
            account: repo.clone(),
            inventory: repo.clone(),
            npc: repo.clone(),
            server: repo,
        }
    }
}

/// The static data catalogs produced by external tooling.
#[derive(Clone)]
pub struct Catalogs {
    pub npcs: Arc<NpcCatalog>,
    pub spells: Arc<SpellCatalog>,
    pub items: Arc<ItemCatalog>,
    pub loot: Arc<LootTables>,
}

impl Default for Catalogs {
    fn default() -> Self {
        Self {
            npcs: Arc::new(NpcCatalog::default()),
            spells: Arc::new(SpellCatalog::default()),
            items: Arc::new(ItemCatalog::default()),
            loot: Arc::new(LootTables::default()),
        }
    }
}

pub struct Services {
    pub config: GameConfig,
    pub maps: Arc<MapRegistry>,
    pub spatial: Arc<SpatialIndex>,
    pub npc_registry: Arc<NpcRegistry>,
    pub player_repo: Arc<dyn PlayerRepo>,
    pub account_repo: Arc<dyn AccountRepo>,
    pub inventory_repo: Arc<dyn InventoryRepo>,
    pub npc_repo: Arc<dyn NpcRepo>,
    pub server_repo: Arc<dyn ServerRepo>,
    pub item_catalog: Arc<ItemCatalog>,
    pub spell_catalog: Arc<SpellCatalog>,
    pub broadcaster: Arc<Broadcaster>,
    pub pathfinder: Arc<Pathfinder>,
    pub npc_engine: Arc<NpcEngine>,
    pub npc_death: Arc<NpcDeathService>,
    pub combat: Arc<CombatEngine>,
    pub spells: Arc<SpellEngine>,
    pub npc_ai: Arc<NpcAi>,
    pub started_at: Instant,
}

impl Services {
    pub fn build(config: GameConfig, maps: MapRegistry, catalogs: Catalogs, repos: Repositories) -> Arc<Self> {
        let maps = Arc::new(maps);
        let spatial = Arc::new(SpatialIndex::new());
        let npc_registry = Arc::new(NpcRegistry::default());

        let broadcaster = Arc::new(Broadcaster::new(
            spatial.clone(),
            repos.player.clone(),
            repos.account.clone(),
        ));
        let pathfinder = Arc::new(Pathfinder::new(maps.clone(), spatial.clone()));
        let npc_engine = NpcEngine::new(
            catalogs.npcs.clone(),
            npc_registry.clone(),
            repos.npc.clone(),
            maps.clone(),
            spatial.clone(),
            broadcaster.clone(),
        );
        let npc_death = Arc::new(NpcDeathService::new(
            spatial.clone(),
            repos.player.clone(),
            broadcaster.clone(),
            npc_engine.clone(),
            catalogs.loot.clone(),
            catalogs.items.clone(),
        ));
        let combat = Arc::new(CombatEngine::new(
            repos.player.clone(),
            repos.inventory.clone(),
            catalogs.items.clone(),
            npc_registry.clone(),
            repos.npc.clone(),
            npc_death.clone(),
            config.game.combat.clone(),
        ));
        let spells = Arc::new(SpellEngine::new(
            catalogs.spells.clone(),
            repos.player.clone(),
            repos.npc.clone(),
            npc_registry.clone(),
            broadcaster.clone(),
            npc_death.clone(),
            npc_engine.clone(),
        ));
        let npc_ai = Arc::new(NpcAi::new(
            spatial.clone(),
            repos.player.clone(),
            combat.clone(),
            npc_engine.clone(),
            pathfinder.clone(),
        ));

        Arc::new(Self {
            config,
            maps,
            spatial,
            npc_registry,
            player_repo: repos.player,
            account_repo: repos.account,
            inventory_repo: repos.inventory,
            npc_repo: repos.npc,
            server_repo: repos.server,
            item_catalog: catalogs.items,
            spell_catalog: catalogs.spells,
            broadcaster,
            pathfinder,
            npc_engine,
            npc_death,
            combat,
            spells,
            npc_ai,
            started_at: Instant::now(),
        })
    }

    /// Registers every effect in its canonical order. Hunger/thirst and
    /// gold decay honor their enable switches (store first, file
    /// defaults second).
    pub async fn build_scheduler(&self) -> TickScheduler {
        let tick_interval = Duration::from_secs_f64(DEFAULT_TICK_INTERVAL);
        let mut scheduler =
            TickScheduler::new(self.player_repo.clone(), self.spatial.clone(), tick_interval);

        let hunger_enabled = self
            .server_repo
            .get_effect_config_bool("hunger_thirst:enabled", self.config.game.hunger_thirst.enabled)
            .await;
        if hunger_enabled {
            scheduler.add_effect(Arc::new(HungerThirstEffect::new(
                self.server_repo.clone(),
                self.config.game.hunger_thirst.clone(),
            )));
        }

        let gold_decay_enabled = self
            .server_repo
            .get_effect_config_bool("gold_decay:enabled", self.config.game.gold_decay.enabled)
            .await;
        if gold_decay_enabled {
            scheduler.add_effect(Arc::new(GoldDecayEffect::new(
                self.server_repo.clone(),
                self.config.game.gold_decay.clone(),
            )));
        }

        scheduler.add_effect(Arc::new(MeditationEffect::new(3.0, DEFAULT_TICK_INTERVAL)));
        scheduler.add_effect(Arc::new(NpcMovementEffect::new(
            self.npc_registry.clone(),
            self.npc_engine.clone(),
            self.spatial.clone(),
            5.0,
        )));
        scheduler.add_effect(Arc::new(NpcAiEffect::new(
            self.npc_registry.clone(),
            self.npc_ai.clone(),
            3.5,
        )));
        scheduler.add_effect(Arc::new(StaminaRegenEffect::new(
            self.config.game.stamina.clone(),
        )));
        scheduler.add_effect(Arc::new(PoisonEffect::default()));
        scheduler.add_effect(Arc::new(NpcPoisonEffect::new(
            self.npc_registry.clone(),
            self.npc_repo.clone(),
            self.npc_death.clone(),
        )));
        scheduler.add_effect(Arc::new(PetFollowEffect::new(
            self.npc_registry.clone(),
            self.npc_engine.clone(),
            2.0,
        )));
        scheduler.add_effect(Arc::new(MorphExpiryEffect::new(
            self.account_repo.clone(),
            self.spatial.clone(),
            self.broadcaster.clone(),
            5.0,
        )));
        scheduler.add_effect(Arc::new(SummonExpiryEffect::new(
            self.npc_registry.clone(),
            self.npc_engine.clone(),
            5.0,
        )));
        scheduler.add_effect(Arc::new(AttributeModifiersEffect::new(10.0)));

        scheduler
    }

    /// Shutdown: pending respawns die with the process.
    pub fn shutdown(&self) {
        self.npc_engine.cancel_all_respawns();
    }
}

/// World scaffolding for the test-suite: an in-memory store, small
/// catalogs, and helpers to stand up sessions without sockets.
pub mod test_support {
    use super::*;
    use crate::maps::{Edge, MapData, MapTransition};
    use crate::messaging::MessageSender;
    use crate::npc::{MovementType, NpcTemplate};
    use crate::repository::{
        Account, Equipment, Heading, HungerThirst, InventorySlotData, PlayerStats, Position,
    };
    use crate::session::{Outbox, Session};
    use crate::spatial::OccupantTag;
    use crate::spells::{Spell, SpellKind};

    pub struct TestSession {
        pub session: Arc<Session>,
        pub sender: MessageSender,
        pub outbox: Arc<Outbox>,
    }

    pub struct TestWorld {
        pub services: Arc<Services>,
        pub repo: Arc<MemoryRepository>,
    }

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
            respawn_min: 0.0,
            respawn_max: 0.0,
            gold_min: 5,
            gold_max: 5,
            attack_damage: 4,
            attack_cooldown: 2.0,
            aggro_range: 8,
            stock: Vec::new(),
            loot_table: None,
        }
    }

    fn wolf_template() -> NpcTemplate {
        NpcTemplate {
            npc_id: 2,
            name: "Lobo".into(),
            description: String::new(),
            body: 20,
            head: 0,
            max_hp: 30,
            level: 2,
            hostile: false,
            attackable: true,
            merchant: false,
            banker: false,
            movement: MovementType::Static,
            respawn_min: 0.0,
            respawn_max: 0.0,
            gold_min: 0,
            gold_max: 0,
            attack_damage: 2,
            attack_cooldown: 2.0,
            aggro_range: 8,
            stock: Vec::new(),
            loot_table: None,
        }
    }

    fn test_catalogs() -> Catalogs {
        Catalogs {
            npcs: Arc::new(NpcCatalog::from_templates(vec![
                goblin_template(),
                wolf_template(),
            ])),
            spells: Arc::new(SpellCatalog::from_spells(vec![Spell {
                id: 1,
                name: "Dardo mágico".into(),
                kind: SpellKind::Damage,
                mana_cost: 10,
                min_damage: 10,
                max_damage: 10,
                duration: 0.0,
                fx_grh: 30,
                loops: 1,
                caster_msg: "Has lanzado un dardo sobre ".into(),
                morph_body: 0,
                morph_head: 0,
                summon_npc_id: 0,
            }])),
            items: Arc::new(ItemCatalog::from_items(vec![crate::items::ItemDef {
                id: 44,
                name: "Espada larga".into(),
                grh_index: 820,
                item_type: crate::items::ItemType::Weapon,
                min_hit: 4,
                max_hit: 9,
                min_def: 0,
                max_def: 0,
                sale_price: 120.0,
            }])),
            loot: Arc::new(LootTables::default()),
        }
    }

    /// Deterministic combat: no dodge, no criticals.
    fn test_config() -> GameConfig {
        let mut config = GameConfig::default();
        config.game.combat.base_critical_chance = 0.0;
        config.game.combat.base_dodge_chance = 0.0;
        config.game.combat.critical_agi_modifier = 0.0;
        config.game.combat.dodge_agi_modifier = 0.0;
        config
    }

    impl TestWorld {
        pub async fn build(maps: Vec<MapData>) -> Self {
            let repo = Arc::new(MemoryRepository::new());
            let services = Services::build(
                test_config(),
                MapRegistry::from_maps(maps),
                test_catalogs(),
                Repositories::from_memory(repo.clone()),
            );
            Self { services, repo }
        }

        pub async fn with_player(user_id: i32, name: &str, map: i32, x: i32, y: i32) -> Self {
            let world = Self::build(vec![MapData::open(1, 100, 100), MapData::open(2, 100, 100)])
                .await;
            world.seed_player(user_id, name, map, x, y).await;
            world
        }

        /// Map 1 with a north transition to map 2 at (50, 95); player 7
        /// "Alice" seeded at (50, 2).
        pub async fn with_transition() -> Self {
            let mut map1 = MapData::open(1, 100, 100);
            map1.add_transition(MapTransition {
                edge: Edge::North,
                to_map: 2,
                to_x: 50,
                to_y: 95,
            });
            let world = Self::build(vec![map1, MapData::open(2, 100, 100)]).await;
            world.seed_player(7, "Alice", 1, 50, 2).await;
            world
        }

        pub async fn with_player_blocked(
            user_id: i32,
            name: &str,
            map: i32,
            x: i32,
            y: i32,
            blocks: &[(i32, i32)],
        ) -> Self {
            let mut map1 = MapData::open(1, 100, 100);
            for &(bx, by) in blocks {
                map1.block(bx, by);
            }
            let world = Self::build(vec![map1, MapData::open(2, 100, 100)]).await;
            world.seed_player(user_id, name, map, x, y).await;
            world
        }

        pub async fn seed_player(&self, user_id: i32, name: &str, map: i32, x: i32, y: i32) {
            self.repo.seed_player(
                Account {
                    user_id,
                    username: name.into(),
                    password: "secret".into(),
                    char_body: 1,
                    char_head: 1,
                    char_class: 2,
                },
                PlayerStats::default(),
                Position {
                    map,
                    x,
                    y,
                    heading: Heading::South,
                },
            );
            self.services
                .player_repo
                .set_hunger_thirst(user_id, &HungerThirst::default())
                .await
                .unwrap();
        }

        pub fn anonymous_session(&self) -> TestSession {
            let session = Session::new("127.0.0.1:9999".parse().unwrap(), 256);
            let sender = MessageSender::new(session.outbox.clone(), "test");
            TestSession {
                outbox: session.outbox.clone(),
                sender,
                session,
            }
        }

        /// A session that already passed login, without the world-entry
        /// side effects.
        pub fn login_session(&self, user_id: i32, name: &str) -> TestSession {
            let test_session = self.anonymous_session();
            test_session.session.authenticate(user_id, name);
            test_session
        }

        /// Installs the session in the world: roster entry plus tile
        /// occupancy.
        pub async fn enter_world(&self, session: &TestSession, map: i32, x: i32, y: i32) {
            let user_id = session.session.user_id().expect("session not logged in");
            let username = session.session.username();
            self.services
                .spatial
                .add_player(map, user_id, session.sender.clone(), &username);
            self.services
                .spatial
                .claim_tile(map, x, y, OccupantTag::Player(user_id));
        }

        pub async fn join_second_player(
            &self,
            user_id: i32,
            name: &str,
            map: i32,
            x: i32,
            y: i32,
        ) -> TestSession {
            self.seed_player(user_id, name, map, x, y).await;
            let session = self.login_session(user_id, name);
            self.enter_world(&session, map, x, y).await;
            session
        }

        pub async fn spawn_goblin(&self, map: i32, x: i32, y: i32, hp: i32) -> u64 {
            let npc = self
                .services
                .npc_engine
                .spawn_npc(1, map, x, y, Heading::South)
                .await
                .unwrap()
                .unwrap();
            self.services
                .npc_registry
                .with_npc_mut(npc.instance_id, |n| n.hp = hp);
            npc.instance_id
        }

        pub async fn position(&self, user_id: i32) -> Position {
            self.services
                .player_repo
                .get_position(user_id)
                .await
                .unwrap()
                .unwrap()
        }

        pub async fn stats(&self, user_id: i32) -> PlayerStats {
            self.services
                .player_repo
                .get_stats(user_id)
                .await
                .unwrap()
                .unwrap()
        }

        pub async fn equipment(&self, user_id: i32) -> Equipment {
            self.services
                .inventory_repo
                .get_equipment(user_id)
                .await
                .unwrap()
        }

        pub async fn give_gold(&self, user_id: i32, gold: i32) {
            self.services
                .player_repo
                .update_gold(user_id, gold)
                .await
                .unwrap();
        }

        pub async fn give_item(&self, user_id: i32, slot: u8, item_id: i32, quantity: i32) {
            self.services
                .inventory_repo
                .set_slot(
                    user_id,
                    slot,
                    InventorySlotData {
                        item_id,
                        quantity,
                        equipped: false,
                    },
                )
                .await
                .unwrap();
        }

        pub async fn learn_spell(&self, user_id: i32, slot: u8, spell_id: i32) {
            self.services
                .player_repo
                .set_spell_slot(user_id, slot, spell_id)
                .await
                .unwrap();
        }

        pub async fn face(&self, user_id: i32, heading: Heading) {
            self.services
                .player_repo
                .set_heading(user_id, heading)
                .await
                .unwrap();
        }
    }
}
