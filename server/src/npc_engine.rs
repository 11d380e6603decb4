//! NPC lifecycle: spawn from the world config, movement, removal,
//! map-entry sync, and cancellable respawn timers.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::task::JoinHandle;

use crate::broadcast::Broadcaster;
use crate::error::GameError;
use crate::helpers::now_secs;
use crate::maps::MapRegistry;
use crate::messaging::MessageSender;
use crate::npc::{Npc, NpcCatalog, NpcIdAllocator, NpcRegistry, SpawnEntry};
use crate::repository::{Heading, NpcRepo};
use crate::spatial::{OccupantTag, SpatialIndex};

/// Pacing between CHARACTER_CREATE packets on map entry; constrained
/// clients drop bursts.
const NPC_SYNC_PACING: Duration = Duration::from_millis(50);

pub struct NpcEngine {
    catalog: Arc<NpcCatalog>,
    registry: Arc<NpcRegistry>,
    npc_repo: Arc<dyn NpcRepo>,
    maps: Arc<MapRegistry>,
    spatial: Arc<SpatialIndex>,
    broadcaster: Arc<Broadcaster>,
    allocator: NpcIdAllocator,
    respawn_tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
    self_ref: Weak<NpcEngine>,
}

impl NpcEngine {
    pub fn new(
        catalog: Arc<NpcCatalog>,
        registry: Arc<NpcRegistry>,
        npc_repo: Arc<dyn NpcRepo>,
        maps: Arc<MapRegistry>,
        spatial: Arc<SpatialIndex>,
        broadcaster: Arc<Broadcaster>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            catalog,
            registry,
            npc_repo,
            maps,
            spatial,
            broadcaster,
            allocator: NpcIdAllocator::default(),
            respawn_tasks: Mutex::new(HashMap::new()),
            self_ref: self_ref.clone(),
        })
    }

    pub fn registry(&self) -> &Arc<NpcRegistry> {
        &self.registry
    }

    /// World start: wipe stale persisted NPCs, then instantiate the
    /// spawn table. charIndexes are handed out monotonically from 10001.
    pub async fn spawn_from_config(&self, entries: &[SpawnEntry]) -> Result<usize, GameError> {
        for npc in self.registry.all() {
            self.spatial.remove_npc(npc.map_id, npc.instance_id);
        }
        self.registry.clear();
        self.npc_repo.clear_all_npcs().await?;

        let mut spawned = 0;
        for entry in entries {
            let heading = Heading::from_u8(entry.heading).unwrap_or(Heading::South);
            match self
                .spawn_npc(entry.npc_id, entry.map_id, entry.x, entry.y, heading)
                .await?
            {
                Some(_) => spawned += 1,
                None => {
                    log::warn!(
                        "skipping spawn of npc {} at map {} ({}, {})",
                        entry.npc_id,
                        entry.map_id,
                        entry.x,
                        entry.y
                    );
                }
            }
        }
        log::info!("world NPCs initialized: {spawned} spawn(s)");
        Ok(spawned)
    }

    pub async fn spawn_npc(
        &self,
        npc_id: i32,
        map_id: i32,
        x: i32,
        y: i32,
        heading: Heading,
    ) -> Result<Option<Npc>, GameError> {
        let Some(template) = self.catalog.get(npc_id) else {
            log::error!("npc {npc_id} not present in the catalog");
            return Ok(None);
        };
        if !self.maps.contains(map_id) {
            log::error!("npc {npc_id} spawn points at unknown map {map_id}");
            return Ok(None);
        }

        let instance_id = self.allocator.next_instance_id();
        let char_index = self.allocator.next_char_index();
        let npc = Npc::from_template(template, instance_id, char_index, map_id, x, y, heading);

        self.npc_repo.create_npc_instance(&npc).await?;
        self.registry.insert(npc.clone());
        self.spatial.add_npc(map_id, instance_id, x, y);

        self.broadcaster.broadcast_character_create(
            map_id,
            npc.char_index,
            npc.body,
            npc.head,
            npc.heading,
            npc.x,
            npc.y,
            &npc.name,
        );

        log::debug!(
            "npc spawned: {} (charIndex {}) on map {map_id} ({x}, {y})",
            npc.name,
            npc.char_index
        );
        Ok(Some(npc))
    }

    /// One-tile move with walkability, occupancy, and paralysis checks.
    /// Broadcasts CHARACTER_MOVE (plus CHARACTER_CHANGE on turn).
    pub async fn move_npc(
        &self,
        instance_id: u64,
        new_x: i32,
        new_y: i32,
        heading: Heading,
    ) -> Result<bool, GameError> {
        let Some(npc) = self.registry.get(instance_id) else {
            return Ok(false);
        };
        if npc.is_paralyzed(now_secs()) {
            return Ok(false);
        }
        if !self.maps.can_move_to(npc.map_id, new_x, new_y) {
            return Ok(false);
        }
        if !self.spatial.move_occupant(
            npc.map_id,
            npc.map_id,
            npc.x,
            npc.y,
            new_x,
            new_y,
            OccupantTag::Npc(instance_id),
        ) {
            return Ok(false);
        }

        let old_heading = npc.heading;
        self.registry.with_npc_mut(instance_id, |n| {
            n.x = new_x;
            n.y = new_y;
            n.heading = heading;
        });
        self.npc_repo
            .update_npc_position(instance_id, new_x, new_y, heading)
            .await?;

        self.broadcaster
            .broadcast_character_move(
                npc.map_id,
                npc.char_index,
                npc.body,
                npc.head,
                new_x,
                new_y,
                heading,
                Some(old_heading),
            )
            .await?;
        Ok(true)
    }

    /// Releases occupancy, forgets the instance, and tells the map.
    pub async fn remove_npc(&self, npc: &Npc) -> Result<(), GameError> {
        self.spatial.remove_npc(npc.map_id, npc.instance_id);
        self.registry.remove(npc.instance_id);
        self.npc_repo.remove_npc(npc.instance_id).await?;
        self.broadcaster
            .broadcast_character_remove(npc.map_id, npc.char_index);
        log::debug!("npc removed: {} (charIndex {})", npc.name, npc.char_index);
        Ok(())
    }

    /// CHARACTER_CREATE for every NPC on the map, paced for the client.
    pub async fn send_npcs_to_player(&self, sender: &MessageSender, map_id: i32) {
        let npcs = self.registry.in_map(map_id);
        let count = npcs.len();
        for npc in npcs {
            sender.character_create(
                npc.char_index,
                npc.body,
                npc.head,
                npc.heading,
                npc.x,
                npc.y,
                &npc.name,
            );
            tokio::time::sleep(NPC_SYNC_PACING).await;
        }
        log::debug!("sent {count} npc(s) of map {map_id} to a player");
    }

    /// Schedules a respawn inside `[respawn_min, respawn_max]` seconds.
    /// Keyed by instance id so it can be cancelled individually.
    pub fn schedule_respawn(&self, npc: &Npc) {
        if npc.respawn_min <= 0.0 {
            return;
        }
        // The engine outlives every timer except during final teardown.
        let Some(engine) = self.self_ref.upgrade() else {
            return;
        };
        let delay_secs = if npc.respawn_max > npc.respawn_min {
            rand::thread_rng().gen_range(npc.respawn_min..=npc.respawn_max)
        } else {
            npc.respawn_min
        };

        let instance_id = npc.instance_id;
        let npc_id = npc.npc_id;
        let map_id = npc.map_id;
        let (x, y, heading) = (npc.x, npc.y, npc.heading);
        let name = npc.name.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(delay_secs)).await;
            match engine.spawn_npc(npc_id, map_id, x, y, heading).await {
                Ok(Some(respawned)) => log::info!(
                    "npc {} respawned on map {map_id} ({x}, {y}) as charIndex {}",
                    respawned.name,
                    respawned.char_index
                ),
                Ok(None) => log::warn!("npc {name} failed to respawn on map {map_id}"),
                Err(err) => log::error!("npc {name} respawn errored: {err}"),
            }
            engine.respawn_tasks.lock().remove(&instance_id);
        });

        let mut tasks = self.respawn_tasks.lock();
        if let Some(previous) = tasks.insert(instance_id, handle) {
            previous.abort();
        }
        log::info!(
            "respawn scheduled for {} in {delay_secs:.1}s (map {map_id}, ({x}, {y}))",
            npc.name
        );
    }

    pub fn cancel_respawn(&self, instance_id: u64) {
        if let Some(handle) = self.respawn_tasks.lock().remove(&instance_id) {
            handle.abort();
        }
    }

    /// Shutdown path: every pending respawn dies with the server.
    pub fn cancel_all_respawns(&self) {
        let mut tasks = self.respawn_tasks.lock();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }

    pub fn pending_respawns(&self) -> usize {
        self.respawn_tasks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maps::MapData;
    use crate::npc::NpcTemplate;
    use crate::repository::MemoryRepository;

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
            gold_min: 10,
            gold_max: 25,
            attack_damage: 4,
            attack_cooldown: 2.0,
            aggro_range: 8,
            stock: Vec::new(),
            loot_table: None,
        }
    }

    fn engine() -> (Arc<NpcEngine>, Arc<MemoryRepository>, Arc<SpatialIndex>) {
        let repo = Arc::new(MemoryRepository::new());
        let spatial = Arc::new(SpatialIndex::new());
        let maps = Arc::new(MapRegistry::from_maps(vec![MapData::open(1, 100, 100)]));
        let broadcaster = Arc::new(Broadcaster::new(spatial.clone(), repo.clone(), repo.clone()));
        let engine = NpcEngine::new(
            Arc::new(NpcCatalog::from_templates(vec![goblin()])),
            Arc::new(NpcRegistry::default()),
            repo.clone(),
            maps,
            spatial.clone(),
            broadcaster,
        );
        (engine, repo, spatial)
    }

    fn spawn_table() -> Vec<SpawnEntry> {
        vec![
            SpawnEntry {
                map_id: 1,
                npc_id: 1,
                x: 10,
                y: 10,
                heading: 3,
            },
            SpawnEntry {
                map_id: 1,
                npc_id: 1,
                x: 20,
                y: 20,
                heading: 3,
            },
            SpawnEntry {
                map_id: 1,
                npc_id: 99, // not in catalog, skipped
                x: 30,
                y: 30,
                heading: 3,
            },
        ]
    }

    #[tokio::test]
    async fn spawn_from_config_populates_world() {
        let (engine, repo, spatial) = engine();
        let spawned = engine.spawn_from_config(&spawn_table()).await.unwrap();
        assert_eq!(spawned, 2);
        assert_eq!(engine.registry().count(), 2);
        assert_eq!(repo.get_all_npcs().await.unwrap().len(), 2);
        assert!(spatial.is_tile_occupied(1, 10, 10));
        assert!(spatial.is_tile_occupied(1, 20, 20));
    }

    #[tokio::test]
    async fn respawn_idempotence() {
        let (engine, _repo, _spatial) = engine();
        let table = spawn_table();

        engine.spawn_from_config(&table).await.unwrap();
        let mut first: Vec<_> = engine
            .registry()
            .all()
            .iter()
            .map(|n| (n.map_id, n.x, n.y, n.npc_id))
            .collect();
        first.sort();

        engine.spawn_from_config(&table).await.unwrap();
        let mut second: Vec<_> = engine
            .registry()
            .all()
            .iter()
            .map(|n| (n.map_id, n.x, n.y, n.npc_id))
            .collect();
        second.sort();

        assert_eq!(first, second);
        assert_eq!(engine.registry().count(), 2);
    }

    #[tokio::test]
    async fn move_validates_and_updates_everything() {
        let (engine, repo, spatial) = engine();
        engine.spawn_from_config(&spawn_table()).await.unwrap();
        let npc = engine.registry().find_at(1, 10, 10).unwrap();

        assert!(engine
            .move_npc(npc.instance_id, 11, 10, Heading::East)
            .await
            .unwrap());
        assert!(!spatial.is_tile_occupied(1, 10, 10));
        assert!(spatial.is_tile_occupied(1, 11, 10));
        let moved = engine.registry().get(npc.instance_id).unwrap();
        assert_eq!((moved.x, moved.y), (11, 10));
        assert_eq!(moved.heading, Heading::East);
        let persisted = repo.get_npc(npc.instance_id).await.unwrap().unwrap();
        assert_eq!((persisted.x, persisted.y), (11, 10));
    }

    #[tokio::test]
    async fn move_refuses_occupied_tiles_and_paralysis() {
        let (engine, _repo, spatial) = engine();
        engine.spawn_from_config(&spawn_table()).await.unwrap();
        let npc = engine.registry().find_at(1, 10, 10).unwrap();

        spatial.claim_tile(1, 11, 10, OccupantTag::Player(5));
        assert!(!engine
            .move_npc(npc.instance_id, 11, 10, Heading::East)
            .await
            .unwrap());

        engine
            .registry()
            .with_npc_mut(npc.instance_id, |n| n.paralyzed_until = now_secs() + 60.0);
        assert!(!engine
            .move_npc(npc.instance_id, 10, 11, Heading::South)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn remove_releases_the_world() {
        let (engine, repo, spatial) = engine();
        engine.spawn_from_config(&spawn_table()).await.unwrap();
        let npc = engine.registry().find_at(1, 10, 10).unwrap();

        engine.remove_npc(&npc).await.unwrap();
        assert!(engine.registry().get(npc.instance_id).is_none());
        assert!(!spatial.is_tile_occupied(1, 10, 10));
        assert!(repo.get_npc(npc.instance_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn respawn_tasks_are_cancellable() {
        let (engine, _repo, _spatial) = engine();
        engine.spawn_from_config(&spawn_table()).await.unwrap();
        let mut npc = engine.registry().find_at(1, 10, 10).unwrap();
        npc.respawn_min = 30.0;
        npc.respawn_max = 45.0;

        engine.schedule_respawn(&npc);
        assert_eq!(engine.pending_respawns(), 1);
        engine.cancel_respawn(npc.instance_id);
        assert_eq!(engine.pending_respawns(), 0);

        engine.schedule_respawn(&npc);
        engine.cancel_all_respawns();
        assert_eq!(engine.pending_respawns(), 0);
    }
}
