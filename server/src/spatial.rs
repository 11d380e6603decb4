//! Live world occupancy: per-map player rosters, NPC membership, tile
//! occupancy tags, and the ground-item ledger. One lock per map shard.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::messaging::MessageSender;

/// Who holds a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OccupantTag {
    Player(i32),
    Npc(u64),
}

/// One stack of items lying on a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundItem {
    pub item_id: i32,
    pub quantity: i32,
    pub grh_index: i16,
    pub owner_id: Option<i32>,
    pub spawn_time: Option<f64>,
}

#[derive(Debug, Clone)]
struct PlayerEntry {
    sender: MessageSender,
    username: String,
}

#[derive(Default)]
struct MapShard {
    players: HashMap<i32, PlayerEntry>,
    npcs: HashMap<u64, ()>,
    occupancy: HashMap<(i32, i32), OccupantTag>,
    ground_items: HashMap<(i32, i32), Vec<GroundItem>>,
}

impl MapShard {
    fn release_tag(&mut self, tag: OccupantTag) {
        self.occupancy.retain(|_, occupant| *occupant != tag);
    }

    fn is_empty(&self) -> bool {
        self.players.is_empty()
            && self.npcs.is_empty()
            && self.occupancy.is_empty()
            && self.ground_items.is_empty()
    }
}

/// All shards behind a short-lived outer lock; every per-map operation
/// drops down to the shard's own mutex.
#[derive(Default)]
pub struct SpatialIndex {
    shards: RwLock<HashMap<i32, Arc<Mutex<MapShard>>>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, map_id: i32) -> Arc<Mutex<MapShard>> {
        if let Some(shard) = self.shards.read().get(&map_id) {
            return shard.clone();
        }
        let mut shards = self.shards.write();
        shards
            .entry(map_id)
            .or_insert_with(|| Arc::new(Mutex::new(MapShard::default())))
            .clone()
    }

    fn shard_if_present(&self, map_id: i32) -> Option<Arc<Mutex<MapShard>>> {
        self.shards.read().get(&map_id).cloned()
    }

    fn drop_if_empty(&self, map_id: i32) {
        let mut shards = self.shards.write();
        if let Some(shard) = shards.get(&map_id) {
            if shard.lock().is_empty() {
                shards.remove(&map_id);
            }
        }
    }

    // =========================================================================
    // Players
    // =========================================================================

    pub fn add_player(&self, map_id: i32, user_id: i32, sender: MessageSender, username: &str) {
        let shard = self.shard(map_id);
        shard.lock().players.insert(
            user_id,
            PlayerEntry {
                sender,
                username: username.to_string(),
            },
        );
        log::debug!("player {user_id} ({username}) added to map {map_id}");
    }

    /// Drops the roster entry and every `Player(user_id)` occupancy tag
    /// on that map.
    pub fn remove_player(&self, map_id: i32, user_id: i32) {
        if let Some(shard) = self.shard_if_present(map_id) {
            let mut guard = shard.lock();
            guard.players.remove(&user_id);
            guard.release_tag(OccupantTag::Player(user_id));
        }
        self.drop_if_empty(map_id);
    }

    /// Disconnect path: the player leaves every roster and releases
    /// every tile they held, whatever map it was on.
    pub fn remove_player_from_all_maps(&self, user_id: i32) {
        let map_ids: Vec<i32> = self.shards.read().keys().copied().collect();
        for map_id in map_ids {
            self.remove_player(map_id, user_id);
        }
    }

    pub fn players_in_map(&self, map_id: i32, exclude: Option<i32>) -> Vec<i32> {
        match self.shard_if_present(map_id) {
            Some(shard) => shard
                .lock()
                .players
                .keys()
                .copied()
                .filter(|id| Some(*id) != exclude)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn senders_in_map(&self, map_id: i32, exclude: Option<i32>) -> Vec<MessageSender> {
        match self.shard_if_present(map_id) {
            Some(shard) => shard
                .lock()
                .players
                .iter()
                .filter(|(id, _)| Some(**id) != exclude)
                .map(|(_, entry)| entry.sender.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn sender_for(&self, user_id: i32) -> Option<MessageSender> {
        let shards: Vec<_> = self.shards.read().values().cloned().collect();
        for shard in shards {
            if let Some(entry) = shard.lock().players.get(&user_id) {
                return Some(entry.sender.clone());
            }
        }
        None
    }

    pub fn username_for(&self, user_id: i32) -> Option<String> {
        let shards: Vec<_> = self.shards.read().values().cloned().collect();
        for shard in shards {
            if let Some(entry) = shard.lock().players.get(&user_id) {
                return Some(entry.username.clone());
            }
        }
        None
    }

    /// Case-insensitive exact username match among connected players.
    pub fn player_by_username(&self, username: &str) -> Option<i32> {
        let needle = username.trim().to_lowercase();
        let shards: Vec<_> = self.shards.read().values().cloned().collect();
        for shard in shards {
            let guard = shard.lock();
            for (user_id, entry) in &guard.players {
                if entry.username.trim().to_lowercase() == needle {
                    return Some(*user_id);
                }
            }
        }
        None
    }

    pub fn map_of_player(&self, user_id: i32) -> Option<i32> {
        let shards: Vec<(i32, Arc<Mutex<MapShard>>)> = self
            .shards
            .read()
            .iter()
            .map(|(id, shard)| (*id, shard.clone()))
            .collect();
        for (map_id, shard) in shards {
            if shard.lock().players.contains_key(&user_id) {
                return Some(map_id);
            }
        }
        None
    }

    pub fn all_connected_user_ids(&self) -> Vec<i32> {
        let shards: Vec<_> = self.shards.read().values().cloned().collect();
        let mut ids = Vec::new();
        for shard in shards {
            for id in shard.lock().players.keys() {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
        }
        ids
    }

    pub fn all_connected_usernames(&self) -> Vec<String> {
        let shards: Vec<_> = self.shards.read().values().cloned().collect();
        let mut names = Vec::new();
        for shard in shards {
            for entry in shard.lock().players.values() {
                if !entry.username.is_empty() && !names.contains(&entry.username) {
                    names.push(entry.username.clone());
                }
            }
        }
        names
    }

    pub fn player_count_in_map(&self, map_id: i32) -> usize {
        self.shard_if_present(map_id)
            .map(|s| s.lock().players.len())
            .unwrap_or(0)
    }

    // =========================================================================
    // NPCs
    // =========================================================================

    pub fn add_npc(&self, map_id: i32, instance_id: u64, x: i32, y: i32) {
        let shard = self.shard(map_id);
        let mut guard = shard.lock();
        guard.npcs.insert(instance_id, ());
        guard
            .occupancy
            .insert((x, y), OccupantTag::Npc(instance_id));
    }

    pub fn remove_npc(&self, map_id: i32, instance_id: u64) {
        if let Some(shard) = self.shard_if_present(map_id) {
            let mut guard = shard.lock();
            guard.npcs.remove(&instance_id);
            guard.release_tag(OccupantTag::Npc(instance_id));
        }
        self.drop_if_empty(map_id);
    }

    pub fn npcs_in_map(&self, map_id: i32) -> Vec<u64> {
        match self.shard_if_present(map_id) {
            Some(shard) => shard.lock().npcs.keys().copied().collect(),
            None => Vec::new(),
        }
    }

    // =========================================================================
    // Occupancy
    // =========================================================================

    pub fn claim_tile(&self, map_id: i32, x: i32, y: i32, tag: OccupantTag) -> bool {
        let shard = self.shard(map_id);
        let mut guard = shard.lock();
        if guard.occupancy.contains_key(&(x, y)) {
            return false;
        }
        guard.occupancy.insert((x, y), tag);
        true
    }

    pub fn is_tile_occupied(&self, map_id: i32, x: i32, y: i32) -> bool {
        self.shard_if_present(map_id)
            .map(|s| s.lock().occupancy.contains_key(&(x, y)))
            .unwrap_or(false)
    }

    pub fn occupant_at(&self, map_id: i32, x: i32, y: i32) -> Option<OccupantTag> {
        self.shard_if_present(map_id)
            .and_then(|s| s.lock().occupancy.get(&(x, y)).copied())
    }

    pub fn occupants_in_map(&self, map_id: i32) -> Vec<((i32, i32), OccupantTag)> {
        match self.shard_if_present(map_id) {
            Some(shard) => shard
                .lock()
                .occupancy
                .iter()
                .map(|(&tile, &tag)| (tile, tag))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Atomic move. Same-map moves hold one shard lock; cross-map moves
    /// lock both shards in map-id order. Moving onto the current tile is
    /// a no-op that still succeeds.
    #[allow(clippy::too_many_arguments)]
    pub fn move_occupant(
        &self,
        old_map: i32,
        new_map: i32,
        old_x: i32,
        old_y: i32,
        new_x: i32,
        new_y: i32,
        tag: OccupantTag,
    ) -> bool {
        if old_map == new_map {
            let shard = self.shard(old_map);
            let mut guard = shard.lock();
            if old_x == new_x && old_y == new_y {
                guard.occupancy.insert((new_x, new_y), tag);
                return true;
            }
            match guard.occupancy.get(&(new_x, new_y)) {
                Some(existing) if *existing != tag => return false,
                _ => {}
            }
            guard.occupancy.remove(&(old_x, old_y));
            guard.occupancy.insert((new_x, new_y), tag);
            return true;
        }

        let first = self.shard(old_map.min(new_map));
        let second = self.shard(old_map.max(new_map));
        let mut first_guard = first.lock();
        let mut second_guard = second.lock();
        let (old_shard, new_shard) = if old_map < new_map {
            (&mut *first_guard, &mut *second_guard)
        } else {
            (&mut *second_guard, &mut *first_guard)
        };
        if new_shard.occupancy.contains_key(&(new_x, new_y)) {
            return false;
        }
        old_shard.occupancy.remove(&(old_x, old_y));
        new_shard.occupancy.insert((new_x, new_y), tag);
        true
    }

    // =========================================================================
    // Ground items
    // =========================================================================

    /// At most one stack per item template per tile; a second drop of
    /// the same template merges quantities.
    pub fn add_ground_item(&self, map_id: i32, x: i32, y: i32, item: GroundItem) {
        let shard = self.shard(map_id);
        let mut guard = shard.lock();
        let stacks = guard.ground_items.entry((x, y)).or_default();
        if let Some(existing) = stacks.iter_mut().find(|s| s.item_id == item.item_id) {
            existing.quantity += item.quantity;
        } else {
            stacks.push(item);
        }
    }

    pub fn ground_items_at(&self, map_id: i32, x: i32, y: i32) -> Vec<GroundItem> {
        self.shard_if_present(map_id)
            .and_then(|s| s.lock().ground_items.get(&(x, y)).cloned())
            .unwrap_or_default()
    }

    /// Removes the stack at `index`; reports whether the tile is now
    /// bare (which implies an OBJECT_DELETE broadcast).
    pub fn remove_ground_item(
        &self,
        map_id: i32,
        x: i32,
        y: i32,
        index: usize,
    ) -> Option<(GroundItem, bool)> {
        let shard = self.shard_if_present(map_id)?;
        let mut guard = shard.lock();
        let stacks = guard.ground_items.get_mut(&(x, y))?;
        if index >= stacks.len() {
            return None;
        }
        let item = stacks.remove(index);
        let empty = stacks.is_empty();
        if empty {
            guard.ground_items.remove(&(x, y));
        }
        Some((item, empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Outbox;

    fn sender() -> MessageSender {
        MessageSender::new(Arc::new(Outbox::new(64)), "test")
    }

    #[test]
    fn roster_membership_is_single_map() {
        let index = SpatialIndex::new();
        index.add_player(1, 7, sender(), "Alice");
        index.claim_tile(1, 10, 10, OccupantTag::Player(7));

        assert_eq!(index.players_in_map(1, None), vec![7]);
        assert_eq!(index.map_of_player(7), Some(1));
        assert_eq!(index.all_connected_user_ids(), vec![7]);

        // Map change: one logical remove+insert.
        index.remove_player(1, 7);
        index.add_player(2, 7, sender(), "Alice");
        assert!(index.players_in_map(1, None).is_empty());
        assert_eq!(index.players_in_map(2, None), vec![7]);
        assert!(!index.is_tile_occupied(1, 10, 10));
    }

    #[test]
    fn removal_releases_every_tag() {
        let index = SpatialIndex::new();
        index.add_player(1, 7, sender(), "Alice");
        index.claim_tile(1, 10, 10, OccupantTag::Player(7));
        index.claim_tile(1, 11, 10, OccupantTag::Player(7));
        index.remove_player_from_all_maps(7);
        assert!(!index.is_tile_occupied(1, 10, 10));
        assert!(!index.is_tile_occupied(1, 11, 10));
        assert!(index.sender_for(7).is_none());
    }

    #[test]
    fn one_occupant_per_tile() {
        let index = SpatialIndex::new();
        assert!(index.claim_tile(1, 5, 5, OccupantTag::Player(1)));
        assert!(!index.claim_tile(1, 5, 5, OccupantTag::Player(2)));
        assert!(!index.claim_tile(1, 5, 5, OccupantTag::Npc(9)));
        assert_eq!(index.occupant_at(1, 5, 5), Some(OccupantTag::Player(1)));
        assert_eq!(
            index.occupants_in_map(1),
            vec![((5, 5), OccupantTag::Player(1))]
        );
    }

    #[test]
    fn move_is_release_then_claim() {
        let index = SpatialIndex::new();
        index.claim_tile(1, 5, 5, OccupantTag::Player(1));
        assert!(index.move_occupant(1, 1, 5, 5, 6, 5, OccupantTag::Player(1)));
        assert!(!index.is_tile_occupied(1, 5, 5));
        assert!(index.is_tile_occupied(1, 6, 5));

        // Occupied destination refuses.
        index.claim_tile(1, 7, 5, OccupantTag::Npc(2));
        assert!(!index.move_occupant(1, 1, 6, 5, 7, 5, OccupantTag::Player(1)));
        assert!(index.is_tile_occupied(1, 6, 5));
    }

    #[test]
    fn move_to_same_tile_is_idempotent() {
        let index = SpatialIndex::new();
        index.claim_tile(1, 5, 5, OccupantTag::Player(1));
        assert!(index.move_occupant(1, 1, 5, 5, 5, 5, OccupantTag::Player(1)));
        assert_eq!(index.occupant_at(1, 5, 5), Some(OccupantTag::Player(1)));
    }

    #[test]
    fn cross_map_move() {
        let index = SpatialIndex::new();
        index.claim_tile(1, 5, 5, OccupantTag::Player(1));
        assert!(index.move_occupant(1, 2, 5, 5, 8, 8, OccupantTag::Player(1)));
        assert!(!index.is_tile_occupied(1, 5, 5));
        assert!(index.is_tile_occupied(2, 8, 8));
    }

    #[test]
    fn username_lookup_is_case_insensitive() {
        let index = SpatialIndex::new();
        index.add_player(1, 7, sender(), "Alice");
        assert_eq!(index.player_by_username("alice"), Some(7));
        assert_eq!(index.player_by_username("  ALICE "), Some(7));
        assert_eq!(index.player_by_username("bob"), None);
        assert_eq!(index.username_for(7).as_deref(), Some("Alice"));
    }

    #[test]
    fn ground_item_stacks_merge_per_template() {
        let index = SpatialIndex::new();
        let gold = GroundItem {
            item_id: 12,
            quantity: 50,
            grh_index: 511,
            owner_id: None,
            spawn_time: None,
        };
        index.add_ground_item(1, 3, 3, gold.clone());
        index.add_ground_item(1, 3, 3, gold);
        let stacks = index.ground_items_at(1, 3, 3);
        assert_eq!(stacks.len(), 1);
        assert_eq!(stacks[0].quantity, 100);

        let (taken, now_empty) = index.remove_ground_item(1, 3, 3, 0).unwrap();
        assert_eq!(taken.quantity, 100);
        assert!(now_empty);
        assert!(index.ground_items_at(1, 3, 3).is_empty());
        assert!(index.remove_ground_item(1, 3, 3, 0).is_none());
    }

    #[test]
    fn npc_membership() {
        let index = SpatialIndex::new();
        index.add_npc(1, 9, 20, 20);
        assert_eq!(index.npcs_in_map(1), vec![9]);
        assert_eq!(index.occupant_at(1, 20, 20), Some(OccupantTag::Npc(9)));
        index.remove_npc(1, 9);
        assert!(index.npcs_in_map(1).is_empty());
        assert!(!index.is_tile_occupied(1, 20, 20));
    }
}
