//! Visibility-filtered fan-out of world events over the per-map session
//! rosters.

use std::sync::Arc;

use game_core::constants::VISIBLE_RANGE;

use crate::error::GameError;
use crate::helpers::chebyshev;
use crate::messaging::MessageSender;
use crate::repository::{AccountRepo, Heading, PlayerRepo, Position};
use crate::spatial::SpatialIndex;

pub struct Broadcaster {
    spatial: Arc<SpatialIndex>,
    player_repo: Arc<dyn PlayerRepo>,
    account_repo: Arc<dyn AccountRepo>,
}

impl Broadcaster {
    pub fn new(
        spatial: Arc<SpatialIndex>,
        player_repo: Arc<dyn PlayerRepo>,
        account_repo: Arc<dyn AccountRepo>,
    ) -> Self {
        Self {
            spatial,
            player_repo,
            account_repo,
        }
    }

    fn in_visible_range(x1: i32, y1: i32, x2: i32, y2: i32) -> bool {
        chebyshev(x1, y1, x2, y2) <= VISIBLE_RANGE
    }

    /// The player's current wire appearance: morph override when one is
    /// active, account snapshot otherwise.
    pub async fn player_appearance(&self, user_id: i32) -> Result<(i32, i32), GameError> {
        if let Some(morph) = self.player_repo.get_morphed_appearance(user_id).await? {
            return Ok((morph.body.max(1), morph.head));
        }
        match self.account_repo.get_account_by_user_id(user_id).await? {
            Some(account) => Ok((account.char_body.max(1), account.char_head)),
            None => Ok((1, 1)),
        }
    }

    /// Arrival ordering: the newcomer learns about existing occupants
    /// before its own roster entry exists, then is announced to the
    /// rest of the map. Prevents self-observation and phantom entries.
    pub async fn notify_player_spawn(
        &self,
        user_id: i32,
        username: &str,
        position: &Position,
        sender: MessageSender,
    ) -> Result<usize, GameError> {
        self.send_existing_players_to(position.map, &sender).await?;

        self.spatial
            .add_player(position.map, user_id, sender, username);

        let (body, head) = self.player_appearance(user_id).await?;
        let others = self.spatial.senders_in_map(position.map, Some(user_id));
        for other in &others {
            other.character_create(
                user_id,
                body,
                head,
                position.heading,
                position.x,
                position.y,
                username,
            );
        }
        log::info!(
            "player {user_id} joined map {}, {} player(s) notified",
            position.map,
            others.len()
        );
        Ok(others.len())
    }

    async fn send_existing_players_to(
        &self,
        map_id: i32,
        sender: &MessageSender,
    ) -> Result<(), GameError> {
        for other_id in self.spatial.players_in_map(map_id, None) {
            let Some(other_position) = self.player_repo.get_position(other_id).await? else {
                continue;
            };
            let Some(other_name) = self.spatial.username_for(other_id) else {
                continue;
            };
            let (body, head) = self.player_appearance(other_id).await?;
            sender.character_create(
                other_id,
                body,
                head,
                other_position.heading,
                other_position.x,
                other_position.y,
                &other_name,
            );
        }
        Ok(())
    }

    /// CHARACTER_MOVE to every session that can see either endpoint.
    /// A heading change additionally emits CHARACTER_CHANGE, because the
    /// move packet deliberately omits heading.
    #[allow(clippy::too_many_arguments)]
    pub async fn broadcast_character_move(
        &self,
        map_id: i32,
        char_index: i32,
        body: i32,
        head: i32,
        new_x: i32,
        new_y: i32,
        new_heading: Heading,
        old_heading: Option<Heading>,
    ) -> Result<usize, GameError> {
        let heading_changed = old_heading != Some(new_heading);
        let mut notified = 0;

        for player_id in self.spatial.players_in_map(map_id, Some(char_index)) {
            let Some(position) = self.player_repo.get_position(player_id).await? else {
                continue;
            };
            if !Self::in_visible_range(new_x, new_y, position.x, position.y) {
                continue;
            }
            let Some(sender) = self.spatial.sender_for(player_id) else {
                continue;
            };
            sender.character_move(char_index, new_x, new_y);
            if heading_changed {
                sender.character_change(char_index, body, head, new_heading);
            }
            notified += 1;
        }
        Ok(notified)
    }

    pub fn broadcast_character_create(
        &self,
        map_id: i32,
        char_index: i32,
        body: i32,
        head: i32,
        heading: Heading,
        x: i32,
        y: i32,
        name: &str,
    ) -> usize {
        let senders = self.spatial.senders_in_map(map_id, None);
        for sender in &senders {
            sender.character_create(char_index, body, head, heading, x, y, name);
        }
        senders.len()
    }

    pub fn broadcast_character_change(
        &self,
        map_id: i32,
        char_index: i32,
        body: i32,
        head: i32,
        heading: Heading,
        exclude: Option<i32>,
    ) -> usize {
        let senders = self.spatial.senders_in_map(map_id, exclude);
        for sender in &senders {
            sender.character_change(char_index, body, head, heading);
        }
        senders.len()
    }

    pub fn broadcast_character_remove(&self, map_id: i32, char_index: i32) -> usize {
        let senders = self.spatial.senders_in_map(map_id, None);
        for sender in &senders {
            sender.character_remove(char_index);
        }
        senders.len()
    }

    pub fn broadcast_block_position(&self, map_id: i32, x: i32, y: i32, blocked: bool) -> usize {
        let senders = self.spatial.senders_in_map(map_id, None);
        for sender in &senders {
            sender.block_position(x, y, blocked);
        }
        senders.len()
    }

    pub fn broadcast_object_create(&self, map_id: i32, x: i32, y: i32, grh_index: i16) -> usize {
        let senders = self.spatial.senders_in_map(map_id, None);
        for sender in &senders {
            sender.object_create(x, y, grh_index);
        }
        if senders.is_empty() {
            log::debug!("OBJECT_CREATE at ({x},{y}) grh={grh_index}: empty map {map_id}");
        }
        senders.len()
    }

    pub fn broadcast_object_delete(&self, map_id: i32, x: i32, y: i32) -> usize {
        let senders = self.spatial.senders_in_map(map_id, None);
        for sender in &senders {
            sender.object_delete(x, y);
        }
        senders.len()
    }

    pub fn broadcast_create_fx(&self, map_id: i32, char_index: i32, fx: i16, loops: i16) -> usize {
        let senders = self.spatial.senders_in_map(map_id, None);
        for sender in &senders {
            sender.create_fx(char_index, fx, loops);
        }
        senders.len()
    }

    pub fn broadcast_console_msg(&self, map_id: i32, message: &str, font_color: u8) -> usize {
        let senders = self.spatial.senders_in_map(map_id, None);
        for sender in &senders {
            sender.console_msg_color(message, font_color);
        }
        senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Account, MemoryRepository, PlayerStats};
    use crate::session::Outbox;

    fn account(user_id: i32, username: &str) -> Account {
        Account {
            user_id,
            username: username.into(),
            password: "pw".into(),
            char_body: 1,
            char_head: 2,
            char_class: 1,
        }
    }

    fn position(map: i32, x: i32, y: i32) -> Position {
        Position {
            map,
            x,
            y,
            heading: Heading::South,
        }
    }

    struct World {
        broadcaster: Broadcaster,
        spatial: Arc<SpatialIndex>,
        repo: Arc<MemoryRepository>,
    }

    fn world() -> World {
        let spatial = Arc::new(SpatialIndex::new());
        let repo = Arc::new(MemoryRepository::new());
        let broadcaster = Broadcaster::new(spatial.clone(), repo.clone(), repo.clone());
        World {
            broadcaster,
            spatial,
            repo,
        }
    }

    fn join(world: &World, user_id: i32, name: &str, pos: Position) -> Arc<Outbox> {
        world
            .repo
            .seed_player(account(user_id, name), PlayerStats::default(), pos);
        let outbox = Arc::new(Outbox::new(256));
        world.spatial.add_player(
            pos.map,
            user_id,
            MessageSender::new(outbox.clone(), name),
            name,
        );
        outbox
    }

    #[tokio::test]
    async fn move_broadcast_filters_by_chebyshev_range() {
        let world = world();
        let near = join(&world, 1, "near", position(1, 50, 50));
        let far = join(&world, 2, "far", position(1, 90, 90));

        let notified = world
            .broadcaster
            .broadcast_character_move(1, 3, 1, 1, 52, 50, Heading::East, Some(Heading::East))
            .await
            .unwrap();

        assert_eq!(notified, 1);
        assert_eq!(near.len(), 1);
        assert!(far.is_empty());
    }

    #[tokio::test]
    async fn heading_change_adds_character_change() {
        let world = world();
        let near = join(&world, 1, "near", position(1, 50, 50));

        world
            .broadcaster
            .broadcast_character_move(1, 3, 1, 1, 52, 50, Heading::North, Some(Heading::East))
            .await
            .unwrap();

        // CHARACTER_MOVE then CHARACTER_CHANGE.
        assert_eq!(near.len(), 2);
    }

    #[tokio::test]
    async fn visibility_is_symmetric_at_the_boundary() {
        let world = world();
        // Exactly VISIBLE_RANGE apart on one axis.
        let a = join(&world, 1, "a", position(1, 10, 10));
        let b = join(&world, 2, "b", position(1, 25, 10));

        // A moves: B is notified.
        world
            .broadcaster
            .broadcast_character_move(1, 1, 1, 1, 10, 10, Heading::South, Some(Heading::South))
            .await
            .unwrap();
        assert_eq!(b.len(), 1);

        // B moves: A is notified.
        world
            .broadcaster
            .broadcast_character_move(1, 2, 1, 1, 25, 10, Heading::South, Some(Heading::South))
            .await
            .unwrap();
        assert_eq!(a.len(), 1);
    }

    #[tokio::test]
    async fn spawn_ordering_and_announcement() {
        let world = world();
        let existing = join(&world, 1, "bob", position(1, 40, 40));

        world.repo.seed_player(
            account(2, "alice"),
            PlayerStats::default(),
            position(1, 41, 40),
        );
        let newcomer_outbox = Arc::new(Outbox::new(256));
        let sender = MessageSender::new(newcomer_outbox.clone(), "alice");

        let notified = world
            .broadcaster
            .notify_player_spawn(2, "alice", &position(1, 41, 40), sender)
            .await
            .unwrap();

        assert_eq!(notified, 1);
        // Newcomer saw bob; bob saw alice; nobody saw themselves.
        assert_eq!(newcomer_outbox.len(), 1);
        assert_eq!(existing.len(), 1);
        assert_eq!(world.spatial.players_in_map(1, None).len(), 2);
    }

    #[tokio::test]
    async fn map_scoped_broadcasts_reach_everyone() {
        let world = world();
        let a = join(&world, 1, "a", position(1, 10, 10));
        let b = join(&world, 2, "b", position(1, 90, 90));

        assert_eq!(world.broadcaster.broadcast_character_remove(1, 99), 2);
        assert_eq!(world.broadcaster.broadcast_object_create(1, 5, 5, 511), 2);
        assert_eq!(world.broadcaster.broadcast_object_delete(1, 5, 5), 2);
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 3);
        // Other maps are untouched.
        assert_eq!(world.broadcaster.broadcast_character_remove(2, 99), 0);
    }
}
