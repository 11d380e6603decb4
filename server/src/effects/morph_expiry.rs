//! Restores the original appearance of players whose morph timed out,
//! and tells the whole map about it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::broadcast::Broadcaster;
use crate::error::GameError;
use crate::helpers::now_secs;
use crate::messaging::MessageSender;
use crate::repository::{AccountRepo, PlayerRepo};
use crate::spatial::SpatialIndex;
use crate::tick::{EffectScope, TickEffect};

pub struct MorphExpiryEffect {
    account_repo: Arc<dyn AccountRepo>,
    spatial: Arc<SpatialIndex>,
    broadcaster: Arc<Broadcaster>,
    interval_seconds: f64,
}

impl MorphExpiryEffect {
    pub fn new(
        account_repo: Arc<dyn AccountRepo>,
        spatial: Arc<SpatialIndex>,
        broadcaster: Arc<Broadcaster>,
        interval_seconds: f64,
    ) -> Self {
        Self {
            account_repo,
            spatial,
            broadcaster,
            interval_seconds,
        }
    }
}

#[async_trait]
impl TickEffect for MorphExpiryEffect {
    fn name(&self) -> &'static str {
        "MorphExpiry"
    }

    fn scope(&self) -> EffectScope {
        EffectScope::GlobalOncePerTick
    }

    fn interval_seconds(&self) -> f64 {
        self.interval_seconds
    }

    async fn apply(
        &self,
        _user_id: i32,
        player_repo: &Arc<dyn PlayerRepo>,
        _sender: Option<&MessageSender>,
    ) -> Result<(), GameError> {
        let now = now_secs();

        for user_id in self.spatial.all_connected_user_ids() {
            let Some(morphed) = player_repo.get_morphed_appearance(user_id).await? else {
                continue;
            };
            if now < morphed.until {
                continue;
            }

            player_repo.clear_morphed_appearance(user_id).await?;

            // Original appearance comes from the account snapshot.
            let (body, head) = match self.account_repo.get_account_by_user_id(user_id).await? {
                Some(account) => (account.char_body.max(1), account.char_head),
                None => (1, 1),
            };

            let Some(position) = player_repo.get_position(user_id).await? else {
                continue;
            };

            self.broadcaster.broadcast_character_change(
                position.map,
                user_id,
                body,
                head,
                position.heading,
                None,
            );
            log::info!("morph restored for user {user_id} (body={body} head={head})");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MessageSender;
    use crate::repository::{
        Account, Heading, MemoryRepository, MorphedAppearance, PlayerStats, Position,
    };
    use crate::session::Outbox;

    struct Glade {
        effect: MorphExpiryEffect,
        player_repo: Arc<dyn PlayerRepo>,
        outbox: Arc<Outbox>,
        other_outbox: Arc<Outbox>,
    }

    async fn glade(morph_until: f64) -> Glade {
        let repo = Arc::new(MemoryRepository::new());
        let spatial = Arc::new(SpatialIndex::new());
        let broadcaster = Arc::new(Broadcaster::new(spatial.clone(), repo.clone(), repo.clone()));

        repo.seed_player(
            Account {
                user_id: 7,
                username: "Alice".into(),
                password: "pw".into(),
                char_body: 3,
                char_head: 9,
                char_class: 1,
            },
            PlayerStats::default(),
            Position {
                map: 1,
                x: 10,
                y: 10,
                heading: Heading::South,
            },
        );
        let player_repo: Arc<dyn PlayerRepo> = repo.clone();
        player_repo
            .set_morphed_appearance(
                7,
                &MorphedAppearance {
                    body: 88,
                    head: 0,
                    until: morph_until,
                },
            )
            .await
            .unwrap();

        let outbox = Arc::new(Outbox::new(64));
        spatial.add_player(1, 7, MessageSender::new(outbox.clone(), "alice"), "Alice");
        let other_outbox = Arc::new(Outbox::new(64));
        spatial.add_player(1, 8, MessageSender::new(other_outbox.clone(), "bob"), "Bob");

        let effect = MorphExpiryEffect::new(repo.clone(), spatial, broadcaster, 5.0);
        Glade {
            effect,
            player_repo,
            outbox,
            other_outbox,
        }
    }

    #[tokio::test]
    async fn expired_morph_is_restored_and_broadcast() {
        let g = glade(now_secs() - 1.0).await;

        g.effect.apply(0, &g.player_repo, None).await.unwrap();
        assert!(g
            .player_repo
            .get_morphed_appearance(7)
            .await
            .unwrap()
            .is_none());
        // Both the player and the rest of the map get CHARACTER_CHANGE.
        assert_eq!(g.outbox.len(), 1);
        assert_eq!(g.other_outbox.len(), 1);
    }

    #[tokio::test]
    async fn running_morph_is_left_alone() {
        let g = glade(now_secs() + 60.0).await;

        g.effect.apply(0, &g.player_repo, None).await.unwrap();
        assert!(g
            .player_repo
            .get_morphed_appearance(7)
            .await
            .unwrap()
            .is_some());
        assert!(g.outbox.is_empty());
    }
}
