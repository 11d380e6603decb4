//! Periodic poison damage on players; expiry and death clear the state.

use std::sync::Arc;

use async_trait::async_trait;

use game_core::constants::{POISON_DAMAGE_PER_TICK, POISON_TICK_INTERVAL};

use crate::error::GameError;
use crate::helpers::now_secs;
use crate::messaging::MessageSender;
use crate::repository::PlayerRepo;
use crate::tick::TickEffect;

pub struct PoisonEffect {
    interval_seconds: f64,
}

impl PoisonEffect {
    pub fn new(interval_seconds: f64) -> Self {
        Self { interval_seconds }
    }
}

impl Default for PoisonEffect {
    fn default() -> Self {
        Self::new(POISON_TICK_INTERVAL)
    }
}

#[async_trait]
impl TickEffect for PoisonEffect {
    fn name(&self) -> &'static str {
        "Poison"
    }

    fn interval_seconds(&self) -> f64 {
        self.interval_seconds
    }

    async fn apply(
        &self,
        user_id: i32,
        player_repo: &Arc<dyn PlayerRepo>,
        sender: Option<&MessageSender>,
    ) -> Result<(), GameError> {
        let now = now_secs();
        let poisoned_until = player_repo.get_poisoned_until(user_id).await?;

        if poisoned_until <= 0.0 {
            return Ok(());
        }
        if now >= poisoned_until {
            player_repo.update_poisoned_until(user_id, 0.0).await?;
            log::debug!("poison expired for user {user_id}");
            return Ok(());
        }

        if !player_repo.is_alive(user_id).await? {
            player_repo.update_poisoned_until(user_id, 0.0).await?;
            return Ok(());
        }

        let Some(stats) = player_repo.get_stats(user_id).await? else {
            log::warn!("no stats for poisoned user {user_id}");
            return Ok(());
        };
        let new_hp = (stats.min_hp - POISON_DAMAGE_PER_TICK).max(0);
        player_repo.update_hp(user_id, new_hp).await?;

        if let Some(sender) = sender {
            if let Some(updated) = player_repo.get_stats(user_id).await? {
                sender.update_user_stats(&updated);
            }
        }

        if new_hp == 0 {
            log::info!("user {user_id} died of poison");
            player_repo.update_poisoned_until(user_id, 0.0).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryRepository, PlayerStats};

    async fn poisoned_repo(min_hp: i32, until: f64) -> Arc<dyn PlayerRepo> {
        let repo: Arc<dyn PlayerRepo> = Arc::new(MemoryRepository::new());
        repo.set_stats(
            7,
            &PlayerStats {
                min_hp,
                ..PlayerStats::default()
            },
        )
        .await
        .unwrap();
        repo.update_poisoned_until(7, until).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn active_poison_drains_hp() {
        let repo = poisoned_repo(50, now_secs() + 30.0).await;
        let effect = PoisonEffect::default();

        effect.apply(7, &repo, None).await.unwrap();
        assert_eq!(repo.get_stats(7).await.unwrap().unwrap().min_hp, 45);
        // State stays while the timer runs.
        assert!(repo.get_poisoned_until(7).await.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn expired_poison_is_reaped_without_damage() {
        let repo = poisoned_repo(50, now_secs() - 1.0).await;
        let effect = PoisonEffect::default();

        effect.apply(7, &repo, None).await.unwrap();
        assert_eq!(repo.get_stats(7).await.unwrap().unwrap().min_hp, 50);
        assert_eq!(repo.get_poisoned_until(7).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn lethal_tick_clears_the_state() {
        let repo = poisoned_repo(3, now_secs() + 30.0).await;
        let effect = PoisonEffect::default();

        effect.apply(7, &repo, None).await.unwrap();
        assert_eq!(repo.get_stats(7).await.unwrap().unwrap().min_hp, 0);
        assert_eq!(repo.get_poisoned_until(7).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn unpoisoned_players_are_untouched() {
        let repo = poisoned_repo(50, 0.0).await;
        let effect = PoisonEffect::default();
        effect.apply(7, &repo, None).await.unwrap();
        assert_eq!(repo.get_stats(7).await.unwrap().unwrap().min_hp, 50);
    }
}
