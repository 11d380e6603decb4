//! Mana recovery while meditating. Runs every scheduler tick and
//! rate-limits itself to one recovery per `recovery_interval` seconds.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use game_core::constants::{DEFAULT_TICK_INTERVAL, MANA_RECOVERY_PER_TICK};

use crate::error::GameError;
use crate::messaging::MessageSender;
use crate::repository::PlayerRepo;
use crate::tick::TickEffect;

pub struct MeditationEffect {
    recovery_interval: f64,
    tick_interval: f64,
    counters: Mutex<HashMap<i32, u32>>,
}

impl MeditationEffect {
    pub fn new(recovery_interval: f64, tick_interval: f64) -> Self {
        Self {
            recovery_interval,
            tick_interval: if tick_interval > 0.0 {
                tick_interval
            } else {
                DEFAULT_TICK_INTERVAL
            },
            counters: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TickEffect for MeditationEffect {
    fn name(&self) -> &'static str {
        "Meditation"
    }

    fn interval_seconds(&self) -> f64 {
        0.0
    }

    async fn apply(
        &self,
        user_id: i32,
        player_repo: &Arc<dyn PlayerRepo>,
        sender: Option<&MessageSender>,
    ) -> Result<(), GameError> {
        if !player_repo.is_meditating(user_id).await? {
            self.counters.lock().remove(&user_id);
            return Ok(());
        }

        let due = {
            let mut counters = self.counters.lock();
            let counter = counters.entry(user_id).or_insert(0);
            *counter += 1;
            let ticks_needed = (self.recovery_interval / self.tick_interval).max(1.0) as u32;
            if *counter >= ticks_needed {
                *counter = 0;
                true
            } else {
                false
            }
        };
        if !due {
            return Ok(());
        }

        let Some(stats) = player_repo.get_stats(user_id).await? else {
            return Ok(());
        };

        if stats.min_mana >= stats.max_mana {
            player_repo.set_meditating(user_id, false).await?;
            if let Some(sender) = sender {
                sender.meditate_toggle();
                sender.console_msg("Tu mana esta completo. Dejas de meditar.");
            }
            log::info!("user {user_id} stopped meditating (mana full)");
            return Ok(());
        }

        let new_mana = (stats.min_mana + MANA_RECOVERY_PER_TICK).min(stats.max_mana);
        player_repo.update_mana(user_id, new_mana).await?;

        if let Some(sender) = sender {
            sender.update_mana(new_mana);
            if let Some(updated) = player_repo.get_stats(user_id).await? {
                sender.update_user_stats(&updated);
            }
        }
        log::debug!(
            "user {user_id} recovered mana meditating ({new_mana}/{})",
            stats.max_mana
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryRepository, PlayerStats};

    async fn meditating_repo(min_mana: i32) -> Arc<dyn PlayerRepo> {
        let repo = Arc::new(MemoryRepository::new());
        let player_repo: Arc<dyn PlayerRepo> = repo;
        player_repo
            .set_stats(
                7,
                &PlayerStats {
                    min_mana,
                    ..PlayerStats::default()
                },
            )
            .await
            .unwrap();
        player_repo.set_meditating(7, true).await.unwrap();
        player_repo
    }

    #[tokio::test]
    async fn recovery_waits_for_the_internal_counter() {
        let player_repo = meditating_repo(10).await;
        // 3s recovery at 0.5s ticks: six applications per recovery.
        let effect = MeditationEffect::new(3.0, 0.5);

        for _ in 0..5 {
            effect.apply(7, &player_repo, None).await.unwrap();
        }
        assert_eq!(
            player_repo.get_stats(7).await.unwrap().unwrap().min_mana,
            10
        );

        effect.apply(7, &player_repo, None).await.unwrap();
        assert_eq!(
            player_repo.get_stats(7).await.unwrap().unwrap().min_mana,
            20
        );
    }

    #[tokio::test]
    async fn full_mana_clears_the_meditating_flag() {
        let player_repo = meditating_repo(100).await;
        let effect = MeditationEffect::new(0.5, 0.5);

        effect.apply(7, &player_repo, None).await.unwrap();
        assert!(!player_repo.is_meditating(7).await.unwrap());
    }

    #[tokio::test]
    async fn non_meditating_players_reset_their_counter() {
        let repo = Arc::new(MemoryRepository::new());
        let player_repo: Arc<dyn PlayerRepo> = repo;
        player_repo
            .set_stats(7, &PlayerStats::default())
            .await
            .unwrap();
        let effect = MeditationEffect::new(0.5, 0.5);

        // Not meditating: nothing happens, no counter sticks around.
        effect.apply(7, &player_repo, None).await.unwrap();
        assert!(effect.counters.lock().is_empty());
    }
}
