//! Periodic gold drain: a configured percentage every configured
//! interval, never less than one coin.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::GoldDecaySection;
use crate::error::GameError;
use crate::messaging::MessageSender;
use crate::repository::{PlayerRepo, ServerRepo};
use crate::tick::TickEffect;

pub struct GoldDecayEffect {
    server_repo: Arc<dyn ServerRepo>,
    defaults: GoldDecaySection,
    counters: Mutex<HashMap<i32, u32>>,
}

impl GoldDecayEffect {
    pub fn new(server_repo: Arc<dyn ServerRepo>, defaults: GoldDecaySection) -> Self {
        Self {
            server_repo,
            defaults,
            counters: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TickEffect for GoldDecayEffect {
    fn name(&self) -> &'static str {
        "GoldDecay"
    }

    fn interval_seconds(&self) -> f64 {
        1.0
    }

    async fn apply(
        &self,
        user_id: i32,
        player_repo: &Arc<dyn PlayerRepo>,
        sender: Option<&MessageSender>,
    ) -> Result<(), GameError> {
        let percentage = self
            .server_repo
            .get_effect_config_float("gold_decay:percentage", self.defaults.percentage)
            .await;
        let interval_seconds = self
            .server_repo
            .get_effect_config_float("gold_decay:interval_seconds", self.defaults.interval_seconds)
            .await;

        let elapsed = {
            let mut counters = self.counters.lock();
            let counter = counters.entry(user_id).or_insert(0);
            *counter += 1;
            let ticks_needed = interval_seconds.max(1.0) as u32;
            if *counter >= ticks_needed {
                *counter = 0;
                true
            } else {
                false
            }
        };
        if !elapsed {
            return Ok(());
        }

        let Some(mut stats) = player_repo.get_stats(user_id).await? else {
            log::warn!("no stats for user {user_id}");
            return Ok(());
        };
        if stats.gold <= 0 {
            return Ok(());
        }

        let reduction = ((f64::from(stats.gold) * percentage / 100.0) as i32).max(1);
        let previous = stats.gold;
        stats.gold = (stats.gold - reduction).max(0);
        player_repo.set_stats(user_id, &stats).await?;

        log::info!(
            "user {user_id}: gold reduced {previous} -> {} (-{reduction}, {percentage:.1}%)",
            stats.gold
        );

        if let Some(sender) = sender {
            sender.update_user_stats(&stats);
            sender.console_msg(&format!(
                "Has perdido {reduction} monedas de oro ({percentage}%)"
            ));
        }
        Ok(())
    }
}
