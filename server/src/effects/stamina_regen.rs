//! Passive stamina recovery.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StaminaSection;
use crate::error::GameError;
use crate::messaging::MessageSender;
use crate::repository::PlayerRepo;
use crate::tick::TickEffect;

pub struct StaminaRegenEffect {
    config: StaminaSection,
}

impl StaminaRegenEffect {
    pub fn new(config: StaminaSection) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TickEffect for StaminaRegenEffect {
    fn name(&self) -> &'static str {
        "StaminaRegen"
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
        let Some(stats) = player_repo.get_stats(user_id).await? else {
            return Ok(());
        };
        if stats.min_sta >= stats.max_sta {
            return Ok(());
        }

        let regen = if player_repo.is_meditating(user_id).await? {
            self.config.regen_resting
        } else {
            self.config.regen_tick
        };
        let new_stamina = (stats.min_sta + regen).min(stats.max_sta);
        player_repo.update_stamina(user_id, new_stamina).await?;

        if let Some(sender) = sender {
            sender.update_sta(new_stamina);
        }
        Ok(())
    }
}
