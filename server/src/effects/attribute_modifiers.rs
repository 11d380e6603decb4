//! Reaps expired strength/agility buffs and refreshes the client view.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GameError;
use crate::helpers::now_secs;
use crate::messaging::MessageSender;
use crate::repository::{AttributeModifier, PlayerRepo};
use crate::tick::TickEffect;

pub struct AttributeModifiersEffect {
    interval_seconds: f64,
}

impl AttributeModifiersEffect {
    pub fn new(interval_seconds: f64) -> Self {
        Self { interval_seconds }
    }
}

#[async_trait]
impl TickEffect for AttributeModifiersEffect {
    fn name(&self) -> &'static str {
        "AttributeModifiers"
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
        let mut needs_update = false;

        let strength = player_repo.get_strength_modifier(user_id).await?;
        if strength.until > 0.0 && now >= strength.until {
            player_repo
                .set_strength_modifier(user_id, AttributeModifier::default())
                .await?;
            log::debug!("strength buff expired for user {user_id}");
            needs_update = true;
        }

        let agility = player_repo.get_agility_modifier(user_id).await?;
        if agility.until > 0.0 && now >= agility.until {
            player_repo
                .set_agility_modifier(user_id, AttributeModifier::default())
                .await?;
            log::debug!("agility buff expired for user {user_id}");
            needs_update = true;
        }

        if needs_update {
            if let Some(sender) = sender {
                if let Some(attributes) = player_repo.get_attributes(user_id).await? {
                    sender.update_str_and_dex(attributes.strength, attributes.agility);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    #[tokio::test]
    async fn expired_buffs_are_cleared() {
        let repo: Arc<dyn PlayerRepo> = Arc::new(MemoryRepository::new());
        repo.set_strength_modifier(
            7,
            AttributeModifier {
                delta: 5,
                until: now_secs() - 1.0,
            },
        )
        .await
        .unwrap();
        repo.set_agility_modifier(
            7,
            AttributeModifier {
                delta: 3,
                until: now_secs() + 60.0,
            },
        )
        .await
        .unwrap();

        let effect = AttributeModifiersEffect::new(10.0);
        effect.apply(7, &repo, None).await.unwrap();

        assert_eq!(
            repo.get_strength_modifier(7).await.unwrap(),
            AttributeModifier::default()
        );
        // The live agility buff is untouched.
        assert_eq!(repo.get_agility_modifier(7).await.unwrap().delta, 3);
    }

    #[tokio::test]
    async fn no_buffs_means_no_work() {
        let repo: Arc<dyn PlayerRepo> = Arc::new(MemoryRepository::new());
        let effect = AttributeModifiersEffect::new(10.0);
        effect.apply(7, &repo, None).await.unwrap();
        assert_eq!(
            repo.get_strength_modifier(7).await.unwrap(),
            AttributeModifier::default()
        );
    }
}
