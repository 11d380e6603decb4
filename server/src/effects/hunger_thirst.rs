//! Hunger and thirst drain. Intervals and amounts are runtime tunables
//! read through the server repository on every application.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::HungerThirstSection;
use crate::error::GameError;
use crate::messaging::MessageSender;
use crate::repository::{PlayerRepo, ServerRepo};
use crate::tick::TickEffect;

pub struct HungerThirstEffect {
    server_repo: Arc<dyn ServerRepo>,
    defaults: HungerThirstSection,
}

impl HungerThirstEffect {
    pub fn new(server_repo: Arc<dyn ServerRepo>, defaults: HungerThirstSection) -> Self {
        Self {
            server_repo,
            defaults,
        }
    }
}

#[async_trait]
impl TickEffect for HungerThirstEffect {
    fn name(&self) -> &'static str {
        "HungerThirst"
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
        let interval_sed = self
            .server_repo
            .get_effect_config_int("hunger_thirst:interval_sed", self.defaults.interval_sed as i64)
            .await as i32;
        let interval_hambre = self
            .server_repo
            .get_effect_config_int(
                "hunger_thirst:interval_hambre",
                self.defaults.interval_hambre as i64,
            )
            .await as i32;
        let reduccion_agua = self
            .server_repo
            .get_effect_config_int(
                "hunger_thirst:reduccion_agua",
                self.defaults.reduccion_agua as i64,
            )
            .await as i32;
        let reduccion_hambre = self
            .server_repo
            .get_effect_config_int(
                "hunger_thirst:reduccion_hambre",
                self.defaults.reduccion_hambre as i64,
            )
            .await as i32;

        let Some(mut state) = player_repo.get_hunger_thirst(user_id).await? else {
            log::warn!("no hunger/thirst state for user {user_id}");
            return Ok(());
        };

        let mut changed = false;

        state.water_counter += 1;
        if state.water_counter >= interval_sed {
            state.water_counter = 0;
            state.min_water = (state.min_water - reduccion_agua).max(0);
            changed = true;
            if state.min_water == 0 {
                if !state.thirst_flag {
                    state.thirst_flag = true;
                    log::info!("user {user_id} is thirsty (water = 0)");
                }
            } else {
                state.thirst_flag = false;
            }
        }

        state.hunger_counter += 1;
        if state.hunger_counter >= interval_hambre {
            state.hunger_counter = 0;
            state.min_hunger = (state.min_hunger - reduccion_hambre).max(0);
            changed = true;
            if state.min_hunger == 0 {
                if !state.hunger_flag {
                    state.hunger_flag = true;
                    log::info!("user {user_id} is hungry (food = 0)");
                }
            } else {
                state.hunger_flag = false;
            }
        }

        player_repo.set_hunger_thirst(user_id, &state).await?;

        if changed {
            if let Some(sender) = sender {
                sender.update_hunger_and_thirst(&state);
            }
        }
        Ok(())
    }
}
