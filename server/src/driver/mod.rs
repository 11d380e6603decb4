//! Packet handlers, one module per packet family.

pub mod combat;
pub mod interaction;
pub mod inventory;
pub mod movement;
pub mod session;

use std::sync::Arc;

use crate::error::GameError;
use crate::services::Services;
use crate::session::Session;

/// The authenticated user behind a session, or `Unauthenticated`.
pub fn require_user(session: &Session) -> Result<i32, GameError> {
    session.user_id().ok_or(GameError::Unauthenticated)
}

/// Disconnect path shared by QUIT and TCP close: leave every roster,
/// release every tile, optionally announce the removal.
pub async fn disconnect_cleanup(services: &Arc<Services>, session: &Session, announce: bool) {
    if let Some(user_id) = session.user_id() {
        let map_id = services.spatial.map_of_player(user_id);
        services.spatial.remove_player_from_all_maps(user_id);
        if announce {
            if let Some(map_id) = map_id {
                services.broadcaster.broadcast_character_remove(map_id, user_id);
            }
        }
        if let Err(err) = services.player_repo.set_meditating(user_id, false).await {
            log::error!("failed to clear meditation on disconnect: {err}");
        }
        log::info!("user {user_id} left the world");
    }
    session.close();
}
