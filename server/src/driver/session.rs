//! Session-scoped packets: dice, login and world entry, ping, quit,
//! online/uptime queries, and the help text.

use std::sync::Arc;

use rand::Rng;

use game_core::protocol::PacketReader;

use crate::driver::{disconnect_cleanup, require_user};
use crate::error::GameError;
use crate::messaging::MessageSender;
use crate::repository::{Attributes, HungerThirst, PlayerStats, Position};
use crate::services::Services;
use crate::session::Session;
use crate::spatial::OccupantTag;

/// 3d6 per attribute, the classic 6..18 spread.
fn roll_attribute() -> u8 {
    let mut rng = rand::thread_rng();
    (0..3).map(|_| rng.gen_range(1..=6u8)).sum()
}

pub fn handle_throw_dices(sender: &MessageSender) -> Result<(), GameError> {
    sender.dice_roll(
        roll_attribute(),
        roll_attribute(),
        roll_attribute(),
        roll_attribute(),
        roll_attribute(),
    );
    Ok(())
}

pub fn handle_ping(sender: &MessageSender) -> Result<(), GameError> {
    sender.pong();
    Ok(())
}

/// Login and the S1 world-entry sequence.
pub async fn handle_login(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
    reader: &mut PacketReader<'_>,
) -> Result<(), GameError> {
    let username = reader.string()?;
    let password = reader.string()?;

    if session.is_authenticated() {
        sender.error_msg("Ya has iniciado sesión.");
        return Ok(());
    }

    let Some(account) = services
        .account_repo
        .verify_credentials(&username, &password)
        .await?
    else {
        log::warn!("[{}] failed login for {username:?}", session.peer);
        sender.error_msg("Usuario o contraseña incorrectos.");
        return Ok(());
    };

    if services.spatial.player_by_username(&account.username).is_some() {
        sender.error_msg("Ese personaje ya está conectado.");
        return Ok(());
    }

    let user_id = account.user_id;

    // First login since provisioning: materialize default state.
    let stats = match services.player_repo.get_stats(user_id).await? {
        Some(stats) => stats,
        None => {
            let stats = PlayerStats {
                gold: services.config.game.character.initial_gold,
                elu: services.config.game.character.initial_elu,
                ..PlayerStats::default()
            };
            services.player_repo.set_stats(user_id, &stats).await?;
            services
                .player_repo
                .set_attributes(user_id, &Attributes::default())
                .await?;
            stats
        }
    };
    let mut position = match services.player_repo.get_position(user_id).await? {
        Some(position) => position,
        None => {
            let position = Position {
                map: 1,
                x: 50,
                y: 50,
                heading: crate::repository::Heading::South,
            };
            services.player_repo.set_position(user_id, &position).await?;
            position
        }
    };
    let hunger = match services.player_repo.get_hunger_thirst(user_id).await? {
        Some(hunger) => hunger,
        None => {
            let hunger = HungerThirst::default();
            services
                .player_repo
                .set_hunger_thirst(user_id, &hunger)
                .await?;
            hunger
        }
    };

    // Claim a tile; fall back to the nearest free one after a restart
    // left the spot taken.
    if !services
        .spatial
        .claim_tile(position.map, position.x, position.y, OccupantTag::Player(user_id))
    {
        match find_free_tile_near(services, &position) {
            Some((x, y)) => {
                position.x = x;
                position.y = y;
                services.player_repo.set_position(user_id, &position).await?;
                services
                    .spatial
                    .claim_tile(position.map, x, y, OccupantTag::Player(user_id));
            }
            None => {
                sender.error_msg("No hay espacio para entrar al mundo.");
                return Ok(());
            }
        }
    }

    session.authenticate(user_id, &account.username);

    sender.logged(account.char_class);
    sender.user_char_index_in_server(user_id as i16);
    sender.change_map(position.map, 0);
    sender.pos_update(position.x, position.y);
    sender.update_user_stats(&stats);
    sender.update_hunger_and_thirst(&hunger);

    for (slot, spell_id) in services.player_repo.get_spells(user_id).await? {
        if let Some(spell) = services.spell_catalog.get(spell_id) {
            sender.change_spell_slot(slot, spell_id, &spell.name);
        }
    }
    for (slot, data) in services.inventory_repo.slots(user_id).await? {
        if let Some(def) = services.item_catalog.get(data.item_id) {
            sender.change_inventory_slot(slot, &def.to_slot_item(data.quantity, data.equipped));
        }
    }

    services
        .broadcaster
        .notify_player_spawn(user_id, &account.username, &position, sender.clone())
        .await?;
    services
        .npc_engine
        .send_npcs_to_player(sender, position.map)
        .await;

    log::info!(
        "[{}] {} logged in as user {user_id} on map {}",
        session.peer,
        account.username,
        position.map
    );
    Ok(())
}

fn find_free_tile_near(services: &Services, position: &Position) -> Option<(i32, i32)> {
    for radius in 1..=3 {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let (x, y) = (position.x + dx, position.y + dy);
                if services.maps.can_move_to(position.map, x, y)
                    && !services.spatial.is_tile_occupied(position.map, x, y)
                {
                    return Some((x, y));
                }
            }
        }
    }
    None
}

pub async fn handle_quit(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;
    sender.console_msg("Hasta pronto.");
    log::info!("user {user_id} quit");
    disconnect_cleanup(services, session, true).await;
    Ok(())
}

pub fn handle_online(services: &Arc<Services>, sender: &MessageSender) -> Result<(), GameError> {
    let names = services.spatial.all_connected_usernames();
    if names.is_empty() {
        sender.console_msg("No hay usuarios conectados.");
    } else {
        sender.console_msg(&format!(
            "Usuarios conectados ({}): {}",
            names.len(),
            names.join(", ")
        ));
    }
    Ok(())
}

pub fn handle_uptime(services: &Arc<Services>, sender: &MessageSender) -> Result<(), GameError> {
    let elapsed = services.started_at.elapsed().as_secs();
    let (days, rest) = (elapsed / 86_400, elapsed % 86_400);
    let (hours, rest) = (rest / 3_600, rest % 3_600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    sender.console_msg(&format!(
        "Uptime: {days}d {hours}h {minutes}m {seconds}s"
    ));
    Ok(())
}

pub fn handle_ayuda(sender: &MessageSender) -> Result<(), GameError> {
    sender.multiline_console_msg(
        "Comandos disponibles:\n\
         /online - lista de usuarios conectados\n\
         /uptime - tiempo en línea del servidor\n\
         /salir - abandonar el juego\n\
         /meditar - recuperar mana meditando",
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::PacketRouter;
    use crate::services::test_support::TestWorld;
    use game_core::protocol::{PacketBuilder, ServerPacketId};

    fn login_frame(username: &str, password: &str) -> Vec<u8> {
        PacketBuilder::new()
            .byte(2)
            .string(username)
            .string(password)
            .into_bytes()
    }

    #[tokio::test]
    async fn login_runs_the_world_entry_sequence() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let session = world.anonymous_session();

        PacketRouter::route(
            &world.services,
            &session.session,
            &session.sender,
            &login_frame("alice", "secret"),
        )
        .await;

        assert!(session.session.is_authenticated());
        let ids: Vec<u8> = session
            .outbox
            .frames_snapshot()
            .iter()
            .map(|f| f.bytes[0])
            .collect();
        let expected_prefix = [
            ServerPacketId::Logged as u8,
            ServerPacketId::UserCharIndexInServer as u8,
            ServerPacketId::ChangeMap as u8,
            ServerPacketId::PosUpdate as u8,
            ServerPacketId::UpdateUserStats as u8,
            ServerPacketId::UpdateHungerAndThirst as u8,
        ];
        assert_eq!(&ids[..expected_prefix.len()], &expected_prefix);
        assert_eq!(world.services.spatial.players_in_map(1, None), vec![7]);
        assert!(world.services.spatial.is_tile_occupied(1, 50, 50));
    }

    #[tokio::test]
    async fn bad_credentials_are_rejected() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let session = world.anonymous_session();

        PacketRouter::route(
            &world.services,
            &session.session,
            &session.sender,
            &login_frame("alice", "wrong"),
        )
        .await;

        assert!(!session.session.is_authenticated());
        let frames = session.outbox.frames_snapshot();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bytes[0], ServerPacketId::ErrorMsg as u8);
    }

    #[tokio::test]
    async fn double_login_of_the_same_character_is_refused() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let first = world.anonymous_session();
        PacketRouter::route(
            &world.services,
            &first.session,
            &first.sender,
            &login_frame("alice", "secret"),
        )
        .await;

        let second = world.anonymous_session();
        PacketRouter::route(
            &world.services,
            &second.session,
            &second.sender,
            &login_frame("alice", "secret"),
        )
        .await;
        assert!(!second.session.is_authenticated());
    }

    #[tokio::test]
    async fn quit_announces_and_cleans_up() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;
        let bob = world.join_second_player(8, "Bob", 1, 52, 50).await;

        PacketRouter::route(&world.services, &alice.session, &alice.sender, &[29]).await;

        assert!(world.services.spatial.players_in_map(1, None).contains(&8));
        assert!(!world.services.spatial.players_in_map(1, None).contains(&7));
        assert!(!world.services.spatial.is_tile_occupied(1, 50, 50));
        // Bob got the CHARACTER_REMOVE.
        assert!(bob
            .outbox
            .frames_snapshot()
            .iter()
            .any(|f| f.bytes[0] == ServerPacketId::CharacterRemove as u8));
    }

    #[tokio::test]
    async fn online_and_uptime_answer() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let session = world.login_session(7, "Alice");
        world.enter_world(&session, 1, 50, 50).await;

        PacketRouter::route(&world.services, &session.session, &session.sender, &[28]).await;
        PacketRouter::route(&world.services, &session.session, &session.sender, &[27]).await;
        let frames = session.outbox.frames_snapshot();
        assert!(frames.len() >= 2);
        assert!(frames
            .iter()
            .all(|f| f.bytes[0] == ServerPacketId::ConsoleMsg as u8));
    }
}
