//! WALK and CHANGE_HEADING, including map-border hand-offs.

use std::sync::Arc;

use game_core::protocol::PacketReader;

use crate::driver::require_user;
use crate::error::GameError;
use crate::helpers::heading_delta;
use crate::maps::Edge;
use crate::messaging::MessageSender;
use crate::repository::{Heading, Position};
use crate::services::Services;
use crate::session::Session;
use crate::spatial::OccupantTag;

fn edge_of(heading: Heading) -> Edge {
    match heading {
        Heading::North => Edge::North,
        Heading::East => Edge::East,
        Heading::South => Edge::South,
        Heading::West => Edge::West,
    }
}

pub async fn handle_walk(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
    reader: &mut PacketReader<'_>,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;
    let heading_raw = reader.byte()?;
    let Some(heading) = Heading::from_u8(heading_raw) else {
        return Err(GameError::InvalidInput("Dirección inválida.".into()));
    };

    let Some(position) = services.player_repo.get_position(user_id).await? else {
        return Err(GameError::NotFound("No se encontró tu posición.".into()));
    };

    // Dead and paralyzed players do not move.
    if !services.player_repo.is_alive(user_id).await? {
        sender.pos_update(position.x, position.y);
        return Ok(());
    }
    if services.player_repo.get_paralyzed_until(user_id).await? > crate::helpers::now_secs() {
        sender.console_msg("Estás paralizado.");
        sender.pos_update(position.x, position.y);
        return Ok(());
    }

    let cost_walk = services.config.game.stamina.cost_walk;
    if cost_walk > 0 {
        let Some(stats) = services.player_repo.get_stats(user_id).await? else {
            return Err(GameError::NotFound("No se encontraron tus stats.".into()));
        };
        if stats.min_sta < cost_walk {
            sender.console_msg("Estás demasiado cansado para moverte.");
            sender.pos_update(position.x, position.y);
            return Ok(());
        }
        services
            .player_repo
            .update_stamina(user_id, stats.min_sta - cost_walk)
            .await?;
    }

    let (dx, dy) = heading_delta(heading);
    let (new_x, new_y) = (position.x + dx, position.y + dy);
    let edge = edge_of(heading);

    // Border crossing hands the player to the neighboring map.
    let crossing = !services.maps.in_bounds(position.map, new_x, new_y)
        || services.maps.is_border(position.map, new_x, new_y, edge);
    if crossing {
        if let Some(transition) = services.maps.transition(position.map, edge) {
            return transfer_player(services, user_id, sender, &position, heading, transition.to_map, transition.to_x, transition.to_y).await;
        }
    }

    if !services.maps.can_move_to(position.map, new_x, new_y) {
        sender.pos_update(position.x, position.y);
        return Ok(());
    }
    if !services.spatial.move_occupant(
        position.map,
        position.map,
        position.x,
        position.y,
        new_x,
        new_y,
        OccupantTag::Player(user_id),
    ) {
        sender.pos_update(position.x, position.y);
        return Ok(());
    }

    let new_position = Position {
        map: position.map,
        x: new_x,
        y: new_y,
        heading,
    };
    services.player_repo.set_position(user_id, &new_position).await?;

    let (body, head) = services.broadcaster.player_appearance(user_id).await?;
    services
        .broadcaster
        .broadcast_character_move(
            position.map,
            user_id,
            body,
            head,
            new_x,
            new_y,
            heading,
            Some(position.heading),
        )
        .await?;
    Ok(())
}

/// The atomic map hand-off: leave the old roster, announce the exit,
/// enter the new map with the full arrival sequence.
#[allow(clippy::too_many_arguments)]
async fn transfer_player(
    services: &Arc<Services>,
    user_id: i32,
    sender: &MessageSender,
    from: &Position,
    heading: Heading,
    to_map: i32,
    to_x: i32,
    to_y: i32,
) -> Result<(), GameError> {
    if !services.maps.contains(to_map) {
        log::error!("transition from map {} points at unknown map {to_map}", from.map);
        sender.pos_update(from.x, from.y);
        return Ok(());
    }

    let username = services
        .spatial
        .username_for(user_id)
        .unwrap_or_default();

    services.spatial.remove_player(from.map, user_id);
    services.broadcaster.broadcast_character_remove(from.map, user_id);

    let destination = Position {
        map: to_map,
        x: to_x,
        y: to_y,
        heading,
    };
    services.player_repo.set_position(user_id, &destination).await?;
    services
        .spatial
        .claim_tile(to_map, to_x, to_y, OccupantTag::Player(user_id));

    sender.change_map(to_map, 0);
    sender.pos_update(to_x, to_y);

    services
        .broadcaster
        .notify_player_spawn(user_id, &username, &destination, sender.clone())
        .await?;
    services.npc_engine.send_npcs_to_player(sender, to_map).await;

    log::info!(
        "user {user_id} crossed from map {} to map {to_map} ({to_x}, {to_y})",
        from.map
    );
    Ok(())
}

pub async fn handle_change_heading(
    services: &Arc<Services>,
    session: &Arc<Session>,
    _sender: &MessageSender,
    reader: &mut PacketReader<'_>,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;
    let heading_raw = reader.byte()?;
    let Some(heading) = Heading::from_u8(heading_raw) else {
        return Err(GameError::InvalidInput("Dirección inválida.".into()));
    };

    let Some(position) = services.player_repo.get_position(user_id).await? else {
        return Err(GameError::NotFound("No se encontró tu posición.".into()));
    };
    if position.heading == heading {
        return Ok(());
    }

    services.player_repo.set_heading(user_id, heading).await?;
    let (body, head) = services.broadcaster.player_appearance(user_id).await?;
    services.broadcaster.broadcast_character_change(
        position.map,
        user_id,
        body,
        head,
        heading,
        Some(user_id),
    );
    Ok(())
}
