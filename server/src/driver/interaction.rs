//! TALK, clicks, commerce/bank bookends, and MEDITATE.

use std::sync::Arc;

use game_core::constants::{FONT_COLOR_TALK, FX_LOOPS_INFINITE, FX_MEDITATION};
use game_core::protocol::outbound::SlotItem;
use game_core::protocol::PacketReader;

use crate::driver::require_user;
use crate::error::GameError;
use crate::helpers::heading_delta;
use crate::messaging::MessageSender;
use crate::services::Services;
use crate::session::Session;

pub async fn handle_talk(
    services: &Arc<Services>,
    session: &Arc<Session>,
    reader: &mut PacketReader<'_>,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;
    let message = reader.string()?;
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let Some(position) = services.player_repo.get_position(user_id).await? else {
        return Ok(());
    };
    let username = services
        .spatial
        .username_for(user_id)
        .unwrap_or_else(|| session.username());

    services.broadcaster.broadcast_console_msg(
        position.map,
        &format!("{username}: {trimmed}"),
        FONT_COLOR_TALK,
    );
    log::info!("[map {}] {username}: {trimmed}", position.map);
    Ok(())
}

pub async fn handle_left_click(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
    reader: &mut PacketReader<'_>,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;
    let x = reader.byte()? as i32;
    let y = reader.byte()? as i32;

    let Some(position) = services.player_repo.get_position(user_id).await? else {
        return Ok(());
    };

    if let Some(npc) = services.npc_registry.find_at(position.map, x, y) {
        let mut parts = vec![format!("[{}]", npc.name)];
        if !npc.description.is_empty() {
            parts.push(npc.description.clone());
        }
        parts.push(if npc.is_hostile() {
            format!("Nivel {} - Hostil", npc.level)
        } else {
            format!("Nivel {} - Amigable", npc.level)
        });
        parts.push(format!("HP: {}/{}", npc.hp, npc.max_hp));
        sender.console_msg(&parts.join(" | "));
        return Ok(());
    }

    if let Some(text) = services.maps.sign_text(position.map, x, y) {
        sender.console_msg(text);
        return Ok(());
    }

    sender.console_msg(&format!("No hay nadie en ({x}, {y})."));
    Ok(())
}

pub async fn handle_double_click(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
    reader: &mut PacketReader<'_>,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;
    let _target = reader.byte()?;

    let Some(position) = services.player_repo.get_position(user_id).await? else {
        return Ok(());
    };
    let (dx, dy) = heading_delta(position.heading);
    let Some(npc) = services
        .npc_registry
        .find_at(position.map, position.x + dx, position.y + dy)
    else {
        sender.console_msg("No hay nadie ahí.");
        return Ok(());
    };

    if npc.is_merchant() {
        let mut items: Vec<(u8, SlotItem)> = Vec::new();
        for (index, item_id) in npc.stock.iter().enumerate() {
            if let Some(def) = services.item_catalog.get(*item_id) {
                items.push(((index + 1) as u8, def.to_slot_item(1, false)));
            }
        }
        sender.commerce_init(npc.npc_id, &items);
        log::debug!("user {user_id} opened commerce with {}", npc.name);
        return Ok(());
    }

    if npc.is_banker() {
        let mut items: Vec<(u8, SlotItem)> = Vec::new();
        for (slot, data) in services.inventory_repo.bank_slots(user_id).await? {
            if let Some(def) = services.item_catalog.get(data.item_id) {
                items.push((slot, def.to_slot_item(data.quantity, false)));
            }
        }
        sender.bank_init(&items);
        log::debug!("user {user_id} opened the bank vault");
        return Ok(());
    }

    sender.console_msg(&format!("{} no tiene nada para ti.", npc.name));
    Ok(())
}

pub fn handle_commerce_end(sender: &MessageSender) -> Result<(), GameError> {
    sender.commerce_end();
    Ok(())
}

pub fn handle_bank_end(sender: &MessageSender) -> Result<(), GameError> {
    sender.bank_end();
    Ok(())
}

pub async fn handle_meditate(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;

    if services.player_repo.is_meditating(user_id).await? {
        services.player_repo.set_meditating(user_id, false).await?;
        sender.meditate_toggle();
        sender.console_msg("Dejas de meditar.");
        return Ok(());
    }

    let Some(stats) = services.player_repo.get_stats(user_id).await? else {
        return Err(GameError::NotFound("No se encontraron tus stats.".into()));
    };
    if stats.min_mana >= stats.max_mana {
        sender.console_msg("Tu mana ya está completo.");
        return Ok(());
    }

    services.player_repo.set_meditating(user_id, true).await?;
    sender.meditate_toggle();
    sender.console_msg("Comienzas a meditar.");

    if let Some(position) = services.player_repo.get_position(user_id).await? {
        services.broadcaster.broadcast_create_fx(
            position.map,
            user_id,
            FX_MEDITATION,
            FX_LOOPS_INFINITE,
        );
    }
    Ok(())
}
