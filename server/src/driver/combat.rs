//! ATTACK and CAST_SPELL.

use std::sync::Arc;

use game_core::constants::{
    FX_BLOOD, FX_CRITICAL_HIT, FX_LOOPS_ONCE, SOUND_MISS, SOUND_SWORD_HIT,
};
use game_core::protocol::PacketReader;

use crate::combat::AttackOutcome;
use crate::driver::require_user;
use crate::error::GameError;
use crate::helpers::heading_delta;
use crate::messaging::MessageSender;
use crate::services::Services;
use crate::session::Session;

pub async fn handle_attack(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;

    let Some(position) = services.player_repo.get_position(user_id).await? else {
        return Err(GameError::NotFound("No se encontró tu posición.".into()));
    };
    if !services.player_repo.is_alive(user_id).await? {
        sender.console_msg("Los muertos no pueden atacar.");
        return Ok(());
    }

    let cost_attack = services.config.game.stamina.cost_attack;
    if cost_attack > 0 {
        let Some(stats) = services.player_repo.get_stats(user_id).await? else {
            return Err(GameError::NotFound("No se encontraron tus stats.".into()));
        };
        if stats.min_sta < cost_attack {
            return Err(GameError::InsufficientResource(
                "Estás demasiado cansado para atacar.".into(),
            ));
        }
        services
            .player_repo
            .update_stamina(user_id, stats.min_sta - cost_attack)
            .await?;
    }

    let (dx, dy) = heading_delta(position.heading);
    let (target_x, target_y) = (position.x + dx, position.y + dy);

    let Some(npc) = services
        .npc_registry
        .find_at(position.map, target_x, target_y)
    else {
        sender.console_msg("No hay nada que atacar ahí.");
        sender.play_wave(SOUND_MISS, position.x, position.y);
        return Ok(());
    };
    if !npc.is_attackable() {
        sender.console_msg(&format!("No puedes atacar a {}.", npc.name));
        return Ok(());
    }

    let Some(outcome) = services
        .combat
        .player_attacks_npc(user_id, npc.instance_id)
        .await?
    else {
        sender.console_msg("No puedes atacar en este momento.");
        return Ok(());
    };

    match outcome {
        AttackOutcome::Dodged => {
            sender.console_msg(&format!("{} esquivó tu ataque.", npc.name));
            sender.play_wave(SOUND_MISS, target_x, target_y);
        }
        AttackOutcome::Hit(result) => {
            sender.play_wave(SOUND_SWORD_HIT, target_x, target_y);
            let fx = if result.critical {
                FX_CRITICAL_HIT
            } else {
                FX_BLOOD
            };
            services
                .broadcaster
                .broadcast_create_fx(position.map, npc.char_index, fx, FX_LOOPS_ONCE);

            if result.critical {
                sender.console_msg(&format!(
                    "¡Golpe crítico! Le hiciste {} de daño a {}.",
                    result.damage, npc.name
                ));
            } else {
                sender.console_msg(&format!(
                    "Le hiciste {} de daño a {}.",
                    result.damage, npc.name
                ));
            }

            if result.npc_died {
                sender.console_msg(&format!(
                    "¡Has matado a {}! Ganaste {} EXP.",
                    npc.name,
                    result.experience.unwrap_or(0)
                ));
            } else if let Some(live) = services.npc_registry.get(npc.instance_id) {
                let percent = live.hp * 100 / live.max_hp.max(1);
                sender.console_msg(&format!(
                    "{} tiene {}/{} HP ({percent}%).",
                    live.name, live.hp, live.max_hp
                ));
            }
        }
    }
    Ok(())
}

pub async fn handle_cast_spell(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
    reader: &mut PacketReader<'_>,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;
    let slot = reader.byte()?;
    let target_x = reader.byte()? as i32;
    let target_y = reader.byte()? as i32;

    let Some(spell_id) = services.player_repo.get_spell_slot(user_id, slot).await? else {
        sender.console_msg("No tienes ese hechizo.");
        return Ok(());
    };

    if services.player_repo.is_meditating(user_id).await? {
        sender.console_msg("No puedes lanzar hechizos mientras meditas.");
        return Ok(());
    }

    let cost_spell = services.config.game.stamina.cost_spell;
    if cost_spell > 0 {
        let Some(stats) = services.player_repo.get_stats(user_id).await? else {
            return Err(GameError::NotFound("No se encontraron tus stats.".into()));
        };
        if stats.min_sta < cost_spell {
            return Err(GameError::InsufficientResource(
                "Estás demasiado cansado para lanzar hechizos.".into(),
            ));
        }
        services
            .player_repo
            .update_stamina(user_id, stats.min_sta - cost_spell)
            .await?;
    }

    services
        .spells
        .cast(user_id, spell_id, target_x, target_y, sender)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::PacketRouter;
    use crate::services::test_support::TestWorld;
    use game_core::constants::GOLD_ITEM_ID;
    use game_core::protocol::ServerPacketId;

    #[tokio::test]
    async fn attacking_empty_air_misses() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;

        PacketRouter::route(&world.services, &alice.session, &alice.sender, &[34]).await;
        assert!(alice
            .outbox
            .frames_snapshot()
            .iter()
            .any(|f| f.bytes[0] == ServerPacketId::PlayWave as u8));
    }

    #[tokio::test]
    async fn adjacency_two_cannot_hit() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        // Goblin two tiles east of a south-facing player: nothing in
        // front, nothing happens to the NPC.
        world.spawn_goblin(1, 52, 50, 5).await;
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;

        PacketRouter::route(&world.services, &alice.session, &alice.sender, &[34]).await;
        let npc = world.services.npc_registry.find_at(1, 52, 50).unwrap();
        assert_eq!(npc.hp, npc.max_hp);
    }

    #[tokio::test]
    async fn melee_kill_drops_gold_and_removes_the_npc() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        // hp 5 goblin directly east; STR/2 + fists = 10 damage.
        world.spawn_goblin(1, 51, 50, 5).await;
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;
        world.face(7, crate::repository::Heading::East).await;

        PacketRouter::route(&world.services, &alice.session, &alice.sender, &[34]).await;

        assert!(world.services.npc_registry.find_at(1, 51, 50).is_none());
        let stacks = world.services.spatial.ground_items_at(1, 51, 50);
        assert_eq!(stacks.len(), 1);
        assert_eq!(stacks[0].item_id, GOLD_ITEM_ID);
        // Killer sees OBJECT_CREATE, CHARACTER_REMOVE and the updated stats.
        let ids: Vec<u8> = alice
            .outbox
            .frames_snapshot()
            .iter()
            .map(|f| f.bytes[0])
            .collect();
        assert!(ids.contains(&(ServerPacketId::ObjectCreate as u8)));
        assert!(ids.contains(&(ServerPacketId::CharacterRemove as u8)));
        assert!(ids.contains(&(ServerPacketId::UpdateUserStats as u8)));
        let stats = world.stats(7).await;
        assert!(stats.exp > 0);
    }

    #[tokio::test]
    async fn casting_an_unknown_slot_is_polite() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;

        PacketRouter::route(
            &world.services,
            &alice.session,
            &alice.sender,
            &[39, 1, 52, 50, 0, 0, 0],
        )
        .await;
        assert!(alice
            .outbox
            .frames_snapshot()
            .iter()
            .any(|f| f.bytes[0] == ServerPacketId::ConsoleMsg as u8));
    }

    #[tokio::test]
    async fn spell_cast_damages_the_target() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        world.spawn_goblin(1, 52, 50, 50).await;
        world.learn_spell(7, 1, 1).await; // slot 1: test damage spell
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;

        PacketRouter::route(
            &world.services,
            &alice.session,
            &alice.sender,
            &[39, 1, 52, 50, 0, 0, 0],
        )
        .await;

        let npc = world.services.npc_registry.find_at(1, 52, 50).unwrap();
        assert!(npc.hp < npc.max_hp);
        let stats = world.stats(7).await;
        assert!(stats.min_mana < stats.max_mana);
    }
}
