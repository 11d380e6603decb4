//! DROP, PICK_UP, and EQUIP_ITEM.

use std::sync::Arc;

use game_core::constants::{GOLD_GRH_INDEX, GOLD_ITEM_ID, GOLD_SLOT};
use game_core::protocol::PacketReader;

use crate::driver::require_user;
use crate::error::GameError;
use crate::items::ItemType;
use crate::messaging::MessageSender;
use crate::repository::{EquipmentKind, InventorySlotData};
use crate::services::Services;
use crate::session::Session;
use crate::spatial::GroundItem;

pub async fn handle_drop(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
    reader: &mut PacketReader<'_>,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;
    let slot = reader.byte()?;
    let quantity = reader.uint16()? as i32;

    if quantity <= 0 {
        sender.console_msg("Cantidad inválida.");
        return Ok(());
    }

    if slot == GOLD_SLOT {
        return drop_gold(services, user_id, sender, quantity).await;
    }
    drop_item(services, user_id, sender, slot, quantity).await
}

async fn drop_gold(
    services: &Arc<Services>,
    user_id: i32,
    sender: &MessageSender,
    quantity: i32,
) -> Result<(), GameError> {
    let Some(stats) = services.player_repo.get_stats(user_id).await? else {
        return Err(GameError::NotFound("No se encontraron tus stats.".into()));
    };
    if stats.gold < quantity {
        sender.console_msg(&format!(
            "No tienes suficiente oro. Tienes {} y quieres tirar {quantity}.",
            stats.gold
        ));
        return Ok(());
    }

    let Some(position) = services.player_repo.get_position(user_id).await? else {
        return Err(GameError::NotFound("No se encontró tu posición.".into()));
    };

    services
        .player_repo
        .update_gold(user_id, stats.gold - quantity)
        .await?;
    if let Some(updated) = services.player_repo.get_stats(user_id).await? {
        sender.update_user_stats(&updated);
    }

    services.spatial.add_ground_item(
        position.map,
        position.x,
        position.y,
        GroundItem {
            item_id: GOLD_ITEM_ID,
            quantity,
            grh_index: GOLD_GRH_INDEX,
            owner_id: None,
            spawn_time: None,
        },
    );
    services
        .broadcaster
        .broadcast_object_create(position.map, position.x, position.y, GOLD_GRH_INDEX);

    sender.console_msg(&format!("Tiraste {quantity} monedas de oro al suelo."));
    log::info!(
        "user {user_id} dropped {quantity} gold at ({}, {})",
        position.x,
        position.y
    );
    Ok(())
}

async fn drop_item(
    services: &Arc<Services>,
    user_id: i32,
    sender: &MessageSender,
    slot: u8,
    quantity: i32,
) -> Result<(), GameError> {
    let Some(slot_data) = services.inventory_repo.get_slot(user_id, slot).await? else {
        sender.console_msg("No tienes nada en ese espacio.");
        return Ok(());
    };
    if slot_data.equipped {
        sender.console_msg("Primero debes desequipar el objeto.");
        return Ok(());
    }
    if slot_data.quantity < quantity {
        sender.console_msg("No tienes tantos objetos.");
        return Ok(());
    }
    let Some(def) = services.item_catalog.get(slot_data.item_id) else {
        return Err(GameError::NotFound("Objeto desconocido.".into()));
    };

    let Some(position) = services.player_repo.get_position(user_id).await? else {
        return Err(GameError::NotFound("No se encontró tu posición.".into()));
    };

    let remaining = slot_data.quantity - quantity;
    if remaining > 0 {
        let updated = InventorySlotData {
            quantity: remaining,
            ..slot_data
        };
        services.inventory_repo.set_slot(user_id, slot, updated).await?;
        sender.change_inventory_slot(slot, &def.to_slot_item(remaining, false));
    } else {
        services.inventory_repo.clear_slot(user_id, slot).await?;
        sender.change_inventory_slot(slot, &empty_slot_item());
    }

    services.spatial.add_ground_item(
        position.map,
        position.x,
        position.y,
        GroundItem {
            item_id: def.id,
            quantity,
            grh_index: def.grh_index,
            owner_id: None,
            spawn_time: None,
        },
    );
    services
        .broadcaster
        .broadcast_object_create(position.map, position.x, position.y, def.grh_index);
    sender.console_msg(&format!("Tiraste {quantity} {} al suelo.", def.name));
    Ok(())
}

fn empty_slot_item() -> game_core::protocol::outbound::SlotItem {
    game_core::protocol::outbound::SlotItem {
        item_id: 0,
        name: String::new(),
        amount: 0,
        equipped: false,
        grh_index: 0,
        item_type: 0,
        max_hit: 0,
        min_hit: 0,
        max_def: 0,
        min_def: 0,
        sale_price: 0.0,
    }
}

pub async fn handle_pickup(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;
    let Some(position) = services.player_repo.get_position(user_id).await? else {
        return Err(GameError::NotFound("No se encontró tu posición.".into()));
    };

    let stacks = services
        .spatial
        .ground_items_at(position.map, position.x, position.y);
    let Some(stack) = stacks.first() else {
        sender.console_msg("No hay nada aquí.");
        return Ok(());
    };

    if stack.item_id == GOLD_ITEM_ID {
        let Some(stats) = services.player_repo.get_stats(user_id).await? else {
            return Err(GameError::NotFound("No se encontraron tus stats.".into()));
        };
        services
            .player_repo
            .update_gold(user_id, stats.gold + stack.quantity)
            .await?;
        if let Some(updated) = services.player_repo.get_stats(user_id).await? {
            sender.update_user_stats(&updated);
        }
        sender.console_msg(&format!("Recogiste {} monedas de oro.", stack.quantity));
    } else {
        let Some(def) = services.item_catalog.get(stack.item_id) else {
            return Err(GameError::NotFound("Objeto desconocido.".into()));
        };
        let slots = services.inventory_repo.slots(user_id).await?;
        let max_slots = services.config.game.inventory.max_slots;

        // Merge onto an existing stack, else take the first free slot.
        let target = slots
            .iter()
            .find(|(_, data)| data.item_id == stack.item_id && !data.equipped)
            .map(|(slot, data)| (*slot, data.quantity + stack.quantity))
            .or_else(|| {
                (1..=max_slots)
                    .find(|candidate| !slots.iter().any(|(slot, _)| slot == candidate))
                    .map(|slot| (slot, stack.quantity))
            });
        let Some((slot, quantity)) = target else {
            sender.console_msg("No tienes espacio en el inventario.");
            return Ok(());
        };

        services
            .inventory_repo
            .set_slot(
                user_id,
                slot,
                InventorySlotData {
                    item_id: stack.item_id,
                    quantity,
                    equipped: false,
                },
            )
            .await?;
        sender.change_inventory_slot(slot, &def.to_slot_item(quantity, false));
        sender.console_msg(&format!("Recogiste {} ({}).", def.name, stack.quantity));
    }

    if let Some((_, now_empty)) =
        services
            .spatial
            .remove_ground_item(position.map, position.x, position.y, 0)
    {
        if now_empty {
            services
                .broadcaster
                .broadcast_object_delete(position.map, position.x, position.y);
        }
    }
    Ok(())
}

pub async fn handle_equip_item(
    services: &Arc<Services>,
    session: &Arc<Session>,
    sender: &MessageSender,
    reader: &mut PacketReader<'_>,
) -> Result<(), GameError> {
    let user_id = require_user(session)?;
    let slot = reader.byte()?;

    let Some(slot_data) = services.inventory_repo.get_slot(user_id, slot).await? else {
        sender.console_msg("No tienes ese objeto.");
        return Ok(());
    };
    let Some(def) = services.item_catalog.get(slot_data.item_id) else {
        return Err(GameError::NotFound("Objeto desconocido.".into()));
    };
    let kind = match def.item_type {
        ItemType::Weapon => EquipmentKind::Weapon,
        ItemType::Armor => EquipmentKind::Armor,
        ItemType::Helmet => EquipmentKind::Helmet,
        ItemType::Shield => EquipmentKind::Shield,
        _ => {
            sender.console_msg("No puedes equipar eso.");
            return Ok(());
        }
    };

    let equipment = services.inventory_repo.get_equipment(user_id).await?;

    if equipment.get(kind) == Some(slot) {
        // Toggle off.
        services.inventory_repo.set_equipped(user_id, kind, None).await?;
        services
            .inventory_repo
            .set_slot(
                user_id,
                slot,
                InventorySlotData {
                    equipped: false,
                    ..slot_data
                },
            )
            .await?;
        sender.change_inventory_slot(slot, &def.to_slot_item(slot_data.quantity, false));
        sender.console_msg(&format!("Te quitaste {}.", def.name));
        return Ok(());
    }

    // Swap out whatever occupied the kind before.
    if let Some(previous_slot) = equipment.get(kind) {
        if let Some(previous) = services.inventory_repo.get_slot(user_id, previous_slot).await? {
            services
                .inventory_repo
                .set_slot(
                    user_id,
                    previous_slot,
                    InventorySlotData {
                        equipped: false,
                        ..previous
                    },
                )
                .await?;
            if let Some(previous_def) = services.item_catalog.get(previous.item_id) {
                sender.change_inventory_slot(
                    previous_slot,
                    &previous_def.to_slot_item(previous.quantity, false),
                );
            }
        }
    }

    services
        .inventory_repo
        .set_equipped(user_id, kind, Some(slot))
        .await?;
    services
        .inventory_repo
        .set_slot(
            user_id,
            slot,
            InventorySlotData {
                equipped: true,
                ..slot_data
            },
        )
        .await?;
    sender.change_inventory_slot(slot, &def.to_slot_item(slot_data.quantity, true));
    sender.console_msg(&format!("Te equipaste {}.", def.name));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::PacketRouter;
    use crate::services::test_support::TestWorld;
    use game_core::protocol::{PacketBuilder, ServerPacketId};

    fn drop_frame(slot: u8, quantity: u16) -> Vec<u8> {
        PacketBuilder::new()
            .byte(15)
            .byte(slot)
            .int16(quantity as i16)
            .into_bytes()
    }

    #[tokio::test]
    async fn zero_quantity_drop_is_rejected() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;
        world.give_gold(7, 100).await;

        PacketRouter::route(
            &world.services,
            &alice.session,
            &alice.sender,
            &drop_frame(GOLD_SLOT, 0),
        )
        .await;

        assert_eq!(world.stats(7).await.gold, 100);
        assert!(world
            .services
            .spatial
            .ground_items_at(1, 50, 50)
            .is_empty());
    }

    #[tokio::test]
    async fn gold_drop_round_trip() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;
        world.give_gold(7, 100).await;

        PacketRouter::route(
            &world.services,
            &alice.session,
            &alice.sender,
            &drop_frame(GOLD_SLOT, 40),
        )
        .await;
        assert_eq!(world.stats(7).await.gold, 60);
        let stacks = world.services.spatial.ground_items_at(1, 50, 50);
        assert_eq!(stacks[0].quantity, 40);

        // PICK_UP takes it back and clears the tile.
        PacketRouter::route(&world.services, &alice.session, &alice.sender, &[32]).await;
        assert_eq!(world.stats(7).await.gold, 100);
        assert!(world
            .services
            .spatial
            .ground_items_at(1, 50, 50)
            .is_empty());
        assert!(alice
            .outbox
            .frames_snapshot()
            .iter()
            .any(|f| f.bytes[0] == ServerPacketId::ObjectDelete as u8));
    }

    #[tokio::test]
    async fn over_drop_is_refused() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;
        world.give_gold(7, 10).await;

        PacketRouter::route(
            &world.services,
            &alice.session,
            &alice.sender,
            &drop_frame(GOLD_SLOT, 500),
        )
        .await;
        assert_eq!(world.stats(7).await.gold, 10);
    }

    #[tokio::test]
    async fn pickup_on_a_bare_tile_answers_politely() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;

        PacketRouter::route(&world.services, &alice.session, &alice.sender, &[32]).await;
        assert!(alice
            .outbox
            .frames_snapshot()
            .iter()
            .any(|f| f.bytes[0] == ServerPacketId::ConsoleMsg as u8));
    }

    #[tokio::test]
    async fn equip_and_unequip_a_weapon() {
        let world = TestWorld::with_player(7, "Alice", 1, 50, 50).await;
        let alice = world.login_session(7, "Alice");
        world.enter_world(&alice, 1, 50, 50).await;
        world.give_item(7, 3, 44, 1).await; // sword in slot 3

        PacketRouter::route(&world.services, &alice.session, &alice.sender, &[19, 3]).await;
        let equipment = world.equipment(7).await;
        assert_eq!(equipment.weapon, Some(3));

        PacketRouter::route(&world.services, &alice.session, &alice.sender, &[19, 3]).await;
        let equipment = world.equipment(7).await;
        assert_eq!(equipment.weapon, None);
    }
}
