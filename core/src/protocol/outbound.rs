//! Builders for every server-to-client packet. Field order here is the
//! wire contract; the typed senders in the server call straight through.

use super::{PacketBuilder, ServerPacketId};

fn packet(id: ServerPacketId) -> PacketBuilder {
    PacketBuilder::new().byte(id as u8)
}

// =============================================================================
// Session / login
// =============================================================================

pub fn build_logged(user_class: u8) -> Vec<u8> {
    packet(ServerPacketId::Logged).byte(user_class).into_bytes()
}

pub fn build_user_char_index_in_server(char_index: i16) -> Vec<u8> {
    packet(ServerPacketId::UserCharIndexInServer)
        .int16(char_index)
        .into_bytes()
}

pub fn build_dice_roll(strength: u8, agility: u8, intelligence: u8, charisma: u8, constitution: u8) -> Vec<u8> {
    packet(ServerPacketId::DiceRoll)
        .byte(strength)
        .byte(agility)
        .byte(intelligence)
        .byte(charisma)
        .byte(constitution)
        .into_bytes()
}

pub fn build_attributes(strength: u8, agility: u8, intelligence: u8, charisma: u8, constitution: u8) -> Vec<u8> {
    packet(ServerPacketId::Attributes)
        .byte(strength)
        .byte(agility)
        .byte(intelligence)
        .byte(charisma)
        .byte(constitution)
        .into_bytes()
}

pub fn build_pong() -> Vec<u8> {
    packet(ServerPacketId::Pong).into_bytes()
}

// =============================================================================
// Characters
// =============================================================================

#[allow(clippy::too_many_arguments)]
pub fn build_character_create(
    char_index: i16,
    body: i16,
    head: i16,
    heading: u8,
    x: u8,
    y: u8,
    weapon: i16,
    shield: i16,
    helmet: i16,
    fx: i16,
    loops: i16,
    name: &str,
    nick_color: u8,
    privileges: u8,
) -> Vec<u8> {
    packet(ServerPacketId::CharacterCreate)
        .int16(char_index)
        .int16(body)
        .int16(head)
        .byte(heading)
        .byte(x)
        .byte(y)
        .int16(weapon)
        .int16(shield)
        .int16(helmet)
        .int16(fx)
        .int16(loops)
        .string(name)
        .byte(nick_color)
        .byte(privileges)
        .into_bytes()
}

#[allow(clippy::too_many_arguments)]
pub fn build_character_change(
    char_index: i16,
    body: i16,
    head: i16,
    heading: u8,
    weapon: i16,
    shield: i16,
    helmet: i16,
    fx: i16,
    loops: i16,
) -> Vec<u8> {
    packet(ServerPacketId::CharacterChange)
        .int16(char_index)
        .int16(body)
        .int16(head)
        .byte(heading)
        .int16(weapon)
        .int16(shield)
        .int16(helmet)
        .int16(fx)
        .int16(loops)
        .into_bytes()
}

/// Heading is deliberately absent; clients track it via CHARACTER_CHANGE.
pub fn build_character_move(char_index: i16, x: u8, y: u8) -> Vec<u8> {
    packet(ServerPacketId::CharacterMove)
        .int16(char_index)
        .byte(x)
        .byte(y)
        .into_bytes()
}

pub fn build_character_remove(char_index: i16) -> Vec<u8> {
    packet(ServerPacketId::CharacterRemove)
        .int16(char_index)
        .into_bytes()
}

// =============================================================================
// Map / world
// =============================================================================

pub fn build_change_map(map_number: i16, version: i16) -> Vec<u8> {
    packet(ServerPacketId::ChangeMap)
        .int16(map_number)
        .int16(version)
        .into_bytes()
}

pub fn build_pos_update(x: u8, y: u8) -> Vec<u8> {
    packet(ServerPacketId::PosUpdate).byte(x).byte(y).into_bytes()
}

pub fn build_object_create(x: u8, y: u8, grh_index: i16) -> Vec<u8> {
    packet(ServerPacketId::ObjectCreate)
        .byte(x)
        .byte(y)
        .int16(grh_index)
        .into_bytes()
}

pub fn build_object_delete(x: u8, y: u8) -> Vec<u8> {
    packet(ServerPacketId::ObjectDelete).byte(x).byte(y).into_bytes()
}

pub fn build_block_position(x: u8, y: u8, blocked: bool) -> Vec<u8> {
    packet(ServerPacketId::BlockPosition)
        .byte(x)
        .byte(y)
        .byte(blocked as u8)
        .into_bytes()
}

// =============================================================================
// Console
// =============================================================================

pub fn build_console_msg(message: &str, font_color: u8) -> Vec<u8> {
    packet(ServerPacketId::ConsoleMsg)
        .string(message)
        .byte(font_color)
        .into_bytes()
}

pub fn build_error_msg(message: &str) -> Vec<u8> {
    packet(ServerPacketId::ErrorMsg).string(message).into_bytes()
}

pub fn build_multi_message(index: u8, arg1: i16, arg2: i16) -> Vec<u8> {
    packet(ServerPacketId::MultiMessage)
        .byte(index)
        .int16(arg1)
        .int16(arg2)
        .into_bytes()
}

// =============================================================================
// Stats
// =============================================================================

#[allow(clippy::too_many_arguments)]
pub fn build_update_user_stats(
    max_hp: i16,
    min_hp: i16,
    max_mana: i16,
    min_mana: i16,
    max_sta: i16,
    min_sta: i16,
    gold: i32,
    level: u8,
    elu: i32,
    experience: i32,
) -> Vec<u8> {
    packet(ServerPacketId::UpdateUserStats)
        .int16(max_hp)
        .int16(min_hp)
        .int16(max_mana)
        .int16(min_mana)
        .int16(max_sta)
        .int16(min_sta)
        .int32(gold)
        .byte(level)
        .int32(elu)
        .int32(experience)
        .into_bytes()
}

pub fn build_update_hp(hp: i16) -> Vec<u8> {
    packet(ServerPacketId::UpdateHp).int16(hp).into_bytes()
}

pub fn build_update_mana(mana: i16) -> Vec<u8> {
    packet(ServerPacketId::UpdateMana).int16(mana).into_bytes()
}

pub fn build_update_sta(stamina: i16) -> Vec<u8> {
    packet(ServerPacketId::UpdateSta).int16(stamina).into_bytes()
}

pub fn build_update_gold(gold: i32) -> Vec<u8> {
    packet(ServerPacketId::UpdateGold).int32(gold).into_bytes()
}

pub fn build_update_exp(experience: i32) -> Vec<u8> {
    packet(ServerPacketId::UpdateExp).int32(experience).into_bytes()
}

pub fn build_update_hunger_and_thirst(
    max_water: u8,
    min_water: u8,
    max_hunger: u8,
    min_hunger: u8,
) -> Vec<u8> {
    packet(ServerPacketId::UpdateHungerAndThirst)
        .byte(max_water)
        .byte(min_water)
        .byte(max_hunger)
        .byte(min_hunger)
        .into_bytes()
}

pub fn build_update_str_and_dex(strength: u8, dexterity: u8) -> Vec<u8> {
    packet(ServerPacketId::UpdateStrAndDex)
        .byte(strength)
        .byte(dexterity)
        .into_bytes()
}

// =============================================================================
// FX / audio
// =============================================================================

pub fn build_create_fx(char_index: i16, fx: i16, loops: i16) -> Vec<u8> {
    packet(ServerPacketId::CreateFx)
        .int16(char_index)
        .int16(fx)
        .int16(loops)
        .into_bytes()
}

pub fn build_play_wave(wave_id: u8, x: u8, y: u8) -> Vec<u8> {
    packet(ServerPacketId::PlayWave)
        .byte(wave_id)
        .byte(x)
        .byte(y)
        .into_bytes()
}

pub fn build_play_midi(midi_id: u8) -> Vec<u8> {
    packet(ServerPacketId::PlayMidi).byte(midi_id).into_bytes()
}

// =============================================================================
// Inventory / commerce / bank / spells
// =============================================================================

/// Item description tuple shared by the inventory, bank, and NPC
/// inventory slot packets.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotItem {
    pub item_id: i16,
    pub name: String,
    pub amount: i16,
    pub equipped: bool,
    pub grh_index: i16,
    pub item_type: u8,
    pub max_hit: i16,
    pub min_hit: i16,
    pub max_def: i16,
    pub min_def: i16,
    pub sale_price: f32,
}

fn push_slot_item(builder: PacketBuilder, slot: u8, item: &SlotItem) -> PacketBuilder {
    builder
        .byte(slot)
        .int16(item.item_id)
        .string(&item.name)
        .int16(item.amount)
        .byte(item.equipped as u8)
        .int16(item.grh_index)
        .byte(item.item_type)
        .int16(item.max_hit)
        .int16(item.min_hit)
        .int16(item.max_def)
        .int16(item.min_def)
        .float32(item.sale_price)
}

pub fn build_change_inventory_slot(slot: u8, item: &SlotItem) -> Vec<u8> {
    push_slot_item(packet(ServerPacketId::ChangeInventorySlot), slot, item).into_bytes()
}

pub fn build_change_bank_slot(slot: u8, item: &SlotItem) -> Vec<u8> {
    push_slot_item(packet(ServerPacketId::ChangeBankSlot), slot, item).into_bytes()
}

pub fn build_change_npc_inventory_slot(slot: u8, item: &SlotItem) -> Vec<u8> {
    push_slot_item(packet(ServerPacketId::ChangeNpcInventorySlot), slot, item).into_bytes()
}

pub fn build_change_spell_slot(slot: u8, spell_id: i16, name: &str) -> Vec<u8> {
    packet(ServerPacketId::ChangeSpellSlot)
        .byte(slot)
        .int16(spell_id)
        .string(name)
        .into_bytes()
}

pub fn build_commerce_init(npc_id: i16, items: &[(u8, SlotItem)]) -> Vec<u8> {
    let mut builder = packet(ServerPacketId::CommerceInit)
        .int16(npc_id)
        .byte(items.len() as u8);
    for (slot, item) in items {
        builder = push_slot_item(builder, *slot, item);
    }
    builder.into_bytes()
}

pub fn build_commerce_end() -> Vec<u8> {
    packet(ServerPacketId::CommerceEnd).into_bytes()
}

pub fn build_bank_init(items: &[(u8, SlotItem)]) -> Vec<u8> {
    let mut builder = packet(ServerPacketId::BankInit).byte(items.len() as u8);
    for (slot, item) in items {
        builder = push_slot_item(builder, *slot, item);
    }
    builder.into_bytes()
}

pub fn build_bank_end() -> Vec<u8> {
    packet(ServerPacketId::BankEnd).into_bytes()
}

pub fn build_meditate_toggle() -> Vec<u8> {
    packet(ServerPacketId::MeditateToggle).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PacketReader;

    #[test]
    fn character_create_layout() {
        let frame = build_character_create(
            10001, 12, 0, 3, 50, 60, 0, 0, 0, 0, 0, "Goblin", 0, 0,
        );
        let mut r = PacketReader::new(&frame);
        assert_eq!(r.byte().unwrap(), ServerPacketId::CharacterCreate as u8);
        assert_eq!(r.int16().unwrap(), 10001);
        assert_eq!(r.int16().unwrap(), 12); // body
        assert_eq!(r.int16().unwrap(), 0); // head
        assert_eq!(r.byte().unwrap(), 3); // heading
        assert_eq!(r.byte().unwrap(), 50); // x
        assert_eq!(r.byte().unwrap(), 60); // y
        for _ in 0..5 {
            r.int16().unwrap(); // weapon, shield, helmet, fx, loops
        }
        assert_eq!(r.string().unwrap(), "Goblin");
        assert_eq!(r.byte().unwrap(), 0); // nick color
        assert_eq!(r.byte().unwrap(), 0); // privileges
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn character_move_has_no_heading() {
        let frame = build_character_move(7, 10, 20);
        assert_eq!(frame.len(), 5); // id + i16 + two bytes
        let mut r = PacketReader::new(&frame);
        assert_eq!(r.byte().unwrap(), ServerPacketId::CharacterMove as u8);
        assert_eq!(r.int16().unwrap(), 7);
        assert_eq!(r.byte().unwrap(), 10);
        assert_eq!(r.byte().unwrap(), 20);
    }

    #[test]
    fn update_user_stats_layout() {
        let frame = build_update_user_stats(100, 80, 50, 20, 90, 90, 1234, 5, 300, 250);
        let mut r = PacketReader::new(&frame);
        assert_eq!(r.byte().unwrap(), ServerPacketId::UpdateUserStats as u8);
        assert_eq!(r.int16().unwrap(), 100);
        assert_eq!(r.int16().unwrap(), 80);
        assert_eq!(r.int16().unwrap(), 50);
        assert_eq!(r.int16().unwrap(), 20);
        assert_eq!(r.int16().unwrap(), 90);
        assert_eq!(r.int16().unwrap(), 90);
        assert_eq!(r.int32().unwrap(), 1234);
        assert_eq!(r.byte().unwrap(), 5);
        assert_eq!(r.int32().unwrap(), 300);
        assert_eq!(r.int32().unwrap(), 250);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn console_msg_layout() {
        let frame = build_console_msg("hola", 7);
        let mut r = PacketReader::new(&frame);
        assert_eq!(r.byte().unwrap(), ServerPacketId::ConsoleMsg as u8);
        assert_eq!(r.string().unwrap(), "hola");
        assert_eq!(r.byte().unwrap(), 7);
    }

    #[test]
    fn inventory_slot_layout() {
        let item = SlotItem {
            item_id: 44,
            name: "Espada larga".into(),
            amount: 1,
            equipped: true,
            grh_index: 820,
            item_type: 1,
            max_hit: 9,
            min_hit: 4,
            max_def: 0,
            min_def: 0,
            sale_price: 120.0,
        };
        let frame = build_change_inventory_slot(3, &item);
        let mut r = PacketReader::new(&frame);
        assert_eq!(r.byte().unwrap(), ServerPacketId::ChangeInventorySlot as u8);
        assert_eq!(r.byte().unwrap(), 3);
        assert_eq!(r.int16().unwrap(), 44);
        assert_eq!(r.string().unwrap(), "Espada larga");
        assert_eq!(r.int16().unwrap(), 1);
        assert_eq!(r.byte().unwrap(), 1);
        assert_eq!(r.int16().unwrap(), 820);
        assert_eq!(r.byte().unwrap(), 1);
        assert_eq!(r.int16().unwrap(), 9);
        assert_eq!(r.int16().unwrap(), 4);
        assert_eq!(r.int16().unwrap(), 0);
        assert_eq!(r.int16().unwrap(), 0);
        assert_eq!(r.float32().unwrap(), 120.0);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn empty_bodied_packets() {
        assert_eq!(build_pong(), vec![ServerPacketId::Pong as u8]);
        assert_eq!(build_commerce_end(), vec![ServerPacketId::CommerceEnd as u8]);
        assert_eq!(build_bank_end(), vec![ServerPacketId::BankEnd as u8]);
        assert_eq!(
            build_meditate_toggle(),
            vec![ServerPacketId::MeditateToggle as u8]
        );
    }
}
