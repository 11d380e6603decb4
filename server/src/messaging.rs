//! Typed senders for every outbound packet. Each method serialises
//! through the protocol builders and enqueues on the session outbox.

use std::sync::Arc;

use game_core::constants::FONT_COLOR_DEFAULT;
use game_core::protocol::outbound::{self, SlotItem};

use crate::repository::{Heading, HungerThirst, PlayerStats};
use crate::session::{Outbox, OutboundFrame};

/// Cloneable handle to one session's outbound queue. Rosters store one
/// per connected player.
#[derive(Clone)]
pub struct MessageSender {
    outbox: Arc<Outbox>,
    label: String,
}

impl std::fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSender")
            .field("label", &self.label)
            .finish()
    }
}

impl MessageSender {
    pub fn new(outbox: Arc<Outbox>, label: impl Into<String>) -> Self {
        Self {
            outbox,
            label: label.into(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbox.is_closed()
    }

    fn push(&self, bytes: Vec<u8>) {
        self.outbox.push(OutboundFrame {
            bytes,
            critical: false,
        });
    }

    fn push_critical(&self, bytes: Vec<u8>) {
        self.outbox.push(OutboundFrame {
            bytes,
            critical: true,
        });
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub fn logged(&self, user_class: u8) {
        log::debug!("[{}] LOGGED class={user_class}", self.label);
        self.push_critical(outbound::build_logged(user_class));
    }

    pub fn user_char_index_in_server(&self, char_index: i16) {
        self.push_critical(outbound::build_user_char_index_in_server(char_index));
    }

    pub fn dice_roll(&self, strength: u8, agility: u8, intelligence: u8, charisma: u8, constitution: u8) {
        self.push(outbound::build_dice_roll(
            strength,
            agility,
            intelligence,
            charisma,
            constitution,
        ));
    }

    pub fn attributes(&self, strength: u8, agility: u8, intelligence: u8, charisma: u8, constitution: u8) {
        self.push(outbound::build_attributes(
            strength,
            agility,
            intelligence,
            charisma,
            constitution,
        ));
    }

    pub fn pong(&self) {
        self.push(outbound::build_pong());
    }

    // =========================================================================
    // Console
    // =========================================================================

    pub fn console_msg(&self, message: &str) {
        self.console_msg_color(message, FONT_COLOR_DEFAULT);
    }

    pub fn console_msg_color(&self, message: &str, font_color: u8) {
        log::debug!("[{}] CONSOLE_MSG {message:?}", self.label);
        self.push(outbound::build_console_msg(message, font_color));
    }

    pub fn multiline_console_msg(&self, message: &str) {
        for line in message.lines().filter(|l| !l.trim().is_empty()) {
            self.console_msg(line);
        }
    }

    pub fn error_msg(&self, message: &str) {
        log::info!("[{}] ERROR_MSG {message:?}", self.label);
        self.push_critical(outbound::build_error_msg(message));
    }

    pub fn multi_message(&self, index: u8, arg1: i16, arg2: i16) {
        self.push(outbound::build_multi_message(index, arg1, arg2));
    }

    // =========================================================================
    // Characters
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    pub fn character_create(
        &self,
        char_index: i32,
        body: i32,
        head: i32,
        heading: Heading,
        x: i32,
        y: i32,
        name: &str,
    ) {
        log::debug!(
            "[{}] CHARACTER_CREATE idx={char_index} name={name:?} pos=({x},{y})",
            self.label
        );
        self.push(outbound::build_character_create(
            char_index as i16,
            body as i16,
            head as i16,
            heading as u8,
            x as u8,
            y as u8,
            0,
            0,
            0,
            0,
            0,
            name,
            0,
            0,
        ));
    }

    pub fn character_change(&self, char_index: i32, body: i32, head: i32, heading: Heading) {
        self.push(outbound::build_character_change(
            char_index as i16,
            body as i16,
            head as i16,
            heading as u8,
            0,
            0,
            0,
            0,
            0,
        ));
    }

    pub fn character_move(&self, char_index: i32, x: i32, y: i32) {
        self.push(outbound::build_character_move(
            char_index as i16,
            x as u8,
            y as u8,
        ));
    }

    pub fn character_remove(&self, char_index: i32) {
        self.push_critical(outbound::build_character_remove(char_index as i16));
    }

    // =========================================================================
    // Map / world
    // =========================================================================

    pub fn change_map(&self, map_number: i32, version: i16) {
        self.push_critical(outbound::build_change_map(map_number as i16, version));
    }

    pub fn pos_update(&self, x: i32, y: i32) {
        self.push_critical(outbound::build_pos_update(x as u8, y as u8));
    }

    pub fn object_create(&self, x: i32, y: i32, grh_index: i16) {
        self.push(outbound::build_object_create(x as u8, y as u8, grh_index));
    }

    pub fn object_delete(&self, x: i32, y: i32) {
        self.push_critical(outbound::build_object_delete(x as u8, y as u8));
    }

    pub fn block_position(&self, x: i32, y: i32, blocked: bool) {
        self.push(outbound::build_block_position(x as u8, y as u8, blocked));
    }

    // =========================================================================
    // Stats
    // =========================================================================

    pub fn update_user_stats(&self, stats: &PlayerStats) {
        self.push(outbound::build_update_user_stats(
            stats.max_hp as i16,
            stats.min_hp as i16,
            stats.max_mana as i16,
            stats.min_mana as i16,
            stats.max_sta as i16,
            stats.min_sta as i16,
            stats.gold,
            stats.level as u8,
            stats.elu,
            stats.exp,
        ));
    }

    pub fn update_hp(&self, hp: i32) {
        self.push(outbound::build_update_hp(hp as i16));
    }

    pub fn update_mana(&self, mana: i32) {
        self.push(outbound::build_update_mana(mana as i16));
    }

    pub fn update_sta(&self, stamina: i32) {
        self.push(outbound::build_update_sta(stamina as i16));
    }

    pub fn update_gold(&self, gold: i32) {
        self.push(outbound::build_update_gold(gold));
    }

    pub fn update_exp(&self, experience: i32) {
        self.push(outbound::build_update_exp(experience));
    }

    pub fn update_hunger_and_thirst(&self, value: &HungerThirst) {
        self.push(outbound::build_update_hunger_and_thirst(
            value.max_water as u8,
            value.min_water as u8,
            value.max_hunger as u8,
            value.min_hunger as u8,
        ));
    }

    pub fn update_str_and_dex(&self, strength: i32, dexterity: i32) {
        self.push(outbound::build_update_str_and_dex(
            strength as u8,
            dexterity as u8,
        ));
    }

    // =========================================================================
    // FX / audio
    // =========================================================================

    pub fn create_fx(&self, char_index: i32, fx: i16, loops: i16) {
        self.push(outbound::build_create_fx(char_index as i16, fx, loops));
    }

    pub fn play_wave(&self, wave_id: u8, x: i32, y: i32) {
        self.push(outbound::build_play_wave(wave_id, x as u8, y as u8));
    }

    pub fn play_midi(&self, midi_id: u8) {
        self.push(outbound::build_play_midi(midi_id));
    }

    // =========================================================================
    // Inventory / commerce / bank / spells
    // =========================================================================

    pub fn change_inventory_slot(&self, slot: u8, item: &SlotItem) {
        self.push(outbound::build_change_inventory_slot(slot, item));
    }

    pub fn change_bank_slot(&self, slot: u8, item: &SlotItem) {
        self.push(outbound::build_change_bank_slot(slot, item));
    }

    pub fn change_npc_inventory_slot(&self, slot: u8, item: &SlotItem) {
        self.push(outbound::build_change_npc_inventory_slot(slot, item));
    }

    pub fn change_spell_slot(&self, slot: u8, spell_id: i32, name: &str) {
        self.push(outbound::build_change_spell_slot(slot, spell_id as i16, name));
    }

    pub fn commerce_init(&self, npc_id: i32, items: &[(u8, SlotItem)]) {
        self.push_critical(outbound::build_commerce_init(npc_id as i16, items));
    }

    pub fn commerce_end(&self) {
        self.push_critical(outbound::build_commerce_end());
    }

    pub fn bank_init(&self, items: &[(u8, SlotItem)]) {
        self.push_critical(outbound::build_bank_init(items));
    }

    pub fn bank_end(&self) {
        self.push_critical(outbound::build_bank_end());
    }

    pub fn meditate_toggle(&self) {
        self.push(outbound::build_meditate_toggle());
    }
}
