//! Packet ids for both directions plus the curated minimum-length table
//! the router enforces before parsing a body.

/// Packets the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientPacketId {
    ThrowDices = 1,
    Login = 2,
    DoubleClick = 3,
    CreateAccount = 4,
    Talk = 5,
    Walk = 6,
    Drop = 15,
    CommerceEnd = 17,
    EquipItem = 19,
    BankEnd = 21,
    Ping = 22,
    Ayuda = 23,
    LeftClick = 26,
    Uptime = 27,
    Online = 28,
    Quit = 29,
    Meditate = 30,
    PickUp = 32,
    Attack = 34,
    ChangeHeading = 37,
    CastSpell = 39,
}

impl ClientPacketId {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::ThrowDices),
            2 => Some(Self::Login),
            3 => Some(Self::DoubleClick),
            4 => Some(Self::CreateAccount),
            5 => Some(Self::Talk),
            6 => Some(Self::Walk),
            15 => Some(Self::Drop),
            17 => Some(Self::CommerceEnd),
            19 => Some(Self::EquipItem),
            21 => Some(Self::BankEnd),
            22 => Some(Self::Ping),
            23 => Some(Self::Ayuda),
            26 => Some(Self::LeftClick),
            27 => Some(Self::Uptime),
            28 => Some(Self::Online),
            29 => Some(Self::Quit),
            30 => Some(Self::Meditate),
            32 => Some(Self::PickUp),
            34 => Some(Self::Attack),
            37 => Some(Self::ChangeHeading),
            39 => Some(Self::CastSpell),
            _ => None,
        }
    }

    /// Packets a client may send before login completes.
    pub fn allowed_unauthenticated(self) -> bool {
        matches!(
            self,
            Self::ThrowDices | Self::Login | Self::CreateAccount | Self::Ping
        )
    }
}

/// Packets the server sends. Numbering follows the classic Argentum
/// client table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerPacketId {
    Logged = 0,
    CommerceEnd = 5,
    BankEnd = 6,
    CommerceInit = 7,
    BankInit = 8,
    UpdateSta = 15,
    UpdateMana = 16,
    UpdateHp = 17,
    UpdateGold = 18,
    UpdateExp = 20,
    ChangeMap = 21,
    PosUpdate = 22,
    ConsoleMsg = 24,
    UserCharIndexInServer = 28,
    CharacterCreate = 29,
    CharacterRemove = 30,
    CharacterMove = 32,
    CharacterChange = 34,
    ObjectCreate = 35,
    ObjectDelete = 36,
    BlockPosition = 37,
    PlayMidi = 38,
    PlayWave = 39,
    CreateFx = 44,
    UpdateUserStats = 45,
    ChangeInventorySlot = 47,
    ChangeBankSlot = 48,
    ChangeSpellSlot = 49,
    Attributes = 50,
    ErrorMsg = 55,
    ChangeNpcInventorySlot = 59,
    UpdateHungerAndThirst = 60,
    DiceRoll = 67,
    MeditateToggle = 68,
    Pong = 85,
    UpdateStrAndDex = 86,
    MultiMessage = 104,
}

/// Minimum total frame length (packet id included) per client packet id.
/// A frame shorter than this is discarded without touching a handler.
pub fn min_packet_length(packet_id: u8) -> usize {
    match ClientPacketId::from_u8(packet_id) {
        Some(ClientPacketId::ThrowDices) => 1,
        Some(ClientPacketId::Login) => 3,
        Some(ClientPacketId::DoubleClick) => 2,
        Some(ClientPacketId::CreateAccount) => 3,
        Some(ClientPacketId::Talk) => 3,
        Some(ClientPacketId::Walk) => 2,
        Some(ClientPacketId::Drop) => 5,
        Some(ClientPacketId::CommerceEnd) => 1,
        Some(ClientPacketId::EquipItem) => 2,
        Some(ClientPacketId::BankEnd) => 1,
        Some(ClientPacketId::Ping) => 1,
        Some(ClientPacketId::Ayuda) => 1,
        Some(ClientPacketId::LeftClick) => 3,
        Some(ClientPacketId::Uptime) => 1,
        Some(ClientPacketId::Online) => 1,
        Some(ClientPacketId::Quit) => 1,
        Some(ClientPacketId::Meditate) => 1,
        Some(ClientPacketId::PickUp) => 1,
        Some(ClientPacketId::Attack) => 1,
        Some(ClientPacketId::ChangeHeading) => 2,
        Some(ClientPacketId::CastSpell) => 7,
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curated_minimums() {
        assert_eq!(min_packet_length(6), 2); // WALK
        assert_eq!(min_packet_length(2), 3); // LOGIN
        assert_eq!(min_packet_length(39), 7); // CAST_SPELL
        assert_eq!(min_packet_length(15), 5); // DROP
        assert_eq!(min_packet_length(22), 1); // PING
        assert_eq!(min_packet_length(26), 3); // LEFT_CLICK
    }

    #[test]
    fn unknown_ids_default_to_one() {
        assert_eq!(min_packet_length(200), 1);
        assert!(ClientPacketId::from_u8(200).is_none());
    }

    #[test]
    fn round_trip_ids() {
        for id in [1u8, 2, 3, 4, 5, 6, 15, 17, 19, 21, 22, 23, 26, 27, 28, 29, 30, 32, 34, 37, 39]
        {
            let parsed = ClientPacketId::from_u8(id).unwrap();
            assert_eq!(parsed as u8, id);
        }
    }

    #[test]
    fn pre_login_allowance() {
        assert!(ClientPacketId::Login.allowed_unauthenticated());
        assert!(ClientPacketId::ThrowDices.allowed_unauthenticated());
        assert!(ClientPacketId::Ping.allowed_unauthenticated());
        assert!(!ClientPacketId::Walk.allowed_unauthenticated());
        assert!(!ClientPacketId::Attack.allowed_unauthenticated());
    }
}
