//! Game constants shared by the server and its tools.

// =============================================================================
// World geometry
// =============================================================================

/// Broadcast visibility range in tiles (Chebyshev distance). A player sees a
/// 31x31 grid centered on themselves.
pub const VISIBLE_RANGE: i32 = 15;

/// Tiles from a map edge that count as the transition border.
pub const EDGE_THRESHOLD: i32 = 1;

/// Default baked map dimensions.
pub const MAP_WIDTH: i32 = 100;
pub const MAP_HEIGHT: i32 = 100;

// =============================================================================
// Characters
// =============================================================================

/// First charIndex handed to NPC instances. Player charIndexes are their
/// user ids, which stay below this line.
pub const NPC_CHAR_INDEX_BASE: i32 = 10001;

/// Headings on the wire: 1=North, 2=East, 3=South, 4=West.
pub const HEADING_NORTH: u8 = 1;
pub const HEADING_EAST: u8 = 2;
pub const HEADING_SOUTH: u8 = 3;
pub const HEADING_WEST: u8 = 4;

// =============================================================================
// Tick engine
// =============================================================================

/// Scheduler iteration interval in seconds.
pub const DEFAULT_TICK_INTERVAL: f64 = 0.5;

/// Aggregated scheduler metrics are logged every this many ticks.
pub const METRICS_LOG_EVERY_TICKS: u64 = 50;

/// Mana restored per meditation recovery.
pub const MANA_RECOVERY_PER_TICK: i32 = 10;

/// HP lost per poison application (players and NPCs alike).
pub const POISON_DAMAGE_PER_TICK: i32 = 5;

/// Seconds between poison applications.
pub const POISON_TICK_INTERVAL: f64 = 2.0;

/// Default poison duration in seconds when a spell omits one.
pub const POISON_DEFAULT_DURATION: f64 = 30.0;

/// Manhattan distance past which a pet starts walking back to its owner.
pub const MAX_PET_FOLLOW_DISTANCE: i32 = 8;

/// NPC movement effect: cap of NPCs processed per firing.
pub const DEFAULT_MAX_NPCS_PER_TICK: usize = 50;

/// NPC movement effect: parallel chunk size.
pub const DEFAULT_NPC_CHUNK_SIZE: usize = 10;

/// Manhattan radius in which idle hostile NPCs notice a player.
pub const NPC_NOTICE_RANGE: i32 = 10;

/// Manhattan radius random-walking NPCs keep around their current tile.
pub const NPC_WANDER_RADIUS: i32 = 5;

// =============================================================================
// Items
// =============================================================================

/// Item id reserved for gold coins.
pub const GOLD_ITEM_ID: i32 = 12;

/// Inventory slot the client uses when dragging gold.
pub const GOLD_SLOT: u8 = 31;

/// Client graphic for a pile of gold.
pub const GOLD_GRH_INDEX: i16 = 511;

/// Unarmed weapon damage.
pub const BASE_FIST_DAMAGE: i32 = 5;

/// Damage reduction with no armor equipped.
pub const BASE_ARMOR_REDUCTION: f64 = 0.1;

/// Hard cap for armor damage reduction.
pub const MAX_ARMOR_REDUCTION: f64 = 0.5;

// =============================================================================
// Console colors (client font palette)
// =============================================================================

pub const FONT_COLOR_DEFAULT: u8 = 7;
pub const FONT_COLOR_INFO: u8 = 7;
pub const FONT_COLOR_FIGHT: u8 = 1;
pub const FONT_COLOR_WARNING: u8 = 3;
pub const FONT_COLOR_TALK: u8 = 15;

// =============================================================================
// Sounds and visual effects
// =============================================================================

pub const SOUND_SWORD_HIT: u8 = 10;
pub const SOUND_MISS: u8 = 2;
pub const SOUND_SPELL: u8 = 14;

pub const FX_BLOOD: i16 = 14;
pub const FX_CRITICAL_HIT: i16 = 15;
pub const FX_MEDITATION: i16 = 4;
pub const FX_SPAWN: i16 = 1;
pub const FX_HEAL: i16 = 5;

/// CREATE_FX loop counts: one-shot and until-cancelled.
pub const FX_LOOPS_ONCE: i16 = 1;
pub const FX_LOOPS_INFINITE: i16 = -1;
