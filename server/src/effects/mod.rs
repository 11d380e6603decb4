//! Concrete tick effects. Each module holds one effect and its tests;
//! registration order lives in the composition root.

pub mod attribute_modifiers;
pub mod gold_decay;
pub mod hunger_thirst;
pub mod meditation;
pub mod morph_expiry;
pub mod npc_ai_effect;
pub mod npc_movement;
pub mod npc_poison;
pub mod pet_follow;
pub mod poison;
pub mod stamina_regen;
pub mod summon_expiry;

pub use attribute_modifiers::AttributeModifiersEffect;
pub use gold_decay::GoldDecayEffect;
pub use hunger_thirst::HungerThirstEffect;
pub use meditation::MeditationEffect;
pub use morph_expiry::MorphExpiryEffect;
pub use npc_ai_effect::NpcAiEffect;
pub use npc_movement::NpcMovementEffect;
pub use npc_poison::NpcPoisonEffect;
pub use pet_follow::PetFollowEffect;
pub use poison::PoisonEffect;
pub use stamina_regen::StaminaRegenEffect;
pub use summon_expiry::SummonExpiryEffect;
