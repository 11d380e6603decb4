//! Spell catalog and casting: cost, targeting, and the effect kinds
//! (damage, heal, poison, morph, summon, paralyze).

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;

use game_core::constants::{FX_LOOPS_ONCE, POISON_DEFAULT_DURATION};

use crate::broadcast::Broadcaster;
use crate::error::GameError;
use crate::helpers::now_secs;
use crate::messaging::MessageSender;
use crate::npc::NpcRegistry;
use crate::npc_death::NpcDeathService;
use crate::npc_engine::NpcEngine;
use crate::repository::{Heading, MorphedAppearance, NpcRepo, PlayerRepo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpellKind {
    Damage,
    Heal,
    Poison,
    Morph,
    Summon,
    Paralyze,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Spell {
    pub id: i32,
    pub name: String,
    pub kind: SpellKind,
    pub mana_cost: i32,
    #[serde(default)]
    pub min_damage: i32,
    #[serde(default)]
    pub max_damage: i32,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub fx_grh: i16,
    #[serde(default = "default_loops")]
    pub loops: i16,
    #[serde(default)]
    pub caster_msg: String,
    #[serde(default)]
    pub morph_body: i32,
    #[serde(default)]
    pub morph_head: i32,
    #[serde(default)]
    pub summon_npc_id: i32,
}

fn default_loops() -> i16 {
    FX_LOOPS_ONCE
}

#[derive(Debug, Default)]
pub struct SpellCatalog {
    spells: HashMap<i32, Spell>,
}

impl SpellCatalog {
    pub fn from_spells(spells: Vec<Spell>) -> Self {
        Self {
            spells: spells.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    pub fn get(&self, spell_id: i32) -> Option<&Spell> {
        self.spells.get(&spell_id)
    }

    pub fn exists(&self, spell_id: i32) -> bool {
        self.spells.contains_key(&spell_id)
    }

    pub fn len(&self) -> usize {
        self.spells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spells.is_empty()
    }
}

pub struct SpellEngine {
    catalog: Arc<SpellCatalog>,
    player_repo: Arc<dyn PlayerRepo>,
    npc_repo: Arc<dyn NpcRepo>,
    npc_registry: Arc<NpcRegistry>,
    broadcaster: Arc<Broadcaster>,
    npc_death: Arc<NpcDeathService>,
    npc_engine: Arc<NpcEngine>,
}

impl SpellEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<SpellCatalog>,
        player_repo: Arc<dyn PlayerRepo>,
        npc_repo: Arc<dyn NpcRepo>,
        npc_registry: Arc<NpcRegistry>,
        broadcaster: Arc<Broadcaster>,
        npc_death: Arc<NpcDeathService>,
        npc_engine: Arc<NpcEngine>,
    ) -> Self {
        Self {
            catalog,
            player_repo,
            npc_repo,
            npc_registry,
            broadcaster,
            npc_death,
            npc_engine,
        }
    }

    /// Casts `spell_id` at `(target_x, target_y)` on the caster's map.
    /// Mana is deducted only once every precondition holds.
    pub async fn cast(
        &self,
        user_id: i32,
        spell_id: i32,
        target_x: i32,
        target_y: i32,
        sender: &MessageSender,
    ) -> Result<bool, GameError> {
        let Some(spell) = self.catalog.get(spell_id) else {
            log::warn!("spell {spell_id} does not exist");
            sender.console_msg("Ese hechizo no existe.");
            return Ok(false);
        };

        let Some(mut stats) = self.player_repo.get_stats(user_id).await? else {
            log::warn!("no stats for caster {user_id}");
            return Ok(false);
        };
        if stats.min_mana < spell.mana_cost {
            sender.console_msg("No tienes suficiente mana.");
            return Ok(false);
        }

        let Some(position) = self.player_repo.get_position(user_id).await? else {
            return Ok(false);
        };

        let target_npc = self.npc_registry.find_at(position.map, target_x, target_y);
        let self_targeted = position.x == target_x && position.y == target_y;

        // Target compatibility per effect kind.
        enum CastTarget {
            Npc(crate::npc::Npc),
            Caster,
            OpenTile,
        }
        let target = match spell.kind {
            SpellKind::Damage | SpellKind::Poison | SpellKind::Paralyze => match target_npc {
                Some(npc) => CastTarget::Npc(npc),
                None => {
                    sender.console_msg("No hay objetivo válido en esa posición.");
                    return Ok(false);
                }
            },
            SpellKind::Heal | SpellKind::Morph => {
                if !self_targeted {
                    sender.console_msg("No hay objetivo válido en esa posición.");
                    return Ok(false);
                }
                CastTarget::Caster
            }
            SpellKind::Summon => {
                if target_npc.is_some() {
                    sender.console_msg("No hay objetivo válido en esa posición.");
                    return Ok(false);
                }
                CastTarget::OpenTile
            }
        };
        let fx_anchor = match &target {
            CastTarget::Npc(npc) => npc.char_index,
            _ => user_id,
        };

        stats.min_mana -= spell.mana_cost;
        self.player_repo.set_stats(user_id, &stats).await?;

        match (spell.kind, target) {
            (SpellKind::Damage, CastTarget::Npc(npc)) => {
                let base = if spell.max_damage > spell.min_damage {
                    rand::thread_rng().gen_range(spell.min_damage..=spell.max_damage)
                } else {
                    spell.min_damage
                };
                let intelligence = self
                    .player_repo
                    .get_attributes(user_id)
                    .await?
                    .unwrap_or_default()
                    .intelligence;
                let total = base + (base * intelligence) / 100;

                let new_hp = (npc.hp - total).max(0);
                self.npc_registry
                    .with_npc_mut(npc.instance_id, |n| n.hp = new_hp);

                sender.console_msg(&format!(
                    "{}{}. Daño: {total}",
                    spell.caster_msg, npc.name
                ));
                log::info!(
                    "user {user_id} cast {} on {} for {total} ({new_hp}/{} hp left)",
                    spell.name,
                    npc.name,
                    npc.max_hp
                );

                if new_hp == 0 {
                    sender.console_msg(&format!("Has matado a {}!", npc.name));
                    self.npc_death.handle_death(&npc, Some(user_id)).await?;
                } else {
                    self.npc_repo.update_npc_hp(npc.instance_id, new_hp).await?;
                }
            }
            (SpellKind::Heal, CastTarget::Caster) => {
                let amount = if spell.max_damage > spell.min_damage {
                    rand::thread_rng().gen_range(spell.min_damage..=spell.max_damage)
                } else {
                    spell.min_damage
                };
                let healed = (stats.min_hp + amount).min(stats.max_hp);
                self.player_repo.update_hp(user_id, healed).await?;
                sender.console_msg(&format!("{}te has curado {amount} puntos.", spell.caster_msg));
            }
            (SpellKind::Poison, CastTarget::Npc(npc)) => {
                let duration = if spell.duration > 0.0 {
                    spell.duration
                } else {
                    POISON_DEFAULT_DURATION
                };
                let until = now_secs() + duration;
                self.npc_registry.with_npc_mut(npc.instance_id, |n| {
                    n.poisoned_until = until;
                    n.poisoned_by_user_id = user_id;
                });
                self.npc_repo
                    .update_npc_poisoned_until(npc.instance_id, until, user_id)
                    .await?;
                sender.console_msg(&format!("{}{} queda envenenado.", spell.caster_msg, npc.name));
            }
            (SpellKind::Paralyze, CastTarget::Npc(npc)) => {
                let until = now_secs() + spell.duration.max(1.0);
                // Paralysis is a transient field: the registry is its
                // source of truth.
                self.npc_registry
                    .with_npc_mut(npc.instance_id, |n| n.paralyzed_until = until);
                sender.console_msg(&format!(
                    "{}{} queda paralizado.",
                    spell.caster_msg, npc.name
                ));
            }
            (SpellKind::Morph, CastTarget::Caster) => {
                let until = now_secs() + spell.duration.max(1.0);
                let appearance = MorphedAppearance {
                    body: spell.morph_body.max(1),
                    head: spell.morph_head,
                    until,
                };
                self.player_repo
                    .set_morphed_appearance(user_id, &appearance)
                    .await?;
                self.broadcaster.broadcast_character_change(
                    position.map,
                    user_id,
                    appearance.body,
                    appearance.head,
                    position.heading,
                    None,
                );
                sender.console_msg("Tu cuerpo se transforma.");
            }
            (SpellKind::Summon, CastTarget::OpenTile) => {
                let until = now_secs() + spell.duration.max(1.0);
                match self
                    .npc_engine
                    .spawn_npc(
                        spell.summon_npc_id,
                        position.map,
                        target_x,
                        target_y,
                        Heading::South,
                    )
                    .await?
                {
                    Some(pet) => {
                        self.npc_registry.with_npc_mut(pet.instance_id, |n| {
                            n.summoned_by_user_id = user_id;
                            n.summoned_until = until;
                        });
                        sender.console_msg(&format!("Has invocado a {}.", pet.name));
                    }
                    None => {
                        sender.console_msg("La invocación falla.");
                    }
                }
            }
            _ => {}
        }

        // Visual feedback anchored on the affected character.
        if spell.fx_grh > 0 {
            self.broadcaster
                .broadcast_create_fx(position.map, fx_anchor, spell.fx_grh, spell.loops);
        }

        // Caster sees the mana cost (and any self-heal) immediately.
        if let Some(updated) = self.player_repo.get_stats(user_id).await? {
            sender.update_user_stats(&updated);
        }

        Ok(true)
    }
}
