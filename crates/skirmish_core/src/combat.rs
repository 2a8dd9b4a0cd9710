//! Target acquisition, attack cooldowns, damage and death.
//!
//! Combat runs once per tick after physics. Every attacker picks the
//! nearest hostile inside its detection range and, when the target is in
//! attack range and the cooldown has elapsed, fires. Firing produces either
//! a [`DamageIntent`] (melee) or a [`ProjectileSpawn`] (ranged). Intents are
//! resolved after all attackers ran, so attack order within a tick never
//! changes who gets to fire.
//!
//! Ties in target distance go to the lowest entity ID.

use serde::{Deserialize, Serialize};

use crate::components::{AttackKind, ComponentKind, EntityId, ImpactEffect, Team};
use crate::math::{fixed_serde, Fixed, Vec3Fixed};
use crate::registry::Registry;

/// What a damage intent hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageTarget {
    /// A single entity.
    Entity(EntityId),
    /// Every hostile damageable entity within `radius` of `center`.
    Area {
        /// Centre of the blast.
        center: Vec3Fixed,
        /// Blast radius.
        #[serde(with = "fixed_serde")]
        radius: Fixed,
    },
}

/// Damage that should be applied this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageIntent {
    /// Attacking entity.
    pub source: EntityId,
    /// Entity or area hit.
    pub target: DamageTarget,
    /// Damage amount.
    pub amount: u32,
    /// Attacker's team; area damage only affects its enemies.
    pub team: Team,
}

/// A projectile that should be launched this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileSpawn {
    /// Firing entity.
    pub source: EntityId,
    /// Homing target.
    pub target: EntityId,
    /// Launch point (entity position plus attack offset).
    pub origin: Vec3Fixed,
    /// World units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Damage on impact.
    pub damage: u32,
    /// Splash radius on impact.
    #[serde(with = "fixed_serde")]
    pub splash_radius: Fixed,
    /// Firing team.
    pub team: Team,
}

/// Output of one combat pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombatOutput {
    /// Melee hits.
    pub damage: Vec<DamageIntent>,
    /// Ranged launches.
    pub projectiles: Vec<ProjectileSpawn>,
}

/// Damage actually dealt to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Attacking entity.
    pub source: EntityId,
    /// Damaged entity.
    pub target: EntityId,
    /// Health removed.
    pub amount: u32,
    /// Whether this hit brought health to zero.
    pub lethal: bool,
    /// Effect the presentation layer should play.
    pub effect: Option<ImpactEffect>,
}

/// How a killed entity leaves the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathEvent {
    /// Entered its death sequence; removal follows after `ticks`.
    Dying {
        /// Killed entity.
        entity: EntityId,
        /// Ticks until removal.
        ticks: u32,
    },
    /// Flagged for removal at the end of this tick.
    Destroyed {
        /// Removed entity.
        entity: EntityId,
    },
}

/// Run target acquisition and attacks for every armed entity.
pub fn run_combat(registry: &mut Registry, tick_dt: Fixed) -> CombatOutput {
    let mut output = CombatOutput::default();
    let attackers = registry.query_all(&[
        ComponentKind::Attack,
        ComponentKind::Team,
        ComponentKind::Health,
    ]);
    let candidates = registry.query_all(&[ComponentKind::Team, ComponentKind::Health]);

    for id in attackers {
        let Some(entity) = registry.get(id).filter(|e| e.is_interactive()) else {
            continue;
        };
        let (Some(team), Some(&attack)) = (entity.team(), entity.attack()) else {
            continue;
        };
        let position = entity.position;
        let target = nearest_hostile(
            registry,
            &candidates,
            id,
            team,
            position,
            attack.detection_range,
        );

        let Some(attack) = registry.get_mut(id).and_then(|e| e.attack_mut()) else {
            continue;
        };
        attack.tick_cooldown(tick_dt);
        attack.target = target.map(|(target_id, _)| target_id);

        let Some((target_id, distance_sq)) = target else {
            continue;
        };
        if distance_sq > attack.range * attack.range || !attack.is_ready() {
            continue;
        }
        attack.reset_cooldown();
        let fired = *attack;

        match fired.kind {
            AttackKind::Melee => {
                let target = if fired.splash_radius > Fixed::ZERO {
                    let center = registry
                        .get(target_id)
                        .map_or(position, |target| target.position);
                    DamageTarget::Area {
                        center,
                        radius: fired.splash_radius,
                    }
                } else {
                    DamageTarget::Entity(target_id)
                };
                output.damage.push(DamageIntent {
                    source: id,
                    target,
                    amount: fired.damage,
                    team,
                });
            }
            AttackKind::Ranged => output.projectiles.push(ProjectileSpawn {
                source: id,
                target: target_id,
                origin: position + fired.origin_offset,
                speed: fired.projectile_speed,
                damage: fired.damage,
                splash_radius: fired.splash_radius,
                team,
            }),
        }
    }

    output
}

/// Nearest interactive hostile within `range`, with its squared distance.
fn nearest_hostile(
    registry: &Registry,
    candidates: &[EntityId],
    attacker: EntityId,
    team: Team,
    position: Vec3Fixed,
    range: Fixed,
) -> Option<(EntityId, Fixed)> {
    let range_sq = range * range;
    let mut best: Option<(EntityId, Fixed)> = None;

    for &candidate in candidates {
        if candidate == attacker {
            continue;
        }
        let Some(other) = registry.get(candidate).filter(|e| e.is_interactive()) else {
            continue;
        };
        if !other.team().is_some_and(|t| team.is_hostile_to(t)) {
            continue;
        }
        let distance_sq = position.planar_distance_squared(other.position);
        if distance_sq > range_sq {
            continue;
        }
        // Strictly closer only: candidates are in ID order.
        if best.map_or(true, |(_, best_sq)| distance_sq < best_sq) {
            best = Some((candidate, distance_sq));
        }
    }

    best
}

/// Apply damage intents in order and report what was dealt.
pub fn resolve_damage(registry: &mut Registry, intents: &[DamageIntent]) -> Vec<DamageEvent> {
    let mut events = Vec::new();

    for intent in intents {
        match intent.target {
            DamageTarget::Entity(target) => {
                if let Some(event) = damage_entity(registry, intent.source, target, intent.amount) {
                    events.push(event);
                }
            }
            DamageTarget::Area { center, radius } => {
                let radius_sq = radius * radius;
                let victims: Vec<EntityId> = registry
                    .query_all(&[ComponentKind::Team, ComponentKind::Health])
                    .into_iter()
                    .filter(|&id| {
                        registry.get(id).is_some_and(|e| {
                            e.is_interactive()
                                && e.team().is_some_and(|t| intent.team.is_hostile_to(t))
                                && e.position.planar_distance_squared(center) <= radius_sq
                        })
                    })
                    .collect();
                for victim in victims {
                    if let Some(event) =
                        damage_entity(registry, intent.source, victim, intent.amount)
                    {
                        events.push(event);
                    }
                }
            }
        }
    }

    events
}

fn damage_entity(
    registry: &mut Registry,
    source: EntityId,
    target: EntityId,
    amount: u32,
) -> Option<DamageEvent> {
    let entity = registry.get_mut(target).filter(|e| e.is_interactive())?;
    let effect = entity.capabilities.impact_effect;
    let health = entity.health_mut()?;
    let dealt = health.apply_damage(amount);
    Some(DamageEvent {
        source,
        target,
        amount: dealt,
        lethal: health.destroyed,
        effect,
    })
}

/// Count down running death sequences; returns entities now flagged for removal.
pub fn advance_death_sequences(registry: &mut Registry) -> Vec<EntityId> {
    let mut finished = Vec::new();
    for id in registry.live_ids() {
        let Some(entity) = registry.get_mut(id) else {
            continue;
        };
        let Some(remaining) = entity.dying else {
            continue;
        };
        if remaining <= 1 {
            finished.push(id);
        } else {
            entity.dying = Some(remaining - 1);
        }
    }
    for &id in &finished {
        registry.destroy(id);
    }
    finished
}

/// Start death handling for entities killed this tick.
///
/// Entities with a death sequence stop moving, drop out of physics and
/// targeting, and linger; everything else is flagged for removal at once.
pub fn begin_deaths(registry: &mut Registry, killed: &[EntityId]) -> Vec<DeathEvent> {
    let mut events = Vec::new();
    for &id in killed {
        let Some(entity) = registry.get_mut(id).filter(|e| e.is_live() && e.dying.is_none())
        else {
            continue;
        };
        match entity.capabilities.death_sequence {
            Some(sequence) if sequence.ticks > 0 => {
                entity.ignore_physics = true;
                entity.dying = Some(sequence.ticks);
                if let Some(movement) = entity.movement_mut() {
                    movement.moving = false;
                    movement.target = None;
                }
                if let Some(attack) = entity.attack_mut() {
                    attack.target = None;
                }
                events.push(DeathEvent::Dying {
                    entity: id,
                    ticks: sequence.ticks,
                });
            }
            _ => {
                registry.destroy(id);
                events.push(DeathEvent::Destroyed { entity: id });
            }
        }
    }
    events
}
