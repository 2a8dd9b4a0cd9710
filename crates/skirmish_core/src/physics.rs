//! Fixed-timestep physics and collision engine.
//!
//! Units are circles on the ground plane. One network tick is split into
//! `substeps` fixed substeps; each substep runs, in order:
//!
//! 1. **Velocity derivation** from movement intent
//! 2. **Grid rebuild** for broad-phase culling
//! 3. **Collision resolution** (positional correction + impulse)
//! 4. **Integration** of positions with a speed clamp
//! 5. **Friction** for bodies without a move target
//!
//! Every step walks bodies in entity-ID order. Positions live on the
//! registry entities; the engine owns velocities, radii and masses.
//!
//! Collision resolution is a single ordered pass per substep. An isolated
//! pair separates fully, but in a crowd a later correction can push a body
//! back into one resolved earlier, so some overlap may remain after a tick.
//! It shrinks with every substep.
//!
//! # Determinism
//!
//! - All math is fixed-point ([`Fixed`])
//! - Substep duration is a configuration constant, never wall-clock time
//! - Bodies and grid candidates are visited in sorted ID order
//! - Each unordered pair is resolved at most once per substep

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::config::PhysicsConfig;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::registry::{Entity, Registry};
use crate::spatial::SpatialGrid;

/// Collision body of a physics-registered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicsBody {
    /// Planar velocity in world units per second (x → X, y → Z).
    pub velocity: Vec2Fixed,
    /// Collider radius.
    #[serde(with = "fixed_serde")]
    pub radius: Fixed,
    /// Mass; heavier bodies are pushed less.
    #[serde(with = "fixed_serde")]
    pub mass: Fixed,
    /// Static bodies never move.
    pub is_static: bool,
}

/// What happened during one [`PhysicsEngine::simulate_tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicsReport {
    /// Entities that reached their move target, in the order detected.
    pub arrivals: Vec<EntityId>,
    /// Pairs whose overlap was resolved, `(lower id, higher id)`.
    pub contacts: Vec<(EntityId, EntityId)>,
}

/// The physics world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsEngine {
    config: PhysicsConfig,
    #[serde(with = "fixed_serde")]
    substep_dt: Fixed,
    bodies: HashMap<EntityId, PhysicsBody>,
    #[serde(with = "fixed_serde")]
    max_radius: Fixed,
    #[serde(skip)]
    grid: SpatialGrid,
}

impl PhysicsEngine {
    /// Create an engine advancing `substep_dt` seconds per substep.
    #[must_use]
    pub fn new(config: PhysicsConfig, substep_dt: Fixed) -> Self {
        let grid = SpatialGrid::new(config.cell_size);
        Self {
            config,
            substep_dt,
            bodies: HashMap::new(),
            max_radius: Fixed::ZERO,
            grid,
        }
    }

    /// Physics constants in use.
    #[must_use]
    pub const fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Seconds advanced per substep.
    #[must_use]
    pub const fn substep_dt(&self) -> Fixed {
        self.substep_dt
    }

    /// Register (or replace) the body of an entity.
    ///
    /// Non-positive masses are treated as 1.
    pub fn register_body(&mut self, id: EntityId, radius: Fixed, mass: Fixed, is_static: bool) {
        let radius = radius.max(Fixed::ZERO);
        let mass = if mass > Fixed::ZERO { mass } else { Fixed::ONE };
        self.max_radius = self.max_radius.max(radius);
        self.bodies.insert(
            id,
            PhysicsBody {
                velocity: Vec2Fixed::ZERO,
                radius,
                mass,
                is_static,
            },
        );
    }

    /// Remove an entity's body. A no-op for unknown IDs.
    pub fn unregister_body(&mut self, id: EntityId) -> Option<PhysicsBody> {
        self.bodies.remove(&id)
    }

    /// Body of an entity.
    #[must_use]
    pub fn body(&self, id: EntityId) -> Option<&PhysicsBody> {
        self.bodies.get(&id)
    }

    /// Whether the entity has a body.
    #[must_use]
    pub fn has_body(&self, id: EntityId) -> bool {
        self.bodies.contains_key(&id)
    }

    /// Number of registered bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Registered body IDs in ascending order.
    #[must_use]
    pub fn sorted_body_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.bodies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Advance the world by exactly one network tick.
    pub fn simulate_tick(&mut self, registry: &mut Registry) -> PhysicsReport {
        let mut report = PhysicsReport::default();
        for _ in 0..self.config.substeps {
            self.substep(registry, &mut report);
        }
        report
    }

    /// Run a single fixed substep.
    pub fn substep(&mut self, registry: &mut Registry, report: &mut PhysicsReport) {
        let ids = self.sorted_body_ids();
        self.derive_velocities(&ids, registry, report);
        self.rebuild_grid(&ids, registry);
        self.resolve_collisions(&ids, registry, report);
        self.integrate(&ids, registry);
        self.apply_friction(&ids, registry);
    }

    /// Turn movement intent into velocity, detecting arrival.
    fn derive_velocities(
        &mut self,
        ids: &[EntityId],
        registry: &mut Registry,
        report: &mut PhysicsReport,
    ) {
        let threshold_sq = self.config.arrival_threshold * self.config.arrival_threshold;

        for &id in ids {
            let Some(body) = self.bodies.get_mut(&id) else {
                continue;
            };
            let Some(entity) = registry.get_mut(id).filter(|e| e.is_live()) else {
                continue;
            };
            if body.is_static {
                body.velocity = Vec2Fixed::ZERO;
                continue;
            }
            if entity.ignore_physics {
                body.velocity = Vec2Fixed::ZERO;
                continue;
            }

            let position = entity.position.planar();
            let Some(movement) = entity.movement_mut() else {
                continue;
            };
            let Some(target) = movement.target.filter(|_| movement.moving) else {
                continue;
            };

            let to_target = target.planar() - position;
            if to_target.length_squared() <= threshold_sq {
                movement.moving = false;
                movement.target = None;
                movement.just_arrived = true;
                body.velocity = Vec2Fixed::ZERO;
                report.arrivals.push(id);
            } else {
                body.velocity = to_target.normalize().scale(movement.speed);
            }
        }
    }

    fn rebuild_grid(&mut self, ids: &[EntityId], registry: &Registry) {
        if self.grid.cell_size() != self.config.cell_size {
            self.grid = SpatialGrid::new(self.config.cell_size);
        }
        self.grid.clear();
        for &id in ids {
            let (Some(body), Some(entity)) = (self.bodies.get(&id), registry.get(id)) else {
                continue;
            };
            self.grid
                .insert(id, entity.position.x, entity.position.z, body.radius);
        }
    }

    fn resolve_collisions(
        &mut self,
        ids: &[EntityId],
        registry: &mut Registry,
        report: &mut PhysicsReport,
    ) {
        let mut checked: HashSet<(EntityId, EntityId)> = HashSet::new();

        for &a in ids {
            let Some(entity_a) = collidable(registry, a) else {
                continue;
            };
            let Some(&body_a) = self.bodies.get(&a) else {
                continue;
            };
            let pos_a = entity_a.position.planar();
            let candidates = self
                .grid
                .query(pos_a.x, pos_a.y, body_a.radius + self.max_radius);

            for b in candidates {
                if b <= a || !checked.insert((a, b)) {
                    continue;
                }
                if self.resolve_pair(a, b, registry) {
                    report.contacts.push((a, b));
                }
            }
        }
    }

    /// Separate one overlapping pair. Returns whether a correction happened.
    fn resolve_pair(&mut self, a: EntityId, b: EntityId, registry: &mut Registry) -> bool {
        let (Some(entity_a), Some(entity_b)) = (collidable(registry, a), collidable(registry, b))
        else {
            return false;
        };
        let (Some(&body_a), Some(&body_b)) = (self.bodies.get(&a), self.bodies.get(&b)) else {
            return false;
        };

        if body_a.is_static && body_b.is_static {
            return false;
        }
        // Units pass through their own team's structures.
        let same_team =
            matches!((entity_a.team(), entity_b.team()), (Some(ta), Some(tb)) if ta == tb);
        if same_team && (body_a.is_static || body_b.is_static) {
            return false;
        }

        let pos_a = entity_a.position.planar();
        let pos_b = entity_b.position.planar();
        let delta = pos_b - pos_a;
        let radii = body_a.radius + body_b.radius;
        let dist_sq = delta.length_squared();
        if dist_sq >= radii * radii {
            return false;
        }

        let dist = delta.length();
        let normal = if dist == Fixed::ZERO {
            // Coincident centres: push apart along +X.
            Vec2Fixed::new(Fixed::ONE, Fixed::ZERO)
        } else {
            Vec2Fixed::new(delta.x / dist, delta.y / dist)
        };
        let penetration = radii - dist;

        // Each body moves in proportion to the other body's mass.
        let (share_a, share_b) = if body_a.is_static {
            (Fixed::ZERO, Fixed::ONE)
        } else if body_b.is_static {
            (Fixed::ONE, Fixed::ZERO)
        } else {
            let total = body_a.mass + body_b.mass;
            (body_b.mass / total, body_a.mass / total)
        };

        let correction = normal.scale(penetration);
        let new_a = pos_a - correction.scale(share_a);
        let new_b = pos_b + correction.scale(share_b);

        // Impulse only when the bodies are closing on each other.
        let closing = (body_b.velocity - body_a.velocity).dot(normal);
        let (mut vel_a, mut vel_b) = (body_a.velocity, body_b.velocity);
        if closing < Fixed::ZERO {
            let impulse = normal.scale(closing * (Fixed::ONE + self.config.restitution));
            vel_a = vel_a + impulse.scale(share_a);
            vel_b = vel_b - impulse.scale(share_b);
        }

        if !body_a.is_static {
            if let Some(entity) = registry.get_mut(a) {
                entity.position = entity.position.with_planar(new_a);
            }
            if let Some(body) = self.bodies.get_mut(&a) {
                body.velocity = vel_a;
            }
        }
        if !body_b.is_static {
            if let Some(entity) = registry.get_mut(b) {
                entity.position = entity.position.with_planar(new_b);
            }
            if let Some(body) = self.bodies.get_mut(&b) {
                body.velocity = vel_b;
            }
        }
        true
    }

    fn integrate(&mut self, ids: &[EntityId], registry: &mut Registry) {
        for &id in ids {
            let Some(body) = self.bodies.get_mut(&id) else {
                continue;
            };
            if body.is_static {
                body.velocity = Vec2Fixed::ZERO;
                continue;
            }
            let Some(entity) = registry.get_mut(id).filter(|e| e.is_live()) else {
                continue;
            };
            if entity.ignore_physics {
                continue;
            }

            body.velocity = body.velocity.clamp_length(self.config.max_speed);
            let step = body.velocity.scale(self.substep_dt);
            entity.position = entity
                .position
                .with_planar(entity.position.planar() + step);
        }
    }

    fn apply_friction(&mut self, ids: &[EntityId], registry: &Registry) {
        let stop_sq = self.config.stop_threshold * self.config.stop_threshold;

        for &id in ids {
            let Some(body) = self.bodies.get_mut(&id) else {
                continue;
            };
            let Some(entity) = registry.get(id) else {
                continue;
            };
            let steering = entity
                .movement()
                .is_some_and(|movement| movement.has_active_target());
            if body.is_static || steering {
                continue;
            }

            body.velocity = body.velocity.scale(self.config.friction);
            if body.velocity.length_squared() < stop_sq {
                body.velocity = Vec2Fixed::ZERO;
            }
        }
    }
}

/// The entity if it can take part in collisions.
fn collidable(registry: &Registry, id: EntityId) -> Option<&Entity> {
    registry
        .get(id)
        .filter(|entity| entity.is_live() && !entity.ignore_physics)
}
