//! Homing projectiles fired by ranged attacks.
//!
//! Projectiles chase their target's current position at a fixed speed and
//! hit once the remaining distance fits in one tick of travel. A projectile
//! whose target died or was removed fizzles without damage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::{DamageIntent, DamageTarget, ProjectileSpawn};
use crate::components::{EntityId, Team};
use crate::math::{fixed_serde, Fixed, Vec3Fixed};
use crate::registry::Registry;

/// Projectile identifier, independent from entity IDs.
pub type ProjectileId = u64;

/// A projectile in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Firing entity.
    pub source: EntityId,
    /// Homing target.
    pub target: EntityId,
    /// Current position.
    pub position: Vec3Fixed,
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

/// Projectile lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileEvent {
    /// Launched this tick.
    Launched {
        /// New projectile.
        projectile: ProjectileId,
        /// Firing entity.
        source: EntityId,
        /// Homing target.
        target: EntityId,
    },
    /// Reached its target.
    Hit {
        /// Impacting projectile.
        projectile: ProjectileId,
        /// Entity hit.
        target: EntityId,
        /// Impact point.
        position: Vec3Fixed,
    },
    /// Lost its target.
    Fizzled {
        /// Discarded projectile.
        projectile: ProjectileId,
    },
}

/// All projectiles in flight.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectileSystem {
    projectiles: BTreeMap<ProjectileId, Projectile>,
    next_id: ProjectileId,
}

impl ProjectileSystem {
    /// Create an empty system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of projectiles in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    /// Whether nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    /// Projectiles in flight, in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&ProjectileId, &Projectile)> {
        self.projectiles.iter()
    }

    /// Put a projectile in flight.
    pub fn launch(&mut self, spawn: &ProjectileSpawn) -> ProjectileEvent {
        self.next_id += 1;
        let id = self.next_id;
        self.projectiles.insert(
            id,
            Projectile {
                source: spawn.source,
                target: spawn.target,
                position: spawn.origin,
                speed: spawn.speed,
                damage: spawn.damage,
                splash_radius: spawn.splash_radius,
                team: spawn.team,
            },
        );
        ProjectileEvent::Launched {
            projectile: id,
            source: spawn.source,
            target: spawn.target,
        }
    }

    /// Move every projectile one tick; returns impact damage and events.
    pub fn advance(
        &mut self,
        registry: &Registry,
        tick_dt: Fixed,
    ) -> (Vec<DamageIntent>, Vec<ProjectileEvent>) {
        let mut damage = Vec::new();
        let mut events = Vec::new();
        let mut finished = Vec::new();

        for (&id, projectile) in &mut self.projectiles {
            let Some(target) = registry
                .get(projectile.target)
                .filter(|e| e.is_interactive())
            else {
                finished.push(id);
                events.push(ProjectileEvent::Fizzled { projectile: id });
                continue;
            };

            let step = projectile.speed * tick_dt;
            let to_target = target.position.planar() - projectile.position.planar();
            let distance = to_target.length();

            if distance <= step {
                projectile.position = target.position;
                finished.push(id);
                let hit = if projectile.splash_radius > Fixed::ZERO {
                    DamageTarget::Area {
                        center: target.position,
                        radius: projectile.splash_radius,
                    }
                } else {
                    DamageTarget::Entity(projectile.target)
                };
                damage.push(DamageIntent {
                    source: projectile.source,
                    target: hit,
                    amount: projectile.damage,
                    team: projectile.team,
                });
                events.push(ProjectileEvent::Hit {
                    projectile: id,
                    target: projectile.target,
                    position: target.position,
                });
                continue;
            }

            let climb = (target.position.y - projectile.position.y) * step / distance;
            let planar = projectile.position.planar() + to_target.normalize().scale(step);
            projectile.position = projectile.position.with_planar(planar);
            projectile.position.y += climb;
        }

        for id in finished {
            self.projectiles.remove(&id);
        }
        (damage, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Health;
    use crate::registry::Entity;

    fn spawn(target: EntityId, splash: i32) -> ProjectileSpawn {
        ProjectileSpawn {
            source: 1,
            target,
            origin: Vec3Fixed::ZERO,
            speed: Fixed::from_num(10),
            damage: 7,
            splash_radius: Fixed::from_num(splash),
            team: Team::Red,
        }
    }

    fn registry_with_target(x: i32) -> Registry {
        let mut registry = Registry::new();
        registry
            .add(
                Entity::new(2, Vec3Fixed::from_ints(x, 0, 0))
                    .with_team(Team::Blue)
                    .with_health(Health::new(20)),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_projectile_travels_then_hits() {
        let registry = registry_with_target(3);
        let mut system = ProjectileSystem::new();
        system.launch(&spawn(2, 0));
        let dt = Fixed::from_num(0.125);

        // 1.25 units per tick: 3 units take three ticks.
        let (damage, _) = system.advance(&registry, dt);
        assert!(damage.is_empty());
        let (damage, _) = system.advance(&registry, dt);
        assert!(damage.is_empty());
        let (damage, events) = system.advance(&registry, dt);
        assert_eq!(damage.len(), 1);
        assert_eq!(damage[0].target, DamageTarget::Entity(2));
        assert!(matches!(events[0], ProjectileEvent::Hit { target: 2, .. }));
        assert!(system.is_empty());
    }

    #[test]
    fn test_projectile_fizzles_without_target() {
        let registry = Registry::new();
        let mut system = ProjectileSystem::new();
        system.launch(&spawn(9, 0));

        let (damage, events) = system.advance(&registry, Fixed::from_num(0.05));
        assert!(damage.is_empty());
        assert_eq!(events, vec![ProjectileEvent::Fizzled { projectile: 1 }]);
        assert!(system.is_empty());
    }

    #[test]
    fn test_splash_projectile_hits_area() {
        let registry = registry_with_target(0);
        let mut system = ProjectileSystem::new();
        system.launch(&spawn(2, 2));

        let (damage, _) = system.advance(&registry, Fixed::from_num(0.05));
        assert_eq!(
            damage[0].target,
            DamageTarget::Area {
                center: Vec3Fixed::ZERO,
                radius: Fixed::from_num(2)
            }
        );
    }
}
