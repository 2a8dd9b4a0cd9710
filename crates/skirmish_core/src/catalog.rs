//! Unit definitions and the entity factory seam.
//!
//! The simulation never builds units itself. Spawn requests (from formation
//! deployment) go through an [`EntityFactory`], which turns a unit type into
//! a [`UnitBlueprint`]. The core then allocates the ID and registers the
//! entity and its physics body in the same tick.
//!
//! [`UnitCatalog`] is the data-driven factory loaded from RON.
//!
//! # Example RON
//!
//! ```ron
//! UnitCatalog(
//!     units: [
//!         (
//!             id: "rifleman",
//!             cost: 20,
//!             health: 60,
//!             speed: 3.0,
//!             radius: 0.5,
//!             attack: Some((damage: 6, range: 8.0, cooldown: 1.0, kind: Ranged, projectile_speed: 20.0)),
//!             death_sequence_ticks: Some(20),
//!             impact_effect: Some(Blood),
//!         ),
//!     ],
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::{
    Attack, AttackKind, Capabilities, DeathSequence, ImpactEffect, PlayerId, Team, UnitTypeId,
};
use crate::error::{Result, SimError};
use crate::math::{fixed_decimal, Fixed, Vec3Fixed};

/// A request to create a unit, produced by the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRequest {
    /// Catalog key of the unit.
    pub unit_type: UnitTypeId,
    /// Team the unit fights for.
    pub team: Team,
    /// World position to spawn at.
    pub position: Vec3Fixed,
    /// Player whose formation produced the request.
    pub player: PlayerId,
}

/// Everything the core needs to register a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitBlueprint {
    /// Catalog key.
    pub unit_type: UnitTypeId,
    /// Maximum health.
    pub health: u32,
    /// Movement speed; units with zero speed get no Movement component.
    pub speed: Fixed,
    /// Collider radius.
    pub radius: Fixed,
    /// Collider mass.
    pub mass: Fixed,
    /// Whether the body is static (structures).
    pub is_static: bool,
    /// Attack component, if the unit fights.
    pub attack: Option<Attack>,
    /// Optional behaviours.
    pub capabilities: Capabilities,
}

/// Turns spawn requests into blueprints.
pub trait EntityFactory: Send {
    /// Blueprint for a spawn request, or `None` if the unit type is unknown.
    fn blueprint(&self, request: &SpawnRequest) -> Option<UnitBlueprint>;

    /// Resource cost of a unit type, or `None` if it is unknown.
    fn unit_cost(&self, unit_type: &str) -> Option<u32>;
}

/// Attack statistics of a unit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackStats {
    /// Damage per hit.
    pub damage: u32,
    /// Attack range.
    #[serde(with = "fixed_decimal")]
    pub range: Fixed,
    /// Seconds between attacks.
    #[serde(with = "fixed_decimal")]
    pub cooldown: Fixed,
    /// Melee or ranged.
    #[serde(default)]
    pub kind: AttackKind,
    /// Acquisition range; defaults to the attack range.
    #[serde(default, with = "fixed_decimal")]
    pub detection_range: Fixed,
    /// Projectile speed for ranged attacks.
    #[serde(default, with = "fixed_decimal")]
    pub projectile_speed: Fixed,
    /// Area damage radius.
    #[serde(default, with = "fixed_decimal")]
    pub splash_radius: Fixed,
    /// Height above the unit position where attacks originate.
    #[serde(default, with = "fixed_decimal")]
    pub origin_height: Fixed,
}

impl AttackStats {
    fn to_component(&self) -> Attack {
        let base = match self.kind {
            AttackKind::Melee => Attack::melee(self.damage, self.range, self.cooldown),
            AttackKind::Ranged => {
                Attack::ranged(self.damage, self.range, self.cooldown, self.projectile_speed)
            }
        };
        base.with_detection_range(self.detection_range)
            .with_splash_radius(self.splash_radius)
            .with_origin_offset(Vec3Fixed::new(Fixed::ZERO, self.origin_height, Fixed::ZERO))
    }
}

/// Data-driven unit definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Unique key.
    pub id: UnitTypeId,
    /// Resources needed to place the unit in a formation.
    pub cost: u32,
    /// Maximum health.
    pub health: u32,
    /// Movement speed in world units per second.
    #[serde(default, with = "fixed_decimal")]
    pub speed: Fixed,
    /// Collider radius.
    #[serde(with = "fixed_decimal")]
    pub radius: Fixed,
    /// Collider mass.
    #[serde(default = "default_mass", with = "fixed_decimal")]
    pub mass: Fixed,
    /// Static structure.
    #[serde(default)]
    pub is_static: bool,
    /// Attack, if the unit fights.
    #[serde(default)]
    pub attack: Option<AttackStats>,
    /// Ticks to linger after death.
    #[serde(default)]
    pub death_sequence_ticks: Option<u32>,
    /// Hit effect tag.
    #[serde(default)]
    pub impact_effect: Option<ImpactEffect>,
}

fn default_mass() -> Fixed {
    Fixed::ONE
}

fn fx<T: fixed::traits::ToFixed>(n: T) -> Fixed {
    Fixed::from_num(n)
}

impl UnitStats {
    /// Build the blueprint for this unit type.
    #[must_use]
    pub fn blueprint(&self) -> UnitBlueprint {
        UnitBlueprint {
            unit_type: self.id.clone(),
            health: self.health,
            speed: self.speed,
            radius: self.radius,
            mass: self.mass,
            is_static: self.is_static,
            attack: self.attack.as_ref().map(AttackStats::to_component),
            capabilities: Capabilities {
                death_sequence: self.death_sequence_ticks.map(|ticks| DeathSequence { ticks }),
                impact_effect: self.impact_effect,
            },
        }
    }
}

/// Catalog of unit types, the default [`EntityFactory`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCatalog {
    /// Unit definitions.
    pub units: Vec<UnitStats>,
}

impl UnitCatalog {
    /// Parse and validate a catalog from RON text.
    ///
    /// # Errors
    ///
    /// Returns a parse error or [`SimError::InvalidConfig`].
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let catalog: Self = ron::from_str(source).map_err(|e| SimError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an IO, parse or validation error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| SimError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let catalog: Self = ron::from_str(&source).map_err(|e| SimError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check for duplicate IDs and impossible stats.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] naming the first bad unit.
    pub fn validate(&self) -> Result<()> {
        for (i, unit) in self.units.iter().enumerate() {
            if self.units[..i].iter().any(|u| u.id == unit.id) {
                return Err(SimError::InvalidConfig(format!(
                    "unit '{}' is defined twice",
                    unit.id
                )));
            }
            if unit.health == 0 || unit.radius <= Fixed::ZERO || unit.mass <= Fixed::ZERO {
                return Err(SimError::InvalidConfig(format!(
                    "unit '{}' needs positive health, radius and mass",
                    unit.id
                )));
            }
            if let Some(attack) = &unit.attack {
                if attack.kind == AttackKind::Ranged && attack.projectile_speed <= Fixed::ZERO {
                    return Err(SimError::InvalidConfig(format!(
                        "ranged unit '{}' needs a projectile speed",
                        unit.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a unit type.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&UnitStats> {
        self.units.iter().find(|unit| unit.id == id)
    }

    /// Built-in roster used by demos and tests.
    #[must_use]
    pub fn skirmish_default() -> Self {
        Self {
            units: vec![
                UnitStats {
                    id: "infantry".to_string(),
                    cost: 10,
                    health: 100,
                    speed: fx(3),
                    radius: fx(0.5),
                    mass: fx(1),
                    is_static: false,
                    attack: Some(AttackStats {
                        damage: 10,
                        range: fx(1.5),
                        cooldown: fx(1),
                        kind: AttackKind::Melee,
                        detection_range: fx(8),
                        projectile_speed: Fixed::ZERO,
                        splash_radius: Fixed::ZERO,
                        origin_height: Fixed::ZERO,
                    }),
                    death_sequence_ticks: Some(10),
                    impact_effect: Some(ImpactEffect::Blood),
                },
                UnitStats {
                    id: "archer".to_string(),
                    cost: 15,
                    health: 60,
                    speed: fx(2.5),
                    radius: fx(0.5),
                    mass: fx(1),
                    is_static: false,
                    attack: Some(AttackStats {
                        damage: 8,
                        range: fx(6),
                        cooldown: fx(1.5),
                        kind: AttackKind::Ranged,
                        detection_range: fx(10),
                        projectile_speed: fx(15),
                        splash_radius: Fixed::ZERO,
                        origin_height: fx(1),
                    }),
                    death_sequence_ticks: Some(10),
                    impact_effect: Some(ImpactEffect::Blood),
                },
                UnitStats {
                    id: "catapult".to_string(),
                    cost: 40,
                    health: 150,
                    speed: fx(1.5),
                    radius: fx(1),
                    mass: fx(4),
                    is_static: false,
                    attack: Some(AttackStats {
                        damage: 25,
                        range: fx(12),
                        cooldown: fx(4),
                        kind: AttackKind::Ranged,
                        detection_range: fx(14),
                        projectile_speed: fx(10),
                        splash_radius: fx(2),
                        origin_height: fx(1.5),
                    }),
                    death_sequence_ticks: None,
                    impact_effect: Some(ImpactEffect::Sparks),
                },
                UnitStats {
                    id: "barricade".to_string(),
                    cost: 5,
                    health: 200,
                    speed: Fixed::ZERO,
                    radius: fx(1),
                    mass: fx(10),
                    is_static: true,
                    attack: None,
                    death_sequence_ticks: None,
                    impact_effect: Some(ImpactEffect::Sparks),
                },
            ],
        }
    }
}

impl EntityFactory for UnitCatalog {
    fn blueprint(&self, request: &SpawnRequest) -> Option<UnitBlueprint> {
        self.get(&request.unit_type).map(UnitStats::blueprint)
    }

    fn unit_cost(&self, unit_type: &str) -> Option<u32> {
        self.get(unit_type).map(|unit| unit.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = UnitCatalog::skirmish_default();
        catalog.validate().unwrap();
        assert_eq!(catalog.unit_cost("archer"), Some(15));
        assert_eq!(catalog.unit_cost("dragon"), None);
    }

    #[test]
    fn test_default_roster_keeps_fractional_stats() {
        let catalog = UnitCatalog::skirmish_default();
        let infantry = catalog.get("infantry").unwrap();
        assert_eq!(infantry.speed, Fixed::from_num(3));
        assert_eq!(infantry.radius, Fixed::from_num(0.5));
        assert_eq!(
            infantry.attack.as_ref().unwrap().range,
            Fixed::from_num(1.5)
        );
        let archer = catalog.get("archer").unwrap();
        assert_eq!(archer.speed, Fixed::from_num(2.5));
        assert_eq!(archer.attack.as_ref().unwrap().cooldown, Fixed::from_num(1.5));
        let catapult = catalog.get("catapult").unwrap();
        assert_eq!(catapult.attack.as_ref().unwrap().origin_height, Fixed::from_num(1.5));
    }

    #[test]
    fn test_parse_ron_catalog() {
        let catalog = UnitCatalog::from_ron_str(
            r#"UnitCatalog(units: [(
                id: "pikeman",
                cost: 12,
                health: 80,
                speed: 2.5,
                radius: 0.5,
                attack: Some((damage: 9, range: 2.0, cooldown: 1.25)),
                death_sequence_ticks: Some(4),
            )])"#,
        )
        .unwrap();

        let blueprint = catalog.get("pikeman").unwrap().blueprint();
        assert_eq!(blueprint.mass, Fixed::ONE);
        let attack = blueprint.attack.unwrap();
        assert_eq!(attack.kind, AttackKind::Melee);
        assert_eq!(attack.detection_range, Fixed::from_num(2));
        assert_eq!(attack.cooldown, Fixed::from_num(1.25));
        assert_eq!(
            blueprint.capabilities.death_sequence,
            Some(DeathSequence { ticks: 4 })
        );
    }

    #[test]
    fn test_duplicate_units_rejected() {
        let mut catalog = UnitCatalog::skirmish_default();
        catalog.units.push(catalog.units[0].clone());
        assert!(matches!(catalog.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_factory_unknown_type() {
        let catalog = UnitCatalog::skirmish_default();
        let request = SpawnRequest {
            unit_type: "dragon".to_string(),
            team: Team::Red,
            position: Vec3Fixed::ZERO,
            player: PlayerId::new("a"),
        };
        assert!(catalog.blueprint(&request).is_none());
    }
}
