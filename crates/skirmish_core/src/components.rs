//! Component definitions.
//!
//! Components are plain data. Each subsystem owns the components it
//! mutates: Movement owns move intent, Physics owns velocity and position,
//! Combat owns cooldowns and targets, Health owns hit points.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec3Fixed};

/// Unique identifier for entities.
pub type EntityId = u64;

/// Catalog key of a unit type (e.g. `"rifleman"`).
pub type UnitTypeId = String;

/// Network identity of a player.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create a player ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Team affiliation used for hostility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Team {
    /// Team deploying from the low-Z side of the map.
    Red,
    /// Team deploying from the high-Z side of the map.
    Blue,
}

impl Team {
    /// Both teams, in canonical order.
    pub const ALL: [Team; 2] = [Team::Red, Team::Blue];

    /// Whether `other` is an enemy of this team.
    #[must_use]
    pub fn is_hostile_to(self, other: Team) -> bool {
        self != other
    }

    /// The opposing team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

/// Health component for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
    /// Set once health has reached zero. Never cleared.
    pub destroyed: bool,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self {
            current: max,
            max,
            destroyed: false,
        }
    }

    /// Check if entity is dead.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.destroyed || self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    ///
    /// Marks the component destroyed when it reaches zero.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        if self.destroyed {
            return 0;
        }
        let actual = amount.min(self.current);
        self.current -= actual;
        if self.current == 0 {
            self.destroyed = true;
        }
        actual
    }

    /// Get health as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.max == 0 {
            0
        } else {
            (self.current * 100) / self.max
        }
    }
}

/// How an attack delivers its damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AttackKind {
    /// Damage lands on the tick the attack fires.
    #[default]
    Melee,
    /// Fires a projectile that deals damage on impact.
    Ranged,
}

/// Attack component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    /// Damage per attack.
    pub damage: u32,
    /// Attack range in world units.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Range at which hostiles are acquired as targets.
    #[serde(with = "fixed_serde")]
    pub detection_range: Fixed,
    /// Seconds between attacks.
    #[serde(with = "fixed_serde")]
    pub cooldown: Fixed,
    /// Seconds until the next attack is allowed.
    #[serde(with = "fixed_serde")]
    pub cooldown_timer: Fixed,
    /// Projectile speed in world units per second (ranged only).
    #[serde(with = "fixed_serde")]
    pub projectile_speed: Fixed,
    /// Splash radius of the hit (0 = single target).
    #[serde(with = "fixed_serde")]
    pub splash_radius: Fixed,
    /// Melee or ranged delivery.
    pub kind: AttackKind,
    /// Offset from the entity position where attacks originate.
    pub origin_offset: Vec3Fixed,
    /// Currently acquired target.
    pub target: Option<EntityId>,
}

impl Attack {
    /// Create a melee attack whose detection range equals its attack range.
    #[must_use]
    pub fn melee(damage: u32, range: Fixed, cooldown: Fixed) -> Self {
        Self {
            damage,
            range,
            detection_range: range,
            cooldown,
            cooldown_timer: Fixed::ZERO,
            projectile_speed: Fixed::ZERO,
            splash_radius: Fixed::ZERO,
            kind: AttackKind::Melee,
            origin_offset: Vec3Fixed::ZERO,
            target: None,
        }
    }

    /// Create a ranged attack firing projectiles at `projectile_speed`.
    #[must_use]
    pub fn ranged(damage: u32, range: Fixed, cooldown: Fixed, projectile_speed: Fixed) -> Self {
        Self {
            projectile_speed,
            kind: AttackKind::Ranged,
            ..Self::melee(damage, range, cooldown)
        }
    }

    /// Builder method to set the detection range. Never below the attack range.
    #[must_use]
    pub fn with_detection_range(mut self, detection_range: Fixed) -> Self {
        self.detection_range = detection_range.max(self.range);
        self
    }

    /// Builder method to set the splash radius.
    #[must_use]
    pub fn with_splash_radius(mut self, radius: Fixed) -> Self {
        self.splash_radius = radius;
        self
    }

    /// Builder method to set the attack origin offset.
    #[must_use]
    pub fn with_origin_offset(mut self, offset: Vec3Fixed) -> Self {
        self.origin_offset = offset;
        self
    }

    /// Check if ready to attack.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.cooldown_timer <= Fixed::ZERO
    }

    /// Count the cooldown down by `dt` seconds, stopping at zero.
    pub fn tick_cooldown(&mut self, dt: Fixed) {
        self.cooldown_timer = (self.cooldown_timer - dt).max(Fixed::ZERO);
    }

    /// Restart the cooldown after attacking.
    pub fn reset_cooldown(&mut self) {
        self.cooldown_timer = self.cooldown;
    }
}

/// Movement component for mobile units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Movement speed in world units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Whether a move order is in progress.
    pub moving: bool,
    /// Current movement target (if any).
    pub target: Option<Vec3Fixed>,
    /// Raised by physics on arrival, cleared when consumed.
    pub just_arrived: bool,
}

impl Movement {
    /// Create an idle movement component.
    #[must_use]
    pub const fn new(speed: Fixed) -> Self {
        Self {
            speed,
            moving: false,
            target: None,
            just_arrived: false,
        }
    }

    /// Whether the entity is travelling toward a target.
    #[must_use]
    pub const fn has_active_target(&self) -> bool {
        self.moving && self.target.is_some()
    }
}

/// Optional death behaviour: the entity lingers, ignored by physics and
/// targeting, for `ticks` ticks before it is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSequence {
    /// Ticks between reaching zero health and removal.
    pub ticks: u32,
}

/// Impact effect an external effects pipeline should play when the
/// entity is hit. Has no simulation effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImpactEffect {
    /// Organic units.
    Blood,
    /// Armoured units and structures.
    Sparks,
}

/// Optional behaviours resolved once when the entity is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Linger before removal when killed.
    pub death_sequence: Option<DeathSequence>,
    /// Effect tag attached to damage intents hitting this entity.
    pub impact_effect: Option<ImpactEffect>,
}

/// Tag identifying a component kind in the registry index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// [`Team`] affiliation.
    Team,
    /// [`Health`] component.
    Health,
    /// [`Attack`] component.
    Attack,
    /// [`Movement`] component.
    Movement,
}

impl ComponentKind {
    /// Every component kind.
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::Team,
        ComponentKind::Health,
        ComponentKind::Attack,
        ComponentKind::Movement,
    ];
}
