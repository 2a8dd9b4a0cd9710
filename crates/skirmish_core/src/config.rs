//! Match configuration.
//!
//! Configuration is human-edited RON with decimal values. Every decimal is
//! converted to [`Fixed`] exactly once when the file is parsed, which is the
//! only place floats touch the simulation. All clients must load identical
//! files before the match starts; changing configuration mid-match
//! desynchronizes the simulation.
//!
//! # Example RON
//!
//! ```ron
//! MatchConfig(
//!     tick_rate: 20,
//!     physics: (substeps: 4, max_speed: 12.0),
//!     players: [
//!         (id: "alice", team: Red),
//!         (id: "bob", team: Blue),
//!     ],
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::{PlayerId, Team};
use crate::error::{Result, SimError};
use crate::math::{fixed_decimal, Fixed};

/// Default simulation tick rate.
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Upper bound for [`PhysicsConfig::world_extent`].
pub const MAX_WORLD_EXTENT: i32 = 1_000_000;

/// Physics constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Fixed substeps per network tick.
    pub substeps: u32,
    /// Spatial grid cell edge length.
    #[serde(with = "fixed_decimal")]
    pub cell_size: Fixed,
    /// Distance at which a move target counts as reached.
    #[serde(with = "fixed_decimal")]
    pub arrival_threshold: Fixed,
    /// Maximum horizontal speed in world units per second.
    #[serde(with = "fixed_decimal")]
    pub max_speed: Fixed,
    /// Velocity multiplier applied each substep to bodies without a target.
    #[serde(with = "fixed_decimal")]
    pub friction: Fixed,
    /// Speed below which damped bodies snap to rest.
    #[serde(with = "fixed_decimal")]
    pub stop_threshold: Fixed,
    /// Bounciness of collision impulses (0 = fully inelastic).
    #[serde(with = "fixed_decimal")]
    pub restitution: Fixed,
    /// Move targets must lie within this distance of the origin on both
    /// ground axes.
    #[serde(with = "fixed_decimal")]
    pub world_extent: Fixed,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            substeps: 4,
            cell_size: Fixed::from_num(4),
            arrival_threshold: Fixed::from_num(0.25),
            max_speed: Fixed::from_num(12),
            friction: Fixed::from_num(0.8),
            stop_threshold: Fixed::from_num(0.01),
            restitution: Fixed::ZERO,
            world_extent: Fixed::from_num(1000),
        }
    }
}

/// Resource income settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Resources every player starts with.
    pub starting_resources: u32,
    /// Ticks between income payouts.
    pub income_interval_ticks: u64,
    /// Flat income per payout.
    pub base_income: u32,
    /// Extra income per territory band owned by the player's team.
    pub income_per_band: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_resources: 200,
            income_interval_ticks: 20,
            base_income: 10,
            income_per_band: 2,
        }
    }
}

/// Wave timer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Ticks between automatic formation deployments.
    pub interval_ticks: u64,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 600,
        }
    }
}

/// Map geometry and territory bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerritoryConfig {
    /// Number of bands the map depth is divided into.
    pub bands: u32,
    /// Map extent along Z, starting at 0.
    #[serde(with = "fixed_decimal")]
    pub map_depth: Fixed,
}

impl Default for TerritoryConfig {
    fn default() -> Self {
        Self {
            bands: 8,
            map_depth: Fixed::from_num(80),
        }
    }
}

/// Formation grid layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    /// Grid columns (across the map, X).
    pub columns: u8,
    /// Grid rows (toward the enemy, Z). Row 0 is the front row.
    pub rows: u8,
    /// Distance between neighbouring slots.
    #[serde(with = "fixed_decimal")]
    pub slot_spacing: Fixed,
    /// Distance from the team's map edge to its back row.
    #[serde(with = "fixed_decimal")]
    pub deploy_margin: Fixed,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            columns: 6,
            rows: 4,
            slot_spacing: Fixed::from_num(2.5),
            deploy_margin: Fixed::from_num(5),
        }
    }
}

/// A seat in the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlot {
    /// Network identity.
    pub id: PlayerId,
    /// Team the player controls.
    pub team: Team,
}

/// Complete configuration for one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Network ticks per second.
    pub tick_rate: u32,
    /// Physics constants.
    pub physics: PhysicsConfig,
    /// Economy settings.
    pub economy: EconomyConfig,
    /// Wave timer.
    pub waves: WaveConfig,
    /// Map and territory.
    pub territory: TerritoryConfig,
    /// Formation grid.
    pub formation: FormationConfig,
    /// Seats, in canonical order.
    pub players: Vec<PlayerSlot>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            physics: PhysicsConfig::default(),
            economy: EconomyConfig::default(),
            waves: WaveConfig::default(),
            territory: TerritoryConfig::default(),
            formation: FormationConfig::default(),
            players: Vec::new(),
        }
    }
}

impl MatchConfig {
    /// A validated default config with two players, `red` and `blue`.
    #[must_use]
    pub fn two_player(red: impl Into<String>, blue: impl Into<String>) -> Self {
        Self {
            players: vec![
                PlayerSlot {
                    id: PlayerId::new(red),
                    team: Team::Red,
                },
                PlayerSlot {
                    id: PlayerId::new(blue),
                    team: Team::Blue,
                },
            ],
            ..Self::default()
        }
    }

    /// Parse and validate a config from RON text.
    ///
    /// # Errors
    ///
    /// Returns a parse error or the first failed validation rule.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| SimError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
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
        let config: Self = ron::from_str(&source).map_err(|e| SimError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the simulation relies on.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(SimError::InvalidConfig(msg.to_string()));

        if self.tick_rate == 0 {
            return invalid("tick_rate must be positive");
        }
        if self.physics.substeps == 0 {
            return invalid("physics.substeps must be positive");
        }
        if self.physics.cell_size <= Fixed::ZERO {
            return invalid("physics.cell_size must be positive");
        }
        if self.physics.friction < Fixed::ZERO || self.physics.friction > Fixed::ONE {
            return invalid("physics.friction must be within 0..=1");
        }
        if self.physics.world_extent <= Fixed::ZERO
            || self.physics.world_extent > Fixed::from_num(MAX_WORLD_EXTENT)
        {
            return invalid("physics.world_extent must be within 0..=1000000");
        }
        if self.economy.income_interval_ticks == 0 {
            return invalid("economy.income_interval_ticks must be positive");
        }
        if self.waves.interval_ticks == 0 {
            return invalid("waves.interval_ticks must be positive");
        }
        if self.territory.bands == 0 || self.territory.map_depth <= Fixed::ZERO {
            return invalid("territory needs at least one band and a positive depth");
        }
        if self.formation.columns == 0 || self.formation.rows == 0 {
            return invalid("formation grid must have at least one slot");
        }
        for (i, player) in self.players.iter().enumerate() {
            if self.players[..i].iter().any(|p| p.id == player.id) {
                return Err(SimError::InvalidConfig(format!(
                    "player '{}' is listed twice",
                    player.id
                )));
            }
        }
        Ok(())
    }

    /// Seconds per network tick.
    #[must_use]
    pub fn tick_dt(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate)
    }

    /// Seconds per physics substep.
    #[must_use]
    pub fn substep_dt(&self) -> Fixed {
        self.tick_dt() / Fixed::from_num(self.physics.substeps)
    }

    /// Team of a seated player.
    #[must_use]
    pub fn team_of(&self, player: &PlayerId) -> Option<Team> {
        self.players
            .iter()
            .find(|slot| &slot.id == player)
            .map(|slot| slot.team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ron_uses_defaults() {
        let config = MatchConfig::from_ron_str("MatchConfig()").unwrap();
        assert_eq!(config.tick_rate, DEFAULT_TICK_RATE);
        assert_eq!(config.physics, PhysicsConfig::default());
    }

    #[test]
    fn test_decimal_values_convert_to_fixed() {
        let config = MatchConfig::from_ron_str(
            r#"MatchConfig(
                tick_rate: 8,
                physics: (substeps: 2, max_speed: 7.5),
                players: [(id: "a", team: Red), (id: "b", team: Blue)],
            )"#,
        )
        .unwrap();
        assert_eq!(config.physics.max_speed, Fixed::from_num(7.5));
        assert_eq!(config.substep_dt(), Fixed::from_num(0.0625));
        assert_eq!(config.team_of(&PlayerId::new("b")), Some(Team::Blue));
        assert_eq!(config.team_of(&PlayerId::new("c")), None);
    }

    #[test]
    fn test_validation_rejects_zero_substeps() {
        let err = MatchConfig::from_ron_str("MatchConfig(physics: (substeps: 0))").unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig(_)));
    }

    #[test]
    fn test_validation_rejects_duplicate_players() {
        let mut config = MatchConfig::two_player("a", "b");
        config.players[1].id = PlayerId::new("a");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.ron");
        std::fs::write(&path, "MatchConfig(tick_rate: 30)").unwrap();
        assert_eq!(MatchConfig::load(&path).unwrap().tick_rate, 30);
        assert!(matches!(
            MatchConfig::load(dir.path().join("missing.ron")),
            Err(SimError::Io { .. })
        ));
    }
}
