//! Territory bands along the map depth.
//!
//! The map is cut into equal bands along Z. Red starts owning the lower
//! half, Blue the upper half. A band held by living units of only one team
//! at the end of a tick switches to that team; empty or contested bands
//! keep their owner.

use serde::{Deserialize, Serialize};

use crate::components::{ComponentKind, Team};
use crate::config::TerritoryConfig;
use crate::math::{fixed_serde, Fixed};
use crate::registry::Registry;

/// A band changing hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryCapture {
    /// Band index, 0 at the low-Z edge.
    pub band: usize,
    /// New owner.
    pub team: Team,
    /// Owner before the capture.
    pub previous: Team,
}

/// Ownership of every band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryMap {
    owners: Vec<Team>,
    #[serde(with = "fixed_serde")]
    band_depth: Fixed,
}

impl TerritoryMap {
    /// Initial split: lower half Red, upper half Blue.
    #[must_use]
    pub fn new(config: &TerritoryConfig) -> Self {
        let bands = config.bands.max(1) as usize;
        let owners = (0..bands)
            .map(|band| if band * 2 < bands { Team::Red } else { Team::Blue })
            .collect();
        Self {
            owners,
            band_depth: config.map_depth / Fixed::from_num(bands),
        }
    }

    /// Number of bands.
    #[must_use]
    pub fn band_count(&self) -> usize {
        self.owners.len()
    }

    /// Owner of a band.
    #[must_use]
    pub fn owner(&self, band: usize) -> Option<Team> {
        self.owners.get(band).copied()
    }

    /// Owners of all bands, low Z first.
    #[must_use]
    pub fn owners(&self) -> &[Team] {
        &self.owners
    }

    /// Bands currently held by `team`.
    #[must_use]
    pub fn bands_owned(&self, team: Team) -> u32 {
        let owned = self.owners.iter().filter(|&&owner| owner == team).count();
        u32::try_from(owned).unwrap_or(u32::MAX)
    }

    /// Band containing `z`; positions off the map clamp to the edge bands.
    #[must_use]
    pub fn band_of(&self, z: Fixed) -> usize {
        if z <= Fixed::ZERO || self.band_depth <= Fixed::ZERO {
            return 0;
        }
        let band = (z / self.band_depth).floor().saturating_to_num::<usize>();
        band.min(self.owners.len() - 1)
    }

    /// Recompute ownership from unit positions.
    pub fn update(&mut self, registry: &Registry) -> Vec<TerritoryCapture> {
        let mut presence = vec![[false; 2]; self.owners.len()];
        for id in registry.query_all(&[ComponentKind::Team, ComponentKind::Health]) {
            let Some(entity) = registry.get(id).filter(|e| e.is_interactive()) else {
                continue;
            };
            let Some(team) = entity.team() else {
                continue;
            };
            let band = self.band_of(entity.position.z);
            presence[band][team_slot(team)] = true;
        }

        let mut captures = Vec::new();
        for (band, present) in presence.iter().enumerate() {
            let holder = match present {
                [true, false] => Team::Red,
                [false, true] => Team::Blue,
                _ => continue,
            };
            let previous = self.owners[band];
            if previous != holder {
                self.owners[band] = holder;
                captures.push(TerritoryCapture {
                    band,
                    team: holder,
                    previous,
                });
            }
        }
        captures
    }
}

const fn team_slot(team: Team) -> usize {
    match team {
        Team::Red => 0,
        Team::Blue => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Health;
    use crate::math::Vec3Fixed;
    use crate::registry::Entity;

    fn unit(id: u64, z: i32, team: Team) -> Entity {
        Entity::new(id, Vec3Fixed::from_ints(0, 0, z))
            .with_team(team)
            .with_health(Health::new(10))
    }

    #[test]
    fn test_initial_split() {
        let map = TerritoryMap::new(&TerritoryConfig::default());
        assert_eq!(map.band_count(), 8);
        assert_eq!(map.bands_owned(Team::Red), 4);
        assert_eq!(map.owner(0), Some(Team::Red));
        assert_eq!(map.owner(7), Some(Team::Blue));
    }

    #[test]
    fn test_band_lookup_clamps() {
        let map = TerritoryMap::new(&TerritoryConfig::default());
        assert_eq!(map.band_of(Fixed::from_num(-3)), 0);
        assert_eq!(map.band_of(Fixed::from_num(25)), 2);
        assert_eq!(map.band_of(Fixed::from_num(500)), 7);
    }

    #[test]
    fn test_sole_occupant_captures() {
        let mut map = TerritoryMap::new(&TerritoryConfig::default());
        let mut registry = Registry::new();
        // Band 5 (z 50..60): Red alone. Band 6: contested.
        registry.add(unit(1, 55, Team::Red)).unwrap();
        registry.add(unit(2, 65, Team::Red)).unwrap();
        registry.add(unit(3, 66, Team::Blue)).unwrap();

        let captures = map.update(&registry);
        assert_eq!(
            captures,
            vec![TerritoryCapture {
                band: 5,
                team: Team::Red,
                previous: Team::Blue
            }]
        );
        assert_eq!(map.owner(6), Some(Team::Blue));
        assert_eq!(map.bands_owned(Team::Red), 5);
        assert!(map.update(&registry).is_empty());
    }
}
