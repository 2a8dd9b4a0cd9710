//! Formation grids.
//!
//! Each player arranges purchased units on a `columns × rows` grid before
//! a wave. Deploying empties the grid and turns every occupied slot, in
//! row-major order, into a spawn request inside the team's deploy zone.
//!
//! Row 0 is the front row. Red deploys near Z = 0 facing +Z; Blue's zone
//! is the point mirror of Red's through the map centre line.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::SpawnRequest;
use crate::components::{PlayerId, Team, UnitTypeId};
use crate::config::FormationConfig;
use crate::error::CommandError;
use crate::math::{Fixed, Vec3Fixed};

/// Grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    /// Column, 0 at the left edge.
    pub column: u8,
    /// Row, 0 at the front.
    pub row: u8,
}

impl Slot {
    /// Create a slot coordinate.
    #[must_use]
    pub const fn new(column: u8, row: u8) -> Self {
        Self { column, row }
    }

    fn invalid(self, reason: &'static str) -> CommandError {
        CommandError::InvalidSlot {
            column: self.column,
            row: self.row,
            reason,
        }
    }
}

/// One player's grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationGrid {
    columns: u8,
    rows: u8,
    slots: Vec<Option<UnitTypeId>>,
    deployed_wave: Option<u32>,
}

impl FormationGrid {
    /// Create an empty grid.
    #[must_use]
    pub fn new(columns: u8, rows: u8) -> Self {
        Self {
            columns,
            rows,
            slots: vec![None; usize::from(columns) * usize::from(rows)],
            deployed_wave: None,
        }
    }

    fn index(&self, slot: Slot) -> Result<usize, CommandError> {
        if slot.column >= self.columns || slot.row >= self.rows {
            return Err(slot.invalid("outside the grid"));
        }
        Ok(usize::from(slot.row) * usize::from(self.columns) + usize::from(slot.column))
    }

    /// Unit in a slot.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&UnitTypeId> {
        self.index(slot).ok().and_then(|i| self.slots[i].as_ref())
    }

    /// Put a unit in an empty slot.
    ///
    /// # Errors
    ///
    /// Fails if the slot is out of bounds or occupied.
    pub fn place(&mut self, slot: Slot, unit_type: UnitTypeId) -> Result<(), CommandError> {
        let index = self.index(slot)?;
        if self.slots[index].is_some() {
            return Err(slot.invalid("slot is occupied"));
        }
        self.slots[index] = Some(unit_type);
        Ok(())
    }

    /// Move a unit to another slot, swapping if that slot is occupied.
    ///
    /// # Errors
    ///
    /// Fails if either slot is out of bounds or `from` is empty.
    pub fn move_unit(&mut self, from: Slot, to: Slot) -> Result<(), CommandError> {
        let source = self.index(from)?;
        let dest = self.index(to)?;
        if self.slots[source].is_none() {
            return Err(from.invalid("slot is empty"));
        }
        self.slots.swap(source, dest);
        Ok(())
    }

    /// Take a unit out of a slot.
    ///
    /// # Errors
    ///
    /// Fails if the slot is out of bounds or empty.
    pub fn remove(&mut self, slot: Slot) -> Result<UnitTypeId, CommandError> {
        let index = self.index(slot)?;
        self.slots[index]
            .take()
            .ok_or_else(|| slot.invalid("slot is empty"))
    }

    /// Occupied slots in row-major order.
    #[must_use]
    pub fn occupied(&self) -> Vec<(Slot, UnitTypeId)> {
        let columns = usize::from(self.columns.max(1));
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, unit)| {
                let unit = unit.clone()?;
                let column = u8::try_from(i % columns).ok()?;
                let row = u8::try_from(i / columns).ok()?;
                Some((Slot::new(column, row), unit))
            })
            .collect()
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Wave this grid last deployed in.
    #[must_use]
    pub const fn deployed_wave(&self) -> Option<u32> {
        self.deployed_wave
    }

    /// Empty the grid for `wave`, returning what was on it.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::AlreadyDeployed`] on a second deploy in the
    /// same wave.
    pub fn take_for_deploy(&mut self, wave: u32) -> Result<Vec<(Slot, UnitTypeId)>, CommandError> {
        if self.deployed_wave == Some(wave) {
            return Err(CommandError::AlreadyDeployed(wave));
        }
        let units = self.occupied();
        for slot in &mut self.slots {
            *slot = None;
        }
        self.deployed_wave = Some(wave);
        Ok(units)
    }
}

/// World position of a slot for `team`.
#[must_use]
pub fn slot_position(
    config: &FormationConfig,
    map_depth: Fixed,
    team: Team,
    slot: Slot,
) -> Vec3Fixed {
    let half_width = Fixed::from_num(config.columns.saturating_sub(1)) / Fixed::from_num(2);
    let x = (Fixed::from_num(slot.column) - half_width) * config.slot_spacing;
    let back = Fixed::from_num(config.rows.saturating_sub(1).saturating_sub(slot.row));
    let z = config.deploy_margin + back * config.slot_spacing;
    match team {
        Team::Red => Vec3Fixed::new(x, Fixed::ZERO, z),
        Team::Blue => Vec3Fixed::new(-x, Fixed::ZERO, map_depth - z),
    }
}

/// Every player's grid, keyed in player-ID order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formations {
    grids: BTreeMap<PlayerId, FormationGrid>,
}

impl Formations {
    /// One empty grid per player.
    #[must_use]
    pub fn new<'a>(
        players: impl IntoIterator<Item = &'a PlayerId>,
        config: &FormationConfig,
    ) -> Self {
        Self {
            grids: players
                .into_iter()
                .map(|player| (player.clone(), FormationGrid::new(config.columns, config.rows)))
                .collect(),
        }
    }

    /// A player's grid.
    #[must_use]
    pub fn grid(&self, player: &PlayerId) -> Option<&FormationGrid> {
        self.grids.get(player)
    }

    /// A player's grid, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownPlayer`] for players without a grid.
    pub fn grid_mut(&mut self, player: &PlayerId) -> Result<&mut FormationGrid, CommandError> {
        self.grids
            .get_mut(player)
            .ok_or_else(|| CommandError::UnknownPlayer(player.to_string()))
    }

    /// Players whose grid holds units and has not deployed in `wave`.
    #[must_use]
    pub fn pending_for_wave(&self, wave: u32) -> Vec<PlayerId> {
        self.grids
            .iter()
            .filter(|(_, grid)| !grid.is_empty() && grid.deployed_wave() != Some(wave))
            .map(|(player, _)| player.clone())
            .collect()
    }
}

/// Turn deployed slots into spawn requests.
#[must_use]
pub fn spawn_requests(
    units: Vec<(Slot, UnitTypeId)>,
    config: &FormationConfig,
    map_depth: Fixed,
    team: Team,
    player: &PlayerId,
) -> Vec<SpawnRequest> {
    units
        .into_iter()
        .map(|(slot, unit_type)| SpawnRequest {
            unit_type,
            team,
            position: slot_position(config, map_depth, team, slot),
            player: player.clone(),
        })
        .collect()
}
