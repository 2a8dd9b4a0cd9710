//! Test fixtures and helpers.
//!
//! Pre-built matches, unit spawners and command scripts for consistent
//! testing.

use fixed::types::I32F32;
use skirmish_core::catalog::UnitCatalog;
use skirmish_core::command::{Command, TickBatch};
use skirmish_core::components::{EntityId, PlayerId, Team};
use skirmish_core::config::MatchConfig;
use skirmish_core::formation::Slot;
use skirmish_core::lockstep::LockstepManager;
use skirmish_core::math::Vec3Fixed;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Ground-plane position at (`x`, 0, `z`).
#[must_use]
pub fn ground(x: i32, z: i32) -> Vec3Fixed {
    Vec3Fixed::from_ints(x, 0, z)
}

/// The Red player, `"red"`.
#[must_use]
pub fn red() -> PlayerId {
    PlayerId::new("red")
}

/// The Blue player, `"blue"`.
#[must_use]
pub fn blue() -> PlayerId {
    PlayerId::new("blue")
}

/// Default two-player config with `red` and `blue`.
#[must_use]
pub fn two_player_config() -> MatchConfig {
    MatchConfig::two_player("red", "blue")
}

/// A fresh match using the built-in unit catalog.
///
/// # Panics
///
/// Panics if the default config is invalid.
#[must_use]
pub fn new_match() -> LockstepManager {
    LockstepManager::with_catalog(two_player_config(), UnitCatalog::skirmish_default())
        .expect("default config is valid")
}

/// Spawn a catalog unit directly, bypassing formations.
///
/// # Panics
///
/// Panics if the unit type is not in the default catalog.
pub fn spawn_unit(
    lockstep: &mut LockstepManager,
    unit_type: &str,
    team: Team,
    position: Vec3Fixed,
) -> EntityId {
    let blueprint = UnitCatalog::skirmish_default()
        .get(unit_type)
        .unwrap_or_else(|| panic!("unknown unit type {unit_type}"))
        .blueprint();
    lockstep
        .simulation_mut()
        .spawn_unit(&blueprint, team, position, None)
        .expect("allocator IDs are unique")
}

/// A small battle driven purely by commands.
///
/// Tick 1: both players buy a front row of four infantry plus one ranged
/// unit and deploy. Red's units get IDs 1-5, Blue's 6-10. Tick 2: both
/// sides march toward each other and fight in the middle of the map.
#[must_use]
pub fn battle_script(tick: u64) -> TickBatch {
    let mut batch = TickBatch::new(tick);
    match tick {
        1 => {
            let sides = [(red(), "archer", 1), (blue(), "catapult", 2)];
            for (player, support, support_column) in sides {
                for column in 0..4 {
                    let place = Command::PlaceUnit {
                        unit_type: "infantry".into(),
                        slot: Slot::new(column, 0),
                    };
                    batch.push(&player, place.to_envelope(&player));
                }
                let place = Command::PlaceUnit {
                    unit_type: support.into(),
                    slot: Slot::new(support_column, 1),
                };
                batch.push(&player, place.to_envelope(&player));
                batch.push(&player, Command::DeployUnits.to_envelope(&player));
            }
        }
        2 => {
            let advance = Command::Move {
                entity_ids: (1..=5).collect(),
                target: ground(0, 60),
            };
            batch.push(&red(), advance.to_envelope(&red()));
            let advance = Command::Move {
                entity_ids: (6..=10).collect(),
                target: ground(0, 20),
            };
            batch.push(&blue(), advance.to_envelope(&blue()));
        }
        _ => {}
    }
    batch
}

/// A script that never issues commands.
#[must_use]
pub fn idle_script(tick: u64) -> TickBatch {
    TickBatch::new(tick)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battle_script_deploys_ten_units() {
        let mut lockstep = new_match();
        let outcome = lockstep.process_tick(1, &battle_script(1));
        let report = outcome.report().unwrap();
        assert_eq!(report.commands_rejected, 0);
        let ids: Vec<_> = report.spawned.iter().map(|s| s.id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
        assert!(report.spawned[..5].iter().all(|s| s.team == Team::Red));
    }
}
