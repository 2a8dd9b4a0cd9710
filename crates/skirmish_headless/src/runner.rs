//! Replay execution, parallel verification and demo recording.
//!
//! Everything here is driven by [`Replay`] files: `run` streams one JSON
//! line per tick, `verify` re-executes the same replay on several rayon
//! workers and compares the hash sequences, and `record` produces a replay
//! from the built-in demo skirmish.

use std::io::Write;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use skirmish_core::catalog::UnitCatalog;
use skirmish_core::command::{Command, TickBatch};
use skirmish_core::components::PlayerId;
use skirmish_core::config::MatchConfig;
use skirmish_core::error::SimError;
use skirmish_core::formation::Slot;
use skirmish_core::lockstep::LockstepManager;
use skirmish_core::math::Vec3Fixed;
use skirmish_core::replay::{Replay, ReplayPlayer};
use skirmish_core::simulation::TickReport;

/// Error type for runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The simulation rejected the replay.
    #[error(transparent)]
    Sim(#[from] SimError),
    /// Writing output failed.
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    /// Encoding a tick line failed.
    #[error("Failed to encode tick line: {0}")]
    Encode(#[from] serde_json::Error),
    /// Verification needs at least one run.
    #[error("Verification needs at least one run")]
    NoRuns,
}

/// One line of `run` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickLine {
    /// Processed tick.
    pub tick: u64,
    /// State hash after the tick.
    pub state_hash: u64,
    /// Commands executed.
    pub commands_applied: usize,
    /// Commands dropped.
    pub commands_rejected: usize,
    /// Units spawned this tick.
    pub spawned: usize,
    /// Damage applications.
    pub damage: usize,
    /// Death events (dying or destroyed).
    pub deaths: usize,
    /// Entities removed by the sweep.
    pub removed: usize,
    /// Wave that ended this tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave: Option<u32>,
}

impl From<&TickReport> for TickLine {
    fn from(report: &TickReport) -> Self {
        Self {
            tick: report.tick,
            state_hash: report.state_hash,
            commands_applied: report.commands_applied,
            commands_rejected: report.commands_rejected,
            spawned: report.spawned.len(),
            damage: report.damage.len(),
            deaths: report.deaths.len(),
            removed: report.removed.len(),
            wave: report.wave.map(|trigger| trigger.wave),
        }
    }
}

/// Result of playing a replay to the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Ticks processed.
    pub ticks: usize,
    /// Last processed tick.
    pub final_tick: u64,
    /// State hash after the last tick.
    pub final_hash: u64,
    /// Whether the final tick and hash match the recording.
    pub matches_recording: bool,
}

/// Execute `replay`, writing one [`TickLine`] JSON object per tick to `out`.
///
/// # Errors
///
/// Returns an error if the replay config is invalid or writing fails.
pub fn run_replay<W: Write>(replay: Replay, out: &mut W) -> Result<RunSummary, RunnerError> {
    let expected_tick = replay.final_tick;
    let expected_hash = replay.final_hash;
    tracing::info!(
        ticks = replay.duration(),
        commands = replay.command_count(),
        "Playing replay"
    );

    let mut player = ReplayPlayer::new(replay)?;
    let mut ticks = 0;
    while let Some(report) = player.advance() {
        serde_json::to_writer(&mut *out, &TickLine::from(&report))?;
        out.write_all(b"\n")?;
        ticks += 1;
    }
    out.flush()?;

    let final_tick = player.current_tick();
    let final_hash = player.simulation().state_hash();
    let matches_recording = final_tick == expected_tick && final_hash == expected_hash;
    if !matches_recording {
        tracing::warn!(
            final_tick,
            expected_tick,
            final_hash,
            expected_hash,
            "Replay ended in a different state than recorded"
        );
    }

    Ok(RunSummary {
        ticks,
        final_tick,
        final_hash,
        matches_recording,
    })
}

/// `(tick, hash)` for every tick of one replay execution.
///
/// # Errors
///
/// Returns an error if the replay config is invalid.
pub fn hash_sequence(replay: &Replay) -> Result<Vec<(u64, u64)>, RunnerError> {
    let mut player = ReplayPlayer::new(replay.clone())?;
    Ok(player.run_to_end().to_vec())
}

/// Outcome of [`verify_replay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Executions compared.
    pub runs: usize,
    /// Whether every execution produced the same hash sequence.
    pub deterministic: bool,
    /// First tick where some execution disagreed with the first one.
    pub first_divergence: Option<u64>,
    /// Final hash of each execution.
    pub final_hashes: Vec<u64>,
    /// Whether the executions agree with the recorded final hash.
    pub matches_recording: bool,
}

impl VerifyReport {
    /// Deterministic and consistent with the recording.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.deterministic && self.matches_recording
    }
}

/// Execute `replay` `runs` times in parallel and compare the hash sequences.
///
/// # Errors
///
/// Returns an error if `runs` is zero or the replay config is invalid.
pub fn verify_replay(replay: &Replay, runs: usize) -> Result<VerifyReport, RunnerError> {
    if runs == 0 {
        return Err(RunnerError::NoRuns);
    }

    let sequences = (0..runs)
        .into_par_iter()
        .map(|_| hash_sequence(replay))
        .collect::<Result<Vec<_>, _>>()?;

    let reference = &sequences[0];
    let first_divergence = sequences[1..]
        .iter()
        .filter_map(|sequence| divergence(reference, sequence))
        .min();
    let final_hashes: Vec<u64> = sequences
        .iter()
        .map(|sequence| sequence.last().map_or(0, |&(_, hash)| hash))
        .collect();
    let matches_recording = sequences.iter().all(|sequence| {
        sequence
            .last()
            .is_some_and(|&(tick, hash)| tick == replay.final_tick && hash == replay.final_hash)
    });

    let report = VerifyReport {
        runs,
        deterministic: first_divergence.is_none(),
        first_divergence,
        final_hashes,
        matches_recording,
    };
    if let Some(tick) = report.first_divergence {
        tracing::error!(tick, "Replay executions diverged");
    }
    Ok(report)
}

fn divergence(reference: &[(u64, u64)], other: &[(u64, u64)]) -> Option<u64> {
    let mismatch = reference
        .iter()
        .zip(other)
        .find(|(a, b)| a != b)
        .map(|(a, _)| a.0);
    mismatch.or_else(|| {
        // Same prefix but different lengths: diverged right after the shorter one.
        let shorter = reference.len().min(other.len());
        (reference.len() != other.len()).then(|| {
            reference
                .get(shorter)
                .or_else(|| other.get(shorter))
                .map_or(0, |&(tick, _)| tick)
        })
    })
}

/// Red seat in the demo skirmish.
pub const DEMO_RED: &str = "red";
/// Blue seat in the demo skirmish.
pub const DEMO_BLUE: &str = "blue";

fn place(player: &PlayerId, batch: &mut TickBatch, unit_type: &str, column: u8, row: u8) {
    let command = Command::PlaceUnit {
        unit_type: unit_type.into(),
        slot: Slot::new(column, row),
    };
    batch.push(player, command.to_envelope(player));
}

/// The scripted demo skirmish: commands for `tick`.
///
/// Tick 1 both sides buy and deploy an opening army (Red gets IDs 1-6,
/// Blue 7-12), tick 2 both advance, and at tick 200 both queue a second
/// formation. Both grids already deployed during wave 0, so the second
/// formation goes out automatically when wave 1 ends.
#[must_use]
pub fn demo_batch(tick: u64) -> TickBatch {
    let red = PlayerId::new(DEMO_RED);
    let blue = PlayerId::new(DEMO_BLUE);
    let mut batch = TickBatch::new(tick);
    match tick {
        1 => {
            for column in 0..4 {
                place(&red, &mut batch, "infantry", column, 0);
            }
            place(&red, &mut batch, "archer", 1, 1);
            place(&red, &mut batch, "archer", 2, 1);
            batch.push(&red, Command::DeployUnits.to_envelope(&red));

            for column in 0..4 {
                place(&blue, &mut batch, "infantry", column, 0);
            }
            place(&blue, &mut batch, "catapult", 2, 1);
            place(&blue, &mut batch, "archer", 3, 1);
            batch.push(&blue, Command::DeployUnits.to_envelope(&blue));
        }
        2 => {
            let advance = Command::Move {
                entity_ids: (1..=6).collect(),
                target: Vec3Fixed::from_ints(0, 0, 55),
            };
            batch.push(&red, advance.to_envelope(&red));
            let advance = Command::Move {
                entity_ids: (7..=12).collect(),
                target: Vec3Fixed::from_ints(0, 0, 25),
            };
            batch.push(&blue, advance.to_envelope(&blue));
        }
        200 => {
            place(&red, &mut batch, "barricade", 2, 0);
            place(&red, &mut batch, "infantry", 0, 1);
            place(&red, &mut batch, "infantry", 1, 1);
            place(&blue, &mut batch, "catapult", 1, 1);
            place(&blue, &mut batch, "infantry", 0, 0);
            place(&blue, &mut batch, "infantry", 1, 0);
        }
        _ => {}
    }
    batch
}

/// Play the demo skirmish for `ticks` ticks and return the recording.
///
/// # Errors
///
/// Returns an error if the default config fails validation.
pub fn record_demo(ticks: u64) -> Result<Replay, RunnerError> {
    let config = MatchConfig::two_player(DEMO_RED, DEMO_BLUE);
    let catalog = UnitCatalog::skirmish_default();
    let mut lockstep = LockstepManager::with_catalog(config.clone(), catalog.clone())?;
    let mut replay = Replay::new(config, catalog);

    for tick in 1..=ticks {
        let batch = demo_batch(tick);
        lockstep.process_tick(tick, &batch);
        replay.record(batch);
    }
    replay.finalize(lockstep.simulation().tick(), lockstep.simulation().state_hash());
    tracing::info!(
        ticks,
        commands = replay.command_count(),
        final_hash = replay.final_hash,
        "Recorded demo skirmish"
    );
    Ok(replay)
}
