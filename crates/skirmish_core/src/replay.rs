//! Replay system for recording and playing back matches.
//!
//! A replay stores the match config, the unit catalog and every tick batch
//! in order. Because the simulation is deterministic, re-executing the
//! batches reproduces the match exactly; the stored final hash verifies it.
//! Replays are JSON so command envelopes stay human-readable.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::UnitCatalog;
use crate::command::TickBatch;
use crate::config::MatchConfig;
use crate::error::{Result, SimError};
use crate::lockstep::{LockstepManager, TickOutcome};
use crate::simulation::{Simulation, TickReport};

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Match configuration.
    pub config: MatchConfig,
    /// Unit catalog the match used.
    pub catalog: UnitCatalog,
    /// Every processed batch, in tick order.
    pub batches: Vec<TickBatch>,
    /// Final tick when the recording ended.
    pub final_tick: u64,
    /// State hash after the final tick.
    pub final_hash: u64,
}

impl Replay {
    /// Start an empty recording.
    #[must_use]
    pub fn new(config: MatchConfig, catalog: UnitCatalog) -> Self {
        Self {
            version: REPLAY_VERSION,
            config,
            catalog,
            batches: Vec::new(),
            final_tick: 0,
            final_hash: 0,
        }
    }

    /// Record a batch that was processed.
    pub fn record(&mut self, batch: TickBatch) {
        self.batches.push(batch);
    }

    /// Finalize the replay with end state.
    pub fn finalize(&mut self, final_tick: u64, final_hash: u64) {
        self.final_tick = final_tick;
        self.final_hash = final_hash;
    }

    /// Number of recorded ticks.
    #[must_use]
    pub fn duration(&self) -> usize {
        self.batches.len()
    }

    /// Total number of recorded commands.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.batches.iter().map(TickBatch::len).sum()
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SimError::Serialization(format!("Failed to encode replay: {e}")))
    }

    /// Decode from JSON, rejecting unknown versions.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Serialization`] for bad JSON or versions.
    pub fn from_json(source: &str) -> Result<Self> {
        let replay: Self = serde_json::from_str(source)
            .map_err(|e| SimError::Serialization(format!("Failed to decode replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(SimError::Serialization(format!(
                "Unsupported replay version {} (expected {REPLAY_VERSION})",
                replay.version
            )));
        }
        Ok(replay)
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|e| SimError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or decoding fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| SimError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&source)
    }
}

/// Re-executes a replay.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    lockstep: LockstepManager,
    next_batch: usize,
    hashes: Vec<(u64, u64)>,
}

impl ReplayPlayer {
    /// Prepare a fresh match from the replay's config and catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored config is invalid.
    pub fn new(replay: Replay) -> Result<Self> {
        let lockstep =
            LockstepManager::with_catalog(replay.config.clone(), replay.catalog.clone())?;
        Ok(Self {
            replay,
            lockstep,
            next_batch: 0,
            hashes: Vec::new(),
        })
    }

    /// Process the next batch. Returns `None` once the replay is exhausted.
    ///
    /// Stale or duplicate batches are skipped.
    pub fn advance(&mut self) -> Option<TickReport> {
        loop {
            let batch = self.replay.batches.get(self.next_batch)?;
            self.next_batch += 1;
            match self.lockstep.process_tick(batch.tick, batch) {
                TickOutcome::Processed(report) => {
                    self.hashes.push((report.tick, report.state_hash));
                    return Some(report);
                }
                TickOutcome::Duplicate { tick, .. } => {
                    tracing::warn!(tick, "Replay contains a duplicate tick");
                }
            }
        }
    }

    /// Play every remaining batch; returns `(tick, hash)` for each.
    pub fn run_to_end(&mut self) -> &[(u64, u64)] {
        while self.advance().is_some() {}
        &self.hashes
    }

    /// Play to the end and compare with the recorded final hash.
    pub fn verify(&mut self) -> bool {
        self.run_to_end();
        let tick = self.lockstep.simulation().tick();
        let hash = self.lockstep.simulation().state_hash();
        tick == self.replay.final_tick && hash == self.replay.final_hash
    }

    /// Whether every batch has been processed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.next_batch >= self.replay.batches.len()
    }

    /// Last processed tick.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.lockstep.simulation().tick()
    }

    /// Simulation state.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        self.lockstep.simulation()
    }

    /// The replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Hashes of processed ticks so far.
    #[must_use]
    pub fn hashes(&self) -> &[(u64, u64)] {
        &self.hashes
    }

    /// Playback progress, 0-100.
    #[must_use]
    pub fn progress_percent(&self) -> u32 {
        let total = self.replay.batches.len();
        if total == 0 {
            return 100;
        }
        u32::try_from(self.next_batch * 100 / total).unwrap_or(100)
    }
}
