//! Lockstep tick executor.
//!
//! The network layer hands [`LockstepManager::process_tick`] a complete
//! [`TickBatch`] for tick N. The manager applies every command in batch
//! order, runs exactly one simulation step, and returns a [`TickReport`].
//! Malformed or unauthorised commands are logged and dropped; nothing
//! escapes a tick as an error.
//!
//! Ticks must increase. A tick at or below the last processed one is a
//! duplicate delivery and leaves the world untouched.

use crate::catalog::{EntityFactory, UnitCatalog};
use crate::command::{Command, TickBatch};
use crate::config::MatchConfig;
use crate::error::{Result, SimError};
use crate::simulation::{Simulation, TickReport, WorldSnapshot};

/// Executor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Waiting for the next batch.
    Idle,
    /// Inside `process_tick` for this tick.
    ExecutingTick(u64),
}

/// Result of handing a batch to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick ran.
    Processed(TickReport),
    /// The tick was already processed; nothing changed.
    Duplicate {
        /// Tick that was delivered.
        tick: u64,
        /// Highest tick processed so far.
        last_processed: u64,
    },
}

impl TickOutcome {
    /// The report, if the tick ran.
    #[must_use]
    pub fn report(&self) -> Option<&TickReport> {
        match self {
            TickOutcome::Processed(report) => Some(report),
            TickOutcome::Duplicate { .. } => None,
        }
    }
}

/// Owns the simulation and drives it one tick at a time.
pub struct LockstepManager {
    simulation: Simulation,
    factory: Box<dyn EntityFactory>,
    last_processed: Option<u64>,
    state: ExecutorState,
}

impl std::fmt::Debug for LockstepManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockstepManager")
            .field("tick", &self.simulation.tick())
            .field("last_processed", &self.last_processed)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl LockstepManager {
    /// Start a new match.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn new(config: MatchConfig, factory: Box<dyn EntityFactory>) -> Result<Self> {
        let simulation = Simulation::new(config)?;
        tracing::info!(
            players = simulation.config().players.len(),
            tick_rate = simulation.config().tick_rate,
            "Match started"
        );
        Ok(Self::from_simulation(simulation, factory, None))
    }

    /// Start a new match using a unit catalog as the factory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn with_catalog(config: MatchConfig, catalog: UnitCatalog) -> Result<Self> {
        Self::new(config, Box::new(catalog))
    }

    /// Resume from a restored simulation.
    #[must_use]
    pub fn from_simulation(
        simulation: Simulation,
        factory: Box<dyn EntityFactory>,
        last_processed: Option<u64>,
    ) -> Self {
        Self {
            simulation,
            factory,
            last_processed,
            state: ExecutorState::Idle,
        }
    }

    /// The simulation, read-only.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Mutable simulation access for match setup before the first tick.
    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.simulation
    }

    /// Highest processed tick.
    #[must_use]
    pub const fn last_processed_tick(&self) -> Option<u64> {
        self.last_processed
    }

    /// Current executor state.
    #[must_use]
    pub const fn state(&self) -> ExecutorState {
        self.state
    }

    /// Read-only world view after the last tick.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        self.simulation.snapshot()
    }

    /// Process the batch for `tick`.
    ///
    /// 1. Flatten every player's commands in batch order
    /// 2. Decode and execute each; rejects are logged and dropped
    /// 3. One simulation step (physics → arrivals → combat → projectiles →
    ///    territory → damage and deaths)
    /// 4. Tick-indexed systems (resources, waves)
    /// 5. Sweep destroyed entities
    pub fn process_tick(&mut self, tick: u64, batch: &TickBatch) -> TickOutcome {
        if let Some(last) = self.last_processed {
            if tick <= last {
                tracing::debug!(tick, last_processed = last, "Duplicate tick ignored");
                return TickOutcome::Duplicate {
                    tick,
                    last_processed: last,
                };
            }
            if tick > last + 1 {
                tracing::warn!(tick, last_processed = last, "Tick gap; skipped ticks never run");
            }
        }
        if batch.tick != tick {
            tracing::warn!(tick, batch_tick = batch.tick, "Batch labelled with a different tick");
        }

        self.state = ExecutorState::ExecutingTick(tick);
        self.simulation.begin_tick(tick);
        let mut report = TickReport::new(tick);
        let factory = self.factory.as_ref();

        for envelope in batch.flatten() {
            let result = Command::parse(envelope).and_then(|(player, command)| {
                self.simulation
                    .apply_command(factory, &player, command, &mut report)
            });
            match result {
                Ok(()) => report.commands_applied += 1,
                Err(error) => {
                    report.commands_rejected += 1;
                    tracing::warn!(
                        tick,
                        command = %envelope.kind,
                        player = ?envelope.player_id,
                        %error,
                        "Dropping command"
                    );
                }
            }
        }

        self.simulation.run_systems(&mut report);
        self.simulation.run_tick_systems(factory, &mut report);
        self.simulation.sweep(&mut report);

        report.state_hash = self.simulation.state_hash();
        tracing::debug!(tick, state_hash = report.state_hash, "Tick processed");

        self.last_processed = Some(tick);
        self.state = ExecutorState::Idle;
        TickOutcome::Processed(report)
    }

    /// Compare a peer's hash for the last processed tick with ours.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DesyncDetected`] on mismatch.
    pub fn check_remote_hash(&self, remote_hash: u64) -> Result<()> {
        let local_hash = self.simulation.state_hash();
        if local_hash == remote_hash {
            return Ok(());
        }
        let tick = self.simulation.tick();
        tracing::error!(tick, local_hash, remote_hash, "Desync detected");
        Err(SimError::DesyncDetected {
            tick,
            local_hash,
            remote_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandEnvelope;
    use crate::components::{PlayerId, Team};
    use crate::math::Vec3Fixed;
    use serde_json::json;

    fn manager() -> LockstepManager {
        LockstepManager::with_catalog(
            MatchConfig::two_player("red", "blue"),
            UnitCatalog::skirmish_default(),
        )
        .unwrap()
    }

    #[test]
    fn test_ticks_advance_and_state_returns_to_idle() {
        let mut lockstep = manager();
        let outcome = lockstep.process_tick(1, &TickBatch::new(1));
        assert_eq!(outcome.report().unwrap().tick, 1);
        assert_eq!(lockstep.last_processed_tick(), Some(1));
        assert_eq!(lockstep.state(), ExecutorState::Idle);
    }

    #[test]
    fn test_duplicate_tick_is_noop() {
        let mut lockstep = manager();
        let red = PlayerId::new("red");
        let batch = TickBatch::new(1).with(
            &red,
            Command::PlaceUnit {
                unit_type: "infantry".into(),
                slot: crate::formation::Slot::new(0, 0),
            }
            .to_envelope(&red),
        );
        lockstep.process_tick(1, &batch);
        let hash = lockstep.simulation().state_hash();

        let again = lockstep.process_tick(1, &batch);
        assert_eq!(
            again,
            TickOutcome::Duplicate {
                tick: 1,
                last_processed: 1
            }
        );
        assert_eq!(lockstep.simulation().state_hash(), hash);
        assert_eq!(lockstep.simulation().resources().balance(&red), 190);
    }

    #[test]
    fn test_bad_command_does_not_block_batch() {
        let mut lockstep = manager();
        let catalog = UnitCatalog::skirmish_default();
        let blueprint = catalog.get("infantry").unwrap().blueprint();
        let unit = lockstep
            .simulation_mut()
            .spawn_unit(&blueprint, Team::Red, Vec3Fixed::ZERO, None)
            .unwrap();

        let red = PlayerId::new("red");
        let batch = TickBatch::new(1)
            .with(&red, CommandEnvelope::new("bogus", Some(red.clone()), json!({})))
            .with(
                &red,
                CommandEnvelope::new(
                    "move",
                    Some(red.clone()),
                    json!({ "entityIds": [unit], "target": { "x": 10.0, "z": 0.0 } }),
                ),
            );

        let outcome = lockstep.process_tick(1, &batch);
        let report = outcome.report().unwrap();
        assert_eq!(report.commands_rejected, 1);
        assert_eq!(report.commands_applied, 1);
        let entity = lockstep.simulation().entity(unit).unwrap();
        assert!(entity.movement().unwrap().moving);
        assert!(entity.position.x > Vec3Fixed::ZERO.x);
    }

    #[test]
    fn test_remote_hash_mismatch_is_desync() {
        let mut lockstep = manager();
        lockstep.process_tick(1, &TickBatch::new(1));
        let hash = lockstep.simulation().state_hash();
        assert!(lockstep.check_remote_hash(hash).is_ok());
        assert!(matches!(
            lockstep.check_remote_hash(hash ^ 1),
            Err(SimError::DesyncDetected { tick: 1, .. })
        ));
    }
}
