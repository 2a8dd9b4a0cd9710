//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Lockstep peers only exchange commands, so every peer must reach the
//! same state from the same batches. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`skirmish_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Queries and systems always walk entities in sorted ID order.
//!
//! - **Command order**: Commands are applied in batch order, never in
//!   arrival or hash order.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (physics, combat, etc.)
//! 2. **Property tests**: Random command streams still produce identical hashes
//! 3. **Integration tests**: Scripted matches are reproducible
//! 4. **Parallel tests**: Running N matches on N threads all match

use std::thread;

use skirmish_core::catalog::UnitCatalog;
use skirmish_core::command::TickBatch;
use skirmish_core::lockstep::{LockstepManager, TickOutcome};
use skirmish_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use skirmish_test_utils::determinism::verify_determinism;
/// use skirmish_test_utils::fixtures::{battle_script, new_match};
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     100, // 100 ticks each
///     new_match,
///     |lockstep| {
///         let tick = lockstep.simulation().tick() + 1;
///         lockstep.process_tick(tick, &battle_script(tick));
///     },
///     |lockstep| lockstep.simulation().state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Feed ticks `1..=num_ticks` from `script` into a match.
///
/// Returns the state hash reported for every processed tick.
pub fn run_script<Script>(
    lockstep: &mut LockstepManager,
    script: Script,
    num_ticks: u64,
) -> Vec<u64>
where
    Script: Fn(u64) -> TickBatch,
{
    let start = lockstep.last_processed_tick().unwrap_or(0) + 1;
    (start..=num_ticks)
        .filter_map(|tick| match lockstep.process_tick(tick, &script(tick)) {
            TickOutcome::Processed(report) => Some(report.state_hash),
            TickOutcome::Duplicate { .. } => None,
        })
        .collect()
}

/// Run a scripted match twice and compare the final state hashes.
///
/// # Example
///
/// ```ignore
/// use skirmish_test_utils::determinism::verify_lockstep_determinism;
/// use skirmish_test_utils::fixtures::{battle_script, new_match};
///
/// assert!(verify_lockstep_determinism(new_match, battle_script, 100));
/// ```
pub fn verify_lockstep_determinism<Setup, Script>(
    setup_fn: Setup,
    script: Script,
    num_ticks: u64,
) -> bool
where
    Setup: Fn() -> LockstepManager,
    Script: Fn(u64) -> TickBatch,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |lockstep| {
            let tick = lockstep.last_processed_tick().unwrap_or(0) + 1;
            lockstep.process_tick(tick, &script(tick));
        },
        |lockstep| lockstep.simulation().state_hash(),
    );
    result.is_deterministic
}

/// Run N scripted matches on scoped threads and collect final hashes.
///
/// This is useful for catching non-determinism that only manifests
/// under thread scheduling variations, memory layout differences, etc.
///
/// # Arguments
///
/// * `setup_fn` - Creates a fresh match (must be thread-safe)
/// * `script` - Batch for each tick
/// * `num_sims` - Number of parallel simulations to run
/// * `num_ticks` - Number of ticks to run each simulation
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations_scoped<Setup, Script>(
    setup_fn: Setup,
    script: Script,
    num_sims: usize,
    num_ticks: u64,
) -> ParallelSimResult
where
    Setup: Fn() -> LockstepManager + Sync,
    Script: Fn(u64) -> TickBatch + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut lockstep = setup_fn();
                    run_script(&mut lockstep, &script, num_ticks);
                    lockstep.simulation().state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two scripted runs tick-by-tick, finding first divergence.
///
/// Useful for debugging non-determinism by finding exactly when
/// simulations start to differ.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<Setup, Script>(
    setup_fn: Setup,
    script: Script,
    num_ticks: u64,
) -> Option<u64>
where
    Setup: Fn() -> LockstepManager,
    Script: Fn(u64) -> TickBatch,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    // Check initial state
    if first.simulation().state_hash() != second.simulation().state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        let batch = script(tick);
        first.process_tick(tick, &batch);
        second.process_tick(tick, &batch);

        if first.simulation().state_hash() != second.simulation().state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot taken mid-match resumes identically.
///
/// Runs `split_tick` ticks, serializes the simulation, restores it into a
/// second manager, then runs both to `num_ticks` and compares hashes. This
/// is the late-join and save/load path.
pub fn verify_serialization_determinism<Setup, Script>(
    setup_fn: Setup,
    script: Script,
    catalog: &UnitCatalog,
    split_tick: u64,
    num_ticks: u64,
) -> bool
where
    Setup: Fn() -> LockstepManager,
    Script: Fn(u64) -> TickBatch,
{
    let mut original = setup_fn();
    run_script(&mut original, &script, split_tick);

    let hash_before = original.simulation().state_hash();

    let Ok(bytes) = original.simulation().serialize() else {
        return false;
    };
    let Ok(restored) = Simulation::deserialize(&bytes) else {
        return false;
    };

    if restored.state_hash() != hash_before {
        return false;
    }

    let mut resumed = LockstepManager::from_simulation(
        restored,
        Box::new(catalog.clone()),
        original.last_processed_tick(),
    );

    let original_hashes = run_script(&mut original, &script, num_ticks);
    let resumed_hashes = run_script(&mut resumed, &script, num_ticks);
    original_hashes == resumed_hashes
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible command streams for
/// property-based testing of simulation determinism.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::command::{Command, TickBatch};
    use skirmish_core::components::{EntityId, PlayerId};
    use skirmish_core::formation::Slot;
    use skirmish_core::math::{Fixed, Vec3Fixed};

    /// Unit types in the default catalog.
    pub const UNIT_TYPES: [&str; 4] = ["infantry", "archer", "catapult", "barricade"];

    /// Generate a fixed-point X coordinate across the default map width.
    pub fn arb_fixed_x() -> impl Strategy<Value = Fixed> {
        (-40i32..=40i32).prop_map(Fixed::from_num)
    }

    /// Generate a fixed-point Z coordinate along the default map depth.
    pub fn arb_fixed_z() -> impl Strategy<Value = Fixed> {
        (0i32..=80i32).prop_map(Fixed::from_num)
    }

    /// Generate a ground-plane world position.
    pub fn arb_world_position() -> impl Strategy<Value = Vec3Fixed> {
        (arb_fixed_x(), arb_fixed_z()).prop_map(|(x, z)| Vec3Fixed::new(x, Fixed::ZERO, z))
    }

    /// Generate a formation slot, sometimes outside the default 6x4 grid.
    pub fn arb_slot() -> impl Strategy<Value = Slot> {
        (0u8..8u8, 0u8..5u8).prop_map(|(column, row)| Slot::new(column, row))
    }

    /// Generate a set of entity IDs up to `max_entity`.
    pub fn arb_entity_ids(max_entity: EntityId) -> impl Strategy<Value = Vec<EntityId>> {
        proptest::collection::vec(1..=max_entity, 1..6)
    }

    /// Generate a move order.
    pub fn arb_move_command(max_entity: EntityId) -> impl Strategy<Value = Command> {
        (arb_entity_ids(max_entity), arb_world_position())
            .prop_map(|(entity_ids, target)| Command::Move { entity_ids, target })
    }

    /// Generate a formation edit or deploy.
    pub fn arb_formation_command() -> impl Strategy<Value = Command> {
        prop_oneof![
            3 => (proptest::sample::select(UNIT_TYPES.to_vec()), arb_slot()).prop_map(
                |(unit_type, slot)| Command::PlaceUnit {
                    unit_type: unit_type.into(),
                    slot,
                }
            ),
            1 => (arb_slot(), arb_slot()).prop_map(|(from, to)| Command::MoveGridUnit { from, to }),
            1 => arb_slot().prop_map(|slot| Command::RemoveGridUnit { slot }),
            1 => Just(Command::DeployUnits),
        ]
    }

    /// Generate any command, referencing entities up to `max_entity`.
    pub fn arb_command(max_entity: EntityId) -> impl Strategy<Value = Command> {
        prop_oneof![
            3 => arb_move_command(max_entity),
            1 => arb_entity_ids(max_entity).prop_map(|entity_ids| Command::Stop { entity_ids }),
            3 => arb_formation_command(),
        ]
    }

    /// Generate a sequence of commands.
    pub fn arb_command_sequence(
        max_len: usize,
        max_entity: EntityId,
    ) -> impl Strategy<Value = Vec<Command>> {
        proptest::collection::vec(arb_command(max_entity), 0..max_len)
    }

    /// Generate batches for ticks `1..=ticks` issued by `players`.
    ///
    /// Each command lands on a random tick and is issued by a random player.
    pub fn arb_tick_batches(
        players: Vec<PlayerId>,
        ticks: u64,
        max_commands: usize,
        max_entity: EntityId,
    ) -> impl Strategy<Value = Vec<TickBatch>> {
        let seats = players.len().max(1);
        let order = (1..=ticks, 0..seats, arb_command(max_entity));
        proptest::collection::vec(order, 0..max_commands).prop_map(move |orders| {
            (1..=ticks)
                .map(|tick| {
                    let mut batch = TickBatch::new(tick);
                    for (_, seat, command) in orders.iter().filter(|(t, _, _)| *t == tick) {
                        if let Some(player) = players.get(*seat) {
                            batch.push(player, command.to_envelope(player));
                        }
                    }
                    batch
                })
                .collect()
        })
    }
}
