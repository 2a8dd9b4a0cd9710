//! Cross-run determinism of full matches.

use proptest::prelude::*;
use skirmish_core::catalog::UnitCatalog;
use skirmish_core::command::TickBatch;
use skirmish_core::replay::{Replay, ReplayPlayer};
use skirmish_test_utils::determinism::strategies::arb_tick_batches;
use skirmish_test_utils::determinism::{
    find_first_divergence, run_parallel_simulations_scoped, run_script, verify_determinism,
    verify_lockstep_determinism, verify_serialization_determinism,
};
use skirmish_test_utils::fixtures::{battle_script, blue, new_match, red, two_player_config};

#[test]
fn battle_hashes_match_across_runs() {
    let result = verify_determinism(
        3,
        300,
        new_match,
        |lockstep| {
            let tick = lockstep.last_processed_tick().unwrap_or(0) + 1;
            lockstep.process_tick(tick, &battle_script(tick));
        },
        |lockstep| lockstep.simulation().state_hash(),
    );
    result.assert_deterministic();
}

#[test]
fn scripted_lockstep_matches_agree() {
    assert!(verify_lockstep_determinism(new_match, battle_script, 400));
}

#[test]
fn battle_snapshots_match_across_runs() {
    let mut first = new_match();
    let mut second = new_match();
    for tick in 1..=250 {
        first.process_tick(tick, &battle_script(tick));
        second.process_tick(tick, &battle_script(tick));
        assert_eq!(first.snapshot(), second.snapshot(), "snapshots differ at tick {tick}");
    }
}

#[test]
fn parallel_battles_match() {
    run_parallel_simulations_scoped(new_match, battle_script, 6, 250).assert_deterministic();
}

#[test]
fn restored_snapshot_continues_identically() {
    let catalog = UnitCatalog::skirmish_default();
    for split in [1, 90, 200] {
        assert!(
            verify_serialization_determinism(new_match, battle_script, &catalog, split, 300),
            "resume from tick {split} diverged"
        );
    }
}

#[test]
fn recorded_battle_replays_to_same_hashes() {
    let mut lockstep = new_match();
    let mut replay = Replay::new(two_player_config(), UnitCatalog::skirmish_default());
    let mut live_hashes = Vec::new();
    for tick in 1..=200 {
        let batch = battle_script(tick);
        let report = lockstep.process_tick(tick, &batch).report().cloned().unwrap();
        live_hashes.push((tick, report.state_hash));
        replay.record(batch);
    }
    replay.finalize(200, lockstep.simulation().state_hash());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("battle.json");
    replay.save(&path).unwrap();

    let mut player = ReplayPlayer::new(Replay::load(&path).unwrap()).unwrap();
    assert_eq!(player.run_to_end(), live_hashes.as_slice());
    assert!(player.verify());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_random_streams_replay_identically(
        batches in arb_tick_batches(vec![red(), blue()], 40, 60, 16)
    ) {
        let script = |tick: u64| {
            if tick == 1 {
                // Seed the field so entity-targeting commands have something to act on.
                let mut seeded = battle_script(1);
                if let Some(extra) = batches.first() {
                    for player in &extra.players {
                        for envelope in &player.commands {
                            seeded.push(&player.player, envelope.clone());
                        }
                    }
                }
                return seeded;
            }
            batches
                .get(usize::try_from(tick - 1).unwrap())
                .cloned()
                .unwrap_or_else(|| TickBatch::new(tick))
        };

        prop_assert_eq!(find_first_divergence(new_match, &script, 40), None);

        let mut lockstep = new_match();
        let hashes = run_script(&mut lockstep, &script, 40);
        prop_assert_eq!(hashes.len(), 40);
    }
}
