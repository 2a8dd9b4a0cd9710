//! End-to-end tests driving matches through the lockstep executor.

use serde_json::json;
use skirmish_core::catalog::UnitCatalog;
use skirmish_core::combat::DeathEvent;
use skirmish_core::command::{Command, CommandEnvelope, TickBatch};
use skirmish_core::components::Team;
use skirmish_core::formation::Slot;
use skirmish_core::lockstep::{LockstepManager, TickOutcome};
use skirmish_core::movement::MovementEvent;
use skirmish_test_utils::determinism::run_script;
use skirmish_test_utils::fixtures::{
    battle_script, blue, ground, idle_script, new_match, red, spawn_unit, two_player_config,
};

fn place(unit_type: &str, column: u8, row: u8) -> Command {
    Command::PlaceUnit {
        unit_type: unit_type.into(),
        slot: Slot::new(column, row),
    }
}

#[test]
fn bogus_command_does_not_block_valid_move() {
    let mut lockstep = new_match();
    run_script(&mut lockstep, battle_script, 1);

    let player = red();
    let batch = TickBatch::new(2)
        .with(
            &player,
            CommandEnvelope::new("bogus", Some(player.clone()), json!({ "x": 1 })),
        )
        .with(
            &player,
            Command::Move {
                entity_ids: vec![1, 2],
                target: ground(-10, 30),
            }
            .to_envelope(&player),
        );

    let outcome = lockstep.process_tick(2, &batch);
    let report = outcome.report().expect("tick runs");
    assert_eq!(report.commands_rejected, 1);
    assert_eq!(report.commands_applied, 1);
    assert!(report.movement.contains(&MovementEvent::Started {
        entity: 1,
        target: ground(-10, 30)
    }));

    let unit = lockstep.simulation().entity(2).unwrap();
    assert_eq!(unit.movement().unwrap().target, Some(ground(-10, 30)));
}

#[test]
fn envelope_without_player_is_dropped() {
    let mut lockstep = new_match();
    let player = red();
    let mut envelope = place("infantry", 0, 0).to_envelope(&player);
    envelope.player_id = None;

    let outcome = lockstep.process_tick(1, &TickBatch::new(1).with(&player, envelope));
    assert_eq!(outcome.report().unwrap().commands_rejected, 1);
    assert_eq!(lockstep.simulation().resources().balance(&player), 200);
}

#[test]
fn duplicate_delivery_leaves_world_untouched() {
    let mut lockstep = new_match();
    run_script(&mut lockstep, battle_script, 20);
    let before = lockstep.snapshot();

    for tick in [1, 2, 20] {
        let outcome = lockstep.process_tick(tick, &battle_script(tick));
        assert!(matches!(outcome, TickOutcome::Duplicate { last_processed: 20, .. }));
    }
    assert_eq!(lockstep.snapshot(), before);
}

#[test]
fn units_cannot_be_ordered_by_the_other_team() {
    let mut lockstep = new_match();
    run_script(&mut lockstep, battle_script, 1);
    let start = lockstep.simulation().entity(6).unwrap().position;

    let player = red();
    let steal = Command::Move {
        entity_ids: vec![6],
        target: ground(0, 0),
    };
    let batch = TickBatch::new(2).with(&player, steal.to_envelope(&player));
    let outcome = lockstep.process_tick(2, &batch);
    assert!(outcome.report().unwrap().movement.is_empty());

    let unit = lockstep.simulation().entity(6).unwrap();
    assert_eq!(unit.movement().unwrap().target, None);
    assert_eq!(unit.position, start);
}

#[test]
fn second_deploy_in_same_wave_is_rejected() {
    let mut lockstep = new_match();
    let player = red();
    let batch = TickBatch::new(1)
        .with(&player, place("infantry", 0, 0).to_envelope(&player))
        .with(&player, Command::DeployUnits.to_envelope(&player))
        .with(&player, place("infantry", 1, 0).to_envelope(&player))
        .with(&player, Command::DeployUnits.to_envelope(&player));

    let outcome = lockstep.process_tick(1, &batch);
    let report = outcome.report().unwrap();
    assert_eq!(report.commands_applied, 3);
    assert_eq!(report.commands_rejected, 1);
    assert_eq!(report.spawned.len(), 1);

    // The second infantry waits in the grid for the next wave.
    let grid = lockstep.simulation().formations().grid(&player).unwrap();
    assert_eq!(grid.occupied(), vec![(Slot::new(1, 0), "infantry".to_string())]);
}

#[test]
fn wave_end_deploys_waiting_formations() {
    let mut config = two_player_config();
    config.waves.interval_ticks = 10;
    let mut lockstep =
        LockstepManager::with_catalog(config, UnitCatalog::skirmish_default()).unwrap();

    let player = blue();
    let batch = TickBatch::new(1).with(&player, place("archer", 2, 1).to_envelope(&player));
    lockstep.process_tick(1, &batch);

    let mut deployed = None;
    for tick in 2..=10 {
        if let TickOutcome::Processed(report) = lockstep.process_tick(tick, &idle_script(tick)) {
            if let Some(wave) = report.wave {
                deployed = Some((wave, report.spawned));
            }
        }
    }

    let (wave, spawned) = deployed.expect("wave 0 ends on tick 10");
    assert_eq!((wave.wave, wave.tick), (0, 10));
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].team, Team::Blue);
    assert_eq!(spawned[0].owner, player);
    assert_eq!(lockstep.simulation().waves().current(), 1);
    assert!(lockstep.simulation().formations().grid(&player).unwrap().is_empty());
}

#[test]
fn income_pays_out_on_interval() {
    let mut lockstep = new_match();
    let hashes = run_script(&mut lockstep, idle_script, 20);
    assert_eq!(hashes.len(), 20);

    // 10 base plus 2 for each of the four bands each team starts with.
    assert_eq!(lockstep.simulation().resources().balance(&red()), 218);
    assert_eq!(lockstep.simulation().resources().balance(&blue()), 218);
}

#[test]
fn battle_deals_damage_and_removes_the_dead() {
    let mut lockstep = new_match();
    let mut damage_events = 0;
    let mut removed = Vec::new();
    for tick in 1..=600 {
        if let TickOutcome::Processed(report) = lockstep.process_tick(tick, &battle_script(tick)) {
            damage_events += report.damage.len();
            removed.extend(report.removed);
        }
    }

    assert!(damage_events > 0, "armies never engaged");
    for id in removed {
        assert!(lockstep.simulation().entity(id).is_none());
        assert!(!lockstep.simulation().physics().has_body(id));
    }
}

#[test]
fn lethal_hit_starts_death_sequence_before_removal() {
    let mut lockstep = new_match();
    let victim = spawn_unit(&mut lockstep, "infantry", Team::Blue, ground(0, 40));
    let attacker = spawn_unit(&mut lockstep, "infantry", Team::Red, ground(0, 39));
    lockstep
        .simulation_mut()
        .registry_mut()
        .get_mut(victim)
        .unwrap()
        .health_mut()
        .unwrap()
        .current = 5;

    let report = lockstep
        .process_tick(1, &TickBatch::new(1))
        .report()
        .cloned()
        .unwrap();
    assert!(report
        .damage
        .iter()
        .any(|d| d.source == attacker && d.target == victim && d.lethal));
    assert!(report.deaths.contains(&DeathEvent::Dying { entity: victim, ticks: 10 }));
    assert!(lockstep.simulation().entity(victim).is_some());

    let mut destroyed_on = None;
    for tick in 2..=20 {
        let report = lockstep
            .process_tick(tick, &TickBatch::new(tick))
            .report()
            .cloned()
            .unwrap();
        if report.removed.contains(&victim) {
            destroyed_on = Some(tick);
            break;
        }
    }
    // A ten-tick sequence started on tick 1 ends on tick 11, not a tick sooner.
    assert_eq!(destroyed_on, Some(11));
    assert!(lockstep.simulation().entity(victim).is_none());
}

#[test]
fn skipped_ticks_still_end_waves_and_pay_income() {
    let mut config = two_player_config();
    config.waves.interval_ticks = 10;
    let mut lockstep =
        LockstepManager::with_catalog(config, UnitCatalog::skirmish_default()).unwrap();

    let player = blue();
    let batch = TickBatch::new(1).with(&player, place("archer", 2, 1).to_envelope(&player));
    lockstep.process_tick(1, &batch);

    // Ticks 10 and 20 never arrive.
    let mut waves = Vec::new();
    for tick in (2..=9).chain(11..=19).chain([21]) {
        if let TickOutcome::Processed(report) = lockstep.process_tick(tick, &idle_script(tick)) {
            if let Some(wave) = report.wave {
                waves.push((wave.wave, wave.tick, report.spawned.len()));
            }
        }
    }

    assert_eq!(waves, vec![(0, 11, 1), (1, 21, 0)]);
    assert_eq!(lockstep.simulation().waves().current(), 2);
    assert_eq!(lockstep.simulation().resources().balance(&red()), 218);
    assert_eq!(lockstep.simulation().resources().balance(&player), 203);
}

#[test]
fn move_beyond_the_world_is_rejected_without_panicking() {
    let mut lockstep = new_match();
    run_script(&mut lockstep, battle_script, 1);

    let player = red();
    let far = Command::Move {
        entity_ids: vec![1],
        target: ground(i32::MIN, 0),
    };
    let batch = TickBatch::new(2).with(&player, far.to_envelope(&player));
    let report = lockstep.process_tick(2, &batch).report().cloned().unwrap();

    assert_eq!(report.commands_rejected, 1);
    assert!(report.movement.is_empty());
    let unit = lockstep.simulation().entity(1).unwrap();
    assert_eq!(unit.movement().unwrap().target, None);
}
