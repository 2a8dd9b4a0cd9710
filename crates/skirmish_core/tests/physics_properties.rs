//! Property tests for the registry and collision resolution.

use proptest::prelude::*;
use skirmish_core::components::{Attack, ComponentKind, Health, Movement, Team};
use skirmish_core::config::PhysicsConfig;
use skirmish_core::math::{Fixed, Vec3Fixed};
use skirmish_core::physics::{PhysicsEngine, PhysicsReport};
use skirmish_core::registry::{Entity, Registry};
use skirmish_test_utils::fixtures::{fixed, fixed_f};

fn quarter(n: i32) -> Fixed {
    Fixed::from_num(n) / 4
}

proptest! {
    #[test]
    fn prop_queries_are_sorted_and_exact(
        specs in proptest::collection::btree_map(
            1u64..500,
            (any::<bool>(), any::<bool>(), any::<bool>()),
            0..40,
        ),
        kill in proptest::collection::vec(1u64..500, 0..10),
    ) {
        let mut registry = Registry::new();
        // IDs must be added in ascending order; hashed storage scrambles them.
        for (&id, &(team, health, movement)) in &specs {
            let mut entity = Entity::new(id, Vec3Fixed::ZERO);
            if team {
                entity = entity.with_team(Team::Red);
            }
            if health {
                entity = entity.with_health(Health::new(10));
            }
            if movement {
                entity = entity.with_movement(Movement::new(fixed(1)));
            }
            registry.add(entity).unwrap();
        }
        for id in &kill {
            registry.destroy(*id);
        }

        let kinds = [ComponentKind::Team, ComponentKind::Health];
        let all = registry.query_all(&kinds);
        let any = registry.query_any(&[ComponentKind::Health, ComponentKind::Movement]);

        prop_assert!(all.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(any.windows(2).all(|w| w[0] < w[1]));

        let expected_all: Vec<u64> = registry
            .live_ids()
            .into_iter()
            .filter(|id| {
                let entity = registry.get(*id).unwrap();
                kinds.iter().all(|kind| entity.has(*kind))
            })
            .collect();
        prop_assert_eq!(all, expected_all);
        prop_assert!(any.iter().all(|id| !kill.contains(id)));
        prop_assert!(registry.query_all(&[ComponentKind::Attack]).is_empty());
    }

    #[test]
    fn prop_one_substep_separates_overlapping_bodies(
        dx in -8i32..=8,
        dz in -8i32..=8,
        radius_a in 2i32..=8,
        radius_b in 2i32..=8,
        mass_a in 1i32..=5,
        mass_b in 1i32..=5,
    ) {
        let offset_x = fixed(dx) / 8;
        let offset_z = fixed(dz) / 8;
        let ra = quarter(radius_a);
        let rb = quarter(radius_b);
        let reach = ra + rb;
        prop_assume!(offset_x * offset_x + offset_z * offset_z < reach * reach);

        let mut registry = Registry::new();
        registry.add(Entity::new(1, Vec3Fixed::ZERO).with_team(Team::Red)).unwrap();
        let offset = Vec3Fixed::new(offset_x, Fixed::ZERO, offset_z);
        registry.add(Entity::new(2, offset).with_team(Team::Blue)).unwrap();

        let mut physics = PhysicsEngine::new(PhysicsConfig::default(), fixed_f(0.0125));
        physics.register_body(1, ra, fixed(mass_a), false);
        physics.register_body(2, rb, fixed(mass_b), false);

        let mut report = PhysicsReport::default();
        physics.substep(&mut registry, &mut report);

        let a = registry.get(1).unwrap().position;
        let b = registry.get(2).unwrap().position;
        let distance = a.planar().distance_squared(b.planar());
        let min = reach - fixed_f(0.001);
        prop_assert!(distance >= min * min, "bodies still overlap: {a:?} {b:?}");
        prop_assert_eq!(report.contacts, vec![(1, 2)]);
    }

    #[test]
    fn prop_static_bodies_never_move(
        dx in -4i32..=4,
        mass in 1i32..=20,
        speed in 1i32..=10,
    ) {
        let mut registry = Registry::new();
        let wall = Vec3Fixed::from_ints(0, 0, 5);
        registry.add(Entity::new(1, wall).with_team(Team::Red)).unwrap();
        let mut runner = Movement::new(fixed(speed));
        runner.target = Some(Vec3Fixed::from_ints(0, 0, 10));
        runner.moving = true;
        registry
            .add(Entity::new(2, Vec3Fixed::new(fixed(dx) / 4, Fixed::ZERO, Fixed::ZERO))
                .with_team(Team::Blue)
                .with_movement(runner))
            .unwrap();

        let mut physics = PhysicsEngine::new(PhysicsConfig::default(), fixed_f(0.0125));
        physics.register_body(1, fixed(1), fixed(mass), true);
        physics.register_body(2, fixed_f(0.5), fixed(1), false);

        for _ in 0..40 {
            physics.simulate_tick(&mut registry);
        }
        prop_assert_eq!(registry.get(1).unwrap().position, wall);
    }
}

/// Deepest overlap between any two bodies, in world units.
fn worst_penetration(registry: &Registry, bodies: &[(u64, Fixed)]) -> Fixed {
    let mut worst = Fixed::ZERO;
    for (i, &(a, ra)) in bodies.iter().enumerate() {
        for &(b, rb) in &bodies[i + 1..] {
            let pa = registry.get(a).unwrap().position.planar();
            let pb = registry.get(b).unwrap().position.planar();
            let gap = (pb - pa).length();
            worst = worst.max(ra + rb - gap);
        }
    }
    worst
}

// Pairs are resolved once per substep, so a crowd can keep a little
// residual overlap after one tick; it shrinks every substep.
#[test]
fn crowded_bodies_separate_within_tolerance() {
    let mut registry = Registry::new();
    let mut physics = PhysicsEngine::new(PhysicsConfig::default(), fixed_f(0.0125));
    let mut bodies = Vec::new();
    let mut id = 0;
    for row in 0..3 {
        for column in 0..3 {
            id += 1;
            let spacing = fixed_f(0.8);
            let position =
                Vec3Fixed::new(spacing * fixed(column), Fixed::ZERO, spacing * fixed(row));
            let team = if id % 2 == 0 { Team::Red } else { Team::Blue };
            registry.add(Entity::new(id, position).with_team(team)).unwrap();
            let mass = fixed(1 + i32::try_from(id % 3).unwrap());
            physics.register_body(id, fixed_f(0.5), mass, false);
            bodies.push((id, fixed_f(0.5)));
        }
    }

    let initial = worst_penetration(&registry, &bodies);
    assert!(initial > fixed_f(0.19));

    physics.simulate_tick(&mut registry);
    let after_one = worst_penetration(&registry, &bodies);
    assert!(after_one < initial, "first tick made the crowd worse");

    for _ in 0..19 {
        physics.simulate_tick(&mut registry);
    }
    let epsilon = fixed_f(0.01);
    for _ in 0..5 {
        physics.simulate_tick(&mut registry);
        let worst = worst_penetration(&registry, &bodies);
        assert!(worst <= epsilon, "bodies still overlap by {worst}");
    }
}

#[test]
fn friendly_units_pass_through_own_structures() {
    let mut registry = Registry::new();
    registry
        .add(Entity::new(1, Vec3Fixed::from_ints(0, 0, 5)).with_team(Team::Red))
        .unwrap();
    let mut runner = Movement::new(fixed(10));
    runner.target = Some(Vec3Fixed::from_ints(0, 0, 10));
    runner.moving = true;
    registry
        .add(
            Entity::new(2, Vec3Fixed::ZERO)
                .with_team(Team::Red)
                .with_movement(runner)
                .with_attack(Attack::melee(1, fixed(1), fixed(1))),
        )
        .unwrap();

    let mut physics = PhysicsEngine::new(PhysicsConfig::default(), fixed_f(0.0125));
    physics.register_body(1, fixed(1), fixed(10), true);
    physics.register_body(2, fixed_f(0.5), fixed(1), false);

    let mut arrived = false;
    for _ in 0..40 {
        arrived |= physics.simulate_tick(&mut registry).arrivals.contains(&2);
    }
    assert!(arrived, "runner was blocked by its own wall");
    assert_eq!(registry.get(1).unwrap().position, Vec3Fixed::from_ints(0, 0, 5));
}
