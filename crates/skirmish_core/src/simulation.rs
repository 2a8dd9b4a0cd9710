//! The simulation world and its per-tick pipeline.
//!
//! [`Simulation`] owns all match state: the entity registry, physics,
//! projectiles, territory, resources, formations and the wave timer. It
//! exposes the pipeline stages the lockstep executor drives in order:
//!
//! 1. [`apply_command`](Simulation::apply_command) for each command
//! 2. [`run_systems`](Simulation::run_systems): physics, movement
//!    completion, combat, projectiles, territory, then damage and deaths
//! 3. [`run_tick_systems`](Simulation::run_tick_systems): resources and
//!    waves, keyed on the tick number
//! 4. [`sweep`](Simulation::sweep): end-of-tick removal
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - No randomness
//! - Every system walks entities in sorted ID order
//! - Same inputs always produce the same [`state_hash`](Simulation::state_hash)

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::catalog::{EntityFactory, SpawnRequest, UnitBlueprint};
use crate::combat::{self, DamageEvent, DamageIntent, DeathEvent, ProjectileSpawn};
use crate::command::Command;
use crate::components::{EntityId, Health, Movement, PlayerId, Team, UnitTypeId};
use crate::config::MatchConfig;
use crate::economy::{Income, ResourceLedger};
use crate::error::{CommandError, Result};
use crate::formation::{self, Formations};
use crate::math::{Fixed, Vec3Fixed};
use crate::movement::{self, MovementEvent};
use crate::physics::PhysicsEngine;
use crate::projectiles::{ProjectileEvent, ProjectileSystem};
use crate::registry::{Entity, EntityIdAllocator, Registry};
use crate::territory::{TerritoryCapture, TerritoryMap};
use crate::waves::{WaveSchedule, WaveTrigger};

/// An entity created this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnedEntity {
    /// Assigned ID.
    pub id: EntityId,
    /// Spawn position.
    pub position: Vec3Fixed,
    /// Catalog key.
    pub unit_type: UnitTypeId,
    /// Team.
    pub team: Team,
    /// Deploying player.
    pub owner: PlayerId,
}

/// Everything that happened during one processed tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number.
    pub tick: u64,
    /// Commands that passed validation and were executed.
    pub commands_applied: usize,
    /// Commands that were logged and dropped.
    pub commands_rejected: usize,
    /// Move orders started and arrivals.
    pub movement: Vec<MovementEvent>,
    /// Units created by deployment.
    pub spawned: Vec<SpawnedEntity>,
    /// Damage intents, melee first then projectile impacts.
    pub damage_intents: Vec<DamageIntent>,
    /// Damage dealt per entity.
    pub damage: Vec<DamageEvent>,
    /// Projectiles fired by ranged attacks.
    pub projectile_spawns: Vec<ProjectileSpawn>,
    /// Projectile launches, hits and fizzles.
    pub projectiles: Vec<ProjectileEvent>,
    /// Kills and finished death sequences.
    pub deaths: Vec<DeathEvent>,
    /// Territory bands that changed owner.
    pub captures: Vec<TerritoryCapture>,
    /// Resource payouts.
    pub income: Vec<Income>,
    /// Latest wave that ended on this tick.
    pub wave: Option<WaveTrigger>,
    /// Entities swept out of the registry.
    pub removed: Vec<EntityId>,
    /// State hash after the tick.
    pub state_hash: u64,
}

impl TickReport {
    /// Empty report for `tick`.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }
}

/// Read-only view of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity ID.
    pub id: EntityId,
    /// World position.
    pub position: Vec3Fixed,
    /// Team, if any.
    pub team: Option<Team>,
    /// Health, if any.
    pub health: Option<Health>,
    /// Catalog key, if spawned from the catalog.
    pub unit_type: Option<UnitTypeId>,
    /// Whether the entity is in its death sequence.
    pub dying: bool,
}

/// Read-only per-tick world state for renderers and UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Last processed tick.
    pub tick: u64,
    /// Live entities in ID order.
    pub entities: Vec<EntitySnapshot>,
    /// Projectile positions in projectile-ID order.
    pub projectiles: Vec<Vec3Fixed>,
    /// Band owners, low Z first.
    pub territory: Vec<Team>,
    /// Balances in player-ID order.
    pub resources: Vec<(PlayerId, u32)>,
}

/// The match state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    config: MatchConfig,
    tick: u64,
    ids: EntityIdAllocator,
    registry: Registry,
    physics: PhysicsEngine,
    projectiles: ProjectileSystem,
    territory: TerritoryMap,
    resources: ResourceLedger,
    formations: Formations,
    waves: WaveSchedule,
}

impl Simulation {
    /// Create the world for a new match.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`](crate::error::SimError::InvalidConfig)
    /// if the config fails validation.
    pub fn new(config: MatchConfig) -> Result<Self> {
        config.validate()?;
        let physics = PhysicsEngine::new(config.physics.clone(), config.substep_dt());
        let territory = TerritoryMap::new(&config.territory);
        let resources = ResourceLedger::new(&config.players, config.economy.starting_resources);
        let formations = Formations::new(config.players.iter().map(|p| &p.id), &config.formation);
        Ok(Self {
            config,
            tick: 0,
            ids: EntityIdAllocator::new(),
            registry: Registry::new(),
            physics,
            projectiles: ProjectileSystem::new(),
            territory,
            resources,
            formations,
            waves: WaveSchedule::new(),
        })
    }

    /// Last processed tick (0 before the first tick).
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Match configuration.
    #[must_use]
    pub const fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Entity registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable entity registry, for setup code.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Physics world.
    #[must_use]
    pub const fn physics(&self) -> &PhysicsEngine {
        &self.physics
    }

    /// Projectiles in flight.
    #[must_use]
    pub const fn projectiles(&self) -> &ProjectileSystem {
        &self.projectiles
    }

    /// Territory ownership.
    #[must_use]
    pub const fn territory(&self) -> &TerritoryMap {
        &self.territory
    }

    /// Resource balances.
    #[must_use]
    pub const fn resources(&self) -> &ResourceLedger {
        &self.resources
    }

    /// Formation grids.
    #[must_use]
    pub const fn formations(&self) -> &Formations {
        &self.formations
    }

    /// Wave timer.
    #[must_use]
    pub const fn waves(&self) -> &WaveSchedule {
        &self.waves
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.registry.get(id)
    }

    /// Register a unit from a blueprint, with its physics body, now.
    ///
    /// # Errors
    ///
    /// Propagates registry errors; none occur with allocator-issued IDs.
    pub fn spawn_unit(
        &mut self,
        blueprint: &UnitBlueprint,
        team: Team,
        position: Vec3Fixed,
        owner: Option<PlayerId>,
    ) -> Result<EntityId> {
        let id = self.ids.allocate();
        let mut entity = Entity::new(id, position)
            .with_team(team)
            .with_health(Health::new(blueprint.health))
            .with_capabilities(blueprint.capabilities);
        if blueprint.speed > Fixed::ZERO && !blueprint.is_static {
            entity = entity.with_movement(Movement::new(blueprint.speed));
        }
        if let Some(attack) = blueprint.attack {
            entity = entity.with_attack(attack);
        }
        entity.unit_type = Some(blueprint.unit_type.clone());
        entity.owner = owner;

        self.registry.add(entity)?;
        self.physics
            .register_body(id, blueprint.radius, blueprint.mass, blueprint.is_static);
        Ok(id)
    }

    /// Turn a spawn request into a registered unit.
    ///
    /// Returns `None` (and logs) when the factory does not know the type.
    pub fn spawn(
        &mut self,
        factory: &dyn EntityFactory,
        request: &SpawnRequest,
    ) -> Option<SpawnedEntity> {
        let Some(blueprint) = factory.blueprint(request) else {
            tracing::warn!(
                tick = self.tick,
                unit_type = %request.unit_type,
                "Spawn request for unknown unit type dropped"
            );
            return None;
        };
        let owner = Some(request.player.clone());
        match self.spawn_unit(&blueprint, request.team, request.position, owner) {
            Ok(id) => Some(SpawnedEntity {
                id,
                position: request.position,
                unit_type: blueprint.unit_type,
                team: request.team,
                owner: request.player.clone(),
            }),
            Err(error) => {
                tracing::warn!(tick = self.tick, %error, "Spawn failed");
                None
            }
        }
    }

    /// Begin processing `tick`.
    pub fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Execute one decoded command for `player`.
    ///
    /// Entities in a move or stop order that the player does not control,
    /// or that no longer exist, are skipped; the rest of the order applies.
    ///
    /// # Errors
    ///
    /// Returns the reason the command as a whole was rejected.
    pub fn apply_command(
        &mut self,
        factory: &dyn EntityFactory,
        player: &PlayerId,
        command: Command,
        report: &mut TickReport,
    ) -> std::result::Result<(), CommandError> {
        let team = self
            .config
            .team_of(player)
            .ok_or_else(|| CommandError::UnknownPlayer(player.to_string()))?;

        match command {
            Command::Move { entity_ids, target } => {
                let extent = self.config.physics.world_extent;
                if target.x.saturating_abs() > extent || target.z.saturating_abs() > extent {
                    return Err(CommandError::TargetOutOfBounds {
                        x: target.x,
                        z: target.z,
                    });
                }
                for id in entity_ids {
                    match self.check_control(id, team) {
                        Ok(()) => match movement::move_to(&mut self.registry, id, target) {
                            Some(event) => report.movement.push(event),
                            None => skip_entity(self.tick, player, CommandError::InvalidEntity(id)),
                        },
                        Err(error) => skip_entity(self.tick, player, error),
                    }
                }
            }
            Command::Stop { entity_ids } => {
                for id in entity_ids {
                    match self.check_control(id, team) {
                        Ok(()) if movement::stop(&mut self.registry, id) => {}
                        Ok(()) => skip_entity(self.tick, player, CommandError::InvalidEntity(id)),
                        Err(error) => skip_entity(self.tick, player, error),
                    }
                }
            }
            Command::PlaceUnit { unit_type, slot } => {
                let cost = factory
                    .unit_cost(&unit_type)
                    .ok_or_else(|| CommandError::UnknownUnitType(unit_type.clone()))?;
                if !self.resources.can_afford(player, cost) {
                    return Err(CommandError::InsufficientResources {
                        required: cost,
                        available: self.resources.balance(player),
                    });
                }
                self.formations.grid_mut(player)?.place(slot, unit_type)?;
                self.resources.spend(player, cost)?;
            }
            Command::MoveGridUnit { from, to } => {
                self.formations.grid_mut(player)?.move_unit(from, to)?;
            }
            Command::RemoveGridUnit { slot } => {
                let unit_type = self.formations.grid_mut(player)?.remove(slot)?;
                let refund = factory.unit_cost(&unit_type).unwrap_or(0);
                self.resources.deposit(player, refund);
            }
            Command::DeployUnits => {
                let wave = self.waves.current();
                self.deploy_formation(factory, player, team, wave, report)?;
            }
        }
        Ok(())
    }

    fn check_control(&self, id: EntityId, team: Team) -> std::result::Result<(), CommandError> {
        let entity = self
            .registry
            .get_live(id)
            .ok_or(CommandError::InvalidEntity(id))?;
        if entity.team() == Some(team) {
            Ok(())
        } else {
            Err(CommandError::NotOwned(id))
        }
    }

    fn deploy_formation(
        &mut self,
        factory: &dyn EntityFactory,
        player: &PlayerId,
        team: Team,
        wave: u32,
        report: &mut TickReport,
    ) -> std::result::Result<(), CommandError> {
        let units = self.formations.grid_mut(player)?.take_for_deploy(wave)?;
        let requests = formation::spawn_requests(
            units,
            &self.config.formation,
            self.config.territory.map_depth,
            team,
            player,
        );
        tracing::debug!(
            tick = self.tick,
            %player,
            wave,
            units = requests.len(),
            "Deploying formation"
        );
        for request in &requests {
            if let Some(spawned) = self.spawn(factory, request) {
                report.spawned.push(spawned);
            }
        }
        Ok(())
    }

    /// One simulation step: physics, movement completion, combat,
    /// projectiles, territory, then damage application and deaths.
    pub fn run_systems(&mut self, report: &mut TickReport) {
        let tick_dt = self.config.tick_dt();

        self.physics.simulate_tick(&mut self.registry);
        report
            .movement
            .extend(movement::collect_arrivals(&mut self.registry));

        let combat = combat::run_combat(&mut self.registry, tick_dt);
        report.damage_intents.extend(combat.damage);
        for spawn in &combat.projectiles {
            report.projectiles.push(self.projectiles.launch(spawn));
        }
        report.projectile_spawns.extend(combat.projectiles);

        let (impacts, events) = self.projectiles.advance(&self.registry, tick_dt);
        report.damage_intents.extend(impacts);
        report.projectiles.extend(events);

        report.captures = self.territory.update(&self.registry);

        report.damage = combat::resolve_damage(&mut self.registry, &report.damage_intents);
        let mut killed: Vec<EntityId> = report
            .damage
            .iter()
            .filter(|event| event.lethal)
            .map(|event| event.target)
            .collect();
        killed.dedup();

        for id in combat::advance_death_sequences(&mut self.registry) {
            report.deaths.push(DeathEvent::Destroyed { entity: id });
        }
        report
            .deaths
            .extend(combat::begin_deaths(&mut self.registry, &killed));
    }

    /// Resources and waves for the current tick number.
    pub fn run_tick_systems(&mut self, factory: &dyn EntityFactory, report: &mut TickReport) {
        report.income = self
            .resources
            .tick(self.tick, &self.config.economy, &self.territory);

        for trigger in self.waves.tick(self.tick, &self.config.waves) {
            tracing::info!(tick = self.tick, wave = trigger.wave, "Wave triggered");
            for player in self.formations.pending_for_wave(trigger.wave) {
                let Some(team) = self.config.team_of(&player) else {
                    continue;
                };
                if let Err(error) =
                    self.deploy_formation(factory, &player, team, trigger.wave, report)
                {
                    tracing::warn!(tick = self.tick, %player, %error, "Automatic deploy failed");
                }
            }
            report.wave = Some(trigger);
        }
    }

    /// Remove destroyed entities from the registry and physics.
    pub fn sweep(&mut self, report: &mut TickReport) {
        for entity in self.registry.sweep_destroyed() {
            self.physics.unregister_body(entity.id());
            report.removed.push(entity.id());
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two clients in sync produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);

        let ids = self.registry.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            let Some(entity) = self.registry.get(id) else {
                continue;
            };
            id.hash(&mut hasher);
            entity.position.hash(&mut hasher);
            entity.lifecycle().hash(&mut hasher);
            entity.team().hash(&mut hasher);
            entity.ignore_physics.hash(&mut hasher);
            entity.dying.hash(&mut hasher);

            if let Some(health) = entity.health() {
                health.current.hash(&mut hasher);
                health.max.hash(&mut hasher);
            }
            if let Some(attack) = entity.attack() {
                attack.cooldown_timer.to_bits().hash(&mut hasher);
                attack.target.hash(&mut hasher);
            }
            if let Some(movement) = entity.movement() {
                movement.moving.hash(&mut hasher);
                movement.target.hash(&mut hasher);
            }
            if let Some(body) = self.physics.body(id) {
                body.velocity.hash(&mut hasher);
            }
        }

        for (id, projectile) in self.projectiles.iter() {
            id.hash(&mut hasher);
            projectile.position.hash(&mut hasher);
            projectile.target.hash(&mut hasher);
        }
        self.territory.owners().hash(&mut hasher);
        for (player, balance) in self.resources.iter() {
            player.hash(&mut hasher);
            balance.hash(&mut hasher);
        }
        self.waves.current().hash(&mut hasher);

        hasher.finish()
    }

    /// Read-only view of the world.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let entities = self
            .registry
            .live_ids()
            .into_iter()
            .filter_map(|id| self.registry.get(id))
            .map(|entity| EntitySnapshot {
                id: entity.id(),
                position: entity.position,
                team: entity.team(),
                health: entity.health().copied(),
                unit_type: entity.unit_type.clone(),
                dying: entity.dying.is_some(),
            })
            .collect();
        WorldSnapshot {
            tick: self.tick,
            entities,
            projectiles: self.projectiles.iter().map(|(_, p)| p.position).collect(),
            territory: self.territory.owners().to_vec(),
            resources: self
                .resources
                .iter()
                .map(|(player, amount)| (player.clone(), amount))
                .collect(),
        }
    }

    /// Serialize the simulation state for snapshots and replays.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            crate::error::SimError::Serialization(format!("Failed to serialize simulation: {e}"))
        })
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            crate::error::SimError::Serialization(format!("Failed to deserialize simulation: {e}"))
        })
    }
}

fn skip_entity(tick: u64, player: &PlayerId, error: CommandError) {
    tracing::warn!(tick, %player, %error, "Skipping entity in command");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UnitCatalog;
    use crate::formation::Slot;
    use crate::registry::Lifecycle;

    fn sim() -> Simulation {
        Simulation::new(MatchConfig::two_player("red", "blue")).unwrap()
    }

    fn blueprint(name: &str) -> UnitBlueprint {
        UnitCatalog::skirmish_default()
            .get(name)
            .unwrap()
            .blueprint()
    }

    #[test]
    fn test_spawn_registers_entity_and_body() {
        let mut sim = sim();
        let id = sim
            .spawn_unit(&blueprint("infantry"), Team::Red, Vec3Fixed::ZERO, None)
            .unwrap();
        assert_eq!(id, 1);
        assert!(sim.physics().has_body(id));
        assert!(sim.entity(id).unwrap().movement().is_some());

        let wall = sim
            .spawn_unit(&blueprint("barricade"), Team::Red, Vec3Fixed::from_ints(5, 0, 5), None)
            .unwrap();
        assert_eq!(wall, 2);
        assert!(sim.entity(wall).unwrap().movement().is_none());
        assert!(sim.physics().body(wall).unwrap().is_static);
    }

    #[test]
    fn test_move_command_skips_foreign_units() {
        let mut sim = sim();
        let catalog = UnitCatalog::skirmish_default();
        let mine = sim
            .spawn_unit(&blueprint("infantry"), Team::Red, Vec3Fixed::ZERO, None)
            .unwrap();
        let theirs = sim
            .spawn_unit(&blueprint("infantry"), Team::Blue, Vec3Fixed::from_ints(9, 0, 9), None)
            .unwrap();

        let mut report = TickReport::new(1);
        sim.apply_command(
            &catalog,
            &PlayerId::new("red"),
            Command::Move {
                entity_ids: vec![theirs, mine],
                target: Vec3Fixed::from_ints(3, 0, 3),
            },
            &mut report,
        )
        .unwrap();

        assert_eq!(report.movement.len(), 1);
        assert!(sim.entity(mine).unwrap().movement().unwrap().moving);
        assert!(!sim.entity(theirs).unwrap().movement().unwrap().moving);
    }

    #[test]
    fn test_move_target_outside_world_rejected() {
        let mut sim = sim();
        let catalog = UnitCatalog::skirmish_default();
        let id = sim
            .spawn_unit(&blueprint("infantry"), Team::Red, Vec3Fixed::from_ints(1, 0, 0), None)
            .unwrap();
        let target = Vec3Fixed::new(Fixed::MIN, Fixed::ZERO, Fixed::ZERO);

        let mut report = TickReport::new(1);
        let err = sim
            .apply_command(
                &catalog,
                &PlayerId::new("red"),
                Command::Move {
                    entity_ids: vec![id],
                    target,
                },
                &mut report,
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::TargetOutOfBounds { .. }));
        assert!(report.movement.is_empty());
        assert!(!sim.entity(id).unwrap().movement().unwrap().moving);
    }

    #[test]
    fn test_far_move_keeps_full_speed() {
        let mut sim = sim();
        let catalog = UnitCatalog::skirmish_default();
        let id = sim
            .spawn_unit(&blueprint("infantry"), Team::Red, Vec3Fixed::ZERO, None)
            .unwrap();
        let edge = sim.config().physics.world_extent;
        let mut report = TickReport::new(1);
        sim.apply_command(
            &catalog,
            &PlayerId::new("red"),
            Command::Move {
                entity_ids: vec![id],
                target: Vec3Fixed::new(edge, Fixed::ZERO, Fixed::ZERO),
            },
            &mut report,
        )
        .unwrap();

        sim.begin_tick(1);
        sim.run_systems(&mut report);
        // Speed 3 at 20 ticks per second covers 0.15 per tick.
        let moved = sim.entity(id).unwrap().position.x;
        let epsilon = Fixed::from_num(0.001);
        assert!((moved - Fixed::from_num(0.15)).abs() < epsilon, "moved {moved}");
    }

    #[test]
    fn test_place_spends_and_remove_refunds() {
        let mut sim = sim();
        let catalog = UnitCatalog::skirmish_default();
        let red = PlayerId::new("red");
        let mut report = TickReport::new(1);

        sim.apply_command(
            &catalog,
            &red,
            Command::PlaceUnit {
                unit_type: "catapult".to_string(),
                slot: Slot::new(0, 0),
            },
            &mut report,
        )
        .unwrap();
        assert_eq!(sim.resources().balance(&red), 160);

        let err = sim
            .apply_command(
                &catalog,
                &red,
                Command::PlaceUnit {
                    unit_type: "dragon".to_string(),
                    slot: Slot::new(1, 0),
                },
                &mut report,
            )
            .unwrap_err();
        assert_eq!(err, CommandError::UnknownUnitType("dragon".to_string()));

        sim.apply_command(
            &catalog,
            &red,
            Command::RemoveGridUnit { slot: Slot::new(0, 0) },
            &mut report,
        )
        .unwrap();
        assert_eq!(sim.resources().balance(&red), 200);
    }

    #[test]
    fn test_deploy_spawns_in_row_major_order() {
        let mut sim = sim();
        let catalog = UnitCatalog::skirmish_default();
        let blue = PlayerId::new("blue");
        let mut report = TickReport::new(1);

        for (column, row) in [(1, 1), (0, 0)] {
            sim.apply_command(
                &catalog,
                &blue,
                Command::PlaceUnit {
                    unit_type: "infantry".to_string(),
                    slot: Slot::new(column, row),
                },
                &mut report,
            )
            .unwrap();
        }
        sim.apply_command(&catalog, &blue, Command::DeployUnits, &mut report)
            .unwrap();

        assert_eq!(report.spawned.len(), 2);
        assert_eq!(report.spawned[0].id, 1);
        assert!(report.spawned.iter().all(|s| s.team == Team::Blue));
        assert!(report.spawned[0].position.z > Fixed::from_num(40));
        assert_eq!(
            sim.apply_command(&catalog, &blue, Command::DeployUnits, &mut report),
            Err(CommandError::AlreadyDeployed(0))
        );
    }

    #[test]
    fn test_killed_unit_swept_at_tick_end() {
        let mut sim = sim();
        let catalog = UnitCatalog::skirmish_default();
        let wall = sim
            .spawn_unit(&blueprint("barricade"), Team::Blue, Vec3Fixed::ZERO, None)
            .unwrap();
        sim.registry_mut()
            .get_mut(wall)
            .unwrap()
            .health_mut()
            .unwrap()
            .current = 5;
        let mut raider = blueprint("infantry");
        raider.capabilities.death_sequence = None;
        if let Some(attack) = raider.attack.as_mut() {
            attack.range = Fixed::from_num(3);
        }
        sim.spawn_unit(&raider, Team::Red, Vec3Fixed::from_ints(2, 0, 0), None)
            .unwrap();

        let mut report = TickReport::new(1);
        sim.begin_tick(1);
        sim.run_systems(&mut report);
        sim.run_tick_systems(&catalog, &mut report);
        assert_eq!(sim.entity(wall).unwrap().lifecycle(), Lifecycle::PendingRemoval);

        sim.sweep(&mut report);
        assert_eq!(report.removed, vec![wall]);
        assert!(sim.entity(wall).is_none());
        assert!(!sim.physics().has_body(wall));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut sim = sim();
        sim.spawn_unit(&blueprint("archer"), Team::Red, Vec3Fixed::from_ints(4, 0, 2), None)
            .unwrap();
        let mut report = TickReport::new(1);
        sim.begin_tick(1);
        sim.run_systems(&mut report);

        let bytes = sim.serialize().unwrap();
        let restored = Simulation::deserialize(&bytes).unwrap();

        assert_eq!(sim.tick(), restored.tick());
        assert_eq!(sim.state_hash(), restored.state_hash());
        assert_eq!(sim.snapshot(), restored.snapshot());
    }
}
