//! Entity registry with deterministic queries.
//!
//! The registry owns every simulation entity plus one ID-set index per
//! [`ComponentKind`]. Storage uses hash containers for O(1) lookup, so
//! every query result is sorted by entity ID before it is returned. That
//! sort is the determinism contract of the whole core: a system that
//! iterated the raw hash containers would visit entities in a different
//! order on each client.
//!
//! Destruction is two-phase. [`Registry::destroy`] moves an entity to
//! [`Lifecycle::PendingRemoval`] and drops it from the indices, but the
//! entity stays reachable through [`Registry::get`] until the end-of-tick
//! [`Registry::sweep_destroyed`] removes it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::components::{
    Attack, Capabilities, ComponentKind, EntityId, Health, Movement, PlayerId, Team, UnitTypeId,
};
use crate::error::{Result, SimError};
use crate::math::Vec3Fixed;

/// Per-entity lifecycle state machine: `Live → PendingRemoval → Removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Participates in queries and systems.
    #[default]
    Live,
    /// Destroyed this tick, removed at the next sweep.
    PendingRemoval,
    /// Swept out of the registry.
    Removed,
}

/// Hands out entity IDs for one match.
///
/// Both clients create entities in the same order from the same command
/// stream, so a counter reset at match start yields identical IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityIdAllocator {
    next: EntityId,
}

impl EntityIdAllocator {
    /// First ID handed out in a match.
    pub const FIRST_ID: EntityId = 1;

    /// Create an allocator starting at [`Self::FIRST_ID`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: Self::FIRST_ID,
        }
    }

    /// Take the next ID.
    pub fn allocate(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The ID the next call to [`allocate`](Self::allocate) returns.
    #[must_use]
    pub const fn peek(&self) -> EntityId {
        self.next
    }

    /// Restart numbering for a new match.
    pub fn reset_for_new_match(&mut self) {
        self.next = Self::FIRST_ID;
    }
}

impl Default for EntityIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A component value, used to attach components after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Team affiliation.
    Team(Team),
    /// Hit points.
    Health(Health),
    /// Attack capability.
    Attack(Attack),
    /// Movement capability.
    Movement(Movement),
}

impl Component {
    /// The kind tag of this component.
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        match self {
            Component::Team(_) => ComponentKind::Team,
            Component::Health(_) => ComponentKind::Health,
            Component::Attack(_) => ComponentKind::Attack,
            Component::Movement(_) => ComponentKind::Movement,
        }
    }
}

/// A simulation entity.
///
/// Component slots are private so the set of kinds an entity holds can
/// only change through the registry, which keeps the indices in sync.
/// Component *values* are freely mutable through the `*_mut` accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    /// Authoritative world position.
    pub position: Vec3Fixed,
    team: Option<Team>,
    health: Option<Health>,
    attack: Option<Attack>,
    movement: Option<Movement>,
    /// Excluded from velocity updates, collisions and targeting.
    pub ignore_physics: bool,
    /// Catalog type this entity was built from.
    pub unit_type: Option<UnitTypeId>,
    /// Player that deployed this entity.
    pub owner: Option<PlayerId>,
    /// Optional behaviours resolved at creation.
    pub capabilities: Capabilities,
    /// Remaining death-sequence ticks once killed.
    pub dying: Option<u32>,
    lifecycle: Lifecycle,
}

impl Entity {
    /// Create an entity with no components.
    #[must_use]
    pub fn new(id: EntityId, position: Vec3Fixed) -> Self {
        Self {
            id,
            position,
            team: None,
            health: None,
            attack: None,
            movement: None,
            ignore_physics: false,
            unit_type: None,
            owner: None,
            capabilities: Capabilities::default(),
            dying: None,
            lifecycle: Lifecycle::Live,
        }
    }

    /// Builder method to add a team.
    #[must_use]
    pub fn with_team(mut self, team: Team) -> Self {
        self.team = Some(team);
        self
    }

    /// Builder method to add health.
    #[must_use]
    pub fn with_health(mut self, health: Health) -> Self {
        self.health = Some(health);
        self
    }

    /// Builder method to add an attack.
    #[must_use]
    pub fn with_attack(mut self, attack: Attack) -> Self {
        self.attack = Some(attack);
        self
    }

    /// Builder method to add movement.
    #[must_use]
    pub fn with_movement(mut self, movement: Movement) -> Self {
        self.movement = Some(movement);
        self
    }

    /// Builder method to set capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Unique identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Whether the entity is live (not pending removal).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.lifecycle == Lifecycle::Live
    }

    /// Team affiliation.
    #[must_use]
    pub const fn team(&self) -> Option<Team> {
        self.team
    }

    /// Health component.
    #[must_use]
    pub const fn health(&self) -> Option<&Health> {
        self.health.as_ref()
    }

    /// Mutable health component.
    pub fn health_mut(&mut self) -> Option<&mut Health> {
        self.health.as_mut()
    }

    /// Attack component.
    #[must_use]
    pub const fn attack(&self) -> Option<&Attack> {
        self.attack.as_ref()
    }

    /// Mutable attack component.
    pub fn attack_mut(&mut self) -> Option<&mut Attack> {
        self.attack.as_mut()
    }

    /// Movement component.
    #[must_use]
    pub const fn movement(&self) -> Option<&Movement> {
        self.movement.as_ref()
    }

    /// Mutable movement component.
    pub fn movement_mut(&mut self) -> Option<&mut Movement> {
        self.movement.as_mut()
    }

    /// Whether the entity holds a component of `kind`.
    #[must_use]
    pub const fn has(&self, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Team => self.team.is_some(),
            ComponentKind::Health => self.health.is_some(),
            ComponentKind::Attack => self.attack.is_some(),
            ComponentKind::Movement => self.movement.is_some(),
        }
    }

    /// Whether the entity can currently be targeted or collided with.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.is_live()
            && !self.ignore_physics
            && self.health.map_or(true, |health| !health.is_dead())
    }

    fn set(&mut self, component: Component) {
        match component {
            Component::Team(team) => self.team = Some(team),
            Component::Health(health) => self.health = Some(health),
            Component::Attack(attack) => self.attack = Some(attack),
            Component::Movement(movement) => self.movement = Some(movement),
        }
    }

    fn clear(&mut self, kind: ComponentKind) {
        match kind {
            ComponentKind::Team => self.team = None,
            ComponentKind::Health => self.health = None,
            ComponentKind::Attack => self.attack = None,
            ComponentKind::Movement => self.movement = None,
        }
    }
}

/// Storage for all entities plus per-kind indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    entities: HashMap<EntityId, Entity>,
    index: HashMap<ComponentKind, HashSet<EntityId>>,
    last_id: EntityId,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity and index its components.
    ///
    /// # Errors
    ///
    /// Rejects an ID that is already present or not above every ID
    /// registered before, since IDs are never reused within a match.
    pub fn add(&mut self, mut entity: Entity) -> Result<()> {
        let id = entity.id;
        if self.entities.contains_key(&id) {
            return Err(SimError::DuplicateEntity(id));
        }
        if id <= self.last_id {
            return Err(SimError::NonMonotonicEntityId {
                id,
                last: self.last_id,
            });
        }

        entity.lifecycle = Lifecycle::Live;
        for kind in ComponentKind::ALL {
            if entity.has(kind) {
                self.index.entry(kind).or_default().insert(id);
            }
        }
        self.last_id = id;
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Remove an entity immediately, bypassing the two-phase destroy.
    ///
    /// Returns `None` (and does nothing) if the entity does not exist.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let mut entity = self.entities.remove(&id)?;
        self.unindex(id);
        entity.lifecycle = Lifecycle::Removed;
        Some(entity)
    }

    /// Mark an entity for removal at the next sweep.
    ///
    /// Returns `false` if the entity does not exist or is already pending.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if entity.lifecycle != Lifecycle::Live {
            return false;
        }
        entity.lifecycle = Lifecycle::PendingRemoval;
        self.unindex(id);
        true
    }

    /// Get an entity by ID (live or pending removal).
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Get an entity only if it is live.
    #[must_use]
    pub fn get_live(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id).filter(|entity| entity.is_live())
    }

    /// Check if an entity exists (live or pending).
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of stored entities, including those pending removal.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Attach (or replace) a component on a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EntityNotFound`] for missing or pending entities.
    pub fn attach(&mut self, id: EntityId, component: Component) -> Result<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .filter(|entity| entity.is_live())
            .ok_or(SimError::EntityNotFound(id))?;
        entity.set(component);
        self.index.entry(component.kind()).or_default().insert(id);
        Ok(())
    }

    /// Detach a component. A no-op for missing entities or components.
    pub fn detach(&mut self, id: EntityId, kind: ComponentKind) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.clear(kind);
            if let Some(set) = self.index.get_mut(&kind) {
                set.remove(&id);
            }
        }
    }

    /// Live entities holding every kind in `kinds`, sorted by ID.
    ///
    /// Starts from the smallest index to keep the intersection cheap.
    /// An empty `kinds` slice matches nothing.
    #[must_use]
    pub fn query_all(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        let mut sets = Vec::with_capacity(kinds.len());
        for kind in kinds {
            match self.index.get(kind) {
                Some(set) => sets.push(set),
                None => return Vec::new(),
            }
        }
        let Some(smallest) = sets.iter().min_by_key(|set| set.len()) else {
            return Vec::new();
        };

        let mut ids: Vec<EntityId> = smallest
            .iter()
            .copied()
            .filter(|id| sets.iter().all(|set| set.contains(id)))
            .filter(|id| self.entities.get(id).is_some_and(Entity::is_live))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Live entities holding at least one kind in `kinds`, sorted by ID.
    #[must_use]
    pub fn query_any(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        let mut ids: HashSet<EntityId> = HashSet::new();
        for kind in kinds {
            if let Some(set) = self.index.get(kind) {
                ids.extend(set.iter().copied());
            }
        }
        let mut ids: Vec<EntityId> = ids
            .into_iter()
            .filter(|id| self.entities.get(id).is_some_and(Entity::is_live))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// All stored entity IDs (live and pending), sorted.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All live entity IDs, sorted.
    #[must_use]
    pub fn live_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .entities
            .values()
            .filter(|entity| entity.is_live())
            .map(Entity::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Remove every entity pending removal and return them in ID order.
    ///
    /// Only called at the end-of-tick cleanup point.
    pub fn sweep_destroyed(&mut self) -> Vec<Entity> {
        let mut doomed: Vec<EntityId> = self
            .entities
            .values()
            .filter(|entity| entity.lifecycle == Lifecycle::PendingRemoval)
            .map(Entity::id)
            .collect();
        doomed.sort_unstable();

        doomed
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    fn unindex(&mut self, id: EntityId) {
        for set in self.index.values_mut() {
            set.remove(&id);
        }
    }
}
