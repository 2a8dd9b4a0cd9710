//! # Skirmish Core
//!
//! Deterministic lockstep simulation core for a two-player skirmish RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No network transport
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Lockstep multiplayer (identical simulation across clients)
//! - Headless verification runs
//! - Replay systems
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`registry`] - Entity storage with sorted, deterministic queries
//! - [`spatial`] / [`physics`] - Broad-phase grid and substepped collisions
//! - [`movement`] / [`combat`] / [`projectiles`] - Unit behaviour
//! - [`territory`] / [`economy`] / [`formation`] / [`waves`] - Match progression
//! - [`command`] / [`lockstep`] - Command envelopes and the tick executor
//! - [`simulation`] - World state and the per-tick pipeline
//! - [`replay`] - Recording and playback
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod catalog;
pub mod combat;
pub mod command;
pub mod components;
pub mod config;
pub mod economy;
pub mod error;
pub mod formation;
pub mod lockstep;
pub mod math;
pub mod movement;
pub mod physics;
pub mod projectiles;
pub mod registry;
pub mod replay;
pub mod simulation;
pub mod spatial;
pub mod territory;
pub mod waves;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{EntityFactory, SpawnRequest, UnitBlueprint, UnitCatalog};
    pub use crate::combat::{DamageIntent, DamageTarget, ProjectileSpawn};
    pub use crate::command::{Command, CommandEnvelope, TickBatch};
    pub use crate::components::*;
    pub use crate::config::MatchConfig;
    pub use crate::error::{CommandError, Result, SimError};
    pub use crate::formation::Slot;
    pub use crate::lockstep::{LockstepManager, TickOutcome};
    pub use crate::math::{Fixed, Vec2Fixed, Vec3Fixed};
    pub use crate::registry::{Entity, EntityIdAllocator, Registry};
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::simulation::{Simulation, TickReport, WorldSnapshot};
}
