//! Error types for the simulation core.
//!
//! Two layers exist. [`SimError`] covers setup, configuration and snapshot
//! failures that a caller can act on. [`CommandError`] classifies a single
//! bad player command; the lockstep executor logs and drops those, so they
//! never escape a tick.

use thiserror::Error;

use crate::components::EntityId;
use crate::math::Fixed;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// An entity with this ID is already registered.
    #[error("Entity {0} is already registered")]
    DuplicateEntity(EntityId),

    /// Entity IDs must grow monotonically within a match.
    #[error("Entity ID {id} is not above the last assigned ID {last}")]
    NonMonotonicEntityId {
        /// Offending ID.
        id: EntityId,
        /// Highest ID registered so far.
        last: EntityId,
    },

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Failed to read a data file.
    #[error("Failed to read '{path}': {message}")]
    Io {
        /// Path of the file.
        path: String,
        /// Error message.
        message: String,
    },

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Snapshot or replay (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Desync detected in multiplayer.
    #[error("Desync detected at tick {tick}: local hash {local_hash}, remote hash {remote_hash}")]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Local simulation hash.
        local_hash: u64,
        /// Remote simulation hash.
        remote_hash: u64,
    },
}

/// Why a single player command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The envelope `type` is not a known command.
    #[error("unknown command type '{0}'")]
    UnknownType(String),

    /// The envelope carries no player ID.
    #[error("command '{0}' has no player id")]
    MissingPlayer(String),

    /// The player is not part of this match.
    #[error("player '{0}' is not in this match")]
    UnknownPlayer(String),

    /// The payload is missing a field or has the wrong shape.
    #[error("malformed '{command}' payload: {message}")]
    Malformed {
        /// Command type.
        command: String,
        /// Parser message.
        message: String,
    },

    /// The command targets an entity the player does not control.
    #[error("entity {0} is not controlled by the issuing player")]
    NotOwned(EntityId),

    /// The referenced entity no longer exists or cannot move.
    #[error("entity {0} cannot receive this command")]
    InvalidEntity(EntityId),

    /// A formation slot is out of bounds or in the wrong state.
    #[error("invalid formation slot ({column}, {row}): {reason}")]
    InvalidSlot {
        /// Slot column.
        column: u8,
        /// Slot row.
        row: u8,
        /// What was wrong.
        reason: &'static str,
    },

    /// The unit type is not in the catalog.
    #[error("unknown unit type '{0}'")]
    UnknownUnitType(String),

    /// The player cannot afford the action.
    #[error("insufficient resources: need {required}, have {available}")]
    InsufficientResources {
        /// Amount required.
        required: u32,
        /// Amount available.
        available: u32,
    },

    /// A move target lies outside the playable world.
    #[error("move target ({x}, {z}) is outside the world")]
    TargetOutOfBounds {
        /// Target X.
        x: Fixed,
        /// Target Z.
        z: Fixed,
    },

    /// The player's formation already deployed during this wave.
    #[error("formation already deployed for wave {0}")]
    AlreadyDeployed(u32),
}
