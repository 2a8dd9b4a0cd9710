//! Player commands and tick batches.
//!
//! Commands arrive as JSON envelopes `{ "type", "playerId", "data" }`.
//! [`Command::parse`] validates the envelope and decodes the payload into a
//! typed [`Command`]; any failure is a [`CommandError`] that the lockstep
//! executor logs and drops.
//!
//! Payload shapes (`data`):
//!
//! | type             | data                                                |
//! |------------------|-----------------------------------------------------|
//! | `move`           | `{ "entityIds": [1, 2], "target": { "x", "z" } }`   |
//! | `stop`           | `{ "entityIds": [1, 2] }`                           |
//! | `placeUnit`      | `{ "unitType": "archer", "column": 0, "row": 1 }`   |
//! | `moveGridUnit`   | `{ "from": { "column", "row" }, "to": { ... } }`    |
//! | `removeGridUnit` | `{ "column": 0, "row": 1 }`                         |
//! | `deployUnits`    | `{}`                                                |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::components::{EntityId, PlayerId, UnitTypeId};
use crate::error::CommandError;
use crate::formation::Slot;
use crate::math::{fixed_decimal, Fixed, Vec3Fixed};

/// Wire form of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    /// Command type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Issuing player.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    /// Type-specific payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl CommandEnvelope {
    /// Build an envelope from raw parts.
    #[must_use]
    pub fn new(kind: impl Into<String>, player: Option<PlayerId>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            player_id: player,
            data,
        }
    }
}

/// A decoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send units toward a point.
    Move {
        /// Units to move.
        entity_ids: Vec<EntityId>,
        /// Destination; Y is replaced with each unit's height.
        target: Vec3Fixed,
    },
    /// Cancel move orders.
    Stop {
        /// Units to stop.
        entity_ids: Vec<EntityId>,
    },
    /// Buy a unit into a formation slot.
    PlaceUnit {
        /// Catalog key.
        unit_type: UnitTypeId,
        /// Destination slot.
        slot: Slot,
    },
    /// Move or swap a formation unit.
    MoveGridUnit {
        /// Occupied source slot.
        from: Slot,
        /// Destination slot.
        to: Slot,
    },
    /// Sell a formation unit back.
    RemoveGridUnit {
        /// Occupied slot.
        slot: Slot,
    },
    /// Deploy the formation now.
    DeployUnits,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePoint {
    #[serde(with = "fixed_decimal")]
    x: Fixed,
    #[serde(default, with = "fixed_decimal")]
    y: Fixed,
    #[serde(with = "fixed_decimal")]
    z: Fixed,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovePayload {
    entity_ids: Vec<EntityId>,
    target: WirePoint,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopPayload {
    entity_ids: Vec<EntityId>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceUnitPayload {
    unit_type: UnitTypeId,
    column: u8,
    row: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct MoveGridUnitPayload {
    from: Slot,
    to: Slot,
}

impl Command {
    /// Wire type tag.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Command::Move { .. } => "move",
            Command::Stop { .. } => "stop",
            Command::PlaceUnit { .. } => "placeUnit",
            Command::MoveGridUnit { .. } => "moveGridUnit",
            Command::RemoveGridUnit { .. } => "removeGridUnit",
            Command::DeployUnits => "deployUnits",
        }
    }

    /// Validate an envelope and decode its payload.
    ///
    /// # Errors
    ///
    /// Unknown type, missing player ID, or a payload that does not match
    /// the type.
    pub fn parse(envelope: &CommandEnvelope) -> Result<(PlayerId, Self), CommandError> {
        let kind = envelope.kind.as_str();
        let command = decode(kind, &envelope.data)?;
        let player = envelope
            .player_id
            .clone()
            .ok_or_else(|| CommandError::MissingPlayer(kind.to_string()))?;
        Ok((player, command))
    }

    /// Encode as a wire envelope issued by `player`.
    #[must_use]
    pub fn to_envelope(&self, player: &PlayerId) -> CommandEnvelope {
        let data = match self {
            Command::Move { entity_ids, target } => serde_json::to_value(MovePayload {
                entity_ids: entity_ids.clone(),
                target: WirePoint {
                    x: target.x,
                    y: target.y,
                    z: target.z,
                },
            }),
            Command::Stop { entity_ids } => serde_json::to_value(StopPayload {
                entity_ids: entity_ids.clone(),
            }),
            Command::PlaceUnit { unit_type, slot } => serde_json::to_value(PlaceUnitPayload {
                unit_type: unit_type.clone(),
                column: slot.column,
                row: slot.row,
            }),
            Command::MoveGridUnit { from, to } => {
                serde_json::to_value(MoveGridUnitPayload { from: *from, to: *to })
            }
            Command::RemoveGridUnit { slot } => serde_json::to_value(slot),
            Command::DeployUnits => Ok(serde_json::json!({})),
        };
        CommandEnvelope::new(
            self.type_name(),
            Some(player.clone()),
            data.unwrap_or(serde_json::Value::Null),
        )
    }
}

fn decode(kind: &str, data: &serde_json::Value) -> Result<Command, CommandError> {
    let command = match kind {
        "move" => {
            let payload: MovePayload = payload(kind, data)?;
            let target = payload.target;
            Command::Move {
                entity_ids: payload.entity_ids,
                target: Vec3Fixed::new(target.x, target.y, target.z),
            }
        }
        "stop" => Command::Stop {
            entity_ids: payload::<StopPayload>(kind, data)?.entity_ids,
        },
        "placeUnit" => {
            let payload: PlaceUnitPayload = payload(kind, data)?;
            Command::PlaceUnit {
                unit_type: payload.unit_type,
                slot: Slot::new(payload.column, payload.row),
            }
        }
        "moveGridUnit" => {
            let payload: MoveGridUnitPayload = payload(kind, data)?;
            Command::MoveGridUnit {
                from: payload.from,
                to: payload.to,
            }
        }
        "removeGridUnit" => Command::RemoveGridUnit {
            slot: payload(kind, data)?,
        },
        "deployUnits" => Command::DeployUnits,
        other => return Err(CommandError::UnknownType(other.to_string())),
    };
    Ok(command)
}

fn payload<T: DeserializeOwned>(kind: &str, data: &serde_json::Value) -> Result<T, CommandError> {
    T::deserialize(data).map_err(|e| CommandError::Malformed {
        command: kind.to_string(),
        message: e.to_string(),
    })
}

/// One player's commands within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCommands {
    /// Sending player.
    pub player: PlayerId,
    /// Commands in the order the player issued them.
    pub commands: Vec<CommandEnvelope>,
}

/// Every player's commands for one tick, in delivery order.
///
/// The executor applies commands exactly in this order. Clients must agree
/// on it; [`TickBatch::canonical`] gives a player-ID ordering transports can
/// use to make it independent of arrival timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickBatch {
    /// Tick the commands belong to.
    pub tick: u64,
    /// Per-player command lists.
    pub players: Vec<PlayerCommands>,
}

impl TickBatch {
    /// An empty batch.
    #[must_use]
    pub const fn new(tick: u64) -> Self {
        Self {
            tick,
            players: Vec::new(),
        }
    }

    /// Append a command to `player`'s list, adding the player if needed.
    pub fn push(&mut self, player: &PlayerId, envelope: CommandEnvelope) {
        if let Some(entry) = self.players.iter_mut().find(|entry| &entry.player == player) {
            entry.commands.push(envelope);
        } else {
            self.players.push(PlayerCommands {
                player: player.clone(),
                commands: vec![envelope],
            });
        }
    }

    /// Builder form of [`TickBatch::push`].
    #[must_use]
    pub fn with(mut self, player: &PlayerId, envelope: CommandEnvelope) -> Self {
        self.push(player, envelope);
        self
    }

    /// All commands flattened in batch order.
    pub fn flatten(&self) -> impl Iterator<Item = &CommandEnvelope> {
        self.players.iter().flat_map(|entry| entry.commands.iter())
    }

    /// Total number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.iter().map(|entry| entry.commands.len()).sum()
    }

    /// Whether the batch holds no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The same batch with players sorted by ID; each player's own
    /// command order is kept.
    #[must_use]
    pub fn canonical(mut self) -> Self {
        self.players.sort_by(|a, b| a.player.cmp(&b.player));
        self
    }
}
