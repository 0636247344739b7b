//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::snapshot::{GameSnapshot, MatchSummary};
use crate::game::MatchStatus;

/// Role requested in `join_game`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRole {
    #[default]
    Player,
    Observer,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Create the room's match with a point limit (first request wins)
    CreateRoom {
        #[serde(default)]
        points_limit: Option<i64>,
    },

    /// Take a player slot or watch
    JoinGame {
        #[serde(default)]
        role: JoinRole,
    },

    /// Caller's slot is ready to play
    PlayerReady,

    /// Paddle input. The direction stays raw so unknown values can be
    /// ignored instead of rejected.
    MovePaddle {
        #[serde(default = "default_direction")]
        direction: String,
    },
}

fn default_direction() -> String {
    "stop".to_string()
}

const KNOWN_TYPES: [&str; 4] = ["create_room", "join_game", "player_ready", "move_paddle"];

impl ClientMsg {
    /// Parse an inbound text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidJson)?;

        let kind = match &value {
            Value::Object(map) => map.get("type").and_then(Value::as_str).map(str::to_owned),
            _ => return Err(ProtocolError::NotAnObject),
        };

        match kind {
            Some(kind) if KNOWN_TYPES.contains(&kind.as_str()) => serde_json::from_value(value)
                .map_err(|e| ProtocolError::InvalidPayload(e.to_string())),
            Some(kind) => Err(ProtocolError::UnknownType(kind)),
            None => Err(ProtocolError::UnknownType("null".to_string())),
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    RoomCreated {
        room_code: String,
        points_limit: u32,
    },

    JoinedAsPlayer {
        player_num: u8,
        room_code: String,
    },

    JoinedAsObserver {
        room_code: String,
    },

    StatusChange {
        status: MatchStatus,
    },

    /// Full game state, sent every simulation tick
    GameUpdate(GameSnapshot),

    GameOver(MatchSummary),

    PlayerDisconnected {
        player_num: u8,
    },

    /// Sent only to the connection whose message failed
    Error {
        message: String,
    },
}

impl ServerMsg {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMsg::Error {
            message: message.into(),
        }
    }
}

/// Inbound message errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Message must be a JSON object")]
    NotAnObject,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Invalid message: {0}")]
    InvalidPayload(String),
}
