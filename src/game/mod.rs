//! Game simulation modules

pub mod engine;
pub mod physics;
pub mod snapshot;

pub use engine::{Engine, MatchStatus, TickEvents};

use serde::{Deserialize, Serialize};

/// One of the two player positions in a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerSlot {
    #[serde(rename = "Player 1")]
    One,
    #[serde(rename = "Player 2")]
    Two,
}

impl PlayerSlot {
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    /// Slot number as sent on the wire (1 or 2)
    pub fn number(self) -> u8 {
        match self {
            PlayerSlot::One => 1,
            PlayerSlot::Two => 2,
        }
    }

    pub fn from_number(num: u8) -> Option<Self> {
        match num {
            1 => Some(PlayerSlot::One),
            2 => Some(PlayerSlot::Two),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }

    /// Human-readable label used for winners and match history
    pub fn label(self) -> &'static str {
        match self {
            PlayerSlot::One => "Player 1",
            PlayerSlot::Two => "Player 2",
        }
    }
}

/// Paddle movement requested by a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddleDirection {
    Up,
    Down,
    #[default]
    Stop,
}

impl PaddleDirection {
    /// Parse a wire direction; anything but up/down/stop is rejected
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(PaddleDirection::Up),
            "down" => Some(PaddleDirection::Down),
            "stop" => Some(PaddleDirection::Stop),
            _ => None,
        }
    }

    /// Sign applied to the paddle's y coordinate (y grows downward)
    pub fn sign(self) -> f32 {
        match self {
            PaddleDirection::Up => -1.0,
            PaddleDirection::Down => 1.0,
            PaddleDirection::Stop => 0.0,
        }
    }
}
