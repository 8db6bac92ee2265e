//! Game simulation modules

pub mod ai;
pub mod r#match;
pub mod online;
pub mod physics;
pub mod score;

pub use ai::{Difficulty, DifficultyProfile, PredictiveController};
pub use physics::{Ball, Paddle, PaddleCommand, PhysicsSystem};
pub use online::OnlineMatch;
pub use r#match::{ControlSource, GameMatch, MatchEvent, MatchMode, MatchPhase};
pub use score::MatchState;

use serde::{Deserialize, Serialize};

/// One half of the field; also the network slot that controls it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Slot 1
    Left,
    /// Slot 2
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn slot(self) -> u8 {
        match self {
            Side::Left => 1,
            Side::Right => 2,
        }
    }

    pub fn from_slot(slot: u8) -> Option<Self> {
        match slot {
            1 => Some(Side::Left),
            2 => Some(Side::Right),
            _ => None,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Sign of the horizontal velocity pointing away from this side's paddle
    pub fn away_sign(self) -> f32 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// Held local input for a human-controlled paddle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PaddleInput {
    #[default]
    Idle,
    Up,
    Down,
    /// Track a pointer at this height
    Pointer(f32),
    /// Analog axis in [-1, 1], negative is up
    Axis(f32),
}

/// Pointer offsets inside this distance of the paddle center are ignored
const POINTER_DEADBAND: f32 = 5.0;
/// Target velocity per unit of pointer offset
const POINTER_GAIN: f32 = 0.1;

impl PaddleInput {
    /// Reduce the input to a steering command for `paddle`
    pub fn to_command(self, paddle: &Paddle) -> PaddleCommand {
        let max = paddle.max_velocity;
        let target = match self {
            PaddleInput::Idle => 0.0,
            PaddleInput::Up => -max,
            PaddleInput::Down => max,
            PaddleInput::Pointer(y) => {
                let difference = y - paddle.center_y();
                if difference.abs() > POINTER_DEADBAND {
                    (difference * POINTER_GAIN).clamp(-max, max)
                } else {
                    0.0
                }
            }
            PaddleInput::Axis(axis) => axis.clamp(-1.0, 1.0) * max,
        };
        PaddleCommand::Steer(target)
    }
}

/// Per-tick payload a peer contributes: its own paddle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleState {
    pub y: f32,
    pub velocity: f32,
}

impl From<&Paddle> for PaddleState {
    fn from(paddle: &Paddle) -> Self {
        Self {
            y: paddle.y,
            velocity: paddle.velocity,
        }
    }
}
