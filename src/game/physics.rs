//! Field geometry, ball movement and collision rules
//!
//! The field uses a normalized 0-100 coordinate space on both axes with y
//! growing downward. Player 1 defends x = 0, player 2 defends x = 100.

use super::{PaddleDirection, PlayerSlot};
use crate::util::time::SIMULATION_TPS;

pub const FIELD_WIDTH: f32 = 100.0;
pub const FIELD_HEIGHT: f32 = 100.0;
pub const PADDLE_WIDTH: f32 = 2.0;
pub const PADDLE_HEIGHT: f32 = 20.0;
pub const BALL_SIZE: f32 = 2.0;

/// Ball speed (field units per tick) at every serve
pub const INITIAL_BALL_SPEED: f32 = 0.8;
/// Speed multiplier applied on each paddle hit
pub const SPEED_GROWTH_FACTOR: f32 = 1.05;
pub const MAX_BALL_SPEED: f32 = 3.0;
/// Paddle travel per tick
pub const PADDLE_SPEED: f32 = 1.5;
/// Vertical velocity added for a hit at the very edge of a paddle
pub const SPIN_FACTOR: f32 = 0.5;
/// Gap left between ball and paddle face after a bounce
const FACE_NUDGE: f32 = 0.1;

/// Ball position and velocity (per-tick units)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallState {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub speed: f32,
}

impl BallState {
    pub fn centered() -> Self {
        Self {
            x: FIELD_WIDTH / 2.0,
            y: FIELD_HEIGHT / 2.0,
            vel_x: 0.0,
            vel_y: 0.0,
            speed: INITIAL_BALL_SPEED,
        }
    }

    /// Current velocity magnitude
    pub fn velocity_magnitude(&self) -> f32 {
        (self.vel_x * self.vel_x + self.vel_y * self.vel_y).sqrt()
    }
}

/// Physics system for paddles and ball
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Number of nominal ticks represented by `dt` seconds
    pub fn step_scale(dt: f32) -> f32 {
        dt * SIMULATION_TPS as f32
    }

    /// Lowest and highest allowed paddle centers
    pub fn paddle_bounds() -> (f32, f32) {
        let half = PADDLE_HEIGHT / 2.0;
        (half, FIELD_HEIGHT - half)
    }

    /// Move a paddle center and keep the whole paddle inside the field
    pub fn move_paddle(y: f32, direction: PaddleDirection, scale: f32) -> f32 {
        let (min, max) = Self::paddle_bounds();
        (y + direction.sign() * PADDLE_SPEED * scale).clamp(min, max)
    }

    /// Serve velocity toward `toward` at `angle` radians off the horizontal
    pub fn serve_velocity(toward: PlayerSlot, angle: f32, speed: f32) -> (f32, f32) {
        let direction = match toward {
            PlayerSlot::One => -1.0,
            PlayerSlot::Two => 1.0,
        };
        (direction * speed * angle.cos(), speed * angle.sin())
    }

    /// Reflect off the top/bottom walls. Returns true on contact.
    pub fn reflect_off_walls(ball: &mut BallState) -> bool {
        let half = BALL_SIZE / 2.0;
        if ball.y - half <= 0.0 {
            ball.y = half;
            ball.vel_y = ball.vel_y.abs();
            true
        } else if ball.y + half >= FIELD_HEIGHT {
            ball.y = FIELD_HEIGHT - half;
            ball.vel_y = -ball.vel_y.abs();
            true
        } else {
            false
        }
    }

    /// Horizontal center of a slot's paddle
    pub fn paddle_x(slot: PlayerSlot) -> f32 {
        match slot {
            PlayerSlot::One => PADDLE_WIDTH,
            PlayerSlot::Two => FIELD_WIDTH - PADDLE_WIDTH,
        }
    }

    fn moving_toward(ball: &BallState, slot: PlayerSlot) -> bool {
        match slot {
            PlayerSlot::One => ball.vel_x < 0.0,
            PlayerSlot::Two => ball.vel_x > 0.0,
        }
    }

    /// Axis-aligned overlap between the ball and a paddle
    pub fn overlaps_paddle(ball: &BallState, slot: PlayerSlot, paddle_y: f32) -> bool {
        let ball_half = BALL_SIZE / 2.0;
        let paddle_x = Self::paddle_x(slot);
        let half_w = PADDLE_WIDTH / 2.0;
        let half_h = PADDLE_HEIGHT / 2.0;

        ball.x + ball_half >= paddle_x - half_w
            && ball.x - ball_half <= paddle_x + half_w
            && ball.y + ball_half >= paddle_y - half_h
            && ball.y - ball_half <= paddle_y + half_h
    }

    /// Bounce the ball off a paddle if it is approaching and overlapping.
    /// Returns true on a hit.
    pub fn bounce_off_paddle(ball: &mut BallState, slot: PlayerSlot, paddle_y: f32) -> bool {
        if !Self::moving_toward(ball, slot) || !Self::overlaps_paddle(ball, slot, paddle_y) {
            return false;
        }

        let half_h = PADDLE_HEIGHT / 2.0;
        let offset = ((ball.y - paddle_y) / half_h).clamp(-1.0, 1.0);

        ball.vel_x = -ball.vel_x;
        ball.vel_y += offset * SPIN_FACTOR;

        let current = ball.velocity_magnitude();
        let new_speed = (current * SPEED_GROWTH_FACTOR).min(MAX_BALL_SPEED);
        if current > 0.0 {
            ball.vel_x = ball.vel_x / current * new_speed;
            ball.vel_y = ball.vel_y / current * new_speed;
        }
        ball.speed = new_speed;

        let ball_half = BALL_SIZE / 2.0;
        let face_offset = PADDLE_WIDTH / 2.0 + ball_half + FACE_NUDGE;
        ball.x = match slot {
            PlayerSlot::One => Self::paddle_x(slot) + face_offset,
            PlayerSlot::Two => Self::paddle_x(slot) - face_offset,
        };

        true
    }

    /// Player who scores if the ball has left the field horizontally
    pub fn scoring_player(ball: &BallState) -> Option<PlayerSlot> {
        if ball.x <= 0.0 {
            Some(PlayerSlot::Two)
        } else if ball.x >= FIELD_WIDTH {
            Some(PlayerSlot::One)
        } else {
            None
        }
    }
}
