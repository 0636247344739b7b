//! Per-match pong state machine
//!
//! The engine is pure: no I/O and no knowledge of tasks or locks. Callers
//! serialize access (see `room::Room`).

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_4;

use super::physics::{BallState, PhysicsSystem, FIELD_HEIGHT, INITIAL_BALL_SPEED};
use super::{PaddleDirection, PlayerSlot};

/// Match status; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    WaitingForOpponent,
    WaitingForReady,
    Playing,
    Finished,
}

/// Paddle state for one slot
#[derive(Debug, Clone, Copy)]
pub struct PaddleState {
    pub y: f32,
    pub direction: PaddleDirection,
    pub connected: bool,
    pub ready: bool,
}

impl Default for PaddleState {
    fn default() -> Self {
        Self {
            y: FIELD_HEIGHT / 2.0,
            direction: PaddleDirection::Stop,
            connected: false,
            ready: false,
        }
    }
}

/// What happened during a single `advance` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickEvents {
    pub paddle_hit: bool,
    pub wall_hit: bool,
    pub scored: Option<PlayerSlot>,
    pub match_over: bool,
}

/// Authoritative state of one match
pub struct Engine {
    pub room_code: String,
    pub points_limit: u32,
    pub status: MatchStatus,
    pub score_p1: u32,
    pub score_p2: u32,
    pub winner: Option<PlayerSlot>,
    pub paddles: [PaddleState; 2],
    pub ball: BallState,
    rng: ChaCha8Rng,
}

impl Engine {
    /// Create an engine; `seed` drives serve direction and angles
    pub fn new(room_code: impl Into<String>, points_limit: u32, seed: u64) -> Self {
        Self {
            room_code: room_code.into(),
            points_limit: points_limit.max(1),
            status: MatchStatus::WaitingForOpponent,
            score_p1: 0,
            score_p2: 0,
            winner: None,
            paddles: [PaddleState::default(); 2],
            ball: BallState::centered(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn paddle(&self, slot: PlayerSlot) -> &PaddleState {
        &self.paddles[slot.index()]
    }

    pub fn score(&self, slot: PlayerSlot) -> u32 {
        match slot {
            PlayerSlot::One => self.score_p1,
            PlayerSlot::Two => self.score_p2,
        }
    }

    /// Mark a slot connected. Returns true if the status changed.
    pub fn join(&mut self, slot: PlayerSlot) -> bool {
        self.paddles[slot.index()].connected = true;

        if self.status == MatchStatus::WaitingForOpponent
            && self.paddles.iter().all(|p| p.connected)
        {
            self.status = MatchStatus::WaitingForReady;
            return true;
        }
        false
    }

    /// Mark a slot ready; starts the match once both are. Returns true if
    /// the status changed.
    pub fn set_ready(&mut self, slot: PlayerSlot) -> bool {
        self.paddles[slot.index()].ready = true;

        if self.status == MatchStatus::WaitingForReady && self.paddles.iter().all(|p| p.ready) {
            self.start();
            return true;
        }
        false
    }

    /// Store a paddle direction; read at the start of the next tick
    pub fn set_paddle_direction(&mut self, slot: PlayerSlot, direction: PaddleDirection) {
        self.paddles[slot.index()].direction = direction;
    }

    fn start(&mut self) {
        self.status = MatchStatus::Playing;
        let toward = if self.rng.gen_bool(0.5) {
            PlayerSlot::One
        } else {
            PlayerSlot::Two
        };
        self.serve(toward);
    }

    /// Reset the ball to center and launch it toward `toward`
    fn serve(&mut self, toward: PlayerSlot) {
        let angle = self.rng.gen_range(-FRAC_PI_4..=FRAC_PI_4);
        let (vel_x, vel_y) = PhysicsSystem::serve_velocity(toward, angle, INITIAL_BALL_SPEED);
        self.ball = BallState {
            vel_x,
            vel_y,
            ..BallState::centered()
        };
    }

    /// Advance the match by `dt` seconds. No-op unless playing.
    pub fn advance(&mut self, dt: f32) -> TickEvents {
        let mut events = TickEvents::default();
        if self.status != MatchStatus::Playing {
            return events;
        }

        let scale = PhysicsSystem::step_scale(dt);

        for paddle in self.paddles.iter_mut() {
            paddle.y = PhysicsSystem::move_paddle(paddle.y, paddle.direction, scale);
        }

        self.ball.x += self.ball.vel_x * scale;
        self.ball.y += self.ball.vel_y * scale;

        events.wall_hit = PhysicsSystem::reflect_off_walls(&mut self.ball);

        for slot in PlayerSlot::ALL {
            let paddle_y = self.paddles[slot.index()].y;
            if PhysicsSystem::bounce_off_paddle(&mut self.ball, slot, paddle_y) {
                events.paddle_hit = true;
            }
        }

        if let Some(scorer) = PhysicsSystem::scoring_player(&self.ball) {
            self.award_point(scorer);
            events.scored = Some(scorer);
            events.match_over = self.status == MatchStatus::Finished;
        }

        events
    }

    fn award_point(&mut self, scorer: PlayerSlot) {
        let score = match scorer {
            PlayerSlot::One => &mut self.score_p1,
            PlayerSlot::Two => &mut self.score_p2,
        };
        *score += 1;

        if *score >= self.points_limit {
            self.winner = Some(scorer);
            self.status = MatchStatus::Finished;
            return;
        }

        // Serve to whoever trails; on a tie, to the side just scored on
        let receiver = match self.score_p1.cmp(&self.score_p2) {
            std::cmp::Ordering::Less => PlayerSlot::One,
            std::cmp::Ordering::Greater => PlayerSlot::Two,
            std::cmp::Ordering::Equal => scorer.opponent(),
        };
        self.serve(receiver);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::{MAX_BALL_SPEED, PADDLE_WIDTH, SPEED_GROWTH_FACTOR};
    use crate::util::time::tick_delta;

    fn playing_engine(points_limit: u32, seed: u64) -> Engine {
        let mut engine = Engine::new("TEST", points_limit, seed);
        engine.join(PlayerSlot::One);
        engine.join(PlayerSlot::Two);
        engine.set_ready(PlayerSlot::One);
        engine.set_ready(PlayerSlot::Two);
        assert_eq!(engine.status, MatchStatus::Playing);
        engine
    }

    #[test]
    fn initial_state() {
        let engine = Engine::new("ROOM", 5, 1);
        assert_eq!(engine.status, MatchStatus::WaitingForOpponent);
        assert_eq!(engine.score_p1, 0);
        assert_eq!(engine.score_p2, 0);
        assert_eq!(engine.paddle(PlayerSlot::One).y, 50.0);
        assert_eq!(engine.paddle(PlayerSlot::Two).y, 50.0);
        assert!(engine.winner.is_none());
    }

    #[test]
    fn lifecycle_moves_forward() {
        let mut engine = Engine::new("ROOM", 5, 7);
        assert!(!engine.join(PlayerSlot::One));
        assert_eq!(engine.status, MatchStatus::WaitingForOpponent);
        // Rejoining the same slot changes nothing
        assert!(!engine.join(PlayerSlot::One));
        assert!(engine.join(PlayerSlot::Two));
        assert_eq!(engine.status, MatchStatus::WaitingForReady);

        assert!(!engine.set_ready(PlayerSlot::Two));
        assert!(!engine.set_ready(PlayerSlot::Two));
        assert_eq!(engine.status, MatchStatus::WaitingForReady);
        assert!(engine.set_ready(PlayerSlot::One));
        assert_eq!(engine.status, MatchStatus::Playing);

        assert_eq!((engine.ball.x, engine.ball.y), (50.0, 50.0));
        let speed = engine.ball.velocity_magnitude();
        assert!((speed - INITIAL_BALL_SPEED).abs() < 1e-5);
        // Launch angle stays within 45 degrees of horizontal
        assert!(engine.ball.vel_x.abs() >= engine.ball.vel_y.abs() - 1e-6);

        // A late join does not regress the status
        assert!(!engine.join(PlayerSlot::One));
        assert_eq!(engine.status, MatchStatus::Playing);
    }

    #[test]
    fn ready_before_opponent_does_not_start() {
        let mut engine = Engine::new("ROOM", 5, 3);
        engine.join(PlayerSlot::One);
        engine.set_ready(PlayerSlot::One);
        assert_eq!(engine.status, MatchStatus::WaitingForOpponent);
        engine.join(PlayerSlot::Two);
        assert!(engine.set_ready(PlayerSlot::Two));
        assert_eq!(engine.status, MatchStatus::Playing);
    }

    #[test]
    fn same_seed_serves_identically() {
        let a = playing_engine(5, 42);
        let b = playing_engine(5, 42);
        assert_eq!(a.ball, b.ball);
    }

    #[test]
    fn advance_is_noop_until_playing() {
        let mut engine = Engine::new("ROOM", 5, 1);
        engine.set_paddle_direction(PlayerSlot::One, PaddleDirection::Up);
        let events = engine.advance(tick_delta());
        assert_eq!(events, TickEvents::default());
        assert_eq!(engine.paddle(PlayerSlot::One).y, 50.0);
    }

    #[test]
    fn ball_moves_by_velocity() {
        let mut engine = playing_engine(5, 1);
        engine.ball.vel_x = 1.0;
        engine.ball.vel_y = 0.5;
        engine.advance(tick_delta());
        assert!((engine.ball.x - 51.0).abs() < 0.01);
        assert!((engine.ball.y - 50.5).abs() < 0.01);
    }

    #[test]
    fn paddles_stay_in_bounds() {
        let mut engine = playing_engine(5, 2);
        engine.set_paddle_direction(PlayerSlot::One, PaddleDirection::Up);
        engine.set_paddle_direction(PlayerSlot::Two, PaddleDirection::Down);
        for _ in 0..100 {
            // Keep the ball parked so nobody scores
            engine.ball = BallState::centered();
            engine.advance(tick_delta());
            let p1 = engine.paddle(PlayerSlot::One).y;
            let p2 = engine.paddle(PlayerSlot::Two).y;
            assert!((10.0..=90.0).contains(&p1));
            assert!((10.0..=90.0).contains(&p2));
        }
        assert_eq!(engine.paddle(PlayerSlot::One).y, 10.0);
        assert_eq!(engine.paddle(PlayerSlot::Two).y, 90.0);
    }

    #[test]
    fn paddle_hit_grows_speed() {
        let mut engine = playing_engine(5, 9);
        engine.ball.x = PADDLE_WIDTH + 2.0;
        engine.ball.y = 50.0;
        engine.ball.vel_x = -0.5;
        engine.ball.vel_y = 0.0;

        let mut hit = false;
        for _ in 0..10 {
            if engine.advance(tick_delta()).paddle_hit {
                hit = true;
                break;
            }
        }
        assert!(hit);
        assert!(engine.ball.vel_x > 0.0);
        let expected = (0.5 * SPEED_GROWTH_FACTOR).min(MAX_BALL_SPEED);
        assert!((engine.ball.velocity_magnitude() - expected).abs() < 1e-4);
    }

    #[test]
    fn wall_hit_reported() {
        let mut engine = playing_engine(5, 4);
        engine.ball.x = 50.0;
        engine.ball.y = 1.5;
        engine.ball.vel_x = 0.5;
        engine.ball.vel_y = -1.0;
        let events = engine.advance(tick_delta());
        assert!(events.wall_hit);
        assert!(engine.ball.vel_y > 0.0);
    }

    #[test]
    fn miss_scores_and_resets_ball() {
        let mut engine = playing_engine(5, 11);
        engine.paddles[0].y = 50.0;
        engine.ball.x = 5.0;
        engine.ball.y = 10.0;
        engine.ball.vel_x = -1.0;
        engine.ball.vel_y = 0.0;

        let mut scored_at = None;
        for tick in 0..15 {
            let events = engine.advance(tick_delta());
            if let Some(scorer) = events.scored {
                assert_eq!(scorer, PlayerSlot::Two);
                assert_eq!((engine.ball.x, engine.ball.y), (50.0, 50.0));
                // Serve goes to the player who was scored on
                assert!(engine.ball.vel_x < 0.0);
                scored_at = Some(tick);
            }
        }
        assert!(scored_at.is_some());
        assert_eq!(engine.score_p2, 1);
        assert_eq!(engine.score_p1, 0);
        assert_eq!(engine.status, MatchStatus::Playing);
    }

    /// Put the ball one step past the left goal line, away from paddle 1
    fn drive_into_left_goal(engine: &mut Engine) {
        engine.ball.x = 0.5;
        engine.ball.y = 5.0;
        engine.ball.vel_x = -1.0;
        engine.ball.vel_y = 0.0;
    }

    fn drive_into_right_goal(engine: &mut Engine) {
        engine.ball.x = 99.5;
        engine.ball.y = 5.0;
        engine.ball.vel_x = 1.0;
        engine.ball.vel_y = 0.0;
    }

    #[test]
    fn serve_goes_to_scorer_while_still_trailing() {
        let mut engine = playing_engine(5, 21);
        engine.score_p1 = 3;
        engine.score_p2 = 1;
        drive_into_left_goal(&mut engine);

        let events = engine.advance(tick_delta());
        assert_eq!(events.scored, Some(PlayerSlot::Two));
        assert_eq!((engine.score_p1, engine.score_p2), (3, 2));
        assert_eq!((engine.ball.x, engine.ball.y), (50.0, 50.0));
        // Player 2 still trails, so the serve heads right
        assert!(engine.ball.vel_x > 0.0);
    }

    #[test]
    fn tying_point_serves_to_player_scored_on() {
        let mut engine = playing_engine(5, 22);
        engine.score_p1 = 1;
        drive_into_left_goal(&mut engine);

        let events = engine.advance(tick_delta());
        assert_eq!(events.scored, Some(PlayerSlot::Two));
        assert_eq!((engine.score_p1, engine.score_p2), (1, 1));
        assert!(engine.ball.vel_x < 0.0);

        let mut engine = playing_engine(5, 23);
        engine.score_p2 = 1;
        drive_into_right_goal(&mut engine);

        let events = engine.advance(tick_delta());
        assert_eq!(events.scored, Some(PlayerSlot::One));
        assert_eq!((engine.score_p1, engine.score_p2), (1, 1));
        assert!(engine.ball.vel_x > 0.0);
    }

    #[test]
    fn reaching_limit_finishes_match() {
        let mut engine = playing_engine(5, 5);
        engine.score_p1 = 4;
        engine.ball.x = 99.5;
        engine.ball.y = 5.0;
        engine.ball.vel_x = 1.0;
        engine.ball.vel_y = 0.0;

        let events = engine.advance(tick_delta());
        assert_eq!(events.scored, Some(PlayerSlot::One));
        assert!(events.match_over);
        assert_eq!(engine.score_p1, 5);
        assert_eq!(engine.status, MatchStatus::Finished);
        assert_eq!(engine.winner, Some(PlayerSlot::One));
        assert_eq!(engine.winner.map(PlayerSlot::label), Some("Player 1"));

        // Frozen after finishing
        engine.set_paddle_direction(PlayerSlot::One, PaddleDirection::Down);
        let before = engine.paddle(PlayerSlot::One).y;
        assert_eq!(engine.advance(tick_delta()), TickEvents::default());
        assert_eq!(engine.paddle(PlayerSlot::One).y, before);
        assert_eq!(engine.score_p1, 5);
    }

    #[test]
    fn scores_only_grow_by_one_per_point() {
        let mut engine = playing_engine(3, 21);
        let mut total = 0;
        // Alternate misses on both sides at heights no paddle covers
        let shots = [
            (99.5, 95.0, 1.0, PlayerSlot::One),
            (0.5, 95.0, -1.0, PlayerSlot::Two),
            (99.5, 5.0, 1.0, PlayerSlot::One),
            (0.5, 5.0, -1.0, PlayerSlot::Two),
            (99.5, 95.0, 1.0, PlayerSlot::One),
        ];
        for (x, y, vel_x, scorer) in shots {
            engine.ball.x = x;
            engine.ball.y = y;
            engine.ball.vel_x = vel_x;
            engine.ball.vel_y = 0.0;
            let events = engine.advance(tick_delta());
            assert_eq!(events.scored, Some(scorer));
            let now = engine.score_p1 + engine.score_p2;
            assert_eq!(now, total + 1);
            total = now;
        }
        assert_eq!(engine.status, MatchStatus::Finished);
        assert_eq!(engine.winner, Some(PlayerSlot::One));
        assert_eq!((engine.score_p1, engine.score_p2), (3, 2));

        // No further points once finished
        engine.ball.x = 99.5;
        assert!(engine.advance(tick_delta()).scored.is_none());
        assert_eq!(engine.score_p1 + engine.score_p2, total);
    }
}
