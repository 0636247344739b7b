//! Snapshot building for network transmission

use serde::{Deserialize, Serialize};

use super::{Engine, MatchStatus, PlayerSlot};

/// Decimal places kept for positions on the wire
const WIRE_PRECISION: i32 = 2;

fn round_for_wire(value: f32) -> f32 {
    let factor = 10f32.powi(WIRE_PRECISION);
    (value * factor).round() / factor
}

/// Complete externally visible state of a match at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub status: MatchStatus,
    pub p1_y: f32,
    pub p2_y: f32,
    pub ball_x: f32,
    pub ball_y: f32,
    pub score_p1: u32,
    pub score_p2: u32,
    pub winner: Option<PlayerSlot>,
}

/// Result of a finished match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub winner: PlayerSlot,
    /// Player 1 score first
    pub final_score: [u32; 2],
    pub room_code: String,
    pub points_limit: u32,
}

impl Engine {
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            status: self.status,
            p1_y: round_for_wire(self.paddle(PlayerSlot::One).y),
            p2_y: round_for_wire(self.paddle(PlayerSlot::Two).y),
            ball_x: round_for_wire(self.ball.x),
            ball_y: round_for_wire(self.ball.y),
            score_p1: self.score_p1,
            score_p2: self.score_p2,
            winner: self.winner,
        }
    }

    /// Summary of the match; only available once it has finished
    pub fn match_summary(&self) -> Option<MatchSummary> {
        if self.status != MatchStatus::Finished {
            return None;
        }
        let winner = self.winner?;
        Some(MatchSummary {
            winner,
            final_score: [self.score_p1, self.score_p2],
            room_code: self.room_code.clone(),
            points_limit: self.points_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_rounds_positions() {
        let mut engine = Engine::new("SNAP", 5, 1);
        engine.ball.x = 12.34567;
        engine.ball.y = 0.005;
        engine.paddles[0].y = 33.333_33;

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.ball_x, 12.35);
        assert_eq!(snapshot.p1_y, 33.33);
        assert_eq!(snapshot.p2_y, 50.0);
        assert_eq!(snapshot.status, MatchStatus::WaitingForOpponent);
        assert!(snapshot.winner.is_none());
    }

    #[test]
    fn snapshot_serializes_null_winner() {
        let engine = Engine::new("SNAP", 5, 1);
        let value = serde_json::to_value(engine.snapshot()).unwrap();
        assert_eq!(value["status"], "waiting_for_opponent");
        assert!(value["winner"].is_null());
        assert_eq!(value["score_p1"], 0);
    }

    #[test]
    fn summary_only_when_finished() {
        let mut engine = Engine::new("SUM", 3, 1);
        assert!(engine.match_summary().is_none());

        engine.status = MatchStatus::Finished;
        engine.winner = Some(PlayerSlot::Two);
        engine.score_p1 = 1;
        engine.score_p2 = 3;

        let summary = engine.match_summary().unwrap();
        assert_eq!(summary.final_score, [1, 3]);
        assert_eq!(summary.room_code, "SUM");
        assert_eq!(summary.points_limit, 3);

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["winner"], "Player 2");
        assert_eq!(value["final_score"], serde_json::json!([1, 3]));
    }
}
