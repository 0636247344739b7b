//! Finished-match records and the background writer that stores them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::game::snapshot::MatchSummary;

use super::SupabaseClient;

/// Table finished matches are written to
pub const HISTORY_TABLE: &str = "match_history";

/// One finished match, as handed to persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub room_code: String,
    pub player1_score: u32,
    pub player2_score: u32,
    /// "Player 1" or "Player 2"
    pub winner: String,
    pub points_limit: u32,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn from_summary(summary: &MatchSummary) -> Self {
        Self {
            room_code: summary.room_code.clone(),
            player1_score: summary.final_score[0],
            player2_score: summary.final_score[1],
            winner: summary.winner.label().to_string(),
            points_limit: summary.points_limit,
            created_at: Utc::now(),
        }
    }
}

/// Hands finished matches to the history writer without waiting on storage
#[derive(Debug, Clone)]
pub struct MatchRecorder {
    tx: mpsc::UnboundedSender<MatchRecord>,
}

impl MatchRecorder {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MatchRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn record(&self, record: MatchRecord) {
        if let Err(e) = self.tx.send(record) {
            warn!(room_code = %e.0.room_code, "History writer gone, match not recorded");
        }
    }
}

/// Drain recorded matches into Supabase, or just log them when no store is
/// configured
pub async fn run_history_writer(
    mut rx: mpsc::UnboundedReceiver<MatchRecord>,
    client: Option<SupabaseClient>,
) {
    while let Some(record) = rx.recv().await {
        match &client {
            Some(client) => match client.insert(HISTORY_TABLE, &record).await {
                Ok(()) => info!(room_code = %record.room_code, "Match history saved"),
                Err(e) => error!(room_code = %record.room_code, error = %e, "Failed to save match history"),
            },
            None => info!(
                room_code = %record.room_code,
                winner = %record.winner,
                player1_score = record.player1_score,
                player2_score = record.player2_score,
                points_limit = record.points_limit,
                "Match finished (history store not configured)"
            ),
        }
    }
}
