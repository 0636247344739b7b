//! Fixed-rate simulation loop, one per playing room

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::game::MatchStatus;
use crate::store::{MatchRecord, MatchRecorder};
use crate::util::time::{tick_delta, tick_duration};
use crate::ws::protocol::ServerMsg;

use super::{Room, SimulationHandle};

/// Spawn the loop for `room` and return its handle
pub fn spawn(room: Arc<Room>, generation: u64, recorder: MatchRecorder) -> SimulationHandle {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let task = tokio::spawn(run(room, generation, cancel_rx, recorder));
    SimulationHandle {
        generation,
        cancel: cancel_tx,
        task,
    }
}

/// Whether the loop should keep ticking after a step
enum Step {
    Continue,
    Stop,
}

async fn run(
    room: Arc<Room>,
    generation: u64,
    mut cancel: watch::Receiver<bool>,
    recorder: MatchRecorder,
) {
    let mut ticker = interval(tick_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = cancel.changed() => {
                // Cancelled, or the handle was dropped with its room
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
        }

        if let Step::Stop = step(&room, generation, &cancel, &recorder) {
            return;
        }
    }

    debug!(room_code = %room.code, generation, "Simulation cancelled");
}

/// Advance one tick and broadcast the result. Runs entirely under the room
/// lock, so cancellation observed here means nothing more is sent.
fn step(
    room: &Room,
    generation: u64,
    cancel: &watch::Receiver<bool>,
    recorder: &MatchRecorder,
) -> Step {
    let mut state = room.lock();
    if *cancel.borrow() || state.is_closed() {
        debug!(room_code = %room.code, generation, "Simulation cancelled");
        return Step::Stop;
    }

    let Some((events, snapshot, status, summary)) = state.engine.as_mut().map(|engine| {
        let events = engine.advance(tick_delta());
        (events, engine.snapshot(), engine.status, engine.match_summary())
    }) else {
        state.clear_simulation(generation);
        return Step::Stop;
    };

    if let Some(scorer) = events.scored {
        debug!(
            room_code = %room.code,
            scorer = scorer.label(),
            score_p1 = snapshot.score_p1,
            score_p2 = snapshot.score_p2,
            "Point scored"
        );
    }

    state.broadcast(&ServerMsg::GameUpdate(snapshot));

    if let Some(summary) = summary {
        info!(
            room_code = %room.code,
            winner = summary.winner.label(),
            score_p1 = summary.final_score[0],
            score_p2 = summary.final_score[1],
            "Match finished"
        );
        recorder.record(MatchRecord::from_summary(&summary));
        state.broadcast(&ServerMsg::GameOver(summary));
        state.clear_simulation(generation);
        return Step::Stop;
    }

    if status != MatchStatus::Playing {
        state.clear_simulation(generation);
        return Step::Stop;
    }

    Step::Continue
}
