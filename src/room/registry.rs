//! Process-wide registry of active rooms

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::snapshot::GameSnapshot;
use crate::game::{Engine, MatchStatus, PaddleDirection, PlayerSlot};
use crate::store::MatchRecorder;
use crate::ws::protocol::{JoinRole, ServerMsg};

use super::simulation;
use super::{ConnectionHandle, Room, RoomState};

/// Settings applied to newly created rooms
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Point limit used when a match is created by `join_game`
    pub default_points_limit: u32,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            default_points_limit: 5,
        }
    }
}

/// Role a connection ended up with after joining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Player(PlayerSlot),
    Observer,
}

/// Registry of all active rooms.
///
/// Rooms are only reachable through these operations. Each room serializes
/// its own mutations behind a mutex; the map itself is only touched to
/// create or drop rooms.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    settings: RoomSettings,
    recorder: MatchRecorder,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings, recorder: MatchRecorder) -> Self {
        Self {
            rooms: DashMap::new(),
            settings,
            recorder,
        }
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    /// Return the room for `code`, creating an empty one if needed
    pub fn ensure_room(&self, code: &str) -> Arc<Room> {
        self.rooms
            .entry(code.to_string())
            .or_insert_with(|| {
                info!(room_code = %code, "Room created");
                Arc::new(Room::new(code))
            })
            .value()
            .clone()
    }

    /// Run `f` against a live room, creating it if needed
    fn with_room<R>(&self, code: &str, f: impl FnOnce(&Arc<Room>, &mut RoomState) -> R) -> R {
        loop {
            let room = self.ensure_room(code);
            let mut state = room.lock();
            if state.is_closed() {
                // Lost a race with teardown; the next lookup creates a fresh room
                drop(state);
                self.rooms.remove_if(code, |_, r| Arc::ptr_eq(r, &room));
                continue;
            }
            return f(&room, &mut *state);
        }
    }

    /// Run `f` against an existing room only
    fn with_existing_room<R>(
        &self,
        code: &str,
        f: impl FnOnce(&Arc<Room>, &mut RoomState) -> R,
    ) -> Option<R> {
        let room = self.rooms.get(code)?.value().clone();
        let mut state = room.lock();
        if state.is_closed() {
            return None;
        }
        Some(f(&room, &mut *state))
    }

    /// Attach an engine with `points_limit` unless the room already has one.
    /// Returns true if this call created it.
    pub fn create_engine(&self, code: &str, points_limit: u32) -> bool {
        self.with_room(code, |_, state| {
            if state.engine.is_some() {
                return false;
            }
            state.engine = Some(Engine::new(code, points_limit, rand::random()));
            info!(room_code = %code, points_limit, "Match created");
            true
        })
    }

    /// Join a room as a player or observer.
    ///
    /// A player request on a full room is downgraded to observer. The joiner
    /// is acknowledged and the room receives the current status, all under
    /// the room lock so no other join interleaves.
    pub fn join(&self, code: &str, conn: &ConnectionHandle, role: JoinRole) -> Membership {
        let default_limit = self.settings.default_points_limit;
        self.with_room(code, |_, state| {
            if state.engine.is_none() {
                state.engine = Some(Engine::new(code, default_limit, rand::random()));
                info!(room_code = %code, points_limit = default_limit, "Match created");
            }

            let slot = match role {
                JoinRole::Player => state_attach_player(state, conn),
                JoinRole::Observer => None,
            };

            let membership = match slot {
                Some(slot) => {
                    conn.send(ServerMsg::JoinedAsPlayer {
                        player_num: slot.number(),
                        room_code: code.to_string(),
                    });
                    info!(room_code = %code, conn_id = %conn.id, player_num = slot.number(), "Player joined");
                    Membership::Player(slot)
                }
                None => {
                    state.attach_observer(conn);
                    conn.send(ServerMsg::JoinedAsObserver {
                        room_code: code.to_string(),
                    });
                    info!(room_code = %code, conn_id = %conn.id, "Observer joined");
                    Membership::Observer
                }
            };

            broadcast_status(state);
            membership
        })
    }

    /// Mark a player ready; starts the simulation once the match is playing
    pub fn mark_ready(&self, code: &str, conn_id: Uuid, slot: PlayerSlot) -> Option<MatchStatus> {
        self.with_existing_room(code, |room, state| {
            if state.slot_of(conn_id) != Some(slot) {
                return None;
            }
            let engine = state.engine.as_mut()?;
            engine.set_ready(slot);
            let status = engine.status;

            broadcast_status(state);
            self.start_simulation_locked(room, state);
            Some(status)
        })
        .flatten()
    }

    /// Store a paddle direction for the caller's slot while playing
    pub fn set_paddle_direction(
        &self,
        code: &str,
        conn_id: Uuid,
        slot: PlayerSlot,
        direction: PaddleDirection,
    ) -> bool {
        self.with_existing_room(code, |_, state| {
            if state.slot_of(conn_id) != Some(slot) {
                return false;
            }
            match state.engine.as_mut() {
                Some(engine) if engine.status == MatchStatus::Playing => {
                    engine.set_paddle_direction(slot, direction);
                    true
                }
                _ => false,
            }
        })
        .unwrap_or(false)
    }

    /// Spawn the simulation task if the match is playing and none is running
    pub fn start_simulation_if_playing(&self, code: &str) -> bool {
        self.with_existing_room(code, |room, state| self.start_simulation_locked(room, state))
            .unwrap_or(false)
    }

    fn start_simulation_locked(&self, room: &Arc<Room>, state: &mut RoomState) -> bool {
        let playing = state
            .engine
            .as_ref()
            .is_some_and(|e| e.status == MatchStatus::Playing);
        if !playing || state.simulation_running() {
            return false;
        }

        let generation = state.next_generation;
        state.next_generation += 1;
        state.simulation = Some(simulation::spawn(
            room.clone(),
            generation,
            self.recorder.clone(),
        ));
        info!(room_code = %room.code, generation, "Simulation started");
        true
    }

    /// Remove a connection from its room. Returns true if the room was
    /// destroyed as a result.
    pub fn detach(&self, code: &str, conn_id: Uuid) -> bool {
        let Some(room) = self.rooms.get(code).map(|r| r.value().clone()) else {
            return false;
        };
        let mut state = room.lock();
        if state.is_closed() {
            return false;
        }

        if let Some(slot) = state.slot_of(conn_id) {
            state.players[slot.index()] = None;
            state.cancel_simulation();
            state.broadcast(&ServerMsg::PlayerDisconnected {
                player_num: slot.number(),
            });
            info!(room_code = %code, conn_id = %conn_id, player_num = slot.number(), "Player left");
        } else if state.observers.remove(&conn_id).is_some() {
            debug!(room_code = %code, conn_id = %conn_id, "Observer left");
        }

        if !state.is_empty() {
            return false;
        }

        state.cancel_simulation();
        state.closed = true;
        drop(state);
        self.rooms.remove_if(code, |_, r| Arc::ptr_eq(r, &room));
        info!(room_code = %code, "Room destroyed");
        true
    }

    /// Current snapshot of a room's match
    pub fn snapshot(&self, code: &str) -> Option<GameSnapshot> {
        self.with_existing_room(code, |_, state| state.engine.as_ref().map(Engine::snapshot))
            .flatten()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn active_simulations(&self) -> usize {
        self.rooms
            .iter()
            .filter(|entry| entry.value().lock().simulation_running())
            .count()
    }
}

fn state_attach_player(state: &mut RoomState, conn: &ConnectionHandle) -> Option<PlayerSlot> {
    let slot = state.attach_player(conn)?;
    if let Some(engine) = state.engine.as_mut() {
        if engine.join(slot) {
            debug!(room_code = %engine.room_code, status = ?engine.status, "Both players connected");
        }
    }
    Some(slot)
}

fn broadcast_status(state: &RoomState) {
    if let Some(engine) = state.engine.as_ref() {
        state.broadcast(&ServerMsg::StatusChange {
            status: engine.status,
        });
    }
}
