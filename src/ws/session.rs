//! Per-connection session: validates inbound messages and routes them to
//! the connection's room

use std::sync::Arc;
use tracing::{debug, info};

use crate::game::{PaddleDirection, PlayerSlot};
use crate::room::{ConnectionHandle, Membership, RoomRegistry};
use crate::ws::protocol::{ClientMsg, JoinRole, ServerMsg};

/// Role a connection holds within its room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unassigned,
    Player(PlayerSlot),
    Observer,
}

/// State machine for one connection to one room
pub struct Session {
    room_code: String,
    conn: ConnectionHandle,
    role: Role,
    registry: Arc<RoomRegistry>,
}

impl Session {
    /// Register a new connection for `room_code`
    pub fn connect(registry: Arc<RoomRegistry>, room_code: String, conn: ConnectionHandle) -> Self {
        registry.ensure_room(&room_code);
        info!(room_code = %room_code, conn_id = %conn.id, "Connection opened");
        Self {
            room_code,
            conn,
            role: Role::Unassigned,
            registry,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn player_num(&self) -> Option<u8> {
        match self.role {
            Role::Player(slot) => Some(slot.number()),
            _ => None,
        }
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// Handle one inbound text frame. Protocol errors are answered to this
    /// connection only.
    pub fn handle_text(&mut self, text: &str) {
        match ClientMsg::parse(text) {
            Ok(msg) => self.dispatch(msg),
            Err(e) => {
                debug!(room_code = %self.room_code, conn_id = %self.conn.id, error = %e, "Rejected client message");
                self.conn.send(ServerMsg::error(e.to_string()));
            }
        }
    }

    fn dispatch(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::CreateRoom { points_limit } => self.handle_create_room(points_limit),
            ClientMsg::JoinGame { role } => self.handle_join_game(role),
            ClientMsg::PlayerReady => self.handle_player_ready(),
            ClientMsg::MovePaddle { direction } => self.handle_move_paddle(&direction),
        }
    }

    fn handle_create_room(&mut self, points_limit: Option<i64>) {
        let points_limit = match points_limit {
            None => self.registry.settings().default_points_limit,
            Some(limit) => match u32::try_from(limit) {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    self.conn
                        .send(ServerMsg::error("points_limit must be a positive integer"));
                    return;
                }
            },
        };

        if self.registry.create_engine(&self.room_code, points_limit) {
            self.conn.send(ServerMsg::RoomCreated {
                room_code: self.room_code.clone(),
                points_limit,
            });
        }
    }

    fn handle_join_game(&mut self, requested: JoinRole) {
        match self.role {
            Role::Player(slot) => {
                self.conn.send(ServerMsg::JoinedAsPlayer {
                    player_num: slot.number(),
                    room_code: self.room_code.clone(),
                });
            }
            Role::Observer => {
                self.conn.send(ServerMsg::JoinedAsObserver {
                    room_code: self.room_code.clone(),
                });
            }
            Role::Unassigned => {
                self.role = match self.registry.join(&self.room_code, &self.conn, requested) {
                    Membership::Player(slot) => Role::Player(slot),
                    Membership::Observer => Role::Observer,
                };
            }
        }
    }

    fn handle_player_ready(&mut self) {
        let Role::Player(slot) = self.role else {
            return;
        };
        self.registry.mark_ready(&self.room_code, self.conn.id, slot);
    }

    fn handle_move_paddle(&mut self, direction: &str) {
        let Role::Player(slot) = self.role else {
            return;
        };
        let Some(direction) = PaddleDirection::parse(direction) else {
            return;
        };
        self.registry
            .set_paddle_direction(&self.room_code, self.conn.id, slot, direction);
    }

    /// Leave the room. Consumes the session so it runs exactly once.
    pub fn disconnect(self) {
        let destroyed = self.registry.detach(&self.room_code, self.conn.id);
        info!(
            room_code = %self.room_code,
            conn_id = %self.conn.id,
            role = ?self.role,
            room_destroyed = destroyed,
            "Connection closed"
        );
    }
}
