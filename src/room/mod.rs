//! Rooms: one match plus the connections watching or playing it

pub mod registry;
pub mod simulation;

pub use registry::{Membership, RoomRegistry, RoomSettings};

use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::game::{Engine, PlayerSlot};
use crate::ws::protocol::ServerMsg;

/// Outbound side of one client connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    tx: mpsc::Sender<ServerMsg>,
}

impl ConnectionHandle {
    /// Create a handle plus the receiver its transport drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    /// Queue a message without blocking. Returns false if it was dropped.
    pub fn send(&self, msg: ServerMsg) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, "Outbound queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(conn_id = %self.id, "Connection closed, dropping message");
                false
            }
        }
    }
}

/// Handle to a running simulation task
pub struct SimulationHandle {
    pub generation: u64,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SimulationHandle {
    /// Signal the loop to stop at its next iteration boundary. Idempotent.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Mutable room state, guarded by the room's mutex
#[derive(Default)]
pub struct RoomState {
    pub engine: Option<Engine>,
    players: [Option<ConnectionHandle>; 2],
    observers: HashMap<Uuid, ConnectionHandle>,
    simulation: Option<SimulationHandle>,
    next_generation: u64,
    /// Set once the room has been removed from the registry
    closed: bool,
}

impl RoomState {
    /// Assign the first free slot, or None if both are taken
    pub fn attach_player(&mut self, conn: &ConnectionHandle) -> Option<PlayerSlot> {
        let slot = PlayerSlot::ALL
            .into_iter()
            .find(|slot| self.players[slot.index()].is_none())?;
        self.players[slot.index()] = Some(conn.clone());
        Some(slot)
    }

    pub fn attach_observer(&mut self, conn: &ConnectionHandle) {
        self.observers.insert(conn.id, conn.clone());
    }

    /// Slot held by a connection, if any
    pub fn slot_of(&self, conn_id: Uuid) -> Option<PlayerSlot> {
        PlayerSlot::ALL.into_iter().find(|slot| {
            self.players[slot.index()]
                .as_ref()
                .is_some_and(|c| c.id == conn_id)
        })
    }

    pub fn is_observer(&self, conn_id: Uuid) -> bool {
        self.observers.contains_key(&conn_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.iter().flatten().count()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.player_count() == 0 && self.observers.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send to every connection that has joined this room
    pub fn broadcast(&self, msg: &ServerMsg) {
        for conn in self.players.iter().flatten().chain(self.observers.values()) {
            conn.send(msg.clone());
        }
    }

    pub fn simulation_running(&self) -> bool {
        self.simulation.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Cancel and forget the running simulation, if any
    pub fn cancel_simulation(&mut self) {
        if let Some(simulation) = self.simulation.take() {
            simulation.cancel();
        }
    }

    /// Forget the simulation handle if it still belongs to `generation`
    fn clear_simulation(&mut self, generation: u64) {
        if self
            .simulation
            .as_ref()
            .is_some_and(|s| s.generation == generation)
        {
            self.simulation = None;
        }
    }
}

/// One match and its connection group
pub struct Room {
    pub code: String,
    state: Mutex<RoomState>,
}

impl Room {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            state: Mutex::new(RoomState::default()),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock()
    }
}
