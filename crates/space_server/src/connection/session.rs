//! Per-connection session state.
//!
//! A [`Session`] is created once a connection has passed the gatekeeper and
//! lives exactly as long as that connection. It holds the participant's
//! identity, position, room membership and media peer identifier, and owns
//! the sending half of the connection's outbound channel.

use super::ConnectionId;
use crate::auth::Identity;
use crate::error::DeliveryError;
use crate::messaging::{MemberView, ServerMessage};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// A point in the 2-D space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance between two points.
    pub fn distance(&self, other: Position) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Items queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A message to serialize and send as a text frame
    Message(ServerMessage),
    /// Close the connection after everything queued before it has been sent
    Close(String),
}

/// Mutable state of a session.
///
/// Everything except `position` is `None` until a join completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Stable account id, set on join
    pub user_id: Option<String>,
    /// Display name, set on join
    pub username: Option<String>,
    /// Avatar image reference, set on join
    pub avatar_image_url: Option<String>,
    /// Room this session belongs to
    pub room_id: Option<String>,
    /// Identifier used by the external media negotiation service
    pub peer_id: Option<String>,
    /// Current position
    pub position: Position,
}

impl SessionState {
    /// Returns `true` once the session has joined a room.
    pub fn is_joined(&self) -> bool {
        self.room_id.is_some()
    }
}

/// Live state for one connected participant.
///
/// Rooms hold `Arc<Session>` for lookup and fan-out only; the session's
/// lifetime is governed by its connection handler.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    identity: Identity,
    state: RwLock<SessionState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: AtomicBool,
}

impl Session {
    /// Creates a session that sends through the given outbound channel.
    pub fn new(id: ConnectionId, identity: Identity, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            identity,
            state: RwLock::new(SessionState::default()),
            outbound,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a session with a fresh connection ID together with the
    /// receiving half of its outbound channel.
    pub fn channel(identity: Identity) -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self::new(ConnectionId::new(), identity, sender)), receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Claims attached by the gatekeeper when the connection was admitted.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Queues a message for this session's connection.
    ///
    /// Fails only when the connection's writer has gone away.
    pub fn send(&self, message: ServerMessage) -> Result<(), DeliveryError> {
        self.outbound
            .send(Outbound::Message(message))
            .map_err(|_| DeliveryError(self.id))
    }

    /// Asks the writer to close the connection once pending messages are out.
    pub fn disconnect(&self, reason: impl Into<String>) {
        // A writer that is already gone has nothing left to close.
        let _ = self.outbound.send(Outbound::Close(reason.into()));
    }

    /// Marks the session closed. Returns `true` only for the first caller.
    pub fn begin_close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn room_id(&self) -> Option<String> {
        self.state.read().await.room_id.clone()
    }

    pub async fn position(&self) -> Position {
        self.state.read().await.position
    }

    /// Overwrites the position. No bounds are enforced here.
    pub async fn set_position(&self, position: Position) {
        self.state.write().await.position = position;
    }

    /// Records a completed join.
    pub async fn mark_joined(
        &self,
        room_id: &str,
        peer_id: &str,
        avatar_image_url: &str,
        spawn: Position,
    ) {
        let mut state = self.state.write().await;
        state.user_id = Some(self.identity.user_id.clone());
        state.username = Some(self.identity.username.clone());
        state.avatar_image_url = Some(avatar_image_url.to_string());
        state.room_id = Some(room_id.to_string());
        state.peer_id = Some(peer_id.to_string());
        state.position = spawn;
    }

    /// Clears room membership and the peer identifier, returning the room the
    /// session was in.
    pub async fn leave_room(&self) -> Option<String> {
        let mut state = self.state.write().await;
        state.peer_id = None;
        state.room_id.take()
    }

    /// Public fields other room members get to see, or `None` if not joined.
    pub async fn member_view(&self) -> Option<MemberView> {
        let state = self.state.read().await;
        if !state.is_joined() {
            return None;
        }
        Some(MemberView {
            id: self.id,
            user_id: state.user_id.clone(),
            username: state.username.clone(),
            avatar_image_url: state.avatar_image_url.clone(),
            peer_id: state.peer_id.clone(),
            x: state.position.x,
            y: state.position.y,
        })
    }
}
