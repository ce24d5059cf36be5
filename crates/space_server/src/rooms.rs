//! Room registry.
//!
//! The registry is the single source of truth for which sessions are in
//! which room. Rooms are created lazily on the first join and deleted on the
//! leave that empties them, so an empty room never exists.
//!
//! All operations take one process-wide lock. Rooms hold tens of members,
//! and nothing done under the lock waits on the network: delivering to a
//! member is a push onto its unbounded outbound channel.
//!
//! Session state locks may be taken while the registry lock is held, never
//! the other way round.

use crate::connection::Session;
use crate::error::DeliveryError;
use crate::messaging::{MemberView, ServerMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Process-wide mapping from room id to the sessions currently in it.
///
/// Constructed once per server and shared through an `Arc`.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Vec<Arc<Session>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session to a room, creating the room if needed.
    ///
    /// Adding a session that is already a member (same connection id) is a
    /// no-op. Returns `true` if the session was inserted.
    pub async fn add_user(&self, room_id: &str, session: Arc<Session>) -> bool {
        let mut rooms = self.rooms.write().await;
        insert_member(&mut rooms, room_id, session)
    }

    /// Adds a session to a room and queues it the message built by `welcome`
    /// from the public views of the other members.
    ///
    /// The welcome is queued before the lock is released, so no broadcast to
    /// the room can reach the joiner ahead of it.
    pub async fn add_user_with_welcome<F>(
        &self,
        room_id: &str,
        session: Arc<Session>,
        welcome: F,
    ) -> Result<bool, DeliveryError>
    where
        F: FnOnce(Vec<MemberView>) -> ServerMessage,
    {
        let mut rooms = self.rooms.write().await;
        let inserted = insert_member(&mut rooms, room_id, session.clone());

        let mut others = Vec::new();
        for member in rooms.get(room_id).map(Vec::as_slice).unwrap_or_default() {
            if member.id() == session.id() {
                continue;
            }
            if let Some(view) = member.member_view().await {
                others.push(view);
            }
        }

        session.send(welcome(others))?;
        Ok(inserted)
    }

    /// Removes a session from a room, deleting the room if it is now empty.
    ///
    /// Logs and does nothing if the room does not exist. Returns `true` if the
    /// session was a member.
    pub async fn remove_user(&self, session: &Session, room_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room_id) else {
            warn!(
                "Room {} not found when trying to remove user {}",
                room_id,
                session.id()
            );
            return false;
        };

        let before = members.len();
        members.retain(|m| m.id() != session.id());
        let removed = members.len() != before;

        if members.is_empty() {
            rooms.remove(room_id);
            info!("🧹 Room {} deleted (no users left)", room_id);
        }
        if removed {
            debug!("User {} removed from room {}", session.id(), room_id);
        }
        removed
    }

    /// Delivers `message` to every member of the room except `sender`.
    ///
    /// A member whose connection can no longer accept messages is logged and
    /// evicted; delivery to the remaining members continues. Returns the
    /// number of members the message was delivered to.
    pub async fn broadcast(&self, message: &ServerMessage, sender: &Session, room_id: &str) -> usize {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room_id) else {
            warn!("Room {} not found for broadcasting", room_id);
            return 0;
        };

        let mut delivered = 0;
        members.retain(|member| {
            if member.id() == sender.id() {
                return true;
            }
            match member.send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    error!("Error sending message to user {}: {}", member.id(), e);
                    false
                }
            }
        });

        if members.is_empty() {
            rooms.remove(room_id);
            info!("🧹 Room {} deleted (no users left)", room_id);
        }
        delivered
    }

    /// Snapshot of a room's members in join order, or `None` if it does not exist.
    pub async fn get_users(&self, room_id: &str) -> Option<Vec<Arc<Session>>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Number of members in a room; zero if it does not exist.
    pub async fn get_user_count(&self, room_id: &str) -> usize {
        self.rooms.read().await.get(room_id).map_or(0, Vec::len)
    }

    /// Ids of all rooms that currently have members.
    pub async fn room_ids(&self) -> Vec<String> {
        self.rooms.read().await.keys().cloned().collect()
    }

    /// Member count per room.
    pub async fn room_stats(&self) -> HashMap<String, usize> {
        self.rooms
            .read()
            .await
            .iter()
            .map(|(room_id, members)| (room_id.clone(), members.len()))
            .collect()
    }
}

fn insert_member(rooms: &mut HashMap<String, Vec<Arc<Session>>>, room_id: &str, session: Arc<Session>) -> bool {
    match rooms.get_mut(room_id) {
        None => {
            info!("🏠 Room {} created with user {}", room_id, session.id());
            rooms.insert(room_id.to_string(), vec![session]);
            true
        }
        Some(members) if members.iter().any(|m| m.id() == session.id()) => {
            debug!("User {} already in room {}", session.id(), room_id);
            false
        }
        Some(members) => {
            debug!("User {} added to room {}", session.id(), room_id);
            members.push(session);
            true
        }
    }
}
