//! Message routing for live sessions.
//!
//! The [`MessageRouter`] decodes each inbound frame, dispatches it to the
//! join or move handler and turns every failure into something the client
//! can act on:
//!
//! * A join that references a missing account profile or space sends an
//!   `error` message and closes the connection.
//! * Any other failure (a malformed frame, a directory fault or timeout) is
//!   logged and answered with the generic `Internal server error`. The
//!   connection stays open.
//! * Unknown message kinds are logged and ignored.
//!
//! The router is also responsible for the leave sequence run when a
//! connection closes, see [`MessageRouter::disconnect`].

use crate::config::{ServerConfig, SpawnRegion};
use crate::connection::{ConnectionId, Position, Session};
use crate::directory::{SpaceDirectory, UserDirectory};
use crate::error::{DirectoryError, SessionError};
use crate::messaging::types::{
    ClientMessage, JoinPayload, MovePayload, MovementPayload, ServerMessage, Spawn,
    SpaceJoinedPayload, UserLeftPayload,
};
use crate::proximity::{self, Participant};
use crate::rooms::RoomRegistry;
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// What the connection handler should do after a message has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep reading messages
    Continue,
    /// The session was told to close; stop reading
    Disconnect,
}

/// Dispatches decoded client messages against the shared room registry.
pub struct MessageRouter {
    rooms: Arc<RoomRegistry>,
    users: Arc<dyn UserDirectory>,
    spaces: Arc<dyn SpaceDirectory>,
    call_radius: f64,
    spawn: SpawnRegion,
    lookup_timeout: Duration,
}

impl MessageRouter {
    pub fn new(
        rooms: Arc<RoomRegistry>,
        users: Arc<dyn UserDirectory>,
        spaces: Arc<dyn SpaceDirectory>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            rooms,
            users,
            spaces,
            call_radius: config.call_radius,
            spawn: config.spawn,
            lookup_timeout: config.lookup_timeout(),
        }
    }

    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    /// Handles one text frame from `session`.
    ///
    /// Never fails: every error is reported to the session and logged here.
    pub async fn route(&self, session: &Arc<Session>, text: &str) -> Disposition {
        let outcome = match ClientMessage::parse(text) {
            Ok(message) => self.dispatch(session, message).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => Disposition::Continue,
            Err(SessionError::Validation(reason)) => {
                warn!("🚫 Connection {} rejected: {}", session.id(), reason);
                let _ = session.send(ServerMessage::error(reason.clone()));
                session.disconnect(reason);
                Disposition::Disconnect
            }
            Err(e) => {
                error!("❌ Error handling message from {}: {}", session.id(), e);
                if session.send(ServerMessage::internal_error()).is_err() {
                    trace!("Connection {} already gone, error not delivered", session.id());
                }
                Disposition::Continue
            }
        }
    }

    /// Handles an already decoded message.
    pub async fn dispatch(&self, session: &Arc<Session>, message: ClientMessage) -> Result<(), SessionError> {
        match message {
            ClientMessage::Join(payload) => self.handle_join(session, payload).await,
            ClientMessage::Move(payload) => self.handle_move(session, payload).await,
            ClientMessage::Unsupported { kind } => {
                warn!("Unknown message type: {} (from {})", kind, session.id());
                Ok(())
            }
        }
    }

    async fn handle_join(&self, session: &Arc<Session>, payload: JoinPayload) -> Result<(), SessionError> {
        let user_id = session.identity().user_id.clone();

        let profile = self
            .lookup(self.users.find_profile(&user_id))
            .await?
            .ok_or_else(|| SessionError::Validation("user data not found!".to_string()))?;

        self.lookup(self.spaces.find_space(&payload.space_id))
            .await?
            .ok_or_else(|| SessionError::Validation("Space not found".to_string()))?;

        // A session belongs to at most one room
        if let Some(previous) = session.room_id().await {
            if previous != payload.space_id {
                debug!("Connection {} switching from room {} to {}", session.id(), previous, payload.space_id);
                self.leave(session).await;
            }
        }

        let spawn = self.spawn_position();
        session
            .mark_joined(&payload.space_id, &payload.peer_id, &profile.avatar_image_url, spawn)
            .await;
        let avatar_image_url = profile.avatar_image_url.clone();
        self.rooms
            .add_user_with_welcome(&payload.space_id, session.clone(), |users| {
                ServerMessage::SpaceJoined(SpaceJoinedPayload {
                    spawn: Spawn {
                        x: spawn.x,
                        y: spawn.y,
                        avatar_image_url: Some(avatar_image_url),
                    },
                    users,
                })
            })
            .await
            .map_err(|e| SessionError::Fault(e.to_string()))?;

        if let Some(view) = session.member_view().await {
            self.rooms
                .broadcast(&ServerMessage::UserJoined(view), session, &payload.space_id)
                .await;
        }

        info!(
            "👤 {} ({}) joined space {} at ({:.1}, {:.1})",
            session.identity().username,
            session.id(),
            payload.space_id,
            spawn.x,
            spawn.y
        );
        Ok(())
    }

    async fn handle_move(&self, session: &Arc<Session>, payload: MovePayload) -> Result<(), SessionError> {
        let Some(room_id) = session.room_id().await else {
            debug!("Ignoring move from {} before it joined a space", session.id());
            return Ok(());
        };
        if let Some(claimed) = payload.space_id.as_deref() {
            if claimed != room_id {
                debug!(
                    "Move from {} names space {} but session is in {}",
                    session.id(),
                    claimed,
                    room_id
                );
            }
        }

        session.set_position(Position::new(payload.x, payload.y)).await;
        let user_id = session.snapshot().await.user_id;

        self.rooms
            .broadcast(
                &ServerMessage::Movement(MovementPayload {
                    x: payload.x,
                    y: payload.y,
                    user_id,
                }),
                session,
                &room_id,
            )
            .await;

        self.evaluate_proximity(session, &room_id).await;
        Ok(())
    }

    /// Runs the proximity evaluator for `session` and delivers its signals.
    async fn evaluate_proximity(&self, session: &Arc<Session>, room_id: &str) {
        let mover = Participant::from_state(session.id(), &session.snapshot().await);

        let mut others = Vec::new();
        let mut recipients: HashMap<ConnectionId, Arc<Session>> = HashMap::new();
        for member in self.rooms.get_users(room_id).await.unwrap_or_default() {
            if member.id() == session.id() {
                continue;
            }
            others.push(Participant::from_state(member.id(), &member.snapshot().await));
            recipients.insert(member.id(), member);
        }

        for signal in proximity::evaluate(&mover, &others, self.call_radius) {
            let recipient = if signal.recipient == session.id() {
                Some(session)
            } else {
                recipients.get(&signal.recipient)
            };
            let Some(recipient) = recipient else {
                continue;
            };
            if let Err(e) = recipient.send(signal.into_message()) {
                warn!("Proximity signal not delivered: {}", e);
            }
        }
    }

    /// Runs the leave sequence for a closing connection.
    ///
    /// Only the first call for a session does anything; later calls, from
    /// a competing close path, are no-ops.
    pub async fn disconnect(&self, session: &Arc<Session>) {
        if !session.begin_close() {
            trace!("Connection {} already closed", session.id());
            return;
        }
        self.leave(session).await;
    }

    /// Announces the departure to the rest of the room and drops the
    /// session's membership. Does nothing for a session that never joined.
    async fn leave(&self, session: &Arc<Session>) {
        let state = session.snapshot().await;
        let Some(room_id) = state.room_id else {
            return;
        };

        self.rooms
            .broadcast(
                &ServerMessage::UserLeft(UserLeftPayload {
                    id: session.id(),
                    user_id: state.user_id,
                }),
                session,
                &room_id,
            )
            .await;
        self.rooms.remove_user(session, &room_id).await;
        session.leave_room().await;

        info!("👋 {} ({}) left space {}", session.identity().username, session.id(), room_id);
    }

    fn spawn_position(&self) -> Position {
        let mut rng = rand::thread_rng();
        Position::new(
            rng.gen_range(self.spawn.min_x..=self.spawn.max_x),
            rng.gen_range(self.spawn.min_y..=self.spawn.max_y),
        )
    }

    /// Bounds a directory lookup by the configured timeout.
    async fn lookup<T>(
        &self,
        request: impl Future<Output = Result<Option<T>, DirectoryError>>,
    ) -> Result<Option<T>, DirectoryError> {
        tokio::time::timeout(self.lookup_timeout, request)
            .await
            .map_err(|_| DirectoryError::Timeout(self.lookup_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::connection::Outbound;
    use crate::directory::{InMemoryDirectory, SpaceInfo, UserProfile};
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn router_with(directory: Arc<InMemoryDirectory>) -> MessageRouter {
        MessageRouter::new(
            Arc::new(RoomRegistry::new()),
            directory.clone(),
            directory,
            &ServerConfig::default(),
        )
    }

    fn lobby() -> Arc<InMemoryDirectory> {
        Arc::new(InMemoryDirectory::seeded(
            vec![SpaceInfo {
                id: "r1".to_string(),
                name: "Lobby".to_string(),
                dimensions: None,
            }],
            vec![UserProfile {
                user_id: "u-1".to_string(),
                avatar_image_url: "https://img.example/a.png".to_string(),
                avatar_name: None,
            }],
        ))
    }

    fn connect(user_id: &str) -> (Arc<Session>, UnboundedReceiver<Outbound>) {
        Session::channel(Identity {
            user_id: user_id.to_string(),
            username: "ada".to_string(),
        })
    }

    #[tokio::test]
    async fn test_join_places_session_in_spawn_region() {
        let router = router_with(lobby());
        let (session, mut rx) = connect("u-1");

        let disposition = router
            .route(&session, r#"{"type":"join","payload":{"spaceId":"r1","peerId":"p1"}}"#)
            .await;
        assert_eq!(disposition, Disposition::Continue);

        match rx.try_recv().unwrap() {
            Outbound::Message(ServerMessage::SpaceJoined(payload)) => {
                assert!(SpawnRegion::default().contains(payload.spawn.x, payload.spawn.y));
                assert!(payload.users.is_empty());
            }
            other => panic!("unexpected outbound item: {other:?}"),
        }
        assert_eq!(router.rooms().get_user_count("r1").await, 1);
    }

    #[tokio::test]
    async fn test_missing_space_closes_connection() {
        let router = router_with(lobby());
        let (session, mut rx) = connect("u-1");

        let disposition = router
            .route(&session, r#"{"type":"join","payload":{"spaceId":"nope","peerId":"p1"}}"#)
            .await;
        assert_eq!(disposition, Disposition::Disconnect);
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(ServerMessage::error("Space not found"))
        );
        assert!(matches!(rx.try_recv().unwrap(), Outbound::Close(_)));
        assert!(router.rooms().get_users("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_missing_profile_closes_connection() {
        let router = router_with(lobby());
        let (session, mut rx) = connect("u-unknown");

        let disposition = router
            .route(&session, r#"{"type":"join","payload":{"spaceId":"r1","peerId":"p1"}}"#)
            .await;
        assert_eq!(disposition, Disposition::Disconnect);
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(ServerMessage::error("user data not found!"))
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_generic_error() {
        let router = router_with(lobby());
        let (session, mut rx) = connect("u-1");

        assert_eq!(router.route(&session, "{not json").await, Disposition::Continue);
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(ServerMessage::internal_error())
        );
    }

    #[tokio::test]
    async fn test_unknown_kind_is_ignored() {
        let router = router_with(lobby());
        let (session, mut rx) = connect("u-1");

        assert_eq!(
            router.route(&session, r#"{"type":"dance","payload":{}}"#).await,
            Disposition::Continue
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_move_before_join_is_ignored() {
        let router = router_with(lobby());
        let (session, mut rx) = connect("u-1");

        router
            .route(&session, r#"{"type":"move","payload":{"x":1,"y":2,"spaceId":"r1"}}"#)
            .await;
        assert!(rx.try_recv().is_err());
        assert_eq!(session.position().await, Position::default());
    }

    struct FailingDirectory;

    #[async_trait]
    impl UserDirectory for FailingDirectory {
        async fn find_profile(&self, _user_id: &str) -> Result<Option<UserProfile>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }
    }

    struct SlowDirectory;

    #[async_trait]
    impl SpaceDirectory for SlowDirectory {
        async fn find_space(&self, _space_id: &str) -> Result<Option<SpaceInfo>, DirectoryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_directory_fault_keeps_connection_open() {
        let router = MessageRouter::new(
            Arc::new(RoomRegistry::new()),
            Arc::new(FailingDirectory),
            lobby(),
            &ServerConfig::default(),
        );
        let (session, mut rx) = connect("u-1");

        let disposition = router
            .route(&session, r#"{"type":"join","payload":{"spaceId":"r1","peerId":"p1"}}"#)
            .await;
        assert_eq!(disposition, Disposition::Continue);
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(ServerMessage::internal_error())
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_directory_times_out() {
        let config = ServerConfig {
            lookup_timeout_ms: 50,
            ..Default::default()
        };
        let router = MessageRouter::new(
            Arc::new(RoomRegistry::new()),
            lobby(),
            Arc::new(SlowDirectory),
            &config,
        );
        let (session, mut rx) = connect("u-1");

        let disposition = router
            .route(&session, r#"{"type":"join","payload":{"spaceId":"r1","peerId":"p1"}}"#)
            .await;
        assert_eq!(disposition, Disposition::Continue);
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(ServerMessage::internal_error())
        );
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let router = router_with(lobby());
        let (session, _rx) = connect("u-1");
        router
            .route(&session, r#"{"type":"join","payload":{"spaceId":"r1","peerId":"p1"}}"#)
            .await;

        router.disconnect(&session).await;
        router.disconnect(&session).await;
        assert_eq!(router.rooms().get_user_count("r1").await, 0);
        assert!(session.room_id().await.is_none());
    }
}
