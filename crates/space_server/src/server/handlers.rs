//! Connection handling logic for WebSocket clients.
//!
//! This module contains the per-connection lifecycle: gatekeeping during the
//! WebSocket handshake, session registration, the reader/actor/writer tasks
//! that carry messages in and out, and cleanup when the connection ends.

use crate::{
    auth::{ConnectionGatekeeper, Identity},
    config::ServerConfig,
    connection::{ConnectionManager, Outbound, Session},
    error::{AuthError, ServerError},
    messaging::{Disposition, MessageRouter, ServerMessage},
};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
};
use tracing::{debug, error, info, trace, warn};

/// Inbound frames buffered per connection before the reader stops pulling
/// from the socket.
const INBOUND_QUEUE_DEPTH: usize = 64;

/// Per-connection limits taken from the server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub max_connections: usize,
    pub max_message_size: usize,
}

impl From<&ServerConfig> for ConnectionLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            max_message_size: config.max_message_size,
        }
    }
}

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Run the gatekeeper inside the WebSocket handshake; refused connections
///    get an HTTP error response and never get a session
/// 2. Create the session and register it with the connection manager
/// 3. Run the message tasks until the connection ends
/// 4. Run the leave sequence and unregister the connection
///
/// # Message Handling
///
/// * **Incoming Task**: reads frames off the socket into a bounded queue
/// * **Session Task**: routes queued frames one at a time, in arrival order
/// * **Outgoing Task**: writes the session's outbound messages to the socket
///
/// A refused handshake is not an error; `Err` is returned only when the
/// handshake itself fails.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    gatekeeper: ConnectionGatekeeper,
    router: Arc<MessageRouter>,
    connection_manager: Arc<ConnectionManager>,
    limits: ConnectionLimits,
) -> Result<(), ServerError> {
    let at_capacity = connection_manager.connection_count().await >= limits.max_connections;

    let mut admission: Option<Result<Identity, AuthError>> = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let result = if at_capacity {
            Err(AuthError::ConnectionLimit(limits.max_connections))
        } else {
            gatekeeper.admit(request)
        };
        let reply = match &result {
            Ok(_) => Ok(response),
            Err(e) => Err(rejection(e)),
        };
        admission = Some(result);
        reply
    };

    let handshake = accept_hdr_async(stream, callback).await;
    let ws_stream = match handshake {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            if let Some(Err(reason)) = admission {
                warn!("🔒 Refused connection from {}: {}", addr, reason);
                return Ok(());
            }
            return Err(ServerError::Network(format!("WebSocket handshake failed: {e}")));
        }
    };
    let Some(Ok(identity)) = admission else {
        return Err(ServerError::Internal(
            "handshake completed without an admitted identity".to_string(),
        ));
    };

    let (session, mut outbound_rx) = Session::channel(identity);
    let connection_id = session.id();
    connection_manager.add_connection(session.clone(), addr).await;
    info!(
        "🔐 {} ({}) admitted as connection {}",
        session.identity().username,
        session.identity().user_id,
        connection_id
    );

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<String>(INBOUND_QUEUE_DEPTH);

    // Session task - one message at a time so a session never races itself
    let session_task = {
        let session = session.clone();
        let router = router.clone();
        tokio::spawn(async move {
            while let Some(text) = inbound_rx.recv().await {
                if router.route(&session, &text).await == Disposition::Disconnect {
                    break;
                }
            }
        })
    };

    // Incoming message task
    let incoming_task = {
        let session = session.clone();
        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if text.len() > limits.max_message_size {
                            warn!(
                                "📦 Dropping {} byte message from {} (limit {})",
                                text.len(),
                                connection_id,
                                limits.max_message_size
                            );
                            let _ = session.send(ServerMessage::internal_error());
                            continue;
                        }
                        if inbound_tx.send(text.as_str().to_owned()).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Client {} requested close", connection_id);
                        break;
                    }
                    Ok(Message::Binary(_)) => {
                        trace!("Ignoring binary frame from {}", connection_id);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("WebSocket error for connection {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    // Outgoing message task
    let outgoing_task = async move {
        while let Some(item) = outbound_rx.recv().await {
            match item {
                Outbound::Message(message) => {
                    let text = match message.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to serialize message for {}: {}", connection_id, e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        debug!("Failed to send message to {}: {}", connection_id, e);
                        break;
                    }
                }
                Outbound::Close(reason) => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: reason.into(),
                    };
                    let _ = ws_sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    };

    // Run both tasks concurrently until one completes
    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    // The session task must be stopped before the leave sequence so no join
    // can land after it
    session_task.abort();
    let _ = session_task.await;

    router.disconnect(&session).await;
    connection_manager.remove_connection(connection_id).await;
    Ok(())
}

/// HTTP response sent in place of the upgrade for a refused handshake.
fn rejection(error: &AuthError) -> ErrorResponse {
    let status = match error {
        AuthError::ConnectionLimit(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::MissingCredential | AuthError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
    };
    let mut response = ErrorResponse::new(Some(error.to_string()));
    *response.status_mut() = status;
    response
}
