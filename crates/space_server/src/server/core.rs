//! Core space server implementation.
//!
//! This module contains the main `SpaceServer` struct, which owns the shared
//! components (gatekeeper, room registry, message router and connection
//! manager) and runs the accept loop.

use crate::{
    auth::{ConnectionGatekeeper, CredentialVerifier, JwtVerifier},
    config::ServerConfig,
    connection::ConnectionManager,
    directory::{SpaceDirectory, UserDirectory},
    error::ServerError,
    messaging::MessageRouter,
    rooms::RoomRegistry,
    server::handlers::{handle_connection, ConnectionLimits},
    server::shutdown::ShutdownState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// The core space server structure.
///
/// # Architecture
///
/// * **Gatekeeper**: verifies the bearer credential of every handshake
/// * **Room Registry**: which sessions are in which room, shared by all
///   connections
/// * **Message Router**: applies join and move messages to sessions and rooms
/// * **Connection Management**: every live session, for limits and shutdown
pub struct SpaceServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Credential check run during each handshake
    gatekeeper: ConnectionGatekeeper,

    /// Room membership shared by every connection
    rooms: Arc<RoomRegistry>,

    /// Dispatcher for inbound messages
    router: Arc<MessageRouter>,

    /// Manager for live connections
    connection_manager: Arc<ConnectionManager>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl SpaceServer {
    /// Creates a server that verifies tokens with the configured JWT secret.
    pub fn new(
        config: ServerConfig,
        users: Arc<dyn UserDirectory>,
        spaces: Arc<dyn SpaceDirectory>,
    ) -> Self {
        let verifier = Arc::new(JwtVerifier::from_config(&config.auth));
        Self::with_verifier(config, verifier, users, spaces)
    }

    /// Creates a server with a custom credential verifier.
    pub fn with_verifier(
        config: ServerConfig,
        verifier: Arc<dyn CredentialVerifier>,
        users: Arc<dyn UserDirectory>,
        spaces: Arc<dyn SpaceDirectory>,
    ) -> Self {
        let rooms = Arc::new(RoomRegistry::new());
        let router = Arc::new(MessageRouter::new(rooms.clone(), users, spaces, &config));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            gatekeeper: ConnectionGatekeeper::new(verifier),
            rooms,
            router,
            connection_manager: Arc::new(ConnectionManager::new()),
            shutdown_sender,
            config,
        }
    }

    /// Starts the server and accepts connections until [`shutdown`](Self::shutdown)
    /// is called.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, None).await
    }

    /// Starts the server and accepts connections until shutdown is initiated
    /// through `shutdown_state` or [`shutdown`](Self::shutdown) is called.
    pub async fn start_with_shutdown_state(&self, shutdown_state: ShutdownState) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, Some(shutdown_state)).await
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind {}: {e}", self.config.bind_address)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(e.to_string()))?;
        info!("🚀 Space server listening on {}", local_addr);
        Ok(listener)
    }

    /// Runs the accept loop on an already bound listener.
    pub async fn serve(&self, listener: TcpListener, shutdown_state: Option<ShutdownState>) -> Result<(), ServerError> {
        info!(
            "📡 Call radius {} | spawn x {}..={} y {}..={} | max {} connections",
            self.config.call_radius,
            self.config.spawn.min_x,
            self.config.spawn.max_x,
            self.config.spawn.min_y,
            self.config.spawn.max_y,
            self.config.max_connections
        );

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let limits = ConnectionLimits::from(&self.config);

        loop {
            if let Some(ref shutdown_state) = shutdown_state {
                if shutdown_state.is_shutdown_initiated() {
                    info!("🛑 Accept loop stopping - shutdown initiated");
                    break;
                }
            }

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("Accepted TCP connection from {}", addr);
                        let gatekeeper = self.gatekeeper.clone();
                        let router = self.router.clone();
                        let connection_manager = self.connection_manager.clone();

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(
                                stream,
                                addr,
                                gatekeeper,
                                router,
                                connection_manager,
                                limits,
                            )
                            .await
                            {
                                error!("Connection error for {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                _ = shutdown_receiver.recv() => {
                    info!("Internal shutdown signal received");
                    break;
                }
            }
        }

        info!("🧹 Performing server cleanup...");
        let closing = self.connection_manager.disconnect_all("Server shutting down").await;
        if closing > 0 {
            info!("👋 Asked {} connection(s) to close", closing);
        }
        if let Some(shutdown_state) = shutdown_state {
            shutdown_state.complete_shutdown();
        }
        info!("✅ Server stopped");
        Ok(())
    }

    /// Initiates server shutdown.
    ///
    /// Stops the accept loop; the loop then asks every live connection to
    /// close before returning.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Gets the room registry.
    pub fn get_rooms(&self) -> Arc<RoomRegistry> {
        self.rooms.clone()
    }

    /// Gets the connection manager.
    pub fn get_connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }
}
