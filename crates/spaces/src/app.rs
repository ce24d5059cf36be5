//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that orchestrates
//! server startup, monitoring, and shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, wait_for_signal},
};
use space_server::connection::ConnectionManager;
use space_server::rooms::RoomRegistry;
use space_server::{ShutdownState, SpaceServer};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// How long to wait for live connections to finish closing during shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Main application struct.
///
/// The `Application` struct manages the complete lifecycle of the spaces
/// server, including configuration loading, server initialization, health
/// monitoring, and graceful shutdown handling.
///
/// # Architecture
///
/// * **Configuration Management**: Loads and validates configuration from files and CLI
/// * **Server Orchestration**: Initializes and manages the space server instance
/// * **Health Monitoring**: Periodic connection and room statistics
/// * **Graceful Shutdown**: Handles termination signals and cleanup procedures
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Space server instance
    server: SpaceServer,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Build the directory and the space server
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Some(secret) = args.jwt_secret {
            config.auth.jwt_secret = Some(secret);
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server_config = config.to_server_config()?;
        let directory = Arc::new(config.to_directory());
        info!(
            "📂 Directory: {} space(s), {} profile(s){}",
            directory.space_count(),
            directory.profile_count(),
            if config.directory.fallback_avatar_url.is_some() {
                ", fallback avatar enabled"
            } else {
                ""
            }
        );
        let server = SpaceServer::new(server_config, directory.clone(), directory);

        Ok(Self { config, server })
    }

    /// Runs the server until a termination signal arrives, then shuts down.
    ///
    /// # Shutdown
    ///
    /// 1. Stop accepting connections
    /// 2. Ask every live session to close and wait for them to drain
    /// 3. Log final statistics
    ///
    /// A second signal during shutdown exits immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Spaces Server Application");
        self.log_configuration_summary();

        let server = Arc::new(self.server);
        let connections = server.get_connection_manager();
        let rooms = server.get_rooms();

        let shutdown_state = ShutdownState::new();

        let server_handle = {
            let server = server.clone();
            let shutdown_state = shutdown_state.clone();
            tokio::spawn(async move {
                match server.start_with_shutdown_state(shutdown_state).await {
                    Ok(()) => {
                        info!("✅ Server completed successfully");
                    }
                    Err(e) => {
                        error!("❌ Server error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            })
        };

        // Periodic health report
        let monitoring_handle = {
            let connections = connections.clone();
            let rooms = rooms.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                interval.tick().await;

                loop {
                    interval.tick().await;
                    log_health(&connections, &rooms).await;
                }
            })
        };

        info!("✅ Spaces Server is now running!");
        info!("🎮 Ready to accept connections on {}", self.config.server.bind_address);
        info!("🔍 Health monitoring active - stats every 60 seconds");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let signal_state = setup_signal_handlers().await?;

        // merciless shutdown
        tokio::spawn(async move {
            if let Err(e) = wait_for_signal().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        if signal_state.is_shutdown_initiated() {
            shutdown_state.initiate_shutdown();
        }
        monitoring_handle.abort();

        info!("📡 Phase 1: Stopping the accept loop...");
        server.shutdown().await?;
        match tokio::time::timeout(Duration::from_secs(8), server_handle).await {
            Ok(_) => info!("✅ Server task completed gracefully"),
            Err(e) => warn!("⏰ Server task did not complete within timeout: {:?}", e),
        }

        info!("⏳ Phase 2: Waiting for connections to close...");
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while connections.connection_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;
        if drained.is_err() {
            info!(
                "⏰ Timeout reached with {} connection(s) still open, proceeding with shutdown",
                connections.connection_count().await
            );
        }

        log_health(&connections, &rooms).await;
        info!("✅ Spaces Server shutdown complete");

        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        let spawn = &self.config.realtime.spawn;
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!("  📦 Max message size: {} bytes", self.config.server.max_message_size);
        info!("  📞 Call radius: {}", self.config.realtime.call_radius);
        info!(
            "  📍 Spawn region: x {}..={} y {}..={}",
            spawn.min_x, spawn.max_x, spawn.min_y, spawn.max_y
        );
        info!("  ⏱️ Directory timeout: {}ms", self.config.realtime.lookup_timeout_ms);
    }
}

/// Logs connection and room statistics.
async fn log_health(connections: &ConnectionManager, rooms: &RoomRegistry) {
    let stats = rooms.room_stats().await;
    let members: usize = stats.values().sum();
    info!(
        "📊 System Health - {} connections | {} rooms | {} participants in rooms",
        connections.connection_count().await,
        stats.len(),
        members
    );

    if let Some((room_id, count)) = stats.iter().max_by_key(|(_, count)| **count) {
        info!("🔥 Busiest room: {} with {} participant(s)", room_id, count);
    }
}
