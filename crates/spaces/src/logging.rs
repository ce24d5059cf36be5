//! Log output for the spaces server.
//!
//! Everything the server logs goes through `tracing`. Operators pick the
//! level in `[logging]` or with `--log-level`; `RUST_LOG` wins over both so a
//! single module (say `space_server::rooms=debug`) can be turned up without
//! touching the config file. JSON output is meant for log shippers.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber.
///
/// `json_format` forces JSON output regardless of `config.json_format`.
/// Fails if a subscriber is already installed.
pub fn setup_logging(
    config: &LoggingSettings,
    json_format: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));
    let json = json_format || config.json_format;

    // Connection tasks hop between runtime workers, so thread ids stay on
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_ansi(true).with_target(false).with_thread_ids(true))
            .try_init()?;
    }

    info!(
        "🔧 Logging initialized with level: {} ({})",
        log_level,
        if json { "json" } else { "text" }
    );
    Ok(())
}

/// Displays the startup banner using proper logging.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🌐 SPACES SERVER 🌐           ║");
    info!("║                 v{:<10}              ║", version);
    info!("║                                          ║");
    info!("║  Realtime Layer for Shared 2-D Spaces    ║");
    info!("║                                          ║");
    info!("║  🔐 Token-Gated Connections              ║");
    info!("║  🏠 Self-Cleaning Rooms                  ║");
    info!("║  📞 Proximity Call Signalling            ║");
    info!("║                                          ║");
    info!("╚══════════════════════════════════════════╝");
}
