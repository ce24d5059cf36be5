//! # Spaces - Simulated Participant Client
//!
//! Spawns a number of simulated participants against a running spaces
//! server. Each one mints its own token, joins a space, random-walks around
//! the map and logs the proximity signals the server sends back, which makes
//! it easy to watch calls start and end as participants wander in and out of
//! range.
//!
//! Tokens are signed with `--secret`, so it must match the server's. Account
//! ids are `<prefix>-<n>`; the server needs profiles for them, or
//! `directory.fallback_avatar_url` set in its configuration.

use clap::Parser;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::json;
use space_server::auth::{mint_token, Identity};
use space_server::connection::Position;
use space_server::messaging::ServerMessage;
use std::time::Duration;
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Parser, Debug, Clone)]
#[command(name = "simulate")]
#[command(about = "Spaces - simulated participants walking around a shared space")]
struct Args {
    /// Server WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:5000/")]
    url: String,

    /// Secret used to sign participant tokens
    #[arg(long, env = "JWT_SECRET", default_value = "supersecret", hide_env_values = true)]
    secret: String,

    /// Space every participant joins
    #[arg(short, long, default_value = "lobby")]
    space: String,

    /// Number of simultaneous participants to simulate
    #[arg(short, long, default_value = "5")]
    players: u32,

    /// Prefix for simulated account ids
    #[arg(long, default_value = "sim")]
    user_prefix: String,

    /// Movement frequency in Hz
    #[arg(short, long, default_value = "2.0")]
    move_freq: f64,

    /// Largest distance covered by a single step
    #[arg(long, default_value = "40.0")]
    step: f64,

    /// Simulation duration in seconds
    #[arg(short, long, default_value = "60")]
    duration: u64,

    /// Side length of the square area participants walk in
    #[arg(short, long, default_value = "1000.0")]
    world_size: f64,
}

/// What one participant saw during its run.
#[derive(Debug, Default, Clone, Copy)]
struct ParticipantStats {
    moves_sent: u32,
    movements_seen: u32,
    calls_started: u32,
    calls_ended: u32,
    errors: u32,
}

impl ParticipantStats {
    fn merge(&mut self, other: ParticipantStats) {
        self.moves_sent += other.moves_sent;
        self.movements_seen += other.movements_seen;
        self.calls_started += other.calls_started;
        self.calls_ended += other.calls_ended;
        self.errors += other.errors;
    }
}

/// Takes one random step from `from`, staying inside `[0, world_size]` on both axes.
fn random_step(rng: &mut impl Rng, from: Position, step: f64, world_size: f64) -> Position {
    let dx = rng.gen_range(-step..=step);
    let dy = rng.gen_range(-step..=step);
    Position::new(
        (from.x + dx).clamp(0.0, world_size),
        (from.y + dy).clamp(0.0, world_size),
    )
}

async fn simulate_participant(
    index: u32,
    args: Args,
) -> Result<ParticipantStats, Box<dyn std::error::Error + Send + Sync>> {
    let identity = Identity {
        user_id: format!("{}-{}", args.user_prefix, index),
        username: format!("Wanderer {index}"),
    };
    let peer_id = Uuid::new_v4().to_string();
    let token = mint_token(&args.secret, &identity, Duration::from_secs(3600))?;

    let separator = if args.url.contains('?') { '&' } else { '?' };
    let (ws_stream, _) = connect_async(format!("{}{}token={}", args.url, separator, token)).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let join = json!({
        "type": "join",
        "payload": { "spaceId": args.space, "peerId": peer_id },
    });
    ws_sender.send(Message::Text(join.to_string().into())).await?;
    info!("🎮 {} connected, joining {} as peer {}", identity.user_id, args.space, peer_id);

    let mut stats = ParticipantStats::default();
    let mut position: Option<Position> = None;
    let mut move_timer = interval(Duration::from_secs_f64(1.0 / args.move_freq));
    let deadline = sleep(Duration::from_secs(args.duration));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        info!("🔌 {} closed by server: {:?}", identity.user_id, frame);
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("{} connection error: {}", identity.user_id, e);
                        break;
                    }
                    None => {
                        info!("🔌 {} connection closed (stream ended)", identity.user_id);
                        break;
                    }
                };

                match serde_json::from_str::<ServerMessage>(text.as_str()) {
                    Ok(ServerMessage::SpaceJoined(payload)) => {
                        info!(
                            "🏠 {} spawned at ({:.1}, {:.1}) with {} other(s) present",
                            identity.user_id, payload.spawn.x, payload.spawn.y, payload.users.len()
                        );
                        position = Some(Position::new(payload.spawn.x, payload.spawn.y));
                    }
                    Ok(ServerMessage::UserJoined(view)) => {
                        debug!("{} sees {:?} arrive", identity.user_id, view.username);
                    }
                    Ok(ServerMessage::UserLeft(payload)) => {
                        debug!("{} sees {:?} leave", identity.user_id, payload.user_id);
                    }
                    Ok(ServerMessage::Movement(_)) => {
                        stats.movements_seen += 1;
                    }
                    Ok(ServerMessage::CallInit(signal)) => {
                        stats.calls_started += 1;
                        info!("📞 {} call with peer {}", identity.user_id, signal.remote_peer_id);
                    }
                    Ok(ServerMessage::RemovePeerId(signal)) => {
                        stats.calls_ended += 1;
                        debug!("📴 {} out of range of peer {}", identity.user_id, signal.remote_peer_id);
                    }
                    Ok(ServerMessage::Error(payload)) => {
                        stats.errors += 1;
                        warn!("❌ {} received error: {}", identity.user_id, payload.message);
                    }
                    Err(e) => {
                        warn!("{} received unparseable message ({}): {}", identity.user_id, e, text.as_str());
                    }
                }
            }

            _ = move_timer.tick() => {
                let Some(current) = position else {
                    continue;
                };
                let next = random_step(&mut rand::thread_rng(), current, args.step, args.world_size);
                position = Some(next);

                let movement = json!({
                    "type": "move",
                    "payload": { "x": next.x, "y": next.y, "spaceId": args.space },
                });
                ws_sender.send(Message::Text(movement.to_string().into())).await?;
                stats.moves_sent += 1;
            }

            _ = &mut deadline => {
                info!("⏰ {} simulation complete", identity.user_id);
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!(
        "📊 {} final stats: {} moves sent, {} movements seen, {} call_init, {} removePeerId",
        identity.user_id, stats.moves_sent, stats.movements_seen, stats.calls_started, stats.calls_ended
    );
    Ok(stats)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    if args.move_freq <= 0.0 {
        return Err("--move-freq must be greater than 0".into());
    }

    info!("🚀 Starting Spaces participant simulation");
    info!("   • Participants: {}", args.players);
    info!("   • Space: {}", args.space);
    info!("   • Area: {}x{}", args.world_size, args.world_size);
    info!("   • Movement: {:.1} Hz, steps up to {}", args.move_freq, args.step);
    info!("   • Duration: {} seconds", args.duration);
    info!("   • Server: {}", args.url);

    let mut handles = Vec::new();
    for index in 0..args.players {
        let args = args.clone();
        handles.push(tokio::spawn(async move {
            match simulate_participant(index, args).await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    error!("❌ Participant {} simulation failed: {}", index, e);
                    None
                }
            }
        }));

        // Stagger connections to avoid overwhelming server
        sleep(Duration::from_millis(100)).await;
    }

    let mut totals = ParticipantStats::default();
    let mut completed = 0;
    for handle in handles {
        if let Ok(Some(stats)) = handle.await {
            totals.merge(stats);
            completed += 1;
        }
    }

    info!("✅ Simulation complete: {}/{} participants finished", completed, args.players);
    info!(
        "📋 Totals: {} moves sent, {} movements relayed, {} call_init, {} removePeerId, {} errors",
        totals.moves_sent, totals.movements_seen, totals.calls_started, totals.calls_ended, totals.errors
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_step_stays_in_bounds() {
        let mut rng = rand::thread_rng();
        let mut position = Position::new(0.0, 1000.0);
        for _ in 0..1000 {
            position = random_step(&mut rng, position, 40.0, 1000.0);
            assert!((0.0..=1000.0).contains(&position.x));
            assert!((0.0..=1000.0).contains(&position.y));
        }
    }

    #[test]
    fn test_stats_merge() {
        let mut totals = ParticipantStats::default();
        totals.merge(ParticipantStats {
            moves_sent: 3,
            calls_started: 1,
            ..Default::default()
        });
        totals.merge(ParticipantStats {
            moves_sent: 2,
            calls_ended: 4,
            ..Default::default()
        });
        assert_eq!(totals.moves_sent, 5);
        assert_eq!(totals.calls_started, 1);
        assert_eq!(totals.calls_ended, 4);
    }
}
