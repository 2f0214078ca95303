use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use colored::*;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use peerlink_client::signaling::{ReconnectPolicy, SignalingConfig};
use peerlink_client::transport::{RemoteTrack, TransportConfig, sample_tracks};
use peerlink_client::{Client, ClientConfig, SessionObserver, SessionSnapshot};
use peerlink_core::{
    ConnectionStatus, NegotiationState, ParticipantId, PeerConnectionState, RoomId, UserData,
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "peerlink")]
#[command(about = "Join a room and keep a peer link to every other member")]
struct Args {
    /// Rendezvous server endpoint (ws://, wss://, http:// or https://)
    #[arg(short, long, default_value = "ws://localhost:7000/ws")]
    server: String,

    #[arg(short, long)]
    room: Option<String>,

    #[arg(short, long)]
    name: Option<String>,

    #[arg(long)]
    email: Option<String>,

    /// Bearer token sent with the WebSocket upgrade
    #[arg(long, env = "PEERLINK_TOKEN")]
    token: Option<String>,

    /// Publish placeholder audio and video tracks
    #[arg(long)]
    media: bool,

    #[arg(long, default_value_t = 5)]
    max_reconnects: u32,

    /// Seconds between status summaries, 0 to disable
    #[arg(long, default_value_t = 10)]
    status_interval: u64,

    /// Skip the default public STUN servers
    #[arg(long)]
    no_stun: bool,
}

struct ConsoleObserver;

#[async_trait]
impl SessionObserver for ConsoleObserver {
    async fn on_status(&self, status: ConnectionStatus) {
        let label = match status {
            ConnectionStatus::Connected => status.to_string().green(),
            ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => {
                status.to_string().yellow()
            }
            ConnectionStatus::Disconnected => status.to_string().red(),
        };
        println!("{} {}", "signaling".bold(), label);
    }

    async fn on_members(&self, room_id: &RoomId, members: &[ParticipantId]) {
        let names: Vec<&str> = members.iter().map(|m| m.as_str()).collect();
        println!(
            "{} {} [{}]",
            "room".bold(),
            room_id.to_string().cyan(),
            names.join(", ")
        );
    }

    async fn on_negotiation(&self, remote_id: &ParticipantId, state: NegotiationState) {
        let label = match state {
            NegotiationState::Stable => state.to_string().green(),
            NegotiationState::Failed => state.to_string().red(),
            NegotiationState::Closed => state.to_string().dimmed(),
            _ => state.to_string().normal(),
        };
        println!("{} {} {}", "link".bold(), remote_id, label);
    }

    async fn on_connection_state(&self, remote_id: &ParticipantId, state: PeerConnectionState) {
        println!("{} {} {:?}", "transport".bold(), remote_id, state);
    }

    async fn on_remote_track(&self, remote_id: &ParticipantId, track: &RemoteTrack) {
        println!(
            "{} {} {} ({})",
            "track".bold(),
            remote_id,
            track.kind.to_string().magenta(),
            track.id
        );
    }

    async fn on_media_error(&self, reason: &str) {
        println!("{} {}", "media".bold(), reason.red());
    }
}

fn prompt(label: &str) -> Result<String> {
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(label)
        .interact_text()
        .with_context(|| format!("Failed to read {label}"))
}

fn print_summary(snapshot: &SessionSnapshot) {
    println!(
        "{} {} as {} in {} ({} members, {} links)",
        "status".bold(),
        snapshot.status,
        snapshot
            .local_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_owned()),
        snapshot
            .room_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_owned()),
        snapshot.members.len(),
        snapshot.links.len()
    );
    for link in &snapshot.links {
        println!(
            "   {} {:?} {} {:?} tracks={} pending={} age={:?}",
            link.remote_id,
            link.role,
            link.negotiation,
            link.connection,
            link.remote_tracks,
            link.pending_candidates,
            link.age
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let name = match args.name {
        Some(name) => name,
        None => prompt("Display name")?,
    };
    let room = match args.room {
        Some(room) => room,
        None => prompt("Room")?,
    };

    let config = ClientConfig {
        signaling: SignalingConfig {
            endpoint: args.server,
            token: args.token,
            reconnect: ReconnectPolicy {
                max_attempts: args.max_reconnects,
                ..ReconnectPolicy::default()
            },
            ..SignalingConfig::default()
        },
        transport: if args.no_stun {
            TransportConfig::without_ice_servers()
        } else {
            TransportConfig::default()
        },
        ..ClientConfig::default()
    };

    println!("{}", "Connecting to rendezvous server...".green().bold());
    let client = Client::connect(config, ConsoleObserver)?;

    if args.media {
        client.publish_media(sample_tracks(&name)).await?;
    }
    info!("Joining {} as {}", room, name);
    client
        .join(
            room,
            Some(UserData {
                name: name.clone(),
                email: args.email,
            }),
        )
        .await?;

    let mut ticker = (args.status_interval > 0)
        .then(|| tokio::time::interval(Duration::from_secs(args.status_interval)));
    let mut status_rx = client.subscribe_status();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Leaving...".yellow());
                break;
            }
            changed = status_rx.changed() => {
                if changed.is_err() || *status_rx.borrow() == ConnectionStatus::Disconnected {
                    println!("{}", "Signaling gave up; exiting".red());
                    break;
                }
            }
            _ = async {
                match ticker.as_mut() {
                    Some(ticker) => ticker.tick().await,
                    None => std::future::pending().await,
                }
            } => {
                match client.snapshot().await {
                    Ok(snapshot) => print_summary(&snapshot),
                    Err(e) => {
                        println!("{} {}", "error".red().bold(), e);
                        break;
                    }
                }
            }
        }
    }

    client.disconnect().await;
    println!("{}", "Bye".green().bold());
    Ok(())
}
