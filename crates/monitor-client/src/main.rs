//! Monitor Client
//!
//! Headless remote control for a monitoring group.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing from `RUST_LOG` / `MONITOR_LOG_JSON`
//! 2. Load configuration from environment
//! 3. Start the signaling hub over WebSocket
//! 4. Join the group's room as a viewer (`MONITOR_UID`, `MONITOR_ID_TOKEN`,
//!    `MONITOR_GROUP_ID`, optional `MONITOR_EMAIL`)
//! 5. Relay commands read from stdin until `quit` or Ctrl+C
//!
//! The console opens no media sessions, so `MONITOR_MEDIA_URL` is not needed
//! here. `cameras` shows the backend's polled status per camera.
//!
//! # Commands
//!
//! ```text
//! play <camera> <url>
//! stop <camera>
//! rotate <camera>
//! cameras
//! quit
//! ```

#![warn(clippy::pedantic)]

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use common::api::ApiClient;
use common::config::{ObservabilityConfig, DEFAULT_LOG_LEVEL};
use common::identity::{AuthenticatedUser, IdentityHandle};
use common::secret::SecretString;
use common::types::{CameraName, RoomId};
use monitor_client::actors::ViewerControl;
use monitor_client::config::Config;
use monitor_client::signaling::{SignalingHub, WebSocketTransport};
use monitor_client::status_board::CameraStatusBoard;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand {
    Play { camera: CameraName, url: String },
    Stop { camera: CameraName },
    Rotate { camera: CameraName },
    Cameras,
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let vars: HashMap<String, String> = env::vars().collect();
    init_tracing(&ObservabilityConfig::from_vars(&vars));

    info!("Starting Monitor Client");

    let config = Config::from_vars(&vars).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        api_url = %config.api_url,
        signaling_url = %config.signaling_url,
        first_sight_timeout_ms = config.presence.first_sight_timeout.as_millis(),
        settle_delay_ms = config.presence.settle_delay.as_millis(),
        "Configuration loaded successfully"
    );

    let identity = identity_from_vars(&vars)?;
    let room = RoomId::new(required(&vars, "MONITOR_GROUP_ID")?);
    let api = ApiClient::new(config.api_url.clone(), config.http_timeout, identity.clone())
        .context("Failed to build backend client")?;

    let shutdown_token = CancellationToken::new();
    let hub = SignalingHub::start(
        Arc::new(WebSocketTransport::new(config.signaling_url.clone())),
        config.reconnect,
        shutdown_token.child_token(),
    );

    let (control, control_task) =
        ViewerControl::start(room.clone(), Arc::clone(&hub), identity, shutdown_token.child_token());
    info!(room = %room, "Monitor Client running - type `quit` or press Ctrl+C to exit");

    tokio::select! {
        () = run_console(&control, &api) => {}
        () = shutdown_signal() => {}
    }

    info!("Shutdown signal received, initiating graceful shutdown...");
    control.cancel();
    if let Err(e) = control_task.await {
        warn!(error = %e, "Viewer control task failed");
    }
    hub.shutdown().await;
    shutdown_token.cancel();

    info!("Monitor Client shutdown complete");
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_new(&observability.log_level)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let json = observability.json_logs;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

fn identity_from_vars(vars: &HashMap<String, String>) -> anyhow::Result<IdentityHandle> {
    let uid = required(vars, "MONITOR_UID")?;
    let id_token = required(vars, "MONITOR_ID_TOKEN")?;

    let mut user = AuthenticatedUser::new(uid, SecretString::from(id_token));
    if let Some(email) = vars.get("MONITOR_EMAIL").filter(|v| !v.trim().is_empty()) {
        user = user.with_email(email.trim());
    }
    Ok(IdentityHandle::fixed(user))
}

fn required(vars: &HashMap<String, String>, name: &str) -> anyhow::Result<String> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("Missing required environment variable: {name}"))
}

async fn run_console(control: &ViewerControl, api: &ApiClient) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut board = CameraStatusBoard::new();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };

        let result = match command {
            ConsoleCommand::Play { camera, url } => control.play_audio(&camera, &url),
            ConsoleCommand::Stop { camera } => control.stop_audio(&camera),
            ConsoleCommand::Rotate { camera } => control.rotate_camera(&camera),
            ConsoleCommand::Cameras => {
                print_cameras(api, control.room(), &mut board).await;
                Ok(())
            }
            ConsoleCommand::Quit => break,
        };

        match result {
            Ok(()) => println!("ok"),
            Err(e) => {
                warn!(error = %e, "Command failed");
                println!("{}", e.client_message());
            }
        }
    }
}

async fn print_cameras(api: &ApiClient, room: &RoomId, board: &mut CameraStatusBoard) {
    let groups = match api.groups_for_user().await {
        Ok(groups) => groups,
        Err(e) => {
            warn!(error = %e, "Failed to list groups");
            println!("{}", e.client_message());
            return;
        }
    };

    let cameras = groups
        .iter()
        .find(|g| &g.room_id() == room)
        .map(|g| g.cameras.as_slice())
        .unwrap_or_default();
    board.refresh(cameras);
    for (camera, entry) in board.entries() {
        let status = if entry.status.is_online() { "online" } else { "offline" };
        println!("{camera}\t{status}");
    }
}

fn parse_command(line: &str) -> Result<ConsoleCommand, &'static str> {
    const USAGE: &str = "usage: play <camera> <url> | stop <camera> | rotate <camera> | cameras | quit";

    let mut words = line.split_whitespace();
    let verb = words.next().ok_or(USAGE)?;
    let camera = words.next().map(CameraName::new);

    let command = match (verb, camera) {
        ("play", Some(camera)) => ConsoleCommand::Play {
            camera,
            url: words.next().ok_or(USAGE)?.to_string(),
        },
        ("stop", Some(camera)) => ConsoleCommand::Stop { camera },
        ("rotate", Some(camera)) => ConsoleCommand::Rotate { camera },
        ("cameras", None) => ConsoleCommand::Cameras,
        ("quit" | "exit", None) => ConsoleCommand::Quit,
        _ => return Err(USAGE),
    };

    if words.next().is_some() {
        return Err(USAGE);
    }
    Ok(command)
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
