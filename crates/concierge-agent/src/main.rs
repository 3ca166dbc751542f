//! Call worker binary: handles one call in one room.
//!
//! Room events arrive from the media bridge as JSON lines on stdin. The
//! first stdout line tells the bridge how to join the room; speech, control
//! requests and RPC replies follow as JSON lines. Logs go to stderr.

use concierge_agent::bridge;
use concierge_agent::config::{self, Config};
use concierge_agent::WorkerContext;
use concierge_voice::{AgentRoomClient, RoomLink};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

struct Args {
    config_path: Option<String>,
    config_source: &'static str,
    room: Option<String>,
}

fn parse_args() -> Args {
    let mut config_path = None;
    let mut room = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next(),
            "--room" => room = args.next(),
            other => eprintln!("ignoring unknown argument: {other}"),
        }
    }

    let (config_path, config_source) = match config_path.filter(|p| !p.trim().is_empty()) {
        Some(path) => (Some(path), "cli-arg"),
        None => match std::env::var("CONCIERGE_AGENT_CONFIG_PATH") {
            Ok(path) if !path.trim().is_empty() => (Some(path), "env-var"),
            _ => (None, "default"),
        },
    };

    Args {
        config_path,
        config_source,
        room: room.or_else(|| std::env::var("CONCIERGE_ROOM").ok()),
    }
}

fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let args = parse_args();
    let selected_config_path = args.config_path.as_deref().or(Some("agent.toml"));

    let config = match config::load_config(selected_config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config);

    tracing::info!(
        source = args.config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "worker cannot start");
        std::process::exit(1);
    }
    let Some(room) = args.room.filter(|r| !r.trim().is_empty()) else {
        tracing::error!("no room given, pass --room or set CONCIERGE_ROOM");
        std::process::exit(1);
    };

    let ctx = WorkerContext::prewarm(config);
    let job = ctx.accept_job(&room);

    let (token, setup_error) = match ctx.agent_token(&job) {
        Ok(token) => (token, None),
        Err(e) => (String::new(), Some(e.to_string())),
    };
    let client = Arc::new(AgentRoomClient::connect(
        ctx.livekit_url(),
        &token,
        &room,
        job.agent_identity(),
    ));

    let (lines_tx, lines_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_lines(lines_rx));
    tokio::spawn(forward_output(client.subscribe(), lines_tx.clone()));

    let link: Arc<dyn RoomLink> = client.clone();
    let controller = ctx.controller(&job, link);

    let outcome = if let Some(error) = setup_error {
        drop(lines_tx);
        controller.abort(error).await
    } else {
        if let Err(e) = client.announce() {
            tracing::warn!(error = %e, "failed to announce room join");
        }
        let shutdown = controller.shutdown_handle();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.shutdown();
        });

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let stdin = BufReader::new(tokio::io::stdin());
        tokio::spawn(async move {
            if let Err(e) = bridge::pump(stdin, events_tx, lines_tx).await {
                tracing::error!(error = %e, "bridge input failed");
            }
        });

        controller.run(events_rx).await
    };

    tracing::info!(
        session = %outcome.session_id,
        state = %outcome.state,
        reason = ?outcome.end_reason,
        greeted = outcome.greeted,
        "call finished"
    );

    // Let the Closed line reach the bridge before exiting.
    drop(client);
    let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, writer).await;
}

async fn forward_output(
    mut outputs: broadcast::Receiver<concierge_voice::AgentOutput>,
    lines: mpsc::UnboundedSender<String>,
) {
    loop {
        match outputs.recv().await {
            Ok(output) => match serde_json::to_string(&output) {
                Ok(line) => {
                    if lines.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to encode agent output"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "bridge output lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn write_lines(mut lines: mpsc::UnboundedReceiver<String>) {
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.recv().await {
        if stdout.write_all(line.as_bytes()).await.is_err()
            || stdout.write_all(b"\n").await.is_err()
            || stdout.flush().await.is_err()
        {
            break;
        }
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, ending call"); }
        () = terminate => { tracing::info!("received SIGTERM, ending call"); }
    }
}
