//! Concierge backend binary.
//!
//! Starts the axum HTTP API with structured logging, database
//! initialization, and graceful shutdown on SIGTERM/SIGINT.

use concierge_calendar::{CalendarError, CalendarService};
use concierge_server::{api_crm, app, config, AppState};
use concierge_voice::VoiceService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("CONCIERGE_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_calendar(config: &config::Config) -> Option<Arc<CalendarService>> {
    match CalendarService::from_config(config.calendar.clone()) {
        Ok(service) => {
            tracing::info!(calendar_id = %config.calendar.calendar_id, "google calendar ready");
            Some(Arc::new(service))
        }
        Err(CalendarError::CredentialsMissing) => {
            tracing::warn!("google calendar credentials not found, calendar endpoints disabled");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize google calendar");
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration: the server cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let pool = concierge_db::create_pool(
        &config.database.path,
        concierge_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool, check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            concierge_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
        let created = api_crm::ensure_dialer_business(&conn, &config.dialer)
            .expect("failed to register the dialer business");
        if created {
            tracing::info!(business_id = %config.dialer.business_id, "registered dialer business");
        }
    }

    let missing = config.livekit.missing_credentials();
    if !missing.is_empty() {
        tracing::warn!(?missing, "livekit credentials incomplete, token and call endpoints will fail");
    }
    if config.livekit.sip_trunk_id.is_none() {
        tracing::warn!("SIP_TRUNK_ID not set, outbound calls are disabled");
    }

    let voice = Arc::new(VoiceService::new(config.livekit.clone()));
    let calendar = init_calendar(&config);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    let state = AppState {
        pool,
        voice,
        calendar,
        config: Arc::new(config),
    };
    let app = app(state);

    tracing::info!(%addr, "starting concierge server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address, is another process using this port?");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("concierge server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
