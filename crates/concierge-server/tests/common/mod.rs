#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use concierge_calendar::CalendarService;
use concierge_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use concierge_server::api_crm::ensure_dialer_business;
use concierge_server::config::Config;
use concierge_server::{app, AppState};
use concierge_voice::{LiveKitConfig, VoiceService};
use serde_json::Value;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt; // for oneshot

/// A router over a fresh file-backed database. Keep the temp file alive for
/// as long as the router is used.
pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    _db: NamedTempFile,
}

pub fn test_app(livekit: LiveKitConfig, calendar: Option<CalendarService>) -> TestApp {
    let db = NamedTempFile::new().unwrap();
    let pool = create_pool(db.path().to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
    let config = Config {
        livekit: livekit.clone(),
        ..Config::default()
    };
    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
        ensure_dialer_business(&conn, &config.dialer).unwrap();
    }
    let state = AppState {
        pool: pool.clone(),
        voice: Arc::new(VoiceService::new(livekit)),
        calendar: calendar.map(Arc::new),
        config: Arc::new(config),
    };

    TestApp {
        router: app(state),
        pool,
        _db: db,
    }
}

impl TestApp {
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub fn seed_business(&self, id: &str) {
        self.pool
            .get()
            .unwrap()
            .execute(
                "INSERT INTO businesses (id, business_name) VALUES (?1, ?2)",
                rusqlite::params![id, format!("{id} inc")],
            )
            .unwrap();
    }
}

/// Binds `router` on an ephemeral port and returns its address.
pub async fn spawn(router: Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
