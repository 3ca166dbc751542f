mod common;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use common::{spawn, test_app, TestApp};
use concierge_voice::{LiveKitConfig, DEV_LIVEKIT_API_KEY, DEV_LIVEKIT_API_SECRET};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn dev_livekit(url: &str, trunk: Option<&str>) -> LiveKitConfig {
    LiveKitConfig {
        sip_trunk_id: trunk.map(str::to_string),
        ..LiveKitConfig::new(url, DEV_LIVEKIT_API_KEY, DEV_LIVEKIT_API_SECRET)
    }
}

#[derive(Deserialize)]
struct VisitorClaims {
    sub: String,
    name: String,
    video: VideoClaims,
}

#[derive(Deserialize)]
struct VideoClaims {
    room: String,
}

#[tokio::test]
async fn token_is_minted_for_a_visitor() {
    let app = test_app(dev_livekit("ws://localhost:7880", None), None);

    let (status, body) = app
        .send(
            "POST",
            "/api/token",
            Some(json!({"business_id": "newport-rentals", "room_name": "web_newport_42"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let token = body["token"].as_str().unwrap();
    let claims = decode::<VisitorClaims>(
        token,
        &DecodingKey::from_secret(DEV_LIVEKIT_API_SECRET.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .unwrap()
    .claims;
    assert!(claims.sub.starts_with("visitor-"));
    assert_eq!(claims.name, "Website Visitor");
    assert_eq!(claims.video.room, "web_newport_42");
}

#[tokio::test]
async fn token_errors() {
    let app = test_app(LiveKitConfig::default(), None);
    let (status, body) = app
        .send("POST", "/api/token", Some(json!({"room_name": "web_1"})))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "LiveKit server credentials not configured");

    let app = test_app(dev_livekit("ws://localhost:7880", None), None);
    let (status, _) = app
        .send("POST", "/api/token", Some(json!({"room_name": "  "})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn make_call_requires_credentials_and_trunk() {
    let app = test_app(LiveKitConfig::default(), None);
    let (status, body) = app
        .send(
            "POST",
            "/api/make-call",
            Some(json!({"phone_number": "+19495550100"})),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "LiveKit credentials not configured");

    let app = test_app(dev_livekit("ws://localhost:7880", None), None);
    let (status, body) = app
        .send(
            "POST",
            "/api/make-call",
            Some(json!({"phone_number": "+19495550100"})),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "SIP_TRUNK_ID not configured. Please set up outbound SIP trunk first."
    );
}

type Dials = Arc<Mutex<Vec<Value>>>;

/// A LiveKit stand-in that answers SIP dials. Room creation is left
/// unrouted, which the dialer tolerates.
async fn livekit_mock(dials: Dials, answer: bool) -> String {
    let router = Router::new().route(
        "/twirp/livekit.SIP/CreateSIPParticipant",
        post(move |Json(body): Json<Value>| {
            let dials = dials.clone();
            async move {
                dials.lock().unwrap().push(body.clone());
                if answer {
                    (
                        StatusCode::OK,
                        Json(json!({
                            "participantId": "PA_1",
                            "participantIdentity": body["participant_identity"],
                            "roomName": body["room_name"],
                            "sipCallId": "SCL_1"
                        })),
                    )
                } else {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({"code": "not_found", "msg": "number unreachable"})),
                    )
                }
            }
        }),
    );
    format!("ws://{}", spawn(router).await)
}

fn create_prospect(app: &TestApp) -> i64 {
    let conn = app.pool.get().unwrap();
    conn.execute(
        "INSERT INTO prospects (business_id, phone_number) VALUES ('newport-rentals', '+19495550100')",
        [],
    )
    .unwrap();
    conn.last_insert_rowid()
}

#[tokio::test]
async fn answered_call_is_logged_against_the_prospect() {
    let dials = Dials::default();
    let url = livekit_mock(dials.clone(), true).await;
    let app = test_app(dev_livekit(&url, Some("ST_outbound")), None);
    let prospect_id = create_prospect(&app);

    let (status, body) = app
        .send(
            "POST",
            "/api/make-call",
            Some(json!({"phone_number": " +19495550100 ", "prospect_id": prospect_id})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["phone_number"], "+19495550100");
    assert_eq!(body["message"], "Calling +19495550100...");

    let room = body["room_name"].as_str().unwrap();
    let suffix = room.strip_prefix("newport_outbound_").expect("outbound room prefix");
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(body["call_id"].as_str().unwrap().starts_with("newport_caller_"));

    {
        let dials = dials.lock().unwrap();
        assert_eq!(dials.len(), 1);
        assert_eq!(dials[0]["sip_trunk_id"], "ST_outbound");
        assert_eq!(dials[0]["participant_name"], "Newport Rentals");
        assert_eq!(dials[0]["wait_until_answered"], true);
    }

    let (_, logs) = app.send("GET", "/api/call-logs", None).await;
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["call_status"], "connected");
    assert_eq!(logs[0]["room_name"], room);
    assert_eq!(logs[0]["prospect_id"], prospect_id);

    let (_, prospect) = app
        .send("GET", &format!("/api/prospects/{prospect_id}"), None)
        .await;
    assert_eq!(prospect["call_count"], 1);
    assert_eq!(prospect["status"], "contacted");
    assert!(prospect["last_called"].is_string());
}

#[tokio::test]
async fn failed_dial_is_reported_and_logged() {
    let url = livekit_mock(Dials::default(), false).await;
    let app = test_app(dev_livekit(&url, Some("ST_outbound")), None);

    let (status, body) = app
        .send(
            "POST",
            "/api/make-call",
            Some(json!({"phone_number": "+19495550100", "caller_name": "Ashley"})),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Failed to initiate call: "), "{error}");
    assert!(error.contains("number unreachable"), "{error}");

    let (_, logs) = app.send("GET", "/api/call-logs", None).await;
    assert_eq!(logs[0]["call_status"], "failed");
    assert!(logs[0]["prospect_id"].is_null());
}

#[tokio::test]
async fn trunk_creation_returns_the_new_id() {
    let trunks: Dials = Dials::default();
    let sink = trunks.clone();
    let router = Router::new().route(
        "/twirp/livekit.SIP/CreateSIPOutboundTrunk",
        post(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(body);
                Json(json!({"sipTrunkId": "ST_new", "name": "newport-trunk"}))
            }
        }),
    );
    let url = format!("ws://{}", spawn(router).await);
    let app = test_app(dev_livekit(&url, None), None);

    let (status, body) = app
        .send(
            "POST",
            "/api/create-trunk",
            Some(json!({
                "sip_address": "newport.pstn.twilio.com",
                "username": "user",
                "password": "pass"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["trunk_id"], "ST_new");
    assert_eq!(body["name"], "newport-trunk");
    assert!(body["message"].as_str().unwrap().contains("SIP_TRUNK_ID=ST_new"));

    let trunks = trunks.lock().unwrap();
    assert_eq!(trunks[0]["trunk"]["numbers"], json!(["*"]));
    assert_eq!(trunks[0]["trunk"]["address"], "newport.pstn.twilio.com");
}

#[tokio::test]
async fn status_never_echoes_secrets() {
    let app = test_app(dev_livekit("ws://localhost:7880", None), None);
    let (status, body) = app.send("GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["environment"]["livekit_api_secret"], "set");
    assert_eq!(body["environment"]["sip_trunk_id"], "missing");
    assert_eq!(body["environment"]["google_calendar"], "missing");
    assert!(!body.to_string().contains(DEV_LIVEKIT_API_SECRET));
}

#[tokio::test]
async fn health_reports_version() {
    let app = test_app(LiveKitConfig::default(), None);
    let (status, body) = app.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
