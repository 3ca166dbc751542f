use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use concierge_voice::{
    CreateOutboundTrunk, DialRequest, LiveKitConfig, VoiceError, VoiceService,
    DEV_LIVEKIT_API_KEY, DEV_LIVEKIT_API_SECRET, DEV_LIVEKIT_URL,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn dev_service() -> VoiceService {
    VoiceService::new(LiveKitConfig::new(
        DEV_LIVEKIT_URL,
        DEV_LIVEKIT_API_KEY,
        DEV_LIVEKIT_API_SECRET,
    ))
}

fn decode_claims<T: for<'de> Deserialize<'de>>(token: &str) -> T {
    let validation = Validation::new(Algorithm::HS256);
    let key = DecodingKey::from_secret(DEV_LIVEKIT_API_SECRET.as_bytes());
    decode::<T>(token, &key, &validation)
        .expect("token should verify with the dev secret")
        .claims
}

#[derive(Deserialize)]
struct JoinClaims {
    sub: String,
    name: String,
    iss: String,
    video: VideoClaims,
    #[serde(default)]
    metadata: Option<String>,
}

#[derive(Deserialize)]
struct VideoClaims {
    #[serde(rename = "roomJoin")]
    room_join: bool,
    room: String,
    #[serde(rename = "canPublish")]
    can_publish: bool,
    #[serde(rename = "canSubscribe")]
    can_subscribe: bool,
    #[serde(rename = "canPublishData")]
    can_publish_data: bool,
}

#[test]
fn join_token_grants_room_access() {
    let token = dev_service()
        .generate_join_token("web_session_123", "visitor-1", "Website Visitor")
        .expect("token should be minted");

    let claims: JoinClaims = decode_claims(&token);
    assert_eq!(claims.sub, "visitor-1");
    assert_eq!(claims.name, "Website Visitor");
    assert_eq!(claims.iss, DEV_LIVEKIT_API_KEY);
    assert!(claims.video.room_join);
    assert_eq!(claims.video.room, "web_session_123");
    assert!(claims.video.can_publish);
    assert!(claims.video.can_subscribe);
    assert!(claims.video.can_publish_data);
}

#[test]
fn agent_token_carries_agent_marker() {
    let token = dev_service()
        .generate_agent_token("newport_lobby", "newport-rentals")
        .expect("token should be minted");

    let claims: JoinClaims = decode_claims(&token);
    assert_eq!(claims.sub, "newport-rentals");
    assert_eq!(claims.video.room, "newport_lobby");
    let metadata: Value = serde_json::from_str(&claims.metadata.unwrap()).unwrap();
    assert_eq!(metadata["agent"], true);
}

#[test]
fn tokens_require_signing_credentials() {
    let service = VoiceService::new(LiveKitConfig::default());
    assert!(!service.is_enabled());
    let err = service
        .generate_join_token("room", "id", "name")
        .unwrap_err();
    assert!(matches!(err, VoiceError::Config(_)));
}

#[test]
fn livekit_config_reads_toml() {
    let config: LiveKitConfig = toml::from_str(
        r#"
        url = "wss://demo.livekit.cloud"
        api_key = "key"
        api_secret = "secret"
        sip_trunk_id = "ST_abc123"
        "#,
    )
    .expect("parse TOML");
    assert_eq!(config.sip_trunk_id.as_deref(), Some("ST_abc123"));
    assert_eq!(config.token_ttl_seconds, 3600);

    let serialized = serde_json::to_value(&config).unwrap();
    assert!(serialized.get("api_secret").is_none());
}

#[derive(Clone, Default)]
struct Recorded {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn spawn_livekit(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}")
}

#[derive(Deserialize)]
struct SipClaims {
    iss: String,
    sip: SipGrant,
}

#[derive(Deserialize)]
struct SipGrant {
    admin: bool,
    call: bool,
}

#[tokio::test]
async fn dialing_posts_twirp_request_with_sip_grant() {
    let recorded = Recorded::default();
    let sink = recorded.clone();
    let app = Router::new().route(
        "/twirp/livekit.SIP/CreateSIPParticipant",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                sink.calls.lock().unwrap().push((auth, body));
                Json(json!({
                    "participantId": "PA_1",
                    "participantIdentity": "newport_caller_1",
                    "roomName": "newport_outbound_abcd1234",
                    "sipCallId": "SCL_1"
                }))
            }
        }),
    );
    let url = spawn_livekit(app).await;

    let service = VoiceService::new(LiveKitConfig::new(
        url,
        DEV_LIVEKIT_API_KEY,
        DEV_LIVEKIT_API_SECRET,
    ));
    let info = service
        .create_sip_participant(&DialRequest {
            sip_trunk_id: "ST_trunk".into(),
            sip_call_to: "+15555550123".into(),
            room_name: "newport_outbound_abcd1234".into(),
            participant_identity: "newport_caller_1".into(),
            participant_name: "Newport Rentals".into(),
            wait_until_answered: true,
        })
        .await
        .expect("dial should succeed");

    assert_eq!(info.participant_identity, "newport_caller_1");
    assert_eq!(info.sip_call_id, "SCL_1");

    let calls = recorded.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (auth, body) = &calls[0];
    assert_eq!(body["sip_call_to"], "+15555550123");
    assert_eq!(body["wait_until_answered"], true);

    let token = auth.strip_prefix("Bearer ").expect("bearer auth");
    let claims: SipClaims = decode_claims(token);
    assert_eq!(claims.iss, DEV_LIVEKIT_API_KEY);
    assert!(claims.sip.admin);
    assert!(claims.sip.call);
}

#[tokio::test]
async fn twirp_errors_surface_the_server_message() {
    let app = Router::new().route(
        "/twirp/livekit.SIP/CreateSIPOutboundTrunk",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"code": "invalid_argument", "msg": "address is required"})),
            )
        }),
    );
    let url = spawn_livekit(app).await;

    let service = VoiceService::new(LiveKitConfig::new(
        url,
        DEV_LIVEKIT_API_KEY,
        DEV_LIVEKIT_API_SECRET,
    ));
    let err = service
        .create_outbound_trunk(&CreateOutboundTrunk {
            name: "newport-trunk".into(),
            metadata: String::new(),
            address: String::new(),
            numbers: vec!["*".into()],
            auth_username: "user".into(),
            auth_password: "pass".into(),
        })
        .await
        .unwrap_err();

    match err {
        VoiceError::Sip { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "address is required");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
