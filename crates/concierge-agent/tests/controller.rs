use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use concierge_agent::config::Config;
use concierge_agent::dispatch::{LEAD_ERROR, LEAD_THANKS};
use concierge_agent::router::{DEFAULT_GREETING, INBOUND_GREETING};
use concierge_agent::{EndReason, SessionOutcome, ShutdownHandle, WorkerContext};
use concierge_types::{CallState, UserState};
use concierge_voice::{
    AgentOutput, AgentRoomClient, LiveKitConfig, RoomEvent, RoomLink, RpcInvocation, ToolCall,
    TrackKind,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(5);

fn config(webhook: Option<String>) -> Config {
    let mut config = Config::default();
    config.livekit = LiveKitConfig::new("ws://localhost:7880", "devkey", "secret");
    config.providers.cartesia_api_key = Some("sk_car".into());
    config.webhook.url = webhook;
    config.business.id = Some("newport".into());
    config.business.prompt_template = "/nonexistent/prompt.template".into();
    config
}

struct Call {
    client: Arc<AgentRoomClient>,
    token: String,
    outputs: broadcast::Receiver<AgentOutput>,
    events: mpsc::Sender<RoomEvent>,
    shutdown: ShutdownHandle,
    handle: JoinHandle<SessionOutcome>,
}

fn start(config: Config, room: &str) -> Call {
    let ctx = WorkerContext::prewarm(config);
    let job = ctx.accept_job(room);
    let token = ctx.agent_token(&job).unwrap();
    let client = Arc::new(AgentRoomClient::connect(
        ctx.livekit_url(),
        &token,
        room,
        job.agent_identity(),
    ));
    let outputs = client.subscribe();
    let link: Arc<dyn RoomLink> = client.clone();
    let controller = ctx.controller(&job, link);
    let shutdown = controller.shutdown_handle();
    let (events, rx) = mpsc::channel(16);
    let handle = tokio::spawn(controller.run(rx));
    Call {
        client,
        token,
        outputs,
        events,
        shutdown,
        handle,
    }
}

impl Call {
    async fn send(&self, event: RoomEvent) {
        self.events.send(event).await.unwrap();
    }

    async fn next_output(&mut self) -> AgentOutput {
        tokio::time::timeout(WAIT, self.outputs.recv())
            .await
            .expect("no agent output in time")
            .unwrap()
    }

    async fn rpc(&self, method: &str, payload: &str) -> Result<String, String> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomEvent::Rpc(RpcInvocation {
            method: method.into(),
            caller_identity: "web-visitor".into(),
            payload: payload.into(),
            reply,
        }))
        .await;
        tokio::time::timeout(WAIT, rx).await.unwrap().unwrap()
    }

    async fn finish(self) -> SessionOutcome {
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("session did not end")
            .unwrap()
    }
}

fn caller_audio(identity: &str) -> RoomEvent {
    RoomEvent::TrackSubscribed {
        kind: TrackKind::Audio,
        participant_identity: identity.into(),
    }
}

fn say(text: &str) -> AgentOutput {
    AgentOutput::Say {
        text: text.into(),
        allow_interruptions: true,
    }
}

#[derive(Clone)]
struct Webhook {
    status: StatusCode,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn receive_lead(State(hook): State<Webhook>, Json(body): Json<Value>) -> StatusCode {
    hook.received.lock().unwrap().push(body);
    hook.status
}

async fn webhook(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().route("/lead", post(receive_lead)).with_state(Webhook {
        status,
        received: Arc::clone(&received),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/lead"), received)
}

const LEAD: &str = r#"{"name":"Ada","phone":"+19495550100","message":"Two nights in June"}"#;

#[tokio::test]
async fn bridge_learns_how_to_join_before_anything_else() {
    let mut call = start(config(None), "newport_outbound_abcd1234");

    call.client.announce().unwrap();
    assert_eq!(
        call.next_output().await,
        AgentOutput::Join {
            url: "ws://localhost:7880".into(),
            room: "newport_outbound_abcd1234".into(),
            identity: "ashley-outbound".into(),
            token: call.token.clone(),
        }
    );
    assert!(!call.token.is_empty());

    call.shutdown.shutdown();
    assert_eq!(call.next_output().await, AgentOutput::Closed);
    assert!(call.client.announce().is_err());
    assert_eq!(call.finish().await.end_reason, Some(EndReason::Shutdown));
}

#[tokio::test]
async fn greets_caller_and_ends_when_they_leave() {
    let mut call = start(config(None), "newport_guest_42");

    call.send(caller_audio("chat-to-form-agent-1")).await;
    call.send(caller_audio("guest-42")).await;
    assert_eq!(call.next_output().await, say(INBOUND_GREETING));

    call.send(RoomEvent::ParticipantDisconnected {
        participant_identity: "guest-42".into(),
    })
    .await;
    assert_eq!(call.next_output().await, AgentOutput::Closed);

    let client = Arc::clone(&call.client);
    let outcome = call.finish().await;
    assert_eq!(outcome.state, CallState::Ended);
    assert_eq!(outcome.end_reason, Some(EndReason::CallerLeft));
    assert!(outcome.greeted);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn delivered_lead_is_thanked() {
    let (url, received) = webhook(StatusCode::OK).await;
    let mut call = start(config(Some(url)), "acme-line");

    call.send(caller_audio("visitor")).await;
    assert_eq!(call.next_output().await, say(DEFAULT_GREETING));

    call.send(RoomEvent::Tool(ToolCall::ShowLeadForm)).await;
    assert_eq!(call.rpc("submit_lead_form", LEAD).await, Ok("SUCCESS".into()));
    assert_eq!(call.next_output().await, AgentOutput::Interrupt);
    assert_eq!(call.next_output().await, say(LEAD_THANKS));

    {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["business_id"], "newport");
        assert_eq!(received[0]["visitor_name"], "Ada");
        assert_eq!(received[0]["inquiry"], "Two nights in June");
    }

    call.shutdown.shutdown();
    assert_eq!(call.finish().await.end_reason, Some(EndReason::Shutdown));
}

#[tokio::test]
async fn failed_lead_gets_apology() {
    let (url, received) = webhook(StatusCode::INTERNAL_SERVER_ERROR).await;
    let mut call = start(config(Some(url)), "acme-line");

    assert_eq!(call.rpc("submit_lead_form", LEAD).await, Ok("SUCCESS".into()));
    assert_eq!(call.next_output().await, AgentOutput::Interrupt);
    assert_eq!(call.next_output().await, say(LEAD_ERROR));
    assert_eq!(received.lock().unwrap().len(), 1);

    call.shutdown.shutdown();
    call.finish().await;
}

#[tokio::test]
async fn away_is_ignored_while_form_is_shown() {
    let mut call = start(config(None), "acme-line");

    call.send(RoomEvent::Tool(ToolCall::ShowLeadForm)).await;
    call.send(RoomEvent::UserStateChanged(UserState::Away)).await;

    // Still running: the next RPC is answered.
    assert_eq!(
        call.rpc("transfer_call", "{}").await,
        Err("unsupported method: transfer_call".into())
    );

    call.send(RoomEvent::UserStateChanged(UserState::Away)).await;
    assert_eq!(call.next_output().await, AgentOutput::Closed);
    let outcome = call.finish().await;
    assert_eq!(outcome.state, CallState::Ended);
    assert_eq!(outcome.end_reason, Some(EndReason::CallerAway));
}

#[tokio::test(start_paused = true)]
async fn form_shown_during_away_grace_keeps_call() {
    let mut graced = config(None);
    graced.session.away_grace_seconds = 5;
    let mut call = start(graced, "acme-line");

    call.send(caller_audio("visitor")).await;
    assert_eq!(call.next_output().await, say(DEFAULT_GREETING));

    call.send(RoomEvent::UserStateChanged(UserState::Away)).await;
    call.send(RoomEvent::Tool(ToolCall::ShowLeadForm)).await;
    assert_eq!(
        call.rpc("transfer_call", "{}").await,
        Err("unsupported method: transfer_call".into())
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!call.handle.is_finished());
    assert!(call.outputs.try_recv().is_err());

    call.shutdown.shutdown();
    assert_eq!(call.next_output().await, AgentOutput::Closed);
    assert_eq!(call.finish().await.end_reason, Some(EndReason::Shutdown));
}

#[tokio::test]
async fn away_without_form_ends_call() {
    let mut call = start(config(None), "acme-line");

    call.send(RoomEvent::UserStateChanged(UserState::Away)).await;
    assert_eq!(call.next_output().await, AgentOutput::Closed);
    let outcome = call.finish().await;
    assert_eq!(outcome.end_reason, Some(EndReason::CallerAway));
    assert!(!outcome.greeted);
}

#[tokio::test]
async fn shutdown_twice_tears_down_once() {
    let mut call = start(config(None), "acme-line");
    let shutdown = call.shutdown.clone();

    shutdown.shutdown();
    shutdown.shutdown();
    assert_eq!(call.next_output().await, AgentOutput::Closed);

    let client = Arc::clone(&call.client);
    let mut outputs = client.subscribe();
    let outcome = call.finish().await;
    assert_eq!(outcome.end_reason, Some(EndReason::Shutdown));
    assert!(shutdown.is_shutdown());

    client.close().await.unwrap();
    shutdown.shutdown();
    assert!(outputs.try_recv().is_err());
}

#[tokio::test]
async fn closed_event_feed_ends_call() {
    let call = start(config(None), "acme-line");
    let Call {
        events, handle, shutdown, ..
    } = call;
    drop(events);
    let outcome = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(outcome.end_reason, Some(EndReason::Shutdown));
    shutdown.wait().await;
}

#[tokio::test]
async fn muted_agent_never_speaks() {
    let mut muted = config(None);
    muted.providers.cartesia_api_key = None;
    let mut call = start(muted, "newport_guest");

    call.send(caller_audio("guest")).await;
    call.send(RoomEvent::ParticipantDisconnected {
        participant_identity: "guest".into(),
    })
    .await;

    assert_eq!(call.next_output().await, AgentOutput::Closed);
    let outcome = call.finish().await;
    assert!(outcome.greeted);
}

#[tokio::test(start_paused = true)]
async fn silent_room_times_out() {
    let call = start(config(None), "newport_guest");
    let outcome = call.handle.await.unwrap();
    assert_eq!(outcome.end_reason, Some(EndReason::NoCaller));
    assert!(!outcome.greeted);
}

#[tokio::test(start_paused = true)]
async fn outbound_greeting_waits_for_line_to_settle() {
    let mut call = start(config(None), "newport_outbound_1a2b3c4d");

    // A SIP caller's track does not trigger the greeting early.
    call.send(caller_audio("newport_caller_1a2b3c4d")).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(call.outputs.try_recv().is_err());

    tokio::time::sleep(Duration::from_secs(2)).await;
    match call.outputs.recv().await.unwrap() {
        AgentOutput::Say { text, .. } => assert!(text.starts_with("Hi, is this the right number")),
        other => panic!("expected greeting, got {other:?}"),
    }

    call.shutdown.shutdown();
    call.handle.await.unwrap();
}
