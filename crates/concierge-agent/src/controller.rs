//! Runs one call: feeds room events through the session state machine and
//! carries out the resulting actions.

use crate::dispatch::Dispatcher;
use crate::router::Script;
use crate::session::{Action, CallSession, EndReason, SessionEvent};
use concierge_types::CallState;
use concierge_voice::{RoomEvent, RoomLink, RpcInvocation, ToolCall, TrackKind};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

/// RPC the browser form calls with the visitor's details.
pub const SUBMIT_LEAD_FORM: &str = "submit_lead_form";

/// Signals a running controller to end its session.
///
/// Cloneable; shutting down more than once has no further effect.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self(Arc::new(tx))
    }

    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been signalled.
    pub async fn wait(&self) {
        let mut rx = self.0.subscribe();
        // The sender lives in self, so this cannot fail.
        let _ = rx.wait_for(|down| *down).await;
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

/// How a call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub state: CallState,
    pub end_reason: Option<EndReason>,
    pub greeted: bool,
}

/// The agent's voice. Muted when no TTS provider is available.
#[derive(Clone)]
struct Voice {
    link: Arc<dyn RoomLink>,
    muted: bool,
}

impl Voice {
    async fn speak(&self, text: &str) {
        if self.muted {
            warn!(room = %self.link.room_name(), "cannot speak, TTS is not available");
            return;
        }
        if let Err(e) = self.link.say(text, true).await {
            error!(room = %self.link.room_name(), error = %e, "failed to speak");
        }
    }
}

struct Timer {
    sleep: Pin<Box<Sleep>>,
    event: SessionEvent,
}

impl Timer {
    fn new(after: Duration, event: SessionEvent) -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(after)),
            event,
        }
    }
}

#[derive(Default)]
struct Timers {
    greeting: Option<Timer>,
    away: Option<Timer>,
}

/// Waits for `timer` and yields its event. An unarmed timer never fires.
async fn fire(timer: &mut Option<Timer>) -> SessionEvent {
    let Some(armed) = timer.as_mut() else {
        return std::future::pending().await;
    };
    armed.sleep.as_mut().await;
    let event = armed.event.clone();
    *timer = None;
    event
}

enum Next {
    Room(Option<RoomEvent>),
    Session(SessionEvent),
}

/// Owns a call's session, link and timers.
pub struct CallController {
    session: CallSession,
    script: Arc<Script>,
    voice: Voice,
    dispatcher: Arc<Dispatcher>,
    shutdown: ShutdownHandle,
}

impl CallController {
    pub fn new(
        session: CallSession,
        script: Arc<Script>,
        link: Arc<dyn RoomLink>,
        dispatcher: Arc<Dispatcher>,
        tts_available: bool,
    ) -> Self {
        Self {
            session,
            script,
            voice: Voice {
                link,
                muted: !tts_available,
            },
            dispatcher,
            shutdown: ShutdownHandle::new(),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    /// Drives the call until it ends.
    ///
    /// A closed event channel is treated as a shutdown.
    pub async fn run(mut self, mut events: mpsc::Receiver<RoomEvent>) -> SessionOutcome {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut timers = Timers::default();

        info!(
            session = %self.session.id(),
            room = %self.session.room_name(),
            script = %self.script.kind,
            "session starting"
        );

        let first = if *shutdown_rx.borrow_and_update() {
            SessionEvent::Shutdown
        } else {
            SessionEvent::Started
        };
        self.apply(first, &mut timers).await;

        while !self.session.state().is_terminal() {
            let next = tokio::select! {
                event = events.recv() => Next::Room(event),
                event = fire(&mut timers.greeting) => Next::Session(event),
                event = fire(&mut timers.away) => Next::Session(event),
                _ = shutdown_rx.changed() => Next::Session(SessionEvent::Shutdown),
            };

            let event = match next {
                Next::Room(Some(room_event)) => match self.translate(room_event) {
                    Some(event) => event,
                    None => continue,
                },
                Next::Room(None) => SessionEvent::Shutdown,
                Next::Session(event) => event,
            };
            self.apply(event, &mut timers).await;
        }

        self.outcome()
    }

    /// Ends a session whose setup failed before it could run.
    pub async fn abort(mut self, error: String) -> SessionOutcome {
        error!(room = %self.session.room_name(), error = %error, "session setup failed");
        let mut timers = Timers::default();
        self.apply(SessionEvent::SetupFailed(error), &mut timers).await;
        self.outcome()
    }

    fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            session_id: self.session.id(),
            state: self.session.state(),
            end_reason: self.session.end_reason().cloned(),
            greeted: self.session.greeted(),
        }
    }

    fn translate(&self, event: RoomEvent) -> Option<SessionEvent> {
        match event {
            RoomEvent::TrackSubscribed {
                kind,
                participant_identity,
            } => Some(SessionEvent::TrackSubscribed {
                audio: kind == TrackKind::Audio,
                participant_identity,
            }),
            RoomEvent::ParticipantDisconnected {
                participant_identity,
            } => Some(SessionEvent::ParticipantDisconnected {
                participant_identity,
            }),
            RoomEvent::UserStateChanged(state) => Some(SessionEvent::UserStateChanged(state)),
            RoomEvent::Rpc(invocation) => self.answer_rpc(invocation),
            RoomEvent::Tool(ToolCall::ShowLeadForm) => Some(SessionEvent::FormShown),
            RoomEvent::Tool(call) => Some(SessionEvent::BookingRequested(call)),
        }
    }

    /// Replies right away; the submission itself is handled afterwards.
    fn answer_rpc(&self, invocation: RpcInvocation) -> Option<SessionEvent> {
        let RpcInvocation {
            method,
            caller_identity,
            payload,
            reply,
        } = invocation;

        if method == SUBMIT_LEAD_FORM {
            info!(caller = %caller_identity, "lead form submitted");
            if reply.send(Ok("SUCCESS".to_string())).is_err() {
                warn!(caller = %caller_identity, "rpc caller gone before reply");
            }
            Some(SessionEvent::LeadSubmitted { payload })
        } else {
            warn!(caller = %caller_identity, method = %method, "unsupported rpc");
            let _ = reply.send(Err(format!("unsupported method: {method}")));
            None
        }
    }

    async fn apply(&mut self, event: SessionEvent, timers: &mut Timers) {
        for action in self.session.handle(event) {
            match action {
                Action::ArmGreetingTimeout(after) => {
                    timers.greeting =
                        Some(Timer::new(after, SessionEvent::GreetingTimedOut));
                }
                Action::ScheduleGreeting(after) => {
                    timers.greeting = Some(Timer::new(after, SessionEvent::GreetingDue));
                }
                Action::CancelGreetingTimer => timers.greeting = None,
                Action::Greet => self.voice.speak(&self.script.greeting).await,
                Action::Interrupt => {
                    if let Err(e) = self.voice.link.interrupt().await {
                        warn!(error = %e, "failed to interrupt speech");
                    }
                }
                Action::DispatchLead(payload) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let voice = self.voice.clone();
                    tokio::spawn(async move {
                        let line = dispatcher.lead_reply(&payload).await;
                        voice.speak(line).await;
                    });
                }
                Action::DispatchBooking(call) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let voice = self.voice.clone();
                    tokio::spawn(async move {
                        if let Some(line) = dispatcher.booking_reply(&call).await {
                            voice.speak(&line).await;
                        }
                    });
                }
                Action::ArmAwayTimer(after) => {
                    timers.away = Some(Timer::new(after, SessionEvent::AwayTimerElapsed));
                }
                Action::CancelAwayTimer => timers.away = None,
                Action::Teardown => {
                    *timers = Timers::default();
                    if let Err(e) = self.voice.link.close().await {
                        error!(error = %e, "failed to leave room");
                    }
                    self.shutdown.shutdown();
                    info!(
                        session = %self.session.id(),
                        reason = ?self.session.end_reason(),
                        "session torn down"
                    );
                }
            }
        }
    }
}
