//! The call-session state machine.
//!
//! [`CallSession::handle`] maps one named event to the actions the
//! controller should take. It performs no I/O and owns no timers, so every
//! transition can be exercised directly.

use crate::router::{GreetingPolicy, ScriptKind};
use concierge_types::{CallState, UserState};
use concierge_voice::ToolCall;
use std::time::Duration;
use uuid::Uuid;

/// Something that happened to the call.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The agent joined the room and the voice pipeline is up.
    Started,
    TrackSubscribed {
        audio: bool,
        participant_identity: String,
    },
    /// The delayed greeting's timer fired.
    GreetingDue,
    /// No caller audio arrived in time.
    GreetingTimedOut,
    /// The lead form is on the caller's screen.
    FormShown,
    /// The caller submitted the lead form.
    LeadSubmitted { payload: String },
    BookingRequested(ToolCall),
    UserStateChanged(UserState),
    AwayTimerElapsed,
    ParticipantDisconnected { participant_identity: String },
    SetupFailed(String),
    Shutdown,
}

/// Something the controller must do.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ArmGreetingTimeout(Duration),
    ScheduleGreeting(Duration),
    CancelGreetingTimer,
    Greet,
    /// Stop the agent mid-sentence.
    Interrupt,
    DispatchLead(String),
    DispatchBooking(ToolCall),
    ArmAwayTimer(Duration),
    CancelAwayTimer,
    /// Close the room link and signal shutdown. Emitted exactly once.
    Teardown,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    CallerLeft,
    CallerAway,
    /// No caller audio before the greeting timeout.
    NoCaller,
    SetupFailed(String),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub greeting: GreetingPolicy,
    /// Zero ends the call as soon as the caller goes away.
    pub away_grace: Duration,
    pub agent_identity: String,
}

/// One call, from job acceptance to teardown.
#[derive(Debug)]
pub struct CallSession {
    id: Uuid,
    room_name: String,
    script: ScriptKind,
    state: CallState,
    form_displayed: bool,
    greeted: bool,
    /// A caller track arrived before the session started.
    caller_audio_seen: bool,
    end_reason: Option<EndReason>,
    settings: SessionSettings,
}

impl CallSession {
    pub fn new(room_name: &str, script: ScriptKind, settings: SessionSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_name: room_name.to_string(),
            script,
            state: CallState::Connecting,
            form_displayed: false,
            greeted: false,
            caller_audio_seen: false,
            end_reason: None,
            settings,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn script(&self) -> ScriptKind {
        self.script
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn form_displayed(&self) -> bool {
        self.form_displayed
    }

    pub fn greeted(&self) -> bool {
        self.greeted
    }

    pub fn end_reason(&self) -> Option<&EndReason> {
        self.end_reason.as_ref()
    }

    /// Applies `event` and returns the actions it calls for.
    ///
    /// Once the session has ended every event is ignored.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Action> {
        if self.state.is_terminal() {
            tracing::debug!(session = %self.id, ?event, "event after end ignored");
            return Vec::new();
        }

        match event {
            SessionEvent::Started => self.start(),
            SessionEvent::TrackSubscribed {
                audio,
                participant_identity,
            } => self.track_subscribed(audio, &participant_identity),
            SessionEvent::GreetingDue => self.greet(),
            SessionEvent::GreetingTimedOut => {
                if self.greeted {
                    Vec::new()
                } else {
                    self.end(EndReason::NoCaller)
                }
            }
            SessionEvent::FormShown => {
                self.form_displayed = true;
                if self.state == CallState::Away {
                    self.state = CallState::Active;
                    vec![Action::CancelAwayTimer]
                } else {
                    Vec::new()
                }
            }
            SessionEvent::LeadSubmitted { payload } => {
                self.form_displayed = false;
                vec![Action::Interrupt, Action::DispatchLead(payload)]
            }
            SessionEvent::BookingRequested(call) => vec![Action::DispatchBooking(call)],
            SessionEvent::UserStateChanged(state) => self.user_state_changed(state),
            SessionEvent::AwayTimerElapsed => {
                if self.state == CallState::Away {
                    self.end(EndReason::CallerAway)
                } else {
                    Vec::new()
                }
            }
            SessionEvent::ParticipantDisconnected {
                participant_identity,
            } => {
                if participant_identity == self.settings.agent_identity {
                    Vec::new()
                } else {
                    tracing::info!(
                        session = %self.id,
                        participant = %participant_identity,
                        "participant disconnected"
                    );
                    self.end(EndReason::CallerLeft)
                }
            }
            SessionEvent::SetupFailed(error) => self.end(EndReason::SetupFailed(error)),
            SessionEvent::Shutdown => self.end(EndReason::Shutdown),
        }
    }

    fn start(&mut self) -> Vec<Action> {
        if self.state != CallState::Connecting {
            return Vec::new();
        }
        self.state = CallState::Active;

        match &self.settings.greeting {
            GreetingPolicy::AfterAudioTrack { timeout, .. } => {
                if self.caller_audio_seen {
                    self.greet()
                } else {
                    vec![Action::ArmGreetingTimeout(*timeout)]
                }
            }
            GreetingPolicy::Delayed(delay) => vec![Action::ScheduleGreeting(*delay)],
        }
    }

    fn track_subscribed(&mut self, audio: bool, identity: &str) -> Vec<Action> {
        if !audio
            || !self
                .settings
                .greeting
                .greets_for(identity, &self.settings.agent_identity)
        {
            return Vec::new();
        }
        if self.state == CallState::Connecting {
            self.caller_audio_seen = true;
            return Vec::new();
        }

        let mut actions = self.greet();
        if !actions.is_empty() {
            actions.insert(0, Action::CancelGreetingTimer);
        }
        actions
    }

    fn greet(&mut self) -> Vec<Action> {
        if self.greeted {
            return Vec::new();
        }
        self.greeted = true;
        vec![Action::Greet]
    }

    fn user_state_changed(&mut self, state: UserState) -> Vec<Action> {
        match state {
            UserState::Away if self.form_displayed => {
                tracing::info!(session = %self.id, "caller away while form displayed, staying");
                Vec::new()
            }
            UserState::Away if self.settings.away_grace.is_zero() => {
                self.end(EndReason::CallerAway)
            }
            UserState::Away => {
                if self.state == CallState::Away {
                    return Vec::new();
                }
                self.state = CallState::Away;
                vec![Action::ArmAwayTimer(self.settings.away_grace)]
            }
            UserState::Speaking | UserState::Listening => {
                if self.state == CallState::Away {
                    self.state = CallState::Active;
                    vec![Action::CancelAwayTimer]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn end(&mut self, reason: EndReason) -> Vec<Action> {
        tracing::info!(session = %self.id, room = %self.room_name, ?reason, "session ending");
        self.state = CallState::Ended;
        self.end_reason = Some(reason);
        vec![Action::Teardown]
    }
}
