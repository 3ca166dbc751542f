use crate::error::VoiceError;
use async_trait::async_trait;
use concierge_types::UserState;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, oneshot};
use tracing::info;

/// Default capacity for the per-agent output broadcast channel.
const DEFAULT_OUTPUT_BROADCAST_CAPACITY: usize = 256;

/// Kind of a subscribed media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Video,
}

/// What the worker answers to an RPC: a payload string or an error message.
pub type RpcReply = Result<String, String>;

/// An RPC call from a remote participant, waiting for its reply.
#[derive(Debug)]
pub struct RpcInvocation {
    pub method: String,
    pub caller_identity: String,
    pub payload: String,
    pub reply: oneshot::Sender<RpcReply>,
}

fn default_duration() -> u32 {
    60
}

/// A function the language model asked the agent to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    /// The lead form was put on the caller's screen.
    ShowLeadForm,
    CheckAvailability {
        date: String,
        #[serde(default = "default_duration")]
        duration: u32,
    },
    BookViewing {
        guest_name: String,
        guest_phone: String,
        date: String,
        time: String,
        #[serde(default)]
        guest_email: String,
        #[serde(default)]
        notes: String,
    },
    AvailableDates,
}

/// Everything the room tells the call controller.
#[derive(Debug)]
pub enum RoomEvent {
    TrackSubscribed {
        kind: TrackKind,
        participant_identity: String,
    },
    ParticipantDisconnected {
        participant_identity: String,
    },
    UserStateChanged(UserState),
    Rpc(RpcInvocation),
    Tool(ToolCall),
}

/// What the agent asked the room to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentOutput {
    /// Where and as whom the bridge should join the room.
    Join {
        url: String,
        room: String,
        identity: String,
        token: String,
    },
    Say {
        text: String,
        allow_interruptions: bool,
    },
    Interrupt,
    Closed,
}

/// The agent's handle on its room.
#[async_trait]
pub trait RoomLink: Send + Sync {
    fn room_name(&self) -> &str;

    /// Queues `text` for speech.
    async fn say(&self, text: &str, allow_interruptions: bool) -> Result<(), VoiceError>;

    /// Cuts off whatever the agent is currently saying.
    async fn interrupt(&self) -> Result<(), VoiceError>;

    /// Leaves the room. Calling it again does nothing.
    async fn close(&self) -> Result<(), VoiceError>;
}

/// Room link backed by an out-of-process media bridge.
///
/// Speech and control requests are published on a broadcast channel; the
/// bridge (or a test) subscribes and forwards them to the real room.
pub struct AgentRoomClient {
    url: String,
    token: String,
    room_name: String,
    identity: String,
    connected: AtomicBool,
    output_tx: broadcast::Sender<AgentOutput>,
}

impl std::fmt::Debug for AgentRoomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRoomClient")
            .field("url", &self.url)
            .field("room_name", &self.room_name)
            .field("identity", &self.identity)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl AgentRoomClient {
    pub fn connect(url: &str, token: &str, room_name: &str, identity: &str) -> Self {
        info!(
            room = room_name,
            url,
            identity,
            token_len = token.len(),
            "agent joining room"
        );

        let (output_tx, _) = broadcast::channel(DEFAULT_OUTPUT_BROADCAST_CAPACITY);

        Self {
            url: url.to_string(),
            token: token.to_string(),
            room_name: room_name.to_string(),
            identity: identity.to_string(),
            connected: AtomicBool::new(true),
            output_tx,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Subscribes to the agent's outgoing requests.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentOutput> {
        self.output_tx.subscribe()
    }

    /// Hands the bridge the url, identity and token to join the room with.
    ///
    /// Subscribe before announcing; the broadcast keeps nothing for late
    /// subscribers.
    pub fn announce(&self) -> Result<(), VoiceError> {
        self.publish(AgentOutput::Join {
            url: self.url.clone(),
            room: self.room_name.clone(),
            identity: self.identity.clone(),
            token: self.token.clone(),
        })
    }

    fn publish(&self, output: AgentOutput) -> Result<(), VoiceError> {
        if !self.is_connected() {
            return Err(VoiceError::NotConnected(self.room_name.clone()));
        }
        // No subscriber means nobody is listening yet; not an error.
        let _ = self.output_tx.send(output);
        Ok(())
    }
}

#[async_trait]
impl RoomLink for AgentRoomClient {
    fn room_name(&self) -> &str {
        &self.room_name
    }

    async fn say(&self, text: &str, allow_interruptions: bool) -> Result<(), VoiceError> {
        info!(room = %self.room_name, chars = text.len(), "agent speaking");
        self.publish(AgentOutput::Say {
            text: text.to_string(),
            allow_interruptions,
        })
    }

    async fn interrupt(&self) -> Result<(), VoiceError> {
        self.publish(AgentOutput::Interrupt)
    }

    async fn close(&self) -> Result<(), VoiceError> {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(room = %self.room_name, "agent leaving room");
            let _ = self.output_tx.send(AgentOutput::Closed);
        }
        Ok(())
    }
}
