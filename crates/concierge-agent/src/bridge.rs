//! Line-delimited JSON feed between the media bridge and the controller.
//!
//! The bridge process owns the real room connection. It writes one
//! [`BridgeMessage`] per line to the worker's stdin and reads
//! [`AgentOutput`](concierge_voice::AgentOutput) lines and RPC replies back
//! from stdout.

use concierge_types::UserState;
use concierge_voice::{RoomEvent, RpcInvocation, RpcReply, ToolCall, TrackKind};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// One inbound line from the bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeMessage {
    TrackSubscribed {
        kind: TrackKind,
        participant_identity: String,
    },
    ParticipantDisconnected {
        participant_identity: String,
    },
    UserStateChanged {
        state: UserState,
    },
    Rpc {
        id: String,
        method: String,
        caller_identity: String,
        #[serde(default)]
        payload: String,
    },
    Tool {
        call: ToolCall,
    },
}

/// Answer to an RPC, written back to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "rpc_reply")]
pub struct RpcReplyLine {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcReplyLine {
    fn new(id: String, reply: RpcReply) -> Self {
        match reply {
            Ok(result) => Self {
                id,
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                id,
                result: None,
                error: Some(error),
            },
        }
    }
}

impl BridgeMessage {
    /// Converts to a room event. RPCs also return the id and the channel
    /// their reply arrives on.
    pub fn into_room_event(self) -> (RoomEvent, Option<(String, oneshot::Receiver<RpcReply>)>) {
        match self {
            Self::TrackSubscribed {
                kind,
                participant_identity,
            } => (
                RoomEvent::TrackSubscribed {
                    kind,
                    participant_identity,
                },
                None,
            ),
            Self::ParticipantDisconnected {
                participant_identity,
            } => (
                RoomEvent::ParticipantDisconnected {
                    participant_identity,
                },
                None,
            ),
            Self::UserStateChanged { state } => (RoomEvent::UserStateChanged(state), None),
            Self::Rpc {
                id,
                method,
                caller_identity,
                payload,
            } => {
                let (reply, rx) = oneshot::channel();
                (
                    RoomEvent::Rpc(RpcInvocation {
                        method,
                        caller_identity,
                        payload,
                        reply,
                    }),
                    Some((id, rx)),
                )
            }
            Self::Tool { call } => (RoomEvent::Tool(call), None),
        }
    }
}

/// Reads bridge lines until EOF, forwarding events to the controller and
/// serialized RPC replies to `replies`.
///
/// Lines that do not parse are logged and skipped. Returns when the input
/// ends or the controller stops listening.
pub async fn pump<R>(
    reader: R,
    events: mpsc::Sender<RoomEvent>,
    replies: mpsc::UnboundedSender<String>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let message: BridgeMessage = match serde_json::from_str(&line) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "skipping unreadable bridge line");
                continue;
            }
        };
        debug!(?message, "bridge event");

        let (event, pending) = message.into_room_event();
        if let Some((id, rx)) = pending {
            let replies = replies.clone();
            tokio::spawn(async move {
                let reply = rx
                    .await
                    .unwrap_or_else(|_| Err("session ended".to_string()));
                match serde_json::to_string(&RpcReplyLine::new(id, reply)) {
                    Ok(line) => {
                        let _ = replies.send(line);
                    }
                    Err(e) => warn!(error = %e, "failed to encode rpc reply"),
                }
            });
        }

        if events.send(event).await.is_err() {
            break;
        }
    }
    Ok(())
}
