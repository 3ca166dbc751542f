//! LiveKit integration for the concierge.
//!
//! Mints join tokens for browser visitors and for the agent worker, creates
//! rooms, and drives SIP telephony (outbound trunks and dialed participants)
//! through the LiveKit server API.
//!
//! The [`agent`] module holds the worker's side of a room: the [`RoomLink`]
//! trait the call controller speaks through, the [`RoomEvent`]s it consumes,
//! and [`AgentRoomClient`], the link used when the media bridge runs out of
//! process.

pub mod agent;
pub mod config;
pub mod error;
pub mod service;
pub mod sip;

pub use agent::{
    AgentOutput, AgentRoomClient, RoomEvent, RoomLink, RpcInvocation, RpcReply, ToolCall,
    TrackKind,
};
pub use config::{LiveKitConfig, DEV_LIVEKIT_API_KEY, DEV_LIVEKIT_API_SECRET, DEV_LIVEKIT_URL};
pub use error::VoiceError;
pub use service::VoiceService;
pub use sip::{CreateOutboundTrunk, DialRequest, SipParticipantInfo, SipTrunkInfo};
