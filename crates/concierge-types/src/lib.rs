//! Shared types for the concierge platform.
//!
//! This crate provides the types used across the agent worker, the backend
//! API, and the persistence layer: call lifecycle states, record statuses,
//! and the JSON payloads that cross process boundaries (lead submissions,
//! booking requests, and the agent-facing calendar responses).
//!
//! Nothing here performs I/O. Keeping the wire types in one crate means the
//! agent and the server cannot drift apart on field names.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod booking;
mod lead;

pub use booking::{
    AgentAvailabilityResponse, AgentBookingResponse, AgentDatesResponse, AvailabilityRequest,
    AvailableDate, BookingRequest,
};
pub use lead::LeadSubmission;

/// Error returned when a stored status label does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} label: {label}")]
pub struct ParseLabelError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The offending label.
    pub label: String,
}

/// Lifecycle state of a single call session.
///
/// `Connecting → Active → {Away → Active | Ended}`. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// The worker accepted the job but the session has not started.
    Connecting,
    /// The session is running and the caller is present.
    Active,
    /// The caller went quiet; the session ends unless they come back.
    Away,
    /// The session has been torn down.
    Ended,
}

impl CallState {
    /// Returns the canonical label for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Away => "away",
            Self::Ended => "ended",
        }
    }

    /// Returns `true` once the session can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller activity as reported by the voice pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    Speaking,
    Listening,
    /// No speech for longer than the script's away timeout.
    Away,
}

/// Follow-up status of a captured lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Closed,
}

impl LeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Closed => "closed",
        }
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseLabelError {
                kind: "lead status",
                label: s.to_string(),
            }),
        }
    }
}

/// Dialer pipeline status of a prospect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Converted,
    Dead,
}

impl ProspectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Converted => "converted",
            Self::Dead => "dead",
        }
    }
}

impl std::str::FromStr for ProspectStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "converted" => Ok(Self::Converted),
            "dead" => Ok(Self::Dead),
            _ => Err(ParseLabelError {
                kind: "prospect status",
                label: s.to_string(),
            }),
        }
    }
}

/// Outcome of a dialed call as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Initiated,
    Connected,
    Failed,
    Completed,
}

impl CallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }
}

impl std::str::FromStr for CallStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "connected" => Ok(Self::Connected),
            "failed" => Ok(Self::Failed),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseLabelError {
                kind: "call status",
                label: s.to_string(),
            }),
        }
    }
}
