use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("LiveKit API error: {0}")]
    LiveKit(#[from] livekit_api::access_token::AccessTokenError),

    #[error("Room service error: {0}")]
    RoomService(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("SIP request failed ({status}): {message}")]
    Sip { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Agent is not connected to room '{0}'")]
    NotConnected(String),
}
