use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Google Calendar credentials not found")]
    CredentialsMissing,

    #[error("invalid service account credentials: {0}")]
    Credentials(String),

    #[error("failed to sign service account assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("calendar request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Calendar API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid calendar configuration: {0}")]
    Config(String),

    #[error("invalid time: {0}")]
    InvalidTime(String),
}
