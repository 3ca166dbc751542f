use serde::{Deserialize, Serialize};
use std::fmt;

/// Local `livekit-server --dev` URL.
pub const DEV_LIVEKIT_URL: &str = "ws://localhost:7880";
/// API key accepted by `livekit-server --dev`.
pub const DEV_LIVEKIT_API_KEY: &str = "devkey";
/// API secret accepted by `livekit-server --dev`.
pub const DEV_LIVEKIT_API_SECRET: &str = "secret";

fn default_token_ttl_seconds() -> u64 {
    3600
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// JWT token TTL in seconds for LiveKit join tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
    /// Outbound SIP trunk used by the dialer.
    #[serde(default)]
    pub sip_trunk_id: Option<String>,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
            sip_trunk_id: None,
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("sip_trunk_id", &self.sip_trunk_id)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Self::default()
        }
    }

    /// Overlays the conventional `LIVEKIT_*` and `SIP_TRUNK_ID` variables.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("LIVEKIT_URL") {
            self.url = url;
        }
        if let Ok(key) = std::env::var("LIVEKIT_API_KEY") {
            self.api_key = key;
        }
        if let Ok(secret) = std::env::var("LIVEKIT_API_SECRET") {
            self.api_secret = secret;
        }
        if let Ok(trunk) = std::env::var("SIP_TRUNK_ID") {
            if !trunk.trim().is_empty() {
                self.sip_trunk_id = Some(trunk);
            }
        }
    }

    /// Names of the credentials that are still empty, in a stable order.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.url.trim().is_empty() {
            missing.push("LIVEKIT_URL");
        }
        if self.api_key.trim().is_empty() {
            missing.push("LIVEKIT_API_KEY");
        }
        if self.api_secret.trim().is_empty() {
            missing.push("LIVEKIT_API_SECRET");
        }
        missing
    }

    /// Signing credentials are present (the URL is only needed for server calls).
    pub fn can_sign(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }

    /// HTTP(S) base URL for the server API, derived from the signalling URL.
    pub fn http_url(&self) -> String {
        let url = self.url.trim_end_matches('/');
        if let Some(rest) = url.strip_prefix("wss://") {
            format!("https://{rest}")
        } else if let Some(rest) = url.strip_prefix("ws://") {
            format!("http://{rest}")
        } else {
            url.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secret() {
        let config = LiveKitConfig::new("wss://demo.livekit.cloud", "APIkey", "hunter2");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn http_url_follows_signalling_scheme() {
        let mut config = LiveKitConfig::new("wss://demo.livekit.cloud/", "k", "s");
        assert_eq!(config.http_url(), "https://demo.livekit.cloud");
        config.url = "ws://localhost:7880".into();
        assert_eq!(config.http_url(), "http://localhost:7880");
        config.url = "https://already.http".into();
        assert_eq!(config.http_url(), "https://already.http");
    }

    #[test]
    fn missing_credentials_are_listed() {
        let config = LiveKitConfig {
            api_key: "k".into(),
            ..LiveKitConfig::default()
        };
        assert_eq!(
            config.missing_credentials(),
            vec!["LIVEKIT_URL", "LIVEKIT_API_SECRET"]
        );
        assert!(!config.can_sign());
    }
}
