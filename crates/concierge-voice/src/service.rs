use crate::config::LiveKitConfig;
use crate::error::VoiceError;
use livekit_api::access_token::{AccessToken, VideoGrants};
use livekit_api::services::room::{CreateRoomOptions, RoomClient};
use livekit_protocol::Room;
use std::time::Duration;

/// Participant metadata the worker publishes so the front end can tell the
/// agent apart from callers.
const AGENT_METADATA: &str = r#"{"agent":true}"#;

#[derive(Debug)]
pub struct VoiceService {
    config: LiveKitConfig,
    room_client: RoomClient,
    pub(crate) http: reqwest::Client,
}

impl VoiceService {
    pub fn new(config: LiveKitConfig) -> Self {
        let room_client =
            RoomClient::with_api_key(&config.http_url(), &config.api_key, &config.api_secret);
        Self {
            config,
            room_client,
            http: reqwest::Client::new(),
        }
    }

    /// Server-side calls need all three credentials.
    pub fn is_enabled(&self) -> bool {
        self.config.missing_credentials().is_empty()
    }

    pub fn config(&self) -> &LiveKitConfig {
        &self.config
    }

    pub fn get_url(&self) -> &str {
        &self.config.url
    }

    pub fn sip_trunk_id(&self) -> Option<&str> {
        self.config.sip_trunk_id.as_deref()
    }

    pub async fn create_room(&self, name: &str) -> Result<Room, VoiceError> {
        let options = CreateRoomOptions::default();

        self.room_client
            .create_room(name, options)
            .await
            .map_err(|e| VoiceError::RoomService(e.to_string()))
    }

    /// Mints a token that lets a caller join `room_name` and exchange audio and data.
    pub fn generate_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<String, VoiceError> {
        self.ensure_can_sign()?;
        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(participant_identity)
            .with_name(participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(VoiceError::LiveKit)
    }

    /// Mints the worker's own join token, marked as the agent through its metadata.
    pub fn generate_agent_token(
        &self,
        room_name: &str,
        agent_identity: &str,
    ) -> Result<String, VoiceError> {
        self.ensure_can_sign()?;
        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(agent_identity)
            .with_name(agent_identity)
            .with_metadata(AGENT_METADATA)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(VoiceError::LiveKit)
    }

    fn ensure_can_sign(&self) -> Result<(), VoiceError> {
        if self.config.can_sign() {
            Ok(())
        } else {
            Err(VoiceError::Config(
                "LiveKit server credentials not configured".to_string(),
            ))
        }
    }
}
