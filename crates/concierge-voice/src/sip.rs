//! SIP telephony through the LiveKit server's Twirp API.
//!
//! Requests are plain JSON posted to `/twirp/livekit.SIP/<Method>`, signed
//! with a short-lived token carrying the `sip` grant.

use crate::error::VoiceError;
use crate::service::VoiceService;
use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SIP_TOKEN_TTL: Duration = Duration::from_secs(600);
/// Dialing waits until the callee answers, so allow a long ring.
const DIAL_TIMEOUT: Duration = Duration::from_secs(90);
const TRUNK_TIMEOUT: Duration = Duration::from_secs(15);

/// A phone call to place into a room.
#[derive(Debug, Clone, Serialize)]
pub struct DialRequest {
    pub sip_trunk_id: String,
    pub sip_call_to: String,
    pub room_name: String,
    pub participant_identity: String,
    pub participant_name: String,
    pub wait_until_answered: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SipParticipantInfo {
    #[serde(default, alias = "participantId")]
    pub participant_id: String,
    #[serde(default, alias = "participantIdentity")]
    pub participant_identity: String,
    #[serde(default, alias = "roomName")]
    pub room_name: String,
    #[serde(default, alias = "sipCallId")]
    pub sip_call_id: String,
}

/// Provider details for a new outbound trunk.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOutboundTrunk {
    pub name: String,
    pub metadata: String,
    pub address: String,
    pub numbers: Vec<String>,
    pub auth_username: String,
    pub auth_password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SipTrunkInfo {
    #[serde(default, alias = "sipTrunkId")]
    pub sip_trunk_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize)]
struct SipGrant {
    admin: bool,
    call: bool,
}

#[derive(Serialize)]
struct SipClaims<'a> {
    iss: &'a str,
    nbf: u64,
    exp: u64,
    sip: SipGrant,
}

#[derive(Serialize)]
struct TrunkEnvelope<'a> {
    trunk: &'a CreateOutboundTrunk,
}

#[derive(Deserialize)]
struct TwirpError {
    #[serde(default)]
    msg: String,
}

impl VoiceService {
    /// Dials `request.sip_call_to` and joins the call to the room.
    pub async fn create_sip_participant(
        &self,
        request: &DialRequest,
    ) -> Result<SipParticipantInfo, VoiceError> {
        tracing::info!(
            room = %request.room_name,
            trunk = %request.sip_trunk_id,
            "placing outbound SIP call"
        );
        self.twirp("CreateSIPParticipant", request, DIAL_TIMEOUT)
            .await
    }

    pub async fn create_outbound_trunk(
        &self,
        trunk: &CreateOutboundTrunk,
    ) -> Result<SipTrunkInfo, VoiceError> {
        self.twirp("CreateSIPOutboundTrunk", &TrunkEnvelope { trunk }, TRUNK_TIMEOUT)
            .await
    }

    async fn twirp<Req, Resp>(
        &self,
        method: &str,
        body: &Req,
        timeout: Duration,
    ) -> Result<Resp, VoiceError>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        if !self.is_enabled() {
            return Err(VoiceError::Config(
                "LiveKit credentials not configured".to_string(),
            ));
        }
        let url = format!("{}/twirp/livekit.SIP/{method}", self.config().http_url());
        let token = self.sip_token()?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TwirpError>(&text)
                .map(|e| e.msg)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(text);
            return Err(VoiceError::Sip {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    fn sip_token(&self) -> Result<String, VoiceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = SipClaims {
            iss: &self.config().api_key,
            nbf: now,
            exp: now + SIP_TOKEN_TTL.as_secs(),
            sip: SipGrant {
                admin: true,
                call: true,
            },
        };
        let key = EncodingKey::from_secret(self.config().api_secret.as_bytes());
        Ok(jsonwebtoken::encode(&Header::default(), &claims, &key)?)
    }
}
