//! Per-process setup shared by the call the worker handles.

use crate::config::Config;
use crate::controller::CallController;
use crate::dispatch::Dispatcher;
use crate::prompt;
use crate::router::{route, Script, ScriptKind, ScriptTiming};
use crate::session::{CallSession, SessionSettings};
use concierge_voice::{RoomLink, VoiceError, VoiceService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Built once per process, before any job arrives.
pub struct WorkerContext {
    config: Config,
    http: reqwest::Client,
    voice: VoiceService,
    dispatcher: Arc<Dispatcher>,
    default_instructions: String,
    tts_available: bool,
}

/// A job the worker took on.
#[derive(Debug, Clone)]
pub struct JobAcceptance {
    pub room_name: String,
    pub script: Arc<Script>,
}

impl JobAcceptance {
    pub fn agent_identity(&self) -> &str {
        &self.script.agent_identity
    }
}

impl WorkerContext {
    /// Prepares shared clients and checks which providers are usable.
    ///
    /// Missing provider keys only degrade the worker; a missing TTS key
    /// leaves it muted.
    pub fn prewarm(config: Config) -> Self {
        let http = reqwest::Client::new();
        let voice = VoiceService::new(config.livekit.clone());

        let tts_available = config.providers.get("CARTESIA_API_KEY").is_some();
        if !tts_available {
            warn!("CARTESIA_API_KEY not set, agent will run muted");
        }
        for var in ["DEEPGRAM_API_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"] {
            if config.providers.get(var).is_none() {
                warn!(key = var, "provider key not set");
            }
        }
        if config.webhook.url.is_none() {
            warn!("WEBHOOK_URL not set, leads cannot be delivered");
        }

        let default_instructions = prompt::default_instructions(
            &config.business.prompt_template,
            &config.business.name,
            &config.business.knowledge_base,
        );

        Self {
            dispatcher: Arc::new(Dispatcher::new(http.clone(), &config)),
            http,
            voice,
            default_instructions,
            tts_available,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn tts_available(&self) -> bool {
        self.tts_available
    }

    fn timing(&self) -> ScriptTiming {
        ScriptTiming {
            greeting_timeout: Duration::from_secs(self.config.session.greeting_timeout_seconds),
            outbound_greeting_delay: Duration::from_millis(
                self.config.session.outbound_greeting_delay_ms,
            ),
        }
    }

    /// Builds the script for `kind` with this worker's settings.
    pub fn script(&self, kind: ScriptKind) -> Script {
        Script::build(kind, self.default_instructions.clone(), self.timing())
    }

    /// Accepts the job for `room_name` and picks its script.
    pub fn accept_job(&self, room_name: &str) -> JobAcceptance {
        let script = self.script(route(room_name));
        for key in script.providers.required_keys() {
            if self.config.providers.get(key).is_none() {
                warn!(room = room_name, key, script = %script.kind, "script provider key missing");
            }
        }
        info!(
            room = room_name,
            script = %script.kind,
            identity = %script.agent_identity,
            "job accepted"
        );
        JobAcceptance {
            room_name: room_name.to_string(),
            script: Arc::new(script),
        }
    }

    /// Mints the token the agent joins its room with.
    pub fn agent_token(&self, job: &JobAcceptance) -> Result<String, VoiceError> {
        self.voice
            .generate_agent_token(&job.room_name, job.agent_identity())
    }

    pub fn livekit_url(&self) -> &str {
        self.voice.get_url()
    }

    /// Builds the controller for an accepted job.
    pub fn controller(&self, job: &JobAcceptance, link: Arc<dyn RoomLink>) -> CallController {
        let settings = SessionSettings {
            greeting: job.script.greeting_policy.clone(),
            away_grace: Duration::from_secs(self.config.session.away_grace_seconds),
            agent_identity: job.script.agent_identity.clone(),
        };
        let session = CallSession::new(&job.room_name, job.script.kind, settings);
        CallController::new(
            session,
            Arc::clone(&job.script),
            link,
            Arc::clone(&self.dispatcher),
            self.tts_available,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_voice::LiveKitConfig;

    fn config() -> Config {
        let mut config = Config::default();
        config.livekit = LiveKitConfig::new("ws://localhost:7880", "devkey", "secret");
        config.business.prompt_template = "/nonexistent/prompt.template".into();
        config
    }

    #[test]
    fn missing_tts_key_means_muted() {
        let ctx = WorkerContext::prewarm(config());
        assert!(!ctx.tts_available());

        let mut with_tts = config();
        with_tts.providers.cartesia_api_key = Some("sk_car".into());
        assert!(WorkerContext::prewarm(with_tts).tts_available());
    }

    #[test]
    fn accepted_job_carries_routed_identity() {
        let ctx = WorkerContext::prewarm(config());
        let job = ctx.accept_job("newport_outbound_abcd1234");
        assert_eq!(job.agent_identity(), "ashley-outbound");

        let job = ctx.accept_job("acme-line");
        assert!(job.script.instructions.contains("Voice Sell AI"));
        assert!(!ctx.agent_token(&job).unwrap().is_empty());
    }
}
