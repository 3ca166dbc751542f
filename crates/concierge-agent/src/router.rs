//! Picks the script a call runs from its room name.

use std::time::Duration;

/// Which personality answers the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Regina, the Newport Beach guest concierge.
    Inbound,
    /// Ashley, following up on vacation-rental leads.
    Outbound,
    /// Personal assistant line.
    Assistant,
    /// The Voice Sell AI business line.
    Default,
}

impl ScriptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Assistant => "assistant",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room-name fragments in match order. The first hit wins.
const ROUTES: &[(&str, ScriptKind)] = &[
    ("outbound", ScriptKind::Outbound),
    ("newport", ScriptKind::Inbound),
    ("devin", ScriptKind::Assistant),
];

/// Maps a room name to the script that should handle it.
///
/// Matching ignores case. Names matching nothing get [`ScriptKind::Default`].
pub fn route(room_name: &str) -> ScriptKind {
    let name = room_name.to_ascii_lowercase();
    ROUTES
        .iter()
        .find(|(fragment, _)| name.contains(fragment))
        .map_or(ScriptKind::Default, |(_, kind)| *kind)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmVendor {
    Groq,
    OpenAi,
}

impl LlmVendor {
    /// Environment variable holding this vendor's key.
    pub fn key_var(self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

/// Speech, model and voice settings for one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub stt_model: &'static str,
    pub llm_vendor: LlmVendor,
    pub llm_model: &'static str,
    pub tts_model: &'static str,
    pub turn_detection: &'static str,
    /// Silence after which the caller is reported away.
    pub user_away_timeout: Duration,
}

impl ProviderConfig {
    fn groq() -> Self {
        Self {
            stt_model: "nova-3",
            llm_vendor: LlmVendor::Groq,
            llm_model: "llama-3.3-70b-versatile",
            tts_model: "sonic-english",
            turn_detection: "vad",
            user_away_timeout: Duration::from_secs(60),
        }
    }

    fn openai() -> Self {
        Self {
            llm_vendor: LlmVendor::OpenAi,
            llm_model: "gpt-4o",
            user_away_timeout: Duration::from_secs(120),
            ..Self::groq()
        }
    }

    /// Every key this configuration needs, by environment variable name.
    pub fn required_keys(&self) -> [&'static str; 3] {
        ["DEEPGRAM_API_KEY", self.llm_vendor.key_var(), "CARTESIA_API_KEY"]
    }
}

/// When the agent speaks first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GreetingPolicy {
    /// Greet once a caller's audio track arrives. Give up after `timeout`.
    AfterAudioTrack {
        timeout: Duration,
        /// Participants whose tracks never trigger the greeting.
        ignore_prefixes: Vec<String>,
    },
    /// Greet a fixed delay after the session starts.
    Delayed(Duration),
}

impl GreetingPolicy {
    /// Whether a track from `identity` is a caller worth greeting.
    pub fn greets_for(&self, identity: &str, agent_identity: &str) -> bool {
        match self {
            Self::AfterAudioTrack {
                ignore_prefixes, ..
            } => {
                identity != agent_identity
                    && !ignore_prefixes.iter().any(|p| identity.starts_with(p.as_str()))
            }
            Self::Delayed(_) => false,
        }
    }
}

/// A personality: who the agent is, what it says first, and how it runs.
#[derive(Debug, Clone)]
pub struct Script {
    pub kind: ScriptKind,
    pub agent_identity: String,
    pub agent_name: String,
    pub greeting: String,
    pub greeting_policy: GreetingPolicy,
    pub instructions: String,
    pub providers: ProviderConfig,
}

/// Timing knobs the scripts draw from configuration.
#[derive(Debug, Clone, Copy)]
pub struct ScriptTiming {
    pub greeting_timeout: Duration,
    pub outbound_greeting_delay: Duration,
}

impl Default for ScriptTiming {
    fn default() -> Self {
        Self {
            greeting_timeout: Duration::from_secs(20),
            outbound_greeting_delay: Duration::from_secs(3),
        }
    }
}

pub const INBOUND_GREETING: &str =
    "Hi, is this the guest calling about your Newport Beach reservation?";
pub const ASSISTANT_GREETING: &str = "Hi is this Peter?";
pub const DEFAULT_GREETING: &str =
    "Thank you for calling Voice Sell AI. How can I help you today?";
pub const OUTBOUND_GREETING: &str = "Hi, is this the right number I'm calling? This is Ashley \
calling from Newport Beach Vacation Properties. I hope I'm not catching you at a bad time? \
I'm following up because you showed interest in booking one of our beautiful Newport Beach \
vacation homes. Do you have a few minutes to chat about your upcoming trip?";

/// Identity prefix of the web form helper that shares rooms with callers.
const FORM_AGENT_PREFIX: &str = "chat-to-form-agent";

impl Script {
    /// Builds the script for `kind`. `instructions` is used for the default
    /// script; the others carry their own.
    pub fn build(kind: ScriptKind, instructions: String, timing: ScriptTiming) -> Self {
        let after_track = GreetingPolicy::AfterAudioTrack {
            timeout: timing.greeting_timeout,
            ignore_prefixes: vec![FORM_AGENT_PREFIX.to_string()],
        };
        let (identity, name, greeting, policy, instructions, providers) = match kind {
            ScriptKind::Inbound => (
                "newport-rentals",
                "Regina",
                INBOUND_GREETING,
                after_track,
                crate::prompt::INBOUND_INSTRUCTIONS.to_string(),
                ProviderConfig::groq(),
            ),
            ScriptKind::Outbound => (
                "ashley-outbound",
                "Ashley",
                OUTBOUND_GREETING,
                GreetingPolicy::Delayed(timing.outbound_greeting_delay),
                crate::prompt::OUTBOUND_INSTRUCTIONS.to_string(),
                ProviderConfig::openai(),
            ),
            ScriptKind::Assistant => (
                "devin-assistant",
                "Assistant",
                ASSISTANT_GREETING,
                after_track,
                crate::prompt::ASSISTANT_INSTRUCTIONS.to_string(),
                ProviderConfig::groq(),
            ),
            ScriptKind::Default => (
                "voice-sell-agent",
                "Voice Sell AI",
                DEFAULT_GREETING,
                after_track,
                instructions,
                ProviderConfig::groq(),
            ),
        };
        Self {
            kind,
            agent_identity: identity.to_string(),
            agent_name: name.to_string(),
            greeting: greeting.to_string(),
            greeting_policy: policy,
            instructions,
            providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_wins_over_newport() {
        assert_eq!(route("newport_outbound_1a2b3c4d"), ScriptKind::Outbound);
        assert_eq!(route("newport_caller"), ScriptKind::Inbound);
        assert_eq!(route("devin-room"), ScriptKind::Assistant);
        assert_eq!(route("acme-support"), ScriptKind::Default);
        assert_eq!(route(""), ScriptKind::Default);
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(route("NewPort-Guest"), ScriptKind::Inbound);
        assert_eq!(route("OUTBOUND"), ScriptKind::Outbound);
    }

    #[test]
    fn outbound_script_uses_openai_and_delayed_greeting() {
        let script = Script::build(ScriptKind::Outbound, String::new(), ScriptTiming::default());
        assert_eq!(script.agent_identity, "ashley-outbound");
        assert_eq!(script.providers.llm_model, "gpt-4o");
        assert_eq!(script.providers.user_away_timeout, Duration::from_secs(120));
        assert_eq!(script.greeting_policy, GreetingPolicy::Delayed(Duration::from_secs(3)));
        assert_eq!(
            script.providers.required_keys(),
            ["DEEPGRAM_API_KEY", "OPENAI_API_KEY", "CARTESIA_API_KEY"]
        );
    }

    #[test]
    fn default_script_takes_supplied_instructions() {
        let script = Script::build(
            ScriptKind::Default,
            "Be brief.".into(),
            ScriptTiming::default(),
        );
        assert_eq!(script.instructions, "Be brief.");
        assert_eq!(script.greeting, DEFAULT_GREETING);
        assert_eq!(script.providers.llm_model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn form_agent_and_self_never_trigger_greeting() {
        let script = Script::build(ScriptKind::Inbound, String::new(), ScriptTiming::default());
        let policy = &script.greeting_policy;
        assert!(policy.greets_for("caller-42", "newport-rentals"));
        assert!(!policy.greets_for("newport-rentals", "newport-rentals"));
        assert!(!policy.greets_for("chat-to-form-agent-7", "newport-rentals"));
    }
}
