//! Configuration for the Parley gateway
//!
//! Everything comes from the environment; missing values fall back to
//! working defaults so the gateway always starts (shims without keys
//! report themselves unavailable instead of failing startup).

use secrecy::SecretString;

/// Default assistant greeting seeded into every new session
pub const DEFAULT_GREETING: &str = "Hi! I'm your voice assistant. How can I help you today?";

/// Parley gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Voice processing configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Assistant greeting seeded into new sessions
    pub greeting: String,

    /// Reply generation strategy
    pub responder: ResponderMode,

    /// Budget in seconds for each external STT/TTS/LLM call
    pub call_timeout_secs: u64,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on (from `PARLEY_PORT` or `PORT`)
    pub port: u16,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// BCP-47 language code for recognition and synthesis
    pub language_code: String,

    /// Default recognition sample rate; WAV uploads override it from
    /// their own header
    pub sample_rate_hertz: u32,

    /// Google synthesis voice (e.g. "en-US-Wavenet-D")
    pub voice_name: String,

    /// OpenAI STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// OpenAI TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// OpenAI TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Google Cloud API key (Speech-to-Text and Text-to-Speech)
    pub google: Option<SecretString>,

    /// `OpenAI` API key (Whisper, TTS, and chat completions)
    pub openai: Option<SecretString>,
}

/// How assistant replies are produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderMode {
    /// Built-in keyword rules, no network calls
    Rules,
    /// Chat completion against the named model, degrading to an apology
    /// when the call fails
    Llm { model: String },
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            sample_rate_hertz: 48_000,
            voice_name: "en-US-Wavenet-D".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            voice: VoiceConfig::default(),
            api_keys: ApiKeys::default(),
            api_server: ApiServerConfig { port: 3927 },
            greeting: DEFAULT_GREETING.to_string(),
            responder: ResponderMode::Rules,
            call_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from the environment
    #[must_use]
    pub fn from_env() -> Self {
        let api_keys = ApiKeys {
            google: std::env::var("GOOGLE_API_KEY").ok().map(SecretString::from),
            openai: std::env::var("OPENAI_API_KEY").ok().map(SecretString::from),
        };

        let api_server = ApiServerConfig {
            port: std::env::var("PARLEY_PORT")
                .or_else(|_| std::env::var("PORT"))
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3927),
        };

        let defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            language_code: env_or("PARLEY_LANGUAGE", defaults.language_code),
            sample_rate_hertz: env_parsed("PARLEY_SAMPLE_RATE", defaults.sample_rate_hertz),
            voice_name: env_or("PARLEY_VOICE", defaults.voice_name),
            stt_model: env_or("PARLEY_STT_MODEL", defaults.stt_model),
            tts_model: env_or("PARLEY_TTS_MODEL", defaults.tts_model),
            tts_voice: env_or("PARLEY_TTS_VOICE", defaults.tts_voice),
            tts_speed: env_parsed("PARLEY_TTS_SPEED", defaults.tts_speed),
        };

        let responder = match std::env::var("PARLEY_RESPONDER").as_deref() {
            Ok("llm") => ResponderMode::Llm {
                model: env_or("PARLEY_RESPONDER_MODEL", "gpt-4o-mini".to_string()),
            },
            Ok("rules") | Err(_) => ResponderMode::Rules,
            Ok(other) => {
                tracing::warn!(value = other, "unknown PARLEY_RESPONDER, using rules");
                ResponderMode::Rules
            }
        };

        Self {
            voice,
            api_keys,
            api_server,
            greeting: env_or("PARLEY_GREETING", DEFAULT_GREETING.to_string()),
            responder,
            call_timeout_secs: env_parsed("PARLEY_CALL_TIMEOUT_SECS", 30),
        }
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "unparsable value, using default");
            default
        }),
        Err(_) => default,
    }
}
