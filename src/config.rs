use std::path::PathBuf;
use std::time::Duration;

use crate::constants;
use crate::locale::Locale;
use crate::pacer::PacingConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub api_base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// How long the model gets to start streaming before the request fails.
    pub generation_timeout: Duration,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env(port: u16) -> Self {
        Self {
            port,
            api_base_url: constants::OPENAI_BASE_URL.clone(),
            api_key: constants::OPENAI_API_KEY.clone(),
            model: constants::GHOST_CHAT_MODEL.clone(),
            temperature: constants::GENERATION_TEMPERATURE,
            generation_timeout: Duration::from_secs(constants::REQUEST_TIMEOUT_SECS),
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub locale: Locale,
    /// Bound on the whole request, from sending it to the end of the stream.
    pub request_timeout: Duration,
    pub pacing: PacingConfig,
    /// Per-character delay of the typewriter effect.
    pub typing_speed: Duration,
    /// Gap between consecutive character entrances.
    pub entrance_stagger: Duration,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>, locale: Locale) -> Self {
        Self {
            server_url: server_url.into(),
            locale,
            request_timeout: Duration::from_secs(constants::REQUEST_TIMEOUT_SECS),
            pacing: PacingConfig::default(),
            typing_speed: Duration::from_millis(40),
            entrance_stagger: Duration::from_millis(300),
        }
    }

    pub fn with_reduced_motion(mut self, reduced: bool) -> Self {
        self.pacing.reduced_motion = reduced;
        self
    }

    pub fn reduced_motion(&self) -> bool {
        self.pacing.reduced_motion
    }
}
