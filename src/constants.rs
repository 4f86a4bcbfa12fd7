// Environment-backed defaults. Loaded after `dotenvy::dotenv()` runs in main.

use std::env;

lazy_static::lazy_static! {
    pub static ref OPENAI_BASE_URL: String = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    pub static ref OPENAI_API_KEY: String = env::var("OPENAI_API_KEY").unwrap_or_default();
    pub static ref GHOST_CHAT_MODEL: String = env::var("GHOST_CHAT_MODEL").unwrap_or_else(|_| "gpt-4-turbo".to_string());
    pub static ref GHOST_CHAT_SERVER_URL: String = env::var("GHOST_CHAT_SERVER_URL").unwrap_or_else(|_| format!("http://127.0.0.1:{}", DEFAULT_PORT));
}

pub const DEFAULT_PORT: u16 = 9900;

/// Both the outbound generation call and the client-side request give up after this long.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

pub const GENERATION_TEMPERATURE: f32 = 0.8;

/// Personas drawn for a conversation when the caller does not choose them.
pub const DEFAULT_CAST_SIZE: usize = 3;

/// Longest situation accepted from the input form or CLI, in characters.
pub const MAX_SITUATION_CHARS: usize = 500;
