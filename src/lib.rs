pub mod chat;
pub mod client;
pub mod config;
pub mod constants;
pub mod display;
pub mod error;
pub mod layout;
pub mod llm_interaction;
pub mod locale;
pub mod ndjson;
pub mod pacer;
pub mod personas;
pub mod prompt;
pub mod web_server;

use serde::{Deserialize, Serialize};

/// One line of generated dialogue, as carried on the NDJSON wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub persona_id: String,
    pub message: String,
}

impl ChatMessage {
    pub fn new(persona_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            persona_id: persona_id.into(),
            message: message.into(),
        }
    }

    /// Encode as a single NDJSON line, newline included.
    pub fn to_ndjson_line(&self) -> String {
        // A struct of two Strings always serializes.
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}
