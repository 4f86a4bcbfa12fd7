// Terminal front end: one conversation from situation to final line.

use anyhow::{Context, Result};
use std::io::Write;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::client::{ChatClient, ConversationRequest};
use crate::config::ClientConfig;
use crate::constants::MAX_SITUATION_CHARS;
use crate::display::TerminalStage;
use crate::error::ConsumerError;
use crate::locale::{Locale, Text};
use crate::pacer::{spawn_reveal, RevealEvent};
use crate::personas::{Persona, PersonaRegistry};

/// Trims the situation and checks it is non-empty and within the length limit.
pub fn validate_situation(input: &str, locale: Locale) -> Result<String, ConsumerError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ConsumerError::Validation(
            locale.text(Text::SituationRequired).to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_SITUATION_CHARS {
        return Err(ConsumerError::Validation(
            locale.text(Text::SituationTooLong).to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Who takes the stage: the requested ids when given, otherwise `count` random personas.
pub fn choose_cast(registry: &PersonaRegistry, requested: &[String], count: usize) -> Vec<Persona> {
    let cast = if requested.is_empty() {
        registry.select_random(count)
    } else {
        registry.resolve(requested)
    };
    cast.into_iter().cloned().collect()
}

#[derive(Debug)]
pub struct SessionOutcome {
    /// Messages rendered on stage.
    pub shown: usize,
    /// The user-facing error, if the conversation ended in one.
    pub error: Option<String>,
}

/// Runs one conversation against a ghost-chat server, rendering to `out`.
pub async fn run_chat_session<W: Write>(
    config: &ClientConfig,
    registry: &PersonaRegistry,
    situation: &str,
    requested: &[String],
    count: usize,
    out: W,
) -> Result<SessionOutcome> {
    let cast = choose_cast(registry, requested, count);
    let mut stage = TerminalStage::new(out, cast.clone(), config);

    let situation = match validate_situation(situation, config.locale) {
        Ok(situation) => situation,
        Err(e) => {
            stage.error(&e).context("Failed to write to terminal")?;
            return Ok(SessionOutcome {
                shown: 0,
                error: Some(e.user_message(config.locale)),
            });
        }
    };
    if cast.is_empty() {
        let e = ConsumerError::Validation(config.locale.text(Text::NoValidPersonas).to_string());
        stage.error(&e).context("Failed to write to terminal")?;
        return Ok(SessionOutcome {
            shown: 0,
            error: Some(e.user_message(config.locale)),
        });
    }

    let request = ConversationRequest {
        situation,
        persona_ids: cast.iter().map(|p| p.id.clone()).collect(),
        locale: config.locale,
    };
    info!(personas = ?request.persona_ids, "Starting conversation");

    let (event_tx, event_rx) = mpsc::channel(32);
    let (reveal_tx, mut reveal_rx) = mpsc::channel(32);

    let client = ChatClient::new(&config.server_url, config.request_timeout);
    let consumer = tokio::spawn(async move {
        client.stream_conversation(request, event_tx).await;
    });
    let reveal = spawn_reveal(event_rx, config.pacing.clone(), reveal_tx);

    stage.loading().context("Failed to write to terminal")?;
    stage.enter().await.context("Failed to write to terminal")?;

    let mut error = None;
    while let Some(event) = reveal_rx.recv().await {
        match event {
            RevealEvent::Show { message, .. } => {
                stage.speak(&message).await.context("Failed to write to terminal")?;
            }
            RevealEvent::Failed(e) => {
                stage.error(&e).context("Failed to write to terminal")?;
                error = Some(e.user_message(config.locale));
                break;
            }
            RevealEvent::Done { shown } => {
                info!(shown, "Conversation revealed");
                stage.finished().context("Failed to write to terminal")?;
                break;
            }
        }
    }

    reveal.join().await;
    if let Err(e) = consumer.await {
        error!("Conversation consumer task failed: {:?}", e);
    }

    Ok(SessionOutcome {
        shown: stage.spoken(),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_situation() {
        assert_eq!(
            validate_situation("  a haunted house \n", Locale::En).unwrap(),
            "a haunted house"
        );
        assert!(matches!(
            validate_situation("   ", Locale::Ja),
            Err(ConsumerError::Validation(m)) if m == "シチュエーションが必要です"
        ));
        let long = "あ".repeat(MAX_SITUATION_CHARS + 1);
        assert!(validate_situation(&long, Locale::En).is_err());
        let limit = "あ".repeat(MAX_SITUATION_CHARS);
        assert!(validate_situation(&limit, Locale::En).is_ok());
    }

    #[test]
    fn test_choose_cast() {
        let registry = PersonaRegistry::builtin();
        let requested = vec!["witch".to_string(), "nobody".to_string()];
        let cast = choose_cast(&registry, &requested, 3);
        assert_eq!(cast.len(), 1);
        assert_eq!(cast[0].id, "witch");

        assert_eq!(choose_cast(&registry, &[], 2).len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_situation_reports_without_request() {
        let config = ClientConfig::new("http://127.0.0.1:1", Locale::En).with_reduced_motion(true);
        let mut out = Vec::new();
        let outcome = run_chat_session(
            &config,
            &PersonaRegistry::builtin(),
            "  ",
            &[],
            3,
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(outcome.shown, 0);
        assert_eq!(outcome.error.as_deref(), Some("A situation is required"));
        assert!(String::from_utf8(out).unwrap().contains("A situation is required"));
    }
}
