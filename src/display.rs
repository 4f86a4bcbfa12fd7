//! Terminal rendering of the stage: staged entrances and typewriter speech.

use chrono::Local;
use std::io::{self, Write};
use std::time::Duration;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ConsumerError;
use crate::locale::{Locale, Text};
use crate::personas::Persona;
use crate::ChatMessage;

pub struct TerminalStage<W: Write> {
    out: W,
    cast: Vec<Persona>,
    locale: Locale,
    typing_speed: Duration,
    entrance_stagger: Duration,
    reduced_motion: bool,
    spoken: usize,
}

impl<W: Write> TerminalStage<W> {
    pub fn new(out: W, cast: Vec<Persona>, config: &ClientConfig) -> Self {
        Self {
            out,
            cast,
            locale: config.locale,
            typing_speed: config.typing_speed,
            entrance_stagger: config.entrance_stagger,
            reduced_motion: config.reduced_motion(),
            spoken: 0,
        }
    }

    /// Number of speech bubbles rendered so far.
    pub fn spoken(&self) -> usize {
        self.spoken
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    async fn pause(&self, duration: Duration) {
        if !self.reduced_motion && !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Brings the characters on one after another.
    pub async fn enter(&mut self) -> io::Result<()> {
        for index in 0..self.cast.len() {
            if index > 0 {
                self.pause(self.entrance_stagger).await;
            }
            let persona = &self.cast[index];
            writeln!(
                self.out,
                "{} {}{}",
                persona.visual_style.icon,
                persona.name,
                self.locale.text(Text::Appears)
            )?;
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn loading(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", self.locale.text(Text::Loading))?;
        self.out.flush()
    }

    /// Types `message` out character by character. Messages from personas that
    /// are not on stage are not rendered; returns whether it was.
    pub async fn speak(&mut self, message: &ChatMessage) -> io::Result<bool> {
        let Some(persona) = self.cast.iter().find(|p| p.id == message.persona_id) else {
            debug!(persona = %message.persona_id, "Message from a persona not on stage");
            return Ok(false);
        };
        let prefix = format!(
            "[{}] {} {}: ",
            Local::now().format("%H:%M:%S"),
            persona.visual_style.icon,
            persona.name
        );

        write!(self.out, "{}", prefix)?;
        if self.reduced_motion {
            write!(self.out, "{}", message.message)?;
        } else {
            for ch in message.message.chars() {
                write!(self.out, "{}", ch)?;
                self.out.flush()?;
                tokio::time::sleep(self.typing_speed).await;
            }
        }
        writeln!(self.out)?;
        self.out.flush()?;
        self.spoken += 1;
        Ok(true)
    }

    pub fn error(&mut self, err: &ConsumerError) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "⚠️  {}: {}",
            self.locale.text(Text::ErrorTitle),
            err.user_message(self.locale)
        )?;
        writeln!(self.out, "{}", self.locale.text(Text::RetryHint))?;
        self.out.flush()
    }

    pub fn finished(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", self.locale.text(Text::ConversationOver))?;
        self.out.flush()
    }
}
