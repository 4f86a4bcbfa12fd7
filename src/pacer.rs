//! Turn-by-turn reveal of a growing conversation.
//!
//! Messages are revealed one at a time, independent of how fast they arrive
//! over the network: the first after an entrance delay, each following one
//! after a delay scaled by the length of the message before it.

use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::ConsumerError;
use crate::ChatMessage;

/// Tunable reveal timings. Only monotonicity and the `[base, base + max_length_bonus]`
/// bound on per-message delays are relied upon.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Wait before the first message so character entrances can finish.
    pub initial_delay: Duration,
    pub base_delay: Duration,
    pub per_char_delay: Duration,
    pub max_length_bonus: Duration,
    /// Reveal everything immediately.
    pub reduced_motion: bool,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1500),
            base_delay: Duration::from_millis(1500),
            per_char_delay: Duration::from_millis(30),
            max_length_bonus: Duration::from_millis(1500),
            reduced_motion: false,
        }
    }
}

impl PacingConfig {
    pub fn reduced_motion() -> Self {
        Self {
            reduced_motion: true,
            ..Self::default()
        }
    }

    pub fn entrance_delay(&self) -> Duration {
        if self.reduced_motion {
            Duration::ZERO
        } else {
            self.initial_delay
        }
    }

    /// How long `message` stays on stage before the next one replaces it.
    pub fn delay_after(&self, message: &ChatMessage) -> Duration {
        if self.reduced_motion {
            return Duration::ZERO;
        }
        let chars = u32::try_from(message.message.chars().count()).unwrap_or(u32::MAX);
        let bonus = self
            .per_char_delay
            .saturating_mul(chars)
            .min(self.max_length_bonus);
        self.base_delay + bonus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    NotStarted,
    Showing(usize),
    /// Every message known so far has been shown; more may still arrive.
    Idle,
}

#[derive(Debug, Clone)]
pub struct RevealPacer {
    config: PacingConfig,
    state: PacerState,
    shown: usize,
}

impl RevealPacer {
    pub fn new(config: PacingConfig) -> Self {
        Self {
            config,
            state: PacerState::NotStarted,
            shown: 0,
        }
    }

    pub fn state(&self) -> PacerState {
        self.state
    }

    /// Number of messages revealed so far.
    pub fn shown(&self) -> usize {
        self.shown
    }

    /// Index of the message currently on stage.
    pub fn current(&self) -> Option<usize> {
        self.shown.checked_sub(1)
    }

    /// Delay before the next reveal, or `None` when there is nothing left to show yet.
    pub fn next_delay(&self, messages: &[ChatMessage]) -> Option<Duration> {
        if self.shown >= messages.len() {
            return None;
        }
        match self.current() {
            None => Some(self.config.entrance_delay()),
            Some(index) => Some(self.config.delay_after(&messages[index])),
        }
    }

    /// Moves to the next message if `known` allows it and returns its index.
    /// Otherwise settles into `Idle` (once started) and returns `None`.
    pub fn advance(&mut self, known: usize) -> Option<usize> {
        if self.shown < known {
            let index = self.shown;
            self.shown += 1;
            self.state = PacerState::Showing(index);
            Some(index)
        } else {
            if self.state != PacerState::NotStarted {
                self.state = PacerState::Idle;
            }
            None
        }
    }
}

/// Produced by the consumer, in order; exactly one terminal event ends a conversation.
#[derive(Debug)]
pub enum ConversationEvent {
    Message(ChatMessage),
    Finished,
    Failed(ConsumerError),
}

/// Produced by the reveal task for the stage.
#[derive(Debug)]
pub enum RevealEvent {
    Show { index: usize, message: ChatMessage },
    Failed(ConsumerError),
    Done { shown: usize },
}

/// Owns the reveal task. Dropping the handle cancels any pending timer.
#[derive(Debug)]
pub struct RevealHandle {
    task: Option<JoinHandle<()>>,
}

impl RevealHandle {
    /// Waits for the reveal task to run to completion.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!("Reveal task panicked: {:?}", e);
                }
            }
        }
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RevealHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Spawns the reveal loop: reads conversation events, paces them, and forwards
/// them as [`RevealEvent`]s. A failure is reported after the messages that
/// arrived before it have been revealed.
pub fn spawn_reveal(
    events: mpsc::Receiver<ConversationEvent>,
    config: PacingConfig,
    out: mpsc::Sender<RevealEvent>,
) -> RevealHandle {
    let task = tokio::spawn(reveal_loop(events, config, out));
    RevealHandle { task: Some(task) }
}

async fn reveal_loop(
    mut events: mpsc::Receiver<ConversationEvent>,
    config: PacingConfig,
    out: mpsc::Sender<RevealEvent>,
) {
    let mut pacer = RevealPacer::new(config);
    let mut known: Vec<ChatMessage> = Vec::new();
    let mut failure: Option<ConsumerError> = None;
    let mut producing = true;

    loop {
        while producing {
            match events.try_recv() {
                Ok(event) => absorb(event, &mut known, &mut failure, &mut producing),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => producing = false,
            }
        }

        if let Some(delay) = pacer.next_delay(&known) {
            tokio::time::sleep(delay).await;
            if let Some(index) = pacer.advance(known.len()) {
                debug!(index, "Revealing message");
                let message = known[index].clone();
                if out.send(RevealEvent::Show { index, message }).await.is_err() {
                    return;
                }
            }
            continue;
        }

        pacer.advance(known.len());
        if !producing {
            break;
        }
        match events.recv().await {
            Some(event) => absorb(event, &mut known, &mut failure, &mut producing),
            None => producing = false,
        }
    }

    let last = match failure {
        Some(err) => RevealEvent::Failed(err),
        None => RevealEvent::Done {
            shown: pacer.shown(),
        },
    };
    let _ = out.send(last).await;
}

fn absorb(
    event: ConversationEvent,
    known: &mut Vec<ChatMessage>,
    failure: &mut Option<ConsumerError>,
    producing: &mut bool,
) {
    match event {
        ConversationEvent::Message(message) => known.push(message),
        ConversationEvent::Finished => *producing = false,
        ConversationEvent::Failed(err) => {
            *failure = Some(err);
            *producing = false;
        }
    }
}
