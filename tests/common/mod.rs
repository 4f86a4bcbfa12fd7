#![allow(dead_code)]

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ghost_chat::error::GenerationError;
use ghost_chat::llm_interaction::{GenerationRequest, TextGenerator, TextStream};
use ghost_chat::personas::PersonaRegistry;
use ghost_chat::web_server::{self, AppState};

/// Replays canned text chunks and remembers the last request it saw.
#[derive(Default)]
pub struct ScriptedGenerator {
    chunks: Vec<String>,
    pub last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            last_request: Mutex::new(None),
        }
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<TextStream, GenerationError>> {
        *self.last_request.lock().unwrap() = Some(request);
        let chunks: Vec<Result<String, GenerationError>> = self.chunks.iter().cloned().map(Ok).collect();
        Box::pin(async move { Ok(stream::iter(chunks).boxed()) })
    }
}

/// Always rejected upstream.
pub struct FailingGenerator;

impl TextGenerator for FailingGenerator {
    fn generate(&self, _request: GenerationRequest) -> BoxFuture<'_, Result<TextStream, GenerationError>> {
        Box::pin(async {
            Err(GenerationError::Status {
                status: 401,
                body: "invalid api key".to_string(),
            })
        })
    }
}

/// Never starts streaming.
pub struct StalledGenerator;

impl TextGenerator for StalledGenerator {
    fn generate(&self, _request: GenerationRequest) -> BoxFuture<'_, Result<TextStream, GenerationError>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(stream::empty().boxed())
        })
    }
}

/// Sends one line, then keeps the stream open without sending anything else.
pub struct HangingGenerator {
    pub first_line: &'static str,
}

impl TextGenerator for HangingGenerator {
    fn generate(&self, _request: GenerationRequest) -> BoxFuture<'_, Result<TextStream, GenerationError>> {
        let first = stream::once(futures::future::ready(Ok(self.first_line.to_string())));
        Box::pin(async move { Ok(first.chain(stream::pending()).boxed()) })
    }
}

pub const TWO_LINES: &[&str] = &[
    "{\"personaId\":\"skeleton\",\"message\":\"カタカタ…誰かいるのか？\"}\n{\"persona",
    "Id\":\"pumpkin\",\"message\":\"ぼくだよ！\"}\n",
];

pub fn app_with(generator: Arc<dyn TextGenerator>, generation_timeout: Duration) -> axum::Router {
    let state = AppState::new(
        Arc::new(PersonaRegistry::builtin()),
        generator,
        "templates".into(),
        generation_timeout,
    );
    web_server::router(state, "static".into())
}

pub fn app(generator: Arc<dyn TextGenerator>) -> axum::Router {
    app_with(generator, Duration::from_secs(30))
}
