use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::{debug, error, instrument, warn};

use crate::error::GenerationError;
use crate::ndjson::{LineBuffer, Utf8Decoder};

/// Text produced by the model, forwarded chunk by chunk as it arrives.
pub type TextStream = BoxStream<'static, Result<String, GenerationError>>;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_message: String,
}

/// The hosted model, seen as "send prompt, receive a text stream".
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<TextStream, GenerationError>>;
}

// Structures matching the OpenAI-compatible /chat/completions endpoint
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize, Debug)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Debug, Default)]
struct ChunkDelta {
    content: Option<String>,
}

pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiGenerator {
    pub fn new(base_url: &str, api_key: &str, model: &str, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
        }
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn start_stream(&self, request: GenerationRequest) -> Result<TextStream, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(system_prompt = %request.system_prompt, "Constructed system prompt");

        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatCompletionMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatCompletionMessage {
                    role: "user",
                    content: &request.user_message,
                },
            ],
            temperature: self.temperature,
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Model API request failed");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Model API accepted request, streaming");
        Ok(sse_text_stream(response.bytes_stream()))
    }
}

impl TextGenerator for OpenAiGenerator {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<TextStream, GenerationError>> {
        Box::pin(self.start_stream(request))
    }
}

/// Extracts the text deltas from a server-sent-events chat completion body.
pub fn sse_text_stream<S, B>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    struct State<S> {
        inner: Pin<Box<S>>,
        decoder: Utf8Decoder,
        lines: LineBuffer,
        pending: VecDeque<String>,
        done: bool,
    }

    let state = State {
        inner: Box::pin(bytes),
        decoder: Utf8Decoder::new(),
        lines: LineBuffer::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                return Some((Ok(text), state));
            }
            if state.done {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    let text = state.decoder.decode(chunk.as_ref());
                    for line in state.lines.push(&text) {
                        match parse_sse_line(&line) {
                            SseLine::Text(delta) => state.pending.push_back(delta),
                            SseLine::Done => {
                                state.done = true;
                                break;
                            }
                            SseLine::Skip => {}
                        }
                    }
                }
                Some(Err(e)) => {
                    error!(error = %e, "Model stream failed");
                    state.done = true;
                    return Some((Err(GenerationError::Request(e)), state));
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Text(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map_or(SseLine::Skip, SseLine::Text),
        Err(e) => {
            warn!(data, error = %e, "Ignoring unparsable model stream event");
            SseLine::Skip
        }
    }
}
