use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ConsumerError;
use crate::locale::Locale;
use crate::ndjson::MessageStream;
use crate::pacer::ConversationEvent;
use crate::ChatMessage;

/// Body of `POST /api/ghost-chat`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    pub situation: String,
    pub persona_ids: Vec<String>,
    pub locale: Locale,
}

pub struct ChatClient {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(server_url: &str, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            endpoint: format!("{}/api/ghost-chat", server_url.trim_end_matches('/')),
            timeout,
        }
    }

    /// Sends the request and returns the parsed message stream once the status is known to be good.
    pub async fn open(
        &self,
        request: &ConversationRequest,
    ) -> Result<impl Stream<Item = Result<ChatMessage, ConsumerError>>, ConsumerError> {
        let response = self.http.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "ghost-chat request rejected");
            return Err(ConsumerError::Status(status.as_u16()));
        }

        Ok(MessageStream::new(response.bytes_stream()))
    }

    /// Streams a conversation into `events`.
    ///
    /// Every parsed message is sent as it arrives, followed by exactly one
    /// `Finished` or `Failed`. The timeout covers the whole exchange; when it
    /// fires no further chunks are read, and messages already sent stay sent.
    #[instrument(skip_all, fields(personas = ?request.persona_ids, locale = %request.locale))]
    pub async fn stream_conversation(
        &self,
        request: ConversationRequest,
        events: mpsc::Sender<ConversationEvent>,
    ) {
        info!("Requesting conversation");
        let outcome = match tokio::time::timeout(self.timeout, self.forward(&request, &events)).await {
            Ok(result) => result,
            Err(_) => Err(ConsumerError::Timeout(self.timeout)),
        };

        let last = match outcome {
            Ok(count) => {
                info!(count, "Conversation stream finished");
                ConversationEvent::Finished
            }
            Err(e) => {
                error!(error = %e, "Conversation request failed");
                ConversationEvent::Failed(e)
            }
        };
        let _ = events.send(last).await;
    }

    async fn forward(
        &self,
        request: &ConversationRequest,
        events: &mpsc::Sender<ConversationEvent>,
    ) -> Result<usize, ConsumerError> {
        let mut messages = std::pin::pin!(self.open(request).await?);
        let mut count = 0;
        while let Some(item) = messages.next().await {
            let message = item?;
            debug!(persona = %message.persona_id, "Received message");
            if events.send(ConversationEvent::Message(message)).await.is_err() {
                debug!("Receiver dropped, stopping stream");
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Collects the whole conversation, bounded by the same timeout.
    pub async fn fetch_all(&self, request: &ConversationRequest) -> Result<Vec<ChatMessage>, ConsumerError> {
        let collect = async {
            let messages = self.open(request).await?;
            let items: Vec<Result<ChatMessage, ConsumerError>> = messages.collect().await;
            items.into_iter().collect::<Result<Vec<_>, _>>()
        };
        tokio::time::timeout(self.timeout, collect)
            .await
            .unwrap_or(Err(ConsumerError::Timeout(self.timeout)))
    }
}
