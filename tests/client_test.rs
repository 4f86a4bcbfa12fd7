use std::time::Duration;
use test_log::test;
use tokio::sync::mpsc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ghost_chat::client::{ChatClient, ConversationRequest};
use ghost_chat::error::ConsumerError;
use ghost_chat::locale::Locale;
use ghost_chat::pacer::ConversationEvent;

const NDJSON: &str = concat!(
    "{\"personaId\":\"skeleton\",\"message\":\"カタカタ\"}\n",
    "this line is not json\n",
    "{\"personaId\":\"pumpkin\",\"message\":\"こんばんは\"}\n",
    "{\"personaId\":\"witch\",\"message\":\"ヒッヒッ\"}"
);

fn request() -> ConversationRequest {
    ConversationRequest {
        situation: "a haunted house".to_string(),
        persona_ids: vec!["skeleton".to_string(), "pumpkin".to_string()],
        locale: Locale::Ja,
    }
}

async fn collect(mut rx: mpsc::Receiver<ConversationEvent>) -> Vec<ConversationEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[test(tokio::test)]
async fn test_streams_valid_lines_then_finishes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ghost-chat"))
        .and(body_json(serde_json::json!({
            "situation": "a haunted house",
            "personaIds": ["skeleton", "pumpkin"],
            "locale": "ja"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(NDJSON, "text/plain; charset=utf-8"))
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri(), Duration::from_secs(5));
    let (tx, rx) = mpsc::channel(8);
    client.stream_conversation(request(), tx).await;
    let events = collect(rx).await;

    // The trailing line has no newline and is dropped.
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], ConversationEvent::Message(m) if m.persona_id == "skeleton"));
    assert!(matches!(&events[1], ConversationEvent::Message(m) if m.message == "こんばんは"));
    assert!(matches!(events[2], ConversationEvent::Finished));
}

#[test(tokio::test)]
async fn test_error_status_fails_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ghost-chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({ "error": "boom" })))
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri(), Duration::from_secs(5));
    let (tx, rx) = mpsc::channel(8);
    client.stream_conversation(request(), tx).await;
    let events = collect(rx).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ConversationEvent::Failed(ConsumerError::Status(500))));
}

#[test(tokio::test)]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ghost-chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(NDJSON, "text/plain")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri(), Duration::from_millis(100));
    let (tx, rx) = mpsc::channel(8);
    client.stream_conversation(request(), tx).await;
    let events = collect(rx).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        ConversationEvent::Failed(e) => {
            assert!(e.is_timeout());
            assert_eq!(e.user_message(Locale::En), "The request timed out. Please try again.");
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
}

#[test(tokio::test)]
async fn test_unreachable_server_is_a_transport_error() {
    // Nothing listens on the discard port.
    let client = ChatClient::new("http://127.0.0.1:9", Duration::from_secs(5));
    match client.fetch_all(&request()).await {
        Err(ConsumerError::Transport(_)) => {}
        other => panic!("expected a transport error, got {:?}", other),
    }
}

#[test(tokio::test)]
async fn test_fetch_all_collects_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ghost-chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(NDJSON, "text/plain"))
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri(), Duration::from_secs(5));
    let messages = client.fetch_all(&request()).await.unwrap();
    let ids: Vec<&str> = messages.iter().map(|m| m.persona_id.as_str()).collect();
    assert_eq!(ids, vec!["skeleton", "pumpkin"]);
}
