use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tetrix_chat_lib::models::ChatMessage;
use tetrix_chat_lib::notice::{drain, Notice, Notifier};
use tetrix_chat_lib::remote::{ChatbotClient, StoreClient};
use tetrix_chat_lib::session::{ChatSession, QueryTarget, FALLBACK_REPLY};
use wiremock::matchers::{body_partial_json, method, path};
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::{Mock, MockServer, ResponseTemplate};

const AVATAR: &str = "https://example.com/bot.png";

fn session(backend: &MockServer, store: Option<&MockServer>) -> (ChatSession, UnboundedReceiver<Notice>) {
    let (notifier, rx) = Notifier::channel();
    let client = Arc::new(ChatbotClient::new(backend.uri()));
    let store = store.map(|s| StoreClient::new(s.uri()));
    (ChatSession::new(client, store, notifier, "1", AVATAR), rx)
}

#[tokio::test]
async fn test_reply_is_appended_after_question() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({ "message": "hi", "chatId": "1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "hello" })))
        .expect(1)
        .mount(&backend)
        .await;

    let (session, mut rx) = session(&backend, None);
    let reply = session.send("hi").await.unwrap();
    assert_eq!(reply.message, "hello");

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message, "hi");
    assert!(!messages[0].is_bot);
    assert_eq!(messages[1].message, "hello");
    assert!(messages[1].is_bot);
    assert_eq!(messages[1].avatar.as_deref(), Some(AVATAR));

    assert_ne!(messages[0].id, messages[1].id);
    assert!(messages[0].id < messages[1].id, "ids are time-ordered");
    assert!(messages[0].timestamp <= messages[1].timestamp);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_server_error_gets_fallback_and_notice() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&backend)
        .await;

    let (session, mut rx) = session(&backend, None);
    session.send("hi").await;

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message, "hi");
    assert_eq!(messages[1].message, FALLBACK_REPLY);
    assert!(messages[1].is_bot);

    let notices = drain(&mut rx);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].is_error());
}

#[tokio::test]
async fn test_question_is_visible_while_request_is_in_flight() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "later" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&backend)
        .await;

    let (session, _rx) = session(&backend, None);
    let send = session.send("hi");
    let peek = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.messages()
    };
    let (_, during) = tokio::join!(send, peek);

    assert_eq!(during.len(), 1);
    assert_eq!(during[0].message, "hi");
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn test_overlapping_sends_keep_every_message() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({ "message": "slow" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "slow answer" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({ "message": "fast" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "fast answer" })))
        .mount(&backend)
        .await;

    let (session, _rx) = session(&backend, None);
    let fast_later = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.send("fast").await
    };
    tokio::join!(session.send("slow"), fast_later);

    let texts: Vec<_> = session.messages().iter().map(|m| m.message.clone()).collect();
    assert_eq!(texts, vec!["slow", "fast", "fast answer", "slow answer"]);
    assert_eq!(session.feedback_target(), Some(3));
}

#[tokio::test]
async fn test_document_scoped_query() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/querydoc"))
        .and(body_partial_json(json!({ "message": "total?", "file": "Q1.xlsx/Sheet1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "42" })))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "general" })))
        .expect(0)
        .mount(&backend)
        .await;

    let (session, _rx) = session(&backend, None);
    let target = QueryTarget::Document("Q1.xlsx/Sheet1".into());
    let reply = session.send_to("total?", &target).await.unwrap();
    assert_eq!(reply.message, "42");
}

#[tokio::test]
async fn test_new_messages_are_mirrored_to_store() {
    let backend = MockServer::start().await;
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "hello" })))
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [] })))
        .expect(1)
        .mount(&store)
        .await;

    let (session, _rx) = session(&backend, Some(&store));
    session.send("hi").await;

    let requests = store.received_requests().await.unwrap();
    let batch: Vec<ChatMessage> = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].message, "hi");
    assert_eq!(batch[1].message, "hello");
}

#[tokio::test]
async fn test_store_failure_does_not_touch_transcript() {
    let backend = MockServer::start().await;
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "hello" })))
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat/1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&store)
        .await;

    let (session, mut rx) = session(&backend, Some(&store));
    session.send("hi").await;
    assert_eq!(session.messages().len(), 2);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_load_history() {
    let backend = MockServer::start().await;
    let store = MockServer::start().await;
    let earlier = vec![ChatMessage::user("old"), ChatMessage::bot("older", AVATAR)];
    Mock::given(method("GET"))
        .and(path("/api/chat/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": earlier })))
        .mount(&store)
        .await;

    let (session, _rx) = session(&backend, Some(&store));
    assert_eq!(session.load().await.unwrap(), 2);
    assert_eq!(session.messages().as_ref(), &earlier);
    assert_eq!(session.thumbs_down().as_deref(), Some("old"));
}

#[tokio::test]
async fn test_load_unknown_chat_is_empty() {
    let backend = MockServer::start().await;
    let store = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Chat not found" })))
        .mount(&store)
        .await;

    let (session, _rx) = session(&backend, Some(&store));
    assert_eq!(session.load().await.unwrap(), 0);
    assert!(session.messages().is_empty());
}
