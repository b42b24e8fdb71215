use std::sync::Arc;
use std::time::Duration;

use ilex_assistant::assistant::fallback::{ known_replies, Bucket };
use ilex_assistant::assistant::phrases::apology;
use ilex_assistant::assistant::{ AssistantConfig, ChatAssistant, ReplySource };
use ilex_assistant::llm::chat::completions::CompletionsClient;
use ilex_assistant::llm::chat::{ new_client, ChatClient, ChatError, PromptMessage };
use ilex_assistant::llm::{ LlmConfig, LlmType };
use ilex_assistant::locale::Locale;
use ilex_assistant::models::chat::Sender;
use serde_json::{ json, Value };
use wiremock::{
    matchers::{ body_partial_json, header, method, path },
    Mock, MockServer, ResponseTemplate,
};

fn client_for(server: &MockServer, timeout: Duration) -> Arc<dyn ChatClient> {
    Arc::new(
        CompletionsClient::new(
            LlmType::DeepSeek,
            "test-key".to_string(),
            None,
            Some(server.uri()),
            timeout
        ).expect("client")
    )
}

fn assistant_for(server: &MockServer) -> ChatAssistant {
    let config = AssistantConfig {
        fallback_delay: Duration::ZERO,
        request_timeout: Duration::from_secs(2),
    };
    ChatAssistant::new(Some(client_for(server, Duration::from_secs(2))), config)
}

#[tokio::test]
async fn sends_persona_and_history_with_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({ "model": "deepseek-chat", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "test_response",
            "object": "chat.completion",
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "X" },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut assistant = assistant_for(&server);
    let reply = assistant.send("How much for a 2x3 wall?", Locale::En).await.unwrap();

    assert_eq!(reply.message.text, "X");
    assert_eq!(reply.source, ReplySource::Remote);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"].as_str().unwrap().contains("Ilex Art"));
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[2], json!({ "role": "user", "content": "How much for a 2x3 wall?" }));
}

#[tokio::test]
async fn empty_choices_become_apology() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let mut assistant = assistant_for(&server);
    let reply = assistant.send("hello", Locale::En).await.unwrap();
    assert_eq!(reply.message.text, apology(Locale::En));
    assert!(!reply.message.text.is_empty());
}

#[tokio::test]
async fn insufficient_balance_routes_to_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(402).set_body_json(
                json!({ "error": { "message": "Insufficient Balance" } })
            )
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(2));
    let err = client.complete(&[PromptMessage::new("user", "hi")]).await.unwrap_err();
    assert!(matches!(err, ChatError::InsufficientBalance));

    let mut assistant = assistant_for(&server);
    let reply = assistant.send("what is the price, hello", Locale::En).await.unwrap();
    assert_eq!(reply.source, ReplySource::Fallback);
    assert_eq!(reply.message.text, Bucket::Price.reply(Locale::En));
}

#[tokio::test]
async fn server_errors_and_garbage_never_reach_the_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let mut assistant = assistant_for(&server);
    let first = assistant.send("Какие материалы есть?", Locale::Ru).await.unwrap();
    let second = assistant.send("ммм", Locale::Ru).await.unwrap();

    for reply in [&first, &second] {
        assert_eq!(reply.source, ReplySource::Fallback);
        assert!(known_replies(Locale::Ru).contains(&reply.message.text.as_str()));
        assert!(!reply.message.text.contains("exploded"));
    }
    assert_eq!(first.message.text, Bucket::Material.reply(Locale::Ru));

    let senders: Vec<_> = assistant.messages().iter().map(|m| m.sender).collect();
    assert_eq!(
        senders,
        vec![Sender::Assistant, Sender::User, Sender::Assistant, Sender::User, Sender::Assistant]
    );
}

#[tokio::test]
async fn slow_endpoint_times_out_into_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "choices": [{ "message": { "content": "late" } }] }))
                .set_delay(Duration::from_secs(3))
        )
        .mount(&server)
        .await;

    let config = AssistantConfig {
        fallback_delay: Duration::ZERO,
        request_timeout: Duration::from_millis(300),
    };
    let mut assistant = ChatAssistant::new(Some(client_for(&server, Duration::from_secs(10))), config);
    let reply = assistant.send("contact?", Locale::En).await.unwrap();

    assert_eq!(reply.source, ReplySource::Fallback);
    assert_eq!(reply.message.text, Bucket::Contact.reply(Locale::En));
    assert!(!assistant.is_pending());
}

#[tokio::test]
async fn unreachable_endpoint_falls_back() {
    let config = LlmConfig {
        llm_type: LlmType::OpenAI,
        api_key: Some("k".into()),
        completion_model: None,
        base_url: Some("http://127.0.0.1:9".into()),
        timeout: Duration::from_secs(2),
    };
    let client = new_client(&config).unwrap();
    let assistant_config = AssistantConfig {
        fallback_delay: Duration::ZERO,
        request_timeout: Duration::from_secs(2),
    };
    let mut assistant = ChatAssistant::new(Some(client), assistant_config);

    let reply = assistant.send("delivery?", Locale::En).await.unwrap();
    assert_eq!(reply.source, ReplySource::Fallback);
    assert_eq!(reply.message.text, Bucket::Delivery.reply(Locale::En));
}

#[test]
fn missing_key_is_not_configured() {
    let config = LlmConfig { api_key: None, ..LlmConfig::default() };
    assert!(matches!(new_client(&config), Err(ChatError::NotConfigured)));
}
