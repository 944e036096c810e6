use std::time::Duration;

use tapreply_provider::{AnthropicProvider, CompletionRequest, LlmProvider};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reply_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "content": [{"type": "text", "text": text}],
        "usage": {"input_tokens": 10, "output_tokens": 5},
        "stop_reason": "end_turn"
    })
}

fn replies_request() -> CompletionRequest {
    CompletionRequest::new("claude-3-haiku-20240307", "Generate exactly 6 short reply options")
}

async fn server_replying(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn completion_sends_headers_and_single_user_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_json(serde_json::json!({
            "model": "claude-3-haiku-20240307",
            "max_tokens": 300,
            "temperature": 0.5,
            "messages": [
                {"role": "user", "content": "Generate exactly 6 short reply options"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("Yes.\nNo.")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("test-key", server.uri());
    let completion = provider
        .complete(replies_request().with_max_tokens(300).with_temperature(0.5))
        .await
        .unwrap();

    assert_eq!(completion.text, "Yes.\nNo.");
    assert_eq!(completion.output_tokens, Some(5));
    assert_eq!(completion.stop_reason.as_deref(), Some("end_turn"));
}

#[tokio::test]
async fn completion_without_usage_still_parses() {
    let server = server_replying(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "content": [
            {"type": "text", "text": "Cash or card?"},
            {"type": "text", "text": "How much is it?"}
        ]
    })))
    .await;

    let provider = AnthropicProvider::new("test-key", server.uri());
    let completion = provider.complete(replies_request()).await.unwrap();
    assert_eq!(completion.text, "Cash or card?\nHow much is it?");
    assert_eq!(completion.output_tokens, None);
    assert_eq!(completion.stop_reason, None);
}

#[tokio::test]
async fn rejected_key_is_reported_as_auth_error() {
    let server = server_replying(ResponseTemplate::new(401).set_body_json(serde_json::json!({
        "type": "error",
        "error": {"type": "authentication_error", "message": "invalid x-api-key"}
    })))
    .await;

    let provider = AnthropicProvider::new("bad-key", server.uri());
    let err = provider.complete(replies_request()).await.unwrap_err().to_string();
    assert!(err.contains("401"));
    assert!(err.contains("[auth_error]"));
    assert!(err.contains("invalid x-api-key"));
}

#[tokio::test]
async fn server_error_without_body() {
    let server = server_replying(ResponseTemplate::new(503)).await;

    let provider = AnthropicProvider::new("test-key", server.uri());
    let err = provider.complete(replies_request()).await.unwrap_err().to_string();
    assert!(err.contains("503"));
    assert!(err.contains("[server_error]"));
}

#[tokio::test]
async fn slow_response_reports_sub_second_timeout() {
    let server = server_replying(
        ResponseTemplate::new(200)
            .set_body_json(reply_body("late"))
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let provider =
        AnthropicProvider::with_timeout("test-key", server.uri(), Duration::from_millis(200));
    let err = provider.complete(replies_request()).await.unwrap_err().to_string();
    assert_eq!(
        err,
        "anthropic api error (timeout): no response within 200ms"
    );
}
