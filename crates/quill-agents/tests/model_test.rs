use quill_agents::call_model;
use quill_config::{ProviderKind, Settings};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn local_settings(base_url: String) -> Settings {
    Settings {
        provider: ProviderKind::Local,
        model: "qwen3".to_string(),
        local_model_url: base_url,
        ..Settings::default()
    }
}

#[tokio::test]
async fn single_shot_returns_final_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer ollama"))
        .and(body_partial_json(json!({ "model": "qwen3", "temperature": 1.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "A short title" },
                "finish_reason": "stop"
            }]
        })))
        .mount(&mock_server)
        .await;

    let text = call_model(
        &local_settings(mock_server.uri()),
        "You write note titles.",
        "Title this note about Rust lifetimes",
        &[],
    )
    .await
    .unwrap();

    assert_eq!(text, "A short title");
}

#[tokio::test]
async fn single_shot_with_no_content_yields_empty_string() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": null },
                "finish_reason": "stop"
            }]
        })))
        .mount(&mock_server)
        .await;

    let text = call_model(&local_settings(mock_server.uri()), "sys", "user", &[])
        .await
        .unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn single_shot_error_carries_status_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream gone"))
        .mount(&mock_server)
        .await;

    let err = call_model(&local_settings(mock_server.uri()), "sys", "user", &[])
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("status=502"), "unexpected message {msg}");
    assert!(msg.contains("upstream gone"), "unexpected message {msg}");
}
