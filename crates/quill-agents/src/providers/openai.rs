//! OpenAI-compatible wire client, shared by the hosted (OpenRouter) and
//! local endpoint paths. Everything goes through `POST {base}/chat/completions`
//! with a Bearer token; streaming responses arrive as SSE chunks carrying
//! indexed tool-call deltas.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use quill_common::{Error, Result};
use quill_config::{ProviderKind, Settings};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::history::ChatTurn;
use crate::schema::{self, FunctionDeclaration};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    /// Credential and endpoint selection for the OpenAI-compatible paths:
    /// OpenRouter uses the configured key against the hosted URL, anything
    /// else is treated as the local endpoint with a placeholder key. Google
    /// invocations never reach this constructor.
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.provider {
            ProviderKind::OpenRouter => Self::new(
                settings.open_router_api_key.clone(),
                OPENROUTER_API_URL.to_string(),
            ),
            _ => Self::new("ollama".to_string(), settings.local_base_url().to_string()),
        }
    }

    /// Blocking chat completion.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self.post(request).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Unexpected(format!("failed to parse chat response: {e}")))
    }

    /// Streaming chat completion; yields one [`ChatChunk`] per SSE event.
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<ChatChunk>>> {
        let response = self.post(request).await?;
        let byte_stream = response.bytes_stream().boxed();

        let events = stream::try_unfold(
            (byte_stream, Vec::new()),
            |(mut byte_stream, mut buffer): (BoxStream<'static, reqwest::Result<Bytes>>, Vec<u8>)| async move {
                loop {
                    if let Some(i) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(0..=i).collect();
                        let line = String::from_utf8_lossy(&line_bytes).trim().to_string();

                        if let Some(data) = line.strip_prefix("data: ") {
                            if data == "[DONE]" {
                                continue;
                            }
                            if let Ok(chunk) = serde_json::from_str::<ChatChunk>(data) {
                                return Ok(Some((chunk, (byte_stream, buffer))));
                            }
                        }
                        // Blank keep-alive lines and unparseable payloads are skipped.
                        continue;
                    }

                    match byte_stream.next().await {
                        Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                        Some(Err(e)) => {
                            return Err(Error::Unexpected(format!("stream error: {e}")));
                        }
                        None => return Ok(None),
                    }
                }
            },
        );

        Ok(Box::pin(events))
    }

    async fn post(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Unexpected(format!("chat request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("status={status}, body={body_text}")));
        }

        Ok(response)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    pub fn from_declaration(decl: &FunctionDeclaration) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSchema {
                name: decl.name.clone(),
                description: decl.description.clone(),
                parameters: schema::translate(&decl.parameters),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamDelta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// One fragment of a tool call. Fragments for the same `index` accumulate
/// across chunks: the id arrives once, name and arguments concatenate.
#[derive(Debug, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{UserContent, UserPart};
    use serde_json::json;

    #[test]
    fn request_serialization_matches_wire_contract() {
        let request = ChatRequest {
            model: "qwen3".to_string(),
            messages: vec![
                ChatTurn::System {
                    content: "be helpful".to_string(),
                },
                ChatTurn::User {
                    content: UserContent::Text("hi".to_string()),
                },
            ],
            tools: None,
            stream: false,
            temperature: 1.0,
            max_tokens: None,
        };

        let rendered = serde_json::to_value(&request).unwrap();
        assert_eq!(
            rendered,
            json!({
                "model": "qwen3",
                "messages": [
                    { "role": "system", "content": "be helpful" },
                    { "role": "user", "content": "hi" }
                ],
                "temperature": 1.0
            })
        );
    }

    #[test]
    fn user_parts_serialize_with_type_tags() {
        let turn = ChatTurn::User {
            content: UserContent::Parts(vec![
                UserPart::text("look at this"),
                UserPart::image_url("data:image/png;base64,AAAA"),
            ]),
        };

        let rendered = serde_json::to_value(&turn).unwrap();
        assert_eq!(rendered["content"][0]["type"], "text");
        assert_eq!(rendered["content"][1]["type"], "image_url");
        assert_eq!(
            rendered["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn from_settings_selects_hosted_or_local() {
        let mut settings = Settings {
            provider: ProviderKind::OpenRouter,
            open_router_api_key: "sk-or-key".to_string(),
            local_model_url: "http://localhost:11434/v1/".to_string(),
            ..Settings::default()
        };

        let hosted = OpenAiClient::from_settings(&settings);
        assert_eq!(hosted.base_url, OPENROUTER_API_URL);
        assert_eq!(hosted.api_key, "sk-or-key");

        settings.provider = ProviderKind::Local;
        let local = OpenAiClient::from_settings(&settings);
        assert_eq!(local.base_url, "http://localhost:11434/v1");
        assert_eq!(local.api_key, "ollama");
    }

    // Integration tests with axum
    use axum::{Json, Router, routing::post};
    use tokio::sync::oneshot;

    async fn run_mock_server() -> (String, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel::<()>();

        let app = Router::new().route(
            "/chat/completions",
            post(|Json(_payload): Json<serde_json::Value>| async move {
                Json(json!({
                    "choices": [{
                        "message": { "role": "assistant", "content": "Hello World" },
                        "finish_reason": "stop"
                    }]
                }))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    rx.await.ok();
                })
                .await
                .unwrap();
        });

        (url, tx)
    }

    #[tokio::test]
    async fn chat_against_local_style_endpoint() {
        let (url, stop) = run_mock_server().await;
        let client = OpenAiClient::new("ollama".to_string(), url);

        let request = ChatRequest {
            model: "qwen3".to_string(),
            messages: vec![ChatTurn::User {
                content: UserContent::Text("Hi".to_string()),
            }],
            tools: None,
            stream: false,
            temperature: 1.0,
            max_tokens: None,
        };

        let response = client.chat(&request).await.unwrap();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("Hello World")
        );

        let _ = stop.send(());
    }

    #[test]
    fn stream_chunk_parses_tool_call_deltas() {
        let chunk: ChatChunk = serde_json::from_value(json!({
            "choices": [{
                "delta": {
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_abc",
                        "function": { "name": "search", "arguments": "{\"q\":" }
                    }]
                },
                "finish_reason": null
            }]
        }))
        .unwrap();

        let delta = &chunk.choices[0].delta;
        let calls = delta.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].index, 0);
        assert_eq!(calls[0].id.as_deref(), Some("call_abc"));
        assert_eq!(
            calls[0].function.as_ref().unwrap().arguments.as_deref(),
            Some("{\"q\":")
        );
    }
}
