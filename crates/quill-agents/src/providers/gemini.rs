//! Google Gemini wire client: streaming `streamGenerateContent` over SSE and
//! blocking `generateContent`, with the settings-override rules applied when
//! the request body is built.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use quill_common::{Error, Result};
use quill_config::{Settings, ThinkingLevel};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::schema::{self, FunctionDeclaration};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Every category dialed to BLOCK_NONE; content moderation is the host
/// application's concern, not the transport's.
const SAFETY_CATEGORIES: [&str; 5] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_CIVIC_INTEGRITY",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
];

/// One role-tagged entry of Gemini-native history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: "user".to_string(),
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: "model".to_string(),
            parts,
        }
    }
}

/// A single content part. Exactly one of the payload fields is set; `thought`
/// flags streamed text that belongs to the model's reasoning summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Self::default()
        }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: String) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data,
            }),
            ..Self::default()
        }
    }

    pub fn is_thought(&self) -> bool {
        self.thought.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Response shape shared by the blocking call and each streamed chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

impl GenerateResponse {
    /// Plain output text of the first candidate, thought parts excluded.
    pub fn text(&self) -> String {
        self.first_candidate_content()
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| !part.is_thought())
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Thought-summary fragments across all candidates.
    pub fn thoughts(&self) -> Vec<String> {
        self.candidates
            .iter()
            .filter_map(|candidate| candidate.content.as_ref())
            .flat_map(|content| &content.parts)
            .filter(|part| part.is_thought())
            .filter_map(|part| part.text.clone())
            .collect()
    }

    pub fn first_candidate_content(&self) -> Option<&Content> {
        self.candidates.first().and_then(|c| c.content.as_ref())
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn request_body(
        &self,
        settings: &Settings,
        system: &str,
        contents: &[Content],
        declarations: &[FunctionDeclaration],
        include_thoughts: bool,
    ) -> Value {
        let mut generation_config = json!({});
        if include_thoughts {
            let mut thinking = json!({ "includeThoughts": true });
            if let Some(level) = settings.effective_thinking_level() {
                thinking["thinkingLevel"] = json!(match level {
                    ThinkingLevel::Low => "LOW",
                    _ => "HIGH",
                });
            }
            generation_config["thinkingConfig"] = thinking;
        }
        if let Some(temperature) = settings.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = settings.max_output_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }

        let mut body = json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": system }] },
            "safetySettings": SAFETY_CATEGORIES
                .iter()
                .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
                .collect::<Vec<_>>(),
            "generationConfig": generation_config,
        });

        if !declarations.is_empty() {
            body["tools"] = json!([{
                "functionDeclarations": declarations
                    .iter()
                    .map(|decl| json!({
                        "name": decl.name,
                        "description": decl.description,
                        "parameters": schema::to_gemini(&decl.parameters),
                    }))
                    .collect::<Vec<_>>(),
            }]);
        }

        body
    }

    /// Issue a streaming generate request; yields one [`GenerateResponse`]
    /// per SSE event.
    pub async fn stream_generate(
        &self,
        settings: &Settings,
        system: &str,
        contents: &[Content],
        declarations: &[FunctionDeclaration],
    ) -> Result<BoxStream<'static, Result<GenerateResponse>>> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, settings.model, self.api_key
        );
        let body = self.request_body(settings, system, contents, declarations, true);

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Unexpected(format!("Gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::from_status(
                status,
                format!("status={status}, body={body_text}"),
            ));
        }

        let byte_stream = response.bytes_stream().boxed();

        let events = stream::try_unfold(
            (byte_stream, Vec::new()),
            |(mut byte_stream, mut buffer): (BoxStream<'static, reqwest::Result<Bytes>>, Vec<u8>)| async move {
                loop {
                    if let Some(i) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(0..=i).collect();
                        let line = String::from_utf8_lossy(&line_bytes).trim().to_string();

                        if let Some(data) = line.strip_prefix("data: ")
                            && let Ok(chunk) = serde_json::from_str::<GenerateResponse>(data)
                        {
                            return Ok(Some((chunk, (byte_stream, buffer))));
                        }
                        // Non-data lines and unparseable payloads are skipped.
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

    /// Blocking generate, used by the single-shot call. No thought summary is
    /// requested and no tools are attached.
    pub async fn generate(
        &self,
        settings: &Settings,
        system: &str,
        contents: &[Content],
    ) -> Result<GenerateResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, settings.model, self.api_key
        );
        let body = self.request_body(settings, system, contents, &[], false);

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Unexpected(format!("Gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::from_status(
                status,
                format!("status={status}, body={body_text}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Unexpected(format!("failed to parse Gemini response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_config::ProviderKind;

    fn settings() -> Settings {
        Settings {
            provider: ProviderKind::Google,
            model: "gemini-2.5-flash".to_string(),
            google_api_key: "test-key".to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn default_settings_leave_provider_defaults_alone() {
        let client = GeminiClient::new("test-key".to_string());
        let body = client.request_body(&settings(), "be helpful", &[], &[], true);

        let config = &body["generationConfig"];
        assert!(config.get("temperature").is_none());
        assert!(config.get("maxOutputTokens").is_none());
        assert_eq!(config["thinkingConfig"]["includeThoughts"], true);
        assert!(config["thinkingConfig"].get("thinkingLevel").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn overrides_land_in_generation_config() {
        let client = GeminiClient::new("test-key".to_string());
        let mut settings = settings();
        settings.temperature = Some(0.3);
        settings.max_output_tokens = Some(2048);

        let body = client.request_body(&settings, "sys", &[], &[], true);
        assert_eq!(body["generationConfig"]["temperature"], 0.3);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn thinking_level_forwarded_for_gemini_3() {
        let client = GeminiClient::new("test-key".to_string());
        let mut settings = settings();
        settings.model = "gemini-3-pro".to_string();
        settings.thinking_level = ThinkingLevel::Low;

        let body = client.request_body(&settings, "sys", &[], &[], true);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingLevel"], "LOW");
    }

    #[test]
    fn all_safety_categories_disabled() {
        let client = GeminiClient::new("test-key".to_string());
        let body = client.request_body(&settings(), "sys", &[], &[], false);

        let safety = body["safetySettings"].as_array().unwrap();
        assert_eq!(safety.len(), 5);
        assert!(safety.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
    }

    #[test]
    fn declarations_render_as_function_declarations() {
        use crate::schema::Schema;

        let client = GeminiClient::new("test-key".to_string());
        let decls = vec![FunctionDeclaration {
            name: "search_notes".to_string(),
            description: "Full-text search over the vault".to_string(),
            parameters: Schema::object([("query", Schema::string("Search query"))]),
        }];

        let body = client.request_body(&settings(), "sys", &[], &decls, true);
        let rendered = &body["tools"][0]["functionDeclarations"][0];
        assert_eq!(rendered["name"], "search_notes");
        assert_eq!(rendered["parameters"]["type"], "OBJECT");
        assert_eq!(rendered["parameters"]["properties"]["query"]["type"], "STRING");
    }

    #[test]
    fn response_text_skips_thoughts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "thinking about it", "thought": true },
                        { "text": "Hello" },
                        { "text": " world" }
                    ]
                }
            }]
        }))
        .unwrap();

        assert_eq!(response.text(), "Hello world");
        assert_eq!(response.thoughts(), vec!["thinking about it".to_string()]);
    }
}
