//! Stateless single-shot model call: no history, no tools, one request, the
//! final text. Used for auxiliary (non-agentic) invocations like note
//! summarization or title generation.

use quill_common::Result;
use quill_config::{ProviderKind, Settings};

use crate::history::{ChatTurn, UserContent, UserPart};
use crate::inputs::FileInput;
use crate::providers::gemini::{Content, GeminiClient, Part};
use crate::providers::openai::{ChatRequest, OpenAiClient};

/// Issue one request against the configured provider and return the final
/// text. Yields an empty string when the provider produces no text at all.
pub async fn call_model(
    settings: &Settings,
    system: &str,
    user: &str,
    files: &[FileInput],
) -> Result<String> {
    match settings.provider {
        ProviderKind::Google => {
            let client = GeminiClient::new(settings.google_api_key.clone());

            let mut parts = vec![Part::text(user)];
            for file in files {
                parts.push(Part::inline_data(&file.mime_type, file.base64_data()));
            }

            let response = client
                .generate(settings, system, &[Content::user(parts)])
                .await?;
            Ok(response.text())
        }
        ProviderKind::OpenRouter | ProviderKind::Local => {
            let client = OpenAiClient::from_settings(settings);

            let mut parts = vec![UserPart::text(user)];
            for file in files {
                parts.push(UserPart::image_url(file.data_uri()));
            }

            let request = ChatRequest {
                model: settings.model.clone(),
                messages: vec![
                    ChatTurn::System {
                        content: system.to_string(),
                    },
                    ChatTurn::User {
                        content: UserContent::Parts(parts),
                    },
                ],
                tools: None,
                stream: false,
                temperature: settings.temperature.unwrap_or(1.0),
                max_tokens: settings.max_output_tokens,
            };

            let response = client.chat(&request).await?;
            Ok(response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default())
        }
    }
}
