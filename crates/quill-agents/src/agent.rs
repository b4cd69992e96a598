//! The bounded multi-turn tool-calling loops.
//!
//! One invocation reads the caller's conversation log, builds a
//! provider-native working history, and drives rounds of "model responds,
//! tools run, model is re-invoked" until the model stops asking for tools or
//! the turn ceiling is hit. The two provider families realize the loop
//! differently and the differences are deliberate:
//!
//! - Gemini executes at most one tool per turn, dedupes repeated calls within
//!   the invocation, and raises [`Error::DepthExceeded`] at the ceiling.
//! - OpenAI-compatible endpoints may propose several tool calls per turn; all
//!   of them run, nothing is deduped, and the ceiling exits the loop silently
//!   with whatever text has streamed.

use std::collections::{BTreeMap, HashSet};

use futures::StreamExt;
use quill_common::{Attachment, Error, Message, Result, ToolCall};
use quill_config::{ProviderKind, Settings};
use tokio::sync::mpsc;
use tracing::{instrument, warn};

use crate::history::{self, ChatTurn, UserContent, UserPart, WireFunctionCall, WireToolCall};
use crate::inputs::{self, FileInput};
use crate::providers::gemini::{Content, FunctionCall, GeminiClient, Part};
use crate::providers::openai::{ChatRequest, OpenAiClient, ToolSchema};
use crate::tools::ToolRegistry;

/// Hard ceiling on tool-execution rounds per invocation.
pub const MAX_TURNS: u32 = 5;

/// Default system prompt for agentic chat. Hosts usually override this with
/// their own via [`Agent::with_system_prompt`].
pub const AGENT_SYSTEM_PROMPT: &str = "You are a capable assistant embedded in the user's \
note vault. Use the available tools to look up, create, and modify notes when the request \
calls for it, and answer directly when it does not. Attached note paths are listed in the \
user message between ### markers.";

/// Incremental update pushed to the caller while an invocation runs.
/// Consumers treat the stream as append-only: concatenate `text` and
/// `reasoning`, append `tool_calls`.
#[derive(Debug, Clone, Default)]
pub struct AgentUpdate {
    pub text: String,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AgentUpdate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn reasoning(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: reasoning.into(),
            ..Self::default()
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            tool_calls: vec![call],
            ..Self::default()
        }
    }
}

/// Drives agentic chat against the provider selected by the settings
/// snapshot. The snapshot and the registry are fixed for the lifetime of the
/// agent; nothing global is consulted mid-invocation.
pub struct Agent {
    settings: Settings,
    tools: ToolRegistry,
    system_prompt: String,
    gemini_base_url: Option<String>,
}

impl Agent {
    pub fn new(settings: Settings, tools: ToolRegistry) -> Self {
        Self {
            settings,
            tools,
            system_prompt: AGENT_SYSTEM_PROMPT.to_string(),
            gemini_base_url: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Point the Gemini client at a different endpoint (e.g. a proxy).
    pub fn with_gemini_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.gemini_base_url = Some(base_url.into());
        self
    }

    /// Run one agentic invocation. Streams incremental output through
    /// `updates`; resolves once the loop terminates. Any returned error is
    /// fatal to the whole invocation; nothing is retried.
    #[instrument(skip_all, fields(provider = ?self.settings.provider, model = %self.settings.model))]
    pub async fn run(
        &self,
        conversation: &[Message],
        message: &str,
        attachments: &[Attachment],
        files: &[FileInput],
        updates: mpsc::Sender<AgentUpdate>,
    ) -> Result<()> {
        match self.settings.provider {
            ProviderKind::Google => {
                self.run_gemini(conversation, message, attachments, files, updates)
                    .await
            }
            ProviderKind::OpenRouter | ProviderKind::Local => {
                self.run_openai(conversation, message, attachments, files, updates)
                    .await
            }
        }
    }

    async fn run_gemini(
        &self,
        conversation: &[Message],
        message: &str,
        attachments: &[Attachment],
        files: &[FileInput],
        updates: mpsc::Sender<AgentUpdate>,
    ) -> Result<()> {
        let mut client = GeminiClient::new(self.settings.google_api_key.clone());
        if let Some(base_url) = &self.gemini_base_url {
            client = client.with_base_url(base_url.clone());
        }
        let declarations = self.tools.declarations();

        let mut history = if conversation.is_empty() {
            Vec::new()
        } else {
            history::build_contents(conversation, self.settings.max_history_turns)
        };

        let mut input = vec![Part::text(inputs::compose_user_text(message, attachments))];
        for file in files {
            input.push(Part::inline_data(&file.mime_type, file.base64_data()));
        }

        // name + serialized args identifies a call for the whole invocation.
        let mut executed: HashSet<String> = HashSet::new();
        let mut turn: u32 = 1;

        loop {
            if turn > MAX_TURNS {
                return Err(Error::DepthExceeded(MAX_TURNS));
            }

            let user_content = Content::user(input.clone());
            let mut contents = history.clone();
            contents.push(user_content.clone());

            let mut stream = client
                .stream_generate(&self.settings, &self.system_prompt, &contents, &declarations)
                .await?;

            // The first function call of the turn, with the model content
            // that carried it (the whole content goes back into history).
            let mut pending: Option<(FunctionCall, Content)> = None;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;

                let thoughts = chunk.thoughts();
                if !thoughts.is_empty() {
                    let _ = updates.send(AgentUpdate::reasoning(thoughts.join("\n"))).await;
                }
                let text = chunk.text();
                if !text.is_empty() {
                    let _ = updates.send(AgentUpdate::text(text)).await;
                }

                if pending.is_none()
                    && let Some(content) = chunk.first_candidate_content()
                    && let Some(call) = content
                        .parts
                        .iter()
                        .find_map(|part| part.function_call.clone())
                {
                    // One tool execution per turn: extra calls the model
                    // proposed alongside the first are ignored.
                    pending = Some((call, content.clone()));
                }
            }

            let Some((call, model_content)) = pending else {
                return Ok(());
            };

            let key = format!("{}{}", call.name, call.args);
            if !executed.insert(key) {
                // Streams occasionally replay a call they already issued;
                // never run it twice in one invocation.
                return Ok(());
            }

            let response = self.tools.execute(&call.name, call.args.clone()).await;
            let _ = updates
                .send(AgentUpdate::tool_call(ToolCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                    response: response.clone(),
                }))
                .await;

            history.push(user_content);
            history.push(model_content);
            input = vec![Part::function_response(call.name, response)];
            turn += 1;
        }
    }

    async fn run_openai(
        &self,
        conversation: &[Message],
        message: &str,
        attachments: &[Attachment],
        files: &[FileInput],
        updates: mpsc::Sender<AgentUpdate>,
    ) -> Result<()> {
        let client = OpenAiClient::from_settings(&self.settings);

        let tools: Vec<ToolSchema> = self
            .tools
            .declarations()
            .iter()
            .map(ToolSchema::from_declaration)
            .collect();

        let mut messages = history::build_chat_turns(conversation, self.settings.max_history_turns);
        messages.insert(
            0,
            ChatTurn::System {
                content: self.system_prompt.clone(),
            },
        );

        let mut parts = vec![UserPart::text(inputs::compose_user_text(message, attachments))];
        for file in files {
            parts.push(UserPart::image_url(file.data_uri()));
        }
        messages.push(ChatTurn::User {
            content: UserContent::Parts(parts),
        });

        let mut turn: u32 = 0;
        while turn < MAX_TURNS {
            let request = ChatRequest {
                model: self.settings.model.clone(),
                messages: messages.clone(),
                tools: (!tools.is_empty()).then(|| tools.clone()),
                stream: true,
                temperature: self.settings.temperature.unwrap_or(1.0),
                max_tokens: self.settings.max_output_tokens,
            };

            let mut stream = client.stream_chat(&request).await?;

            let mut accumulated = String::new();
            // Keyed by stream index so fragments accumulate in declared order.
            let mut pending: BTreeMap<u32, PendingToolCall> = BTreeMap::new();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                let Some(choice) = chunk.choices.into_iter().next() else {
                    continue;
                };

                if let Some(content) = choice.delta.content
                    && !content.is_empty()
                {
                    accumulated.push_str(&content);
                    let _ = updates.send(AgentUpdate::text(content)).await;
                }

                if let Some(deltas) = choice.delta.tool_calls {
                    for delta in deltas {
                        let entry = pending.entry(delta.index).or_default();
                        if entry.id.is_none() {
                            entry.id = delta.id;
                        }
                        if let Some(function) = delta.function {
                            if let Some(name) = function.name {
                                entry.name.push_str(&name);
                            }
                            if let Some(arguments) = function.arguments {
                                entry.arguments.push_str(&arguments);
                            }
                        }
                    }
                }
            }

            // A turn with no tool calls is the final answer.
            if pending.is_empty() {
                return Ok(());
            }

            let wire_calls: Vec<WireToolCall> = pending
                .values()
                .map(|call| WireToolCall {
                    id: call.id.clone().unwrap_or_default(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect();
            messages.push(ChatTurn::Assistant {
                content: (!accumulated.is_empty()).then(|| accumulated.clone()),
                tool_calls: Some(wire_calls),
            });

            for call in pending.values() {
                let args: serde_json::Value = match serde_json::from_str(&call.arguments) {
                    Ok(args) => args,
                    Err(e) => {
                        // The one recoverable condition: run the tool with
                        // empty arguments instead of aborting the turn.
                        warn!("failed to parse arguments for tool {}: {e}", call.name);
                        serde_json::json!({})
                    }
                };

                let response = self.tools.execute(&call.name, args.clone()).await;
                let _ = updates
                    .send(AgentUpdate::tool_call(ToolCall {
                        name: call.name.clone(),
                        args,
                        response: response.clone(),
                    }))
                    .await;

                messages.push(ChatTurn::Tool {
                    tool_call_id: call.id.clone().unwrap_or_default(),
                    content: response.to_string(),
                });
            }

            turn += 1;
        }

        // Cap reached: stop asking for more work, keep what streamed so far.
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}
