//! Converts the caller-owned conversation log into provider-native history.
//!
//! Both builders skip error messages and truncate to the last
//! `2 × max_history_turns` entries; zero configured turns means no prior
//! context is sent at all.

use quill_common::{Message, Sender};
use serde::Serialize;

use crate::providers::gemini::{Content, FunctionCall, Part};

/// Role-tagged wire record for OpenAI-compatible endpoints. A closed set so
/// the flattening below stays exhaustive.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatTurn {
    System {
        content: String,
    },
    User {
        content: UserContent,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<WireToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Parts(Vec<UserPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl UserPart {
    pub fn text(text: impl Into<String>) -> Self {
        UserPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        UserPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireFunctionCall {
    pub name: String,
    pub arguments: String,
}

fn select_window(conversation: &[Message], max_history_turns: usize) -> &[Message] {
    let keep_from = conversation.len().saturating_sub(max_history_turns * 2);
    &conversation[keep_from..]
}

/// Flatten the conversation into OpenAI-compatible role-tagged messages.
///
/// Original call identifiers are not persisted on the log, so stored tool
/// calls are re-emitted with synthetic `call_<index>` ids: an assistant turn
/// carrying the calls followed by one tool-result turn per call, in order.
/// The reconstruction is lossy but consistent within each message.
pub fn build_chat_turns(conversation: &[Message], max_history_turns: usize) -> Vec<ChatTurn> {
    if max_history_turns == 0 {
        return Vec::new();
    }

    let mut history = Vec::new();
    for msg in select_window(conversation, max_history_turns) {
        match msg.sender {
            Sender::Error => continue,
            Sender::User => history.push(ChatTurn::User {
                content: UserContent::Text(msg.content.clone()),
            }),
            Sender::Assistant => {
                if msg.tool_calls.is_empty() {
                    history.push(ChatTurn::Assistant {
                        content: Some(msg.content.clone()),
                        tool_calls: None,
                    });
                } else {
                    let calls = msg
                        .tool_calls
                        .iter()
                        .enumerate()
                        .map(|(idx, call)| WireToolCall {
                            id: format!("call_{idx}"),
                            kind: "function".to_string(),
                            function: WireFunctionCall {
                                name: call.name.clone(),
                                arguments: call.args.to_string(),
                            },
                        })
                        .collect();

                    history.push(ChatTurn::Assistant {
                        content: (!msg.content.is_empty()).then(|| msg.content.clone()),
                        tool_calls: Some(calls),
                    });

                    for (idx, call) in msg.tool_calls.iter().enumerate() {
                        history.push(ChatTurn::Tool {
                            tool_call_id: format!("call_{idx}"),
                            content: call.response.to_string(),
                        });
                    }
                }
            }
        }
    }
    history
}

/// Build Gemini-native history. Stored tool calls re-emit as a model turn
/// with `functionCall` parts followed by a user turn with `functionResponse`
/// parts, mirroring the shape the API produced them in.
pub fn build_contents(conversation: &[Message], max_history_turns: usize) -> Vec<Content> {
    if max_history_turns == 0 {
        return Vec::new();
    }

    let mut contents = Vec::new();
    for msg in select_window(conversation, max_history_turns) {
        match msg.sender {
            Sender::Error => continue,
            Sender::User => contents.push(Content::user(vec![Part::text(msg.content.clone())])),
            Sender::Assistant => {
                if msg.tool_calls.is_empty() {
                    contents.push(Content::model(vec![Part::text(msg.content.clone())]));
                } else {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(Part::text(msg.content.clone()));
                    }
                    for call in &msg.tool_calls {
                        parts.push(Part {
                            function_call: Some(FunctionCall {
                                name: call.name.clone(),
                                args: call.args.clone(),
                            }),
                            ..Part::default()
                        });
                    }
                    contents.push(Content::model(parts));

                    let responses = msg
                        .tool_calls
                        .iter()
                        .map(|call| Part::function_response(call.name.clone(), call.response.clone()))
                        .collect();
                    contents.push(Content::user(responses));
                }
            }
        }
    }
    contents
}
