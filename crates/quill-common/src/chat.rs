use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    /// Failure messages surfaced to the user; never forwarded to a provider.
    Error,
}

/// A function call the model issued, together with the response the executor
/// produced for it. Immutable once recorded; kept on the message for display
/// and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: serde_json::Value,
    pub response: serde_json::Value,
}

/// One entry of the caller-owned conversation log. The agent loop reads the
/// log once at invocation start and builds its own provider-native working
/// history from it; the caller's copy is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            content: content.into(),
            tool_calls: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content)
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// Reference to a note attached to the outgoing user turn. Only the path is
/// sent; rendering the content is up to the tools the model may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub path: String,
}

impl Attachment {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}
