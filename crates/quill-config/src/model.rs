use serde::{Deserialize, Serialize};

/// Which provider family serves this invocation. Selected once per call;
/// never re-examined mid-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini, the primary provider.
    Google,
    /// OpenRouter's hosted OpenAI-compatible endpoint.
    OpenRouter,
    /// A local OpenAI-compatible endpoint (e.g. Ollama).
    Local,
}

/// Reasoning-effort hint, forwarded to Gemini only for model ids containing
/// "3" and only when not left at the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    #[default]
    Default,
    Low,
    High,
}

/// Immutable settings snapshot taken once per invocation. `None` (or
/// `ThinkingLevel::Default`) means "use the provider's own default": a
/// setting is only put on the wire when it differs from its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderKind,
    pub model: String,
    pub google_api_key: String,
    pub open_router_api_key: String,
    pub local_model_url: String,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub thinking_level: ThinkingLevel,
    /// How many prior turns of the conversation are replayed to the
    /// provider. Zero sends no prior context at all.
    pub max_history_turns: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Google,
            model: "gemini-2.5-flash".to_string(),
            google_api_key: String::new(),
            open_router_api_key: String::new(),
            local_model_url: "http://localhost:11434/v1".to_string(),
            temperature: None,
            max_output_tokens: None,
            thinking_level: ThinkingLevel::Default,
            max_history_turns: 5,
        }
    }
}

impl Settings {
    /// Local endpoint base URL with any trailing path separator stripped, so
    /// route concatenation never produces `//chat/completions`.
    pub fn local_base_url(&self) -> &str {
        self.local_model_url.trim_end_matches('/')
    }

    /// Thinking level is a Gemini 3 family knob; older models reject it.
    pub fn effective_thinking_level(&self) -> Option<ThinkingLevel> {
        if self.model.contains('3') && self.thinking_level != ThinkingLevel::Default {
            Some(self.thinking_level)
        } else {
            None
        }
    }
}
