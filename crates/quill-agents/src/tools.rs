//! The function-executor seam: the capability trait tools implement and the
//! registry the turn loops execute them through.

use async_trait::async_trait;
use quill_common::Result;
use serde_json::{Value, json};
use tracing::info;

use crate::schema::FunctionDeclaration;

/// A capability the model can invoke by name. Responses are opaque
/// structured values serialized verbatim into tool-result turns.
#[async_trait]
pub trait Tool: Send + Sync {
    fn declaration(&self) -> FunctionDeclaration;

    async fn execute(&self, args: Value) -> Result<Value>;
}

/// Ordered collection of registered tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        info!("registered tool: {}", tool.declaration().name);
        self.tools.push(tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools.iter().map(|t| t.declaration()).collect()
    }

    fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.declaration().name == name)
            .map(|t| t.as_ref())
    }

    /// Execute a call by name. Unknown tools and failing tools yield a
    /// structured error response rather than aborting the invocation; the
    /// model sees the failure and can react to it.
    pub async fn execute(&self, name: &str, args: Value) -> Value {
        match self.find(name) {
            Some(tool) => tool
                .execute(args)
                .await
                .unwrap_or_else(|e| json!({ "error": e.to_string() })),
            None => json!({ "error": format!("unknown tool: {name}") }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use quill_common::Error;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn declaration(&self) -> FunctionDeclaration {
            FunctionDeclaration {
                name: "echo".to_string(),
                description: "Echo the arguments back".to_string(),
                parameters: Schema::object([("text", Schema::string("Text to echo"))]),
            }
        }

        async fn execute(&self, args: Value) -> Result<Value> {
            Ok(json!({ "echo": args }))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Tool for AlwaysFails {
        fn declaration(&self) -> FunctionDeclaration {
            FunctionDeclaration {
                name: "broken".to_string(),
                description: "Always fails".to_string(),
                parameters: Schema::object([]),
            }
        }

        async fn execute(&self, _args: Value) -> Result<Value> {
            Err(Error::Unexpected("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn executes_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo));

        let response = registry.execute("echo", json!({"text": "hi"})).await;
        assert_eq!(response["echo"]["text"], "hi");
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_response() {
        let registry = ToolRegistry::new();
        let response = registry.execute("missing", json!({})).await;
        assert_eq!(response["error"], "unknown tool: missing");
    }

    #[tokio::test]
    async fn failing_tool_yields_error_response() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(AlwaysFails));

        let response = registry.execute("broken", json!({})).await;
        assert!(response["error"].as_str().unwrap().contains("boom"));
    }
}
