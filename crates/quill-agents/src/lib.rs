pub mod agent;
pub mod history;
pub mod inputs;
pub mod model;
pub mod providers;
pub mod schema;
pub mod tools;

pub use agent::{Agent, AgentUpdate, MAX_TURNS};
pub use inputs::FileInput;
pub use model::call_model;
pub use schema::{FunctionDeclaration, Schema, SchemaType};
pub use tools::{Tool, ToolRegistry};
