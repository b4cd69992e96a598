pub mod loader;
pub mod model;

pub use loader::load_settings;
pub use model::{ProviderKind, Settings, ThinkingLevel};
