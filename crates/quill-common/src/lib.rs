pub mod chat;
pub mod error;

pub use chat::{Attachment, Message, Sender, ToolCall};
pub use error::{Error, Result};
