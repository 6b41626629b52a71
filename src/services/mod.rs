pub mod completion;
pub mod rag;

pub use completion::{CompletionError, CompletionModel, GeminiChat};
pub use rag::RagEngine;
