pub mod backend;
pub mod local;
pub mod openai;
pub mod traits;
pub mod utils;

pub use backend::{create_provider, BackendKind};
pub use traits::{complete_json, CompletionProvider, GenerationOptions};
