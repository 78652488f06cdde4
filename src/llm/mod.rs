pub mod chat;
pub mod embeddings;
pub mod semantic_search;

pub use chat::Assistant;
pub use embeddings::EmbeddingGenerator;
pub use semantic_search::{KnowledgeRetriever, PassageIndex};
