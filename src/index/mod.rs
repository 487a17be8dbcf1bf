//! 索引模块
//!
//! 嵌入模型、内存向量索引与片段语料。

pub mod embedding;
pub mod snippet;
pub mod vector;

pub use embedding::{EmbeddingModel, HashingEmbeddingModel, OllamaEmbeddingModel, create_embedding_model};
pub use snippet::{SnippetCorpus, SnippetIndex, SnippetSearch};
pub use vector::{ScoredSnippet, SnippetVectorIndex};
