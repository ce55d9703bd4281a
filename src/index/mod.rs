//! 索引模块
//!
//! 嵌入模型与分词器。

pub mod embedding;
pub mod tokenizer;

pub use embedding::{EmbeddingModel, HashingEmbeddingModel, create_embedding_model};
pub use tokenizer::{
    HfTokenizer, Tokenizer, WhitespaceTokenizer, create_tokenizer, truncate_to_token_budget,
};
