//! ragdb-text
//!
//! Keyword retrieval over the chunk corpus: a script-aware tokenizer for
//! text without word boundaries and an in-memory BM25 index built on tantivy.
pub mod index;
pub mod tokenize;

pub use index::LexicalIndex;
pub use tokenize::{script_aware_analyzer, tokenize, ScriptAwareTokenizer};
