//! codekb-index: personal code knowledge base
//!
//! This crate provides the library side of codekb:
//! - Snippet extraction from source trees via tree-sitter
//! - Text embedding backends
//! - Flat vector index with on-disk format
//! - Knowledge-base build, load and semantic search
//! - Per-user namespaces and category labels

pub mod builder;
pub mod categories;
pub mod embed;
pub mod extractor;
pub mod index;
pub mod lang;
pub mod parser;
pub mod query;
pub mod snippet;
pub mod store;

pub use builder::{BuildError, BuildStats, KnowledgeBase};
pub use categories::CategoryStore;
pub use embed::{EmbedBackend, EmbedError, Embedder, EmbedderConfig, HashEmbedder, build_embedder};
#[cfg(feature = "fastembed")]
pub use embed::FastEmbedder;
pub use extractor::{Extractor, ScanConfig, ScanError, ScanOutput, ScanStats};
pub use index::{FlatIndex, Hit, IndexError};
pub use parser::{Language, ParseError, ParsedFile, Parser};
pub use query::{DEFAULT_TOP_K, QueryEngine, QueryError, SearchRequest, SearchResult};
pub use snippet::{Snippet, SnippetKind};
pub use store::{Namespace, StoreError, load_snippets, save_snippets};
