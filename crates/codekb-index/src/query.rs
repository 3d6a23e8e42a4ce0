//! Semantic search over a knowledge base.
//!
//! The query is embedded with the same model as the index, the 2×K nearest
//! vectors are fetched, hits are resolved to snippets and the category
//! filter is applied. The filter runs after retrieval, so fewer than K
//! results may come back even when more matching snippets exist.

use crate::builder::KnowledgeBase;
use crate::embed::{EmbedError, Embedder};
use crate::index::IndexError;
use crate::snippet::Snippet;

/// Default number of results.
pub const DEFAULT_TOP_K: usize = 5;

/// Error type for queries.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Embedding error: {0}")]
    Embed(#[from] EmbedError),
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// A search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    pub category: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            category: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Restrict results to one category label. An empty label means no
    /// filter.
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category.filter(|c| !c.is_empty());
        self
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub snippet: Snippet,
    /// Squared L2 distance; lower is closer.
    pub distance: f32,
}

/// Runs searches against a loaded knowledge base.
pub struct QueryEngine<'a> {
    kb: &'a KnowledgeBase,
    embedder: &'a mut dyn Embedder,
}

impl<'a> QueryEngine<'a> {
    pub fn new(kb: &'a KnowledgeBase, embedder: &'a mut dyn Embedder) -> Self {
        if embedder.model_id() != kb.index().model_id() {
            tracing::warn!(
                "Query model '{}' differs from index model '{}'",
                embedder.model_id(),
                kb.index().model_id()
            );
        }
        Self { kb, embedder }
    }

    /// Return up to `top_k` snippets closest to the query, closest first.
    pub fn search(&mut self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        if request.top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_one(&request.query)?;
        let hits = self
            .kb
            .index()
            .search(&vector, request.top_k.saturating_mul(2))?;
        tracing::debug!("Query returned {} candidate hits", hits.len());

        let mut results = Vec::with_capacity(request.top_k);
        for hit in &hits {
            let Some(snippet) = self.kb.resolve(hit) else {
                tracing::debug!("Skipping unresolvable hit at position {} ({})", hit.position, hit.id);
                continue;
            };
            let wanted = request.category.as_deref();
            if wanted.is_some_and(|c| !snippet.has_category(c)) {
                continue;
            }
            results.push(SearchResult {
                snippet: snippet.clone(),
                distance: hit.distance,
            });
            if results.len() == request.top_k {
                break;
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::snippet::SnippetKind;

    fn kb() -> KnowledgeBase {
        let snippets = vec![
            Snippet::new(SnippetKind::Function, "load", "io.py", 1, 2, "def load(path):\n    return open(path).read()")
                .with_categories(vec!["io".to_string()]),
            Snippet::new(SnippetKind::Function, "save", "io.py", 4, 5, "def save(path, data):\n    open(path, 'w').write(data)")
                .with_categories(vec!["io".to_string(), "write".to_string()]),
            Snippet::new(SnippetKind::Class, "Vector", "math.py", 1, 3, "class Vector:\n    def norm(self):\n        return 0")
                .with_categories(vec!["math".to_string()]),
        ];
        let mut embedder = HashEmbedder::new(64).unwrap();
        KnowledgeBase::build(snippets, &mut embedder).unwrap().0
    }

    #[test]
    fn test_exact_code_ranks_first() {
        let kb = kb();
        let mut embedder = HashEmbedder::new(64).unwrap();
        let mut engine = QueryEngine::new(&kb, &mut embedder);

        let code = kb.metadata()[2].code.clone();
        let results = engine.search(&SearchRequest::new(code).with_top_k(3)).unwrap();

        assert_eq!(results[0].snippet.name, "Vector");
        assert!(results[0].distance.abs() < 1e-6);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_category_filter() {
        let kb = kb();
        let mut embedder = HashEmbedder::new(64).unwrap();
        let mut engine = QueryEngine::new(&kb, &mut embedder);

        let request = SearchRequest::new("vector norm")
            .with_top_k(3)
            .with_category(Some("io".to_string()));
        let results = engine.search(&request).unwrap();

        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.snippet.has_category("io")));
    }

    #[test]
    fn test_filter_fails_open_within_window() {
        let kb = kb();
        let mut embedder = HashEmbedder::new(64).unwrap();
        let mut engine = QueryEngine::new(&kb, &mut embedder);

        // top_k 1 fetches two candidates; the math snippet ranks first for
        // its own code, so at most one io snippet can survive.
        let code = kb.metadata()[2].code.clone();
        let request = SearchRequest::new(code)
            .with_top_k(1)
            .with_category(Some("io".to_string()));
        let results = engine.search(&request).unwrap();
        assert!(results.len() <= 1);
        assert!(results.iter().all(|r| r.snippet.has_category("io")));
    }

    #[test]
    fn test_empty_category_means_no_filter() {
        let request = SearchRequest::new("x").with_category(Some(String::new()));
        assert_eq!(request.category, None);
    }

    #[test]
    fn test_zero_top_k() {
        let kb = kb();
        let mut embedder = HashEmbedder::new(64).unwrap();
        let mut engine = QueryEngine::new(&kb, &mut embedder);
        assert!(engine.search(&SearchRequest::new("load").with_top_k(0)).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let kb = kb();
        let mut embedder = HashEmbedder::new(8).unwrap();
        let mut engine = QueryEngine::new(&kb, &mut embedder);
        assert!(matches!(
            engine.search(&SearchRequest::new("load")),
            Err(QueryError::Index(IndexError::DimensionMismatch { .. }))
        ));
    }
}
