//! Knowledge-base construction and loading.
//!
//! This module turns a snippet list into a vector index plus metadata,
//! writes both to a namespace and reads them back. The index holds one
//! vector per snippet, in snippet order, tagged with the snippet id.

use std::collections::HashMap;
use std::time::Instant;

use crate::embed::{EmbedError, Embedder, embed_all};
use crate::index::{FlatIndex, Hit, IndexError};
use crate::snippet::Snippet;
use crate::store::{self, Namespace, StoreError};

/// Error type for knowledge-base operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Embedding error: {0}")]
    Embed(#[from] EmbedError),
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("No snippets to index")]
    NoSnippets,
    #[error("Embedder returned an empty vector")]
    EmptyVector,
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Statistics from a build operation.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Number of vectors written to the index.
    pub vectors: usize,
    /// Dimension of each vector.
    pub dimension: usize,
    /// Time spent embedding in milliseconds.
    pub embed_time_ms: u64,
}

/// A loaded vector index together with its snippet metadata.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    index: FlatIndex,
    metadata: Vec<Snippet>,
    by_id: HashMap<String, usize>,
}

impl KnowledgeBase {
    /// Assemble a knowledge base from an index and its metadata.
    pub fn from_parts(index: FlatIndex, metadata: Vec<Snippet>) -> Self {
        let by_id = metadata
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.id.is_empty())
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        if index.len() != metadata.len() {
            tracing::warn!(
                "Index has {} vectors but metadata has {} entries",
                index.len(),
                metadata.len()
            );
        }
        Self {
            index,
            metadata,
            by_id,
        }
    }

    /// Embed every snippet's code and build an index in snippet order.
    pub fn build(snippets: Vec<Snippet>, embedder: &mut dyn Embedder) -> Result<(Self, BuildStats)> {
        if snippets.is_empty() {
            return Err(BuildError::NoSnippets);
        }

        let start = Instant::now();
        let texts: Vec<&str> = snippets.iter().map(|s| s.code.as_str()).collect();
        let vectors = embed_all(embedder, &texts)?;

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(BuildError::EmptyVector);
        }

        let mut index = FlatIndex::new(dimension, embedder.model_id());
        for (snippet, vector) in snippets.iter().zip(&vectors) {
            index.add(snippet.id.clone(), vector)?;
        }

        let stats = BuildStats {
            vectors: index.len(),
            dimension,
            embed_time_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Built index: {} vectors of dimension {} in {}ms",
            stats.vectors,
            stats.dimension,
            stats.embed_time_ms
        );
        Ok((Self::from_parts(index, snippets), stats))
    }

    /// Write the index, then the metadata, into the namespace.
    pub fn save(&self, ns: &Namespace) -> Result<()> {
        ns.ensure()?;
        let index_path = ns.index_path();
        self.index.save(&index_path).map_err(|e| match e {
            IndexError::Io(source) => BuildError::Store(StoreError::io(&index_path, source)),
            other => BuildError::Index(other),
        })?;
        store::write_json(&ns.meta_path(), &self.metadata)?;
        Ok(())
    }

    /// Read the index and metadata from the namespace.
    pub fn load(ns: &Namespace) -> Result<Self> {
        let index_path = ns.index_path();
        let index = FlatIndex::load(&index_path).map_err(|e| match e {
            IndexError::Io(source) => BuildError::Store(StoreError::io(&index_path, source)),
            other => BuildError::Index(other),
        })?;
        let metadata: Vec<Snippet> = store::read_json(&ns.meta_path())?;
        tracing::debug!(
            "Loaded knowledge base from {} ({} vectors)",
            ns.root().display(),
            index.len()
        );
        Ok(Self::from_parts(index, metadata))
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn metadata(&self) -> &[Snippet] {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Find the snippet an index hit refers to.
    ///
    /// Tries the entry at the hit's position first, then looks the id up.
    /// Entries without an id only match positionally. Returns `None` when
    /// the hit cannot be tied to any metadata entry.
    pub fn resolve(&self, hit: &Hit) -> Option<&Snippet> {
        let positional = self.metadata.get(hit.position);
        if let Some(snippet) = positional.filter(|s| s.id == hit.id) {
            return Some(snippet);
        }
        if hit.id.is_empty() {
            return None;
        }
        self.by_id.get(&hit.id).map(|&i| &self.metadata[i])
    }
}
