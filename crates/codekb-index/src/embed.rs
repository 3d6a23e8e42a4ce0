//! Text embedding backends.
//!
//! An [`Embedder`] turns snippet code and queries into fixed-dimension
//! vectors. The model is chosen once, from configuration, and the same
//! model must be used to build an index and to query it.
//!
//! Two backends exist:
//! - `fastembed`: local ONNX sentence-embedding models (cargo feature
//!   `fastembed`), default `all-MiniLM-L6-v2`
//! - `hash`: deterministic feature hashing, needs no model download

use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// Default sentence-embedding model.
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Default dimension for the hash backend.
pub const DEFAULT_HASH_DIMENSION: usize = 384;

/// Default number of texts per embedding batch.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Errors from embedding backends.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("Unknown embedding backend: {0}")]
    UnknownBackend(String),
    #[error("Unknown embedding model: {0}")]
    UnknownModel(String),
    #[error("Embedding backend '{0}' is not compiled into this build")]
    BackendUnavailable(String),
    #[error("Embedding model error: {0}")]
    Model(String),
    #[error("Embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("Invalid embedding dimension: {0}")]
    InvalidDimension(usize),
}

pub type Result<T> = std::result::Result<T, EmbedError>;

/// Produces embeddings for batches of text.
pub trait Embedder {
    /// Identifier of the model, stored alongside the index.
    fn model_id(&self) -> &str;

    /// Embed a batch of texts. Implementations return one vector per text,
    /// in input order.
    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or(EmbedError::CountMismatch {
                expected: 1,
                actual: 0,
            })
    }
}

/// Embed `texts` and check that exactly one vector came back per text.
pub fn embed_all(embedder: &mut dyn Embedder, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
    let vectors = embedder.embed_batch(texts)?;
    if vectors.len() != texts.len() {
        return Err(EmbedError::CountMismatch {
            expected: texts.len(),
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}

/// Which embedding implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedBackend {
    FastEmbed,
    Hash,
}

impl EmbedBackend {
    /// Parse a backend name as written in configuration.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "fastembed" => Ok(EmbedBackend::FastEmbed),
            "hash" => Ok(EmbedBackend::Hash),
            other => Err(EmbedError::UnknownBackend(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedBackend::FastEmbed => "fastembed",
            EmbedBackend::Hash => "hash",
        }
    }
}

/// Settings needed to construct an embedder.
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub backend: EmbedBackend,
    /// Model name (fastembed backend).
    pub model: String,
    /// Vector dimension (hash backend).
    pub dimension: usize,
    pub batch_size: usize,
    /// Where downloaded model files are cached (fastembed backend).
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            backend: EmbedBackend::FastEmbed,
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_HASH_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
            cache_dir: None,
        }
    }
}

/// Build the embedder described by `config`.
pub fn build_embedder(config: &EmbedderConfig) -> Result<Box<dyn Embedder>> {
    tracing::debug!(
        "Building {} embedder (model: {})",
        config.backend.as_str(),
        config.model
    );
    match config.backend {
        EmbedBackend::Hash => Ok(Box::new(HashEmbedder::new(config.dimension)?)),
        #[cfg(feature = "fastembed")]
        EmbedBackend::FastEmbed => Ok(Box::new(FastEmbedder::new(
            &config.model,
            config.cache_dir.clone(),
            config.batch_size,
        )?)),
        #[cfg(not(feature = "fastembed"))]
        EmbedBackend::FastEmbed => Err(EmbedError::BackendUnavailable("fastembed".to_string())),
    }
}

// ============================================================================
// HashEmbedder
// ============================================================================

/// Deterministic feature-hashing embedder.
///
/// Lower-cased word tokens, token bigrams and character trigrams are hashed
/// with SHA-256 into a signed bucket; the result is L2-normalized. Equal
/// texts always produce equal vectors, so an exact-code query finds its
/// snippet at distance zero.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::InvalidDimension(dimension));
        }
        Ok(Self {
            dimension,
            model_id: format!("hash-v1:{}", dimension),
        })
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let normalized = text.to_lowercase();

        let tokens: Vec<&str> = normalized
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
            .collect();
        for token in &tokens {
            self.add_feature(&mut vector, "t", token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, "b", &format!("{}_{}", pair[0], pair[1]), 0.8);
        }

        let compact: Vec<char> = normalized.chars().filter(|c| !c.is_whitespace()).collect();
        for trigram in compact.windows(3) {
            let trigram: String = trigram.iter().collect();
            self.add_feature(&mut vector, "c", &trigram, 0.15);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], namespace: &str, feature: &str, weight: f32) {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update(b":");
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();

        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let idx = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[idx] += sign * weight;
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

// ============================================================================
// FastEmbedder
// ============================================================================

/// Map a configured model name to a fastembed model.
#[cfg(feature = "fastembed")]
fn fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    use fastembed::EmbeddingModel;

    let trimmed = name
        .trim()
        .trim_start_matches("sentence-transformers/")
        .trim_start_matches("BAAI/");
    match trimmed.to_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
        _ => Err(EmbedError::UnknownModel(name.to_string())),
    }
}

/// Sentence-embedding model run locally through fastembed.
///
/// The model is downloaded on first use into the cache directory.
#[cfg(feature = "fastembed")]
pub struct FastEmbedder {
    model: fastembed::TextEmbedding,
    model_id: String,
    batch_size: usize,
}

#[cfg(feature = "fastembed")]
impl FastEmbedder {
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>, batch_size: usize) -> Result<Self> {
        use fastembed::{InitOptions, TextEmbedding};

        let mut options =
            InitOptions::new(fastembed_model(model_name)?).with_show_download_progress(true);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        tracing::info!("Loading embedding model {}", model_name);
        let model = TextEmbedding::try_new(options).map_err(|e| EmbedError::Model(e.to_string()))?;

        Ok(Self {
            model,
            model_id: model_name.to_string(),
            batch_size: batch_size.max(1),
        })
    }
}

#[cfg(feature = "fastembed")]
impl Embedder for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbedError::Model(e.to_string()))
    }
}
