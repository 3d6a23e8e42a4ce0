//! On-disk layout of a knowledge-base namespace.
//!
//! A namespace is one directory holding every file that belongs to a user:
//!
//! - `snippets.json` - output of the last scan
//! - `categories.json` - the user's category labels
//! - `faiss.index` - flat vector index (see [`crate::index`])
//! - `meta.json` - snippets in index build order
//!
//! All files are read and written whole. There is no locking: two
//! processes writing the same namespace race and the last writer wins.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::snippet::Snippet;

/// Scan output file name.
pub const SNIPPETS_FILE: &str = "snippets.json";
/// Category list file name.
pub const CATEGORIES_FILE: &str = "categories.json";
/// Vector index file name.
pub const INDEX_FILE: &str = "faiss.index";
/// Index metadata file name.
pub const META_FILE: &str = "meta.json";

/// Error type for namespace storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid namespace name: {0:?}")]
    InvalidNamespace(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A per-user directory holding one knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    root: PathBuf,
}

impl Namespace {
    /// Use an explicit directory as namespace.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Namespace for `name` under `data_dir`.
    ///
    /// The name becomes a directory component, so it must be non-empty,
    /// free of path separators and not `.` or `..`.
    pub fn for_user(data_dir: &Path, name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self::new(data_dir.join(name)))
    }

    /// Create the namespace directory if it does not exist.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| StoreError::io(&self.root, e))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snippets_path(&self) -> PathBuf {
        self.root.join(SNIPPETS_FILE)
    }

    pub fn categories_path(&self) -> PathBuf {
        self.root.join(CATEGORIES_FILE)
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.root.join(META_FILE)
    }

    /// Whether a scan has been saved.
    pub fn has_snippets(&self) -> bool {
        self.snippets_path().exists()
    }

    /// Whether both knowledge-base files exist.
    pub fn has_knowledge_base(&self) -> bool {
        self.index_path().exists() && self.meta_path().exists()
    }
}

/// Check that a namespace name is usable as a single directory component.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        return Err(StoreError::InvalidNamespace(name.to_string()));
    }
    Ok(())
}

/// Write `value` as pretty-printed UTF-8 JSON, replacing the file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| StoreError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    writer.flush().map_err(|e| StoreError::io(path, e))
}

/// Read a JSON file into `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| StoreError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save a snippet list.
pub fn save_snippets(path: &Path, snippets: &[Snippet]) -> Result<()> {
    write_json(path, snippets)?;
    tracing::debug!("Saved {} snippets to {}", snippets.len(), path.display());
    Ok(())
}

/// Load a snippet list.
pub fn load_snippets(path: &Path) -> Result<Vec<Snippet>> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snippet::SnippetKind;
    use tempfile::tempdir;

    #[test]
    fn test_namespace_paths() {
        let ns = Namespace::for_user(Path::new("/data"), "alice").unwrap();
        assert_eq!(ns.root(), Path::new("/data/alice"));
        assert_eq!(ns.snippets_path(), PathBuf::from("/data/alice/snippets.json"));
        assert_eq!(ns.categories_path(), PathBuf::from("/data/alice/categories.json"));
        assert_eq!(ns.index_path(), PathBuf::from("/data/alice/faiss.index"));
        assert_eq!(ns.meta_path(), PathBuf::from("/data/alice/meta.json"));
    }

    #[test]
    fn test_invalid_namespace_names() {
        for name in ["", "  ", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(
                    Namespace::for_user(Path::new("/data"), name),
                    Err(StoreError::InvalidNamespace(_))
                ),
                "{name:?} should be rejected"
            );
        }
        assert!(Namespace::for_user(Path::new("/data"), "bob.smith").is_ok());
    }

    #[test]
    fn test_snippets_roundtrip_keeps_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SNIPPETS_FILE);
        let snippets = vec![
            Snippet::new(SnippetKind::Function, "zeta", "b.py", 1, 2, "def zeta():\n    pass")
                .with_categories(vec!["数据".to_string()]),
            Snippet::new(SnippetKind::Class, "Alpha", "a.py", 5, 9, "class Alpha:\n    pass"),
        ];

        save_snippets(&path, &snippets).unwrap();
        let loaded = load_snippets(&path).unwrap();

        assert_eq!(loaded, snippets);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("数据"), "non-ASCII labels are written verbatim");
    }

    #[test]
    fn test_missing_snippets_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = load_snippets(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }

    #[test]
    fn test_truncated_json_is_json_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SNIPPETS_FILE);
        std::fs::write(&path, "[{\"type\": \"function\", \"na").unwrap();
        assert!(matches!(load_snippets(&path), Err(StoreError::Json { .. })));
    }

    #[test]
    fn test_namespace_presence_checks() {
        let dir = tempdir().unwrap();
        let ns = Namespace::new(dir.path().join("user"));
        ns.ensure().unwrap();
        assert!(!ns.has_snippets());
        assert!(!ns.has_knowledge_base());

        std::fs::write(ns.index_path(), b"").unwrap();
        assert!(!ns.has_knowledge_base(), "index alone is not a knowledge base");
        std::fs::write(ns.meta_path(), b"[]").unwrap();
        assert!(ns.has_knowledge_base());
    }
}
