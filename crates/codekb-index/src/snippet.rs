//! Snippet types: the unit of knowledge stored in a codekb namespace.
//!
//! A snippet is one top-level function or class definition together with
//! its exact source text. Snippets are produced by the extractor, written
//! to `snippets.json`, embedded by the index builder and returned by the
//! query engine.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The kind of definition a snippet was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetKind {
    /// A function (sync or async)
    Function,
    /// A class, or a type definition in languages without classes
    Class,
}

impl SnippetKind {
    /// Returns the string representation used in snippet files and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            SnippetKind::Function => "function",
            SnippetKind::Class => "class",
        }
    }
}

impl std::fmt::Display for SnippetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A code snippet extracted from a source file.
///
/// Serialized with the field names `type`, `name`, `file_path`, `category`
/// and `code`. `id`, `start_line` and `end_line` default when absent so that
/// snippet files written without them still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Whether this is a function or a class
    #[serde(rename = "type")]
    pub kind: SnippetKind,

    /// The definition's name
    pub name: String,

    /// Path of the source file, as reached from the scan root
    pub file_path: String,

    /// Category labels attached at scan time
    #[serde(default)]
    pub category: Vec<String>,

    /// Source text from the first to the last line of the definition
    pub code: String,

    /// Stable identifier, the join key between index slots and metadata
    #[serde(default)]
    pub id: String,

    /// Starting line number (1-indexed)
    #[serde(default)]
    pub start_line: usize,

    /// Ending line number (1-indexed, inclusive)
    #[serde(default)]
    pub end_line: usize,
}

impl Snippet {
    /// Create a new snippet and compute its id.
    pub fn new(
        kind: SnippetKind,
        name: impl Into<String>,
        file_path: impl Into<String>,
        start_line: usize,
        end_line: usize,
        code: impl Into<String>,
    ) -> Self {
        let mut snippet = Self {
            kind,
            name: name.into(),
            file_path: file_path.into(),
            category: Vec::new(),
            code: code.into(),
            id: String::new(),
            start_line,
            end_line,
        };
        snippet.id = snippet.compute_id();
        snippet
    }

    /// Attach category labels.
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.category = categories;
        self
    }

    /// Whether the snippet carries the given category label.
    pub fn has_category(&self, label: &str) -> bool {
        self.category.iter().any(|c| c == label)
    }

    /// Derive the stable id from location and content.
    ///
    /// First 16 hex characters of SHA-256 over file path, name, start line
    /// and code, each field NUL-terminated.
    pub fn compute_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.file_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.name.as_bytes());
        hasher.update([0u8]);
        hasher.update((self.start_line as u64).to_le_bytes());
        hasher.update([0u8]);
        hasher.update(self.code.as_bytes());
        let digest = hasher.finalize();
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Returns a location string for display (file:line-line).
    pub fn location(&self) -> String {
        if self.start_line == 0 {
            return self.file_path.clone();
        }
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_kind_as_str() {
        assert_eq!(SnippetKind::Function.as_str(), "function");
        assert_eq!(SnippetKind::Class.to_string(), "class");
    }

    #[test]
    fn test_snippet_creation() {
        let snippet = Snippet::new(
            SnippetKind::Function,
            "parse_config",
            "pkg/config.py",
            10,
            25,
            "def parse_config(path):\n    ...",
        )
        .with_categories(vec!["config".to_string()]);

        assert_eq!(snippet.name, "parse_config");
        assert_eq!(snippet.location(), "pkg/config.py:10-25");
        assert!(snippet.has_category("config"));
        assert!(!snippet.has_category("conf"));
        assert_eq!(snippet.id.len(), 16);
    }

    #[test]
    fn test_snippet_id_is_stable_and_content_sensitive() {
        let a = Snippet::new(SnippetKind::Function, "f", "a.py", 1, 1, "def f(): pass");
        let b = Snippet::new(SnippetKind::Function, "f", "a.py", 1, 1, "def f(): pass");
        let moved = Snippet::new(SnippetKind::Function, "f", "a.py", 3, 3, "def f(): pass");
        let edited = Snippet::new(SnippetKind::Function, "f", "a.py", 1, 1, "def f(): return");

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, moved.id);
        assert_ne!(a.id, edited.id);
    }

    #[test]
    fn test_categories_do_not_change_id() {
        let plain = Snippet::new(SnippetKind::Class, "A", "a.py", 1, 2, "class A:\n    pass");
        let tagged = plain.clone().with_categories(vec!["models".to_string()]);
        assert_eq!(plain.id, tagged.id);
    }

    #[test]
    fn test_snippet_json_field_names() {
        let snippet = Snippet::new(SnippetKind::Class, "Greeter", "g.py", 1, 2, "class Greeter:\n    pass");
        let value = serde_json::to_value(&snippet).expect("serialize");

        assert_eq!(value["type"], "class");
        assert_eq!(value["name"], "Greeter");
        assert_eq!(value["file_path"], "g.py");
        assert_eq!(value["category"], serde_json::json!([]));
        assert_eq!(value["code"], "class Greeter:\n    pass");
    }

    #[test]
    fn test_snippet_loads_without_optional_fields() {
        let json = r#"{
            "type": "function",
            "name": "f",
            "file_path": "x.py",
            "category": ["utils"],
            "code": "def f(x): return x"
        }"#;
        let snippet: Snippet = serde_json::from_str(json).expect("deserialize");

        assert_eq!(snippet.kind, SnippetKind::Function);
        assert_eq!(snippet.category, vec!["utils"]);
        assert!(snippet.id.is_empty());
        assert_eq!(snippet.location(), "x.py");
    }
}
