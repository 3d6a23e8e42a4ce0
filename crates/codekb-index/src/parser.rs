//! Tree-sitter based multi-language parser.
//!
//! This module provides the parsing infrastructure for extracting snippets
//! from source code. Grammars and definition queries are compiled lazily,
//! so a scan over a pure-Python tree never pays for the Rust grammar.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use thiserror::Error;

use crate::lang;

/// Errors that can occur during parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse source code")]
    ParseFailed,

    #[error("Syntax error near line {line}")]
    SyntaxError { line: usize },

    #[error("Failed to set parser language: {0}")]
    LanguageError(String),

    #[error("Failed to compile query: {0}")]
    QueryError(String),
}

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Rust,
}

impl Language {
    /// All languages the parser knows about.
    pub const ALL: [Language; 2] = [Language::Python, Language::Rust];

    /// Detect language from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" => Some(Language::Python),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    /// Detect language from file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the tree-sitter language for this language.
    pub fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }

    /// Get file extensions associated with this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py", "pyi"],
            Language::Rust => &["rs"],
        }
    }

    /// Node kinds the grammar accepts but the current language version does
    /// not. Python 2 `print` and `exec` statements still parse cleanly.
    pub fn rejected_node_kinds(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["print_statement", "exec_statement"],
            Language::Rust => &[],
        }
    }

    /// Get the display name for this language.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Rust => "Rust",
        }
    }
}

/// Configuration for a language including its definitions query.
pub struct LanguageConfig {
    /// The tree-sitter language.
    pub language: tree_sitter::Language,
    /// Query matching top-level function and class definitions.
    pub definitions_query: tree_sitter::Query,
}

impl LanguageConfig {
    /// Create a new language configuration.
    pub fn new(lang: Language) -> Result<Self, ParseError> {
        let ts_lang = lang.tree_sitter_language();
        let query_source = Self::get_definitions_query(lang);

        let definitions_query = tree_sitter::Query::new(&ts_lang, query_source)
            .map_err(|e| ParseError::QueryError(e.to_string()))?;

        Ok(Self {
            language: ts_lang,
            definitions_query,
        })
    }

    fn get_definitions_query(lang: Language) -> &'static str {
        match lang {
            Language::Python => lang::python::DEFINITIONS_QUERY,
            Language::Rust => lang::rust::DEFINITIONS_QUERY,
        }
    }
}

/// Lazily initialized language configuration.
///
/// Uses `OnceLock` to defer query compilation until first use.
pub struct LazyLanguageConfig {
    language: Language,
    config: OnceLock<Result<LanguageConfig, String>>,
}

impl LazyLanguageConfig {
    /// Create a new lazy config for the given language.
    pub fn new(language: Language) -> Self {
        Self {
            language,
            config: OnceLock::new(),
        }
    }

    /// Get the configuration, initializing if needed.
    pub fn get(&self) -> Result<&LanguageConfig, ParseError> {
        self.config
            .get_or_init(|| LanguageConfig::new(self.language).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| ParseError::QueryError(e.clone()))
    }
}

/// A parsed source file with its AST.
pub struct ParsedFile {
    /// The language of the source file.
    pub language: Language,
    /// The tree-sitter syntax tree.
    pub tree: tree_sitter::Tree,
    /// The source code (owned for lifetime management).
    pub source: String,
}

impl ParsedFile {
    /// Get the root node of the syntax tree.
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Get the source code as bytes.
    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    /// Get text for a node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(self.source_bytes()).unwrap_or("")
    }
}

/// Multi-language source code parser.
///
/// Rejects sources the grammar cannot parse cleanly: tree-sitter recovers
/// from syntax errors by inserting error nodes, and a tree containing any of
/// them is reported as [`ParseError::SyntaxError`].
pub struct Parser {
    ts_parser: tree_sitter::Parser,
    configs: HashMap<Language, LazyLanguageConfig>,
}

impl Parser {
    /// Create a new parser with all supported languages.
    pub fn new() -> Self {
        let configs = Language::ALL
            .into_iter()
            .map(|lang| (lang, LazyLanguageConfig::new(lang)))
            .collect();

        Self {
            ts_parser: tree_sitter::Parser::new(),
            configs,
        }
    }

    /// Parse a file from the filesystem.
    ///
    /// Files that are not valid UTF-8 fail with [`ParseError::IoError`].
    pub fn parse_file(&mut self, path: &Path) -> Result<ParsedFile, ParseError> {
        let language = Language::from_path(path).ok_or_else(|| {
            ParseError::UnsupportedExtension(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            )
        })?;

        let source = std::fs::read_to_string(path)?;
        self.parse_source(&source, language)
    }

    /// Parse source code string with a specified language.
    pub fn parse_source(
        &mut self,
        source: &str,
        language: Language,
    ) -> Result<ParsedFile, ParseError> {
        let config = self.get_config(language)?;
        let ts_language = config.language.clone();

        self.ts_parser
            .set_language(&ts_language)
            .map_err(|e| ParseError::LanguageError(e.to_string()))?;

        let tree = self
            .ts_parser
            .parse(source, None)
            .ok_or(ParseError::ParseFailed)?;

        if tree.root_node().has_error() {
            let line = first_error_line(tree.root_node()).unwrap_or(1);
            return Err(ParseError::SyntaxError { line });
        }
        if let Some(line) = first_line_of_kind(tree.root_node(), language.rejected_node_kinds()) {
            return Err(ParseError::SyntaxError { line });
        }

        Ok(ParsedFile {
            language,
            tree,
            source: source.to_string(),
        })
    }

    /// Get the language configuration for a language.
    pub fn get_config(&self, language: Language) -> Result<&LanguageConfig, ParseError> {
        self.configs
            .get(&language)
            .ok_or_else(|| ParseError::UnsupportedExtension(language.name().to_string()))?
            .get()
    }

    /// Check if a file extension is supported.
    pub fn supports_extension(ext: &str) -> bool {
        Language::from_extension(ext).is_some()
    }

    /// Get all supported extensions.
    pub fn supported_extensions() -> Vec<&'static str> {
        let mut exts = Vec::new();
        for lang in Language::ALL {
            exts.extend_from_slice(lang.extensions());
        }
        exts
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the 1-indexed line of the first error or missing node.
fn first_error_line(node: tree_sitter::Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(line) = first_error_line(child) {
                return Some(line);
            }
        }
    }
    None
}

/// Find the 1-indexed line of the first node whose kind is in `kinds`.
fn first_line_of_kind(node: tree_sitter::Node, kinds: &[&str]) -> Option<usize> {
    if kinds.is_empty() {
        return None;
    }
    if kinds.contains(&node.kind()) {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(line) = first_line_of_kind(child, kinds) {
            return Some(line);
        }
    }
    None
}
