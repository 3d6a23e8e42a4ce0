//! Snippet extraction from source trees.
//!
//! The extractor walks a directory, parses every file with a recognized
//! extension and turns each top-level function or class into a
//! [`Snippet`]. A file that cannot be read or parsed is skipped; a scan
//! never fails because of one bad file.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ignore::WalkBuilder;

use crate::lang::{self, Definition};
use crate::parser::{Language, ParseError, Parser};
use crate::snippet::Snippet;

/// Error type for scan operations.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Scan root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Which files a scan visits.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to parse (without the dot). Extensions with no
    /// known grammar are ignored.
    pub extensions: Vec<String>,
    /// Honour `.gitignore`, `.ignore` and hidden-file rules.
    pub respect_ignore_files: bool,
    /// Descend into symlinked directories while walking. Symlinked files
    /// are always read.
    pub follow_links: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: Parser::supported_extensions()
                .into_iter()
                .map(String::from)
                .collect(),
            respect_ignore_files: false,
            follow_links: false,
        }
    }
}

impl ScanConfig {
    /// Extensions may be written with or without the leading dot.
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
                    && Parser::supports_extension(ext)
            })
    }
}

/// Statistics from a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Files parsed successfully.
    pub files_scanned: usize,
    /// Files skipped because they could not be read or parsed.
    pub files_skipped: usize,
    /// Snippets emitted.
    pub snippets: usize,
    /// Wall-clock time of the scan in milliseconds.
    pub elapsed_ms: u64,
}

/// Snippets and statistics produced by one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub snippets: Vec<Snippet>,
    pub stats: ScanStats,
}

/// Walks source trees and extracts snippets.
pub struct Extractor {
    parser: Parser,
    config: ScanConfig,
}

impl Extractor {
    /// Create an extractor with the given scan configuration.
    pub fn new(config: ScanConfig) -> Self {
        Self {
            parser: Parser::new(),
            config,
        }
    }

    /// Scan `root` recursively, attaching `categories` to every snippet.
    ///
    /// Files come in directory pre-order: a directory's own files, sorted
    /// by name, precede its subdirectories, also sorted by name. Snippets
    /// within a file keep declaration order, so an unchanged tree always
    /// yields the same list.
    pub fn scan(&mut self, root: &Path, categories: &[String]) -> Result<ScanOutput> {
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let started = Instant::now();
        let mut output = ScanOutput::default();

        for path in self.collect_files(root) {
            match self.extract_file(&path, categories) {
                Ok(snippets) => {
                    tracing::debug!("{}: {} snippets", path.display(), snippets.len());
                    output.stats.files_scanned += 1;
                    output.stats.snippets += snippets.len();
                    output.snippets.extend(snippets);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    output.stats.files_skipped += 1;
                }
            }
        }

        output.stats.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Scanned {} files ({} skipped), {} snippets in {}ms",
            output.stats.files_scanned,
            output.stats.files_skipped,
            output.stats.snippets,
            output.stats.elapsed_ms
        );
        Ok(output)
    }

    /// Parse one file and extract its snippets.
    pub fn extract_file(&mut self, path: &Path, categories: &[String]) -> Result<Vec<Snippet>> {
        let parsed = self.parser.parse_file(path)?;
        let file_path = path.to_string_lossy();
        Ok(self.snippets_from(&parsed, &file_path, categories)?)
    }

    /// Extract snippets from in-memory source.
    pub fn extract_source(
        &mut self,
        source: &str,
        language: Language,
        file_path: &str,
        categories: &[String],
    ) -> Result<Vec<Snippet>> {
        let parsed = self.parser.parse_source(source, language)?;
        Ok(self.snippets_from(&parsed, file_path, categories)?)
    }

    fn snippets_from(
        &self,
        parsed: &crate::parser::ParsedFile,
        file_path: &str,
        categories: &[String],
    ) -> std::result::Result<Vec<Snippet>, ParseError> {
        let config = self.parser.get_config(parsed.language)?;
        let definitions = lang::extract_definitions(parsed, &config.definitions_query);

        Ok(definitions
            .into_iter()
            .map(|Definition { kind, name, start_line, end_line }| {
                let code = lang::line_span(&parsed.source, start_line, end_line);
                Snippet::new(kind, name, file_path, start_line, end_line, code)
                    .with_categories(categories.to_vec())
            })
            .collect())
    }

    /// Collect matching files under `root` in traversal order.
    fn collect_files(&self, root: &Path) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(root)
            .standard_filters(self.config.respect_ignore_files)
            .follow_links(self.config.follow_links)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Walk error under {}: {}", root.display(), e);
                    continue;
                }
            };
            let is_file = entry.file_type().is_some_and(|t| t.is_file())
                || (entry.path_is_symlink() && entry.path().is_file());
            if is_file && self.config.accepts(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort_by(|a, b| traversal_order(a, b));
        files
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

/// Pre-order with files before subdirectories: compare parent directories
/// component-wise (a parent sorts before its own subdirectories), then file
/// names.
fn traversal_order(a: &Path, b: &Path) -> Ordering {
    let parent_a = a.parent().map(|p| p.components().collect::<Vec<_>>());
    let parent_b = b.parent().map(|p| p.components().collect::<Vec<_>>());
    parent_a
        .cmp(&parent_b)
        .then_with(|| a.file_name().cmp(&b.file_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snippet::SnippetKind;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_single_function() {
        let dir = tempdir().unwrap();
        write(dir.path(), "mod.py", "def f(x): return x\n");

        let output = Extractor::default()
            .scan(dir.path(), &["utils".to_string()])
            .expect("scan should succeed");

        assert_eq!(output.snippets.len(), 1);
        let snippet = &output.snippets[0];
        assert_eq!(snippet.kind, SnippetKind::Function);
        assert_eq!(snippet.name, "f");
        assert_eq!(snippet.code, "def f(x): return x");
        assert_eq!(snippet.category, vec!["utils"]);
        assert_eq!(snippet.file_path, dir.path().join("mod.py").to_string_lossy());
        assert_eq!(output.stats.files_scanned, 1);
    }

    #[test]
    fn test_syntax_error_file_is_skipped() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bad.py", "def f(:\n    pass\n");
        write(dir.path(), "good.py", "class Ok:\n    pass\n");

        let output = Extractor::default().scan(dir.path(), &[]).unwrap();

        assert_eq!(output.snippets.len(), 1);
        assert_eq!(output.snippets[0].name, "Ok");
        assert_eq!(output.stats.files_skipped, 1);
        assert_eq!(output.stats.files_scanned, 1);
    }

    #[test]
    fn test_invalid_utf8_file_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("latin1.py"), b"def f():\n    return '\xff'\n").unwrap();

        let output = Extractor::default().scan(dir.path(), &[]).unwrap();
        assert!(output.snippets.is_empty());
        assert_eq!(output.stats.files_skipped, 1);
    }

    #[test]
    fn test_traversal_order_files_before_subdirectories() {
        let dir = tempdir().unwrap();
        write(dir.path(), "b.py", "def in_b(): pass\n");
        write(dir.path(), "a/z.py", "def in_a_z(): pass\n");
        write(dir.path(), "a/sub/y.py", "def in_a_sub_y(): pass\n");
        write(dir.path(), "a/x.py", "def in_a_x(): pass\n");
        write(dir.path(), "c.py", "def in_c(): pass\n");

        let names: Vec<_> = Extractor::default()
            .scan(dir.path(), &[])
            .unwrap()
            .snippets
            .into_iter()
            .map(|s| s.name)
            .collect();

        assert_eq!(names, vec!["in_b", "in_c", "in_a_x", "in_a_z", "in_a_sub_y"]);
    }

    #[test]
    fn test_scan_is_deterministic() {
        let dir = tempdir().unwrap();
        write(dir.path(), "pkg/models.py", "class User:\n    pass\n\nclass Group:\n    pass\n");
        write(dir.path(), "pkg/views.py", "def index():\n    return 1\n");
        write(dir.path(), "lib.rs", "pub fn run() {}\n");

        let mut extractor = Extractor::default();
        let first = extractor.scan(dir.path(), &[]).unwrap().snippets;
        let second = extractor.scan(dir.path(), &[]).unwrap().snippets;

        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
    }

    #[test]
    fn test_extension_filter() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.py", "def py_fn(): pass\n");
        write(dir.path(), "b.rs", "fn rs_fn() {}\n");
        write(dir.path(), "c.txt", "def not_code(): pass\n");

        let config = ScanConfig {
            extensions: vec!["py".to_string()],
            ..ScanConfig::default()
        };
        let names: Vec<_> = Extractor::new(config)
            .scan(dir.path(), &[])
            .unwrap()
            .snippets
            .into_iter()
            .map(|s| s.name)
            .collect();

        assert_eq!(names, vec!["py_fn"]);
    }

    #[test]
    fn test_dotted_extensions_are_accepted() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.py", "def dotted(): pass\n");
        write(dir.path(), "b.rs", "fn skipped() {}\n");

        let config = ScanConfig {
            extensions: vec![".py".to_string()],
            ..ScanConfig::default()
        };
        let names: Vec<_> = Extractor::new(config)
            .scan(dir.path(), &[])
            .unwrap()
            .snippets
            .into_iter()
            .map(|s| s.name)
            .collect();

        assert_eq!(names, vec!["dotted"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_scanned_without_following_dirs() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        write(outside.path(), "linked.py", "def via_file_link(): pass\n");
        write(outside.path(), "pkg/inner.py", "def via_dir_link(): pass\n");
        std::os::unix::fs::symlink(outside.path().join("linked.py"), dir.path().join("linked.py"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path().join("pkg"), dir.path().join("pkg")).unwrap();

        let names: Vec<_> = Extractor::default()
            .scan(dir.path(), &[])
            .unwrap()
            .snippets
            .into_iter()
            .map(|s| s.name)
            .collect();

        assert_eq!(names, vec!["via_file_link"]);
    }

    #[test]
    fn test_python2_statements_skip_the_file() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.py", "def f():\n    print \"hi\"\n");
        write(dir.path(), "b.py", "def g():\n    exec \"x = 1\"\n");
        write(dir.path(), "c.py", "def h():\n    print(\"hi\")\n");

        let output = Extractor::default().scan(dir.path(), &[]).unwrap();

        let names: Vec<_> = output.snippets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["h"]);
        assert_eq!(output.stats.files_skipped, 2);
    }

    #[test]
    fn test_hidden_directories_included_by_default() {
        let dir = tempdir().unwrap();
        write(dir.path(), ".hidden/h.py", "def hidden(): pass\n");
        write(dir.path(), "visible.py", "def visible(): pass\n");

        let all = Extractor::default().scan(dir.path(), &[]).unwrap();
        assert_eq!(all.snippets.len(), 2);

        let config = ScanConfig {
            respect_ignore_files: true,
            ..ScanConfig::default()
        };
        let filtered = Extractor::new(config).scan(dir.path(), &[]).unwrap();
        assert_eq!(filtered.snippets.len(), 1);
        assert_eq!(filtered.snippets[0].name, "visible");
    }

    #[test]
    fn test_scan_root_must_be_directory() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.py", "def f(): pass\n");

        let result = Extractor::default().scan(&dir.path().join("a.py"), &[]);
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn test_extract_source_multiline_span() {
        let source = "import os\n\nclass Config:\n    path = '.'\n\n    def load(self):\n        return os.listdir(self.path)\n\nVALUE = 1\n";
        let snippets = Extractor::default()
            .extract_source(source, Language::Python, "config.py", &[])
            .unwrap();

        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].start_line, 3);
        assert_eq!(snippets[0].end_line, 7);
        assert_eq!(
            snippets[0].code,
            "class Config:\n    path = '.'\n\n    def load(self):\n        return os.listdir(self.path)"
        );
    }
}
