//! Language-specific definition queries.
//!
//! Each language module provides a tree-sitter query that matches the
//! top-level definitions turned into snippets. Every query tags the
//! definition node `@function` or `@class` and its name `@name`, so a
//! single matcher serves all languages.

pub mod python;
pub mod rust;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use crate::parser::ParsedFile;
use crate::snippet::SnippetKind;

/// A top-level definition located in a parsed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Function or class
    pub kind: SnippetKind,
    /// Name of the function or class
    pub name: String,
    /// Starting line number (1-indexed)
    pub start_line: usize,
    /// Ending line number (1-indexed, inclusive)
    pub end_line: usize,
}

/// Run a definitions query and return matches in declaration order.
pub fn extract_definitions(parsed: &ParsedFile, query: &Query) -> Vec<Definition> {
    let capture_names = query.capture_names();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, parsed.root_node(), parsed.source_bytes());

    let mut found: Vec<(usize, Definition)> = Vec::new();
    while let Some(match_) = matches.next() {
        let mut definition: Option<(Node, SnippetKind)> = None;
        let mut name = None;

        for capture in match_.captures {
            match capture_names[capture.index as usize] {
                "function" => definition = Some((capture.node, SnippetKind::Function)),
                "class" => definition = Some((capture.node, SnippetKind::Class)),
                "name" => name = Some(parsed.node_text(capture.node).to_string()),
                _ => {}
            }
        }

        if let (Some((node, kind)), Some(name)) = (definition, name) {
            found.push((
                node.start_byte(),
                Definition {
                    kind,
                    name,
                    start_line: node.start_position().row + 1,
                    end_line: resolve_end_line(node),
                },
            ));
        }
    }

    // Patterns are matched independently; restore source order.
    found.sort_by_key(|(start, _)| *start);
    found.dedup_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, def)| def).collect()
}

/// Determine the last line (1-indexed, inclusive) of a definition node.
///
/// The grammar lets a definition node run over trailing comments at body
/// indentation, so the end is taken from the last token that is not a
/// comment. An end at column 0 means the token swallowed the trailing
/// newline, so the previous row is the last one.
pub fn resolve_end_line(node: Node) -> usize {
    let start = node.start_position();
    let end = last_code_token(node).end_position();

    if end.row > start.row && end.column == 0 {
        end.row
    } else {
        end.row + 1
    }
}

/// Descend through the last non-extra, non-empty child down to a leaf.
fn last_code_token(node: Node) -> Node {
    let mut current = node;
    loop {
        let mut cursor = current.walk();
        let last = current
            .children(&mut cursor)
            .filter(|child| !child.is_extra() && child.end_byte() > child.start_byte())
            .last();
        match last {
            Some(child) => current = child,
            None => return current,
        }
    }
}

/// Slice whole lines `start_line..=end_line` (1-indexed) out of `source`.
pub fn line_span(source: &str, start_line: usize, end_line: usize) -> String {
    source
        .lines()
        .skip(start_line.saturating_sub(1))
        .take(end_line.saturating_sub(start_line) + 1)
        .collect::<Vec<_>>()
        .join("\n")
}
