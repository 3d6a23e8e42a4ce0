//! Rust definitions query.
//!
//! Rust has no classes, so type definitions stand in for them: top-level
//! `struct`, `enum`, `union` and `trait` items become class snippets and
//! top-level `fn` items become function snippets. Items inside `impl` blocks
//! and inline modules are not top-level and are skipped. Attributes and doc
//! comments are sibling nodes in the tree and stay outside the span.

/// Tree-sitter query for top-level Rust items.
pub const DEFINITIONS_QUERY: &str = r#"
; Functions
(source_file
  (function_item
    name: (identifier) @name) @function)

; Type definitions
(source_file
  (struct_item
    name: (type_identifier) @name) @class)

(source_file
  (enum_item
    name: (type_identifier) @name) @class)

(source_file
  (union_item
    name: (type_identifier) @name) @class)

(source_file
  (trait_item
    name: (type_identifier) @name) @class)
"#;
