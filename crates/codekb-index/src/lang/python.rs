//! Python definitions query.
//!
//! Matches module-level `def`, `async def` and `class` statements, with or
//! without decorators. A decorated definition is reported with the span of
//! the `def`/`class` statement itself, so decorator lines are not part of
//! the snippet. Definitions nested in another function or class are never
//! matched on their own.

/// Tree-sitter query for module-level Python definitions.
pub const DEFINITIONS_QUERY: &str = r#"
;; Functions (async def parses as function_definition too)
(module
  (function_definition
    name: (identifier) @name) @function)

(module
  (decorated_definition
    definition: (function_definition
      name: (identifier) @name) @function))

;; Classes
(module
  (class_definition
    name: (identifier) @name) @class)

(module
  (decorated_definition
    definition: (class_definition
      name: (identifier) @name) @class))
"#;
