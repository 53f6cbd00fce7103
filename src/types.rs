//! Core types shared across compilation and tool mapping.

use serde::{Deserialize, Serialize};

/// Namespaces whose declarations are library builtins.
///
/// Types declared in these namespaces are never referenced by name; they
/// inline to their builtin validator mapping.
pub const BUILTIN_NAMESPACES: &[&str] = &["TypeSpec", "Reflection"];

/// Model names that are treated as error shapes.
pub const ERROR_MODEL_NAMES: &[&str] = &["Error", "ResourceError", "InnerError", "ErrorResponse"];

/// Lifecycle phase used for visibility projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Create,
    Read,
    Update,
    Delete,
    Query,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Create,
        Phase::Read,
        Phase::Update,
        Phase::Delete,
        Phase::Query,
    ];

    /// Parse a phase name, case-insensitively.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Some(Phase::Create),
            "read" => Some(Phase::Read),
            "update" => Some(Phase::Update),
            "delete" => Some(Phase::Delete),
            "query" => Some(Phase::Query),
            _ => None,
        }
    }

    /// Suffix used when naming a projected declaration.
    pub fn suffix(&self) -> &'static str {
        match self {
            Phase::Create => "Create",
            Phase::Read => "Read",
            Phase::Update => "Update",
            Phase::Delete => "Delete",
            Phase::Query => "Query",
        }
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic produced while compiling or linting a graph.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// Declaration path to the issue (e.g., "Todo/owner").
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(code: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn error(code: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.path, self.message)
    }
}

/// Options for TypeScript emission.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Module specifier the generated file imports `z` from.
    pub zod_module: String,
    /// When true, every validator is followed by `export type X = z.infer<typeof X>`.
    pub infer_types: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            zod_module: "zod".to_string(),
            infer_types: true,
        }
    }
}

impl EmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the module specifier used in the `import { z }` line.
    pub fn zod_module(mut self, module: impl Into<String>) -> Self {
        self.zod_module = module.into();
        self
    }

    /// Enable or disable `z.infer` type aliases.
    pub fn infer_types(mut self, infer: bool) -> Self {
        self.infer_types = infer;
        self
    }
}

/// Options for tool descriptor generation.
#[derive(Debug, Clone, Default)]
pub struct ToolOptions {
    /// Explicit entity model names. When `None`, the graph's own entity
    /// list is used, and failing that every keyed model is an entity.
    pub entities: Option<Vec<String>>,
    /// When true, sets `additionalProperties: false` on all object schemas
    /// so tool calls with unknown arguments are rejected.
    pub strict: bool,
}

impl ToolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict tool generation to the named entity models.
    pub fn entities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Set strict mode (additionalProperties: false on all objects).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_parse_valid() {
        assert_eq!(Phase::parse("create"), Some(Phase::Create));
        assert_eq!(Phase::parse("Update"), Some(Phase::Update));
        assert_eq!(Phase::parse("QUERY"), Some(Phase::Query));
    }

    #[test]
    fn phase_parse_invalid() {
        assert_eq!(Phase::parse("get"), None);
        assert_eq!(Phase::parse(""), None);
    }

    #[test]
    fn phase_deserializes_lowercase() {
        let phases: Vec<Phase> = serde_json::from_str(r#"["read", "update"]"#).unwrap();
        assert_eq!(phases, vec![Phase::Read, Phase::Update]);
    }

    #[test]
    fn emit_options_builder() {
        let opts = EmitOptions::new().zod_module("zod/v3").infer_types(false);
        assert_eq!(opts.zod_module, "zod/v3");
        assert!(!opts.infer_types);
    }

    #[test]
    fn tool_options_builder() {
        let opts = ToolOptions::new().entities(["Todo", "User"]).strict(true);
        assert_eq!(
            opts.entities,
            Some(vec!["Todo".to_string(), "User".to_string()])
        );
        assert!(opts.strict);
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic::warning("W001", "Todo/owner", "unresolved reference `Person`");
        assert_eq!(diag.to_string(), "[W001] Todo/owner: unresolved reference `Person`");
    }
}
