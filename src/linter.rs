//! Graph document linting - static analysis of schema graph files.
//!
//! Checks each document for:
//! - JSON syntax and document shape errors
//! - Entity models without a key property
//! - Tool name collisions between entities
//! - References that resolve to no declaration
//! - A missing namespace

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::emitter::{select_entities, user_declarations};
use crate::error::{ProjectionError, ToolError};
use crate::loader::load_document;
use crate::tools::build_tools;
use crate::types::{Diagnostic, Severity, ToolOptions};

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    /// Absent when the document failed to load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<GraphSummary>,
}

/// What a document that loaded declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub declarations: usize,
    /// Entities that got tools, in tool order.
    pub entities: Vec<String>,
    pub tools: usize,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json files.
/// If `strict` is true, warnings are treated as errors.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_graph_files(path);
    let results: Vec<FileResult> = files.iter().map(|file| lint_file(file, path)).collect();

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Lint a single graph document.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let (diagnostics, summary) = check_document(file);

    let status = if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        FileStatus::Error
    } else if diagnostics.is_empty() {
        FileStatus::Ok
    } else {
        FileStatus::Warning
    };

    FileResult {
        file: file.strip_prefix(base_path).unwrap_or(file).to_path_buf(),
        status,
        diagnostics,
        summary,
    }
}

fn check_document(file: &Path) -> (Vec<Diagnostic>, Option<GraphSummary>) {
    let document = match load_document(file) {
        Ok(d) => d,
        Err(e) => return (vec![Diagnostic::error("E001", "/", e.to_string())], None),
    };
    let missing_namespace = document.namespace.is_none();

    let (graph, unresolved) = match document.build() {
        Ok(built) => built,
        Err(e) => return (vec![Diagnostic::error("E001", "/", e.to_string())], None),
    };

    let mut diagnostics = Vec::new();
    let mut summary = GraphSummary {
        declarations: user_declarations(&graph).len(),
        ..GraphSummary::default()
    };

    let mut entity_errors = false;
    if let Some(names) = graph.entities() {
        for name in names {
            if let Err(e) = select_entities(&graph, Some(std::slice::from_ref(name))) {
                entity_errors = true;
                diagnostics.push(Diagnostic::error(
                    "E002",
                    format!("entities/{name}"),
                    entity_message(&e),
                ));
            }
        }
    }

    // Tool names are only meaningful once every entity resolves.
    if !entity_errors {
        match build_tools(&graph, &ToolOptions::default()) {
            Ok(tools) => {
                summary.tools = tools.bindings().len();
                for binding in tools.bindings() {
                    if !summary.entities.contains(&binding.entity) {
                        summary.entities.push(binding.entity.clone());
                    }
                }
            }
            Err(ToolError::DuplicateTool { name }) => {
                diagnostics.push(Diagnostic::error(
                    "E003",
                    format!("tools/{name}"),
                    format!("duplicate tool name: {name}"),
                ));
            }
            Err(_) => {}
        }
    }

    for reference in unresolved {
        diagnostics.push(Diagnostic::warning(
            "W001",
            reference.path,
            format!("unresolved reference: {}", reference.reference),
        ));
    }

    if missing_namespace {
        diagnostics.push(Diagnostic::warning(
            "W002",
            "/",
            "document missing namespace field",
        ));
    }

    (diagnostics, Some(summary))
}

fn entity_message(err: &ProjectionError) -> String {
    match err {
        ProjectionError::MissingKey { model } => {
            format!("entity {model} has no key property (mark one with \"key\": true or name it \"id\")")
        }
        other => other.to_string(),
    }
}

/// Collect all .json files in a path (file or directory).
fn collect_graph_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn lint_str(content: &str) -> FileResult {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        lint_file(file.path(), file.path().parent().unwrap())
    }

    #[test]
    fn lint_valid_document() {
        let result = lint_str(
            r#"{
            "namespace": "App",
            "models": [{ "name": "Todo", "properties": [{ "name": "id", "type": "int32", "key": true }] }],
            "entities": ["Todo"]
        }"#,
        );
        assert_eq!(result.status, FileStatus::Ok);
        assert!(result.diagnostics.is_empty());
        assert_eq!(
            result.summary,
            Some(GraphSummary {
                declarations: 1,
                entities: vec!["Todo".to_string()],
                tools: 5,
            })
        );
    }

    #[test]
    fn lint_invalid_json_syntax() {
        let result = lint_str("{ not valid json }");
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, "E001");
        assert!(result.summary.is_none());
    }

    #[test]
    fn lint_duplicate_declaration_is_load_error() {
        let result = lint_str(
            r#"{ "namespace": "App", "models": [{ "name": "A" }, { "name": "A" }] }"#,
        );
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics[0].code, "E001");
    }

    #[test]
    fn lint_entity_without_key() {
        let result = lint_str(
            r#"{
            "namespace": "App",
            "models": [{ "name": "Note", "properties": [{ "name": "body", "type": "string" }] }],
            "entities": ["Note"]
        }"#,
        );
        assert_eq!(result.status, FileStatus::Error);
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.code == "E002")
            .unwrap();
        assert_eq!(diag.path, "entities/Note");
    }

    #[test]
    fn lint_unknown_entity() {
        let result = lint_str(r#"{ "namespace": "App", "entities": ["Ghost"] }"#);
        assert!(result.diagnostics.iter().any(|d| d.code == "E002"));
    }

    #[test]
    fn lint_duplicate_tool_names() {
        let result = lint_str(
            r#"{
            "namespace": "App",
            "models": [
                { "name": "Todo", "properties": [{ "name": "id", "type": "int32" }] },
                { "name": "TODO", "properties": [{ "name": "id", "type": "int32" }] }
            ]
        }"#,
        );
        assert_eq!(result.status, FileStatus::Error);
        assert!(result.diagnostics.iter().any(|d| d.code == "E003"));
    }

    #[test]
    fn lint_unresolved_reference_warning() {
        let result = lint_str(
            r#"{
            "namespace": "App",
            "models": [{ "name": "Todo", "properties": [{ "name": "owner", "type": "Person" }] }]
        }"#,
        );
        assert_eq!(result.status, FileStatus::Warning);
        let diag = &result.diagnostics[0];
        assert_eq!(diag.code, "W001");
        assert_eq!(diag.path, "Todo/owner");
        assert!(diag.message.contains("Person"));
    }

    #[test]
    fn lint_missing_namespace_warning() {
        let result = lint_str(r#"{ "models": [] }"#);
        assert_eq!(result.status, FileStatus::Warning);
        assert!(result.diagnostics.iter().any(|d| d.code == "W002"));
    }

    #[test]
    fn lint_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("valid.json"), r#"{"namespace": "App"}"#).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/invalid.json"), "{ not json }").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let result = lint(dir.path(), false);
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert!(!result.is_ok());
        assert_eq!(result.results[0].file, PathBuf::from("nested/invalid.json"));
    }

    #[test]
    fn lint_strict_mode() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("graph.json");
        std::fs::write(&file_path, r#"{"models": []}"#).unwrap();

        let result = lint(&file_path, false);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 0);

        let result = lint(&file_path, true);
        assert_eq!(result.passed, 0);
        assert_eq!(result.failed, 1);
    }
}
