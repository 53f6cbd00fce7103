//! Error types for graph loading, compilation and tool dispatch.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading a graph document.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid graph document at {path}: {message}")]
    InvalidDocument { path: String, message: String },

    #[error("duplicate declaration \"{name}\"")]
    DuplicateDeclaration { name: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Configuration errors raised by visibility projection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("model \"{model}\" has no key property")]
    MissingKey { model: String },

    #[error("\"{name}\" is not a model")]
    NotAModel { name: String },

    #[error("unknown entity \"{name}\"")]
    UnknownEntity { name: String },
}

/// Errors during compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl CompileError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::InvalidSchema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Errors while building tool descriptors or a router.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("duplicate tool name \"{name}\"")]
    DuplicateTool { name: String },

    #[error("input schema for tool \"{tool}\" is invalid: {message}")]
    InvalidSchema { tool: String, message: String },
}

impl ToolError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Failure reported by an entity handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[cfg(feature = "remote")]
    #[error("request failed: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
    },

    #[error("not found: {key}")]
    NotFound { key: String },

    #[error("operation \"{operation}\" is not supported")]
    Unsupported { operation: String },

    #[error("handler panicked: {message}")]
    Panicked { message: String },

    #[error("{0}")]
    Other(String),
}

/// Per-invocation dispatch failure. Every variant is reported to the caller
/// inside the response envelope, never as a Rust error.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Tool not found: {name}")]
    UnknownTool { name: String },

    #[error("invalid arguments for {tool}")]
    InvalidArguments {
        tool: String,
        errors: Vec<SchemaError>,
    },

    #[error("malformed request: {message}")]
    MalformedRequest { message: String },

    #[error("no handler registered for entity {entity}")]
    NoHandler { entity: String },

    #[error("{tool} failed: {source}")]
    Handler {
        tool: String,
        #[source]
        source: HandlerError,
    },
}

impl CallError {
    /// Stable machine-readable kind written to the error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::UnknownTool { .. } => "unknown_tool",
            CallError::InvalidArguments { .. } => "invalid_arguments",
            CallError::MalformedRequest { .. } => "malformed_request",
            CallError::NoHandler { .. } => "no_handler",
            CallError::Handler { .. } => "handler",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("graph.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::DuplicateDeclaration {
            name: "Todo".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn validate_error_exit_codes() {
        let err = ValidateError::Invalid {
            errors: vec![SchemaError {
                path: "/id".into(),
                message: "missing required field".into(),
            }],
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "validation failed with 1 error(s)");
    }

    #[test]
    fn schema_error_display() {
        let err = SchemaError {
            path: "/owner/email".into(),
            message: "expected string, got number".into(),
        };
        assert_eq!(err.to_string(), "/owner/email: expected string, got number");
    }

    #[test]
    fn compile_error_wraps_projection() {
        let err: CompileError = ProjectionError::MissingKey {
            model: "Todo".into(),
        }
        .into();
        assert_eq!(err.to_string(), "model \"Todo\" has no key property");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn call_error_kinds() {
        let err = CallError::UnknownTool {
            name: "frobnicate".into(),
        };
        assert_eq!(err.kind(), "unknown_tool");
        assert_eq!(err.to_string(), "Tool not found: frobnicate");

        let err = CallError::Handler {
            tool: "get_todo".into(),
            source: HandlerError::Status {
                status: 404,
                body: "missing".into(),
            },
        };
        assert_eq!(err.kind(), "handler");
        assert_eq!(err.to_string(), "get_todo failed: backend returned 404: missing");
    }
}
