//! Schema Zod
//!
//! Compiles a typed schema graph into Zod validator source and MCP-style
//! tool contracts.
//!
//! A graph holds user models, unions, enums and scalars plus the standard
//! scalar library. Compilation maps every declaration to a validator
//! expression, orders declarations so dependencies come first, and renders
//! a TypeScript module. Entity models additionally get per-phase views
//! (`Get`, `Create`, `Update`, `Delete`) which become tool input schemas.
//!
//! # Example
//!
//! ```
//! use schema_zod::{compile, load_graph_str, EmitOptions};
//!
//! let graph = load_graph_str(r#"{
//!     "namespace": "App",
//!     "models": [{
//!         "name": "Todo",
//!         "properties": [
//!             { "name": "id", "type": "int32", "key": true },
//!             { "name": "title", "type": "string", "maxLength": 80 }
//!         ]
//!     }]
//! }"#).unwrap();
//!
//! let compilation = compile(&graph, &EmitOptions::default()).unwrap();
//! let source = compilation.render();
//!
//! assert!(source.starts_with("import { z } from \"zod\";"));
//! assert!(source.contains("export const Todo = z.object({"));
//! assert!(source.contains("title: z.string().max(80),"));
//! ```
//!
//! # Scalar Mapping
//!
//! | Scalar | Validator |
//! |--------|-----------|
//! | `int8` .. `int32`, `uint8` .. `uint32`, `safeint` | `z.number().int()` with width bounds |
//! | `int64`, `uint64`, `integer` | `z.bigint()` |
//! | `float32`, `float64`, `float`, `decimal`, `numeric` | `z.number()` |
//! | `string`, `url`, `bytes` | `z.string()` (`url` adds `.url()`) |
//! | `plainDate` | `z.coerce.date()` |
//! | `plainTime`, `utcDateTime`, `offsetDateTime` | `z.string()` with a format check |
//! | `duration` | `z.string().duration()` |
//! | `boolean` | `z.boolean()` |
//!
//! User scalars map through the nearest standard scalar in their chain, with
//! bounds merged so the tighter one wins.

pub mod graph;

mod builder;
mod constraints;
mod cycles;
mod dispatch;
mod emitter;
mod error;
mod expr;
mod json_schema;
mod linter;
mod loader;
mod parse;
mod render;
#[cfg(feature = "remote")]
mod rest;
mod scalar;
mod tools;
mod types;
mod validator;
mod visibility;

pub use builder::CompileContext;
pub use constraints::{extract, extract_property, Constraints};
pub use cycles::{dependencies, is_cyclic, topological_components};
pub use dispatch::{Content, EntityHandler, ToolRequest, ToolResponse, ToolRouter};
pub use emitter::{
    compile, compile_entities, select_entities, Compilation, EnumDeclaration,
    ValidatorDeclaration,
};
pub use error::{
    CallError, CompileError, HandlerError, LoadError, ProjectionError, SchemaError, ToolError,
    ValidateError,
};
pub use expr::{Base, Check, Literal, ValidatorExpr};
pub use graph::{SchemaGraph, StdScalar, Type, TypeId};
pub use json_schema::{close_additional_properties, to_json_schema};
pub use linter::{lint, lint_file, FileResult, FileStatus, GraphSummary, LintResult};
pub use loader::{
    is_url, load_document, load_graph, load_graph_auto, load_graph_str, parse_document,
    GraphDocument, UnresolvedRef,
};
pub use parse::parse_value;
pub use render::{property_key, render_expr, sanitize_property_name};
pub use scalar::map_scalar;
pub use tools::{
    build_tools, pluralize, resource_name, tool_name, Operation, ToolBinding, ToolDescriptor,
    ToolSet,
};
pub use types::{Diagnostic, EmitOptions, Phase, Severity, ToolOptions};
pub use validator::{validate_against_schema, CompiledSchema};
pub use visibility::{find_key, key_view, project};

#[cfg(feature = "remote")]
pub use loader::load_graph_url;
#[cfg(feature = "remote")]
pub use rest::RestHandler;
