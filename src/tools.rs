//! Tool descriptors for entity CRUD operations.
//!
//! Every entity gets five tools: `list_<plural>`, `get_<name>`,
//! `create_<name>`, `update_<name>` and `delete_<name>`, with names in
//! snake case. Input schemas are the JSON Schema lowering of the entity's
//! phase validators.

use std::collections::HashSet;

use heck::ToSnakeCase;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::emitter::{compile_entities, select_entities, Compilation};
use crate::error::ToolError;
use crate::graph::{SchemaGraph, TypeId};
use crate::json_schema::{close_additional_properties, to_json_schema};
use crate::types::{EmitOptions, ToolOptions};
use crate::validator::CompiledSchema;
use crate::visibility::find_key;

/// CRUD operation a tool performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::List,
        Operation::Get,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn verb(self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Phase validator suffix for this operation's input.
    fn view(self) -> Option<&'static str> {
        match self {
            Operation::List => None,
            Operation::Get => Some("Get"),
            Operation::Create => Some("Create"),
            Operation::Update => Some("Update"),
            Operation::Delete => Some("Delete"),
        }
    }

    fn describe(self, entity: &str) -> String {
        match self {
            Operation::List => format!("Get all {entity} records"),
            Operation::Get => format!("Get a {entity} by ID"),
            Operation::Create => format!("Create a new {entity}"),
            Operation::Update => format!("Update a {entity} by ID"),
            Operation::Delete => format!("Delete a {entity} by ID"),
        }
    }
}

/// Published tool contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A descriptor together with what it dispatches to.
#[derive(Debug, Clone)]
pub struct ToolBinding {
    pub descriptor: ToolDescriptor,
    pub entity: String,
    pub operation: Operation,
    /// Name of the entity's key property.
    pub key: Option<String>,
    /// Declaration the arguments are shaped by before dispatch.
    pub view: Option<String>,
}

/// All tools of a graph plus the compilation their schemas came from.
#[derive(Debug, Clone)]
pub struct ToolSet {
    bindings: Vec<ToolBinding>,
    compilation: Compilation,
}

impl ToolSet {
    pub fn bindings(&self) -> &[ToolBinding] {
        &self.bindings
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.bindings.iter().map(|b| &b.descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&ToolBinding> {
        self.bindings.iter().find(|b| b.descriptor.name == name)
    }

    pub fn compilation(&self) -> &Compilation {
        &self.compilation
    }

    /// `{"tools": [...]}` listing.
    pub fn to_json(&self) -> Value {
        let tools: Vec<&ToolDescriptor> = self.descriptors().collect();
        json!({ "tools": tools })
    }
}

/// Naive English plural of a snake case word.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if before.map(|c| !"aeiou".contains(c)).unwrap_or(false) {
            return format!("{stem}ies");
        }
    }
    if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        return format!("{word}es");
    }
    format!("{word}s")
}

/// Tool name for an entity operation.
pub fn tool_name(entity: &str, operation: Operation) -> String {
    let snake = entity.to_snake_case();
    match operation {
        Operation::List => format!("list_{}", pluralize(&snake)),
        op => format!("{}_{snake}", op.verb()),
    }
}

/// REST resource segment for an entity (snake case plural).
pub fn resource_name(entity: &str) -> String {
    pluralize(&entity.to_snake_case())
}

/// Build the tool set of a graph.
///
/// # Errors
///
/// Fails on entity configuration errors (unknown entity, non-model, missing
/// key), on duplicate tool names, and if a generated input schema does not
/// compile.
pub fn build_tools(graph: &SchemaGraph, options: &ToolOptions) -> Result<ToolSet, ToolError> {
    let explicit = options.entities.as_deref();
    let compilation = compile_entities(graph, explicit, &EmitOptions::default())?;
    let entities: Vec<TypeId> = select_entities(graph, explicit)?
        .into_iter()
        .filter(|id| !graph.is_error_model(*id))
        .collect();

    let mut bindings = Vec::new();
    let mut names = HashSet::new();
    for id in entities {
        let entity = graph.name(id).unwrap_or_default().to_string();
        let key = find_key(graph, id).map(|k| k.name);
        for operation in Operation::ALL {
            let name = tool_name(&entity, operation);
            if !names.insert(name.clone()) {
                return Err(ToolError::DuplicateTool { name });
            }
            let view = operation
                .view()
                .map(|suffix| format!("Zod{entity}{suffix}"))
                .filter(|declaration| compilation.validator(declaration).is_some());
            let mut input_schema = match view.as_deref().and_then(|v| compilation.validator(v)) {
                Some(declaration) => to_json_schema(&declaration.expr, &compilation),
                None => json!({ "type": "object", "properties": {} }),
            };
            if options.strict {
                close_additional_properties(&mut input_schema);
            }
            CompiledSchema::new(&input_schema).map_err(|e| ToolError::InvalidSchema {
                tool: name.clone(),
                message: e.to_string(),
            })?;

            debug!(tool = %name, entity = %entity, "built tool descriptor");
            bindings.push(ToolBinding {
                descriptor: ToolDescriptor {
                    name,
                    description: operation.describe(&entity),
                    input_schema,
                },
                entity: entity.clone(),
                operation,
                key: key.clone(),
                view,
            });
        }
    }

    Ok(ToolSet {
        bindings,
        compilation,
    })
}
