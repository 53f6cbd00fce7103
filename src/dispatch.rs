//! Tool dispatch.
//!
//! [`ToolRouter`] looks a request up by tool name, validates its arguments
//! against the tool's input schema, shapes them by the tool's view (unknown
//! members stripped, defaults filled in), forwards them to the entity's
//! [`EntityHandler`] and wraps the outcome. Every path, including unknown
//! tools, invalid arguments and handler failures, produces the same
//! response envelope:
//!
//! ```json
//! { "content": [{ "type": "text", "text": "<JSON>" }] }
//! ```
//!
//! Failures serialize `{"error": true, "kind": ..., "message": ...,
//! "details": [...]}` into the text.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{CallError, HandlerError, ToolError, ValidateError};
use crate::parse::parse_value;
use crate::tools::{Operation, ToolBinding, ToolSet};
use crate::validator::CompiledSchema;

/// Incoming tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Response envelope returned on every path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<Content>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content {
                kind: "text".to_string(),
                text: text.into(),
            }],
        }
    }

    /// Envelope carrying `value` as pretty-printed JSON.
    pub fn json(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(text)
    }

    pub fn error(err: &CallError) -> Self {
        Self::json(&error_payload(err))
    }

    /// The JSON carried by the first content item.
    pub fn payload(&self) -> Option<Value> {
        let first = self.content.first()?;
        serde_json::from_str(&first.text).ok()
    }

    pub fn is_error(&self) -> bool {
        self.payload()
            .and_then(|p| p.get("error").and_then(Value::as_bool))
            .unwrap_or(false)
    }
}

fn error_payload(err: &CallError) -> Value {
    let details = match err {
        CallError::InvalidArguments { errors, .. } => json!(errors),
        CallError::Handler {
            source: HandlerError::Status { status, body },
            ..
        } => json!([{ "status": status, "body": body }]),
        _ => json!([]),
    };
    json!({
        "error": true,
        "kind": err.kind(),
        "message": err.to_string(),
        "details": details,
    })
}

/// Backend for one entity's CRUD operations.
///
/// Operations a backend does not implement report
/// [`HandlerError::Unsupported`].
pub trait EntityHandler: Send + Sync {
    fn list(&self) -> Result<Value, HandlerError> {
        Err(unsupported("list"))
    }

    fn get(&self, key: &Value) -> Result<Value, HandlerError> {
        let _ = key;
        Err(unsupported("get"))
    }

    fn create(&self, body: &Value) -> Result<Value, HandlerError> {
        let _ = body;
        Err(unsupported("create"))
    }

    fn update(&self, key: &Value, patch: &Value) -> Result<Value, HandlerError> {
        let _ = (key, patch);
        Err(unsupported("update"))
    }

    /// `Value::Null` is reported to the caller as `{"deleted": true}`.
    fn delete(&self, key: &Value) -> Result<Value, HandlerError> {
        let _ = key;
        Err(unsupported("delete"))
    }
}

fn unsupported(operation: &str) -> HandlerError {
    HandlerError::Unsupported {
        operation: operation.to_string(),
    }
}

/// Dispatch table from tool name to validated handler call.
pub struct ToolRouter {
    tools: ToolSet,
    schemas: HashMap<String, CompiledSchema>,
    handlers: HashMap<String, Arc<dyn EntityHandler>>,
}

impl std::fmt::Debug for ToolRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRouter")
            .field("tools", &self.schemas.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRouter {
    /// Compile every tool's input schema.
    pub fn new(tools: ToolSet) -> Result<Self, ToolError> {
        let mut schemas = HashMap::new();
        for binding in tools.bindings() {
            let schema = CompiledSchema::new(&binding.descriptor.input_schema).map_err(|e| {
                ToolError::InvalidSchema {
                    tool: binding.descriptor.name.clone(),
                    message: e.to_string(),
                }
            })?;
            schemas.insert(binding.descriptor.name.clone(), schema);
        }
        Ok(Self {
            tools,
            schemas,
            handlers: HashMap::new(),
        })
    }

    /// Register the handler for `entity`.
    pub fn with_handler(mut self, entity: impl Into<String>, handler: impl EntityHandler + 'static) -> Self {
        self.handlers.insert(entity.into(), Arc::new(handler));
        self
    }

    pub fn register(&mut self, entity: impl Into<String>, handler: Arc<dyn EntityHandler>) {
        self.handlers.insert(entity.into(), handler);
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Entity names with at least one tool, in tool order.
    pub fn entities(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for binding in self.tools.bindings() {
            if !out.contains(&binding.entity) {
                out.push(binding.entity.clone());
            }
        }
        out
    }

    /// Dispatch a request.
    pub fn call(&self, request: &ToolRequest) -> ToolResponse {
        match self.try_call(request) {
            Ok(value) => ToolResponse::json(&value),
            Err(err) => {
                warn!(tool = %request.name, kind = err.kind(), error = %err, "tool call failed");
                ToolResponse::error(&err)
            }
        }
    }

    /// Dispatch a raw JSON request. Malformed input yields an error envelope.
    pub fn call_json(&self, raw: &str) -> ToolResponse {
        match serde_json::from_str::<ToolRequest>(raw) {
            Ok(request) => self.call(&request),
            Err(e) => ToolResponse::error(&CallError::MalformedRequest {
                message: e.to_string(),
            }),
        }
    }

    fn try_call(&self, request: &ToolRequest) -> Result<Value, CallError> {
        let binding = self
            .tools
            .get(&request.name)
            .ok_or_else(|| CallError::UnknownTool {
                name: request.name.clone(),
            })?;

        let arguments = match &request.arguments {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };

        if let Some(schema) = self.schemas.get(&request.name) {
            schema.validate(&arguments).map_err(|e| match e {
                ValidateError::Invalid { errors } => CallError::InvalidArguments {
                    tool: request.name.clone(),
                    errors,
                },
                ValidateError::InvalidSchema { message } => CallError::MalformedRequest { message },
            })?;
        }

        let arguments = match binding.view.as_deref() {
            Some(view) => match self.tools.compilation().validator(view) {
                Some(declaration) => {
                    parse_value(&declaration.expr, &arguments, self.tools.compilation())
                }
                None => arguments,
            },
            None => arguments,
        };

        let handler = self
            .handlers
            .get(&binding.entity)
            .ok_or_else(|| CallError::NoHandler {
                entity: binding.entity.clone(),
            })?;

        debug!(tool = %request.name, entity = %binding.entity, "dispatching tool call");
        let outcome = catch_unwind(AssertUnwindSafe(|| invoke(handler.as_ref(), binding, &arguments)))
            .unwrap_or_else(|panic| {
                Err(HandlerError::Panicked {
                    message: panic_message(panic.as_ref()),
                })
            });

        match outcome {
            Ok(Value::Null) if binding.operation == Operation::Delete => Ok(json!({ "deleted": true })),
            Ok(value) => Ok(value),
            Err(source) => Err(CallError::Handler {
                tool: request.name.clone(),
                source,
            }),
        }
    }
}

fn invoke(
    handler: &dyn EntityHandler,
    binding: &ToolBinding,
    arguments: &Value,
) -> Result<Value, HandlerError> {
    let key = binding
        .key
        .as_deref()
        .and_then(|k| arguments.get(k))
        .cloned()
        .unwrap_or(Value::Null);

    match binding.operation {
        Operation::List => handler.list(),
        Operation::Get => handler.get(&key),
        Operation::Create => handler.create(arguments),
        Operation::Update => {
            let mut patch = arguments.clone();
            if let (Some(k), Value::Object(map)) = (binding.key.as_deref(), &mut patch) {
                map.remove(k);
            }
            handler.update(&key, &patch)
        }
        Operation::Delete => handler.delete(&key),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Model, ModelProperty, SchemaGraph, StdScalar, Type};
    use crate::tools::build_tools;
    use crate::types::ToolOptions;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Value, Value)>>,
    }

    impl EntityHandler for Recorder {
        fn list(&self) -> Result<Value, HandlerError> {
            Ok(json!([{ "id": 1, "title": "milk" }]))
        }

        fn get(&self, key: &Value) -> Result<Value, HandlerError> {
            if key == &json!(404) {
                return Err(HandlerError::NotFound {
                    key: key.to_string(),
                });
            }
            Ok(json!({ "id": key, "title": "milk" }))
        }

        fn update(&self, key: &Value, patch: &Value) -> Result<Value, HandlerError> {
            self.calls
                .lock()
                .unwrap()
                .push(("update".into(), key.clone(), patch.clone()));
            Ok(patch.clone())
        }

        fn delete(&self, _key: &Value) -> Result<Value, HandlerError> {
            Ok(Value::Null)
        }
    }

    struct Panicky;

    impl EntityHandler for Panicky {
        fn list(&self) -> Result<Value, HandlerError> {
            panic!("backend exploded");
        }
    }

    fn router() -> ToolRouter {
        let mut graph = SchemaGraph::new();
        let int32 = graph.std(StdScalar::Int32);
        let string = graph.std(StdScalar::String);
        let mut model = Model::default();
        for p in [
            ModelProperty::new("id", int32).key(),
            ModelProperty::new("title", string),
        ] {
            model.properties.insert(p.name.clone(), p);
        }
        graph
            .declare("Todo", Some("App"), Type::Model(model))
            .unwrap();
        let tools = build_tools(&graph, &ToolOptions::default()).unwrap();
        ToolRouter::new(tools)
            .unwrap()
            .with_handler("Todo", Recorder::default())
    }

    #[test]
    fn unknown_tool_envelope() {
        let response = router().call(&ToolRequest::new("frobnicate", json!({})));
        let payload = response.payload().unwrap();
        assert_eq!(payload["error"], json!(true));
        assert_eq!(payload["kind"], "unknown_tool");
        assert_eq!(payload["message"], "Tool not found: frobnicate");
        assert_eq!(response.content[0].kind, "text");
    }

    #[test]
    fn invalid_arguments_carry_details() {
        let response = router().call(&ToolRequest::new("get_todo", json!({ "id": "one" })));
        let payload = response.payload().unwrap();
        assert_eq!(payload["kind"], "invalid_arguments");
        assert_eq!(payload["details"][0]["path"], "/id");
    }

    #[test]
    fn get_forwards_key() {
        let response = router().call(&ToolRequest::new("get_todo", json!({ "id": 7 })));
        assert!(!response.is_error());
        assert_eq!(response.payload().unwrap()["id"], json!(7));
    }

    #[test]
    fn update_splits_key_from_patch() {
        let handler = Arc::new(Recorder::default());
        let mut router = router();
        router.register("Todo", handler.clone());
        router.call(&ToolRequest::new(
            "update_todo",
            json!({ "id": 3, "title": "eggs" }),
        ));
        let calls = handler.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            ("update".to_string(), json!(3), json!({ "title": "eggs" }))
        );
    }

    #[test]
    fn delete_null_reports_deleted() {
        let response = router().call(&ToolRequest::new("delete_todo", json!({ "id": 3 })));
        assert_eq!(response.payload().unwrap(), json!({ "deleted": true }));
    }

    #[test]
    fn handler_errors_are_wrapped() {
        let response = router().call(&ToolRequest::new("get_todo", json!({ "id": 404 })));
        let payload = response.payload().unwrap();
        assert_eq!(payload["kind"], "handler");
    }

    #[test]
    fn unsupported_operation_is_handler_error() {
        let response = router().call(&ToolRequest::new("create_todo", json!({ "title": "x" })));
        let payload = response.payload().unwrap();
        assert_eq!(payload["kind"], "handler");
        assert!(payload["message"]
            .as_str()
            .unwrap()
            .contains("not supported"));
    }

    #[test]
    fn panics_are_caught_and_router_keeps_serving() {
        let router = router().with_handler("Todo", Panicky);
        let response = router.call(&ToolRequest::new("list_todos", json!({})));
        let payload = response.payload().unwrap();
        assert_eq!(payload["kind"], "handler");
        assert!(payload["message"]
            .as_str()
            .unwrap()
            .contains("backend exploded"));

        let again = router.call(&ToolRequest::new("list_todos", Value::Null));
        assert!(again.is_error());
    }

    #[test]
    fn malformed_json_request() {
        let response = router().call_json("{not json");
        assert_eq!(response.payload().unwrap()["kind"], "malformed_request");
    }

    #[test]
    fn missing_handler() {
        let tools = router().tools().clone();
        let bare = ToolRouter::new(tools).unwrap();
        let response = bare.call(&ToolRequest::new("list_todos", json!({})));
        assert_eq!(response.payload().unwrap()["kind"], "no_handler");
    }
}
