//! Graph document loading from files, strings, and HTTP URLs.
//!
//! A graph document is the JSON front end for a [`SchemaGraph`]: one user
//! namespace with its scalars, enums, models and unions. Type references
//! are either names or inline expressions (`{"array": T}`,
//! `{"record": T}`, `{"union": [..]}`, `{"tuple": [..]}`,
//! `{"literal": v}`, `{"model": {..}}`). Names that resolve nowhere become
//! [`Type::Unresolved`] nodes rather than errors.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::LoadError;
use crate::graph::{
    Bounds, Discriminator, Encoding, Enum, EnumMember, EnumValue, EnvelopeStyle, Indexer,
    LiteralValue, Model, ModelProperty, Scalar, SchemaGraph, StdScalar, Type, TypeId, TypeNode,
    Union, UnionVariant,
};
use crate::types::Phase;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub scalars: Vec<ScalarDoc>,
    #[serde(default)]
    pub enums: Vec<EnumDoc>,
    #[serde(default)]
    pub models: Vec<ModelDoc>,
    #[serde(default)]
    pub unions: Vec<UnionDoc>,
    /// Entity models tools are generated for.
    #[serde(default)]
    pub entities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarDoc {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub encoding: Option<EncodingDoc>,
    #[serde(flatten)]
    pub bounds: Bounds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodingDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumDoc {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub members: Vec<EnumMemberDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumMemberDoc {
    pub name: String,
    #[serde(default)]
    pub value: Option<EnumValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDoc {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub extends: Option<TypeRef>,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub properties: Vec<PropertyDoc>,
    /// Value type of a string-keyed indexer.
    #[serde(default)]
    pub indexer: Option<TypeRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub visibility: Option<Vec<Phase>>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(flatten)]
    pub bounds: Bounds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnionDoc {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantDoc>,
    #[serde(default)]
    pub discriminator: Option<DiscriminatorDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantDoc {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscriminatorDoc {
    #[serde(default = "default_discriminator")]
    pub property: String,
    #[serde(default)]
    pub envelope: EnvelopeStyle,
    #[serde(default = "default_envelope_property")]
    pub envelope_property: String,
}

fn default_discriminator() -> String {
    "kind".to_string()
}

fn default_envelope_property() -> String {
    "value".to_string()
}

/// A type reference: a name or an inline type expression.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    Name(String),
    Inline(InlineType),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineType {
    Array(Box<TypeRef>),
    Record(Box<TypeRef>),
    Union(Vec<TypeRef>),
    Tuple(Vec<TypeRef>),
    Literal(LiteralValue),
    Model(InlineModel),
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineModel {
    #[serde(default)]
    pub properties: Vec<PropertyDoc>,
}

/// A name that resolved nowhere, with where it was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRef {
    /// Declaration path of the use site (e.g. "Todo/owner").
    pub path: String,
    pub reference: String,
}

impl GraphDocument {
    /// Build the schema graph.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::DuplicateDeclaration` if two declarations share a
    /// name or a declaration shadows a builtin, and
    /// `LoadError::InvalidDocument` for empty names.
    pub fn into_graph(self) -> Result<SchemaGraph, LoadError> {
        self.build().map(|(graph, _)| graph)
    }

    /// Build the schema graph, also reporting every unresolved reference.
    pub fn build(self) -> Result<(SchemaGraph, Vec<UnresolvedRef>), LoadError> {
        let mut builder = GraphBuilder {
            graph: SchemaGraph::new(),
            unresolved: Vec::new(),
        };
        let ns = self.namespace.as_deref();

        // Declare every name first so references are order independent.
        let scalars = declare_all(&mut builder.graph, ns, "scalars", &self.scalars, |s| &s.name, || {
            Type::Scalar(Scalar::default())
        })?;
        let enums = declare_all(&mut builder.graph, ns, "enums", &self.enums, |e| &e.name, || {
            Type::Enum(Enum::default())
        })?;
        let models = declare_all(&mut builder.graph, ns, "models", &self.models, |m| &m.name, || {
            Type::Model(Model::default())
        })?;
        let unions = declare_all(&mut builder.graph, ns, "unions", &self.unions, |u| &u.name, || {
            Type::Union(Union::default())
        })?;

        for (doc, id) in self.enums.iter().zip(&enums) {
            let members = doc
                .members
                .iter()
                .map(|m| EnumMember {
                    name: m.name.clone(),
                    value: m.value.clone(),
                })
                .collect();
            let node = builder.graph.node_mut(*id);
            node.doc = doc.doc.clone();
            node.kind = Type::Enum(Enum { members });
        }

        for (doc, id) in self.scalars.iter().zip(&scalars) {
            let base = doc
                .extends
                .as_ref()
                .map(|name| builder.resolve_name(name, &doc.name));
            let encoding = doc.encoding.as_ref().map(|enc| Encoding {
                name: enc.name.clone(),
                target: builder.resolve_name(&enc.target, &doc.name),
            });
            let node = builder.graph.node_mut(*id);
            node.doc = doc.doc.clone();
            node.bounds = doc.bounds;
            node.kind = Type::Scalar(Scalar { base, encoding });
        }

        for (i, (doc, id)) in self.scalars.iter().zip(&scalars).enumerate() {
            if builder.graph.has_encoding_cycle(*id) {
                return Err(LoadError::InvalidDocument {
                    path: format!("scalars[{i}].encoding"),
                    message: format!("encoding of `{}` leads back to itself", doc.name),
                });
            }
        }

        for (doc, id) in self.models.iter().zip(&models) {
            let base = doc
                .extends
                .as_ref()
                .map(|r| builder.resolve(r, &doc.name));
            let indexer = doc.indexer.as_ref().map(|r| Indexer {
                key: builder.graph.std(StdScalar::String),
                value: builder.resolve(r, &format!("{}/*", doc.name)),
            });
            let properties = builder.properties(&doc.properties, &doc.name);
            let node = builder.graph.node_mut(*id);
            node.doc = doc.doc.clone();
            node.kind = Type::Model(Model {
                properties,
                base,
                indexer,
                error: doc.error,
            });
        }

        for (doc, id) in self.unions.iter().zip(&unions) {
            let variants = doc
                .variants
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let label = v.name.clone().unwrap_or_else(|| i.to_string());
                    UnionVariant {
                        name: v.name.clone(),
                        ty: builder.resolve(&v.ty, &format!("{}/{label}", doc.name)),
                    }
                })
                .collect();
            let discriminator = doc.discriminator.as_ref().map(|d| Discriminator {
                property: d.property.clone(),
                envelope: d.envelope,
                envelope_property: d.envelope_property.clone(),
            });
            let node = builder.graph.node_mut(*id);
            node.doc = doc.doc.clone();
            node.kind = Type::Union(Union {
                variants,
                discriminator,
            });
        }

        if let Some(ns) = &self.namespace {
            let members: Vec<TypeId> = scalars
                .iter()
                .chain(&enums)
                .chain(&models)
                .chain(&unions)
                .copied()
                .collect();
            builder.graph.add(TypeNode {
                name: Some(ns.clone()),
                namespace: None,
                doc: None,
                bounds: Bounds::default(),
                kind: Type::Namespace(members),
            });
        }

        if let Some(entities) = self.entities {
            builder.graph.set_entities(entities);
        }

        Ok((builder.graph, builder.unresolved))
    }
}

fn declare_all<T>(
    graph: &mut SchemaGraph,
    namespace: Option<&str>,
    section: &str,
    items: &[T],
    name_of: impl Fn(&T) -> &String,
    placeholder: impl Fn() -> Type,
) -> Result<Vec<TypeId>, LoadError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let name = name_of(item);
            if name.trim().is_empty() {
                return Err(LoadError::InvalidDocument {
                    path: format!("{section}[{i}].name"),
                    message: "name must not be empty".to_string(),
                });
            }
            graph
                .declare(name.clone(), namespace, placeholder())
                .ok_or_else(|| LoadError::DuplicateDeclaration { name: name.clone() })
        })
        .collect()
}

struct GraphBuilder {
    graph: SchemaGraph,
    unresolved: Vec<UnresolvedRef>,
}

impl GraphBuilder {
    fn properties(
        &mut self,
        docs: &[PropertyDoc],
        owner: &str,
    ) -> indexmap::IndexMap<String, ModelProperty> {
        docs.iter()
            .map(|doc| {
                let ty = self.resolve(&doc.ty, &format!("{owner}/{}", doc.name));
                let prop = ModelProperty {
                    name: doc.name.clone(),
                    ty,
                    optional: doc.optional,
                    default: doc.default.clone(),
                    key: doc.key,
                    visibility: doc.visibility.clone(),
                    bounds: doc.bounds,
                    doc: doc.doc.clone(),
                };
                (doc.name.clone(), prop)
            })
            .collect()
    }

    fn resolve(&mut self, reference: &TypeRef, path: &str) -> TypeId {
        match reference {
            TypeRef::Name(name) => self.resolve_name(name, path),
            TypeRef::Inline(inline) => match inline {
                InlineType::Array(element) => {
                    let element = self.resolve(element, &format!("{path}/[]"));
                    self.graph.array_of(element)
                }
                InlineType::Record(value) => {
                    let value = self.resolve(value, &format!("{path}/*"));
                    self.graph.record_of(value)
                }
                InlineType::Union(options) => {
                    let variants = options
                        .iter()
                        .enumerate()
                        .map(|(i, r)| UnionVariant {
                            name: None,
                            ty: self.resolve(r, &format!("{path}/{i}")),
                        })
                        .collect();
                    self.graph.add(TypeNode::anonymous(Type::Union(Union {
                        variants,
                        discriminator: None,
                    })))
                }
                InlineType::Tuple(items) => {
                    let items = items
                        .iter()
                        .enumerate()
                        .map(|(i, r)| self.resolve(r, &format!("{path}/{i}")))
                        .collect();
                    self.graph.add(TypeNode::anonymous(Type::Tuple(items)))
                }
                InlineType::Literal(value) => self
                    .graph
                    .add(TypeNode::anonymous(Type::Literal(value.clone()))),
                InlineType::Model(model) => {
                    let properties = self.properties(&model.properties, path);
                    self.graph.add(TypeNode::anonymous(Type::Model(Model {
                        properties,
                        ..Model::default()
                    })))
                }
            },
        }
    }

    /// Resolve a name: a declaration or builtin, or `Enum.Member`.
    fn resolve_name(&mut self, name: &str, path: &str) -> TypeId {
        if let Some(id) = self.graph.lookup(name) {
            return id;
        }
        if let Some(id) = self.enum_member(name) {
            return id;
        }
        self.unresolved.push(UnresolvedRef {
            path: path.to_string(),
            reference: name.to_string(),
        });
        self.graph.unresolved(name)
    }

    fn enum_member(&mut self, name: &str) -> Option<TypeId> {
        let (owner, member) = name.split_once('.')?;
        let id = self.graph.lookup(owner)?;
        let Type::Enum(e) = self.graph.kind(id) else {
            return None;
        };
        let found = e.members.iter().find(|m| m.name == member)?.clone();
        Some(self.graph.add(TypeNode {
            name: Some(name.to_string()),
            namespace: self.graph.node(id).namespace.clone(),
            doc: None,
            bounds: Bounds::default(),
            kind: Type::EnumMember(found),
        }))
    }
}

/// Parse a graph document from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON, or
/// `LoadError::InvalidDocument` if it isn't a graph document.
pub fn parse_document(content: &str) -> Result<GraphDocument, LoadError> {
    let value: Value =
        serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    document_from_value(value)
}

fn document_from_value(value: Value) -> Result<GraphDocument, LoadError> {
    serde_json::from_value(value).map_err(|e| LoadError::InvalidDocument {
        path: "$".to_string(),
        message: e.to_string(),
    })
}

/// Load a graph document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or a parse error if it isn't a valid graph document.
pub fn load_document(path: &Path) -> Result<GraphDocument, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    parse_document(&content)
}

/// Load a schema graph from a file path.
pub fn load_graph(path: &Path) -> Result<SchemaGraph, LoadError> {
    load_document(path)?.into_graph()
}

/// Load a schema graph from a JSON string.
pub fn load_graph_str(content: &str) -> Result<SchemaGraph, LoadError> {
    parse_document(content)?.into_graph()
}

/// Load a schema graph from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails,
/// or a parse error if the response isn't a graph document.
#[cfg(feature = "remote")]
pub fn load_graph_url(url: &str) -> Result<SchemaGraph, LoadError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    // Check for HTTP errors before parsing
    let response = response
        .error_for_status()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let value: Value = response.json().map_err(|source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    })?;
    document_from_value(value)?.into_graph()
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a schema graph from a file path or URL.
pub fn load_graph_auto(source: &str) -> Result<SchemaGraph, LoadError> {
    #[cfg(feature = "remote")]
    if is_url(source) {
        return load_graph_url(source);
    }

    load_graph(Path::new(source))
}
