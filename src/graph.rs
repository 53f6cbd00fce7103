//! Schema type graph.
//!
//! The graph is an arena of [`TypeNode`]s addressed by [`TypeId`]. Edges
//! between nodes are plain ids, so self-referential and mutually recursive
//! declarations need no special representation. Models own their property
//! maps, which means cloning a [`Model`] never aliases the original.
//!
//! Every graph starts with the standard library preloaded in the
//! `TypeSpec` namespace: the scalar hierarchy (`int8` extends `int16`
//! extends `int32` ...) and the intrinsics (`null`, `void`, `never`,
//! `unknown`).

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Phase, BUILTIN_NAMESPACES, ERROR_MODEL_NAMES};

/// Namespace the standard library is declared in.
pub const STD_NAMESPACE: &str = "TypeSpec";

/// Handle to a node in a [`SchemaGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

impl TypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Numeric, length and item-count facets declared directly on a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
}

impl Bounds {
    pub fn is_empty(&self) -> bool {
        *self == Bounds::default()
    }
}

/// A node in the schema graph.
#[derive(Debug, Clone)]
pub struct TypeNode {
    /// Absent for anonymous expression types.
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub bounds: Bounds,
    pub kind: Type,
}

impl TypeNode {
    pub fn anonymous(kind: Type) -> Self {
        Self {
            name: None,
            namespace: None,
            doc: None,
            bounds: Bounds::default(),
            kind,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.kind_name()
    }
}

/// Closed set of node kinds.
#[derive(Debug, Clone)]
pub enum Type {
    Intrinsic(Intrinsic),
    Literal(LiteralValue),
    Scalar(Scalar),
    Model(Model),
    ModelProperty(ModelProperty),
    Union(Union),
    Enum(Enum),
    EnumMember(EnumMember),
    Tuple(Vec<TypeId>),
    Namespace(Vec<TypeId>),
    /// A reference the front end could not resolve.
    Unresolved(String),
}

impl Type {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Type::Intrinsic(_) => "Intrinsic",
            Type::Literal(_) => "Literal",
            Type::Scalar(_) => "Scalar",
            Type::Model(_) => "Model",
            Type::ModelProperty(_) => "ModelProperty",
            Type::Union(_) => "Union",
            Type::Enum(_) => "Enum",
            Type::EnumMember(_) => "EnumMember",
            Type::Tuple(_) => "Tuple",
            Type::Namespace(_) => "Namespace",
            Type::Unresolved(_) => "Unresolved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Null,
    Void,
    Never,
    Unknown,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 4] = [
        Intrinsic::Null,
        Intrinsic::Void,
        Intrinsic::Never,
        Intrinsic::Unknown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Null => "null",
            Intrinsic::Void => "void",
            Intrinsic::Never => "never",
            Intrinsic::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

/// Standard library scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdScalar {
    Numeric,
    Integer,
    Int64,
    Int32,
    Int16,
    Int8,
    SafeInt,
    Uint64,
    Uint32,
    Uint16,
    Uint8,
    Float,
    Float64,
    Float32,
    Decimal,
    Decimal128,
    String,
    Url,
    Boolean,
    Bytes,
    PlainDate,
    PlainTime,
    UtcDateTime,
    OffsetDateTime,
    Duration,
}

impl StdScalar {
    /// Declaration order: every scalar appears after its base.
    pub const ALL: [StdScalar; 25] = [
        StdScalar::Numeric,
        StdScalar::Integer,
        StdScalar::Int64,
        StdScalar::Int32,
        StdScalar::Int16,
        StdScalar::Int8,
        StdScalar::SafeInt,
        StdScalar::Uint64,
        StdScalar::Uint32,
        StdScalar::Uint16,
        StdScalar::Uint8,
        StdScalar::Float,
        StdScalar::Float64,
        StdScalar::Float32,
        StdScalar::Decimal,
        StdScalar::Decimal128,
        StdScalar::String,
        StdScalar::Url,
        StdScalar::Boolean,
        StdScalar::Bytes,
        StdScalar::PlainDate,
        StdScalar::PlainTime,
        StdScalar::UtcDateTime,
        StdScalar::OffsetDateTime,
        StdScalar::Duration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StdScalar::Numeric => "numeric",
            StdScalar::Integer => "integer",
            StdScalar::Int64 => "int64",
            StdScalar::Int32 => "int32",
            StdScalar::Int16 => "int16",
            StdScalar::Int8 => "int8",
            StdScalar::SafeInt => "safeint",
            StdScalar::Uint64 => "uint64",
            StdScalar::Uint32 => "uint32",
            StdScalar::Uint16 => "uint16",
            StdScalar::Uint8 => "uint8",
            StdScalar::Float => "float",
            StdScalar::Float64 => "float64",
            StdScalar::Float32 => "float32",
            StdScalar::Decimal => "decimal",
            StdScalar::Decimal128 => "decimal128",
            StdScalar::String => "string",
            StdScalar::Url => "url",
            StdScalar::Boolean => "boolean",
            StdScalar::Bytes => "bytes",
            StdScalar::PlainDate => "plainDate",
            StdScalar::PlainTime => "plainTime",
            StdScalar::UtcDateTime => "utcDateTime",
            StdScalar::OffsetDateTime => "offsetDateTime",
            StdScalar::Duration => "duration",
        }
    }

    /// The scalar this one extends in the standard library.
    pub fn base(self) -> Option<StdScalar> {
        match self {
            StdScalar::Integer | StdScalar::Float | StdScalar::Decimal => Some(StdScalar::Numeric),
            StdScalar::Int64 | StdScalar::Uint64 => Some(StdScalar::Integer),
            StdScalar::Int32 | StdScalar::SafeInt => Some(StdScalar::Int64),
            StdScalar::Int16 => Some(StdScalar::Int32),
            StdScalar::Int8 => Some(StdScalar::Int16),
            StdScalar::Uint32 => Some(StdScalar::Uint64),
            StdScalar::Uint16 => Some(StdScalar::Uint32),
            StdScalar::Uint8 => Some(StdScalar::Uint16),
            StdScalar::Float64 => Some(StdScalar::Float),
            StdScalar::Float32 => Some(StdScalar::Float64),
            StdScalar::Decimal128 => Some(StdScalar::Decimal),
            StdScalar::Url => Some(StdScalar::String),
            StdScalar::Numeric
            | StdScalar::String
            | StdScalar::Boolean
            | StdScalar::Bytes
            | StdScalar::PlainDate
            | StdScalar::PlainTime
            | StdScalar::UtcDateTime
            | StdScalar::OffsetDateTime
            | StdScalar::Duration => None,
        }
    }
}

/// Wire encoding declared on a scalar (e.g. `unixTimestamp` over `int32`).
#[derive(Debug, Clone)]
pub struct Encoding {
    pub name: String,
    pub target: TypeId,
}

#[derive(Debug, Clone, Default)]
pub struct Scalar {
    pub base: Option<TypeId>,
    pub encoding: Option<Encoding>,
}

/// Key/value pair of an array or record model.
#[derive(Debug, Clone, Copy)]
pub struct Indexer {
    pub key: TypeId,
    pub value: TypeId,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Declaration order is preserved.
    pub properties: IndexMap<String, ModelProperty>,
    pub base: Option<TypeId>,
    pub indexer: Option<Indexer>,
    /// Explicit error flag (`@error`).
    pub error: bool,
}

#[derive(Debug, Clone)]
pub struct ModelProperty {
    pub name: String,
    pub ty: TypeId,
    pub optional: bool,
    pub default: Option<Value>,
    pub key: bool,
    /// Phases the property is visible in; `None` means every phase.
    pub visibility: Option<Vec<Phase>>,
    pub bounds: Bounds,
    pub doc: Option<String>,
}

impl ModelProperty {
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            default: None,
            key: false,
            visibility: None,
            bounds: Bounds::default(),
            doc: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn visible_in(mut self, phases: &[Phase]) -> Self {
        self.visibility = Some(phases.to_vec());
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// Envelope style of a discriminated union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStyle {
    /// Variants are wrapped as `{<discriminator>: name, <envelope>: payload}`.
    #[default]
    Object,
    /// Variants carry the discriminator themselves.
    None,
}

#[derive(Debug, Clone)]
pub struct Discriminator {
    pub property: String,
    pub envelope: EnvelopeStyle,
    pub envelope_property: String,
}

#[derive(Debug, Clone)]
pub struct UnionVariant {
    pub name: Option<String>,
    pub ty: TypeId,
}

#[derive(Debug, Clone, Default)]
pub struct Union {
    pub variants: Vec<UnionVariant>,
    pub discriminator: Option<Discriminator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    String(String),
    Number(f64),
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<EnumValue>,
}

#[derive(Debug, Clone, Default)]
pub struct Enum {
    pub members: Vec<EnumMember>,
}

/// Arena of schema nodes plus the name table of declarations.
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    nodes: Vec<TypeNode>,
    std_scalars: HashMap<StdScalar, TypeId>,
    intrinsics: HashMap<Intrinsic, TypeId>,
    declarations: IndexMap<String, TypeId>,
    arrays: HashMap<TypeId, TypeId>,
    records: HashMap<TypeId, TypeId>,
    entities: Option<Vec<String>>,
}

impl Default for SchemaGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaGraph {
    /// Create a graph with the standard library preloaded.
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            std_scalars: HashMap::new(),
            intrinsics: HashMap::new(),
            declarations: IndexMap::new(),
            arrays: HashMap::new(),
            records: HashMap::new(),
            entities: None,
        };

        for intrinsic in Intrinsic::ALL {
            let id = graph.add(TypeNode {
                name: Some(intrinsic.name().to_string()),
                namespace: Some(STD_NAMESPACE.to_string()),
                doc: None,
                bounds: Bounds::default(),
                kind: Type::Intrinsic(intrinsic),
            });
            graph.intrinsics.insert(intrinsic, id);
        }

        for scalar in StdScalar::ALL {
            let base = scalar.base().map(|b| graph.std_scalars[&b]);
            let id = graph.add(TypeNode {
                name: Some(scalar.name().to_string()),
                namespace: Some(STD_NAMESPACE.to_string()),
                doc: None,
                bounds: Bounds::default(),
                kind: Type::Scalar(Scalar {
                    base,
                    encoding: None,
                }),
            });
            graph.std_scalars.insert(scalar, id);
        }

        graph
    }

    /// Add a node and return its id.
    pub fn add(&mut self, node: TypeNode) -> TypeId {
        let id = TypeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Add a named declaration in `namespace`.
    ///
    /// Returns `None` if a declaration with the same name already exists.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        namespace: Option<&str>,
        kind: Type,
    ) -> Option<TypeId> {
        let name = name.into();
        if self.declarations.contains_key(&name) || self.builtin(&name).is_some() {
            return None;
        }
        let id = self.add(TypeNode {
            name: Some(name.clone()),
            namespace: namespace.map(String::from),
            doc: None,
            bounds: Bounds::default(),
            kind,
        });
        self.declarations.insert(name, id);
        Some(id)
    }

    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: TypeId) -> &mut TypeNode {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: TypeId) -> &Type {
        &self.nodes[id.0].kind
    }

    pub fn name(&self, id: TypeId) -> Option<&str> {
        self.nodes[id.0].name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn std(&self, scalar: StdScalar) -> TypeId {
        self.std_scalars[&scalar]
    }

    /// The standard scalar `id` is, if any.
    pub fn as_std(&self, id: TypeId) -> Option<StdScalar> {
        self.std_scalars
            .iter()
            .find(|(_, sid)| **sid == id)
            .map(|(s, _)| *s)
    }

    /// Nearest standard scalar in `id`'s base chain.
    pub fn nearest_std(&self, id: TypeId) -> Option<StdScalar> {
        self.scalar_chain(id).find_map(|s| self.as_std(s))
    }

    pub fn intrinsic(&self, intrinsic: Intrinsic) -> TypeId {
        self.intrinsics[&intrinsic]
    }

    /// Look up a builtin scalar or intrinsic by name.
    pub fn builtin(&self, name: &str) -> Option<TypeId> {
        StdScalar::ALL
            .iter()
            .find(|s| s.name() == name)
            .map(|s| self.std(*s))
            .or_else(|| {
                Intrinsic::ALL
                    .iter()
                    .find(|i| i.name() == name)
                    .map(|i| self.intrinsic(*i))
            })
    }

    /// Look up a declaration by name, falling back to builtins.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.declarations
            .get(name)
            .copied()
            .or_else(|| self.builtin(name))
    }

    /// User declarations in declaration order.
    pub fn declarations(&self) -> impl Iterator<Item = (&str, TypeId)> {
        self.declarations.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Entity names configured on the graph, if any.
    pub fn entities(&self) -> Option<&[String]> {
        self.entities.as_deref()
    }

    pub fn set_entities(&mut self, names: Vec<String>) {
        self.entities = Some(names);
    }

    /// Add an explicit unresolved-reference sentinel.
    pub fn unresolved(&mut self, reference: impl Into<String>) -> TypeId {
        self.add(TypeNode::anonymous(Type::Unresolved(reference.into())))
    }

    /// Anonymous array of `element`, interned per element type.
    pub fn array_of(&mut self, element: TypeId) -> TypeId {
        if let Some(id) = self.arrays.get(&element) {
            return *id;
        }
        let key = self.std(StdScalar::Integer);
        let id = self.add(TypeNode::anonymous(Type::Model(Model {
            indexer: Some(Indexer {
                key,
                value: element,
            }),
            ..Model::default()
        })));
        self.arrays.insert(element, id);
        id
    }

    /// Anonymous string-keyed record of `value`, interned per value type.
    pub fn record_of(&mut self, value: TypeId) -> TypeId {
        if let Some(id) = self.records.get(&value) {
            return *id;
        }
        let key = self.std(StdScalar::String);
        let id = self.add(TypeNode::anonymous(Type::Model(Model {
            indexer: Some(Indexer { key, value }),
            ..Model::default()
        })));
        self.records.insert(value, id);
        id
    }

    /// True if the node lives in a library namespace.
    pub fn is_builtin(&self, id: TypeId) -> bool {
        self.nodes[id.0]
            .namespace
            .as_deref()
            .map(|ns| BUILTIN_NAMESPACES.contains(&ns))
            .unwrap_or(false)
    }

    pub fn is_unresolved(&self, id: TypeId) -> bool {
        matches!(self.kind(id), Type::Unresolved(_))
    }

    pub fn as_model(&self, id: TypeId) -> Option<&Model> {
        match self.kind(id) {
            Type::Model(model) => Some(model),
            _ => None,
        }
    }

    /// True if the model is an array (indexer keyed by `integer`).
    pub fn model_is_array(&self, model: &Model) -> bool {
        model
            .indexer
            .map(|ix| ix.key == self.std(StdScalar::Integer))
            .unwrap_or(false)
    }

    /// True if the model carries a string-keyed indexer.
    pub fn model_is_record(&self, model: &Model) -> bool {
        model
            .indexer
            .map(|ix| ix.key == self.std(StdScalar::String))
            .unwrap_or(false)
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        self.as_model(id)
            .map(|m| self.model_is_array(m))
            .unwrap_or(false)
    }

    pub fn is_record(&self, id: TypeId) -> bool {
        self.as_model(id)
            .map(|m| self.model_is_record(m))
            .unwrap_or(false)
    }

    /// True if the node may be emitted once and referenced by name.
    pub fn is_declaration(&self, id: TypeId) -> bool {
        let node = &self.nodes[id.0];
        match &node.kind {
            Type::Model(model) => {
                node.name.is_some() && !self.model_is_array(model) && !self.model_is_record(model)
            }
            Type::Union(_) | Type::Enum(_) | Type::Scalar(_) => node.name.is_some(),
            Type::Intrinsic(_)
            | Type::Literal(_)
            | Type::ModelProperty(_)
            | Type::EnumMember(_)
            | Type::Tuple(_)
            | Type::Namespace(_)
            | Type::Unresolved(_) => false,
        }
    }

    /// True if generated output should reference this node by name.
    pub fn should_reference(&self, id: TypeId) -> bool {
        self.is_declaration(id) && !self.is_builtin(id)
    }

    /// True if `id` is `scalar` or extends it through its base chain.
    pub fn extends(&self, id: TypeId, scalar: StdScalar) -> bool {
        let target = self.std(scalar);
        self.scalar_chain(id).any(|s| s == target)
    }

    /// Nearest encoding declared along the scalar chain.
    pub fn encoding(&self, id: TypeId) -> Option<&Encoding> {
        self.scalar_chain(id).find_map(|s| match self.kind(s) {
            Type::Scalar(scalar) => scalar.encoding.as_ref(),
            _ => None,
        })
    }

    /// True if following encoding targets from `id` comes back to a
    /// scalar already visited.
    pub fn has_encoding_cycle(&self, id: TypeId) -> bool {
        let mut seen = HashSet::new();
        let mut current = id;
        while let Some(encoding) = self.encoding(current) {
            if !seen.insert(current) {
                return true;
            }
            current = encoding.target;
        }
        false
    }

    /// The scalar and its bases, nearest first. Empty for non-scalars.
    pub fn scalar_chain(&self, id: TypeId) -> ScalarChain<'_> {
        ScalarChain {
            graph: self,
            next: Some(id),
            seen: HashSet::new(),
        }
    }

    /// True for error shapes, which are never addressed by key.
    pub fn is_error_model(&self, id: TypeId) -> bool {
        let Some(model) = self.as_model(id) else {
            return false;
        };
        if model.error {
            return true;
        }
        if self
            .name(id)
            .map(|n| ERROR_MODEL_NAMES.contains(&n))
            .unwrap_or(false)
        {
            return true;
        }
        model
            .base
            .and_then(|b| self.name(b))
            .map(|n| n == "Error")
            .unwrap_or(false)
    }
}

/// Iterator over a scalar's base chain.
pub struct ScalarChain<'g> {
    graph: &'g SchemaGraph,
    next: Option<TypeId>,
    seen: HashSet<TypeId>,
}

impl Iterator for ScalarChain<'_> {
    type Item = TypeId;

    fn next(&mut self) -> Option<TypeId> {
        let id = self.next.take()?;
        let Type::Scalar(scalar) = self.graph.kind(id) else {
            return None;
        };
        if !self.seen.insert(id) {
            return None;
        }
        self.next = scalar.base;
        Some(id)
    }
}
