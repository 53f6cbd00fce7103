//! Composite validator builder.
//!
//! [`CompileContext`] is the per-run state: the declaration cache (which
//! declarations have been emitted, first visit wins) and the diagnostics
//! collected while building. Builders never fail; anything that cannot be
//! resolved degrades to `unknown` with an explanatory description.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::warn;

use crate::constraints::{self, Constraints};
use crate::expr::{Base, Check, Literal, ValidatorExpr};
use crate::graph::{
    EnumValue, EnvelopeStyle, Intrinsic, LiteralValue, Model, ModelProperty, SchemaGraph,
    StdScalar, Type, TypeId, Union,
};
use crate::scalar::map_scalar;
use crate::types::Diagnostic;

/// Diagnostic code for an unresolved reference.
pub const UNRESOLVED_CODE: &str = "W001";

const UNRESOLVED_NOTE: &str =
    "unresolved reference due to circular, parent, or namespace references; defaulting to unknown";

/// Per-run compilation state.
pub struct CompileContext<'g> {
    graph: &'g SchemaGraph,
    emitted: HashMap<TypeId, String>,
    inlining: HashSet<TypeId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'g> CompileContext<'g> {
    pub fn new(graph: &'g SchemaGraph) -> Self {
        Self {
            graph,
            emitted: HashMap::new(),
            inlining: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn graph(&self) -> &'g SchemaGraph {
        self.graph
    }

    /// Record `id` as emitted under `name`. Returns false if it already was.
    pub fn mark_emitted(&mut self, id: TypeId, name: impl Into<String>) -> bool {
        if self.emitted.contains_key(&id) {
            return false;
        }
        self.emitted.insert(id, name.into());
        true
    }

    pub fn is_emitted(&self, id: TypeId) -> bool {
        self.emitted.contains_key(&id)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn unresolved(&mut self, path: &str, reference: &str) -> ValidatorExpr {
        warn!(path, reference, "unresolved reference, defaulting to unknown");
        self.diagnostics.push(Diagnostic::warning(
            UNRESOLVED_CODE,
            path,
            format!("unresolved reference `{reference}`"),
        ));
        ValidatorExpr::unknown().with(Check::Describe(UNRESOLVED_NOTE.to_string()))
    }

    /// Validator for a use site of `id`: a reference for declarations,
    /// otherwise the inline validator.
    pub fn build_type(&mut self, id: TypeId, path: &str) -> ValidatorExpr {
        if let Some(reference) = self.reference(id) {
            return reference;
        }
        self.build_inline(id, path)
    }

    fn reference(&self, id: TypeId) -> Option<ValidatorExpr> {
        if !self.graph.should_reference(id) {
            return None;
        }
        let name = self.graph.name(id)?.to_string();
        if let Type::Enum(_) = self.graph.kind(id) {
            return Some(ValidatorExpr::new(Base::NativeEnum(name)));
        }
        if self.is_emitted(id) {
            Some(ValidatorExpr::new(Base::Ref(name)))
        } else {
            Some(ValidatorExpr::new(Base::Lazy(name)))
        }
    }

    /// Body of a declaration: `id` built inline, never as a reference to
    /// itself at the top level.
    pub fn build_declaration(&mut self, id: TypeId) -> ValidatorExpr {
        let path = self.graph.name(id).unwrap_or_default().to_string();
        self.build_inline(id, &path)
    }

    fn build_inline(&mut self, id: TypeId, path: &str) -> ValidatorExpr {
        let graph = self.graph;
        if !self.inlining.insert(id) {
            // A named non-declaration that contains itself has no const to
            // refer back to.
            return match graph.name(id) {
                Some(name) => {
                    let name = name.to_string();
                    self.unresolved(path, &name)
                }
                None => ValidatorExpr::unknown(),
            };
        }

        let expr = match graph.kind(id) {
            Type::Intrinsic(intrinsic) => ValidatorExpr::new(match intrinsic {
                Intrinsic::Null => Base::Null,
                Intrinsic::Void => Base::Void,
                Intrinsic::Never => Base::Never,
                Intrinsic::Unknown => Base::Unknown,
            }),
            Type::Literal(value) => ValidatorExpr::literal(literal(value)),
            Type::Scalar(_) => map_scalar(graph, id, &constraints::extract(graph, id)),
            Type::Model(model) => {
                let bounds = constraints::extract(graph, id);
                let mut expr = self.build_model_with(model, &bounds, path);
                if graph.is_declaration(id) {
                    if let Some(doc) = &graph.node(id).doc {
                        expr.push(Check::Describe(doc.clone()));
                    }
                }
                expr
            }
            Type::ModelProperty(prop) => self.build_property(prop, path),
            Type::Union(union) => {
                let mut expr = self.build_union(union, graph.name(id).is_some(), path);
                if let Some(doc) = &graph.node(id).doc {
                    expr.push(Check::Describe(doc.clone()));
                }
                expr
            }
            Type::Enum(_) => ValidatorExpr::new(Base::NativeEnum(
                graph.name(id).unwrap_or_default().to_string(),
            )),
            Type::EnumMember(member) => ValidatorExpr::literal(match &member.value {
                Some(EnumValue::String(s)) => Literal::String(s.clone()),
                Some(EnumValue::Number(n)) => Literal::Number(*n),
                None => Literal::String(member.name.clone()),
            }),
            Type::Tuple(items) => {
                let items = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.build_type(*item, &format!("{path}/{i}")))
                    .collect();
                ValidatorExpr::new(Base::Tuple(items))
            }
            Type::Namespace(_) => ValidatorExpr::any(),
            Type::Unresolved(reference) => self.unresolved(path, reference),
        };

        self.inlining.remove(&id);
        expr
    }

    /// Validator for a model value, e.g. a projection that is not in the
    /// graph.
    pub fn build_model_value(&mut self, model: &Model, path: &str) -> ValidatorExpr {
        self.build_model_with(model, &Constraints::default(), path)
    }

    fn build_model_with(&mut self, model: &Model, bounds: &Constraints, path: &str) -> ValidatorExpr {
        let graph = self.graph;

        if let Some(indexer) = model.indexer {
            if graph.model_is_array(model) {
                return self.build_array(indexer.value, bounds, path);
            }
            if graph.model_is_record(model) {
                let key = self.build_type(indexer.key, path);
                let value = self.build_type(indexer.value, &format!("{path}/*"));
                let record = ValidatorExpr::new(Base::Record(Box::new(key), Box::new(value)));
                if model.properties.is_empty() && model.base.is_none() {
                    return record;
                }
                let object = self.build_object(model, path);
                return ValidatorExpr::new(Base::Intersection(Box::new(object), Box::new(record)));
            }
        }

        self.build_object(model, path)
    }

    fn build_array(&mut self, element: TypeId, bounds: &Constraints, path: &str) -> ValidatorExpr {
        let item = self.build_type(element, &format!("{path}/[]"));
        let mut expr = ValidatorExpr::new(Base::Array(Box::new(item)));
        if let Some(min) = bounds.min_items {
            expr.push(Check::MinItems(min));
        }
        if let Some(max) = bounds.max_items {
            expr.push(Check::MaxItems(max));
        }
        expr
    }

    /// Own properties, combined with the base model.
    fn build_object(&mut self, model: &Model, path: &str) -> ValidatorExpr {
        let members = self.build_members(&model.properties, path);

        let Some(base) = model.base else {
            return ValidatorExpr::object(members);
        };
        let graph = self.graph;

        if let Type::Unresolved(reference) = graph.kind(base) {
            let placeholder = self.unresolved(path, reference);
            if members.is_empty() {
                return placeholder;
            }
            return ValidatorExpr::object(members);
        }

        if graph.should_reference(base) && self.is_emitted(base) {
            let name = graph.name(base).unwrap_or_default().to_string();
            return ValidatorExpr::new(Base::Merge {
                base: Box::new(ValidatorExpr::new(Base::Ref(name))),
                extension: members,
            });
        }

        // Base not available by name: flatten it in.
        let inherited = if self.inlining.contains(&base) {
            ValidatorExpr::object(IndexMap::new())
        } else {
            let base_path = graph.name(base).unwrap_or(path).to_string();
            strip_describe(self.build_inline(base, &base_path))
        };
        combine(inherited, members)
    }

    fn build_members(
        &mut self,
        properties: &IndexMap<String, ModelProperty>,
        path: &str,
    ) -> IndexMap<String, ValidatorExpr> {
        properties
            .iter()
            .map(|(name, prop)| {
                let prop_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{path}/{name}")
                };
                (name.clone(), self.build_property(prop, &prop_path))
            })
            .collect()
    }

    /// Validator for one property: its type, constraints, then the
    /// optional, default and description wrappers in that order.
    pub fn build_property(&mut self, prop: &ModelProperty, path: &str) -> ValidatorExpr {
        let graph = self.graph;
        let mut expr = if let Type::Unresolved(reference) = graph.kind(prop.ty) {
            self.unresolved(path, reference)
        } else if let Some(mut reference) = self.reference(prop.ty) {
            append_local_bounds(graph, &mut reference, prop.ty, &constraints::local(prop));
            reference
        } else {
            match graph.kind(prop.ty) {
                Type::Scalar(_) => {
                    map_scalar(graph, prop.ty, &constraints::extract_property(graph, prop))
                }
                Type::Model(model) if graph.model_is_array(model) => {
                    let element = model.indexer.map(|ix| ix.value).unwrap_or(prop.ty);
                    self.build_array(element, &constraints::extract_property(graph, prop), path)
                }
                _ => self.build_inline(prop.ty, path),
            }
        };

        if prop.optional {
            expr.push(Check::Optional);
        }
        if let Some(default) = &prop.default {
            expr.push(Check::Default(default.clone()));
        }
        if let Some(doc) = &prop.doc {
            expr.push(Check::Describe(doc.clone()));
        }
        expr
    }

    fn build_union(&mut self, union: &Union, named: bool, path: &str) -> ValidatorExpr {
        let discriminator = union.discriminator.as_ref().filter(|_| named);

        let Some(disc) = discriminator else {
            let mut variants: Vec<ValidatorExpr> = union
                .variants
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let label = v.name.clone().unwrap_or_else(|| i.to_string());
                    self.build_type(v.ty, &format!("{path}/{label}"))
                })
                .collect();
            return match variants.len() {
                0 => ValidatorExpr::new(Base::Never),
                1 => variants.remove(0),
                _ => ValidatorExpr::new(Base::Union(variants)),
            };
        };

        let variants = union
            .variants
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let label = v
                    .name
                    .clone()
                    .or_else(|| self.graph.name(v.ty).map(String::from))
                    .unwrap_or_else(|| i.to_string());
                let payload = self.build_type(v.ty, &format!("{path}/{label}"));
                match disc.envelope {
                    EnvelopeStyle::Object => {
                        let mut members = IndexMap::new();
                        members.insert(
                            disc.property.clone(),
                            ValidatorExpr::literal(Literal::String(label)),
                        );
                        members.insert(disc.envelope_property.clone(), payload);
                        ValidatorExpr::object(members)
                    }
                    EnvelopeStyle::None => payload,
                }
            })
            .collect();

        ValidatorExpr::new(Base::DiscriminatedUnion {
            discriminator: disc.property.clone(),
            variants,
        })
    }
}

fn strip_describe(mut expr: ValidatorExpr) -> ValidatorExpr {
    expr.chain.retain(|c| !matches!(c, Check::Describe(_)));
    expr
}

/// Extend an inherited validator with own members.
fn combine(inherited: ValidatorExpr, own: IndexMap<String, ValidatorExpr>) -> ValidatorExpr {
    let ValidatorExpr { base, chain } = inherited;
    match base {
        Base::Object(mut members) if chain.is_empty() => {
            for (name, expr) in own {
                members.insert(name, expr);
            }
            ValidatorExpr::object(members)
        }
        Base::Merge { base, mut extension } if chain.is_empty() => {
            for (name, expr) in own {
                extension.insert(name, expr);
            }
            ValidatorExpr::new(Base::Merge { base, extension })
        }
        base if own.is_empty() => ValidatorExpr { base, chain },
        base => ValidatorExpr::new(Base::Intersection(
            Box::new(ValidatorExpr { base, chain }),
            Box::new(ValidatorExpr::object(own)),
        )),
    }
}

fn literal(value: &LiteralValue) -> Literal {
    match value {
        LiteralValue::String(s) => Literal::String(s.clone()),
        LiteralValue::Number(n) => Literal::Number(*n),
        LiteralValue::Boolean(b) => Literal::Boolean(*b),
    }
}

/// Append property-local bounds to a reference, by the referenced type's
/// underlying kind.
fn append_local_bounds(
    graph: &SchemaGraph,
    expr: &mut ValidatorExpr,
    ty: TypeId,
    local: &Constraints,
) {
    let Some(std) = graph.nearest_std(ty) else {
        return;
    };
    match std {
        StdScalar::String | StdScalar::Url => {
            if let Some(min) = local.min_length {
                expr.push(Check::MinLength(min));
            }
            if let Some(max) = local.max_length {
                expr.push(Check::MaxLength(max));
            }
        }
        StdScalar::Int64 | StdScalar::Uint64 | StdScalar::Integer => {
            if let Some(min) = local.min_value {
                expr.push(Check::Gte(min.ceil() as i128));
            }
            if let Some(max) = local.max_value {
                expr.push(Check::Lte(max.floor() as i128));
            }
        }
        s if graph.extends(graph.std(s), StdScalar::Numeric) => {
            if let Some(min) = local.min_value {
                expr.push(Check::MinValue(min));
            }
            if let Some(max) = local.max_value {
                expr.push(Check::MaxValue(max));
            }
        }
        _ => {}
    }
}
