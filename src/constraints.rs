//! Constraint extraction.
//!
//! Facets are collected from a property, then its type, then the type's
//! base scalar chain. Merging is tighter-wins: a lower bound replaces the
//! current one only if strictly greater, an upper bound only if strictly
//! smaller. `optional` comes from the property alone.

use crate::graph::{Bounds, ModelProperty, SchemaGraph, Type, TypeId};

/// Effective constraints of a property or type.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Constraints {
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub optional: bool,
}

impl Constraints {
    /// Merge `bounds` into `self`, keeping the tighter value per facet.
    pub fn merge_bounds(&mut self, bounds: &Bounds) {
        self.min_value = tighter_min(self.min_value, bounds.min_value);
        self.max_value = tighter_max(self.max_value, bounds.max_value);
        self.min_length = tighter_min(self.min_length, bounds.min_length);
        self.max_length = tighter_max(self.max_length, bounds.max_length);
        self.min_items = tighter_min(self.min_items, bounds.min_items);
        self.max_items = tighter_max(self.max_items, bounds.max_items);
    }

    /// Merge another constraint set. `optional` is or-ed.
    pub fn merge(&mut self, other: &Constraints) {
        self.merge_bounds(&other.as_bounds());
        self.optional |= other.optional;
    }

    pub fn as_bounds(&self) -> Bounds {
        Bounds {
            min_value: self.min_value,
            max_value: self.max_value,
            min_length: self.min_length,
            max_length: self.max_length,
            min_items: self.min_items,
            max_items: self.max_items,
        }
    }

    pub fn has_numeric(&self) -> bool {
        self.min_value.is_some() || self.max_value.is_some()
    }

    pub fn has_length(&self) -> bool {
        self.min_length.is_some() || self.max_length.is_some()
    }

    pub fn has_items(&self) -> bool {
        self.min_items.is_some() || self.max_items.is_some()
    }
}

fn tighter_min<T: PartialOrd + Copy>(current: Option<T>, candidate: Option<T>) -> Option<T> {
    match (current, candidate) {
        (Some(c), Some(n)) if n > c => Some(n),
        (None, n) => n,
        (c, _) => c,
    }
}

fn tighter_max<T: PartialOrd + Copy>(current: Option<T>, candidate: Option<T>) -> Option<T> {
    match (current, candidate) {
        (Some(c), Some(n)) if n < c => Some(n),
        (None, n) => n,
        (c, _) => c,
    }
}

/// Constraints of a type node: its own facets plus its base scalar chain.
pub fn extract(graph: &SchemaGraph, id: TypeId) -> Constraints {
    let mut out = Constraints::default();
    out.merge_bounds(&graph.node(id).bounds);
    if let Type::Scalar(_) = graph.kind(id) {
        for base in graph.scalar_chain(id).skip(1) {
            out.merge_bounds(&graph.node(base).bounds);
        }
    }
    out
}

/// Constraints of a property: its own facets, then its type's.
pub fn extract_property(graph: &SchemaGraph, prop: &ModelProperty) -> Constraints {
    let mut out = Constraints {
        optional: prop.optional,
        ..Constraints::default()
    };
    out.merge_bounds(&prop.bounds);
    out.merge(&Constraints {
        optional: false,
        ..extract(graph, prop.ty)
    });
    out
}

/// Constraints declared on the property alone, without its type's facets.
pub fn local(prop: &ModelProperty) -> Constraints {
    let mut out = Constraints {
        optional: prop.optional,
        ..Constraints::default()
    };
    out.merge_bounds(&prop.bounds);
    out
}
