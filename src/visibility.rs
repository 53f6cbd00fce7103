//! Visibility projection.
//!
//! A projection is a fresh [`Model`] that owns its property map. The base
//! chain is flattened into it (base properties first), so projected models
//! never reference the original.
//!
//! | Phase | Properties |
//! |-------|------------|
//! | Create | visible in `create`; an unannotated key is dropped |
//! | Read, Query | visible in the phase |
//! | Update | visible in `update`, all optional with no defaults, plus the key as required |
//! | Delete | the key alone |

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::ProjectionError;
use crate::graph::{Model, ModelProperty, SchemaGraph, TypeId};
use crate::types::Phase;

/// Properties of `id` with its base chain flattened in, base first.
///
/// A derived property replaces a base property of the same name in place.
pub fn flatten_properties(graph: &SchemaGraph, id: TypeId) -> IndexMap<String, ModelProperty> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(id);
    while let Some(current) = next {
        if !seen.insert(current) {
            break;
        }
        match graph.as_model(current) {
            Some(model) => {
                chain.push(model);
                next = model.base;
            }
            None => break,
        }
    }

    let mut props = IndexMap::new();
    for model in chain.into_iter().rev() {
        for (name, prop) in &model.properties {
            props.insert(name.clone(), prop.clone());
        }
    }
    props
}

/// The key property of a model: a property with the key marker, else one
/// named `id`, searching the model and then its base chain.
pub fn find_key(graph: &SchemaGraph, id: TypeId) -> Option<ModelProperty> {
    let props = flatten_properties(graph, id);
    props
        .values()
        .find(|p| p.key)
        .or_else(|| props.get("id"))
        .cloned()
}

fn visible(prop: &ModelProperty, phase: Phase) -> bool {
    match &prop.visibility {
        Some(phases) => phases.contains(&phase),
        None => true,
    }
}

fn model_of<'g>(graph: &'g SchemaGraph, id: TypeId) -> Result<&'g Model, ProjectionError> {
    graph.as_model(id).ok_or_else(|| ProjectionError::NotAModel {
        name: graph
            .name(id)
            .map(String::from)
            .unwrap_or_else(|| graph.node(id).kind_name().to_string()),
    })
}

fn model_name(graph: &SchemaGraph, id: TypeId) -> String {
    graph.name(id).unwrap_or("<anonymous>").to_string()
}

/// Project a model for `phase`.
///
/// Fails with [`ProjectionError::MissingKey`] when an Update or Delete
/// view is requested for a keyless model that is not an error model.
pub fn project(graph: &SchemaGraph, id: TypeId, phase: Phase) -> Result<Model, ProjectionError> {
    let source = model_of(graph, id)?;
    let props = flatten_properties(graph, id);

    let properties = match phase {
        Phase::Delete => return key_view(graph, id),
        Phase::Update => {
            let key = required_key(graph, id)?;
            props
                .into_iter()
                .filter_map(|(name, prop)| {
                    if key.as_ref().map(|k| k.name == name).unwrap_or(false) {
                        let mut prop = prop;
                        prop.optional = false;
                        Some((name, prop))
                    } else if visible(&prop, Phase::Update) {
                        let mut prop = prop;
                        prop.optional = true;
                        // An absent member of a patch leaves the stored value alone.
                        prop.default = None;
                        Some((name, prop))
                    } else {
                        None
                    }
                })
                .collect()
        }
        Phase::Create => {
            let key = find_key(graph, id).map(|k| k.name);
            props
                .into_iter()
                .filter(|(name, prop)| match &prop.visibility {
                    Some(phases) => phases.contains(&Phase::Create),
                    None => key.as_deref() != Some(name.as_str()),
                })
                .collect()
        }
        Phase::Read | Phase::Query => props
            .into_iter()
            .filter(|(_, prop)| visible(prop, phase))
            .collect(),
    };

    Ok(Model {
        properties,
        base: None,
        indexer: source.indexer,
        error: source.error,
    })
}

/// The key-only view used for lookups and deletes.
pub fn key_view(graph: &SchemaGraph, id: TypeId) -> Result<Model, ProjectionError> {
    let source = model_of(graph, id)?;
    let mut properties = IndexMap::new();
    if let Some(mut key) = required_key(graph, id)? {
        key.optional = false;
        key.visibility = None;
        properties.insert(key.name.clone(), key);
    }
    Ok(Model {
        properties,
        base: None,
        indexer: None,
        error: source.error,
    })
}

/// Key of `id`, or `None` for error models that have none.
fn required_key(graph: &SchemaGraph, id: TypeId) -> Result<Option<ModelProperty>, ProjectionError> {
    match find_key(graph, id) {
        Some(key) => Ok(Some(key)),
        None if graph.is_error_model(id) => Ok(None),
        None => Err(ProjectionError::MissingKey {
            model: model_name(graph, id),
        }),
    }
}
