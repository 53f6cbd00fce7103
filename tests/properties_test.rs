//! Property-based tests for constraint merging, ordering and projection.

use std::collections::HashMap;

use proptest::prelude::*;
use schema_zod::graph::{Model, ModelProperty, SchemaGraph, StdScalar, Type};
use schema_zod::{
    compile, dependencies, load_graph_str, project, topological_components, Constraints,
    EmitOptions, Phase,
};
use serde_json::json;

fn constraints() -> impl Strategy<Value = Constraints> {
    (
        proptest::option::of(-1000i32..1000),
        proptest::option::of(-1000i32..1000),
        proptest::option::of(0u64..100),
        proptest::option::of(0u64..100),
    )
        .prop_map(|(min_value, max_value, min_length, max_length)| Constraints {
            min_value: min_value.map(f64::from),
            max_value: max_value.map(f64::from),
            min_length,
            max_length,
            ..Constraints::default()
        })
}

proptest! {
    #[test]
    fn merge_is_idempotent(c in constraints()) {
        let mut merged = c;
        merged.merge(&c);
        prop_assert_eq!(merged, c);
    }

    #[test]
    fn merge_keeps_tighter_bounds(a in constraints(), b in constraints()) {
        let mut merged = a;
        merged.merge(&b);

        let expect_min = match (a.min_value, b.min_value) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (x, y) => x.or(y),
        };
        let expect_max = match (a.max_length, b.max_length) {
            (Some(x), Some(y)) => Some(x.min(y)),
            (x, y) => x.or(y),
        };
        prop_assert_eq!(merged.min_value, expect_min);
        prop_assert_eq!(merged.max_length, expect_max);
    }

    #[test]
    fn merge_is_commutative(a in constraints(), b in constraints()) {
        let mut ab = a;
        ab.merge(&b);
        let mut ba = b;
        ba.merge(&a);
        prop_assert_eq!(ab, ba);
    }
}

/// Models `M0..Mn` where `edges[i]` lists the models `Mi` references.
fn reference_graph(edges: &[Vec<usize>]) -> String {
    let models: Vec<_> = edges
        .iter()
        .enumerate()
        .map(|(i, targets)| {
            let properties: Vec<_> = targets
                .iter()
                .enumerate()
                .map(|(j, t)| json!({ "name": format!("p{j}"), "type": format!("M{t}"), "optional": true }))
                .collect();
            json!({ "name": format!("M{i}"), "properties": properties })
        })
        .collect();
    json!({ "namespace": "Gen", "models": models }).to_string()
}

fn edges() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..8).prop_flat_map(|n| proptest::collection::vec(proptest::collection::vec(0..n, 0..3), n))
}

proptest! {
    #[test]
    fn components_are_dependency_first(edges in edges()) {
        let graph = load_graph_str(&reference_graph(&edges)).unwrap();
        let ids: Vec<_> = (0..edges.len())
            .map(|i| graph.lookup(&format!("M{i}")).unwrap())
            .collect();

        let components = topological_components(&graph, &ids);
        let position: HashMap<_, _> = components
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.iter().map(move |id| (*id, i)))
            .collect();

        prop_assert_eq!(position.len(), ids.len());
        for id in &ids {
            for dep in dependencies(&graph, *id) {
                prop_assert!(position[&dep] <= position[id]);
            }
        }
    }

    #[test]
    fn every_declaration_is_emitted_once(edges in edges()) {
        let graph = load_graph_str(&reference_graph(&edges)).unwrap();
        let source = compile(&graph, &EmitOptions::default()).unwrap().render();
        for i in 0..edges.len() {
            let declaration = format!("export const M{i} = ");
            prop_assert_eq!(source.matches(&declaration).count(), 1);
        }
    }
}

fn phases() -> impl Strategy<Value = Option<Vec<Phase>>> {
    proptest::option::of(proptest::sample::subsequence(
        vec![Phase::Create, Phase::Read, Phase::Update, Phase::Delete, Phase::Query],
        0..=5,
    ))
}

proptest! {
    #[test]
    fn update_requires_key_and_relaxes_the_rest(
        visibility in proptest::collection::vec((phases(), any::<bool>()), 0..6),
        key_visibility in phases(),
    ) {
        let mut graph = SchemaGraph::new();
        let string = graph.std(StdScalar::String);

        let mut model = Model::default();
        let mut key = ModelProperty::new("id", string).key();
        key.visibility = key_visibility;
        model.properties.insert("id".into(), key);
        for (i, (phases, optional)) in visibility.iter().enumerate() {
            let mut prop = ModelProperty::new(format!("p{i}"), string);
            prop.visibility = phases.clone();
            prop.optional = *optional;
            model.properties.insert(prop.name.clone(), prop);
        }
        let id = graph.declare("Thing", Some("Gen"), Type::Model(model)).unwrap();

        let update = project(&graph, id, Phase::Update).unwrap();
        let key = &update.properties["id"];
        prop_assert!(!key.optional);

        for (i, (phases, _)) in visibility.iter().enumerate() {
            let name = format!("p{i}");
            let visible = phases.as_ref().map(|p| p.contains(&Phase::Update)).unwrap_or(true);
            match update.properties.get(&name) {
                Some(prop) => {
                    prop_assert!(visible);
                    prop_assert!(prop.optional);
                }
                None => prop_assert!(!visible),
            }
        }
    }
}
