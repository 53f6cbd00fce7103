//! Dependency ordering of declarations.
//!
//! Declarations are partitioned into strongly connected components with
//! Tarjan's algorithm. Components come out dependency-first: nothing in a
//! component references a declaration in a later component. Members of a
//! component reference each other and need deferred (lazy) references.

use std::collections::{HashMap, HashSet};

use crate::graph::{SchemaGraph, Type, TypeId};

/// Direct outgoing edges of a node.
pub fn dependencies(graph: &SchemaGraph, id: TypeId) -> Vec<TypeId> {
    match graph.kind(id) {
        Type::Model(model) => {
            let mut deps = Vec::new();
            deps.extend(model.base);
            if let Some(ix) = model.indexer {
                deps.push(ix.key);
                deps.push(ix.value);
            }
            deps.extend(model.properties.values().map(|p| p.ty));
            deps
        }
        Type::ModelProperty(prop) => vec![prop.ty],
        Type::Union(union) => union.variants.iter().map(|v| v.ty).collect(),
        Type::Scalar(scalar) => scalar.base.into_iter().collect(),
        Type::Tuple(items) => items.clone(),
        Type::Namespace(decls) => decls.clone(),
        Type::Enum(_)
        | Type::EnumMember(_)
        | Type::Intrinsic(_)
        | Type::Literal(_)
        | Type::Unresolved(_) => Vec::new(),
    }
}

/// Strongly connected components of `nodes`, dependency-first.
///
/// Traversal passes through nodes outside `nodes` (anonymous arrays,
/// inline models) but only members of `nodes` appear in the output.
pub fn topological_components(graph: &SchemaGraph, nodes: &[TypeId]) -> Vec<Vec<TypeId>> {
    let wanted: HashSet<TypeId> = nodes.iter().copied().collect();
    let mut tarjan = Tarjan {
        graph,
        index: 0,
        indices: HashMap::new(),
        lowlink: HashMap::new(),
        stack: Vec::new(),
        on_stack: HashSet::new(),
        components: Vec::new(),
    };

    for &id in nodes {
        if !tarjan.indices.contains_key(&id) {
            tarjan.visit(id);
        }
    }

    tarjan
        .components
        .into_iter()
        .map(|component| {
            component
                .into_iter()
                .filter(|id| wanted.contains(id))
                .collect::<Vec<_>>()
        })
        .filter(|component| !component.is_empty())
        .collect()
}

struct Tarjan<'g> {
    graph: &'g SchemaGraph,
    index: usize,
    indices: HashMap<TypeId, usize>,
    lowlink: HashMap<TypeId, usize>,
    stack: Vec<TypeId>,
    on_stack: HashSet<TypeId>,
    components: Vec<Vec<TypeId>>,
}

impl Tarjan<'_> {
    fn visit(&mut self, id: TypeId) {
        self.indices.insert(id, self.index);
        self.lowlink.insert(id, self.index);
        self.index += 1;
        self.stack.push(id);
        self.on_stack.insert(id);

        for dep in dependencies(self.graph, id) {
            if !self.indices.contains_key(&dep) {
                self.visit(dep);
                let low = self.lowlink[&id].min(self.lowlink[&dep]);
                self.lowlink.insert(id, low);
            } else if self.on_stack.contains(&dep) {
                let low = self.lowlink[&id].min(self.indices[&dep]);
                self.lowlink.insert(id, low);
            }
        }

        if self.lowlink[&id] == self.indices[&id] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(&member);
                component.push(member);
                if member == id {
                    break;
                }
            }
            // Keep declaration order within a component.
            component.reverse();
            self.components.push(component);
        }
    }
}

/// True if `id` belongs to a component with another member or references
/// itself.
pub fn is_cyclic(graph: &SchemaGraph, component: &[TypeId], id: TypeId) -> bool {
    component.len() > 1 || reaches(graph, id, id)
}

fn reaches(graph: &SchemaGraph, from: TypeId, target: TypeId) -> bool {
    let mut seen = HashSet::new();
    let mut pending = dependencies(graph, from);
    while let Some(next) = pending.pop() {
        if next == target {
            return true;
        }
        if seen.insert(next) {
            pending.extend(dependencies(graph, next));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Model, ModelProperty, StdScalar};

    fn model(graph: &mut SchemaGraph, name: &str) -> TypeId {
        graph
            .declare(name, Some("App"), Type::Model(Model::default()))
            .unwrap()
    }

    fn add_prop(graph: &mut SchemaGraph, owner: TypeId, name: &str, ty: TypeId) {
        if let Type::Model(m) = &mut graph.node_mut(owner).kind {
            m.properties
                .insert(name.to_string(), ModelProperty::new(name, ty));
        }
    }

    fn position(components: &[Vec<TypeId>], id: TypeId) -> usize {
        components
            .iter()
            .position(|c| c.contains(&id))
            .unwrap()
    }

    #[test]
    fn dependency_first() {
        let mut graph = SchemaGraph::new();
        let todo = model(&mut graph, "Todo");
        let user = model(&mut graph, "User");
        add_prop(&mut graph, todo, "owner", user);

        let comps = topological_components(&graph, &[todo, user]);
        assert_eq!(comps.len(), 2);
        assert!(position(&comps, user) < position(&comps, todo));
    }

    #[test]
    fn mutual_recursion_shares_component() {
        let mut graph = SchemaGraph::new();
        let a = model(&mut graph, "A");
        let b = model(&mut graph, "B");
        add_prop(&mut graph, a, "b", b);
        add_prop(&mut graph, b, "a", a);

        let comps = topological_components(&graph, &[a, b]);
        assert_eq!(comps, vec![vec![a, b]]);
        assert!(is_cyclic(&graph, &comps[0], a));
    }

    #[test]
    fn cycle_through_array() {
        let mut graph = SchemaGraph::new();
        let node = model(&mut graph, "TreeNode");
        let children = graph.array_of(node);
        add_prop(&mut graph, node, "children", children);

        let comps = topological_components(&graph, &[node]);
        assert_eq!(comps, vec![vec![node]]);
        assert!(is_cyclic(&graph, &comps[0], node));
    }

    #[test]
    fn acyclic_singleton() {
        let mut graph = SchemaGraph::new();
        let a = model(&mut graph, "A");
        let string = graph.std(StdScalar::String);
        add_prop(&mut graph, a, "name", string);

        let comps = topological_components(&graph, &[a]);
        assert!(!is_cyclic(&graph, &comps[0], a));
    }

    #[test]
    fn filters_to_requested_nodes() {
        let mut graph = SchemaGraph::new();
        let a = model(&mut graph, "A");
        let b = model(&mut graph, "B");
        add_prop(&mut graph, a, "b", b);

        let comps = topological_components(&graph, &[a]);
        assert_eq!(comps, vec![vec![a]]);
    }
}
