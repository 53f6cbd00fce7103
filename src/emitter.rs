//! Declaration driver.
//!
//! Collects the user declarations of a graph (everything outside the
//! library namespaces), orders them dependency-first, and builds each one
//! exactly once through a single [`CompileContext`].

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::builder::CompileContext;
use crate::cycles::topological_components;
use crate::error::{CompileError, ProjectionError};
use crate::expr::{Base, Literal, ValidatorExpr};
use crate::graph::{EnumValue, SchemaGraph, Type, TypeId};
use crate::types::{Diagnostic, EmitOptions, Phase};
use crate::visibility::{find_key, key_view, project};

/// `export enum` declaration with every member value made explicit.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDeclaration {
    pub name: String,
    pub doc: Option<String>,
    pub members: Vec<(String, Literal)>,
}

/// `export const Name = <expr>` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorDeclaration {
    pub name: String,
    pub expr: ValidatorExpr,
    /// Graph node the declaration was built from, if any.
    pub source: Option<TypeId>,
}

/// Result of a compilation run.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub(crate) options: EmitOptions,
    enums: Vec<EnumDeclaration>,
    validators: Vec<ValidatorDeclaration>,
    by_name: HashMap<String, usize>,
    diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn enums(&self) -> &[EnumDeclaration] {
        &self.enums
    }

    pub fn validators(&self) -> &[ValidatorDeclaration] {
        &self.validators
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    /// Look up a validator declaration by name.
    pub fn validator(&self, name: &str) -> Option<&ValidatorDeclaration> {
        self.by_name.get(name).map(|i| &self.validators[*i])
    }

    pub fn enum_declaration(&self, name: &str) -> Option<&EnumDeclaration> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Names of all declarations in emission order, enums first.
    pub fn names(&self) -> Vec<&str> {
        self.enums
            .iter()
            .map(|e| e.name.as_str())
            .chain(self.validators.iter().map(|v| v.name.as_str()))
            .collect()
    }

    fn push_validator(&mut self, declaration: ValidatorDeclaration) {
        self.by_name
            .insert(declaration.name.clone(), self.validators.len());
        self.validators.push(declaration);
    }
}

/// User declarations in declaration order.
pub fn user_declarations(graph: &SchemaGraph) -> Vec<TypeId> {
    graph
        .declarations()
        .map(|(_, id)| id)
        .filter(|id| graph.is_declaration(*id) && !graph.is_builtin(*id))
        .collect()
}

/// Compile every user declaration of `graph`.
pub fn compile(graph: &SchemaGraph, options: &EmitOptions) -> Result<Compilation, CompileError> {
    let mut ctx = CompileContext::new(graph);
    let mut compilation = emit_declarations(&mut ctx, options);
    compilation.diagnostics = ctx.into_diagnostics();
    Ok(compilation)
}

/// Compile every user declaration plus per-entity phase validators:
/// `Zod<Name>Get`, `Zod<Name>Create`, `Zod<Name>Update` and
/// `Zod<Name>Delete`. Error models get a single `Zod<Name>` alias.
///
/// `entities` overrides the graph's own entity list.
pub fn compile_entities(
    graph: &SchemaGraph,
    entities: Option<&[String]>,
    options: &EmitOptions,
) -> Result<Compilation, CompileError> {
    let mut ctx = CompileContext::new(graph);
    let mut compilation = emit_declarations(&mut ctx, options);

    let selected = select_entities(graph, entities)?;
    for id in &selected {
        emit_entity(&mut ctx, &mut compilation, *id)?;
    }
    for id in user_declarations(graph) {
        if graph.is_error_model(id) && !selected.contains(&id) {
            emit_entity(&mut ctx, &mut compilation, id)?;
        }
    }

    compilation.diagnostics = ctx.into_diagnostics();
    Ok(compilation)
}

fn emit_declarations(ctx: &mut CompileContext<'_>, options: &EmitOptions) -> Compilation {
    let graph = ctx.graph();
    let mut compilation = Compilation {
        options: options.clone(),
        enums: Vec::new(),
        validators: Vec::new(),
        by_name: HashMap::new(),
        diagnostics: Vec::new(),
    };

    let declarations = user_declarations(graph);
    let (enums, others): (Vec<TypeId>, Vec<TypeId>) = declarations
        .into_iter()
        .partition(|id| matches!(graph.kind(*id), Type::Enum(_)));

    for id in enums {
        if let Some(declaration) = enum_declaration(graph, id) {
            ctx.mark_emitted(id, declaration.name.clone());
            compilation.enums.push(declaration);
        }
    }

    for component in topological_components(graph, &others) {
        for id in component {
            let Some(name) = graph.name(id).map(String::from) else {
                continue;
            };
            if ctx.is_emitted(id) {
                continue;
            }
            let expr = ctx.build_declaration(id);
            ctx.mark_emitted(id, name.clone());
            debug!(declaration = %name, kind = graph.node(id).kind_name(), "compiled declaration");
            compilation.push_validator(ValidatorDeclaration {
                name,
                expr,
                source: Some(id),
            });
        }
    }

    compilation
}

fn emit_entity(
    ctx: &mut CompileContext<'_>,
    compilation: &mut Compilation,
    id: TypeId,
) -> Result<(), CompileError> {
    let graph = ctx.graph();
    let name = graph.name(id).unwrap_or_default().to_string();

    if graph.is_error_model(id) {
        let alias = format!("Zod{name}");
        compilation.push_validator(ValidatorDeclaration {
            name: alias,
            expr: ValidatorExpr::new(Base::Ref(name)),
            source: Some(id),
        });
        return Ok(());
    }

    let mut views = vec![("Get", key_view(graph, id)?)];
    for phase in [Phase::Create, Phase::Update, Phase::Delete] {
        views.push((phase.suffix(), project(graph, id, phase)?));
    }
    for (suffix, model) in views {
        let declaration = format!("Zod{name}{suffix}");
        let expr = ctx.build_model_value(&model, &declaration);
        debug!(declaration = %declaration, "compiled entity view");
        compilation.push_validator(ValidatorDeclaration {
            name: declaration,
            expr,
            source: None,
        });
    }
    Ok(())
}

/// Resolve the entity models tools and phase validators are generated for.
///
/// An explicit list wins, then the graph's own entity list. Without either,
/// every keyed user model that is not an error model is an entity.
pub fn select_entities(
    graph: &SchemaGraph,
    explicit: Option<&[String]>,
) -> Result<Vec<TypeId>, ProjectionError> {
    let names = explicit.or(graph.entities());

    let Some(names) = names else {
        return Ok(user_declarations(graph)
            .into_iter()
            .filter(|id| {
                graph.as_model(*id).is_some()
                    && !graph.is_error_model(*id)
                    && find_key(graph, *id).is_some()
            })
            .collect());
    };

    names
        .iter()
        .map(|name| {
            let id = graph
                .lookup(name)
                .ok_or_else(|| ProjectionError::UnknownEntity { name: name.clone() })?;
            let is_entity_model = graph.as_model(id).is_some() && graph.is_declaration(id);
            if !is_entity_model {
                return Err(ProjectionError::NotAModel { name: name.clone() });
            }
            if find_key(graph, id).is_none() && !graph.is_error_model(id) {
                warn!(entity = %name, "entity has no key property");
                return Err(ProjectionError::MissingKey { model: name.clone() });
            }
            Ok(id)
        })
        .collect()
}

/// Enum declaration with implicit values made explicit: a member without a
/// value follows a numeric predecessor with the next integer, starts at 0
/// when first, and otherwise takes its own name.
fn enum_declaration(graph: &SchemaGraph, id: TypeId) -> Option<EnumDeclaration> {
    let Type::Enum(e) = graph.kind(id) else {
        return None;
    };
    let mut members = Vec::with_capacity(e.members.len());
    let mut previous: Option<Literal> = None;
    for member in &e.members {
        let value = match &member.value {
            Some(EnumValue::String(s)) => Literal::String(s.clone()),
            Some(EnumValue::Number(n)) => Literal::Number(*n),
            None => match &previous {
                None => Literal::Number(0.0),
                Some(Literal::Number(n)) => Literal::Number(n + 1.0),
                Some(_) => Literal::String(member.name.clone()),
            },
        };
        previous = Some(value.clone());
        members.push((member.name.clone(), value));
    }
    Some(EnumDeclaration {
        name: graph.name(id)?.to_string(),
        doc: graph.node(id).doc.clone(),
        members,
    })
}
