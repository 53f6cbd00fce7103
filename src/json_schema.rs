//! Lowering of validator expressions into JSON Schema.
//!
//! Tool input contracts are published as JSON Schema (draft 2020-12).
//! Named references become `$ref: "#/$defs/<Name>"` and the referenced
//! declarations are collected into `$defs` transitively.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::emitter::Compilation;
use crate::expr::{number_value, Base, Check, ValidatorExpr};

const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Lower `expr` into a standalone JSON Schema.
pub fn to_json_schema(expr: &ValidatorExpr, compilation: &Compilation) -> Value {
    let mut lowering = Lowering {
        compilation,
        pending: Vec::new(),
    };
    let mut root = lowering.lower(expr);

    let mut defs = Map::new();
    let mut done = HashSet::new();
    while let Some(name) = lowering.pending.pop() {
        if !done.insert(name.clone()) {
            continue;
        }
        let schema = match compilation.validator(&name) {
            Some(declaration) => lowering.lower(&declaration.expr),
            None => json!({}),
        };
        defs.insert(name, schema);
    }

    if !defs.is_empty() {
        if let Value::Object(map) = &mut root {
            let sorted: Map<String, Value> = {
                let mut entries: Vec<_> = defs.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries.into_iter().collect()
            };
            map.insert("$defs".to_string(), Value::Object(sorted));
        }
    }
    root
}

struct Lowering<'c> {
    compilation: &'c Compilation,
    pending: Vec<String>,
}

impl Lowering<'_> {
    fn lower(&mut self, expr: &ValidatorExpr) -> Value {
        let mut schema = self.lower_base(&expr.base);
        if let Value::Object(map) = &mut schema {
            for check in &expr.chain {
                apply_check(map, check);
            }
        }
        schema
    }

    fn reference(&mut self, name: &str) -> Value {
        self.pending.push(name.to_string());
        json!({ "$ref": format!("#/$defs/{name}") })
    }

    fn lower_base(&mut self, base: &Base) -> Value {
        match base {
            Base::Any | Base::Unknown => json!({}),
            Base::Never => json!({ "not": {} }),
            Base::Null | Base::Void => json!({ "type": "null" }),
            Base::Boolean => json!({ "type": "boolean" }),
            Base::String => json!({ "type": "string" }),
            Base::Number => json!({ "type": "number" }),
            Base::BigInt => json!({ "type": "integer" }),
            Base::CoercedDate => json!({ "type": "string", "format": "date" }),
            Base::Literal(value) => json!({ "const": value.to_json() }),
            Base::Array(item) => json!({ "type": "array", "items": self.lower(item) }),
            Base::Tuple(items) => {
                let prefix: Vec<Value> = items.iter().map(|i| self.lower(i)).collect();
                json!({
                    "type": "array",
                    "prefixItems": prefix,
                    "minItems": items.len(),
                    "maxItems": items.len(),
                })
            }
            Base::Object(members) => self.lower_object(members),
            Base::Record(_, value) => {
                json!({ "type": "object", "additionalProperties": self.lower(value) })
            }
            Base::Union(variants) => {
                let variants: Vec<Value> = variants.iter().map(|v| self.lower(v)).collect();
                json!({ "anyOf": variants })
            }
            Base::DiscriminatedUnion { variants, .. } => {
                let variants: Vec<Value> = variants.iter().map(|v| self.lower(v)).collect();
                json!({ "oneOf": variants })
            }
            Base::Intersection(left, right) => {
                json!({ "allOf": [self.lower(left), self.lower(right)] })
            }
            Base::NativeEnum(name) => match self.compilation.enum_declaration(name) {
                Some(declaration) => {
                    let values: Vec<Value> = declaration
                        .members
                        .iter()
                        .map(|(_, v)| v.to_json())
                        .collect();
                    json!({ "enum": values })
                }
                None => json!({}),
            },
            Base::Ref(name) | Base::Lazy(name) => self.reference(name),
            Base::Merge { base, extension } => {
                let mut seen = HashSet::new();
                match flatten_members(base, self.compilation, &mut seen) {
                    Some(mut members) => {
                        for (name, member) in extension {
                            members.insert(name.clone(), member.clone());
                        }
                        self.lower_object(&members)
                    }
                    None => json!({ "allOf": [self.lower(base), self.lower_object(extension)] }),
                }
            }
        }
    }

    fn lower_object(&mut self, members: &IndexMap<String, ValidatorExpr>) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, member) in members {
            properties.insert(name.clone(), self.lower(member));
            if !member.is_optional() && member.default_value().is_none() {
                required.push(Value::String(name.clone()));
            }
        }
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }
}

/// Members of an object-like expression, following named bases.
pub(crate) fn flatten_members(
    expr: &ValidatorExpr,
    compilation: &Compilation,
    seen: &mut HashSet<String>,
) -> Option<IndexMap<String, ValidatorExpr>> {
    match &expr.base {
        Base::Object(members) => Some(members.clone()),
        Base::Merge { base, extension } => {
            let mut members = flatten_members(base, compilation, seen)?;
            for (name, member) in extension {
                members.insert(name.clone(), member.clone());
            }
            Some(members)
        }
        Base::Ref(name) | Base::Lazy(name) => {
            if !seen.insert(name.clone()) {
                return None;
            }
            let declaration = compilation.validator(name)?;
            flatten_members(&declaration.expr, compilation, seen)
        }
        _ => None,
    }
}

fn int_value(n: i128) -> Value {
    if let Ok(v) = i64::try_from(n) {
        Value::from(v)
    } else if let Ok(v) = u64::try_from(n) {
        Value::from(v)
    } else {
        number_value(n as f64)
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Lower,
    Upper,
}

/// Set `key` to `value` unless the existing bound is already tighter.
///
/// A chain such as `.nonnegative().min(-5)` must keep `minimum: 0`, since
/// every check in a Zod chain applies.
fn tighten(map: &mut Map<String, Value>, key: &str, value: Value, bound: Bound) {
    let replace = match (map.get(key).and_then(Value::as_f64), value.as_f64()) {
        (Some(current), Some(new)) => match bound {
            Bound::Lower => new > current,
            Bound::Upper => new < current,
        },
        _ => true,
    };
    if replace {
        map.insert(key.to_string(), value);
    }
}

fn apply_check(map: &mut Map<String, Value>, check: &Check) {
    match check {
        Check::MinValue(n) => tighten(map, "minimum", number_value(*n), Bound::Lower),
        Check::MaxValue(n) => tighten(map, "maximum", number_value(*n), Bound::Upper),
        Check::MinLength(n) => {
            map.insert("minLength".into(), json!(n));
        }
        Check::MaxLength(n) => {
            map.insert("maxLength".into(), json!(n));
        }
        Check::MinItems(n) => {
            map.insert("minItems".into(), json!(n));
        }
        Check::MaxItems(n) => {
            map.insert("maxItems".into(), json!(n));
        }
        Check::Gte(n) => tighten(map, "minimum", int_value(*n), Bound::Lower),
        Check::Lte(n) => tighten(map, "maximum", int_value(*n), Bound::Upper),
        Check::Int => {
            map.insert("type".into(), json!("integer"));
        }
        Check::Safe => {
            tighten(map, "minimum", json!(-MAX_SAFE_INTEGER), Bound::Lower);
            tighten(map, "maximum", json!(MAX_SAFE_INTEGER), Bound::Upper);
        }
        Check::Nonnegative => tighten(map, "minimum", json!(0), Bound::Lower),
        Check::Url => {
            map.insert("format".into(), json!("uri"));
        }
        Check::Datetime { .. } => {
            map.insert("format".into(), json!("date-time"));
        }
        Check::Time => {
            map.insert("format".into(), json!("time"));
        }
        Check::Duration => {
            map.insert("format".into(), json!("duration"));
        }
        Check::Optional => {}
        Check::Default(value) => {
            map.insert("default".into(), value.clone());
        }
        Check::Describe(text) => {
            map.insert("description".into(), json!(text));
        }
    }
}

/// Set `additionalProperties: false` on every object schema.
///
/// `allOf` branches are left open: closing each branch of an intersection
/// would reject the members contributed by the other branches.
pub fn close_additional_properties(value: &mut Value) {
    if let Value::Object(map) = value {
        let is_object_schema = map
            .get("type")
            .and_then(|t| t.as_str())
            .map(|t| t == "object")
            .unwrap_or(false)
            || map.contains_key("properties");

        if is_object_schema {
            // Records carry a value schema here; leave those alone.
            match map.get("additionalProperties") {
                None | Some(Value::Bool(true)) => {
                    map.insert("additionalProperties".to_string(), Value::Bool(false));
                }
                _ => {}
            }
        }

        for (key, child) in map.iter_mut() {
            match key.as_str() {
                "properties" | "$defs" => {
                    if let Value::Object(children) = child {
                        for child in children.values_mut() {
                            close_additional_properties(child);
                        }
                    }
                }
                "items" | "additionalProperties" => close_additional_properties(child),
                "anyOf" | "oneOf" | "prefixItems" => {
                    if let Value::Array(branches) = child {
                        for branch in branches {
                            close_additional_properties(branch);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::compile;
    use crate::graph::{Model, ModelProperty, SchemaGraph, StdScalar, Type};
    use crate::types::EmitOptions;

    fn empty_compilation() -> Compilation {
        compile(&SchemaGraph::new(), &EmitOptions::default()).unwrap()
    }

    #[test]
    fn object_required_excludes_optional_and_defaulted() {
        let mut members = IndexMap::new();
        members.insert(
            "id".to_string(),
            ValidatorExpr::number().with(Check::Int),
        );
        members.insert(
            "title".to_string(),
            ValidatorExpr::string().with(Check::Optional),
        );
        members.insert(
            "done".to_string(),
            ValidatorExpr::new(Base::Boolean).with(Check::Default(json!(false))),
        );
        let schema = to_json_schema(&ValidatorExpr::object(members), &empty_compilation());
        assert_eq!(schema["required"], json!(["id"]));
        assert_eq!(schema["properties"]["id"]["type"], "integer");
        assert_eq!(schema["properties"]["done"]["default"], json!(false));
    }

    #[test]
    fn int32_bounds_lower_to_minimum_maximum() {
        let expr = ValidatorExpr::number()
            .with(Check::Int)
            .with(Check::MinValue(-2147483648.0))
            .with(Check::MaxValue(2147483647.0));
        let schema = to_json_schema(&expr, &empty_compilation());
        assert_eq!(
            schema,
            json!({ "type": "integer", "minimum": -2147483648i64, "maximum": 2147483647 })
        );
    }

    #[test]
    fn references_collect_defs() {
        let mut graph = SchemaGraph::new();
        let string = graph.std(StdScalar::String);
        let mut user = Model::default();
        user.properties
            .insert("name".into(), ModelProperty::new("name", string));
        let user = graph
            .declare("User", Some("App"), Type::Model(user))
            .unwrap();
        let mut todo = Model::default();
        todo.properties
            .insert("owner".into(), ModelProperty::new("owner", user));
        graph
            .declare("Todo", Some("App"), Type::Model(todo))
            .unwrap();
        let compilation = compile(&graph, &EmitOptions::default()).unwrap();

        let expr = ValidatorExpr::new(Base::Ref("Todo".into()));
        let schema = to_json_schema(&expr, &compilation);
        assert_eq!(schema["$ref"], "#/$defs/Todo");
        assert_eq!(
            schema["$defs"]["Todo"]["properties"]["owner"]["$ref"],
            "#/$defs/User"
        );
        assert_eq!(schema["$defs"]["User"]["required"], json!(["name"]));
    }

    #[test]
    fn strict_closes_objects_but_not_records() {
        let mut schema = json!({
            "type": "object",
            "properties": {
                "meta": { "type": "object", "additionalProperties": { "type": "string" } },
                "nested": { "type": "object", "properties": {} }
            },
            "allOf": [{ "type": "object", "properties": {} }]
        });
        close_additional_properties(&mut schema);
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(
            schema["properties"]["meta"]["additionalProperties"],
            json!({ "type": "string" })
        );
        assert_eq!(
            schema["properties"]["nested"]["additionalProperties"],
            json!(false)
        );
        assert!(schema["allOf"][0].get("additionalProperties").is_none());
    }

    #[test]
    fn looser_bound_never_widens_an_earlier_one() {
        let expr = ValidatorExpr::number()
            .with(Check::Int)
            .with(Check::Nonnegative)
            .with(Check::MinValue(-5.0))
            .with(Check::MaxValue(255.0))
            .with(Check::MaxValue(1000.0));
        let schema = to_json_schema(&expr, &empty_compilation());
        assert_eq!(schema, json!({ "type": "integer", "minimum": 0, "maximum": 255 }));

        let tighter = ValidatorExpr::number()
            .with(Check::Nonnegative)
            .with(Check::MinValue(3.0));
        assert_eq!(to_json_schema(&tighter, &empty_compilation())["minimum"], json!(3));
    }

    #[test]
    fn bigint_bounds_are_integers() {
        let expr = ValidatorExpr::bigint()
            .with(Check::Nonnegative)
            .with(Check::Lte(18446744073709551615));
        let schema = to_json_schema(&expr, &empty_compilation());
        assert_eq!(schema["type"], "integer");
        assert_eq!(schema["minimum"], json!(0));
        assert_eq!(schema["maximum"], json!(18446744073709551615u64));
    }
}
