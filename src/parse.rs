//! Shaping of validated tool arguments.
//!
//! [`parse_value`] returns what `schema.parse(input)` returns in Zod for
//! input that already passed validation. Object members the validator does
//! not declare are stripped, absent members whose outermost wrapper is a
//! `.default(...)` are filled in, and named references are followed through
//! the [`Compilation`].

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::emitter::Compilation;
use crate::expr::{Base, Check, ValidatorExpr};
use crate::json_schema::{flatten_members, to_json_schema};
use crate::validator::CompiledSchema;

/// Shape `value` by `expr`.
pub fn parse_value(expr: &ValidatorExpr, value: &Value, compilation: &Compilation) -> Value {
    Parser { compilation }.parse(expr, value, &mut Vec::new())
}

/// Default applied when the member is absent: `.optional().default(x)`
/// fills in `x`, `.default(x).optional()` leaves the member out.
fn applied_default(expr: &ValidatorExpr) -> Option<&Value> {
    expr.chain.iter().rev().find_map(|check| match check {
        Check::Default(value) => Some(Some(value)),
        Check::Optional => Some(None),
        _ => None,
    })?
}

struct Parser<'c> {
    compilation: &'c Compilation,
}

impl Parser<'_> {
    /// `aliases` holds the references followed without descending into
    /// the value, so `A = B; B = A` stops instead of looping.
    fn parse(&self, expr: &ValidatorExpr, value: &Value, aliases: &mut Vec<String>) -> Value {
        match &expr.base {
            Base::Object(members) => self.parse_object(members, value),
            Base::Merge { base, extension } => {
                let mut seen = Default::default();
                match flatten_members(base, self.compilation, &mut seen) {
                    Some(mut members) => {
                        for (name, member) in extension {
                            members.insert(name.clone(), member.clone());
                        }
                        self.parse_object(&members, value)
                    }
                    None => merge_objects(
                        self.parse(base, value, aliases),
                        self.parse_object(extension, value),
                    ),
                }
            }
            Base::Ref(name) | Base::Lazy(name) => {
                if aliases.contains(name) {
                    return value.clone();
                }
                let Some(declaration) = self.compilation.validator(name) else {
                    return value.clone();
                };
                aliases.push(name.clone());
                let shaped = self.parse(&declaration.expr, value, aliases);
                aliases.pop();
                shaped
            }
            Base::Array(item) => match value {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|v| self.parse(item, v, &mut Vec::new()))
                        .collect(),
                ),
                other => other.clone(),
            },
            Base::Tuple(items) => match value {
                Value::Array(values) => Value::Array(
                    values
                        .iter()
                        .enumerate()
                        .map(|(i, v)| match items.get(i) {
                            Some(item) => self.parse(item, v, &mut Vec::new()),
                            None => v.clone(),
                        })
                        .collect(),
                ),
                other => other.clone(),
            },
            Base::Record(_, item) => match value {
                Value::Object(map) => Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), self.parse(item, v, &mut Vec::new())))
                        .collect(),
                ),
                other => other.clone(),
            },
            Base::Intersection(left, right) => merge_objects(
                self.parse(left, value, aliases),
                self.parse(right, value, aliases),
            ),
            Base::Union(variants) | Base::DiscriminatedUnion { variants, .. } => {
                match variants.iter().find(|v| self.accepts(v, value)) {
                    Some(variant) => self.parse(variant, value, aliases),
                    None => value.clone(),
                }
            }
            _ => value.clone(),
        }
    }

    fn parse_object(&self, members: &IndexMap<String, ValidatorExpr>, value: &Value) -> Value {
        let Value::Object(input) = value else {
            return value.clone();
        };
        let mut out = Map::new();
        for (name, member) in members {
            match input.get(name) {
                Some(v) => {
                    out.insert(name.clone(), self.parse(member, v, &mut Vec::new()));
                }
                None => {
                    if let Some(default) = applied_default(member) {
                        out.insert(name.clone(), default.clone());
                    }
                }
            }
        }
        Value::Object(out)
    }

    /// First-match union semantics: a variant matches if its lowering
    /// accepts the value.
    fn accepts(&self, variant: &ValidatorExpr, value: &Value) -> bool {
        CompiledSchema::new(&to_json_schema(variant, self.compilation))
            .map(|schema| schema.validate(value).is_ok())
            .unwrap_or(false)
    }
}

fn merge_objects(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Object(mut left), Value::Object(right)) => {
            left.extend(right);
            Value::Object(left)
        }
        (left, _) => left,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::compile;
    use crate::expr::Literal;
    use crate::loader::load_graph_str;
    use crate::types::EmitOptions;
    use serde_json::json;

    fn compilation(doc: &str) -> Compilation {
        compile(&load_graph_str(doc).unwrap(), &EmitOptions::default()).unwrap()
    }

    fn members(pairs: Vec<(&str, ValidatorExpr)>) -> IndexMap<String, ValidatorExpr> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn strips_undeclared_members_and_fills_defaults() {
        let expr = ValidatorExpr::object(members(vec![
            ("title", ValidatorExpr::string()),
            (
                "done",
                ValidatorExpr::new(Base::Boolean).with(Check::Default(json!(false))),
            ),
        ]));
        let empty = compilation("{}");
        let shaped = parse_value(&expr, &json!({ "title": "milk", "bogus": 1 }), &empty);
        assert_eq!(shaped, json!({ "title": "milk", "done": false }));
    }

    #[test]
    fn default_inside_optional_is_not_applied() {
        let inner_default = ValidatorExpr::new(Base::Boolean)
            .with(Check::Default(json!(true)))
            .with(Check::Optional);
        let outer_default = ValidatorExpr::new(Base::Boolean)
            .with(Check::Optional)
            .with(Check::Default(json!(true)))
            .with(Check::Describe("flag".into()));
        assert_eq!(applied_default(&inner_default), None);
        assert_eq!(applied_default(&outer_default), Some(&json!(true)));
        assert_eq!(applied_default(&ValidatorExpr::string()), None);
    }

    #[test]
    fn follows_references_into_nested_objects() {
        let compilation = compilation(
            r#"{ "namespace": "App", "models": [
                { "name": "User", "properties": [
                    { "name": "name", "type": "string" },
                    { "name": "role", "type": "string", "default": "member" }
                ] },
                { "name": "Todo", "properties": [
                    { "name": "owner", "type": "User" },
                    { "name": "tags", "type": { "array": "User" }, "optional": true }
                ] }
            ] }"#,
        );
        let todo = &compilation.validator("Todo").unwrap().expr;
        let shaped = parse_value(
            todo,
            &json!({
                "owner": { "name": "ann", "age": 3 },
                "tags": [{ "name": "bob", "role": "admin", "x": true }],
                "extra": 1
            }),
            &compilation,
        );
        assert_eq!(
            shaped,
            json!({
                "owner": { "name": "ann", "role": "member" },
                "tags": [{ "name": "bob", "role": "admin" }]
            })
        );
    }

    #[test]
    fn records_keep_every_key() {
        let expr = ValidatorExpr::new(Base::Record(
            Box::new(ValidatorExpr::string()),
            Box::new(ValidatorExpr::number()),
        ));
        let value = json!({ "a": 1, "b": 2 });
        assert_eq!(parse_value(&expr, &value, &compilation("{}")), value);
    }

    #[test]
    fn union_uses_first_accepting_variant() {
        let cat = ValidatorExpr::object(members(vec![
            ("kind", ValidatorExpr::literal(Literal::String("cat".into()))),
            ("meow", ValidatorExpr::new(Base::Boolean)),
        ]));
        let dog = ValidatorExpr::object(members(vec![
            ("kind", ValidatorExpr::literal(Literal::String("dog".into()))),
            ("bark", ValidatorExpr::new(Base::Boolean)),
        ]));
        let expr = ValidatorExpr::new(Base::Union(vec![cat, dog]));
        let shaped = parse_value(
            &expr,
            &json!({ "kind": "dog", "bark": true, "meow": false }),
            &compilation("{}"),
        );
        assert_eq!(shaped, json!({ "kind": "dog", "bark": true }));
    }

    #[test]
    fn scalars_pass_through() {
        let value = json!("2024-01-01T00:00:00Z");
        assert_eq!(
            parse_value(&ValidatorExpr::string(), &value, &compilation("{}")),
            value
        );
    }
}
