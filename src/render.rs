//! TypeScript rendering of validator expressions.

use std::fmt::Write;

use crate::emitter::{Compilation, EnumDeclaration, ValidatorDeclaration};
use crate::expr::{Base, Check, Literal, ValidatorExpr};

const INDENT: &str = "  ";

/// Render a single expression with no leading indentation.
pub fn render_expr(expr: &ValidatorExpr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, 0);
    out
}

/// Strip characters that cannot appear in a property name.
pub fn sanitize_property_name(name: &str) -> String {
    name.chars().filter(|c| *c != '@' && *c != '`').collect()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Object key as written in source: bare when an identifier, else quoted.
pub fn property_key(name: &str) -> String {
    let clean = sanitize_property_name(name);
    if is_identifier(&clean) {
        clean
    } else {
        quote(&clean)
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

fn number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{n}")
    }
}

fn literal(value: &Literal) -> String {
    match value {
        Literal::String(s) => quote(s),
        Literal::Number(n) => number(*n),
        Literal::Boolean(b) => b.to_string(),
    }
}

fn write_expr(out: &mut String, expr: &ValidatorExpr, depth: usize) {
    write_base(out, &expr.base, depth);
    for check in &expr.chain {
        write_check(out, check);
    }
}

fn write_list(out: &mut String, items: &[ValidatorExpr], depth: usize) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, item, depth);
    }
    out.push(']');
}

fn write_object(
    out: &mut String,
    members: &indexmap::IndexMap<String, ValidatorExpr>,
    depth: usize,
) {
    if members.is_empty() {
        out.push_str("z.object({})");
        return;
    }
    out.push_str("z.object({\n");
    let pad = INDENT.repeat(depth + 1);
    for (name, member) in members {
        out.push_str(&pad);
        out.push_str(&property_key(name));
        out.push_str(": ");
        write_expr(out, member, depth + 1);
        out.push_str(",\n");
    }
    out.push_str(&INDENT.repeat(depth));
    out.push_str("})");
}

fn write_base(out: &mut String, base: &Base, depth: usize) {
    match base {
        Base::Any => out.push_str("z.any()"),
        Base::Unknown => out.push_str("z.unknown()"),
        Base::Never => out.push_str("z.never()"),
        Base::Null => out.push_str("z.null()"),
        Base::Void => out.push_str("z.void()"),
        Base::Boolean => out.push_str("z.boolean()"),
        Base::String => out.push_str("z.string()"),
        Base::Number => out.push_str("z.number()"),
        Base::BigInt => out.push_str("z.bigint()"),
        Base::CoercedDate => out.push_str("z.coerce.date()"),
        Base::Literal(value) => {
            let _ = write!(out, "z.literal({})", literal(value));
        }
        Base::Array(item) => {
            out.push_str("z.array(");
            write_expr(out, item, depth);
            out.push(')');
        }
        Base::Tuple(items) => {
            out.push_str("z.tuple(");
            write_list(out, items, depth);
            out.push(')');
        }
        Base::Object(members) => write_object(out, members, depth),
        Base::Record(key, value) => {
            out.push_str("z.record(");
            write_expr(out, key, depth);
            out.push_str(", ");
            write_expr(out, value, depth);
            out.push(')');
        }
        Base::Union(variants) => {
            out.push_str("z.union(");
            write_list(out, variants, depth);
            out.push(')');
        }
        Base::DiscriminatedUnion {
            discriminator,
            variants,
        } => {
            let _ = write!(out, "z.discriminatedUnion({}, ", quote(discriminator));
            write_list(out, variants, depth);
            out.push(')');
        }
        Base::Intersection(left, right) => {
            out.push_str("z.intersection(");
            write_expr(out, left, depth);
            out.push_str(", ");
            write_expr(out, right, depth);
            out.push(')');
        }
        Base::NativeEnum(name) => {
            let _ = write!(out, "z.nativeEnum({name})");
        }
        Base::Ref(name) => out.push_str(name),
        Base::Lazy(name) => {
            let _ = write!(out, "z.lazy(() => {name})");
        }
        Base::Merge { base, extension } => {
            write_expr(out, base, depth);
            out.push_str(".merge(");
            write_object(out, extension, depth);
            out.push(')');
        }
    }
}

fn write_check(out: &mut String, check: &Check) {
    let _ = match check {
        Check::MinValue(n) => write!(out, ".min({})", number(*n)),
        Check::MaxValue(n) => write!(out, ".max({})", number(*n)),
        Check::MinLength(n) | Check::MinItems(n) => write!(out, ".min({n})"),
        Check::MaxLength(n) | Check::MaxItems(n) => write!(out, ".max({n})"),
        Check::Gte(n) => write!(out, ".gte({n}n)"),
        Check::Lte(n) => write!(out, ".lte({n}n)"),
        Check::Int => write!(out, ".int()"),
        Check::Safe => write!(out, ".safe()"),
        Check::Nonnegative => write!(out, ".nonnegative()"),
        Check::Url => write!(out, ".url()"),
        Check::Datetime { offset: false } => write!(out, ".datetime()"),
        Check::Datetime { offset: true } => write!(out, ".datetime({{ offset: true }})"),
        Check::Time => write!(out, ".time()"),
        Check::Duration => write!(out, ".duration()"),
        Check::Optional => write!(out, ".optional()"),
        Check::Default(value) => write!(out, ".default({value})"),
        Check::Describe(text) => write!(out, ".describe({})", quote(text)),
    };
}

fn write_enum(out: &mut String, declaration: &EnumDeclaration) {
    if let Some(doc) = &declaration.doc {
        let _ = writeln!(out, "/** {doc} */");
    }
    let _ = writeln!(out, "export enum {} {{", declaration.name);
    for (name, value) in &declaration.members {
        let _ = writeln!(out, "{INDENT}{} = {},", property_key(name), literal(value));
    }
    out.push_str("}\n");
}

fn write_validator(out: &mut String, declaration: &ValidatorDeclaration, infer: bool) {
    let _ = write!(out, "export const {} = ", declaration.name);
    write_expr(out, &declaration.expr, 0);
    out.push_str(";\n");
    if infer {
        let _ = writeln!(
            out,
            "export type {0} = z.infer<typeof {0}>;",
            declaration.name
        );
    }
}

impl Compilation {
    /// Render the complete TypeScript module.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "import {{ z }} from {};", quote(&self.options.zod_module));
        for declaration in self.enums() {
            out.push('\n');
            write_enum(&mut out, declaration);
        }
        for declaration in self.validators() {
            out.push('\n');
            write_validator(&mut out, declaration, self.options.infer_types);
        }
        out
    }
}
