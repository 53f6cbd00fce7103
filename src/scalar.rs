//! Scalar to validator mapping.
//!
//! Scalars are classified by the nearest standard library scalar in their
//! base chain, so a user scalar extending `int8` gets `int8` bounds rather
//! than the looser bounds of `int32` or `integer`.

use crate::constraints::Constraints;
use crate::expr::{Base, Check, ValidatorExpr};
use crate::graph::{SchemaGraph, StdScalar, TypeId};

const INT8: (i128, i128) = (-(1 << 7), (1 << 7) - 1);
const INT16: (i128, i128) = (-(1 << 15), (1 << 15) - 1);
const INT32: (i128, i128) = (-(1 << 31), (1 << 31) - 1);
const INT64: (i128, i128) = (-(1 << 63), (1 << 63) - 1);
const UINT8_MAX: i128 = (1 << 8) - 1;
const UINT16_MAX: i128 = (1 << 16) - 1;
const UINT32_MAX: i128 = (1 << 32) - 1;
const UINT64_MAX: i128 = (1 << 64) - 1;

/// Map a scalar, applying the given constraints on top of its builtin facets.
///
/// A scalar whose encoding targets lead back to itself maps to `unknown`.
pub fn map_scalar(graph: &SchemaGraph, id: TypeId, constraints: &Constraints) -> ValidatorExpr {
    if graph.has_encoding_cycle(id) {
        return ValidatorExpr::unknown();
    }
    let mut expr = match graph.nearest_std(id) {
        Some(std) => map_std(graph, id, std, constraints),
        None => ValidatorExpr::any(),
    };

    if !graph.is_builtin(id) {
        if let Some(doc) = &graph.node(id).doc {
            expr.push(Check::Describe(doc.clone()));
        }
    }
    expr
}

fn map_std(
    graph: &SchemaGraph,
    id: TypeId,
    std: StdScalar,
    constraints: &Constraints,
) -> ValidatorExpr {
    match std {
        StdScalar::Boolean => ValidatorExpr::new(Base::Boolean),
        StdScalar::Bytes => ValidatorExpr::string(),
        StdScalar::String => string_builder(false, constraints),
        StdScalar::Url => string_builder(true, constraints),
        StdScalar::PlainDate => ValidatorExpr::new(Base::CoercedDate),
        StdScalar::PlainTime => ValidatorExpr::string().with(Check::Time),
        StdScalar::UtcDateTime => match graph.encoding(id) {
            None => datetime(false),
            Some(enc) if enc.name == "unixTimestamp" => numeric_target(graph, enc.target, constraints),
            Some(enc) if enc.name == "rfc3339" => datetime(false),
            Some(enc) => map_scalar(graph, enc.target, constraints),
        },
        StdScalar::OffsetDateTime => match graph.encoding(id) {
            None => datetime(true),
            Some(enc) if enc.name == "rfc3339" => datetime(true),
            Some(enc) => map_scalar(graph, enc.target, constraints),
        },
        StdScalar::Duration => match graph.encoding(id) {
            None => ValidatorExpr::string().with(Check::Duration),
            Some(enc) if enc.name == "ISO8601" => ValidatorExpr::string().with(Check::Duration),
            Some(enc) => map_scalar(graph, enc.target, constraints),
        },
        numeric => numeric_builder(numeric, constraints),
    }
}

fn datetime(offset: bool) -> ValidatorExpr {
    ValidatorExpr::string().with(Check::Datetime { offset })
}

fn numeric_target(graph: &SchemaGraph, target: TypeId, constraints: &Constraints) -> ValidatorExpr {
    match graph.nearest_std(target) {
        Some(std) => numeric_builder(std, constraints),
        None => numeric_builder(StdScalar::Numeric, constraints),
    }
}

fn string_builder(url: bool, constraints: &Constraints) -> ValidatorExpr {
    let mut expr = ValidatorExpr::string();
    if url {
        expr.push(Check::Url);
    }
    if let Some(min) = constraints.min_length {
        expr.push(Check::MinLength(min));
    }
    if let Some(max) = constraints.max_length {
        expr.push(Check::MaxLength(max));
    }
    expr
}

/// Numeric validator for a standard scalar, narrowest first.
pub fn numeric_builder(std: StdScalar, constraints: &Constraints) -> ValidatorExpr {
    match std {
        StdScalar::Int8 => int_number(Some(INT8.0), Some(INT8.1), constraints),
        StdScalar::Int16 => int_number(Some(INT16.0), Some(INT16.1), constraints),
        StdScalar::Int32 => int_number(Some(INT32.0), Some(INT32.1), constraints),
        StdScalar::SafeInt => {
            let mut expr = ValidatorExpr::number().with(Check::Int).with(Check::Safe);
            number_bounds(&mut expr, None, None, constraints);
            expr
        }
        StdScalar::Int64 => bigint(Some(INT64.0), Some(INT64.1), false, constraints),
        StdScalar::Uint8 => uint_number(UINT8_MAX, constraints),
        StdScalar::Uint16 => uint_number(UINT16_MAX, constraints),
        StdScalar::Uint32 => uint_number(UINT32_MAX, constraints),
        StdScalar::Uint64 => bigint(None, Some(UINT64_MAX), true, constraints),
        StdScalar::Integer => bigint(None, None, false, constraints),
        // Bit widths limit float precision, not range.
        _ => {
            let mut expr = ValidatorExpr::number();
            number_bounds(&mut expr, None, None, constraints);
            expr
        }
    }
}

fn int_number(min: Option<i128>, max: Option<i128>, constraints: &Constraints) -> ValidatorExpr {
    let mut expr = ValidatorExpr::number().with(Check::Int);
    number_bounds(&mut expr, min, max, constraints);
    expr
}

fn uint_number(max: i128, constraints: &Constraints) -> ValidatorExpr {
    let mut expr = ValidatorExpr::number()
        .with(Check::Int)
        .with(Check::Nonnegative);
    number_bounds(&mut expr, None, Some(max), constraints);
    expr
}

fn number_bounds(
    expr: &mut ValidatorExpr,
    width_min: Option<i128>,
    width_max: Option<i128>,
    constraints: &Constraints,
) {
    let mut merged = Constraints {
        min_value: width_min.map(|v| v as f64),
        max_value: width_max.map(|v| v as f64),
        ..Constraints::default()
    };
    merged.merge(constraints);
    if let Some(min) = merged.min_value {
        expr.push(Check::MinValue(min));
    }
    if let Some(max) = merged.max_value {
        expr.push(Check::MaxValue(max));
    }
}

fn bigint(
    width_min: Option<i128>,
    width_max: Option<i128>,
    nonnegative: bool,
    constraints: &Constraints,
) -> ValidatorExpr {
    let mut expr = ValidatorExpr::bigint();
    if nonnegative {
        expr.push(Check::Nonnegative);
    }
    let user_min = constraints.min_value.map(|v| v.ceil() as i128);
    let user_max = constraints.max_value.map(|v| v.floor() as i128);
    let min = match (width_min, user_min) {
        (Some(w), Some(u)) => Some(w.max(u)),
        (w, u) => w.or(u),
    };
    let max = match (width_max, user_max) {
        (Some(w), Some(u)) => Some(w.min(u)),
        (w, u) => w.or(u),
    };
    if let Some(min) = min {
        expr.push(Check::Gte(min));
    }
    if let Some(max) = max {
        expr.push(Check::Lte(max));
    }
    expr
}
