//! Validator expression AST.
//!
//! Builders produce a [`ValidatorExpr`]: a base validator followed by a
//! chain of refinements in application order. Rendering to TypeScript lives
//! in [`crate::render`] and lowering to JSON Schema in
//! [`crate::json_schema`].

use indexmap::IndexMap;
use serde_json::Value;

/// Base validator followed by its refinement chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorExpr {
    pub base: Base,
    pub chain: Vec<Check>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl Literal {
    pub fn to_json(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Number(n) => number_value(*n),
            Literal::Boolean(b) => Value::Bool(*b),
        }
    }
}

/// JSON number for `n`, integral values as integers.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Base {
    Any,
    Unknown,
    Never,
    Null,
    Void,
    Boolean,
    String,
    Number,
    BigInt,
    /// Date coerced from its string form.
    CoercedDate,
    Literal(Literal),
    Array(Box<ValidatorExpr>),
    Tuple(Vec<ValidatorExpr>),
    /// Object with members in declaration order.
    Object(IndexMap<String, ValidatorExpr>),
    Record(Box<ValidatorExpr>, Box<ValidatorExpr>),
    Union(Vec<ValidatorExpr>),
    DiscriminatedUnion {
        discriminator: String,
        variants: Vec<ValidatorExpr>,
    },
    Intersection(Box<ValidatorExpr>, Box<ValidatorExpr>),
    /// Reference to an emitted enum declaration.
    NativeEnum(String),
    /// Reference to a declaration already emitted.
    Ref(String),
    /// Deferred reference to a declaration emitted later.
    Lazy(String),
    /// A named base object extended with extra members.
    Merge {
        base: Box<ValidatorExpr>,
        extension: IndexMap<String, ValidatorExpr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    MinValue(f64),
    MaxValue(f64),
    MinLength(u64),
    MaxLength(u64),
    MinItems(u64),
    MaxItems(u64),
    /// Bigint lower bound.
    Gte(i128),
    /// Bigint upper bound.
    Lte(i128),
    Int,
    Safe,
    Nonnegative,
    Url,
    Datetime { offset: bool },
    Time,
    Duration,
    Optional,
    Default(Value),
    Describe(String),
}

impl ValidatorExpr {
    pub fn new(base: Base) -> Self {
        Self {
            base,
            chain: Vec::new(),
        }
    }

    pub fn with(mut self, check: Check) -> Self {
        self.chain.push(check);
        self
    }

    pub fn push(&mut self, check: Check) {
        self.chain.push(check);
    }

    pub fn any() -> Self {
        Self::new(Base::Any)
    }

    pub fn unknown() -> Self {
        Self::new(Base::Unknown)
    }

    pub fn string() -> Self {
        Self::new(Base::String)
    }

    pub fn number() -> Self {
        Self::new(Base::Number)
    }

    pub fn bigint() -> Self {
        Self::new(Base::BigInt)
    }

    pub fn literal(value: Literal) -> Self {
        Self::new(Base::Literal(value))
    }

    pub fn object(members: IndexMap<String, ValidatorExpr>) -> Self {
        Self::new(Base::Object(members))
    }

    pub fn is_optional(&self) -> bool {
        self.chain.iter().any(|c| matches!(c, Check::Optional))
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.chain.iter().find_map(|c| match c {
            Check::Default(v) => Some(v),
            _ => None,
        })
    }

    pub fn description(&self) -> Option<&str> {
        self.chain.iter().rev().find_map(|c| match c {
            Check::Describe(d) => Some(d.as_str()),
            _ => None,
        })
    }

    /// Drop an `optional` marker, keeping the rest of the chain.
    pub fn required(mut self) -> Self {
        self.chain.retain(|c| !matches!(c, Check::Optional));
        self
    }

    /// Mark optional unless already so.
    pub fn into_optional(self) -> Self {
        if self.is_optional() {
            self
        } else {
            self.with(Check::Optional)
        }
    }

    /// Members of a plain object validator.
    pub fn object_members(&self) -> Option<&IndexMap<String, ValidatorExpr>> {
        match &self.base {
            Base::Object(members) => Some(members),
            _ => None,
        }
    }
}
