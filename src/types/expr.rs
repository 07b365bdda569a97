use std::fmt;
use std::ops::Not;
use std::str::FromStr;

use serde_json::Value;

use super::Operand;
use crate::analysis::{Dependencies, DependencyCollector};
use crate::document::{
    decode_list, Decode, DecodeError, Encode, Fields, ObjectBuilder, UnknownKeyword,
};

/// Comparison operators shared by expressions and where clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    /// Unary: the left side resolves to a non-null value.
    Exists,
}

impl CompareOp {
    pub const ALL: &'static [CompareOp] = &[
        CompareOp::Eq,
        CompareOp::Neq,
        CompareOp::Gt,
        CompareOp::Gte,
        CompareOp::Lt,
        CompareOp::Lte,
        CompareOp::In,
        CompareOp::NotIn,
        CompareOp::Contains,
        CompareOp::Exists,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not_in",
            CompareOp::Contains => "contains",
            CompareOp::Exists => "exists",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareOp {
    type Err = UnknownKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" | "=" | "eq" => Ok(CompareOp::Eq),
            "!=" | "ne" | "neq" => Ok(CompareOp::Neq),
            ">" | "gt" => Ok(CompareOp::Gt),
            ">=" | "gte" => Ok(CompareOp::Gte),
            "<" | "lt" => Ok(CompareOp::Lt),
            "<=" | "lte" => Ok(CompareOp::Lte),
            "in" => Ok(CompareOp::In),
            "not_in" | "nin" => Ok(CompareOp::NotIn),
            "contains" => Ok(CompareOp::Contains),
            "exists" => Ok(CompareOp::Exists),
            other => Err(UnknownKeyword(other.to_owned())),
        }
    }
}

/// Boolean expression over operands.
///
/// A bare string decodes to a `Compare` with only a left side: a naked
/// reference whose truthiness is tested.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Compare {
        left: Operand,
        op: Option<CompareOp>,
        right: Option<Operand>,
    },
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Not(Box<Expression>),
}

impl Expression {
    #[must_use]
    pub fn compare(left: impl Into<Operand>, op: CompareOp, right: impl Into<Operand>) -> Self {
        Expression::Compare {
            left: left.into(),
            op: Some(op),
            right: Some(right.into()),
        }
    }

    /// A naked reference, true when the referenced value is truthy.
    #[must_use]
    pub fn truthy(left: impl Into<Operand>) -> Self {
        Expression::Compare {
            left: left.into(),
            op: None,
            right: None,
        }
    }

    #[must_use]
    pub fn and(self, other: Expression) -> Expression {
        match self {
            Expression::And(mut items) => {
                items.push(other);
                Expression::And(items)
            }
            first => Expression::And(vec![first, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Expression) -> Expression {
        match self {
            Expression::Or(mut items) => {
                items.push(other);
                Expression::Or(items)
            }
            first => Expression::Or(vec![first, other]),
        }
    }
}

impl Not for Expression {
    type Output = Expression;

    fn not(self) -> Expression {
        Expression::Not(Box::new(self))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Compare { left, op, right } => {
                write!(f, "{}", left.encode())?;
                if let Some(op) = op {
                    write!(f, " {op}")?;
                }
                if let Some(right) = right {
                    write!(f, " {}", right.encode())?;
                }
                Ok(())
            }
            Expression::And(items) => join(f, items, " AND "),
            Expression::Or(items) => join(f, items, " OR "),
            Expression::Not(inner) => write!(f, "(NOT {inner})"),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, items: &[Expression], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}

/// Reads one of the logical combinator keys shared with where clauses.
pub(crate) fn combinator_items<'a>(
    fields: &Fields<'a>,
    key: &str,
) -> Result<Option<&'a [Value]>, DecodeError> {
    match fields.get(key) {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items.as_slice())),
        Some(_) => Err(DecodeError::malformed(
            "expression",
            format!("'{key}' must be a list"),
        )),
    }
}

impl Decode for Expression {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        if let Value::String(_) = doc {
            return Operand::decode(doc).map(Expression::truthy);
        }
        let fields = Fields::of("expression", doc)?;
        if let Some(items) = combinator_items(&fields, "and")? {
            return decode_list(items, "and").map(Expression::And);
        }
        if let Some(items) = combinator_items(&fields, "or")? {
            return decode_list(items, "or").map(Expression::Or);
        }
        if let Some(inner) = fields.node::<Expression>("not")? {
            return Ok(Expression::Not(Box::new(inner)));
        }
        if !fields.has("left") {
            return Err(DecodeError::AmbiguousShorthand {
                node: "expression",
                reason: "expected 'left' or one of 'and', 'or', 'not'".into(),
            });
        }
        Ok(Expression::Compare {
            left: fields.required_operand("left")?,
            op: fields.keyword("op")?,
            right: fields.operand("right")?,
        })
    }
}

impl Encode for Expression {
    fn encode(&self) -> Value {
        match self {
            Expression::Compare { left, op, right } => ObjectBuilder::new()
                .node("left", left)
                .opt("op", op.map(CompareOp::as_str))
                .opt_node("right", right.as_ref())
                .build(),
            Expression::And(items) => ObjectBuilder::new().field("and", encode_all(items)).build(),
            Expression::Or(items) => ObjectBuilder::new().field("or", encode_all(items)).build(),
            Expression::Not(inner) => ObjectBuilder::new().node("not", inner).build(),
        }
    }
}

pub(crate) fn encode_all<T: Encode>(items: &[T]) -> Vec<Value> {
    items.iter().map(Encode::encode).collect()
}

impl Dependencies for Expression {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        match self {
            Expression::Compare { left, right, .. } => {
                left.collect_reads(deps);
                right.collect_reads(deps);
            }
            Expression::And(items) | Expression::Or(items) => items.collect_reads(deps),
            Expression::Not(inner) => inner.collect_reads(deps),
        }
    }
}
