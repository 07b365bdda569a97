use std::fmt;

use serde_json::{Map, Value};

use super::expr::{combinator_items, encode_all};
use super::{CompareOp, Operand};
use crate::analysis::{Dependencies, DependencyCollector};
use crate::document::{decode_list, Decode, DecodeError, Encode, Fields, ObjectBuilder};

/// Predicate over the fields of one entity.
///
/// Besides the strict `{field, op, value}` / `{and|or|not}` forms, two
/// shorthands are accepted: `{health: 0}` (equality) and
/// `{health: {"<": 10}}` (single operator). A shorthand object naming
/// several fields is the conjunction of its entries, in key order.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    Compare {
        field: String,
        op: CompareOp,
        value: Option<Operand>,
    },
    And(Vec<WhereClause>),
    Or(Vec<WhereClause>),
    Not(Box<WhereClause>),
}

impl WhereClause {
    #[must_use]
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Operand>) -> Self {
        WhereClause::Compare {
            field: field.into(),
            op,
            value: Some(value.into()),
        }
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    fn is_strict(fields: &Fields<'_>) -> Result<bool, DecodeError> {
        let named = fields.str("field")?.is_some_and(|f| !f.is_empty());
        Ok(named || ["and", "or", "not"].into_iter().any(|k| fields.has(k)))
    }

    fn decode_strict(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        if let Some(items) = combinator_items(fields, "and")? {
            return decode_list(items, "and").map(WhereClause::And);
        }
        if let Some(items) = combinator_items(fields, "or")? {
            return decode_list(items, "or").map(WhereClause::Or);
        }
        if let Some(inner) = fields.node::<WhereClause>("not")? {
            return Ok(WhereClause::Not(Box::new(inner)));
        }
        Ok(WhereClause::Compare {
            field: fields.required_str("field")?.to_owned(),
            op: fields.keyword("op")?.unwrap_or(CompareOp::Eq),
            value: fields.operand("value")?,
        })
    }

    fn decode_shorthand(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        let mut clauses = keys
            .into_iter()
            .map(|key| shorthand_entry(key, &map[key.as_str()]))
            .collect::<Result<Vec<_>, _>>()?;
        match clauses.len() {
            0 => Err(DecodeError::AmbiguousShorthand {
                node: "where clause",
                reason: "empty mapping".into(),
            }),
            1 => Ok(clauses.remove(0)),
            _ => Ok(WhereClause::And(clauses)),
        }
    }
}

fn shorthand_entry(field: &str, value: &Value) -> Result<WhereClause, DecodeError> {
    let ambiguous = |reason: String| DecodeError::AmbiguousShorthand {
        node: "where clause",
        reason,
    };
    let (op, operand) = match value {
        Value::Object(inner) => {
            let mut entries = inner.iter();
            match (entries.next(), entries.next()) {
                (Some((op, operand)), None) => {
                    let op = op.parse::<CompareOp>().map_err(|_| {
                        ambiguous(format!("'{field}' maps to '{op}', which is not an operator"))
                    })?;
                    (op, operand)
                }
                (None, _) => return Err(ambiguous(format!("'{field}' maps to an empty mapping"))),
                (Some(_), Some(_)) => {
                    return Err(ambiguous(format!(
                        "'{field}' maps to {} keys; expected a single operator",
                        inner.len()
                    )))
                }
            }
        }
        other => (CompareOp::Eq, other),
    };
    let value = if operand.is_null() {
        None
    } else {
        Some(Operand::decode(operand).map_err(|e| e.at(format!("where '{field}'")))?)
    };
    Ok(WhereClause::Compare {
        field: field.to_owned(),
        op,
        value,
    })
}

impl Decode for WhereClause {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let fields = Fields::of("where clause", doc)?;
        if Self::is_strict(&fields)? {
            Self::decode_strict(&fields)
        } else {
            Self::decode_shorthand(fields.map())
        }
    }
}

impl Encode for WhereClause {
    fn encode(&self) -> Value {
        match self {
            WhereClause::Compare { field, op, value } => ObjectBuilder::new()
                .field("field", field.as_str())
                .field("op", op.as_str())
                .opt_node("value", value.as_ref())
                .build(),
            WhereClause::And(items) => ObjectBuilder::new().field("and", encode_all(items)).build(),
            WhereClause::Or(items) => ObjectBuilder::new().field("or", encode_all(items)).build(),
            WhereClause::Not(inner) => ObjectBuilder::new().node("not", inner).build(),
        }
    }
}

impl Dependencies for WhereClause {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        match self {
            WhereClause::Compare { field, value, .. } => {
                deps.read_str(field);
                value.collect_reads(deps);
            }
            WhereClause::And(items) | WhereClause::Or(items) => items.collect_reads(deps),
            WhereClause::Not(inner) => inner.collect_reads(deps),
        }
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereClause::Compare { field, op, value } => match value {
                Some(v) => write!(f, "{field} {op} {}", v.encode()),
                None => write!(f, "{field} {op}"),
            },
            WhereClause::And(items) | WhereClause::Or(items) => {
                let sep = if matches!(self, WhereClause::And(_)) { " AND " } else { " OR " };
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(sep))
            }
            WhereClause::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::Path;

    #[test]
    fn equality_shorthand() {
        let clause = WhereClause::decode(&json!({"team": "red"})).unwrap();
        assert_eq!(clause, WhereClause::eq("team", Operand::literal("red")));
    }

    #[test]
    fn operator_shorthand() {
        let clause = WhereClause::decode(&json!({"health": {"<": 10}})).unwrap();
        assert_eq!(
            clause,
            WhereClause::compare("health", CompareOp::Lt, Operand::literal(10))
        );
        let worded = WhereClause::decode(&json!({"health": {"lt": 10}})).unwrap();
        assert_eq!(clause, worded);
    }

    #[test]
    fn shorthand_and_strict_agree() {
        let short = WhereClause::decode(&json!({"level": {">=": 3}})).unwrap();
        let strict =
            WhereClause::decode(&json!({"field": "level", "op": ">=", "value": 3})).unwrap();
        assert_eq!(short, strict);
    }

    #[test]
    fn strict_defaults_to_equality() {
        let clause = WhereClause::decode(&json!({"field": "alive", "value": true})).unwrap();
        assert!(matches!(clause, WhereClause::Compare { op: CompareOp::Eq, .. }));
    }

    #[test]
    fn multi_key_shorthand_is_sorted_conjunction() {
        let clause = WhereClause::decode(&json!({"team": "red", "alive": true})).unwrap();
        let WhereClause::And(items) = clause else {
            panic!("expected conjunction");
        };
        assert_eq!(items[0], WhereClause::eq("alive", Operand::literal(true)));
        assert_eq!(items[1], WhereClause::eq("team", Operand::literal("red")));
    }

    #[test]
    fn empty_mapping_is_ambiguous() {
        let err = WhereClause::decode(&json!({})).unwrap_err();
        assert!(matches!(err, DecodeError::AmbiguousShorthand { .. }));
    }

    #[test]
    fn unresolvable_operator_is_ambiguous() {
        for doc in [json!({"pos": {"x": 1}}), json!({"hp": {">": 1, "<": 5}}), json!({"hp": {}})] {
            let err = WhereClause::decode(&doc).unwrap_err();
            assert!(
                matches!(err, DecodeError::AmbiguousShorthand { .. }),
                "unexpected {err:?} for {doc}"
            );
        }
    }

    #[test]
    fn nested_logic() {
        let clause = WhereClause::decode(&json!({
            "or": [{"team": "red"}, {"not": {"field": "alive", "value": false}}]
        }))
        .unwrap();
        assert!(matches!(clause, WhereClause::Or(ref items) if items.len() == 2));
    }

    #[test]
    fn reads_state_values_and_fields() {
        let clause = WhereClause::decode(&json!({
            "and": [
                {"health": {"<": "$.Config.lowHealth"}},
                {"field": "$.World.mode", "value": "war"},
                {"team": "param:team"}
            ]
        }))
        .unwrap();
        let reads = clause.depends_on();
        assert!(reads.contains(&Path::new("$.Config.lowHealth")));
        assert!(reads.contains(&Path::new("$.World.mode")));
        assert_eq!(reads.len(), 2);
    }

    #[test]
    fn null_value_round_trips() {
        let clause = WhereClause::decode(&json!({"owner": null})).unwrap();
        assert_eq!(WhereClause::decode(&clause.encode()).unwrap(), clause);
    }
}
