use std::collections::BTreeMap;

use serde_json::Value;

use super::{DistanceUnit, Operand, Path, Transform, ViewRef};
use crate::analysis::{Dependencies, DependencyCollector};
use crate::document::{Decode, DecodeError, Encode, Fields, ObjectBuilder};

keyword_enum! {
    pub enum ValueExpressionKind {
        ViewResult => "viewResult",
        Distance => "distance",
        Field => "field",
        Literal => "literal",
        Transform => "transform",
    }
}

/// The value source of a `SetFromView` effect.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpression {
    /// Result of evaluating a view, with parameter bindings.
    ViewResult {
        view: ViewRef,
        params: BTreeMap<String, Operand>,
    },
    Distance {
        from: Operand,
        to: Operand,
        unit: Option<DistanceUnit>,
    },
    Field {
        path: Path,
    },
    Literal {
        value: Value,
    },
    Transform {
        transform: Transform,
    },
}

impl ValueExpression {
    #[must_use]
    pub fn kind(&self) -> ValueExpressionKind {
        match self {
            ValueExpression::ViewResult { .. } => ValueExpressionKind::ViewResult,
            ValueExpression::Distance { .. } => ValueExpressionKind::Distance,
            ValueExpression::Field { .. } => ValueExpressionKind::Field,
            ValueExpression::Literal { .. } => ValueExpressionKind::Literal,
            ValueExpression::Transform { .. } => ValueExpressionKind::Transform,
        }
    }
}

impl Decode for ValueExpression {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("value expression", doc)?;
        let kind_str = f.discriminator()?.ok_or(DecodeError::MissingType {
            node: "value expression",
        })?;
        let kind = kind_str
            .parse::<ValueExpressionKind>()
            .map_err(|_| DecodeError::unknown("value expression", kind_str))?;
        let f = f.for_kind(kind_str);

        Ok(match kind {
            ValueExpressionKind::ViewResult => ValueExpression::ViewResult {
                view: f.required_node("view")?,
                params: f.operand_map("params")?,
            },
            ValueExpressionKind::Distance => ValueExpression::Distance {
                from: f.required_operand("from")?,
                to: f.required_operand("to")?,
                unit: f.keyword("unit")?,
            },
            ValueExpressionKind::Field => ValueExpression::Field {
                path: f.required_path("path")?,
            },
            // `null` is a legitimate literal, so only key presence is checked.
            ValueExpressionKind::Literal => match f.map().get("value") {
                Some(value) => ValueExpression::Literal {
                    value: value.clone(),
                },
                None => {
                    f.required("value")?;
                    ValueExpression::Literal { value: Value::Null }
                }
            },
            ValueExpressionKind::Transform => ValueExpression::Transform {
                transform: f.required_node("transform")?,
            },
        })
    }
}

impl Encode for ValueExpression {
    fn encode(&self) -> Value {
        let out = ObjectBuilder::typed(self.kind().as_str());
        match self {
            ValueExpression::ViewResult { view, params } => {
                out.node("view", view).operand_map("params", params)
            }
            ValueExpression::Distance { from, to, unit } => out
                .node("from", from)
                .node("to", to)
                .opt("unit", unit.map(DistanceUnit::as_str)),
            ValueExpression::Field { path } => out.field("path", path.as_str()),
            ValueExpression::Literal { value } => out.field("value", value.clone()),
            ValueExpression::Transform { transform } => out.node("transform", transform),
        }
        .build()
    }
}

impl Dependencies for ValueExpression {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        match self {
            ValueExpression::ViewResult { view, params } => {
                view.collect_reads(deps);
                for operand in params.values() {
                    operand.collect_reads(deps);
                }
            }
            ValueExpression::Distance { from, to, .. } => {
                from.collect_reads(deps);
                to.collect_reads(deps);
            }
            ValueExpression::Field { path } => deps.read(path),
            ValueExpression::Literal { .. } => {}
            ValueExpression::Transform { transform } => transform.collect_reads(deps),
        }
    }
}
