use serde_json::Value;

use super::{DistanceUnit, Expression, Operand};
use crate::analysis::{Dependencies, DependencyCollector};
use crate::document::{Decode, DecodeError, Encode, Fields, ObjectBuilder};

keyword_enum! {
    /// Every transform discriminator.
    pub enum TransformKind {
        Add => "Add",
        Subtract => "Subtract",
        Multiply => "Multiply",
        Divide => "Divide",
        Modulo => "Modulo",
        Power => "Power",
        Min => "Min",
        Max => "Max",
        Coalesce => "Coalesce",
        Concat => "Concat",
        Abs => "Abs",
        Round => "Round",
        Floor => "Floor",
        Ceil => "Ceil",
        Sqrt => "Sqrt",
        Negate => "Negate",
        Uppercase => "Uppercase",
        Lowercase => "Lowercase",
        Length => "Length",
        TimeSince => "TimeSince",
        Clamp => "Clamp",
        Lerp => "Lerp",
        MoveTowards => "MoveTowards",
        Random => "Random",
        GpsDistance => "GpsDistance",
        GpsBearing => "GpsBearing",
        GpsMoveTowards => "GpsMoveTowards",
        PointInPolygon => "PointInPolygon",
        Format => "Format",
        If => "If",
        Now => "Now",
        AddDuration => "AddDuration",
        Uuid => "Uuid",
    }
}

keyword_enum! {
    /// Transforms over a `left` and a `right` operand.
    pub enum BinaryOp {
        Add => "Add",
        Subtract => "Subtract",
        Multiply => "Multiply",
        Divide => "Divide",
        Modulo => "Modulo",
        Power => "Power",
    }
}

keyword_enum! {
    /// Transforms over a single `value`.
    pub enum UnaryOp {
        Abs => "Abs",
        Round => "Round",
        Floor => "Floor",
        Ceil => "Ceil",
        Sqrt => "Sqrt",
        Negate => "Negate",
        Uppercase => "Uppercase",
        Lowercase => "Lowercase",
        Length => "Length",
        /// Seconds elapsed since the timestamp in `value`.
        TimeSince => "TimeSince",
    }
}

keyword_enum! {
    /// Transforms over a `values` list.
    pub enum VariadicOp {
        Min => "Min",
        Max => "Max",
        /// First non-null value.
        Coalesce => "Coalesce",
        Concat => "Concat",
    }
}

impl VariadicOp {
    /// Document key holding the operand list. `Concat` also accepts `values`.
    #[must_use]
    pub fn list_key(self) -> &'static str {
        match self {
            VariadicOp::Concat => "strings",
            VariadicOp::Min | VariadicOp::Max | VariadicOp::Coalesce => "values",
        }
    }
}

impl From<BinaryOp> for TransformKind {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => TransformKind::Add,
            BinaryOp::Subtract => TransformKind::Subtract,
            BinaryOp::Multiply => TransformKind::Multiply,
            BinaryOp::Divide => TransformKind::Divide,
            BinaryOp::Modulo => TransformKind::Modulo,
            BinaryOp::Power => TransformKind::Power,
        }
    }
}

impl From<UnaryOp> for TransformKind {
    fn from(op: UnaryOp) -> Self {
        match op {
            UnaryOp::Abs => TransformKind::Abs,
            UnaryOp::Round => TransformKind::Round,
            UnaryOp::Floor => TransformKind::Floor,
            UnaryOp::Ceil => TransformKind::Ceil,
            UnaryOp::Sqrt => TransformKind::Sqrt,
            UnaryOp::Negate => TransformKind::Negate,
            UnaryOp::Uppercase => TransformKind::Uppercase,
            UnaryOp::Lowercase => TransformKind::Lowercase,
            UnaryOp::Length => TransformKind::Length,
            UnaryOp::TimeSince => TransformKind::TimeSince,
        }
    }
}

impl From<VariadicOp> for TransformKind {
    fn from(op: VariadicOp) -> Self {
        match op {
            VariadicOp::Min => TransformKind::Min,
            VariadicOp::Max => TransformKind::Max,
            VariadicOp::Coalesce => TransformKind::Coalesce,
            VariadicOp::Concat => TransformKind::Concat,
        }
    }
}

/// A pure value computation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Binary {
        op: BinaryOp,
        left: Operand,
        right: Operand,
    },
    Unary {
        op: UnaryOp,
        value: Operand,
    },
    Variadic {
        op: VariadicOp,
        values: Vec<Operand>,
    },
    Clamp {
        value: Operand,
        min: Operand,
        max: Operand,
    },
    /// Linear interpolation from `from` to `to` by factor `t`.
    Lerp {
        from: Operand,
        to: Operand,
        t: Operand,
    },
    MoveTowards {
        current: Operand,
        target: Operand,
        speed: Operand,
    },
    /// Uniform in `[min, max)`; `[0, 1)` when both bounds are absent.
    Random {
        min: Option<Operand>,
        max: Option<Operand>,
    },
    GpsDistance {
        from: Operand,
        to: Operand,
        unit: Option<DistanceUnit>,
    },
    GpsBearing {
        from: Operand,
        to: Operand,
    },
    GpsMoveTowards {
        current: Operand,
        target: Operand,
        speed: Operand,
        unit: Option<DistanceUnit>,
    },
    PointInPolygon {
        point: Operand,
        polygon: Operand,
    },
    /// `{0}`-style positional template.
    Format {
        format: Operand,
        values: Vec<Operand>,
    },
    If {
        condition: Expression,
        then: Operand,
        otherwise: Option<Operand>,
    },
    Now,
    AddDuration {
        value: Operand,
        duration: Operand,
    },
    Uuid,
}

impl Transform {
    #[must_use]
    pub fn binary(op: BinaryOp, left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Transform::Binary {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    #[must_use]
    pub fn unary(op: UnaryOp, value: impl Into<Operand>) -> Self {
        Transform::Unary {
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TransformKind {
        match self {
            Transform::Binary { op, .. } => (*op).into(),
            Transform::Unary { op, .. } => (*op).into(),
            Transform::Variadic { op, .. } => (*op).into(),
            Transform::Clamp { .. } => TransformKind::Clamp,
            Transform::Lerp { .. } => TransformKind::Lerp,
            Transform::MoveTowards { .. } => TransformKind::MoveTowards,
            Transform::Random { .. } => TransformKind::Random,
            Transform::GpsDistance { .. } => TransformKind::GpsDistance,
            Transform::GpsBearing { .. } => TransformKind::GpsBearing,
            Transform::GpsMoveTowards { .. } => TransformKind::GpsMoveTowards,
            Transform::PointInPolygon { .. } => TransformKind::PointInPolygon,
            Transform::Format { .. } => TransformKind::Format,
            Transform::If { .. } => TransformKind::If,
            Transform::Now => TransformKind::Now,
            Transform::AddDuration { .. } => TransformKind::AddDuration,
            Transform::Uuid => TransformKind::Uuid,
        }
    }

    /// True for kinds whose result differs between evaluations with equal inputs.
    #[must_use]
    pub fn is_nondeterministic(&self) -> bool {
        matches!(
            self,
            Transform::Random { .. }
                | Transform::Now
                | Transform::Uuid
                | Transform::Unary {
                    op: UnaryOp::TimeSince,
                    ..
                }
        )
    }
}

fn binary(f: &Fields<'_>, op: BinaryOp) -> Result<Transform, DecodeError> {
    Ok(Transform::Binary {
        op,
        left: f.required_operand("left")?,
        right: f.required_operand("right")?,
    })
}

fn unary(f: &Fields<'_>, op: UnaryOp) -> Result<Transform, DecodeError> {
    Ok(Transform::Unary {
        op,
        value: f.required_operand("value")?,
    })
}

fn variadic(f: &Fields<'_>, op: VariadicOp) -> Result<Transform, DecodeError> {
    let key = match op.list_key() {
        "strings" if !f.has("strings") && f.has("values") => "values",
        key => key,
    };
    f.required(key)?;
    Ok(Transform::Variadic {
        op,
        values: f.list(key, "value")?,
    })
}

impl Decode for Transform {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("transform", doc)?;
        let kind_str = f
            .discriminator()?
            .ok_or(DecodeError::MissingType { node: "transform" })?;
        let kind = kind_str
            .parse::<TransformKind>()
            .map_err(|_| DecodeError::unknown("transform", kind_str))?;
        let f = f.for_kind(kind_str);

        Ok(match kind {
            TransformKind::Add => binary(&f, BinaryOp::Add)?,
            TransformKind::Subtract => binary(&f, BinaryOp::Subtract)?,
            TransformKind::Multiply => binary(&f, BinaryOp::Multiply)?,
            TransformKind::Divide => binary(&f, BinaryOp::Divide)?,
            TransformKind::Modulo => binary(&f, BinaryOp::Modulo)?,
            TransformKind::Power => binary(&f, BinaryOp::Power)?,
            TransformKind::Min => variadic(&f, VariadicOp::Min)?,
            TransformKind::Max => variadic(&f, VariadicOp::Max)?,
            TransformKind::Coalesce => variadic(&f, VariadicOp::Coalesce)?,
            TransformKind::Concat => variadic(&f, VariadicOp::Concat)?,
            TransformKind::Abs => unary(&f, UnaryOp::Abs)?,
            TransformKind::Round => unary(&f, UnaryOp::Round)?,
            TransformKind::Floor => unary(&f, UnaryOp::Floor)?,
            TransformKind::Ceil => unary(&f, UnaryOp::Ceil)?,
            TransformKind::Sqrt => unary(&f, UnaryOp::Sqrt)?,
            TransformKind::Negate => unary(&f, UnaryOp::Negate)?,
            TransformKind::Uppercase => unary(&f, UnaryOp::Uppercase)?,
            TransformKind::Lowercase => unary(&f, UnaryOp::Lowercase)?,
            TransformKind::Length => unary(&f, UnaryOp::Length)?,
            TransformKind::TimeSince => unary(&f, UnaryOp::TimeSince)?,
            TransformKind::Clamp => Transform::Clamp {
                value: f.required_operand("value")?,
                min: f.required_operand("min")?,
                max: f.required_operand("max")?,
            },
            TransformKind::Lerp => Transform::Lerp {
                from: f.required_operand("from")?,
                to: f.required_operand("to")?,
                t: f.required_operand("t")?,
            },
            TransformKind::MoveTowards => Transform::MoveTowards {
                current: f.required_operand("current")?,
                target: f.required_operand("target")?,
                speed: f.required_operand("speed")?,
            },
            TransformKind::Random => Transform::Random {
                min: f.operand("min")?,
                max: f.operand("max")?,
            },
            TransformKind::GpsDistance => Transform::GpsDistance {
                from: f.required_operand("from")?,
                to: f.required_operand("to")?,
                unit: f.keyword("unit")?,
            },
            TransformKind::GpsBearing => Transform::GpsBearing {
                from: f.required_operand("from")?,
                to: f.required_operand("to")?,
            },
            TransformKind::GpsMoveTowards => Transform::GpsMoveTowards {
                current: f.required_operand("current")?,
                target: f.required_operand("target")?,
                speed: f.required_operand("speed")?,
                unit: f.keyword("unit")?,
            },
            TransformKind::PointInPolygon => Transform::PointInPolygon {
                point: f.required_operand("point")?,
                polygon: f.required_operand("polygon")?,
            },
            TransformKind::Format => Transform::Format {
                format: f.required_operand("format")?,
                values: f.list("values", "value")?,
            },
            TransformKind::If => Transform::If {
                condition: f.required_node("condition")?,
                then: f.required_operand("then")?,
                otherwise: f.operand("else")?,
            },
            TransformKind::Now => Transform::Now,
            TransformKind::AddDuration => Transform::AddDuration {
                value: f.required_operand("value")?,
                duration: f.required_operand("duration")?,
            },
            TransformKind::Uuid => Transform::Uuid,
        })
    }
}

impl Encode for Transform {
    fn encode(&self) -> Value {
        let out = ObjectBuilder::typed(self.kind().as_str());
        match self {
            Transform::Binary { left, right, .. } => out.node("left", left).node("right", right),
            Transform::Unary { value, .. } => out.node("value", value),
            Transform::Variadic { op, values } => {
                out.field(op.list_key(), super::expr::encode_all(values))
            }
            Transform::Clamp { value, min, max } => {
                out.node("value", value).node("min", min).node("max", max)
            }
            Transform::Lerp { from, to, t } => out.node("from", from).node("to", to).node("t", t),
            Transform::MoveTowards {
                current,
                target,
                speed,
            } => out
                .node("current", current)
                .node("target", target)
                .node("speed", speed),
            Transform::Random { min, max } => {
                out.opt_node("min", min.as_ref()).opt_node("max", max.as_ref())
            }
            Transform::GpsDistance { from, to, unit } => out
                .node("from", from)
                .node("to", to)
                .opt("unit", unit.map(DistanceUnit::as_str)),
            Transform::GpsBearing { from, to } => out.node("from", from).node("to", to),
            Transform::GpsMoveTowards {
                current,
                target,
                speed,
                unit,
            } => out
                .node("current", current)
                .node("target", target)
                .node("speed", speed)
                .opt("unit", unit.map(DistanceUnit::as_str)),
            Transform::PointInPolygon { point, polygon } => {
                out.node("point", point).node("polygon", polygon)
            }
            Transform::Format { format, values } => {
                out.node("format", format).list("values", values)
            }
            Transform::If {
                condition,
                then,
                otherwise,
            } => out
                .node("condition", condition)
                .node("then", then)
                .opt_node("else", otherwise.as_ref()),
            Transform::Now | Transform::Uuid => out,
            Transform::AddDuration { value, duration } => {
                out.node("value", value).node("duration", duration)
            }
        }
        .build()
    }
}

impl Dependencies for Transform {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        match self {
            Transform::Binary { left, right, .. } => {
                left.collect_reads(deps);
                right.collect_reads(deps);
            }
            Transform::Unary { value, .. } => value.collect_reads(deps),
            Transform::Variadic { values, .. } => values.collect_reads(deps),
            Transform::Clamp { value, min, max } => {
                value.collect_reads(deps);
                min.collect_reads(deps);
                max.collect_reads(deps);
            }
            Transform::Lerp { from, to, t } => {
                from.collect_reads(deps);
                to.collect_reads(deps);
                t.collect_reads(deps);
            }
            Transform::MoveTowards {
                current,
                target,
                speed,
            }
            | Transform::GpsMoveTowards {
                current,
                target,
                speed,
                ..
            } => {
                current.collect_reads(deps);
                target.collect_reads(deps);
                speed.collect_reads(deps);
            }
            Transform::Random { min, max } => {
                min.collect_reads(deps);
                max.collect_reads(deps);
            }
            Transform::GpsDistance { from, to, .. } | Transform::GpsBearing { from, to } => {
                from.collect_reads(deps);
                to.collect_reads(deps);
            }
            Transform::PointInPolygon { point, polygon } => {
                point.collect_reads(deps);
                polygon.collect_reads(deps);
            }
            Transform::Format { format, values } => {
                format.collect_reads(deps);
                values.collect_reads(deps);
            }
            Transform::If {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_reads(deps);
                then.collect_reads(deps);
                otherwise.collect_reads(deps);
            }
            Transform::Now | Transform::Uuid => {}
            Transform::AddDuration { value, duration } => {
                value.collect_reads(deps);
                duration.collect_reads(deps);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::Path;

    #[test]
    fn kind_table_is_complete() {
        assert_eq!(TransformKind::ALL.len(), 33);
        let grouped = BinaryOp::ALL.len() + UnaryOp::ALL.len() + VariadicOp::ALL.len();
        assert_eq!(grouped, 20);
        for op in BinaryOp::ALL {
            assert_eq!(TransformKind::from(*op).as_str(), op.as_str());
        }
        for op in UnaryOp::ALL {
            assert_eq!(TransformKind::from(*op).as_str(), op.as_str());
        }
        for op in VariadicOp::ALL {
            assert_eq!(TransformKind::from(*op).as_str(), op.as_str());
        }
    }

    #[test]
    fn decode_nested_arithmetic() {
        let t = Transform::decode(&json!({
            "type": "Multiply",
            "left": {"type": "Add", "left": "$.a", "right": 1},
            "right": "param:factor"
        }))
        .unwrap();
        assert_eq!(t.kind(), TransformKind::Multiply);
        assert_eq!(t.depends_on().into_iter().collect::<Vec<_>>(), vec![Path::new("$.a")]);
    }

    #[test]
    fn missing_type() {
        let err = Transform::decode(&json!({"left": 1, "right": 2})).unwrap_err();
        assert_eq!(err, DecodeError::MissingType { node: "transform" });
        let err = Transform::decode(&json!({"type": "", "left": 1})).unwrap_err();
        assert_eq!(err, DecodeError::MissingType { node: "transform" });
    }

    #[test]
    fn unknown_type() {
        let err = Transform::decode(&json!({"type": "Teleport"})).unwrap_err();
        assert_eq!(err.to_string(), "unknown transform type 'Teleport'");
    }

    #[test]
    fn missing_field_names_kind() {
        let err = Transform::decode(&json!({"type": "Clamp", "value": 1, "min": 0})).unwrap_err();
        assert_eq!(err.to_string(), "Clamp transform requires field 'max'");
        let err = Transform::decode(&json!({"type": "Max"})).unwrap_err();
        assert_eq!(err.to_string(), "Max transform requires field 'values'");
    }

    #[test]
    fn concat_takes_strings() {
        let doc = json!({"type": "Concat", "strings": ["a", "$.b"]});
        let t = Transform::decode(&doc).unwrap();
        assert!(matches!(
            &t,
            Transform::Variadic { op: VariadicOp::Concat, values } if values.len() == 2
        ));
        assert_eq!(t.depends_on().into_iter().collect::<Vec<_>>(), vec![Path::new("$.b")]);
        assert_eq!(t.encode(), doc);

        let alias = Transform::decode(&json!({"type": "Concat", "values": ["a", "$.b"]})).unwrap();
        assert_eq!(alias, t);

        let err = Transform::decode(&json!({"type": "Concat"})).unwrap_err();
        assert_eq!(err.to_string(), "Concat transform requires field 'strings'");
    }

    #[test]
    fn gps_distance_unit() {
        let t = Transform::decode(&json!({
            "type": "GpsDistance", "from": "self.position", "to": "$.Base.position", "unit": "km"
        }))
        .unwrap();
        assert!(matches!(
            t,
            Transform::GpsDistance {
                unit: Some(DistanceUnit::Kilometers),
                ..
            }
        ));
        assert_eq!(t.depends_on().len(), 1);

        let err = Transform::decode(&json!({
            "type": "GpsDistance", "from": "a", "to": "b", "unit": "league"
        }))
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { field: "unit", .. }));
    }

    #[test]
    fn conditional_reads_condition_and_branches() {
        let t = Transform::decode(&json!({
            "type": "If",
            "condition": {"left": "$.World.night", "op": "==", "right": true},
            "then": "$.Lights.dim",
            "else": "$.Lights.bright"
        }))
        .unwrap();
        assert_eq!(t.depends_on().len(), 3);
    }

    #[test]
    fn fieldless_kinds() {
        for kind in ["Now", "Uuid"] {
            let t = Transform::decode(&json!({"type": kind})).unwrap();
            assert!(t.is_nondeterministic());
            assert_eq!(t.encode(), json!({"type": kind}));
        }
    }

    #[test]
    fn encode_round_trip() {
        let doc = json!({
            "type": "Format",
            "format": "{0} scored {1}",
            "values": ["self.name", {"type": "Round", "value": "self.score"}]
        });
        let t = Transform::decode(&doc).unwrap();
        assert_eq!(t.encode(), doc);
    }
}
