use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{DistanceUnit, Operand, Path, PathKind, WhereClause};
use crate::analysis::{Dependencies, DependencyCollector};
use crate::document::{decode_list, json_kind, Decode, DecodeError, Encode, Fields, ObjectBuilder};

keyword_enum! {
    pub enum ViewOperationKind {
        Filter => "Filter",
        Map => "Map",
        Sort => "Sort",
        Limit => "Limit",
        Offset => "Offset",
        GroupBy => "GroupBy",
        Distinct => "Distinct",
        Pluck => "Pluck",
        Distance => "Distance",
        Nearest => "Nearest",
        Farthest => "Farthest",
        Min => "Min",
        Max => "Max",
        Sum => "Sum",
        Avg => "Avg",
        Count => "Count",
        First => "First",
        Last => "Last",
    }
}

keyword_enum! {
    pub enum SortOrder {
        Asc => "asc",
        Desc => "desc",
    }
}

keyword_enum! {
    /// Reduction applied to each group of a `GroupBy`.
    pub enum Aggregation {
        Count => "Count",
        Sum => "Sum",
        Avg => "Avg",
        Min => "Min",
        Max => "Max",
        First => "First",
        Last => "Last",
    }
}

keyword_enum! {
    /// Declared type of a view parameter. Informational; values are not coerced.
    pub enum ParamType {
        Any => "any",
        Number => "number",
        String => "string",
        Boolean => "boolean",
        Path => "path",
        Position => "position",
        List => "list",
    }
}

/// Parameters shared by the `Nearest` and `Farthest` pipeline operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityOperation {
    pub origin: Operand,
    /// Field holding each row's position.
    pub field: Option<Path>,
    pub count: Option<u32>,
    pub max_distance: Option<f64>,
    pub min_distance: Option<f64>,
    pub unit: Option<DistanceUnit>,
}

/// One stage of a view pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOperation {
    Filter {
        filter: WhereClause,
    },
    /// Projection. Values are kept undecoded and re-read during analysis,
    /// since a projection may hold any document shape.
    Map {
        fields: Map<String, Value>,
    },
    Sort {
        by: Path,
        order: SortOrder,
    },
    Limit {
        count: u32,
    },
    Offset {
        count: u32,
    },
    GroupBy {
        group_field: Path,
        aggregate: Option<Aggregation>,
        field: Option<Path>,
    },
    Distinct {
        field: Path,
    },
    Pluck {
        field: Path,
    },
    /// Annotates each row with its distance to `to` (or `origin`).
    Distance {
        from: Option<Operand>,
        to: Option<Operand>,
        origin: Option<Operand>,
        unit: Option<DistanceUnit>,
    },
    Nearest(ProximityOperation),
    Farthest(ProximityOperation),
    Min {
        field: Path,
    },
    Max {
        field: Path,
    },
    Sum {
        field: Path,
    },
    Avg {
        field: Path,
    },
    Count,
    First,
    Last,
}

impl ViewOperation {
    #[must_use]
    pub fn kind(&self) -> ViewOperationKind {
        match self {
            ViewOperation::Filter { .. } => ViewOperationKind::Filter,
            ViewOperation::Map { .. } => ViewOperationKind::Map,
            ViewOperation::Sort { .. } => ViewOperationKind::Sort,
            ViewOperation::Limit { .. } => ViewOperationKind::Limit,
            ViewOperation::Offset { .. } => ViewOperationKind::Offset,
            ViewOperation::GroupBy { .. } => ViewOperationKind::GroupBy,
            ViewOperation::Distinct { .. } => ViewOperationKind::Distinct,
            ViewOperation::Pluck { .. } => ViewOperationKind::Pluck,
            ViewOperation::Distance { .. } => ViewOperationKind::Distance,
            ViewOperation::Nearest(_) => ViewOperationKind::Nearest,
            ViewOperation::Farthest(_) => ViewOperationKind::Farthest,
            ViewOperation::Min { .. } => ViewOperationKind::Min,
            ViewOperation::Max { .. } => ViewOperationKind::Max,
            ViewOperation::Sum { .. } => ViewOperationKind::Sum,
            ViewOperation::Avg { .. } => ViewOperationKind::Avg,
            ViewOperation::Count => ViewOperationKind::Count,
            ViewOperation::First => ViewOperationKind::First,
            ViewOperation::Last => ViewOperationKind::Last,
        }
    }

    /// Reduces the row set to a single value.
    #[must_use]
    pub fn is_aggregation(&self) -> bool {
        matches!(
            self,
            ViewOperation::Min { .. }
                | ViewOperation::Max { .. }
                | ViewOperation::Sum { .. }
                | ViewOperation::Avg { .. }
                | ViewOperation::Count
                | ViewOperation::First
                | ViewOperation::Last
        )
    }

    #[must_use]
    pub fn is_spatial(&self) -> bool {
        matches!(
            self,
            ViewOperation::Distance { .. } | ViewOperation::Nearest(_) | ViewOperation::Farthest(_)
        )
    }
}

impl ProximityOperation {
    fn decode(f: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(ProximityOperation {
            origin: f.required_operand("origin")?,
            field: f.path("field")?,
            count: f.u32("count")?,
            max_distance: f.f64("maxDistance")?,
            min_distance: f.f64("minDistance")?,
            unit: f.keyword("unit")?,
        })
    }

    fn encode_into(&self, out: ObjectBuilder) -> ObjectBuilder {
        out.node("origin", &self.origin)
            .opt("field", self.field.as_ref().map(Path::as_str))
            .opt("count", self.count)
            .opt("maxDistance", self.max_distance)
            .opt("minDistance", self.min_distance)
            .opt("unit", self.unit.map(DistanceUnit::as_str))
    }
}

impl Decode for ViewOperation {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("view operation", doc)?;
        let kind_str = f.discriminator()?.ok_or(DecodeError::MissingType {
            node: "view operation",
        })?;
        let kind = kind_str
            .parse::<ViewOperationKind>()
            .map_err(|_| DecodeError::unknown("view operation", kind_str))?;
        let f = f.for_kind(kind_str);

        Ok(match kind {
            ViewOperationKind::Filter => ViewOperation::Filter {
                filter: f.required_node("where")?,
            },
            ViewOperationKind::Map => match f.required("fields")? {
                Value::Object(fields) => ViewOperation::Map {
                    fields: fields.clone(),
                },
                other => {
                    return Err(DecodeError::malformed(
                        "view operation",
                        format!("Map 'fields' must be a mapping, found {}", json_kind(other)),
                    ))
                }
            },
            ViewOperationKind::Sort => ViewOperation::Sort {
                by: f.required_path("by")?,
                order: f.keyword("order")?.unwrap_or(SortOrder::Asc),
            },
            ViewOperationKind::Limit => ViewOperation::Limit {
                count: required_count(&f)?,
            },
            ViewOperationKind::Offset => ViewOperation::Offset {
                count: required_count(&f)?,
            },
            ViewOperationKind::GroupBy => ViewOperation::GroupBy {
                group_field: f.required_path("groupField")?,
                aggregate: f.keyword("aggregate")?,
                field: f.path("field")?,
            },
            ViewOperationKind::Distinct => ViewOperation::Distinct {
                field: f.required_path("field")?,
            },
            ViewOperationKind::Pluck => ViewOperation::Pluck {
                field: f.required_path("field")?,
            },
            ViewOperationKind::Distance => {
                let op = ViewOperation::Distance {
                    from: f.operand("from")?,
                    to: f.operand("to")?,
                    origin: f.operand("origin")?,
                    unit: f.keyword("unit")?,
                };
                if !f.has("to") && !f.has("origin") {
                    f.required("origin")?;
                }
                op
            }
            ViewOperationKind::Nearest => ViewOperation::Nearest(ProximityOperation::decode(&f)?),
            ViewOperationKind::Farthest => ViewOperation::Farthest(ProximityOperation::decode(&f)?),
            ViewOperationKind::Min => ViewOperation::Min {
                field: f.required_path("field")?,
            },
            ViewOperationKind::Max => ViewOperation::Max {
                field: f.required_path("field")?,
            },
            ViewOperationKind::Sum => ViewOperation::Sum {
                field: f.required_path("field")?,
            },
            ViewOperationKind::Avg => ViewOperation::Avg {
                field: f.required_path("field")?,
            },
            ViewOperationKind::Count => ViewOperation::Count,
            ViewOperationKind::First => ViewOperation::First,
            ViewOperationKind::Last => ViewOperation::Last,
        })
    }
}

fn required_count(f: &Fields<'_>) -> Result<u32, DecodeError> {
    f.required("count")?;
    f.u32("count").map(|count| count.unwrap_or_default())
}

impl Encode for ViewOperation {
    fn encode(&self) -> Value {
        let out = ObjectBuilder::typed(self.kind().as_str());
        match self {
            ViewOperation::Filter { filter } => out.node("where", filter),
            ViewOperation::Map { fields } => out.field("fields", Value::Object(fields.clone())),
            ViewOperation::Sort { by, order } => {
                out.field("by", by.as_str()).field("order", order.as_str())
            }
            ViewOperation::Limit { count } | ViewOperation::Offset { count } => {
                out.field("count", *count)
            }
            ViewOperation::GroupBy {
                group_field,
                aggregate,
                field,
            } => out
                .field("groupField", group_field.as_str())
                .opt("aggregate", aggregate.map(Aggregation::as_str))
                .opt("field", field.as_ref().map(Path::as_str)),
            ViewOperation::Distinct { field }
            | ViewOperation::Pluck { field }
            | ViewOperation::Min { field }
            | ViewOperation::Max { field }
            | ViewOperation::Sum { field }
            | ViewOperation::Avg { field } => out.field("field", field.as_str()),
            ViewOperation::Distance {
                from,
                to,
                origin,
                unit,
            } => out
                .opt_node("from", from.as_ref())
                .opt_node("to", to.as_ref())
                .opt_node("origin", origin.as_ref())
                .opt("unit", unit.map(DistanceUnit::as_str)),
            ViewOperation::Nearest(p) | ViewOperation::Farthest(p) => p.encode_into(out),
            ViewOperation::Count | ViewOperation::First | ViewOperation::Last => out,
        }
        .build()
    }
}

impl Dependencies for ViewOperation {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        match self {
            ViewOperation::Filter { filter } => filter.collect_reads(deps),
            ViewOperation::Map { fields } => {
                for (name, value) in fields {
                    match Operand::decode(value) {
                        Ok(operand) => operand.collect_reads(deps),
                        Err(e) => deps.diagnose(format!("projection '{name}' dropped: {e}")),
                    }
                }
            }
            ViewOperation::Sort { by, .. } => deps.read(by),
            ViewOperation::GroupBy {
                group_field, field, ..
            } => {
                deps.read(group_field);
                if let Some(field) = field {
                    deps.read(field);
                }
            }
            ViewOperation::Distinct { field }
            | ViewOperation::Pluck { field }
            | ViewOperation::Min { field }
            | ViewOperation::Max { field }
            | ViewOperation::Sum { field }
            | ViewOperation::Avg { field } => deps.read(field),
            ViewOperation::Distance {
                from, to, origin, ..
            } => {
                from.collect_reads(deps);
                to.collect_reads(deps);
                origin.collect_reads(deps);
            }
            ViewOperation::Nearest(p) | ViewOperation::Farthest(p) => {
                p.origin.collect_reads(deps);
                if let Some(field) = &p.field {
                    deps.read(field);
                }
            }
            ViewOperation::Limit { .. }
            | ViewOperation::Offset { .. }
            | ViewOperation::Count
            | ViewOperation::First
            | ViewOperation::Last => {}
        }
    }
}

/// A declared view parameter, bound through `param:<name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewParam {
    pub ty: ParamType,
    pub default: Option<Value>,
}

impl Decode for ViewParam {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        // `"radius": "number"` declares a type with no default.
        if let Value::String(ty) = doc {
            let ty = ty
                .parse::<ParamType>()
                .map_err(|e| DecodeError::invalid("type", e.to_string()))?;
            return Ok(ViewParam { ty, default: None });
        }
        let f = Fields::of("view parameter", doc)?;
        Ok(ViewParam {
            ty: f.keyword("type")?.unwrap_or(ParamType::Any),
            default: f.get("default").cloned(),
        })
    }
}

impl Encode for ViewParam {
    fn encode(&self) -> Value {
        ObjectBuilder::new()
            .field("type", self.ty.as_str())
            .opt("default", self.default.clone())
            .build()
    }
}

/// A declarative query: a source collection run through a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub name: Option<String>,
    pub source: String,
    pub pipeline: Vec<ViewOperation>,
    pub params: BTreeMap<String, ViewParam>,
}

impl View {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        View {
            name: None,
            source: source.into(),
            pipeline: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, operation: ViewOperation) -> Self {
        self.pipeline.push(operation);
        self
    }

    /// True if any pipeline stage reduces rows to a single value.
    #[must_use]
    pub fn is_aggregation(&self) -> bool {
        self.pipeline.iter().any(ViewOperation::is_aggregation)
    }

    /// True if any pipeline stage measures distance.
    #[must_use]
    pub fn is_spatial(&self) -> bool {
        self.pipeline.iter().any(ViewOperation::is_spatial)
    }

    #[must_use]
    pub fn is_parameterized(&self) -> bool {
        !self.params.is_empty()
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("view '{name}'"),
            None => "view".to_owned(),
        }
    }
}

impl Decode for View {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("view", doc)?;
        let pipeline = match f.get("pipeline") {
            None => Vec::new(),
            Some(Value::Array(items)) => decode_list(items, "pipeline operation")?,
            Some(other) => {
                return Err(DecodeError::malformed(
                    "view",
                    format!("'pipeline' must be a list, found {}", json_kind(other)),
                ))
            }
        };
        let params = match f.get("params") {
            None => BTreeMap::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, v)| {
                    ViewParam::decode(v)
                        .map(|p| (name.clone(), p))
                        .map_err(|e| e.at(format!("param '{name}'")))
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(DecodeError::malformed(
                    "view",
                    format!("'params' must be a mapping, found {}", json_kind(other)),
                ))
            }
        };
        Ok(View {
            name: f.string("name")?.filter(|n| !n.is_empty()),
            source: f.required_str("source")?.to_owned(),
            pipeline,
            params,
        })
    }
}

impl Encode for View {
    fn encode(&self) -> Value {
        let mut out = ObjectBuilder::new()
            .opt("name", self.name.as_deref())
            .field("source", self.source.as_str())
            .list("pipeline", &self.pipeline);
        if !self.params.is_empty() {
            let params: Map<String, Value> = self
                .params
                .iter()
                .map(|(name, p)| (name.clone(), p.encode()))
                .collect();
            out = out.field("params", Value::Object(params));
        }
        out.build()
    }
}

impl Dependencies for View {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        match Path::new(self.source.as_str()).kind() {
            PathKind::State | PathKind::Field => deps.read_collection(&self.source),
            _ => {}
        }
        deps.scoped(self.label(), |deps| {
            for (i, operation) in self.pipeline.iter().enumerate() {
                deps.scoped(format!("pipeline operation {i}"), |deps| {
                    operation.collect_reads(deps);
                });
            }
        });
    }
}

/// A view given by name (`"ranked"` or `"view:ranked"`) or inline.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewRef {
    Named(String),
    Inline(Box<View>),
}

impl Decode for ViewRef {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        match doc {
            Value::String(name) => {
                let name = name.strip_prefix("view:").unwrap_or(name);
                if name.is_empty() {
                    return Err(DecodeError::invalid("targets", "empty view name"));
                }
                Ok(ViewRef::Named(name.to_owned()))
            }
            Value::Object(_) => View::decode(doc).map(|v| ViewRef::Inline(Box::new(v))),
            other => Err(DecodeError::malformed(
                "view reference",
                format!("expected a view name or an inline view, found {}", json_kind(other)),
            )),
        }
    }
}

impl Encode for ViewRef {
    fn encode(&self) -> Value {
        match self {
            ViewRef::Named(name) => Value::String(name.clone()),
            ViewRef::Inline(view) => view.encode(),
        }
    }
}

impl Dependencies for ViewRef {
    /// Named views are analysed where they are declared.
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        if let ViewRef::Inline(view) = self {
            view.collect_reads(deps);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn view_refs() {
        assert_eq!(
            ViewRef::decode(&json!("view:ranked")).unwrap(),
            ViewRef::Named("ranked".into())
        );
        assert_eq!(
            ViewRef::decode(&json!("ranked")).unwrap(),
            ViewRef::Named("ranked".into())
        );
        let inline = ViewRef::decode(&json!({"source": "Players"})).unwrap();
        assert!(inline.depends_on().contains(&Path::new("$.Players")));
        assert!(ViewRef::decode(&json!(3)).is_err());
    }

    fn ranked() -> Value {
        json!({
            "name": "ranked",
            "source": "Players",
            "params": {"minScore": {"type": "number", "default": 0}, "team": "string"},
            "pipeline": [
                {"type": "Filter", "where": {"score": {">=": "param:minScore"}}},
                {"type": "Sort", "by": "score", "order": "desc"},
                {"type": "Limit", "count": 10}
            ]
        })
    }

    #[test]
    fn decode_parameterized_view() {
        let view = View::decode(&ranked()).unwrap();
        assert_eq!(view.name.as_deref(), Some("ranked"));
        assert_eq!(view.pipeline.len(), 3);
        assert_eq!(view.params["minScore"].ty, ParamType::Number);
        assert_eq!(view.params["minScore"].default, Some(json!(0)));
        assert_eq!(view.params["team"].default, None);
        assert!(!view.is_aggregation());
        assert!(!view.is_spatial());
        assert_eq!(View::decode(&view.encode()).unwrap(), view);
    }

    #[test]
    fn empty_source_is_rejected() {
        let err = View::decode(&json!({"source": "", "pipeline": []})).unwrap_err();
        assert_eq!(err, DecodeError::MissingField { node: "view".into(), field: "source" });
        assert!(View::decode(&json!({"pipeline": []})).is_err());
    }

    #[test]
    fn unknown_operation_carries_position() {
        let err = View::decode(&json!({
            "source": "Units",
            "pipeline": [{"type": "Count"}, {"type": "Sort", "by": "x"}, {"type": "Explode"}]
        }))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "pipeline operation 2: unknown view operation type 'Explode'"
        );
    }

    #[test]
    fn operation_requires_type() {
        let err =
            View::decode(&json!({"source": "Units", "pipeline": [{"type": ""}]})).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DecodeError::MissingType { node: "view operation" }
        ));
    }

    #[test]
    fn classification() {
        let agg = View::new("Units").with(ViewOperation::Count);
        assert!(agg.is_aggregation());
        let spatial = View::decode(&json!({
            "source": "Drones",
            "pipeline": [{"type": "Nearest", "origin": "$.Base.position", "count": 3}]
        }))
        .unwrap();
        assert!(spatial.is_spatial());
        assert!(!spatial.is_aggregation());
    }

    #[test]
    fn depends_on_source_and_pipeline() {
        let view = View::decode(&json!({
            "source": "$.Enemies",
            "pipeline": [
                {"type": "Filter", "where": {"alive": true}},
                {"type": "Distance", "from": "self.position", "origin": "$.Player.position"},
                {"type": "Sort", "by": "$.Config.sortKey"},
                {"type": "Map", "fields": {"hp": "$.Rules.maxHp", "name": "name"}}
            ]
        }))
        .unwrap();
        let reads: Vec<Path> = view.depends_on().into_iter().collect();
        assert_eq!(
            reads,
            vec![
                Path::new("$.Config.sortKey"),
                Path::new("$.Enemies"),
                Path::new("$.Player.position"),
                Path::new("$.Rules.maxHp"),
            ]
        );
    }

    #[test]
    fn map_projection_redecodes_transforms() {
        let view = View::decode(&json!({
            "source": "Units",
            "pipeline": [{"type": "Map", "fields": {
                "power": {"type": "Multiply", "left": "attack", "right": "$.World.multiplier"}
            }}]
        }))
        .unwrap();
        assert!(view.depends_on().contains(&Path::new("$.World.multiplier")));
    }

    #[test]
    fn broken_projection_is_diagnosed_not_fatal() {
        let view = View::decode(&json!({
            "name": "broken",
            "source": "Units",
            "pipeline": [{"type": "Map", "fields": {"bad": {"type": "Add", "left": "$.a"}}}]
        }))
        .unwrap();
        let mut deps = DependencyCollector::new();
        view.collect_reads(&mut deps);
        let (reads, diagnostics) = deps.into_parts();
        assert_eq!(reads.into_iter().collect::<Vec<_>>(), vec![Path::new("$.Units")]);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .context
            .starts_with("view 'broken': pipeline operation 0"));
    }

    #[test]
    fn view_reference_source_reads_nothing() {
        let view = View::new("view:ranked").with(ViewOperation::First);
        assert!(view.depends_on().is_empty());
    }

    #[test]
    fn distance_needs_a_target() {
        let err = View::decode(&json!({
            "source": "Units", "pipeline": [{"type": "Distance", "from": "self.position"}]
        }))
        .unwrap_err();
        assert!(matches!(err.root_cause(), DecodeError::MissingField { field: "origin", .. }));
    }

    #[test]
    fn limit_requires_count() {
        let err =
            View::decode(&json!({"source": "U", "pipeline": [{"type": "Limit"}]})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "pipeline operation 0: Limit view operation requires field 'count'"
        );
    }
}
