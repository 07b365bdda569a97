use std::collections::BTreeMap;

use serde_json::Value;

use super::expr::encode_all;
use super::{Expression, Operand, Path, Transform, ValueExpression, ViewRef};
use crate::analysis::{Dependencies, DependencyCollector, Mutations, PathSet};
use crate::document::{Decode, DecodeError, Encode, Fields, ObjectBuilder};

keyword_enum! {
    pub enum EffectKind {
        Set => "Set",
        Increment => "Increment",
        Decrement => "Decrement",
        Transform => "Transform",
        SetFromView => "SetFromView",
        Spawn => "Spawn",
        Destroy => "Destroy",
        Emit => "Emit",
        If => "If",
        Sequence => "Sequence",
        EnableRule => "EnableRule",
        DisableRule => "DisableRule",
        ToggleRule => "ToggleRule",
        EnableTrigger => "EnableTrigger",
        DisableTrigger => "DisableTrigger",
        EnableFilter => "EnableFilter",
        DisableFilter => "DisableFilter",
        Log => "Log",
    }
}

keyword_enum! {
    /// Meta-control effects: switch a rule, its trigger or a filter on or off.
    pub enum ControlOp {
        EnableRule => "EnableRule",
        DisableRule => "DisableRule",
        ToggleRule => "ToggleRule",
        EnableTrigger => "EnableTrigger",
        DisableTrigger => "DisableTrigger",
        EnableFilter => "EnableFilter",
        DisableFilter => "DisableFilter",
    }
}

impl ControlOp {
    /// Document key naming the controlled rule or filter.
    #[must_use]
    pub fn target_key(self) -> &'static str {
        match self {
            ControlOp::EnableFilter | ControlOp::DisableFilter => "filter",
            _ => "rule",
        }
    }
}

impl From<ControlOp> for EffectKind {
    fn from(op: ControlOp) -> Self {
        match op {
            ControlOp::EnableRule => EffectKind::EnableRule,
            ControlOp::DisableRule => EffectKind::DisableRule,
            ControlOp::ToggleRule => EffectKind::ToggleRule,
            ControlOp::EnableTrigger => EffectKind::EnableTrigger,
            ControlOp::DisableTrigger => EffectKind::DisableTrigger,
            ControlOp::EnableFilter => EffectKind::EnableFilter,
            ControlOp::DisableFilter => EffectKind::DisableFilter,
        }
    }
}

keyword_enum! {
    pub enum LogLevel {
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

/// A state mutation, control-flow node or meta-control action.
///
/// Mutations are batch operations: when `targets` is set, `path` is resolved
/// relative to each entity the view yields; otherwise against the rule's
/// selected entities (or the root for `$.` paths).
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Set {
        targets: Option<ViewRef>,
        path: Path,
        value: Operand,
    },
    /// `value` defaults to 1.
    Increment {
        targets: Option<ViewRef>,
        path: Path,
        value: Operand,
    },
    /// `value` defaults to 1.
    Decrement {
        targets: Option<ViewRef>,
        path: Path,
        value: Operand,
    },
    Transform {
        targets: Option<ViewRef>,
        path: Path,
        transform: Transform,
    },
    SetFromView {
        targets: Option<ViewRef>,
        path: Path,
        value: ValueExpression,
    },
    Spawn {
        entity: String,
        fields: BTreeMap<String, Operand>,
    },
    Destroy {
        targets: Option<ViewRef>,
    },
    Emit {
        event: String,
        payload: BTreeMap<String, Operand>,
    },
    If {
        condition: Expression,
        then: Vec<Effect>,
        otherwise: Vec<Effect>,
    },
    Sequence {
        effects: Vec<Effect>,
    },
    Control {
        op: ControlOp,
        target: String,
    },
    Log {
        message: Operand,
        level: LogLevel,
    },
}

impl Effect {
    #[must_use]
    pub fn set(path: impl Into<Path>, value: impl Into<Operand>) -> Self {
        Effect::Set {
            targets: None,
            path: path.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Set { .. } => EffectKind::Set,
            Effect::Increment { .. } => EffectKind::Increment,
            Effect::Decrement { .. } => EffectKind::Decrement,
            Effect::Transform { .. } => EffectKind::Transform,
            Effect::SetFromView { .. } => EffectKind::SetFromView,
            Effect::Spawn { .. } => EffectKind::Spawn,
            Effect::Destroy { .. } => EffectKind::Destroy,
            Effect::Emit { .. } => EffectKind::Emit,
            Effect::If { .. } => EffectKind::If,
            Effect::Sequence { .. } => EffectKind::Sequence,
            Effect::Control { op, .. } => (*op).into(),
            Effect::Log { .. } => EffectKind::Log,
        }
    }

    /// The mutated path of a mutation effect.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Effect::Set { path, .. }
            | Effect::Increment { path, .. }
            | Effect::Decrement { path, .. }
            | Effect::Transform { path, .. }
            | Effect::SetFromView { path, .. } => Some(path),
            _ => None,
        }
    }

    #[must_use]
    pub fn targets(&self) -> Option<&ViewRef> {
        match self {
            Effect::Set { targets, .. }
            | Effect::Increment { targets, .. }
            | Effect::Decrement { targets, .. }
            | Effect::Transform { targets, .. }
            | Effect::SetFromView { targets, .. }
            | Effect::Destroy { targets } => targets.as_ref(),
            _ => None,
        }
    }
}

/// Kind for an effect document without a `type`, from the fields it carries.
fn infer_kind(f: &Fields<'_>) -> Result<EffectKind, DecodeError> {
    if f.has("path") {
        if f.map().contains_key("value") {
            return Ok(EffectKind::Set);
        }
        if f.has("valueExpression") {
            return Ok(EffectKind::SetFromView);
        }
        if f.has("transform") {
            return Ok(EffectKind::Transform);
        }
    }
    Err(DecodeError::MissingType { node: "effect" })
}

/// `Set` accepts an explicit `null`, which clears the target.
fn set_value(f: &Fields<'_>) -> Result<Operand, DecodeError> {
    match f.map().get("value") {
        Some(Value::Null) => Ok(Operand::Literal(Value::Null)),
        _ => f.required_operand("value"),
    }
}

fn step(f: &Fields<'_>) -> Result<Operand, DecodeError> {
    Ok(f.operand("value")?.unwrap_or_else(|| Operand::literal(1)))
}

fn control(f: &Fields<'_>, op: ControlOp) -> Result<Effect, DecodeError> {
    Ok(Effect::Control {
        op,
        target: f.required_str(op.target_key())?.to_owned(),
    })
}

impl Decode for Effect {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("effect", doc)?;
        let (kind_str, kind) = match f.discriminator()? {
            Some(s) => (
                s,
                s.parse::<EffectKind>()
                    .map_err(|_| DecodeError::unknown("effect", s))?,
            ),
            None => {
                let kind = infer_kind(&f)?;
                (kind.as_str(), kind)
            }
        };
        let f = f.for_kind(kind_str);
        let targets = || f.node::<ViewRef>("targets");

        Ok(match kind {
            EffectKind::Set => Effect::Set {
                targets: targets()?,
                path: f.required_path("path")?,
                value: set_value(&f)?,
            },
            EffectKind::Increment => Effect::Increment {
                targets: targets()?,
                path: f.required_path("path")?,
                value: step(&f)?,
            },
            EffectKind::Decrement => Effect::Decrement {
                targets: targets()?,
                path: f.required_path("path")?,
                value: step(&f)?,
            },
            EffectKind::Transform => Effect::Transform {
                targets: targets()?,
                path: f.required_path("path")?,
                transform: f.required_node("transform")?,
            },
            EffectKind::SetFromView => Effect::SetFromView {
                targets: targets()?,
                path: f.required_path("path")?,
                value: f.required_node("valueExpression")?,
            },
            EffectKind::Spawn => Effect::Spawn {
                entity: f.required_str("entity")?.to_owned(),
                fields: f.operand_map("fields")?,
            },
            EffectKind::Destroy => Effect::Destroy {
                targets: targets()?,
            },
            EffectKind::Emit => Effect::Emit {
                event: f.required_str("event")?.to_owned(),
                payload: f.operand_map("payload")?,
            },
            EffectKind::If => {
                f.required("then")?;
                Effect::If {
                    condition: f.required_node("condition")?,
                    then: f.list("then", "then effect")?,
                    otherwise: f.list("else", "else effect")?,
                }
            }
            EffectKind::Sequence => {
                f.required("effects")?;
                Effect::Sequence {
                    effects: f.list("effects", "effect")?,
                }
            }
            EffectKind::EnableRule => control(&f, ControlOp::EnableRule)?,
            EffectKind::DisableRule => control(&f, ControlOp::DisableRule)?,
            EffectKind::ToggleRule => control(&f, ControlOp::ToggleRule)?,
            EffectKind::EnableTrigger => control(&f, ControlOp::EnableTrigger)?,
            EffectKind::DisableTrigger => control(&f, ControlOp::DisableTrigger)?,
            EffectKind::EnableFilter => control(&f, ControlOp::EnableFilter)?,
            EffectKind::DisableFilter => control(&f, ControlOp::DisableFilter)?,
            EffectKind::Log => Effect::Log {
                message: f.required_operand("message")?,
                level: f.keyword("level")?.unwrap_or(LogLevel::Info),
            },
        })
    }
}

impl Encode for Effect {
    fn encode(&self) -> Value {
        let out = ObjectBuilder::typed(self.kind().as_str()).opt_node("targets", self.targets());
        match self {
            Effect::Set { path, value, .. }
            | Effect::Increment { path, value, .. }
            | Effect::Decrement { path, value, .. } => {
                out.field("path", path.as_str()).node("value", value)
            }
            Effect::Transform {
                path, transform, ..
            } => out.field("path", path.as_str()).node("transform", transform),
            Effect::SetFromView { path, value, .. } => out
                .field("path", path.as_str())
                .node("valueExpression", value),
            Effect::Spawn { entity, fields } => out
                .field("entity", entity.as_str())
                .operand_map("fields", fields),
            Effect::Destroy { .. } => out,
            Effect::Emit { event, payload } => out
                .field("event", event.as_str())
                .operand_map("payload", payload),
            Effect::If {
                condition,
                then,
                otherwise,
            } => out
                .node("condition", condition)
                .field("then", encode_all(then))
                .list("else", otherwise),
            Effect::Sequence { effects } => out.field("effects", encode_all(effects)),
            Effect::Control { op, target } => out.field(op.target_key(), target.as_str()),
            Effect::Log { message, level } => {
                out.node("message", message).field("level", level.as_str())
            }
        }
        .build()
    }
}

/// What an effect reads: its values, conditions and inline target views.
impl Dependencies for Effect {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        if let Some(targets) = self.targets() {
            targets.collect_reads(deps);
        }
        match self {
            Effect::Set { value, .. }
            | Effect::Increment { value, .. }
            | Effect::Decrement { value, .. } => value.collect_reads(deps),
            Effect::Transform { transform, .. } => transform.collect_reads(deps),
            Effect::SetFromView { value, .. } => value.collect_reads(deps),
            Effect::Spawn { fields: values, .. } | Effect::Emit { payload: values, .. } => {
                for operand in values.values() {
                    operand.collect_reads(deps);
                }
            }
            Effect::If {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_reads(deps);
                then.collect_reads(deps);
                otherwise.collect_reads(deps);
            }
            Effect::Sequence { effects } => effects.collect_reads(deps),
            Effect::Log { message, .. } => message.collect_reads(deps),
            Effect::Destroy { .. } | Effect::Control { .. } => {}
        }
    }
}

impl Mutations for Effect {
    fn collect_writes(&self, writes: &mut PathSet) {
        match self {
            Effect::If {
                then, otherwise, ..
            } => {
                then.collect_writes(writes);
                otherwise.collect_writes(writes);
            }
            Effect::Sequence { effects } => effects.collect_writes(writes),
            other => {
                if let Some(path) = other.path() {
                    writes.insert(path.canonical_state().unwrap_or_else(|| path.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn infers_set() {
        let effect = Effect::decode(&json!({"path": "$.Players[0].Rank", "value": 1})).unwrap();
        assert_eq!(effect, Effect::set(Path::new("$.Players[0].Rank"), Operand::literal(1)));
    }

    #[test]
    fn infers_transform_and_set_from_view() {
        let effect = Effect::decode(&json!({
            "path": "self.hp",
            "transform": {"type": "Subtract", "left": "self.hp", "right": 5}
        }))
        .unwrap();
        assert_eq!(effect.kind(), EffectKind::Transform);

        let effect = Effect::decode(&json!({
            "path": "$.Stats.top",
            "valueExpression": {"type": "viewResult", "view": "leaders"}
        }))
        .unwrap();
        assert_eq!(effect.kind(), EffectKind::SetFromView);
    }

    #[test]
    fn missing_type_without_inference() {
        for doc in [json!({"value": 1}), json!({"path": "$.a"}), json!({"event": "x"})] {
            let err = Effect::decode(&doc).unwrap_err();
            assert_eq!(err, DecodeError::MissingType { node: "effect" });
        }
    }

    #[test]
    fn unknown_effect_kind() {
        let err =
            Effect::decode(&json!({"type": "Append", "path": "$.a", "value": 1})).unwrap_err();
        assert_eq!(err.to_string(), "unknown effect type 'Append'");
    }

    #[test]
    fn increment_defaults_to_one() {
        let effect = Effect::decode(&json!({"type": "Increment", "path": "self.kills"})).unwrap();
        assert!(matches!(
            &effect,
            Effect::Increment { value: Operand::Literal(v), .. } if v == &json!(1)
        ));
    }

    #[test]
    fn targets_by_name_or_inline() {
        let named = Effect::decode(&json!({
            "type": "Decrement", "targets": "view:nearby", "path": "hp", "value": 2
        }))
        .unwrap();
        assert_eq!(named.targets(), Some(&ViewRef::Named("nearby".into())));

        let inline = Effect::decode(&json!({
            "type": "Destroy",
            "targets": {"source": "Bullets",
                        "pipeline": [{"type": "Filter", "where": {"ttl": {"<=": 0}}}]}
        }))
        .unwrap();
        assert!(inline.depends_on().contains(&Path::new("$.Bullets")));
        assert!(inline.modifies().is_empty());
    }

    #[test]
    fn modifies_recurses_through_control_flow() {
        let effect = Effect::decode(&json!({
            "type": "If",
            "condition": {"left": "$.World.night", "op": "==", "right": true},
            "then": [
                {"path": "$.Lights.on", "value": true},
                {"type": "Sequence", "effects": [
                    {"type": "Increment", "path": "state:$.Stats.nights"},
                    {"type": "Emit", "event": "nightfall"}
                ]}
            ],
            "else": [{"type": "Set", "path": "$.Lights.on", "value": false}]
        }))
        .unwrap();
        let writes: Vec<Path> = effect.modifies().into_iter().collect();
        assert_eq!(writes, vec![Path::new("$.Lights.on"), Path::new("$.Stats.nights")]);
        assert_eq!(
            effect.depends_on().into_iter().collect::<Vec<_>>(),
            vec![Path::new("$.World.night")]
        );
    }

    #[test]
    fn only_mutations_write() {
        let docs = [
            json!({"type": "Spawn", "entity": "Enemies", "fields": {"hp": "$.Config.enemyHp"}}),
            json!({"type": "Emit", "event": "scored", "payload": {"by": "self.id"}}),
            json!({"type": "DisableRule", "rule": "spawnWave"}),
            json!({"type": "EnableFilter", "filter": "fogOfWar"}),
            json!({"type": "Log", "message": "tick", "level": "debug"}),
        ];
        for doc in docs {
            let effect = Effect::decode(&doc).unwrap();
            assert!(effect.modifies().is_empty(), "{doc} should not write");
            assert_eq!(Effect::decode(&effect.encode()).unwrap(), effect);
        }
    }

    #[test]
    fn control_requires_target_name() {
        let err = Effect::decode(&json!({"type": "ToggleRule"})).unwrap_err();
        assert_eq!(err.to_string(), "ToggleRule effect requires field 'rule'");
        let err = Effect::decode(&json!({"type": "DisableFilter", "rule": "x"})).unwrap_err();
        assert_eq!(err.to_string(), "DisableFilter effect requires field 'filter'");
    }

    #[test]
    fn nested_errors_carry_position() {
        let err = Effect::decode(&json!({
            "type": "Sequence", "effects": [{"type": "Log", "message": "ok"}, {"type": "Explode"}]
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "effect 1: unknown effect type 'Explode'");
    }
}
