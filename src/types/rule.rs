use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{Effect, Selector, Trigger, View};
use crate::analysis::{Analysis, Dependencies, DependencyCollector, Mutations, PathSet};
use crate::document::{json_kind, Decode, DecodeError, Encode, Fields, ObjectBuilder};

/// A reactive rule: when the trigger fires, apply the effects to the
/// selected entities.
///
/// Rules are usually decoded from a document (see [`RuleSet`](super::RuleSet)),
/// but can also be assembled directly:
///
/// ```
/// use tickrules::{Dependencies, Effect, Mutations, Operand, Path, Rule, Selector, Trigger};
///
/// let rule = Rule::new("rank", Trigger::on_change(["$.Players[0].Score"]))
///     .with_selector(Selector::all("Players"))
///     .with_effect(Effect::set("$.Players[0].Rank", Operand::literal(1)));
///
/// assert!(rule.depends_on().contains(&Path::new("$.Players")));
/// assert_eq!(rule.modifies().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub description: Option<String>,
    /// Higher runs first when several rules fire together.
    pub priority: i32,
    pub enabled: Option<bool>,
    pub trigger: Trigger,
    pub selector: Option<Selector>,
    pub views: BTreeMap<String, View>,
    pub effects: Vec<Effect>,
}

impl Rule {
    #[must_use]
    pub fn new(name: impl Into<String>, trigger: Trigger) -> Self {
        Rule {
            name: name.into(),
            description: None,
            priority: 0,
            enabled: None,
            trigger,
            selector: None,
            views: BTreeMap::new(),
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    #[must_use]
    pub fn with_view(mut self, name: impl Into<String>, mut view: View) -> Self {
        let name = name.into();
        view.name = Some(name.clone());
        self.views.insert(name, view);
        self
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = Some(enabled);
    }

    #[must_use]
    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.get(name)
    }

    /// State read by the effects themselves (values, conditions, inline
    /// targets). Kept apart from [`depends_on`](Dependencies::depends_on),
    /// which only covers what decides whether and where the rule fires.
    #[must_use]
    pub fn effect_reads(&self) -> PathSet {
        self.effects.depends_on()
    }

    /// Reads, writes and any analysis gaps in one pass.
    #[must_use]
    pub fn analyze(&self) -> Analysis {
        let mut deps = DependencyCollector::new();
        deps.scoped(format!("rule '{}'", self.name), |deps| self.collect_reads(deps));
        let (depends_on, diagnostics) = deps.into_parts();
        let modifies = self.modifies();
        tracing::debug!(
            rule = %self.name,
            reads = depends_on.len(),
            writes = modifies.len(),
            "analyzed rule"
        );
        Analysis {
            depends_on,
            modifies,
            diagnostics,
        }
    }
}

impl Decode for Rule {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("rule", doc)?;
        let name = f.required_str("name")?;
        decode_body(&f, name).map_err(|e| e.at(format!("rule '{name}'")))
    }
}

fn decode_body(f: &Fields<'_>, name: &str) -> Result<Rule, DecodeError> {
    let priority = match f.i64("priority")? {
        None => 0,
        Some(p) => i32::try_from(p)
            .map_err(|_| DecodeError::invalid("priority", format!("{p} is out of range")))?,
    };
    let views = match f.get("views") {
        None => BTreeMap::new(),
        Some(Value::Object(map)) => decode_views(map)?,
        Some(other) => {
            return Err(DecodeError::malformed(
                "rule",
                format!("'views' must be a mapping, found {}", json_kind(other)),
            ))
        }
    };
    f.required("effects")?;
    let effects: Vec<Effect> = f.list("effects", "effect")?;
    if effects.is_empty() {
        return Err(DecodeError::MissingField {
            node: "rule".into(),
            field: "effects",
        });
    }
    Ok(Rule {
        name: name.to_owned(),
        description: f.string("description")?,
        priority,
        enabled: f.bool("enabled")?,
        trigger: f.required_node("trigger")?,
        selector: f.node("selector")?,
        views,
        effects,
    })
}

fn decode_views(map: &Map<String, Value>) -> Result<BTreeMap<String, View>, DecodeError> {
    map.iter()
        .map(|(name, doc)| {
            let mut view = View::decode(doc).map_err(|e| e.at(format!("view '{name}'")))?;
            view.name = Some(name.clone());
            Ok((name.clone(), view))
        })
        .collect()
}

impl Encode for Rule {
    fn encode(&self) -> Value {
        let mut out = ObjectBuilder::new()
            .field("name", self.name.as_str())
            .opt("description", self.description.as_deref())
            .opt("enabled", self.enabled)
            .node("trigger", &self.trigger)
            .opt_node("selector", self.selector.as_ref())
            .list("effects", &self.effects);
        if self.priority != 0 {
            out = out.field("priority", self.priority);
        }
        if !self.views.is_empty() {
            let views: Map<String, Value> = self
                .views
                .iter()
                .map(|(name, view)| (name.clone(), view.encode()))
                .collect();
            out = out.field("views", Value::Object(views));
        }
        out.build()
    }
}

/// Trigger, selector and every named view.
impl Dependencies for Rule {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        self.trigger.collect_reads(deps);
        self.selector.collect_reads(deps);
        for view in self.views.values() {
            view.collect_reads(deps);
        }
    }
}

impl Mutations for Rule {
    fn collect_writes(&self, writes: &mut PathSet) {
        self.effects.collect_writes(writes);
    }
}
