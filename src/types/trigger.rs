use std::fmt;
use std::time::Duration;

use serde_json::Value;

use super::{CompareOp, DistanceUnit, Expression, Operand, Path, PathKind, WhereClause};
use crate::analysis::{Dependencies, DependencyCollector};
use crate::document::{json_kind, Decode, DecodeError, Encode, Fields, ObjectBuilder};
use crate::parse::{parse_duration, parse_time_of_day};

keyword_enum! {
    pub enum TriggerKind {
        OnTick => "OnTick",
        OnEvent => "OnEvent",
        OnChange => "OnChange",
        OnDistance => "OnDistance",
        OnTimer => "OnTimer",
        OnCron => "OnCron",
        OnSchedule => "OnSchedule",
        OnCondition => "OnCondition",
        OnStart => "OnStart",
    }
}

keyword_enum! {
    pub enum Weekday {
        Monday => "Monday",
        Tuesday => "Tuesday",
        Wednesday => "Wednesday",
        Thursday => "Thursday",
        Friday => "Friday",
        Saturday => "Saturday",
        Sunday => "Sunday",
    }
}

/// A wall-clock time of day, second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
    second: u8,
}

impl TimeOfDay {
    /// Returns `None` unless `hour < 24`, `minute < 60` and `second < 60`.
    #[must_use]
    pub fn new(hour: u8, minute: u8, second: u8) -> Option<Self> {
        (hour < 24 && minute < 60 && second < 60).then_some(TimeOfDay {
            hour,
            minute,
            second,
        })
    }

    #[must_use]
    pub fn hour(&self) -> u8 {
        self.hour
    }

    #[must_use]
    pub fn minute(&self) -> u8 {
        self.minute
    }

    #[must_use]
    pub fn second(&self) -> u8 {
        self.second
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)?;
        if self.second != 0 {
            write!(f, ":{:02}", self.second)?;
        }
        Ok(())
    }
}

/// What makes a rule fire, with the fields of each trigger type.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// Every `interval` ticks.
    OnTick { interval: u32 },
    /// A named event, with the payload parameters it declares.
    OnEvent {
        event: String,
        params: Vec<String>,
        filter: Option<WhereClause>,
    },
    /// Any write at or below one of the watched state paths.
    OnChange { watch: Vec<Path> },
    OnDistance {
        from: Operand,
        to: Operand,
        op: CompareOp,
        value: Operand,
        unit: Option<DistanceUnit>,
    },
    OnTimer {
        duration: Duration,
        repeat: bool,
        start_delay: Option<Duration>,
    },
    OnCron { expression: String },
    OnSchedule {
        time: Option<TimeOfDay>,
        interval: Option<Duration>,
        weekdays: Vec<Weekday>,
    },
    OnCondition { condition: Expression },
    OnStart,
}

/// Activation condition of a rule.
///
/// `enabled` is tri-state: absent means enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub enabled: Option<bool>,
    pub activation: Activation,
}

impl Trigger {
    #[must_use]
    pub fn new(activation: Activation) -> Self {
        Trigger {
            enabled: None,
            activation,
        }
    }

    #[must_use]
    pub fn on_change<P: Into<Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        Trigger::new(Activation::OnChange {
            watch: paths.into_iter().map(Into::into).collect(),
        })
    }

    #[must_use]
    pub fn kind(&self) -> TriggerKind {
        match &self.activation {
            Activation::OnTick { .. } => TriggerKind::OnTick,
            Activation::OnEvent { .. } => TriggerKind::OnEvent,
            Activation::OnChange { .. } => TriggerKind::OnChange,
            Activation::OnDistance { .. } => TriggerKind::OnDistance,
            Activation::OnTimer { .. } => TriggerKind::OnTimer,
            Activation::OnCron { .. } => TriggerKind::OnCron,
            Activation::OnSchedule { .. } => TriggerKind::OnSchedule,
            Activation::OnCondition { .. } => TriggerKind::OnCondition,
            Activation::OnStart => TriggerKind::OnStart,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = Some(enabled);
    }

    /// Key under which the engine books timer, cron and schedule state for
    /// the trigger of `rule_name`. `None` for triggers without clock state.
    #[must_use]
    pub fn schedule_key(&self, rule_name: &str) -> Option<String> {
        match self.activation {
            Activation::OnTimer { .. }
            | Activation::OnCron { .. }
            | Activation::OnSchedule { .. } => {
                Some(format!("{rule_name}:{}", self.kind()))
            }
            _ => None,
        }
    }
}

impl From<Activation> for Trigger {
    fn from(activation: Activation) -> Self {
        Trigger::new(activation)
    }
}

// -- Durations ---------------------------------------------------------------

/// A duration given as seconds or as a `250ms` / `1h30m` literal.
pub(crate) fn decode_duration(
    f: &Fields<'_>,
    key: &'static str,
) -> Result<Option<Duration>, DecodeError> {
    match f.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => parse_duration(s)
            .map(Some)
            .map_err(|e| DecodeError::invalid(key, e.to_string())),
        Some(Value::Number(n)) => {
            let secs = n.as_f64().unwrap_or(-1.0);
            Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|e| DecodeError::invalid(key, format!("{n} seconds: {e}")))
        }
        Some(other) => Err(DecodeError::invalid(
            key,
            format!("expected seconds or a duration literal, found {}", json_kind(other)),
        )),
    }
}

pub(crate) fn encode_duration(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else if d.subsec_nanos() % 1_000_000 == 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{}ms", d.as_secs_f64() * 1000.0)
    }
}

// -- Decoding ----------------------------------------------------------------

fn normalize_watch(raw: String) -> Result<Path, DecodeError> {
    let path = Path::new(raw);
    match path.kind() {
        PathKind::State => Ok(path.canonical_state().unwrap_or(path)),
        PathKind::Field => Ok(Path::new(format!("$.{path}"))),
        other => Err(DecodeError::invalid(
            "watch",
            format!("'{path}' is a {other:?} reference, not a state path"),
        )),
    }
}

fn validate_cron(expression: &str) -> Result<(), DecodeError> {
    let fields = expression.split_whitespace().count();
    if (5..=6).contains(&fields) {
        Ok(())
    } else {
        Err(DecodeError::invalid(
            "expression",
            format!("cron expression needs 5 or 6 fields, found {fields}"),
        ))
    }
}

impl Decode for Trigger {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("trigger", doc)?;
        let kind_str = f
            .discriminator()?
            .ok_or(DecodeError::MissingType { node: "trigger" })?;
        let kind = kind_str
            .parse::<TriggerKind>()
            .map_err(|_| DecodeError::unknown("trigger", kind_str))?;
        let f = f.for_kind(kind_str);

        let activation = match kind {
            TriggerKind::OnTick => {
                let interval = f.u32("interval")?.unwrap_or(1);
                if interval == 0 {
                    return Err(DecodeError::invalid("interval", "must be at least 1 tick"));
                }
                Activation::OnTick { interval }
            }
            TriggerKind::OnEvent => Activation::OnEvent {
                event: f.required_str("event")?.to_owned(),
                params: f.strings("params")?,
                filter: f.node("where")?,
            },
            TriggerKind::OnChange => {
                let watch = f
                    .strings("watch")?
                    .into_iter()
                    .map(normalize_watch)
                    .collect::<Result<Vec<_>, _>>()?;
                if watch.is_empty() {
                    f.required("watch")?;
                    return Err(DecodeError::invalid("watch", "at least one path is required"));
                }
                Activation::OnChange { watch }
            }
            TriggerKind::OnDistance => Activation::OnDistance {
                from: f.required_operand("from")?,
                to: f.required_operand("to")?,
                op: f.keyword("op")?.unwrap_or(CompareOp::Lt),
                value: f.required_operand("value")?,
                unit: f.keyword("unit")?,
            },
            TriggerKind::OnTimer => {
                f.required("duration")?;
                Activation::OnTimer {
                    duration: decode_duration(&f, "duration")?.unwrap_or_default(),
                    repeat: f.bool("repeat")?.unwrap_or(false),
                    start_delay: decode_duration(&f, "startDelay")?,
                }
            }
            TriggerKind::OnCron => {
                let expression = f.required_str("expression")?;
                validate_cron(expression)?;
                Activation::OnCron {
                    expression: expression.to_owned(),
                }
            }
            TriggerKind::OnSchedule => {
                let time = f
                    .str("time")?
                    .map(|s| {
                        parse_time_of_day(s)
                            .map_err(|e| DecodeError::invalid("time", e.to_string()))
                    })
                    .transpose()?;
                let interval = decode_duration(&f, "interval")?;
                if time.is_none() && interval.is_none() {
                    f.required("time")?;
                }
                let weekdays = f
                    .strings("weekdays")?
                    .iter()
                    .map(|d| {
                        d.parse::<Weekday>()
                            .map_err(|e| DecodeError::invalid("weekdays", e.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Activation::OnSchedule {
                    time,
                    interval,
                    weekdays,
                }
            }
            TriggerKind::OnCondition => Activation::OnCondition {
                condition: f.required_node("condition")?,
            },
            TriggerKind::OnStart => Activation::OnStart,
        };

        Ok(Trigger {
            enabled: f.bool("enabled")?,
            activation,
        })
    }
}

impl Encode for Trigger {
    fn encode(&self) -> Value {
        let out = ObjectBuilder::typed(self.kind().as_str()).opt("enabled", self.enabled);
        match &self.activation {
            Activation::OnTick { interval } => out.field("interval", *interval),
            Activation::OnEvent {
                event,
                params,
                filter,
            } => out
                .field("event", event.as_str())
                .strings("params", params)
                .opt_node("where", filter.as_ref()),
            Activation::OnChange { watch } => out.field(
                "watch",
                watch.iter().map(|p| p.as_str().to_owned()).collect::<Vec<_>>(),
            ),
            Activation::OnDistance {
                from,
                to,
                op,
                value,
                unit,
            } => out
                .node("from", from)
                .node("to", to)
                .field("op", op.as_str())
                .node("value", value)
                .opt("unit", unit.map(DistanceUnit::as_str)),
            Activation::OnTimer {
                duration,
                repeat,
                start_delay,
            } => out
                .field("duration", encode_duration(*duration))
                .field("repeat", *repeat)
                .opt("startDelay", start_delay.map(encode_duration)),
            Activation::OnCron { expression } => out.field("expression", expression.as_str()),
            Activation::OnSchedule {
                time,
                interval,
                weekdays,
            } => out
                .opt("time", time.map(|t| t.to_string()))
                .opt("interval", interval.map(encode_duration))
                .strings(
                    "weekdays",
                    &weekdays.iter().map(|d| d.as_str().to_owned()).collect::<Vec<_>>(),
                ),
            Activation::OnCondition { condition } => out.node("condition", condition),
            Activation::OnStart => out,
        }
        .build()
    }
}

impl Dependencies for Trigger {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        match &self.activation {
            Activation::OnChange { watch } => {
                for path in watch {
                    deps.read(path);
                }
            }
            Activation::OnEvent { filter, .. } => filter.collect_reads(deps),
            Activation::OnDistance {
                from, to, value, ..
            } => {
                from.collect_reads(deps);
                to.collect_reads(deps);
                value.collect_reads(deps);
            }
            Activation::OnCondition { condition } => condition.collect_reads(deps),
            Activation::OnTick { .. }
            | Activation::OnTimer { .. }
            | Activation::OnCron { .. }
            | Activation::OnSchedule { .. }
            | Activation::OnStart => {}
        }
    }
}
