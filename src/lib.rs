//! Syntax tree, document decoding and static dependency analysis for a
//! declarative, reactive game-rule language.
//!
//! A rule document (JSON) is decoded into a typed [`RuleSet`]. Decoding
//! validates every node, fills defaults, and accepts the shorthand forms
//! authors write by hand; [`Encode`] produces the canonical long form back.
//! Each node can then report which state paths it reads
//! ([`Dependencies`]) and which it writes ([`Mutations`]), which is what an
//! engine needs to decide which rules to re-check after a state change.
//!
//! ```
//! use tickrules::{Mutations, Path, RuleSet};
//!
//! let ruleset = RuleSet::from_json_str(r#"{
//!     "rules": [{
//!         "name": "drones-seek-base",
//!         "trigger": {"type": "OnTick"},
//!         "selector": {"type": "Nearest", "entity": "Drones",
//!                      "position": "position", "origin": "$.Base.position", "limit": 3},
//!         "effects": [{"path": "self.target", "value": "$.Base.position"}]
//!     }]
//! }"#)?;
//!
//! let analysis = ruleset.rules[0].analyze();
//! assert!(analysis.depends_on.contains(&Path::new("$.Drones")));
//! assert!(analysis.depends_on.contains(&Path::new("$.Base.position")));
//! assert!(ruleset.rules[0].modifies().contains(&Path::new("self.target")));
//! # Ok::<(), tickrules::RulesError>(())
//! ```
//!
//! Nothing here evaluates rules; execution belongs to the engine that
//! consumes these trees.

#[macro_use]
mod macros;

pub mod analysis;
pub mod document;
mod error;
pub mod parse;
mod types;

#[cfg(feature = "binary-cache")]
pub mod serial;

pub use analysis::{
    Analysis, CascadeGraph, Dependencies, DependencyCollector, DependencyIndex, Diagnostic,
    Mutations, PathSet,
};
pub use document::{Decode, DecodeError, Encode, UnknownKeyword};
pub use error::RulesError;
pub use parse::ParseError;
pub use types::{
    Activation, Aggregation, BinaryOp, CompareOp, ControlOp, DistanceUnit, Effect, EffectKind,
    Expression, Filter, FilterOperation, FilterOperationKind, LogLevel, Masking, Operand,
    ParamType, Path, PathKind, ProximityOperation, ProximitySelector, Rule, RuleSet, Segment,
    Selector, SelectorKind, SortOrder, TimeOfDay, Transform, TransformKind, Trigger, TriggerKind,
    UnaryOp, ValueExpression, ValueExpressionKind, VariadicOp, View, ViewOperation,
    ViewOperationKind, ViewParam, ViewRef, Weekday, WhereClause,
};
