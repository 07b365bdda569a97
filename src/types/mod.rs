mod effect;
mod expr;
mod filter;
mod operand;
mod path;
mod rule;
mod ruleset;
mod selector;
mod transform;
mod trigger;
mod units;
mod value_expr;
mod view;
mod where_clause;

pub use effect::{ControlOp, Effect, EffectKind, LogLevel};
pub use expr::{CompareOp, Expression};
pub use filter::{Filter, FilterOperation, FilterOperationKind, Masking};
pub use operand::Operand;
pub use path::{Path, PathKind, Segment};
pub use rule::Rule;
pub use ruleset::RuleSet;
pub use selector::{ProximitySelector, Selector, SelectorKind};
pub use transform::{BinaryOp, Transform, TransformKind, UnaryOp, VariadicOp};
pub use trigger::{Activation, TimeOfDay, Trigger, TriggerKind, Weekday};
pub use units::DistanceUnit;
pub use value_expr::{ValueExpression, ValueExpressionKind};
pub use view::{
    Aggregation, ParamType, ProximityOperation, SortOrder, View, ViewOperation, ViewOperationKind,
    ViewParam, ViewRef,
};
pub use where_clause::WhereClause;
