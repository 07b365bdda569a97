use serde_json::Value;

use super::path::{classify, Path, PathKind};
use super::transform::{Transform, TransformKind};
use crate::analysis::{Dependencies, DependencyCollector};
use crate::document::{Decode, DecodeError, Encode};

/// A value slot: a literal, a path reference, or a nested transform.
///
/// Strings are sniffed for a path prefix first and fall back to literals.
/// Objects whose `type` names a known transform decode as [`Transform`];
/// every other document is kept as a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    Path(Path),
    Transform(Box<Transform>),
}

impl Operand {
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Operand::Literal(value.into())
    }

    #[must_use]
    pub fn path(path: impl Into<Path>) -> Self {
        Operand::Path(path.into())
    }

    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Operand::Path(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Operand::Literal(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Path> for Operand {
    fn from(path: Path) -> Self {
        Operand::Path(path)
    }
}

impl From<Transform> for Operand {
    fn from(transform: Transform) -> Self {
        Operand::Transform(Box::new(transform))
    }
}

impl Decode for Operand {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        match doc {
            Value::String(s) => match classify(s) {
                PathKind::Field => Ok(Operand::Literal(doc.clone())),
                PathKind::Current => {
                    tracing::warn!(
                        path = %s,
                        "deprecated current-entity marker '$'; use 'self.<field>'"
                    );
                    Ok(Operand::Path(Path::new(s.as_str())))
                }
                _ => Ok(Operand::Path(Path::new(s.as_str()))),
            },
            Value::Object(map)
                if map
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|kind| kind.parse::<TransformKind>().is_ok()) =>
            {
                Transform::decode(doc).map(|t| Operand::Transform(Box::new(t)))
            }
            other => Ok(Operand::Literal(other.clone())),
        }
    }
}

impl Encode for Operand {
    fn encode(&self) -> Value {
        match self {
            Operand::Literal(v) => v.clone(),
            Operand::Path(p) => Value::String(p.as_str().to_owned()),
            Operand::Transform(t) => t.encode(),
        }
    }
}

impl Dependencies for Operand {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        match self {
            Operand::Literal(_) => {}
            Operand::Path(p) => deps.read(p),
            Operand::Transform(t) => t.collect_reads(deps),
        }
    }
}
