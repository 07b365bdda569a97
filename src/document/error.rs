use thiserror::Error;

/// Errors raised while decoding a rule document into validated nodes.
///
/// Decoding is all-or-nothing: the first error aborts the enclosing document.
/// Errors found inside lists are wrapped in [`DecodeError::At`] so the message
/// names the offending position, e.g. `rule 'patrol': pipeline operation 2: ...`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed {node}: {message}")]
    Malformed { node: &'static str, message: String },

    #[error("unknown {node} type '{kind}'")]
    UnknownKind { node: &'static str, kind: String },

    #[error("{node} is missing its 'type' discriminator")]
    MissingType { node: &'static str },

    #[error("{node} requires field '{field}'")]
    MissingField { node: String, field: &'static str },

    #[error("ambiguous {node} shorthand: {reason}")]
    AmbiguousShorthand { node: &'static str, reason: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("{context}: {source}")]
    At {
        context: String,
        #[source]
        source: Box<DecodeError>,
    },
}

/// A keyword (kind name, operator, unit) that is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized keyword '{0}'")]
pub struct UnknownKeyword(pub String);

impl DecodeError {
    /// Wrap this error with the position it was found at.
    #[must_use]
    pub fn at(self, context: impl Into<String>) -> Self {
        DecodeError::At {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all positional context stripped.
    #[must_use]
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::At { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn unknown(node: &'static str, kind: impl Into<String>) -> Self {
        DecodeError::UnknownKind {
            node,
            kind: kind.into(),
        }
    }

    pub(crate) fn malformed(node: &'static str, message: impl Into<String>) -> Self {
        DecodeError::Malformed {
            node,
            message: message.into(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_message() {
        let err = DecodeError::unknown("trigger", "OnBlink");
        assert_eq!(err.to_string(), "unknown trigger type 'OnBlink'");
    }

    #[test]
    fn missing_field_message() {
        let err = DecodeError::MissingField {
            node: "view".into(),
            field: "source",
        };
        assert_eq!(err.to_string(), "view requires field 'source'");
    }

    #[test]
    fn positional_context_chains() {
        let err = DecodeError::unknown("view operation", "Explode")
            .at("pipeline operation 2")
            .at("view 'targets'");
        assert_eq!(
            err.to_string(),
            "view 'targets': pipeline operation 2: unknown view operation type 'Explode'"
        );
        assert!(matches!(
            err.root_cause(),
            DecodeError::UnknownKind { node: "view operation", .. }
        ));
    }

    #[test]
    fn ambiguous_shorthand_message() {
        let err = DecodeError::AmbiguousShorthand {
            node: "where clause",
            reason: "empty mapping".into(),
        };
        assert_eq!(
            err.to_string(),
            "ambiguous where clause shorthand: empty mapping"
        );
    }
}
