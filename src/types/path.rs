use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parse::{parse_state_path, ParseError};

const STATE_PREFIX: &str = "$.";
const QUALIFIED_STATE_PREFIX: &str = "state:$.";

/// What a [`Path`] refers to, inferred from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// `$.a.b` or `state:$.a.b`.
    State,
    /// `param:name`, bound when a view is invoked.
    Param,
    /// `view:name`, a reference to a named view.
    View,
    /// `const:value`, a literal.
    Const,
    /// `self.field`, resolved against the current target entity at execution time.
    SelfRelative,
    /// Bare `$`. Deprecated in favour of `self.`.
    Current,
    /// Anything else: an entity-relative field name such as `health`.
    Field,
}

/// A string reference into state, parameters, views, constants or the
/// current entity. A path has no meaning without a resolution context; this
/// type only classifies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(String);

/// One step of a state path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl Path {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Path(raw.into())
    }

    /// The root path of an entity collection: `Players` becomes `$.Players`.
    /// Names that are already state paths are kept (in canonical form).
    #[must_use]
    pub fn collection(entity: &str) -> Self {
        let path = Path::new(entity);
        match path.canonical_state() {
            Some(state) => state,
            None => Path(format!("{STATE_PREFIX}{entity}")),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn kind(&self) -> PathKind {
        classify(&self.0)
    }

    #[must_use]
    pub fn is_state(&self) -> bool {
        self.kind() == PathKind::State
    }

    /// The `$.`-prefixed form of a state path, or `None` for any other kind.
    #[must_use]
    pub fn canonical_state(&self) -> Option<Path> {
        if let Some(rest) = self.0.strip_prefix("state:") {
            return rest.starts_with(STATE_PREFIX).then(|| Path(rest.to_owned()));
        }
        self.0.starts_with(STATE_PREFIX).then(|| self.clone())
    }

    /// The name after the prefix of a `param:`, `view:` or `const:` reference.
    #[must_use]
    pub fn reference_name(&self) -> Option<&str> {
        ["param:", "view:", "const:"]
            .into_iter()
            .find_map(|prefix| self.0.strip_prefix(prefix))
    }

    /// Parse the segments of a state path.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if this is not a well-formed state path.
    pub fn segments(&self) -> Result<Vec<Segment>, ParseError> {
        parse_state_path(&self.0)
    }

    /// True when one path is a segment-wise prefix of the other, i.e. a
    /// mutation of either may change the value observed at the other.
    #[must_use]
    pub fn overlaps(&self, other: &Path) -> bool {
        match (self.segments(), other.segments()) {
            (Ok(a), Ok(b)) => {
                let n = a.len().min(b.len());
                a[..n] == b[..n]
            }
            _ => {
                let (a, b) = (self.unqualified(), other.unqualified());
                a == b || is_textual_prefix(a, b) || is_textual_prefix(b, a)
            }
        }
    }

    fn unqualified(&self) -> &str {
        self.0.strip_prefix("state:").unwrap_or(&self.0)
    }
}

fn is_textual_prefix(prefix: &str, path: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
}

pub(crate) fn classify(raw: &str) -> PathKind {
    if raw.starts_with(STATE_PREFIX) || raw.starts_with(QUALIFIED_STATE_PREFIX) {
        PathKind::State
    } else if raw == "$" {
        PathKind::Current
    } else if raw.starts_with("param:") {
        PathKind::Param
    } else if raw.starts_with("view:") {
        PathKind::View
    } else if raw.starts_with("const:") {
        PathKind::Const
    } else if raw == "self" || raw.starts_with("self.") {
        PathKind::SelfRelative
    } else {
        PathKind::Field
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, ".{name}"),
            Segment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Path::new(raw)
    }
}

impl From<String> for Path {
    fn from(raw: String) -> Self {
        Path(raw)
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_prefixes() {
        let cases = [
            ("$.Players", PathKind::State),
            ("state:$.Players[0].Score", PathKind::State),
            ("param:radius", PathKind::Param),
            ("view:nearbyEnemies", PathKind::View),
            ("const:42", PathKind::Const),
            ("self.position", PathKind::SelfRelative),
            ("$", PathKind::Current),
            ("health", PathKind::Field),
            ("$health", PathKind::Field),
        ];
        for (raw, expected) in cases {
            assert_eq!(Path::new(raw).kind(), expected, "failed for {raw}");
        }
    }

    #[test]
    fn canonical_state_strips_qualifier() {
        assert_eq!(
            Path::new("state:$.World.tick").canonical_state(),
            Some(Path::new("$.World.tick"))
        );
        assert_eq!(
            Path::new("$.World.tick").canonical_state(),
            Some(Path::new("$.World.tick"))
        );
        assert_eq!(Path::new("param:x").canonical_state(), None);
        assert_eq!(Path::new("state:oops").canonical_state(), None);
    }

    #[test]
    fn collection_root() {
        assert_eq!(Path::collection("Players"), Path::new("$.Players"));
        assert_eq!(Path::collection("$.Drones"), Path::new("$.Drones"));
        assert_eq!(Path::collection("state:$.Drones"), Path::new("$.Drones"));
    }

    #[test]
    fn reference_names() {
        assert_eq!(Path::new("param:radius").reference_name(), Some("radius"));
        assert_eq!(Path::new("view:top").reference_name(), Some("top"));
        assert_eq!(Path::new("$.a").reference_name(), None);
    }

    #[test]
    fn overlap_is_prefix_wise() {
        let players = Path::new("$.Players");
        let score = Path::new("$.Players[0].Score");
        let rank = Path::new("$.Players[0].Rank");
        let prefix_lookalike = Path::new("$.PlayersArchive");

        assert!(players.overlaps(&score));
        assert!(score.overlaps(&players));
        assert!(!score.overlaps(&rank));
        assert!(!players.overlaps(&prefix_lookalike));
        assert!(score.overlaps(&score));
    }

    #[test]
    fn overlap_falls_back_to_text_for_unparseable_paths() {
        let a = Path::new("$.Grid[x].cell");
        let b = Path::new("$.Grid");
        assert!(a.overlaps(&b));
    }

    #[test]
    fn segment_display() {
        let segments = Path::new("$.Players[3].Score").segments().unwrap();
        let rendered: String = segments.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ".Players[3].Score");
    }
}
