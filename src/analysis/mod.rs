//! Static read/write analysis of rule trees.
//!
//! Every node implements [`Dependencies`]: the set of state paths it reads.
//! Effects (and rules, through their effects) implement [`Mutations`]: the
//! set of state paths they write. The engine uses both to decide which rules
//! must be re-checked when a path changes, see [`DependencyIndex`].
//!
//! Analysis never fails. Values that arrive as untyped sub-documents are
//! re-decoded before recursing; when that fails the dependency is dropped
//! and a [`Diagnostic`] is recorded so the gap is observable.

mod graph;
mod index;

use std::collections::BTreeSet;
use std::fmt;

pub use graph::CascadeGraph;
pub use index::DependencyIndex;

use crate::types::Path;

/// An ordered, deduplicated set of canonical state paths.
pub type PathSet = BTreeSet<Path>;

/// A best-effort step that could not be completed during analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Where the problem was found, e.g. `view 'ranked': pipeline operation 1: fields.score`.
    pub context: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.message)
    }
}

/// Accumulates the state paths read by a tree walk.
#[derive(Debug, Default)]
pub struct DependencyCollector {
    reads: PathSet,
    diagnostics: Vec<Diagnostic>,
    scope: Vec<String>,
}

impl DependencyCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` if it is syntactically a state path.
    pub fn read(&mut self, path: &Path) {
        if let Some(state) = path.canonical_state() {
            self.reads.insert(state);
        }
    }

    /// Record a raw string that may or may not be a state path.
    pub fn read_str(&mut self, raw: &str) {
        if raw.starts_with("$.") || raw.starts_with("state:$.") {
            self.read(&Path::new(raw));
        }
    }

    /// Record an entity collection's root path.
    pub fn read_collection(&mut self, entity: &str) {
        if !entity.is_empty() {
            self.reads.insert(Path::collection(entity));
        }
    }

    /// Run `f` with `label` pushed onto the diagnostic context.
    pub fn scoped(&mut self, label: impl Into<String>, f: impl FnOnce(&mut Self)) {
        self.scope.push(label.into());
        f(self);
        self.scope.pop();
    }

    /// Report a dependency that could not be recovered.
    pub fn diagnose(&mut self, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            context: self.scope.join(": "),
            message: message.into(),
        };
        tracing::warn!(
            context = %diagnostic.context,
            "dependency analysis incomplete: {}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }

    #[must_use]
    pub fn reads(&self) -> &PathSet {
        &self.reads
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn into_reads(self) -> PathSet {
        self.reads
    }

    #[must_use]
    pub fn into_parts(self) -> (PathSet, Vec<Diagnostic>) {
        (self.reads, self.diagnostics)
    }
}

/// Nodes that read state.
pub trait Dependencies {
    fn collect_reads(&self, deps: &mut DependencyCollector);

    /// The canonical state paths this node reads.
    #[must_use]
    fn depends_on(&self) -> PathSet {
        let mut deps = DependencyCollector::new();
        self.collect_reads(&mut deps);
        deps.into_reads()
    }
}

/// Nodes that write state.
pub trait Mutations {
    fn collect_writes(&self, writes: &mut PathSet);

    /// The paths this node writes.
    #[must_use]
    fn modifies(&self) -> PathSet {
        let mut writes = PathSet::new();
        self.collect_writes(&mut writes);
        writes
    }
}

impl<T: Dependencies> Dependencies for Option<T> {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        if let Some(inner) = self {
            inner.collect_reads(deps);
        }
    }
}

impl<T: Dependencies> Dependencies for [T] {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        for item in self {
            item.collect_reads(deps);
        }
    }
}

impl<T: Dependencies> Dependencies for Vec<T> {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        self.as_slice().collect_reads(deps);
    }
}

impl<T: Dependencies + ?Sized> Dependencies for Box<T> {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        (**self).collect_reads(deps);
    }
}

impl<T: Mutations> Mutations for [T] {
    fn collect_writes(&self, writes: &mut PathSet) {
        for item in self {
            item.collect_writes(writes);
        }
    }
}

impl<T: Mutations> Mutations for Vec<T> {
    fn collect_writes(&self, writes: &mut PathSet) {
        self.as_slice().collect_writes(writes);
    }
}

/// The result of analysing one rule in a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub depends_on: PathSet,
    pub modifies: PathSet,
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    /// True when every loosely typed sub-structure was recovered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }
}
