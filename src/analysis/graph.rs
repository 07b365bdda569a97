use std::cmp::Reverse;
use std::collections::BTreeSet;

use super::{Dependencies, Mutations, PathSet};
use crate::types::RuleSet;

/// Which enabled rules can re-trigger which.
///
/// There is an edge `a -> b` when a path written by `a` overlaps a path read
/// by `b`. Feedback loops are legal in a reactive rule set, so cycles are
/// reported as data rather than rejected.
#[derive(Debug, Clone, Default)]
pub struct CascadeGraph {
    names: Vec<String>,
    priorities: Vec<i32>,
    /// `edges[a]` = rules re-checked after `a` runs, ascending.
    edges: Vec<Vec<usize>>,
}

fn overlaps_any(writes: &PathSet, reads: &PathSet) -> bool {
    writes
        .iter()
        .any(|w| reads.iter().any(|r| w.overlaps(r)))
}

impl CascadeGraph {
    #[must_use]
    pub fn build(ruleset: &RuleSet) -> Self {
        let rules: Vec<_> = ruleset.rules.iter().filter(|r| r.is_enabled()).collect();
        let reads: Vec<PathSet> = rules.iter().map(|r| r.depends_on()).collect();
        let writes: Vec<PathSet> = rules.iter().map(|r| r.modifies()).collect();

        let edges = writes
            .iter()
            .map(|w| {
                reads
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| overlaps_any(w, r))
                    .map(|(b, _)| b)
                    .collect()
            })
            .collect();

        CascadeGraph {
            names: rules.iter().map(|r| r.name.clone()).collect(),
            priorities: rules.iter().map(|r| r.priority).collect(),
            edges,
        }
    }

    /// Every edge as `(writer, reader)` pairs.
    #[must_use]
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .enumerate()
            .flat_map(|(a, targets)| {
                targets
                    .iter()
                    .map(move |&b| (self.names[a].as_str(), self.names[b].as_str()))
            })
            .collect()
    }

    /// Rules re-checked after `name` runs. `None` if `name` is not in the graph.
    #[must_use]
    pub fn successors(&self, name: &str) -> Option<Vec<&str>> {
        let a = self.names.iter().position(|n| n == name)?;
        Some(self.edges[a].iter().map(|&b| self.names[b].as_str()).collect())
    }

    /// Kahn's algorithm; among ready rules, higher priority first, then
    /// document order. Rules on or behind a cycle cannot be ordered and
    /// are appended last in the same tie-break order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        let n = self.names.len();
        let mut in_degree = vec![0usize; n];
        for targets in &self.edges {
            for &b in targets {
                in_degree[b] += 1;
            }
        }

        let key = |i: usize| (Reverse(self.priorities[i]), i);
        let mut ready: BTreeSet<(Reverse<i32>, usize)> =
            (0..n).filter(|&i| in_degree[i] == 0).map(key).collect();
        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);

        while let Some(next) = ready.pop_first() {
            let a = next.1;
            placed[a] = true;
            order.push(self.names[a].as_str());
            for &b in &self.edges[a] {
                in_degree[b] -= 1;
                if in_degree[b] == 0 {
                    ready.insert(key(b));
                }
            }
        }

        if order.len() < n {
            let mut rest: Vec<usize> = (0..n).filter(|&i| !placed[i]).collect();
            rest.sort_by_key(|&i| key(i));
            order.extend(rest.into_iter().map(|i| self.names[i].as_str()));
        }
        order
    }

    #[must_use]
    pub fn has_cycles(&self) -> bool {
        !self.cycles().is_empty()
    }

    /// One cycle per back edge found by depth-first search, each closed by
    /// repeating its first rule: `["a", "b", "a"]`.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut state = vec![DfsState::Unvisited; self.names.len()];
        // (rule, next edge to follow); the frames double as the current path.
        let mut frames: Vec<(usize, usize)> = Vec::new();
        let mut found = Vec::new();

        for start in 0..self.names.len() {
            if state[start] != DfsState::Unvisited {
                continue;
            }
            state[start] = DfsState::InStack;
            frames.push((start, 0));

            while let Some(frame) = frames.last_mut() {
                let (node, cursor) = *frame;
                let Some(&next) = self.edges[node].get(cursor) else {
                    frames.pop();
                    state[node] = DfsState::Done;
                    continue;
                };
                frame.1 += 1;

                match state[next] {
                    DfsState::InStack => {
                        if let Some(pos) = frames.iter().position(|&(n, _)| n == next) {
                            let mut cycle: Vec<String> = frames[pos..]
                                .iter()
                                .map(|&(i, _)| self.names[i].clone())
                                .collect();
                            cycle.push(self.names[next].clone());
                            found.push(cycle);
                        }
                    }
                    DfsState::Unvisited => {
                        state[next] = DfsState::InStack;
                        frames.push((next, 0));
                    }
                    DfsState::Done => {}
                }
            }
        }
        found
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DfsState {
    Unvisited,
    InStack,
    Done,
}
