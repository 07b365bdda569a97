use std::collections::{BTreeMap, BTreeSet};

use super::Dependencies;
use crate::types::{Path, RuleSet};

/// Maps every state path an enabled rule reads to the rules reading it.
///
/// The engine consults this after a write to find which rules must be
/// re-checked. Lookups match by overlap, so a write to `$.Players[0]` reaches
/// rules reading `$.Players` as well as `$.Players[0].Score`.
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    readers: BTreeMap<Path, Vec<usize>>,
    rule_names: Vec<String>,
}

impl DependencyIndex {
    #[must_use]
    pub fn build(ruleset: &RuleSet) -> Self {
        let mut readers: BTreeMap<Path, Vec<usize>> = BTreeMap::new();
        for (i, rule) in ruleset.rules.iter().enumerate() {
            if !rule.is_enabled() {
                continue;
            }
            for path in rule.depends_on() {
                readers.entry(path).or_default().push(i);
            }
        }
        DependencyIndex {
            readers,
            rule_names: ruleset.rules.iter().map(|r| r.name.clone()).collect(),
        }
    }

    /// Rules whose reads overlap `changed`, in document order, each once.
    #[must_use]
    pub fn rules_affected_by(&self, changed: &Path) -> Vec<&str> {
        let changed = changed.canonical_state().unwrap_or_else(|| changed.clone());
        let hits: BTreeSet<usize> = self
            .readers
            .iter()
            .filter(|(path, _)| path.overlaps(&changed))
            .flat_map(|(_, rules)| rules.iter().copied())
            .collect();
        hits.into_iter()
            .map(|i| self.rule_names[i].as_str())
            .collect()
    }

    /// Rules reading exactly `path`.
    #[must_use]
    pub fn readers_of(&self, path: &Path) -> Vec<&str> {
        self.readers
            .get(path)
            .map(|rules| rules.iter().map(|&i| self.rule_names[i].as_str()).collect())
            .unwrap_or_default()
    }

    /// Every indexed path, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.readers.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ruleset() -> RuleSet {
        RuleSet::from_document(&json!({
            "rules": [
                {"name": "rank", "trigger": {"type": "OnChange", "watch": ["$.Players[0].Score"]},
                 "effects": [{"path": "$.Players[0].Rank", "value": 1}]},
                {"name": "census", "selector": {"type": "All", "entity": "Players"},
                 "trigger": {"type": "OnTick"},
                 "effects": [{"path": "$.World.population", "value": 0}]},
                {"name": "weather", "trigger": {"type": "OnChange", "watch": ["$.World.season"]},
                 "effects": [{"path": "$.World.rain", "value": true}]},
                {"name": "off", "enabled": false,
                 "trigger": {"type": "OnChange", "watch": ["$.Players"]},
                 "effects": [{"type": "Log", "message": "never"}]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn descendant_and_ancestor_writes() {
        let index = ruleset().dependency_index();
        assert_eq!(
            index.rules_affected_by(&Path::new("$.Players[0].Score")),
            vec!["rank", "census"]
        );
        assert_eq!(index.rules_affected_by(&Path::new("$.Players")), vec!["rank", "census"]);
        assert_eq!(index.rules_affected_by(&Path::new("$.Players[1].Score")), vec!["census"]);
        assert_eq!(index.rules_affected_by(&Path::new("state:$.World")), vec!["weather"]);
        assert!(index.rules_affected_by(&Path::new("$.Weather")).is_empty());
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let index = ruleset().dependency_index();
        assert!(!index.rules_affected_by(&Path::new("$.Players")).contains(&"off"));
        assert_eq!(index.readers_of(&Path::new("$.Players")), vec!["census"]);
    }

    #[test]
    fn paths_are_sorted() {
        let index = ruleset().dependency_index();
        let paths: Vec<&str> = index.paths().map(Path::as_str).collect();
        assert_eq!(paths, vec!["$.Players", "$.Players[0].Score", "$.World.season"]);
        assert_eq!(index.len(), 3);
    }
}
