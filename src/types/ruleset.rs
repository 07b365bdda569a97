use std::cmp::Reverse;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{Filter, Rule};
use crate::analysis::{Analysis, CascadeGraph, DependencyIndex};
use crate::document::{Decode, DecodeError, Encode, Fields, ObjectBuilder};

/// A package of rules (and viewer filters) loaded from one document.
///
/// Decoding validates the whole tree up front; a `RuleSet` value is always
/// well-formed. It is immutable in practice and `Send + Sync`, so it can be
/// shared behind an `Arc` and analysed from several threads.
///
/// # Example
///
/// ```
/// use tickrules::RuleSet;
///
/// let ruleset = RuleSet::from_json_str(r#"{
///     "version": "1",
///     "package": "arena",
///     "rules": [{
///         "name": "rank",
///         "trigger": {"type": "OnChange", "watch": ["$.Players[0].Score"]},
///         "selector": {"type": "All", "entity": "Players"},
///         "effects": [{"path": "$.Players[0].Rank", "value": 1}]
///     }]
/// }"#).unwrap();
///
/// let index = ruleset.dependency_index();
/// assert_eq!(index.rules_affected_by(&"$.Players[0].Score".into()), vec!["rank"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub version: Option<String>,
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub rules: Vec<Rule>,
    pub filters: Vec<Filter>,
}

impl RuleSet {
    /// Decode a rule set from an already parsed document.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] for the first invalid node found.
    pub fn from_document(doc: &Value) -> Result<Self, DecodeError> {
        Self::decode(doc)
    }

    /// Parse a JSON document and decode it.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`](crate::RulesError) on malformed JSON or an invalid rule tree.
    pub fn from_json_str(input: &str) -> Result<Self, crate::RulesError> {
        let doc: Value = serde_json::from_str(input)?;
        Ok(Self::from_document(&doc)?)
    }

    /// Read a JSON file and decode it.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`](crate::RulesError) on I/O, JSON or decode failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::RulesError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json_str(&input)
    }

    /// The canonical document for this rule set.
    #[must_use]
    pub fn to_document(&self) -> Value {
        self.encode()
    }

    /// First rule with the given name. Names are not required to be unique.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn rule_mut(&mut self, name: &str) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|r| r.name == name)
    }

    #[must_use]
    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn filter_mut(&mut self, name: &str) -> Option<&mut Filter> {
        self.filters.iter_mut().find(|f| f.name == name)
    }

    /// Rules ordered by descending priority. Equal priorities keep document order.
    #[must_use]
    pub fn rules_by_priority(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().collect();
        rules.sort_by_key(|r| Reverse(r.priority));
        rules
    }

    /// Analysis of every rule, in document order.
    #[must_use]
    pub fn analyze(&self) -> Vec<(&str, Analysis)> {
        self.rules
            .iter()
            .map(|r| (r.name.as_str(), r.analyze()))
            .collect()
    }

    /// Index from state path to the enabled rules that read it.
    #[must_use]
    pub fn dependency_index(&self) -> DependencyIndex {
        DependencyIndex::build(self)
    }

    /// Write-to-read links between rules.
    #[must_use]
    pub fn cascade_graph(&self) -> CascadeGraph {
        CascadeGraph::build(self)
    }
}

impl Decode for RuleSet {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("rule set", doc)?;
        Ok(RuleSet {
            version: version(&f)?,
            package: f.string("package")?,
            imports: f.strings("imports")?,
            rules: f.list("rules", "rule")?,
            filters: f.list("filters", "filter")?,
        })
    }
}

/// `version` may be written as a string or a bare number.
fn version(f: &Fields<'_>) -> Result<Option<String>, DecodeError> {
    match f.get("version") {
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        _ => f.string("version"),
    }
}

impl Encode for RuleSet {
    fn encode(&self) -> Value {
        ObjectBuilder::new()
            .opt("version", self.version.as_deref())
            .opt("package", self.package.as_deref())
            .strings("imports", &self.imports)
            .field(
                "rules",
                self.rules.iter().map(Encode::encode).collect::<Vec<_>>(),
            )
            .list("filters", &self.filters)
            .build()
    }
}

impl Serialize for RuleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.encode().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = Value::deserialize(deserializer)?;
        Self::decode(&doc).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "binary-cache")]
impl RuleSet {
    /// Serialize this rule set to a byte vector.
    ///
    /// The optional `source_text` is hashed (BLAKE3) and embedded in the
    /// payload metadata, so callers can tell when the cache is stale.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`](crate::serial::SerializeError) if encoding fails.
    pub fn to_bytes(
        &self,
        source_text: Option<&str>,
    ) -> Result<Vec<u8>, crate::serial::SerializeError> {
        crate::serial::encode(self, source_text)
    }

    /// Deserialize a rule set previously produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`](crate::serial::DeserializeError) on
    /// format, integrity, or validation failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::serial::DeserializeError> {
        crate::serial::decode(bytes)
    }

    /// # Errors
    ///
    /// Returns [`SerializeError`](crate::serial::SerializeError) on
    /// encoding or I/O failure.
    pub fn to_binary_file(
        &self,
        path: impl AsRef<std::path::Path>,
        source_text: Option<&str>,
    ) -> Result<(), crate::serial::SerializeError> {
        let bytes = self.to_bytes(source_text)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`DeserializeError`](crate::serial::DeserializeError) on
    /// I/O, format, integrity, or validation failure.
    pub fn from_binary_file(
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, crate::serial::DeserializeError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RuleSet({}{} rules, {} filters",
            self.package
                .as_deref()
                .map(|p| format!("{p}: "))
                .unwrap_or_default(),
            self.rules.len(),
            self.filters.len(),
        )?;
        if let Some(version) = &self.version {
            write!(f, ", version {version}")?;
        }
        f.write_str(")")
    }
}
