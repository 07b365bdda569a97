use std::str::FromStr;

use serde_json::{Map, Value};

use super::{Decode, DecodeError, Encode, UnknownKeyword};
use crate::types::{Operand, Path};

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read-side view over one document object.
///
/// `null` values are treated the same as absent keys.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fields<'a> {
    node: &'static str,
    kind: &'a str,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub(crate) fn of(node: &'static str, doc: &'a Value) -> Result<Self, DecodeError> {
        let map = doc.as_object().ok_or_else(|| {
            DecodeError::malformed(node, format!("expected an object, found {}", json_kind(doc)))
        })?;
        Ok(Self {
            node,
            kind: "",
            map,
        })
    }

    /// Name the discriminator so missing-field errors read `Nearest selector ...`.
    pub(crate) fn for_kind(mut self, kind: &'a str) -> Self {
        self.kind = kind;
        self
    }

    pub(crate) fn map(&self) -> &'a Map<String, Value> {
        self.map
    }

    fn owner(&self) -> String {
        if self.kind.is_empty() {
            self.node.to_owned()
        } else {
            format!("{} {}", self.kind, self.node)
        }
    }

    fn missing(&self, field: &'static str) -> DecodeError {
        DecodeError::MissingField {
            node: self.owner(),
            field,
        }
    }

    fn wrong_type(&self, key: &str, expected: &str, found: &Value) -> DecodeError {
        DecodeError::malformed(
            self.node,
            format!(
                "field '{key}' must be {expected}, found {}",
                json_kind(found)
            ),
        )
    }

    pub(crate) fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub(crate) fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn required(&self, key: &'static str) -> Result<&'a Value, DecodeError> {
        self.get(key).ok_or_else(|| self.missing(key))
    }

    /// The `type` discriminator. An empty string counts as absent.
    pub(crate) fn discriminator(&self) -> Result<Option<&'a str>, DecodeError> {
        Ok(self.str("type")?.filter(|s| !s.is_empty()))
    }

    pub(crate) fn str(&self, key: &str) -> Result<Option<&'a str>, DecodeError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.wrong_type(key, "a string", other)),
        }
    }

    pub(crate) fn string(&self, key: &str) -> Result<Option<String>, DecodeError> {
        Ok(self.str(key)?.map(str::to_owned))
    }

    /// A string field that must be present and non-empty.
    pub(crate) fn required_str(&self, key: &'static str) -> Result<&'a str, DecodeError> {
        match self.str(key)? {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(self.missing(key)),
        }
    }

    pub(crate) fn bool(&self, key: &str) -> Result<Option<bool>, DecodeError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.wrong_type(key, "a boolean", other)),
        }
    }

    pub(crate) fn i64(&self, key: &str) -> Result<Option<i64>, DecodeError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "an integer", v)),
        }
    }

    pub(crate) fn u32(&self, key: &'static str) -> Result<Option<u32>, DecodeError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => {
                let n = v
                    .as_u64()
                    .ok_or_else(|| self.wrong_type(key, "a non-negative integer", v))?;
                u32::try_from(n)
                    .map(Some)
                    .map_err(|_| DecodeError::invalid(key, format!("{n} is out of range")))
            }
        }
    }

    pub(crate) fn f64(&self, key: &str) -> Result<Option<f64>, DecodeError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "a number", v)),
        }
    }

    /// A list of strings; a single string is accepted as a one-element list.
    pub(crate) fn strings(&self, key: &str) -> Result<Vec<String>, DecodeError> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| self.wrong_type(key, "a list of strings", item))
                })
                .collect(),
            Some(other) => Err(self.wrong_type(key, "a list of strings", other)),
        }
    }

    /// A string field drawn from a fixed vocabulary, such as a unit or sort order.
    pub(crate) fn keyword<K>(&self, key: &'static str) -> Result<Option<K>, DecodeError>
    where
        K: FromStr<Err = UnknownKeyword>,
    {
        self.str(key)?
            .map(|s| s.parse::<K>().map_err(|e| DecodeError::invalid(key, e.to_string())))
            .transpose()
    }

    pub(crate) fn path(&self, key: &str) -> Result<Option<Path>, DecodeError> {
        Ok(self.str(key)?.filter(|s| !s.is_empty()).map(Path::new))
    }

    pub(crate) fn required_path(&self, key: &'static str) -> Result<Path, DecodeError> {
        self.required_str(key).map(Path::new)
    }

    pub(crate) fn operand(&self, key: &str) -> Result<Option<Operand>, DecodeError> {
        self.get(key)
            .map(|v| Operand::decode(v).map_err(|e| e.at(format!("field '{key}'"))))
            .transpose()
    }

    pub(crate) fn required_operand(&self, key: &'static str) -> Result<Operand, DecodeError> {
        let value = self.required(key)?;
        Operand::decode(value).map_err(|e| e.at(format!("field '{key}'")))
    }

    /// Decode an optional nested node.
    pub(crate) fn node<T: Decode>(&self, key: &str) -> Result<Option<T>, DecodeError> {
        self.get(key)
            .map(|v| T::decode(v).map_err(|e| e.at(format!("field '{key}'"))))
            .transpose()
    }

    pub(crate) fn required_node<T: Decode>(&self, key: &'static str) -> Result<T, DecodeError> {
        let value = self.required(key)?;
        T::decode(value).map_err(|e| e.at(format!("field '{key}'")))
    }

    /// Decode a list of nodes. Each failure is tagged `"{label} {index}"`.
    pub(crate) fn list<T: Decode>(&self, key: &str, label: &str) -> Result<Vec<T>, DecodeError> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => decode_list(items, label),
            Some(other) => Err(self.wrong_type(key, "a list", other)),
        }
    }

    /// Decode a mapping of operands, e.g. event payloads or spawn fields.
    pub(crate) fn operand_map(
        &self,
        key: &str,
    ) -> Result<std::collections::BTreeMap<String, Operand>, DecodeError> {
        match self.get(key) {
            None => Ok(std::collections::BTreeMap::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, v)| {
                    Operand::decode(v)
                        .map(|op| (name.clone(), op))
                        .map_err(|e| e.at(format!("{key}.{name}")))
                })
                .collect(),
            Some(other) => Err(self.wrong_type(key, "a mapping", other)),
        }
    }
}

pub(crate) fn decode_list<T: Decode>(items: &[Value], label: &str) -> Result<Vec<T>, DecodeError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| T::decode(item).map_err(|e| e.at(format!("{label} {i}"))))
        .collect()
}

/// Write-side builder producing a document object.
#[derive(Debug, Default)]
pub(crate) struct ObjectBuilder {
    map: Map<String, Value>,
}

impl ObjectBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn typed(kind: &str) -> Self {
        Self::new().field("type", kind)
    }

    pub(crate) fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.map.insert(key.to_owned(), value.into());
        self
    }

    pub(crate) fn opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    pub(crate) fn node(self, key: &str, node: &impl Encode) -> Self {
        let value = node.encode();
        self.field(key, value)
    }

    pub(crate) fn opt_node<T: Encode>(self, key: &str, node: Option<&T>) -> Self {
        match node {
            Some(n) => self.node(key, n),
            None => self,
        }
    }

    /// Emit a list, omitting the key entirely when the list is empty.
    pub(crate) fn list<T: Encode>(self, key: &str, items: &[T]) -> Self {
        if items.is_empty() {
            return self;
        }
        let values: Vec<Value> = items.iter().map(Encode::encode).collect();
        self.field(key, values)
    }

    pub(crate) fn strings(self, key: &str, items: &[String]) -> Self {
        if items.is_empty() {
            return self;
        }
        self.field(key, items.to_vec())
    }

    pub(crate) fn operand_map(
        self,
        key: &str,
        items: &std::collections::BTreeMap<String, Operand>,
    ) -> Self {
        if items.is_empty() {
            return self;
        }
        let map: Map<String, Value> = items
            .iter()
            .map(|(name, op)| (name.clone(), op.encode()))
            .collect();
        self.field(key, Value::Object(map))
    }

    pub(crate) fn build(self) -> Value {
        Value::Object(self.map)
    }
}
