use serde_json::Value;

use super::{Operand, Path, WhereClause};
use crate::analysis::{Dependencies, DependencyCollector};
use crate::document::{Decode, DecodeError, Encode, Fields, ObjectBuilder};

keyword_enum! {
    pub enum FilterOperationKind {
        KeepWhere => "KeepWhere",
        RemoveWhere => "RemoveWhere",
        HideFieldsWhere => "HideFieldsWhere",
        ReplaceFieldWhere => "ReplaceFieldWhere",
    }
}

/// What a filter operation does to the matching part of `target`.
#[derive(Debug, Clone, PartialEq)]
pub enum Masking {
    /// Keep only matching elements.
    Keep,
    /// Drop matching elements.
    Remove,
    /// Strip `fields` from matching elements.
    HideFields { fields: Vec<String> },
    /// Overwrite `field` on matching elements.
    ReplaceField { field: String, value: Operand },
}

/// One step of a per-viewer masking pipeline over the state sub-tree at `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOperation {
    pub target: Path,
    /// Absent: the operation applies to every element.
    pub condition: Option<WhereClause>,
    pub masking: Masking,
}

impl FilterOperation {
    #[must_use]
    pub fn kind(&self) -> FilterOperationKind {
        match self.masking {
            Masking::Keep => FilterOperationKind::KeepWhere,
            Masking::Remove => FilterOperationKind::RemoveWhere,
            Masking::HideFields { .. } => FilterOperationKind::HideFieldsWhere,
            Masking::ReplaceField { .. } => FilterOperationKind::ReplaceFieldWhere,
        }
    }
}

impl Decode for FilterOperation {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("filter operation", doc)?;
        let kind_str = f.discriminator()?.ok_or(DecodeError::MissingType {
            node: "filter operation",
        })?;
        let kind = match kind_str {
            "FilterWhere" => {
                tracing::warn!(
                    "filter operation type 'FilterWhere' is deprecated; use 'KeepWhere'"
                );
                FilterOperationKind::KeepWhere
            }
            other => other
                .parse::<FilterOperationKind>()
                .map_err(|_| DecodeError::unknown("filter operation", other))?,
        };
        let f = f.for_kind(kind_str);

        let masking = match kind {
            FilterOperationKind::KeepWhere => Masking::Keep,
            FilterOperationKind::RemoveWhere => Masking::Remove,
            FilterOperationKind::HideFieldsWhere => {
                f.required("fields")?;
                Masking::HideFields {
                    fields: f.strings("fields")?,
                }
            }
            FilterOperationKind::ReplaceFieldWhere => Masking::ReplaceField {
                field: f.required_str("field")?.to_owned(),
                value: f.operand("value")?.unwrap_or(Operand::Literal(Value::Null)),
            },
        };

        Ok(FilterOperation {
            target: f.required_path("target")?,
            condition: f.node("where")?,
            masking,
        })
    }
}

impl Encode for FilterOperation {
    fn encode(&self) -> Value {
        let out = ObjectBuilder::typed(self.kind().as_str())
            .field("target", self.target.as_str())
            .opt_node("where", self.condition.as_ref());
        match &self.masking {
            Masking::Keep | Masking::Remove => out,
            Masking::HideFields { fields } => out.field("fields", fields.clone()),
            Masking::ReplaceField { field, value } => {
                out.field("field", field.as_str()).node("value", value)
            }
        }
        .build()
    }
}

impl Dependencies for FilterOperation {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        deps.read(&self.target);
        self.condition.collect_reads(deps);
        if let Masking::ReplaceField { value, .. } = &self.masking {
            value.collect_reads(deps);
        }
    }
}

/// A named, switchable masking pipeline applied to a viewer's copy of state.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub name: String,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub operations: Vec<FilterOperation>,
}

impl Filter {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = Some(enabled);
    }
}

impl Decode for Filter {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("filter", doc)?;
        let name = f.required_str("name")?;
        Ok(Filter {
            name: name.to_owned(),
            description: f.string("description")?,
            enabled: f.bool("enabled")?,
            operations: f
                .list("operations", "operation")
                .map_err(|e| e.at(format!("filter '{name}'")))?,
        })
    }
}

impl Encode for Filter {
    fn encode(&self) -> Value {
        ObjectBuilder::new()
            .field("name", self.name.as_str())
            .opt("description", self.description.as_deref())
            .opt("enabled", self.enabled)
            .list("operations", &self.operations)
            .build()
    }
}

impl Dependencies for Filter {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        self.operations.collect_reads(deps);
    }
}
