use serde_json::Value;

use super::{DistanceUnit, Operand, WhereClause};
use crate::analysis::{Dependencies, DependencyCollector};
use crate::document::{Decode, DecodeError, Encode, Fields, ObjectBuilder};

keyword_enum! {
    pub enum SelectorKind {
        All => "All",
        Filter => "Filter",
        Single => "Single",
        Related => "Related",
        Nearest => "Nearest",
        Farthest => "Farthest",
    }
}

/// Parameters shared by the `Nearest` and `Farthest` selectors.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximitySelector {
    pub entity: String,
    /// Position of each candidate entity.
    pub position: Operand,
    /// Point distances are measured from.
    pub origin: Operand,
    pub limit: Option<u32>,
    pub max_distance: Option<f64>,
    pub min_distance: Option<f64>,
    pub unit: Option<DistanceUnit>,
}

/// Strategy for choosing the entities a rule operates on.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    All {
        entity: String,
    },
    Filter {
        entity: String,
        filter: WhereClause,
    },
    Single {
        entity: String,
        id: Operand,
    },
    /// Entities linked to `source` through `relation`.
    Related {
        entity: String,
        relation: String,
        source: Operand,
    },
    Nearest(ProximitySelector),
    Farthest(ProximitySelector),
}

impl Selector {
    #[must_use]
    pub fn all(entity: impl Into<String>) -> Self {
        Selector::All {
            entity: entity.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::All { .. } => SelectorKind::All,
            Selector::Filter { .. } => SelectorKind::Filter,
            Selector::Single { .. } => SelectorKind::Single,
            Selector::Related { .. } => SelectorKind::Related,
            Selector::Nearest(_) => SelectorKind::Nearest,
            Selector::Farthest(_) => SelectorKind::Farthest,
        }
    }

    /// The entity collection this selector draws from.
    #[must_use]
    pub fn entity(&self) -> &str {
        match self {
            Selector::All { entity }
            | Selector::Filter { entity, .. }
            | Selector::Single { entity, .. }
            | Selector::Related { entity, .. } => entity,
            Selector::Nearest(p) | Selector::Farthest(p) => &p.entity,
        }
    }
}

impl ProximitySelector {
    fn decode(f: &Fields<'_>, entity: String) -> Result<Self, DecodeError> {
        let proximity = ProximitySelector {
            entity,
            position: f.required_operand("position")?,
            origin: f.required_operand("origin")?,
            limit: f.u32("limit")?,
            max_distance: f.f64("maxDistance")?,
            min_distance: f.f64("minDistance")?,
            unit: f.keyword("unit")?,
        };
        if let (Some(min), Some(max)) = (proximity.min_distance, proximity.max_distance) {
            if min > max {
                return Err(DecodeError::invalid(
                    "minDistance",
                    format!("{min} exceeds maxDistance {max}"),
                ));
            }
        }
        Ok(proximity)
    }

    fn encode_into(&self, out: ObjectBuilder) -> ObjectBuilder {
        out.node("position", &self.position)
            .node("origin", &self.origin)
            .opt("limit", self.limit)
            .opt("maxDistance", self.max_distance)
            .opt("minDistance", self.min_distance)
            .opt("unit", self.unit.map(DistanceUnit::as_str))
    }
}

impl Decode for Selector {
    fn decode(doc: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of("selector", doc)?;
        let kind_str = f
            .discriminator()?
            .ok_or(DecodeError::MissingType { node: "selector" })?;
        let kind = kind_str
            .parse::<SelectorKind>()
            .map_err(|_| DecodeError::unknown("selector", kind_str))?;
        let f = f.for_kind(kind_str);
        let entity = f.required_str("entity")?.to_owned();

        Ok(match kind {
            SelectorKind::All => Selector::All { entity },
            SelectorKind::Filter => Selector::Filter {
                entity,
                filter: f.required_node("where")?,
            },
            SelectorKind::Single => Selector::Single {
                entity,
                id: f.required_operand("id")?,
            },
            SelectorKind::Related => Selector::Related {
                entity,
                relation: f.required_str("relation")?.to_owned(),
                source: f.required_operand("source")?,
            },
            SelectorKind::Nearest => Selector::Nearest(ProximitySelector::decode(&f, entity)?),
            SelectorKind::Farthest => Selector::Farthest(ProximitySelector::decode(&f, entity)?),
        })
    }
}

impl Encode for Selector {
    fn encode(&self) -> Value {
        let out = ObjectBuilder::typed(self.kind().as_str()).field("entity", self.entity());
        match self {
            Selector::All { .. } => out,
            Selector::Filter { filter, .. } => out.node("where", filter),
            Selector::Single { id, .. } => out.node("id", id),
            Selector::Related {
                relation, source, ..
            } => out.field("relation", relation.as_str()).node("source", source),
            Selector::Nearest(p) | Selector::Farthest(p) => p.encode_into(out),
        }
        .build()
    }
}

impl Dependencies for Selector {
    fn collect_reads(&self, deps: &mut DependencyCollector) {
        deps.read_collection(self.entity());
        match self {
            Selector::All { .. } => {}
            Selector::Filter { filter, .. } => filter.collect_reads(deps),
            Selector::Single { id, .. } => id.collect_reads(deps),
            Selector::Related { source, .. } => source.collect_reads(deps),
            Selector::Nearest(p) | Selector::Farthest(p) => {
                p.position.collect_reads(deps);
                p.origin.collect_reads(deps);
            }
        }
    }
}
