//! Schema definitions.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{FieldDefinition, NamingStrategy, SchemaKind};

/// A uniqueness constraint over a set of field warehouse names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Warehouse names of the constrained fields.
    pub fields: BTreeSet<SmolStr>,
}

impl Constraint {
    /// Create a constraint over the given fields.
    pub fn over<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// A schema object held by the remote platform.
///
/// The warehouse name is the identity key used to match definitions across
/// snapshots; display name and prefix are mutable presentation attributes.
/// Field order is significant and is carried by the insertion order of
/// `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Warehouse-stable name (identity key, unique per snapshot).
    pub warehouse_name: SmolStr,
    /// Display name shown by the platform.
    pub display_name: SmolStr,
    /// Registry id prefix (unique per snapshot).
    pub prefix: SmolStr,
    /// Kind of schema object.
    pub kind: SchemaKind,
    /// Naming strategies the platform may apply to records.
    pub naming_strategies: BTreeSet<NamingStrategy>,
    /// Uniqueness constraints over field sets.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Whether the schema is archived on the platform.
    #[serde(default)]
    pub archived: bool,
    /// Ordered fields, keyed by field warehouse name.
    pub fields: IndexMap<SmolStr, FieldDefinition>,
}

impl SchemaDefinition {
    /// Create a new schema definition with no fields.
    pub fn new(
        warehouse_name: impl Into<SmolStr>,
        display_name: impl Into<SmolStr>,
        prefix: impl Into<SmolStr>,
        kind: SchemaKind,
    ) -> Self {
        Self {
            warehouse_name: warehouse_name.into(),
            display_name: display_name.into(),
            prefix: prefix.into(),
            kind,
            naming_strategies: BTreeSet::from([NamingStrategy::NewIds]),
            constraints: Vec::new(),
            archived: false,
            fields: IndexMap::new(),
        }
    }

    /// Get the warehouse name as a string.
    pub fn name(&self) -> &str {
        self.warehouse_name.as_str()
    }

    /// Add a field, appending it to the field order.
    pub fn add_field(&mut self, field: FieldDefinition) {
        self.fields.insert(field.warehouse_name.clone(), field);
    }

    /// Builder-style [`add_field`](Self::add_field).
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.add_field(field);
        self
    }

    /// Replace the naming strategy set.
    pub fn with_naming_strategies<I>(mut self, strategies: I) -> Self
    where
        I: IntoIterator<Item = NamingStrategy>,
    {
        self.naming_strategies = strategies.into_iter().collect();
        self
    }

    /// Add a uniqueness constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Set the archived flag.
    pub fn with_archived(mut self, archived: bool) -> Self {
        self.archived = archived;
        self
    }

    /// Get a field by warehouse name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    /// Ordinal position of a field among the active fields.
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.active_fields()
            .position(|f| f.warehouse_name.as_str() == name)
    }

    /// Iterate over non-archived fields in order.
    pub fn active_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.values().filter(|f| !f.archived)
    }

    /// Warehouse names of the active fields, in order.
    pub fn field_order(&self) -> Vec<SmolStr> {
        self.active_fields()
            .map(|f| f.warehouse_name.clone())
            .collect()
    }

    /// Warehouse names of schemas referenced by active entity-link fields.
    pub fn linked_schemas(&self) -> Vec<&SmolStr> {
        self.active_fields()
            .filter_map(|f| f.entity_link.as_ref())
            .collect()
    }

    /// Names of dropdowns referenced by active dropdown fields.
    pub fn linked_dropdowns(&self) -> Vec<&SmolStr> {
        self.active_fields()
            .filter_map(|f| f.dropdown_link.as_ref())
            .collect()
    }
}

impl std::fmt::Display for SchemaDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] ({} fields)",
            self.warehouse_name,
            self.kind,
            self.fields.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValueType;

    fn sample() -> SchemaDefinition {
        SchemaDefinition::new("dough", "Dough", "DGH", SchemaKind::Entity)
            .with_field(FieldDefinition::new("name", "Name", FieldValueType::Text))
            .with_field(
                FieldDefinition::new("hydration", "Hydration", FieldValueType::Decimal)
                    .unit("percent"),
            )
    }

    #[test]
    fn test_field_order() {
        let schema = sample();
        assert_eq!(schema.field_order(), vec!["name", "hydration"]);
        assert_eq!(schema.field_position("hydration"), Some(1));
    }

    #[test]
    fn test_archived_fields_excluded_from_order() {
        let mut schema = sample();
        schema.fields.get_mut("name").unwrap().archived = true;
        assert_eq!(schema.field_order(), vec!["hydration"]);
        assert_eq!(schema.field_position("name"), None);
    }

    #[test]
    fn test_linked_dropdowns() {
        let schema = sample().with_field(
            FieldDefinition::new("flour", "Flour", FieldValueType::Dropdown)
                .dropdown("Flour Types"),
        );
        assert_eq!(schema.linked_dropdowns(), vec!["Flour Types"]);
        assert!(schema.linked_schemas().is_empty());
    }
}
