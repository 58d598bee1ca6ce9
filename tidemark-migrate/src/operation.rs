//! Migration operations and their property-diff payloads.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use tidemark_schema::{
    Constraint, DropdownDefinition, FieldDefinition, FieldValueType, NamingStrategy,
    SchemaDefinition, SchemaKind,
};

/// An old/new pair for a single changed property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change<T> {
    /// The value before the operation.
    pub from: T,
    /// The value after the operation.
    pub to: T,
}

impl<T> Change<T> {
    /// Create a change.
    pub fn new(from: T, to: T) -> Self {
        Self { from, to }
    }

    /// The same change in the opposite direction.
    pub fn flipped(&self) -> Self
    where
        T: Clone,
    {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

fn changed<T: PartialEq + Clone>(from: &T, to: &T) -> Option<Change<T>> {
    (from != to).then(|| Change::new(from.clone(), to.clone()))
}

/// Property-level diff for a schema. Only changed properties are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaPatch {
    /// Display name change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<Change<SmolStr>>,
    /// Warehouse rename. Only emitted when the tenant permits renames.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub warehouse_name: Option<Change<SmolStr>>,
    /// Prefix change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub prefix: Option<Change<SmolStr>>,
    /// Schema kind change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<Change<SchemaKind>>,
    /// Naming strategy set change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub naming_strategies: Option<Change<BTreeSet<NamingStrategy>>>,
    /// Constraint set change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub constraints: Option<Change<Vec<Constraint>>>,
}

impl SchemaPatch {
    /// Diff the non-field properties of two schema definitions. Archived
    /// flags and fields are handled by dedicated operations, and warehouse
    /// names never differ between matched definitions.
    pub fn between(from: &SchemaDefinition, to: &SchemaDefinition) -> Self {
        Self {
            display_name: changed(&from.display_name, &to.display_name),
            warehouse_name: None,
            prefix: changed(&from.prefix, &to.prefix),
            kind: changed(&from.kind, &to.kind),
            naming_strategies: changed(&from.naming_strategies, &to.naming_strategies),
            constraints: changed(&from.constraints, &to.constraints),
        }
    }

    /// A patch carrying only a warehouse rename.
    pub fn rename(from: impl Into<SmolStr>, to: impl Into<SmolStr>) -> Self {
        Self {
            warehouse_name: Some(Change::new(from.into(), to.into())),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.warehouse_name.is_none()
            && self.prefix.is_none()
            && self.kind.is_none()
            && self.naming_strategies.is_none()
            && self.constraints.is_none()
    }

    /// Number of changed properties.
    pub fn len(&self) -> usize {
        [
            self.display_name.is_some(),
            self.warehouse_name.is_some(),
            self.prefix.is_some(),
            self.kind.is_some(),
            self.naming_strategies.is_some(),
            self.constraints.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    /// The same patch in the opposite direction.
    pub fn flip(&self) -> Self {
        Self {
            display_name: self.display_name.as_ref().map(Change::flipped),
            warehouse_name: self.warehouse_name.as_ref().map(Change::flipped),
            prefix: self.prefix.as_ref().map(Change::flipped),
            kind: self.kind.as_ref().map(Change::flipped),
            naming_strategies: self.naming_strategies.as_ref().map(Change::flipped),
            constraints: self.constraints.as_ref().map(Change::flipped),
        }
    }
}

/// Property-level diff for a field. Only changed properties are present.
///
/// A unit change only ever sets a label that was unset: units are immutable
/// once set, and the diff engine rejects a model that tries to change one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPatch {
    /// Display name change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<Change<SmolStr>>,
    /// Value type change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value_type: Option<Change<FieldValueType>>,
    /// Required flag change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub required: Option<Change<bool>>,
    /// Multi-value flag change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub multi: Option<Change<bool>>,
    /// Entity link change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub entity_link: Option<Change<Option<SmolStr>>>,
    /// Dropdown link change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dropdown_link: Option<Change<Option<SmolStr>>>,
    /// Unit label being set for the first time.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub unit: Option<Change<Option<SmolStr>>>,
    /// Decimal precision change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub decimal_places: Option<Change<Option<u8>>>,
    /// Tooltip change.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tooltip: Option<Change<Option<String>>>,
}

impl FieldPatch {
    /// Diff the mutable properties of two field definitions.
    pub fn between(from: &FieldDefinition, to: &FieldDefinition) -> Self {
        Self {
            display_name: changed(&from.display_name, &to.display_name),
            value_type: changed(&from.value_type, &to.value_type),
            required: changed(&from.required, &to.required),
            multi: changed(&from.multi, &to.multi),
            entity_link: changed(&from.entity_link, &to.entity_link),
            dropdown_link: changed(&from.dropdown_link, &to.dropdown_link),
            unit: changed(&from.unit, &to.unit),
            decimal_places: changed(&from.decimal_places, &to.decimal_places),
            tooltip: changed(&from.tooltip, &to.tooltip),
        }
    }

    /// A patch carrying only an entity-link change.
    pub fn link(from: Option<SmolStr>, to: Option<SmolStr>) -> Self {
        Self {
            entity_link: Some(Change::new(from, to)),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Number of changed properties.
    pub fn len(&self) -> usize {
        [
            self.display_name.is_some(),
            self.value_type.is_some(),
            self.required.is_some(),
            self.multi.is_some(),
            self.entity_link.is_some(),
            self.dropdown_link.is_some(),
            self.unit.is_some(),
            self.decimal_places.is_some(),
            self.tooltip.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    /// The same patch in the opposite direction.
    pub fn flip(&self) -> Self {
        Self {
            display_name: self.display_name.as_ref().map(Change::flipped),
            value_type: self.value_type.as_ref().map(Change::flipped),
            required: self.required.as_ref().map(Change::flipped),
            multi: self.multi.as_ref().map(Change::flipped),
            entity_link: self.entity_link.as_ref().map(Change::flipped),
            dropdown_link: self.dropdown_link.as_ref().map(Change::flipped),
            unit: self.unit.as_ref().map(Change::flipped),
            decimal_places: self.decimal_places.as_ref().map(Change::flipped),
            tooltip: self.tooltip.as_ref().map(Change::flipped),
        }
    }
}

/// A single action against one remote schema object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Create a dropdown with its option list.
    CreateDropdown { dropdown: DropdownDefinition },
    /// Replace a dropdown's option list wholesale.
    UpdateDropdown {
        dropdown: SmolStr,
        options: Change<Vec<SmolStr>>,
    },
    /// Restore an archived dropdown.
    UnarchiveDropdown { dropdown: SmolStr },
    /// Create a schema with its fields.
    CreateSchema { schema: SchemaDefinition },
    /// Apply a property patch to a schema.
    UpdateSchema { schema: SmolStr, patch: SchemaPatch },
    /// Restore an archived schema.
    UnarchiveSchema { schema: SmolStr },
    /// Create a field at a position among the schema's active fields.
    CreateField {
        schema: SmolStr,
        field: FieldDefinition,
        position: usize,
    },
    /// Restore an archived field at a position among active fields.
    UnarchiveField {
        schema: SmolStr,
        field: SmolStr,
        position: usize,
    },
    /// Apply a property patch to a field.
    UpdateField {
        schema: SmolStr,
        field: SmolStr,
        patch: FieldPatch,
    },
    /// Archive a field. `position` records where it sat, for the reverse.
    ArchiveField {
        schema: SmolStr,
        field: SmolStr,
        position: usize,
    },
    /// Put a schema's active fields into the given order.
    ReorderField { schema: SmolStr, order: Vec<SmolStr> },
    /// Archive a schema. The platform retains it for later unarchiving.
    ArchiveSchema { schema: SmolStr },
    /// Archive a dropdown.
    ArchiveDropdown { dropdown: SmolStr },
}

impl Operation {
    /// Static execution rank. Dropdowns come up before the schemas that
    /// reference them; an object is unarchived before it is patched;
    /// archives run after everything else, referencing objects first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::CreateDropdown { .. } => 1,
            Self::UnarchiveDropdown { .. } => 2,
            Self::UpdateDropdown { .. } => 3,
            Self::CreateSchema { .. } => 4,
            Self::UnarchiveSchema { .. } => 5,
            Self::UpdateSchema { .. } => 6,
            Self::CreateField { .. } => 7,
            Self::UnarchiveField { .. } => 8,
            Self::UpdateField { .. } => 9,
            Self::ArchiveField { .. } => 10,
            Self::ReorderField { .. } => 11,
            Self::ArchiveSchema { .. } => 12,
            Self::ArchiveDropdown { .. } => 13,
        }
    }

    /// Identity key of the object this operation targets.
    pub fn target(&self) -> &str {
        match self {
            Self::CreateDropdown { dropdown } => dropdown.name.as_str(),
            Self::UpdateDropdown { dropdown, .. }
            | Self::UnarchiveDropdown { dropdown }
            | Self::ArchiveDropdown { dropdown } => dropdown.as_str(),
            Self::CreateSchema { schema } => schema.warehouse_name.as_str(),
            Self::UpdateSchema { schema, .. }
            | Self::UnarchiveSchema { schema }
            | Self::CreateField { schema, .. }
            | Self::UnarchiveField { schema, .. }
            | Self::UpdateField { schema, .. }
            | Self::ArchiveField { schema, .. }
            | Self::ReorderField { schema, .. }
            | Self::ArchiveSchema { schema } => schema.as_str(),
        }
    }

    /// Position component for ordering field operations deterministically.
    pub fn position(&self) -> usize {
        match self {
            Self::CreateField { position, .. }
            | Self::UnarchiveField { position, .. }
            | Self::ArchiveField { position, .. } => *position,
            _ => 0,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateDropdown { dropdown } => {
                write!(f, "create dropdown '{}'", dropdown.name)
            }
            Self::UpdateDropdown { dropdown, options } => write!(
                f,
                "replace options of dropdown '{}' ({} -> {})",
                dropdown,
                options.from.len(),
                options.to.len()
            ),
            Self::UnarchiveDropdown { dropdown } => {
                write!(f, "unarchive dropdown '{dropdown}'")
            }
            Self::CreateSchema { schema } => write!(
                f,
                "create schema '{}' with {} fields",
                schema.warehouse_name,
                schema.fields.len()
            ),
            Self::UpdateSchema { schema, patch } => {
                write!(f, "update schema '{}' ({} properties)", schema, patch.len())
            }
            Self::UnarchiveSchema { schema } => write!(f, "unarchive schema '{schema}'"),
            Self::CreateField { schema, field, .. } => {
                write!(f, "create field '{}.{}'", schema, field.warehouse_name)
            }
            Self::UnarchiveField { schema, field, .. } => {
                write!(f, "unarchive field '{schema}.{field}'")
            }
            Self::UpdateField {
                schema,
                field,
                patch,
            } => write!(
                f,
                "update field '{}.{}' ({} properties)",
                schema,
                field,
                patch.len()
            ),
            Self::ArchiveField { schema, field, .. } => {
                write!(f, "archive field '{schema}.{field}'")
            }
            Self::ReorderField { schema, order } => {
                write!(f, "reorder {} fields of schema '{}'", order.len(), schema)
            }
            Self::ArchiveSchema { schema } => write!(f, "archive schema '{schema}'"),
            Self::ArchiveDropdown { dropdown } => write!(f, "archive dropdown '{dropdown}'"),
        }
    }
}

/// A forward operation paired with its reverse.
///
/// The diff engine emits these pairs; a revision stores the forward list in
/// order and the reverse list in reversed order, so a downgrade undoes the
/// last forward effect first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOperation {
    /// The operation that moves `from` toward `to`.
    pub forward: Operation,
    /// The operation that undoes it.
    pub reverse: Operation,
}

impl PlannedOperation {
    /// Pair a forward operation with its reverse.
    pub fn new(forward: Operation, reverse: Operation) -> Self {
        Self { forward, reverse }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_flip() {
        let change = Change::new(1, 2);
        let flipped = change.flipped();
        assert_eq!(flipped.from, 2);
        assert_eq!(flipped.to, 1);
    }

    #[test]
    fn test_schema_patch_between() {
        let from = SchemaDefinition::new("dough", "Dough", "DGH", SchemaKind::Entity);
        let mut to = from.clone();
        to.display_name = "Sourdough".into();
        to.prefix = "SD".into();

        let patch = SchemaPatch::between(&from, &to);
        assert_eq!(patch.len(), 2);
        assert_eq!(patch.display_name.as_ref().unwrap().to, "Sourdough");
        assert!(patch.kind.is_none());

        let flipped = patch.flip();
        assert_eq!(flipped.display_name.as_ref().unwrap().to, "Dough");
    }

    #[test]
    fn test_field_patch_between_identical_is_empty() {
        let field = FieldDefinition::new("name", "Name", FieldValueType::Text);
        assert!(FieldPatch::between(&field, &field).is_empty());
    }

    #[test]
    fn test_operation_rank_ordering() {
        let create_dd = Operation::CreateDropdown {
            dropdown: DropdownDefinition::new("Flours", ["Rye"]),
        };
        let create_schema = Operation::CreateSchema {
            schema: SchemaDefinition::new("dough", "Dough", "DGH", SchemaKind::Entity),
        };
        let archive_dd = Operation::ArchiveDropdown {
            dropdown: "Flours".into(),
        };
        assert!(create_dd.rank() < create_schema.rank());
        assert!(create_schema.rank() < archive_dd.rank());
    }

    #[test]
    fn test_operation_serde_round_trip() {
        let op = Operation::UpdateField {
            schema: "dough".into(),
            field: "hydration".into(),
            patch: FieldPatch {
                required: Some(Change::new(false, true)),
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&op).unwrap();
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }
}
