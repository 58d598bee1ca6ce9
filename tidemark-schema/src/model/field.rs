//! Field definitions.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::FieldValueType;

/// A field on a schema definition.
///
/// A field's identity is the pair of its owning schema's warehouse name and
/// its own warehouse name; the display name may change freely. The unit
/// label is immutable once set on the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Warehouse-stable field name (identity within the owning schema).
    pub warehouse_name: SmolStr,
    /// Display name shown by the platform.
    pub display_name: SmolStr,
    /// Value type of the field.
    pub value_type: FieldValueType,
    /// Whether a value is required on every record.
    pub required: bool,
    /// Whether the field holds multiple values.
    pub multi: bool,
    /// Warehouse name of the schema this field links to.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub entity_link: Option<SmolStr>,
    /// Name of the dropdown this field draws its values from.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dropdown_link: Option<SmolStr>,
    /// Unit label for numeric fields. Immutable once set.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub unit: Option<SmolStr>,
    /// Decimal precision for decimal fields.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub decimal_places: Option<u8>,
    /// Tooltip text shown next to the field.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tooltip: Option<String>,
    /// Whether the field is archived on the platform.
    #[serde(default)]
    pub archived: bool,
}

impl FieldDefinition {
    /// Create a new field definition.
    pub fn new(
        warehouse_name: impl Into<SmolStr>,
        display_name: impl Into<SmolStr>,
        value_type: FieldValueType,
    ) -> Self {
        Self {
            warehouse_name: warehouse_name.into(),
            display_name: display_name.into(),
            value_type,
            required: false,
            multi: false,
            entity_link: None,
            dropdown_link: None,
            unit: None,
            decimal_places: None,
            tooltip: None,
            archived: false,
        }
    }

    /// Mark the field required.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Mark the field multi-valued.
    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    /// Link the field to another schema by warehouse name.
    pub fn entity_link(mut self, schema: impl Into<SmolStr>) -> Self {
        self.entity_link = Some(schema.into());
        self
    }

    /// Link the field to a dropdown by name.
    pub fn dropdown(mut self, dropdown: impl Into<SmolStr>) -> Self {
        self.dropdown_link = Some(dropdown.into());
        self
    }

    /// Attach a unit label.
    pub fn unit(mut self, unit: impl Into<SmolStr>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Attach a decimal precision.
    pub fn decimal_places(mut self, places: u8) -> Self {
        self.decimal_places = Some(places);
        self
    }

    /// Attach a tooltip.
    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// Set the archived flag.
    pub fn archived(mut self, archived: bool) -> Self {
        self.archived = archived;
        self
    }

    /// Get the warehouse name as a string.
    pub fn name(&self) -> &str {
        self.warehouse_name.as_str()
    }

    /// Whether this field references another schema object.
    pub fn has_reference(&self) -> bool {
        self.entity_link.is_some() || self.dropdown_link.is_some()
    }
}

impl std::fmt::Display for FieldDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.warehouse_name, self.value_type)
    }
}
