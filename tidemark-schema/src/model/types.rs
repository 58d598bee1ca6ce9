//! Enumerated schema and field types.

use serde::{Deserialize, Serialize};

/// The kind of schema object held by the remote platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    /// A registered entity with its own records.
    Entity,
    /// A mixture composed of other entities.
    Mixture,
    /// A free-form document container.
    Document,
    /// A results table attached to measurements.
    Results,
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entity => write!(f, "entity"),
            Self::Mixture => write!(f, "mixture"),
            Self::Document => write!(f, "document"),
            Self::Results => write!(f, "results"),
        }
    }
}

/// The value type of a field on a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValueType {
    /// Short free text.
    Text,
    /// Multi-line free text.
    LongText,
    /// Whole number.
    Integer,
    /// Decimal number, optionally with a fixed precision.
    Decimal,
    /// Calendar date.
    Date,
    /// Date with time of day.
    DateTime,
    /// A value chosen from a dropdown's option list.
    Dropdown,
    /// A typed link to a record of another schema.
    EntityLink,
    /// An attached file blob.
    Blob,
}

impl FieldValueType {
    /// Whether the type carries a typed link to another schema.
    pub fn is_entity_link(&self) -> bool {
        matches!(self, Self::EntityLink)
    }

    /// Whether the type requires a dropdown reference.
    pub fn requires_dropdown(&self) -> bool {
        matches!(self, Self::Dropdown)
    }

    /// Whether the remote platform accepts multiple values for this type.
    pub fn supports_multi(&self) -> bool {
        matches!(self, Self::Dropdown | Self::EntityLink | Self::Blob)
    }

    /// Whether a unit label may be attached to this type.
    pub fn supports_unit(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }

    /// Whether a decimal precision may be attached to this type.
    pub fn supports_precision(&self) -> bool {
        matches!(self, Self::Decimal)
    }
}

impl std::fmt::Display for FieldValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::LongText => write!(f, "long_text"),
            Self::Integer => write!(f, "integer"),
            Self::Decimal => write!(f, "decimal"),
            Self::Date => write!(f, "date"),
            Self::DateTime => write!(f, "datetime"),
            Self::Dropdown => write!(f, "dropdown"),
            Self::EntityLink => write!(f, "entity_link"),
            Self::Blob => write!(f, "blob"),
        }
    }
}

/// How the remote platform names newly registered records of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    /// Generate fresh registry ids.
    NewIds,
    /// Derive registry ids from record names.
    IdsFromNames,
    /// Generate fresh ids and replace the record name with the id.
    ReplaceNameWithId,
    /// Rename from a template, keeping the old name as an alias.
    RenameWithTemplate,
    /// Rename from a template, discarding the old name.
    ReplaceNameWithTemplate,
}

impl NamingStrategy {
    /// Whether the strategy derives names from a template.
    pub fn is_template_based(&self) -> bool {
        matches!(self, Self::RenameWithTemplate | Self::ReplaceNameWithTemplate)
    }
}

impl std::fmt::Display for NamingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewIds => write!(f, "new_ids"),
            Self::IdsFromNames => write!(f, "ids_from_names"),
            Self::ReplaceNameWithId => write!(f, "replace_name_with_id"),
            Self::RenameWithTemplate => write!(f, "rename_with_template"),
            Self::ReplaceNameWithTemplate => write!(f, "replace_name_with_template"),
        }
    }
}
