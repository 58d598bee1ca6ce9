//! Point-in-time view of a schema model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{DropdownDefinition, SchemaDefinition};

/// A snapshot of a full schema model: every schema and dropdown, keyed by
/// identity, in a stable order.
///
/// Snapshots come from two places, the model registry (the declared state)
/// and the remote state reader (the live state), and are what the diff
/// engine compares. A snapshot may carry archived objects; [`active`]
/// projects them away, which is the view the remote reader reports by
/// default.
///
/// [`active`]: Snapshot::active
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// All schemas, keyed by warehouse name.
    pub schemas: IndexMap<SmolStr, SchemaDefinition>,
    /// All dropdowns, keyed by display name.
    pub dropdowns: IndexMap<SmolStr, DropdownDefinition>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema to the snapshot.
    pub fn add_schema(&mut self, schema: SchemaDefinition) {
        self.schemas.insert(schema.warehouse_name.clone(), schema);
    }

    /// Add a dropdown to the snapshot.
    pub fn add_dropdown(&mut self, dropdown: DropdownDefinition) {
        self.dropdowns.insert(dropdown.name.clone(), dropdown);
    }

    /// Get a schema by warehouse name.
    pub fn get_schema(&self, name: &str) -> Option<&SchemaDefinition> {
        self.schemas.get(name)
    }

    /// Get a dropdown by name.
    pub fn get_dropdown(&self, name: &str) -> Option<&DropdownDefinition> {
        self.dropdowns.get(name)
    }

    /// Warehouse names of all schemas.
    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(|s| s.as_str())
    }

    /// Names of all dropdowns.
    pub fn dropdown_names(&self) -> impl Iterator<Item = &str> {
        self.dropdowns.keys().map(|s| s.as_str())
    }

    /// Whether the snapshot holds no objects at all.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.dropdowns.is_empty()
    }

    /// Project the snapshot down to its non-archived objects, dropping
    /// archived schemas, dropdowns, and fields.
    pub fn active(&self) -> Snapshot {
        let schemas = self
            .schemas
            .iter()
            .filter(|(_, s)| !s.archived)
            .map(|(name, s)| {
                let mut schema = s.clone();
                schema.fields.retain(|_, f| !f.archived);
                (name.clone(), schema)
            })
            .collect();

        let dropdowns = self
            .dropdowns
            .iter()
            .filter(|(_, d)| !d.archived)
            .map(|(name, d)| (name.clone(), d.clone()))
            .collect();

        Snapshot { schemas, dropdowns }
    }

    /// Counts for logging.
    pub fn counts(&self) -> (usize, usize) {
        (self.schemas.len(), self.dropdowns.len())
    }
}
