//! In-memory implementations of the remote boundaries.
//!
//! [`InMemoryTenant`] models the remote platform closely enough to rehearse
//! migrations locally: it retains archived objects, assigns warehouse names
//! from display names at creation time, and applies patches and reorders
//! the way the platform would. Scripted faults make partial-failure and
//! retry behavior testable. [`InMemoryRevisionStore`] is the matching
//! revision store.

use std::collections::HashMap;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use smol_str::SmolStr;

use tidemark_schema::{DropdownDefinition, FieldDefinition, SchemaDefinition, Snapshot};

use crate::client::{RemoteError, RemoteResult, TenantClient, TenantPointer};
use crate::diff::assigned_warehouse_name;
use crate::error::MigrateResult;
use crate::operation::{FieldPatch, SchemaPatch};
use crate::revision::{Revision, RevisionStore};

#[derive(Debug, Default)]
struct TenantState {
    schemas: IndexMap<SmolStr, SchemaDefinition>,
    dropdowns: IndexMap<SmolStr, DropdownDefinition>,
    pointer: Option<TenantPointer>,
}

/// An in-memory tenant of the remote platform.
#[derive(Debug, Default)]
pub struct InMemoryTenant {
    state: Mutex<TenantState>,
    mutation_calls: Mutex<usize>,
    faults: Mutex<HashMap<usize, RemoteError>>,
}

impl InMemoryTenant {
    /// Create an empty tenant.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tenant with a snapshot, bypassing the creation flow (the
    /// seeded objects keep their warehouse names as-is).
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let tenant = Self::new();
        {
            let mut state = tenant.state.lock();
            for (key, schema) in &snapshot.schemas {
                state.schemas.insert(key.clone(), schema.clone());
            }
            for (name, dropdown) in &snapshot.dropdowns {
                state.dropdowns.insert(name.clone(), dropdown.clone());
            }
        }
        tenant
    }

    /// Fail the `nth` mutating call (1-based) with the given error. Reads
    /// never fault. Retried attempts count as separate calls, so two
    /// consecutive faults exercise one retry.
    pub fn fail_on_call(&self, nth: usize, error: RemoteError) {
        self.faults.lock().insert(nth, error);
    }

    /// The tenant's full state, archived objects included.
    pub fn raw_snapshot(&self) -> Snapshot {
        let state = self.state.lock();
        let mut snapshot = Snapshot::new();
        for schema in state.schemas.values() {
            snapshot.add_schema(schema.clone());
        }
        for dropdown in state.dropdowns.values() {
            snapshot.add_dropdown(dropdown.clone());
        }
        snapshot
    }

    /// The tenant's active schema surface.
    pub fn snapshot(&self) -> Snapshot {
        self.raw_snapshot().active()
    }

    /// The tenant pointer, if initialized.
    pub fn pointer(&self) -> Option<TenantPointer> {
        self.state.lock().pointer.clone()
    }

    fn count_mutation(&self) -> RemoteResult<()> {
        let mut calls = self.mutation_calls.lock();
        *calls += 1;
        if let Some(error) = self.faults.lock().remove(&*calls) {
            return Err(error);
        }
        Ok(())
    }
}

/// Insert a field so that its index among active fields equals `position`.
fn insert_field_at(schema: &mut SchemaDefinition, field: FieldDefinition, position: usize) {
    let mut pending = Some(field);
    let mut rebuilt = IndexMap::with_capacity(schema.fields.len() + 1);
    let mut active_seen = 0;
    for (key, value) in schema.fields.drain(..) {
        if !value.archived && active_seen == position
            && let Some(field) = pending.take()
        {
            rebuilt.insert(field.warehouse_name.clone(), field);
        }
        if !value.archived {
            active_seen += 1;
        }
        rebuilt.insert(key, value);
    }
    if let Some(field) = pending.take() {
        rebuilt.insert(field.warehouse_name.clone(), field);
    }
    schema.fields = rebuilt;
}

/// Reorder fields: listed fields first in the given sequence, everything
/// else after in its existing relative order.
fn reorder_fields_to(schema: &mut SchemaDefinition, order: &[SmolStr]) {
    let mut rebuilt = IndexMap::with_capacity(schema.fields.len());
    for name in order {
        if let Some(field) = schema.fields.shift_remove(name) {
            rebuilt.insert(name.clone(), field);
        }
    }
    for (key, value) in schema.fields.drain(..) {
        rebuilt.insert(key, value);
    }
    schema.fields = rebuilt;
}

fn apply_field_patch(field: &mut FieldDefinition, patch: &FieldPatch) {
    if let Some(change) = &patch.display_name {
        field.display_name = change.to.clone();
    }
    if let Some(change) = &patch.value_type {
        field.value_type = change.to;
    }
    if let Some(change) = &patch.required {
        field.required = change.to;
    }
    if let Some(change) = &patch.multi {
        field.multi = change.to;
    }
    if let Some(change) = &patch.entity_link {
        field.entity_link = change.to.clone();
    }
    if let Some(change) = &patch.dropdown_link {
        field.dropdown_link = change.to.clone();
    }
    if let Some(change) = &patch.unit {
        field.unit = change.to.clone();
    }
    if let Some(change) = &patch.decimal_places {
        field.decimal_places = change.to;
    }
    if let Some(change) = &patch.tooltip {
        field.tooltip = change.to.clone();
    }
}

#[async_trait]
impl TenantClient for InMemoryTenant {
    async fn fetch_schemas(&self) -> RemoteResult<Vec<SchemaDefinition>> {
        Ok(self.state.lock().schemas.values().cloned().collect())
    }

    async fn fetch_dropdowns(&self) -> RemoteResult<Vec<DropdownDefinition>> {
        Ok(self.state.lock().dropdowns.values().cloned().collect())
    }

    async fn create_schema(&self, schema: &SchemaDefinition) -> RemoteResult<()> {
        self.count_mutation()?;
        let mut state = self.state.lock();

        let assigned = assigned_warehouse_name(&schema.display_name);
        if state.schemas.contains_key(&assigned) {
            return Err(RemoteError::validation(format!(
                "schema '{assigned}' already exists"
            )));
        }
        if state.schemas.values().any(|s| s.prefix == schema.prefix) {
            return Err(RemoteError::validation(format!(
                "prefix '{}' already in use",
                schema.prefix
            )));
        }

        let mut created = schema.clone();
        created.warehouse_name = assigned.clone();
        created.archived = false;
        state.schemas.insert(assigned, created);
        Ok(())
    }

    async fn update_schema(&self, schema: &str, patch: &SchemaPatch) -> RemoteResult<()> {
        self.count_mutation()?;
        let mut state = self.state.lock();
        let index = state
            .schemas
            .get_index_of(schema)
            .ok_or_else(|| RemoteError::not_found(format!("schema '{schema}'")))?;
        let (_, mut target) = state
            .schemas
            .shift_remove_index(index)
            .expect("index is valid");

        if let Some(change) = &patch.display_name {
            target.display_name = change.to.clone();
        }
        if let Some(change) = &patch.warehouse_name {
            target.warehouse_name = change.to.clone();
        }
        if let Some(change) = &patch.prefix {
            target.prefix = change.to.clone();
        }
        if let Some(change) = &patch.kind {
            target.kind = change.to;
        }
        if let Some(change) = &patch.naming_strategies {
            target.naming_strategies = change.to.clone();
        }
        if let Some(change) = &patch.constraints {
            target.constraints = change.to.clone();
        }

        // Reinsert under the (possibly renamed) key at the same slot.
        let mut entries: Vec<_> = state.schemas.drain(..).collect();
        entries.insert(index, (target.warehouse_name.clone(), target));
        state.schemas = entries.into_iter().collect();
        Ok(())
    }

    async fn set_schema_archived(&self, schema: &str, archived: bool) -> RemoteResult<()> {
        self.count_mutation()?;
        let mut state = self.state.lock();
        let target = state
            .schemas
            .get_mut(schema)
            .ok_or_else(|| RemoteError::not_found(format!("schema '{schema}'")))?;
        target.archived = archived;
        Ok(())
    }

    async fn create_field(
        &self,
        schema: &str,
        field: &FieldDefinition,
        position: usize,
    ) -> RemoteResult<()> {
        self.count_mutation()?;
        let mut state = self.state.lock();
        let target = state
            .schemas
            .get_mut(schema)
            .ok_or_else(|| RemoteError::not_found(format!("schema '{schema}'")))?;
        if target.fields.contains_key(&field.warehouse_name) {
            return Err(RemoteError::validation(format!(
                "field '{schema}.{}' already exists",
                field.warehouse_name
            )));
        }
        insert_field_at(target, field.clone(), position);
        Ok(())
    }

    async fn update_field(
        &self,
        schema: &str,
        field: &str,
        patch: &FieldPatch,
    ) -> RemoteResult<()> {
        self.count_mutation()?;
        let mut state = self.state.lock();
        let target = state
            .schemas
            .get_mut(schema)
            .ok_or_else(|| RemoteError::not_found(format!("schema '{schema}'")))?
            .fields
            .get_mut(field)
            .ok_or_else(|| RemoteError::not_found(format!("field '{schema}.{field}'")))?;
        apply_field_patch(target, patch);
        Ok(())
    }

    async fn set_field_archived(
        &self,
        schema: &str,
        field: &str,
        archived: bool,
        position: usize,
    ) -> RemoteResult<()> {
        self.count_mutation()?;
        let mut state = self.state.lock();
        let target = state
            .schemas
            .get_mut(schema)
            .ok_or_else(|| RemoteError::not_found(format!("schema '{schema}'")))?;

        if archived {
            let entry = target
                .fields
                .get_mut(field)
                .ok_or_else(|| RemoteError::not_found(format!("field '{schema}.{field}'")))?;
            entry.archived = true;
        } else {
            // Restore at the requested position among active fields.
            let mut entry = target
                .fields
                .shift_remove(field)
                .ok_or_else(|| RemoteError::not_found(format!("field '{schema}.{field}'")))?;
            entry.archived = false;
            insert_field_at(target, entry, position);
        }
        Ok(())
    }

    async fn reorder_fields(&self, schema: &str, order: &[SmolStr]) -> RemoteResult<()> {
        self.count_mutation()?;
        let mut state = self.state.lock();
        let target = state
            .schemas
            .get_mut(schema)
            .ok_or_else(|| RemoteError::not_found(format!("schema '{schema}'")))?;
        reorder_fields_to(target, order);
        Ok(())
    }

    async fn create_dropdown(&self, dropdown: &DropdownDefinition) -> RemoteResult<()> {
        self.count_mutation()?;
        let mut state = self.state.lock();
        if state.dropdowns.contains_key(&dropdown.name) {
            return Err(RemoteError::validation(format!(
                "dropdown '{}' already exists",
                dropdown.name
            )));
        }
        let mut created = dropdown.clone();
        created.archived = false;
        state.dropdowns.insert(created.name.clone(), created);
        Ok(())
    }

    async fn replace_dropdown_options(
        &self,
        dropdown: &str,
        options: &[SmolStr],
    ) -> RemoteResult<()> {
        self.count_mutation()?;
        let mut state = self.state.lock();
        let target = state
            .dropdowns
            .get_mut(dropdown)
            .ok_or_else(|| RemoteError::not_found(format!("dropdown '{dropdown}'")))?;
        target.options = options.to_vec();
        Ok(())
    }

    async fn set_dropdown_archived(&self, dropdown: &str, archived: bool) -> RemoteResult<()> {
        self.count_mutation()?;
        let mut state = self.state.lock();
        let target = state
            .dropdowns
            .get_mut(dropdown)
            .ok_or_else(|| RemoteError::not_found(format!("dropdown '{dropdown}'")))?;
        target.archived = archived;
        Ok(())
    }

    async fn read_pointer(&self) -> RemoteResult<Option<TenantPointer>> {
        Ok(self.state.lock().pointer.clone())
    }

    async fn write_pointer(&self, pointer: &TenantPointer) -> RemoteResult<()> {
        self.count_mutation()?;
        self.state.lock().pointer = Some(pointer.clone());
        Ok(())
    }
}

/// An in-memory revision store.
#[derive(Debug, Default)]
pub struct InMemoryRevisionStore {
    revisions: Mutex<Vec<Revision>>,
}

impl InMemoryRevisionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored revisions.
    pub fn len(&self) -> usize {
        self.revisions.lock().len()
    }

    /// Whether the store holds no revisions.
    pub fn is_empty(&self) -> bool {
        self.revisions.lock().is_empty()
    }
}

#[async_trait]
impl RevisionStore for InMemoryRevisionStore {
    async fn load_all(&self) -> MigrateResult<Vec<Revision>> {
        Ok(self.revisions.lock().clone())
    }

    async fn get(&self, id: &str) -> MigrateResult<Option<Revision>> {
        Ok(self.revisions.lock().iter().find(|r| r.id == id).cloned())
    }

    async fn append(&self, revision: &Revision) -> MigrateResult<()> {
        self.revisions.lock().push(revision.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_schema::{FieldValueType, SchemaKind};

    fn schema_with_fields() -> SchemaDefinition {
        SchemaDefinition::new("dough", "Dough", "DGH", SchemaKind::Entity)
            .with_field(FieldDefinition::new("name", "Name", FieldValueType::Text))
            .with_field(FieldDefinition::new("notes", "Notes", FieldValueType::LongText))
    }

    #[tokio::test]
    async fn test_create_assigns_warehouse_name() {
        let tenant = InMemoryTenant::new();
        let mut declared = schema_with_fields();
        declared.warehouse_name = "dough_v2".into();
        tenant.create_schema(&declared).await.unwrap();

        let snapshot = tenant.snapshot();
        assert!(snapshot.get_schema("dough").is_some());
        assert!(snapshot.get_schema("dough_v2").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_prefix_rejected() {
        let tenant = InMemoryTenant::new();
        tenant.create_schema(&schema_with_fields()).await.unwrap();
        let other = SchemaDefinition::new("starter", "Starter", "DGH", SchemaKind::Entity);
        let err = tenant.create_schema(&other).await.unwrap_err();
        assert!(err.to_string().contains("prefix"));
    }

    #[tokio::test]
    async fn test_field_insert_position() {
        let tenant = InMemoryTenant::new();
        tenant.create_schema(&schema_with_fields()).await.unwrap();

        let inserted = FieldDefinition::new("hydration", "Hydration", FieldValueType::Decimal);
        tenant.create_field("dough", &inserted, 1).await.unwrap();

        let snapshot = tenant.snapshot();
        assert_eq!(
            snapshot.get_schema("dough").unwrap().field_order(),
            vec!["name", "hydration", "notes"]
        );
    }

    #[tokio::test]
    async fn test_archive_then_unarchive_restores_position() {
        let tenant = InMemoryTenant::new();
        tenant.create_schema(&schema_with_fields()).await.unwrap();

        tenant
            .set_field_archived("dough", "name", true, 0)
            .await
            .unwrap();
        assert_eq!(
            tenant.snapshot().get_schema("dough").unwrap().field_order(),
            vec!["notes"]
        );

        tenant
            .set_field_archived("dough", "name", false, 0)
            .await
            .unwrap();
        assert_eq!(
            tenant.snapshot().get_schema("dough").unwrap().field_order(),
            vec!["name", "notes"]
        );
    }

    #[tokio::test]
    async fn test_rename_keeps_slot() {
        let tenant = InMemoryTenant::new();
        tenant.create_schema(&schema_with_fields()).await.unwrap();
        tenant
            .create_schema(&SchemaDefinition::new(
                "starter",
                "Starter",
                "STR",
                SchemaKind::Entity,
            ))
            .await
            .unwrap();

        tenant
            .update_schema("dough", &SchemaPatch::rename("dough", "dough_v2"))
            .await
            .unwrap();

        let snapshot = tenant.snapshot();
        let names: Vec<&str> = snapshot.schema_names().collect();
        assert_eq!(names, vec!["dough_v2", "starter"]);
    }

    #[tokio::test]
    async fn test_scripted_fault_fires_once() {
        let tenant = InMemoryTenant::new();
        tenant.fail_on_call(1, RemoteError::rate_limited("slow down"));

        let err = tenant.create_schema(&schema_with_fields()).await.unwrap_err();
        assert!(err.is_transient());
        // Second attempt succeeds.
        tenant.create_schema(&schema_with_fields()).await.unwrap();
    }

    #[tokio::test]
    async fn test_revision_store_round_trip() {
        let store = InMemoryRevisionStore::new();
        let root = Revision::root("environment bootstrap");
        store.append(&root).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&root.id).await.unwrap().unwrap().id, root.id);
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
