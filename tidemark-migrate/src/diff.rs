//! Structural diffing between schema snapshots.
//!
//! The differ compares two snapshots (`from` -> `to`) and emits an ordered
//! list of operations that transforms one into the other, each paired with
//! its reverse. Objects are matched by identity key: schemas and fields by
//! warehouse name, dropdowns by display name. The platform never deletes,
//! so disappearance is an archive and reappearance an unarchive.
//!
//! Output order is deterministic: operations are sorted by kind rank, then
//! dependency rank (referenced objects created first, archived last), then
//! identity key and position. Running the same diff twice yields the same
//! sequence.

use std::collections::{BTreeMap, BTreeSet};

use convert_case::{Case, Casing};
use smol_str::SmolStr;
use tracing::debug;

use tidemark_schema::{DropdownDefinition, SchemaDefinition, Snapshot};

use crate::client::TenantCapabilities;
use crate::error::{MigrateResult, MigrationError};
use crate::operation::{Change, FieldPatch, Operation, PlannedOperation, SchemaPatch};

/// The warehouse name the platform assigns a schema at creation time.
///
/// The platform derives it from the display name; a differing declared name
/// needs a rename follow-up, which only capability-holding tenants may run.
pub fn assigned_warehouse_name(display_name: &str) -> SmolStr {
    display_name.to_case(Case::Snake).into()
}

/// An ordered set of planned operations produced by the differ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSet {
    /// Planned operations in execution order.
    pub operations: Vec<PlannedOperation>,
}

impl DiffSet {
    /// Whether the snapshots were structurally identical.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of planned operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// The forward operations, in execution order.
    pub fn forward_operations(&self) -> Vec<Operation> {
        self.operations.iter().map(|p| p.forward.clone()).collect()
    }

    /// The reverse operations, in downgrade execution order.
    pub fn reverse_operations(&self) -> Vec<Operation> {
        self.operations
            .iter()
            .rev()
            .map(|p| p.reverse.clone())
            .collect()
    }

    /// Human-readable summary of the diff.
    pub fn summary(&self) -> String {
        if self.operations.is_empty() {
            return "No changes".to_string();
        }
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for planned in &self.operations {
            let label = match &planned.forward {
                Operation::CreateSchema { .. } => "create schema",
                Operation::UpdateSchema { .. } => "update schema",
                Operation::UnarchiveSchema { .. } => "unarchive schema",
                Operation::ArchiveSchema { .. } => "archive schema",
                Operation::CreateField { .. } => "create field",
                Operation::UpdateField { .. } => "update field",
                Operation::UnarchiveField { .. } => "unarchive field",
                Operation::ArchiveField { .. } => "archive field",
                Operation::ReorderField { .. } => "reorder fields",
                Operation::CreateDropdown { .. } => "create dropdown",
                Operation::UpdateDropdown { .. } => "update dropdown",
                Operation::UnarchiveDropdown { .. } => "unarchive dropdown",
                Operation::ArchiveDropdown { .. } => "archive dropdown",
            };
            *counts.entry(label).or_default() += 1;
        }
        counts
            .iter()
            .map(|(label, n)| format!("{label} x{n}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Compares two snapshots and emits ordered, reversible operations.
pub struct SnapshotDiffer<'a> {
    /// Current state (usually the remote tenant).
    from: &'a Snapshot,
    /// Desired state (usually the declared model).
    to: &'a Snapshot,
    /// What the tenant permits.
    capabilities: TenantCapabilities,
}

impl<'a> SnapshotDiffer<'a> {
    /// Create a differ over two snapshots.
    pub fn new(from: &'a Snapshot, to: &'a Snapshot) -> Self {
        Self {
            from,
            to,
            capabilities: TenantCapabilities::default(),
        }
    }

    /// Set the tenant capabilities.
    pub fn with_capabilities(mut self, capabilities: TenantCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Compute the diff.
    ///
    /// Fails without emitting anything if the requested change touches an
    /// immutable property (a set unit label, or a warehouse rename the
    /// tenant does not permit).
    pub fn diff(&self) -> MigrateResult<DiffSet> {
        let mut planned = Vec::new();

        self.diff_dropdowns(&mut planned);
        self.diff_schemas(&mut planned)?;
        let planned = self.order_operations(planned);

        let set = DiffSet { operations: planned };
        debug!(operations = set.len(), summary = %set.summary(), "computed snapshot diff");
        Ok(set)
    }

    fn diff_dropdowns(&self, planned: &mut Vec<PlannedOperation>) {
        for (name, to_dd) in &self.to.dropdowns {
            match self.from.dropdowns.get(name) {
                None => {
                    planned.push(PlannedOperation::new(
                        Operation::CreateDropdown {
                            dropdown: to_dd.clone(),
                        },
                        Operation::ArchiveDropdown {
                            dropdown: name.clone(),
                        },
                    ));
                    if to_dd.archived {
                        planned.push(archive_dropdown(name, false));
                    }
                }
                Some(from_dd) => self.diff_matched_dropdown(name, from_dd, to_dd, planned),
            }
        }

        for (name, from_dd) in &self.from.dropdowns {
            if !self.to.dropdowns.contains_key(name) && !from_dd.archived {
                planned.push(archive_dropdown(name, false));
            }
        }
    }

    fn diff_matched_dropdown(
        &self,
        name: &SmolStr,
        from_dd: &DropdownDefinition,
        to_dd: &DropdownDefinition,
        planned: &mut Vec<PlannedOperation>,
    ) {
        if from_dd.archived && to_dd.archived {
            return;
        }
        if from_dd.archived && !to_dd.archived {
            planned.push(archive_dropdown(name, true));
        }
        if from_dd.options != to_dd.options {
            planned.push(PlannedOperation::new(
                Operation::UpdateDropdown {
                    dropdown: name.clone(),
                    options: Change::new(from_dd.options.clone(), to_dd.options.clone()),
                },
                Operation::UpdateDropdown {
                    dropdown: name.clone(),
                    options: Change::new(to_dd.options.clone(), from_dd.options.clone()),
                },
            ));
        }
        if !from_dd.archived && to_dd.archived {
            planned.push(archive_dropdown(name, false));
        }
    }

    fn diff_schemas(&self, planned: &mut Vec<PlannedOperation>) -> MigrateResult<()> {
        for (key, to_s) in &self.to.schemas {
            match self.from.schemas.get(key) {
                None => self.plan_schema_creation(to_s, planned)?,
                Some(from_s) => self.diff_matched_schema(key, from_s, to_s, planned)?,
            }
        }

        for (key, from_s) in &self.from.schemas {
            if !self.to.schemas.contains_key(key) && !from_s.archived {
                planned.push(archive_schema(key, false));
            }
        }
        Ok(())
    }

    /// Creation flow for a schema only present in `to`. The platform
    /// assigns the warehouse name from the display name, so a differing
    /// declared name needs a capability-gated rename follow-up.
    fn plan_schema_creation(
        &self,
        to_s: &SchemaDefinition,
        planned: &mut Vec<PlannedOperation>,
    ) -> MigrateResult<()> {
        let assigned = assigned_warehouse_name(&to_s.display_name);
        let declared = to_s.warehouse_name.clone();

        if assigned != declared && !self.capabilities.warehouse_renames {
            return Err(MigrationError::WarehouseRenameNotPermitted {
                schema: declared.to_string(),
                from: assigned.to_string(),
                to: declared.to_string(),
            });
        }

        planned.push(PlannedOperation::new(
            Operation::CreateSchema {
                schema: to_s.clone(),
            },
            Operation::ArchiveSchema {
                schema: assigned.clone(),
            },
        ));

        if assigned != declared {
            planned.push(PlannedOperation::new(
                Operation::UpdateSchema {
                    schema: assigned.clone(),
                    patch: SchemaPatch::rename(assigned.clone(), declared.clone()),
                },
                Operation::UpdateSchema {
                    schema: declared.clone(),
                    patch: SchemaPatch::rename(declared, assigned),
                },
            ));
        }

        if to_s.archived {
            planned.push(archive_schema(&to_s.warehouse_name, false));
        }
        Ok(())
    }

    fn diff_matched_schema(
        &self,
        key: &SmolStr,
        from_s: &SchemaDefinition,
        to_s: &SchemaDefinition,
        planned: &mut Vec<PlannedOperation>,
    ) -> MigrateResult<()> {
        self.check_field_immutability(key, from_s, to_s)?;

        if from_s.archived && to_s.archived {
            return Ok(());
        }
        if !from_s.archived && to_s.archived {
            planned.push(archive_schema(key, false));
            return Ok(());
        }
        if from_s.archived && !to_s.archived {
            planned.push(archive_schema(key, true));
        }

        let patch = SchemaPatch::between(from_s, to_s);
        if !patch.is_empty() {
            planned.push(PlannedOperation::new(
                Operation::UpdateSchema {
                    schema: key.clone(),
                    patch: patch.clone(),
                },
                Operation::UpdateSchema {
                    schema: key.clone(),
                    patch: patch.flip(),
                },
            ));
        }

        self.diff_fields(key, from_s, to_s, planned);
        Ok(())
    }

    /// Unit labels are immutable once set; surface the violation before any
    /// operation is emitted, even for fields that are otherwise skipped.
    fn check_field_immutability(
        &self,
        key: &SmolStr,
        from_s: &SchemaDefinition,
        to_s: &SchemaDefinition,
    ) -> MigrateResult<()> {
        for (name, to_f) in &to_s.fields {
            if let Some(from_f) = from_s.fields.get(name)
                && from_f.unit.is_some()
                && from_f.unit != to_f.unit
            {
                return Err(MigrationError::ImmutableUnit {
                    schema: key.to_string(),
                    field: name.to_string(),
                    current: from_f.unit.as_ref().map(ToString::to_string),
                    declared: to_f.unit.as_ref().map(ToString::to_string),
                });
            }
        }
        Ok(())
    }

    fn diff_fields(
        &self,
        key: &SmolStr,
        from_s: &SchemaDefinition,
        to_s: &SchemaDefinition,
        planned: &mut Vec<PlannedOperation>,
    ) {
        for (name, to_f) in &to_s.fields {
            match from_s.fields.get(name) {
                None => {
                    if to_f.archived {
                        continue;
                    }
                    let position = to_s.field_position(name).unwrap_or(0);
                    planned.push(PlannedOperation::new(
                        Operation::CreateField {
                            schema: key.clone(),
                            field: to_f.clone(),
                            position,
                        },
                        Operation::ArchiveField {
                            schema: key.clone(),
                            field: name.clone(),
                            position,
                        },
                    ));
                }
                Some(from_f) => {
                    if from_f.archived && to_f.archived {
                        continue;
                    }
                    if !from_f.archived && to_f.archived {
                        let position = from_s.field_position(name).unwrap_or(0);
                        planned.push(archive_field(key, name, position, false));
                        continue;
                    }
                    if from_f.archived && !to_f.archived {
                        let position = to_s.field_position(name).unwrap_or(0);
                        planned.push(archive_field(key, name, position, true));
                    }
                    let patch = FieldPatch::between(from_f, to_f);
                    if !patch.is_empty() {
                        planned.push(PlannedOperation::new(
                            Operation::UpdateField {
                                schema: key.clone(),
                                field: name.clone(),
                                patch: patch.clone(),
                            },
                            Operation::UpdateField {
                                schema: key.clone(),
                                field: name.clone(),
                                patch: patch.flip(),
                            },
                        ));
                    }
                }
            }
        }

        for (name, from_f) in &from_s.fields {
            if !to_s.fields.contains_key(name) && !from_f.archived {
                let position = from_s.field_position(name).unwrap_or(0);
                planned.push(archive_field(key, name, position, false));
            }
        }

        // Ordinal changes: emit one reorder when position-based creation,
        // unarchival, and archival alone cannot reproduce the target order.
        let from_order = from_s.field_order();
        let to_order = to_s.field_order();
        let mut created: Vec<(usize, SmolStr)> = Vec::new();
        let mut resurrected: Vec<(usize, SmolStr)> = Vec::new();
        for (name, to_f) in &to_s.fields {
            if to_f.archived {
                continue;
            }
            let position = to_s.field_position(name).unwrap_or(0);
            match from_s.fields.get(name) {
                None => created.push((position, name.clone())),
                Some(from_f) if from_f.archived => resurrected.push((position, name.clone())),
                Some(_) => {}
            }
        }
        created.sort();
        resurrected.sort();
        let mut predicted = from_order.clone();
        for (position, name) in created.into_iter().chain(resurrected) {
            let at = position.min(predicted.len());
            predicted.insert(at, name);
        }
        predicted.retain(|name| to_s.fields.get(name).is_some_and(|f| !f.archived));
        if predicted != to_order {
            planned.push(PlannedOperation::new(
                Operation::ReorderField {
                    schema: key.clone(),
                    order: to_order,
                },
                Operation::ReorderField {
                    schema: key.clone(),
                    order: from_order,
                },
            ));
        }
    }

    /// Dependency ordering pass.
    ///
    /// Creations are topologically sorted so referenced objects exist
    /// before anything references them; archives run referencing-first.
    /// A creation cycle between schemas is broken by stripping the link
    /// from the deferred field and emitting a follow-up link update once
    /// both schemas exist.
    fn order_operations(&self, mut planned: Vec<PlannedOperation>) -> Vec<PlannedOperation> {
        const SCHEMA: u8 = 0;
        const DROPDOWN: u8 = 1;

        // Index creations by declared identity key.
        let mut create_idx: BTreeMap<(u8, SmolStr), usize> = BTreeMap::new();
        for (i, p) in planned.iter().enumerate() {
            match &p.forward {
                Operation::CreateSchema { schema } => {
                    create_idx.insert((SCHEMA, schema.warehouse_name.clone()), i);
                }
                Operation::CreateDropdown { dropdown } => {
                    create_idx.insert((DROPDOWN, dropdown.name.clone()), i);
                }
                _ => {}
            }
        }

        // Reference edges among created objects only.
        let mut deps: BTreeMap<(u8, SmolStr), BTreeSet<(u8, SmolStr)>> = BTreeMap::new();
        for key in create_idx.keys() {
            deps.insert(key.clone(), BTreeSet::new());
        }
        for (key, &i) in &create_idx {
            if let Operation::CreateSchema { schema } = &planned[i].forward {
                let mut edges = BTreeSet::new();
                for field in schema.fields.values() {
                    if let Some(target) = &field.entity_link {
                        let node = (SCHEMA, target.clone());
                        if create_idx.contains_key(&node) {
                            edges.insert(node);
                        }
                    }
                    if let Some(target) = &field.dropdown_link {
                        let node = (DROPDOWN, target.clone());
                        if create_idx.contains_key(&node) {
                            edges.insert(node);
                        }
                    }
                }
                deps.insert(key.clone(), edges);
            }
        }

        // Kahn's algorithm with deterministic tie-breaking; cycles are
        // broken by deferring the offending links.
        let mut create_rank: BTreeMap<(u8, SmolStr), u32> = BTreeMap::new();
        let mut deferred: Vec<(SmolStr, SmolStr, SmolStr)> = Vec::new();
        let mut next_rank = 0u32;
        while !deps.is_empty() {
            let ready: Vec<_> = deps
                .iter()
                .filter(|(_, d)| d.is_empty())
                .map(|(k, _)| k.clone())
                .collect();

            if ready.is_empty() {
                // Only schema-to-schema links can cycle. Defer the links of
                // the lexicographically first schema still blocked.
                let (node, blocked) = deps
                    .iter()
                    .next()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .expect("deps is non-empty");
                let idx = create_idx[&node];
                if let Operation::CreateSchema { schema } = &mut planned[idx].forward {
                    for field in schema.fields.values_mut() {
                        if let Some(target) = field.entity_link.clone()
                            && blocked.contains(&(SCHEMA, target.clone()))
                        {
                            field.entity_link = None;
                            deferred.push((
                                schema.warehouse_name.clone(),
                                field.warehouse_name.clone(),
                                target,
                            ));
                        }
                    }
                }
                deps.get_mut(&node).expect("node is present").clear();
                continue;
            }

            for key in ready {
                create_rank.insert(key.clone(), next_rank);
                next_rank += 1;
                deps.remove(&key);
                for d in deps.values_mut() {
                    d.remove(&key);
                }
            }
        }

        for (schema, field, target) in deferred {
            debug!(schema = %schema, field = %field, target = %target,
                "deferring entity link to break a creation cycle");
            planned.push(PlannedOperation::new(
                Operation::UpdateField {
                    schema: schema.clone(),
                    field: field.clone(),
                    patch: FieldPatch::link(None, Some(target.clone())),
                },
                Operation::UpdateField {
                    schema,
                    field,
                    patch: FieldPatch::link(Some(target), None),
                },
            ));
        }

        // Archives run referencing-first: a schema whose field links to
        // another archived object must be archived before it.
        let archived_schemas: BTreeSet<SmolStr> = planned
            .iter()
            .filter_map(|p| match &p.forward {
                Operation::ArchiveSchema { schema } => Some(schema.clone()),
                _ => None,
            })
            .collect();
        let mut archive_deps: BTreeMap<SmolStr, BTreeSet<SmolStr>> = archived_schemas
            .iter()
            .map(|k| (k.clone(), BTreeSet::new()))
            .collect();
        for key in &archived_schemas {
            if let Some(schema) = self.from.schemas.get(key) {
                for target in schema.linked_schemas() {
                    if archived_schemas.contains(target) && target != key {
                        // `key` references `target`, so `target` waits.
                        archive_deps
                            .get_mut(target)
                            .expect("archived schema is present")
                            .insert(key.clone());
                    }
                }
            }
        }
        let mut archive_rank: BTreeMap<SmolStr, u32> = BTreeMap::new();
        let mut next_rank = 0u32;
        while !archive_deps.is_empty() {
            let mut ready: Vec<_> = archive_deps
                .iter()
                .filter(|(_, d)| d.is_empty())
                .map(|(k, _)| k.clone())
                .collect();
            if ready.is_empty() {
                // Mutually linked archived schemas; order is irrelevant
                // because links go stale together.
                ready = archive_deps.keys().cloned().collect();
            }
            for key in ready {
                archive_rank.insert(key.clone(), next_rank);
                next_rank += 1;
                archive_deps.remove(&key);
                for d in archive_deps.values_mut() {
                    d.remove(&key);
                }
            }
        }

        let sort_key = |p: &PlannedOperation| {
            let op = &p.forward;
            let dep = match op {
                Operation::CreateSchema { schema } => create_rank
                    .get(&(SCHEMA, schema.warehouse_name.clone()))
                    .copied()
                    .unwrap_or(0),
                Operation::CreateDropdown { dropdown } => create_rank
                    .get(&(DROPDOWN, dropdown.name.clone()))
                    .copied()
                    .unwrap_or(0),
                Operation::ArchiveSchema { schema } => {
                    archive_rank.get(schema).copied().unwrap_or(0)
                }
                _ => 0,
            };
            (op.rank(), dep, op.target().to_string(), op.position())
        };
        planned.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        planned
    }
}

fn archive_dropdown(name: &SmolStr, unarchive: bool) -> PlannedOperation {
    let archive = Operation::ArchiveDropdown {
        dropdown: name.clone(),
    };
    let restore = Operation::UnarchiveDropdown {
        dropdown: name.clone(),
    };
    if unarchive {
        PlannedOperation::new(restore, archive)
    } else {
        PlannedOperation::new(archive, restore)
    }
}

fn archive_schema(key: &SmolStr, unarchive: bool) -> PlannedOperation {
    let archive = Operation::ArchiveSchema {
        schema: key.clone(),
    };
    let restore = Operation::UnarchiveSchema {
        schema: key.clone(),
    };
    if unarchive {
        PlannedOperation::new(restore, archive)
    } else {
        PlannedOperation::new(archive, restore)
    }
}

fn archive_field(
    schema: &SmolStr,
    field: &SmolStr,
    position: usize,
    unarchive: bool,
) -> PlannedOperation {
    let archive = Operation::ArchiveField {
        schema: schema.clone(),
        field: field.clone(),
        position,
    };
    let restore = Operation::UnarchiveField {
        schema: schema.clone(),
        field: field.clone(),
        position,
    };
    if unarchive {
        PlannedOperation::new(restore, archive)
    } else {
        PlannedOperation::new(archive, restore)
    }
}
