//! Revisions: immutable nodes in the migration history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MigrateResult;
use crate::operation::{Operation, PlannedOperation};

/// One step in the migration history.
///
/// A revision is immutable once written. It carries the forward operations
/// that move a tenant from its parent revision to itself, and the reverse
/// operations (already in reversed order) that undo them. All revisions
/// form a single linked list through `parent_id`: one root, one head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Generated revision id.
    pub id: String,
    /// Parent revision id; `None` only for the root.
    pub parent_id: Option<String>,
    /// Human description of the change.
    pub description: String,
    /// Operations that apply this revision, in execution order.
    pub forward: Vec<Operation>,
    /// Operations that undo this revision, in execution order (the reverse
    /// of each forward operation, sequenced last-forward-first).
    pub reverse: Vec<Operation>,
    /// When the revision was authored.
    pub created_at: DateTime<Utc>,
}

impl Revision {
    /// Generate a fresh revision id.
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()[..12].to_string()
    }

    /// Create a revision from the diff engine's planned operations.
    pub fn new(
        parent_id: impl Into<String>,
        description: impl Into<String>,
        planned: &[PlannedOperation],
    ) -> Self {
        Self {
            id: Self::new_id(),
            parent_id: Some(parent_id.into()),
            description: description.into(),
            forward: planned.iter().map(|p| p.forward.clone()).collect(),
            reverse: planned.iter().rev().map(|p| p.reverse.clone()).collect(),
            created_at: Utc::now(),
        }
    }

    /// Create the root revision for a fresh environment. It carries no
    /// operations; it only anchors the chain and the tenant pointer.
    pub fn root(description: impl Into<String>) -> Self {
        Self {
            id: Self::new_id(),
            parent_id: None,
            description: description.into(),
            forward: Vec::new(),
            reverse: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Whether this is the root revision.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Number of forward operations.
    pub fn operation_count(&self) -> usize {
        self.forward.len()
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, {} ops)",
            self.id,
            self.description,
            self.forward.len()
        )
    }
}

/// Persistence boundary for revisions.
///
/// The core needs only key-value style access: load everything, look one up
/// by id, and append a new head. No file format or directory layout is
/// mandated; implementations may keep revisions in files, a database, or
/// memory.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Load every stored revision, in any order.
    async fn load_all(&self) -> MigrateResult<Vec<Revision>>;

    /// Load a revision by id.
    async fn get(&self, id: &str) -> MigrateResult<Option<Revision>>;

    /// Append a newly authored revision.
    async fn append(&self, revision: &Revision) -> MigrateResult<()>;
}
