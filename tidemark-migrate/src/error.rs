//! Error types for the migration engine.

use thiserror::Error;

use crate::client::RemoteError;
use crate::timeline::Direction;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while planning or running migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The declared model is contradictory. Raised before anything is sent
    /// to the remote platform.
    #[error(transparent)]
    Model(#[from] tidemark_schema::SchemaError),

    /// A diff tried to change an immutable unit label.
    #[error(
        "unit label of '{schema}.{field}' is immutable: currently {current:?}, declared {declared:?}"
    )]
    ImmutableUnit {
        schema: String,
        field: String,
        current: Option<String>,
        declared: Option<String>,
    },

    /// A diff requires a warehouse rename the tenant does not permit.
    #[error(
        "tenant does not permit warehouse renames: schema '{schema}' would be renamed from '{from}' to '{to}'"
    )]
    WarehouseRenameNotPermitted {
        schema: String,
        from: String,
        to: String,
    },

    /// The tenant pointer moved since the walk was resolved. Another
    /// operator migrated the tenant; re-plan against the fresh pointer.
    #[error("tenant pointer drift: expected revision '{expected}', found '{actual}'")]
    PointerDrift { expected: String, actual: String },

    /// The tenant pointer has never been initialized.
    #[error("tenant pointer is not initialized; bootstrap the environment first")]
    PointerMissing,

    /// A revision id was not found in the local chain.
    #[error("unknown revision '{0}'")]
    UnknownRevision(String),

    /// A relative descriptor reached past the root.
    #[error("offset {offset} is out of range: head is only {depth} revisions from the root")]
    OffsetOutOfRange { offset: usize, depth: usize },

    /// The revision store holds no revisions.
    #[error("revision history is empty; bootstrap the environment first")]
    EmptyTimeline,

    /// No revision without a parent was found.
    #[error("no root revision found: exactly one revision must have no parent")]
    MissingRoot,

    /// More than one revision without a parent was found.
    #[error("multiple root revisions found: {0:?}")]
    MultipleRoots(Vec<String>),

    /// The same revision id appears more than once.
    #[error("revision id '{0}' appears more than once")]
    DuplicateRevision(String),

    /// Two revisions claim the same parent.
    #[error("revision '{parent}' has multiple children: {children:?}")]
    ForkedHistory {
        parent: String,
        children: Vec<String>,
    },

    /// A revision is not reachable from the root.
    #[error("revision '{0}' is not reachable from the root")]
    DisconnectedRevision(String),

    /// A new revision's parent is not the current head.
    #[error("new revision's parent {parent:?} is not the current head '{head}'")]
    NotAtHead {
        parent: Option<String>,
        head: String,
    },

    /// The diff between local model and remote state is empty.
    #[error("nothing to revise: the remote tenant already matches the declared model")]
    NothingToRevise,

    /// The tenant already sits at the requested revision.
    #[error("already at revision '{0}'; nothing to apply")]
    NothingToApply(String),

    /// The requested direction does not match the target's position.
    #[error("requested {requested} but the target lies in the {actual} direction")]
    DirectionMismatch {
        requested: Direction,
        actual: Direction,
    },

    /// The remote platform rejected a call.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The revision store failed.
    #[error("revision store error: {0}")]
    Store(String),
}

impl MigrationError {
    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether re-planning against fresh remote state can resolve this
    /// error without manual intervention.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PointerDrift { .. } | Self::NothingToRevise | Self::NothingToApply(_)
        )
    }
}
