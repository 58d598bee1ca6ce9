//! The remote platform boundary.
//!
//! The core never issues raw network calls. Everything it needs from the
//! platform is expressed by [`TenantClient`], a capability-style trait over
//! the platform's schema-object API and the tenant's revision pointer.
//! Implementations translate these calls into whatever wire protocol the
//! platform speaks; the in-memory implementation in [`crate::memory`] backs
//! tests and local rehearsal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use tidemark_schema::{DropdownDefinition, FieldDefinition, SchemaDefinition};

use crate::operation::{FieldPatch, SchemaPatch};

/// Result type for remote platform calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Classification of a remote failure.
///
/// Transient kinds are safe to retry with backoff; the rest indicate a
/// request the platform will keep rejecting and must abort the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// The platform throttled the call.
    RateLimited,
    /// The platform was temporarily unreachable or returned a 5xx.
    Unavailable,
    /// The call timed out.
    Timeout,
    /// The platform rejected the request payload.
    Validation,
    /// The credentials lack the required permission.
    Permission,
    /// The request conflicts with current remote state.
    Conflict,
    /// The addressed object does not exist remotely.
    NotFound,
}

impl RemoteErrorKind {
    /// Whether a failure of this kind may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Unavailable | Self::Timeout)
    }
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Timeout => write!(f, "timeout"),
            Self::Validation => write!(f, "validation"),
            Self::Permission => write!(f, "permission"),
            Self::Conflict => write!(f, "conflict"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

/// A failure reported by the remote platform for a single call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("remote operation failed ({kind}): {message}")]
pub struct RemoteError {
    /// Failure classification.
    pub kind: RemoteErrorKind,
    /// Platform-provided detail.
    pub message: String,
}

impl RemoteError {
    /// Create a new remote error.
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Validation, message)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Conflict, message)
    }

    /// Create a rate-limited error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::RateLimited, message)
    }

    /// Whether this failure may succeed on retry.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// The remote marker of which revision a tenant currently reflects.
///
/// The pointer lives inside the platform, not locally, so every operator
/// acting on the tenant observes the same current position. It is
/// initialized to the root revision id at bootstrap and moved only by a
/// successful executor run, one revision boundary at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPointer {
    /// Id of the revision the tenant currently reflects.
    pub revision_id: String,
}

impl TenantPointer {
    /// Create a pointer at the given revision.
    pub fn at(revision_id: impl Into<String>) -> Self {
        Self {
            revision_id: revision_id.into(),
        }
    }
}

/// Per-tenant permissions that affect what the diff engine may emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TenantCapabilities {
    /// Whether the tenant permits renaming warehouse names after creation.
    pub warehouse_renames: bool,
}

impl TenantCapabilities {
    /// Create a capability set with nothing permitted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Permit warehouse renames.
    pub fn warehouse_renames(mut self, allowed: bool) -> Self {
        self.warehouse_renames = allowed;
        self
    }
}

/// Capability-style client for a single tenant of the remote platform.
///
/// All calls address objects by their identity keys (schema and field
/// warehouse names, dropdown display names). Archival is a flag flip, never
/// a delete: the platform retains archived objects indefinitely, which is
/// what makes unarchiving (and therefore downgrades) possible.
#[async_trait]
pub trait TenantClient: Send + Sync {
    /// Fetch every schema the tenant holds, archived included.
    async fn fetch_schemas(&self) -> RemoteResult<Vec<SchemaDefinition>>;

    /// Fetch every dropdown the tenant holds, archived included.
    async fn fetch_dropdowns(&self) -> RemoteResult<Vec<DropdownDefinition>>;

    /// Create a schema with its fields. The platform assigns the warehouse
    /// name from the display name; a differing declared name requires a
    /// follow-up rename via [`update_schema`](Self::update_schema).
    async fn create_schema(&self, schema: &SchemaDefinition) -> RemoteResult<()>;

    /// Apply a property patch to a schema.
    async fn update_schema(&self, schema: &str, patch: &SchemaPatch) -> RemoteResult<()>;

    /// Flip a schema's archived flag.
    async fn set_schema_archived(&self, schema: &str, archived: bool) -> RemoteResult<()>;

    /// Create a field on a schema at the given position among active fields.
    async fn create_field(
        &self,
        schema: &str,
        field: &FieldDefinition,
        position: usize,
    ) -> RemoteResult<()>;

    /// Apply a property patch to a field.
    async fn update_field(
        &self,
        schema: &str,
        field: &str,
        patch: &FieldPatch,
    ) -> RemoteResult<()>;

    /// Flip a field's archived flag. When unarchiving, `position` is where
    /// the field re-enters the active order.
    async fn set_field_archived(
        &self,
        schema: &str,
        field: &str,
        archived: bool,
        position: usize,
    ) -> RemoteResult<()>;

    /// Reorder a schema's fields. `order` lists active fields in their
    /// target sequence; fields not listed keep their relative order after
    /// the listed ones.
    async fn reorder_fields(&self, schema: &str, order: &[SmolStr]) -> RemoteResult<()>;

    /// Create a dropdown with its option list.
    async fn create_dropdown(&self, dropdown: &DropdownDefinition) -> RemoteResult<()>;

    /// Replace a dropdown's option list wholesale. The platform does not
    /// accept partial option edits.
    async fn replace_dropdown_options(
        &self,
        dropdown: &str,
        options: &[SmolStr],
    ) -> RemoteResult<()>;

    /// Flip a dropdown's archived flag.
    async fn set_dropdown_archived(&self, dropdown: &str, archived: bool) -> RemoteResult<()>;

    /// Read the tenant's revision pointer, if initialized.
    async fn read_pointer(&self) -> RemoteResult<Option<TenantPointer>>;

    /// Write the tenant's revision pointer.
    async fn write_pointer(&self, pointer: &TenantPointer) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::rate_limited("slow down").is_transient());
        assert!(RemoteError::new(RemoteErrorKind::Unavailable, "503").is_transient());
        assert!(!RemoteError::validation("bad prefix").is_transient());
        assert!(!RemoteError::not_found("no such schema").is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = RemoteError::validation("prefix already in use");
        assert_eq!(
            err.to_string(),
            "remote operation failed (validation): prefix already in use"
        );
    }

    #[test]
    fn test_pointer() {
        let pointer = TenantPointer::at("abc123");
        assert_eq!(pointer.revision_id, "abc123");
    }
}
