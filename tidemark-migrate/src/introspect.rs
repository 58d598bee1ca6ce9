//! Remote state introspection.
//!
//! Builds a registry-shaped [`Snapshot`] from the remote platform's live
//! state so the diff engine can compare it against the declared model. The
//! reader is the only component that looks at remote schema objects; the
//! network itself stays behind the [`TenantClient`] boundary.

use tracing::debug;

use tidemark_schema::Snapshot;

use crate::client::TenantClient;
use crate::error::MigrateResult;

/// Reads the remote tenant's schema surface into a snapshot.
pub struct RemoteStateReader<'a, C: TenantClient> {
    client: &'a C,
    include_archived: bool,
}

impl<'a, C: TenantClient> RemoteStateReader<'a, C> {
    /// Create a reader over a tenant client. Archived objects are filtered
    /// out by default; the platform retains them, but they are invisible to
    /// consumers of the active schema surface.
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            include_archived: false,
        }
    }

    /// Include archived schemas, fields, and dropdowns in the snapshot.
    /// The diff engine needs them to tell "create" apart from "unarchive".
    pub fn include_archived(mut self, include: bool) -> Self {
        self.include_archived = include;
        self
    }

    /// Fetch the tenant's current schema surface.
    pub async fn snapshot(&self) -> MigrateResult<Snapshot> {
        let mut snapshot = Snapshot::new();

        for schema in self.client.fetch_schemas().await? {
            snapshot.add_schema(schema);
        }
        for dropdown in self.client.fetch_dropdowns().await? {
            snapshot.add_dropdown(dropdown);
        }

        let snapshot = if self.include_archived {
            snapshot
        } else {
            snapshot.active()
        };

        let (schemas, dropdowns) = snapshot.counts();
        debug!(
            schemas,
            dropdowns,
            include_archived = self.include_archived,
            "read remote schema surface"
        );
        Ok(snapshot)
    }
}
