//! The migration engine: the operator-facing surface.
//!
//! Two verbs drive everything. `plan` runs the diff engine against live
//! remote state and writes a new revision at the head of the chain; `run`
//! resolves a revision descriptor and drives the executor through the walk.
//! `bootstrap` initializes a fresh environment (root revision + tenant
//! pointer) and `status` reports where the tenant sits relative to head.

use tracing::{debug, info};

use tidemark_schema::ModelRegistry;

use crate::client::{TenantCapabilities, TenantClient, TenantPointer};
use crate::diff::SnapshotDiffer;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::{CancellationToken, ExecutionOutcome, ExecutionReport, MigrationExecutor, RetryPolicy};
use crate::introspect::RemoteStateReader;
use crate::revision::{Revision, RevisionStore};
use crate::timeline::{Direction, RevisionTimeline, TargetDescriptor};

/// Configuration for the migration engine.
#[derive(Debug, Clone, Default)]
pub struct MigrationConfig {
    /// Resolve and report without touching the remote platform.
    pub dry_run: bool,
    /// What the tenant permits the diff engine to emit.
    pub capabilities: TenantCapabilities,
    /// Retry behavior for transient remote failures.
    pub retry: RetryPolicy,
}

impl MigrationConfig {
    /// Create a configuration with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the tenant capabilities.
    pub fn capabilities(mut self, capabilities: TenantCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Where a tenant sits relative to the local revision chain.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Revision the tenant currently reflects.
    pub current: String,
    /// Head of the local chain.
    pub head: String,
    /// Revisions between the tenant's position and head, oldest first.
    pub pending: Vec<String>,
}

impl MigrationStatus {
    /// Whether the tenant reflects the head revision.
    pub fn is_current(&self) -> bool {
        self.pending.is_empty()
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        if self.is_current() {
            format!("up to date at '{}'", self.current)
        } else {
            format!(
                "at '{}', {} revision(s) behind head '{}'",
                self.current,
                self.pending.len(),
                self.head
            )
        }
    }
}

/// The migration engine for one tenant.
pub struct MigrationEngine<C: TenantClient, S: RevisionStore> {
    config: MigrationConfig,
    client: C,
    store: S,
    cancel: CancellationToken,
}

impl<C: TenantClient, S: RevisionStore> MigrationEngine<C, S> {
    /// Create an engine over a tenant client and a revision store.
    pub fn new(config: MigrationConfig, client: C, store: S) -> Self {
        Self {
            config,
            client,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that cancels an in-flight `run` at its next operation
    /// boundary. Clone it into whatever task watches for shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The tenant client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Initialize a fresh environment: write a root revision if the store
    /// is empty and point the tenant at the root. Idempotent.
    pub async fn bootstrap(&self) -> MigrateResult<Revision> {
        let revisions = self.store.load_all().await?;
        let root = if revisions.is_empty() {
            let root = Revision::root("environment bootstrap");
            self.store.append(&root).await?;
            info!(revision = %root.id, "initialized revision history");
            root
        } else {
            RevisionTimeline::from_revisions(revisions)?.root().clone()
        };

        if self.client.read_pointer().await?.is_none() {
            self.client
                .write_pointer(&TenantPointer::at(root.id.clone()))
                .await?;
            info!(revision = %root.id, "initialized tenant pointer");
        }
        Ok(root)
    }

    /// Diff the declared model against live remote state and write a new
    /// revision at the head of the chain.
    ///
    /// An empty diff is rejected as [`MigrationError::NothingToRevise`]
    /// rather than polluting the history with a no-op revision.
    pub async fn plan(
        &self,
        registry: &ModelRegistry,
        description: &str,
    ) -> MigrateResult<Revision> {
        let local = registry.snapshot()?;
        let remote = RemoteStateReader::new(&self.client)
            .include_archived(true)
            .snapshot()
            .await?;

        let diff = SnapshotDiffer::new(&remote, &local)
            .with_capabilities(self.config.capabilities)
            .diff()?;
        if diff.is_empty() {
            return Err(MigrationError::NothingToRevise);
        }
        debug!(summary = %diff.summary(), "planned changes");

        let mut timeline = self.load_timeline().await?;
        let revision = Revision::new(timeline.head().id.clone(), description, &diff.operations);
        timeline.append(revision.clone())?;
        self.store.append(&revision).await?;

        info!(revision = %revision.id, operations = revision.operation_count(),
            "wrote revision");
        Ok(revision)
    }

    /// Resolve a descriptor and drive the executor through the walk.
    ///
    /// The walk's orientation is computed from the tenant's current
    /// position; a `direction` that disagrees with it is rejected rather
    /// than reinterpreted.
    pub async fn run(
        &self,
        descriptor: &TargetDescriptor,
        direction: Direction,
    ) -> MigrateResult<ExecutionReport> {
        let timeline = self.load_timeline().await?;
        let pointer = self
            .client
            .read_pointer()
            .await?
            .ok_or(MigrationError::PointerMissing)?;

        let target = timeline.resolve(descriptor)?;
        let walk = timeline.walk(&pointer.revision_id, &target.id)?;
        if walk.direction != direction {
            return Err(MigrationError::DirectionMismatch {
                requested: direction,
                actual: walk.direction,
            });
        }

        if self.config.dry_run {
            info!(target = %target.id, %direction, "dry run; not executing");
            return Ok(ExecutionReport {
                direction: walk.direction,
                started_at: walk.expected_start.clone(),
                applied: Vec::new(),
                outcome: ExecutionOutcome::Completed,
                final_pointer: walk.expected_start,
            });
        }

        MigrationExecutor::new(&self.client)
            .with_retry(self.config.retry.clone())
            .with_cancellation(self.cancel.clone())
            .execute(&walk)
            .await
    }

    /// Report where the tenant sits relative to the local chain.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let timeline = self.load_timeline().await?;
        let pointer = self
            .client
            .read_pointer()
            .await?
            .ok_or(MigrationError::PointerMissing)?;

        let position = timeline.position(&pointer.revision_id)?;
        let pending = timeline
            .iter()
            .skip(position + 1)
            .map(|r| r.id.clone())
            .collect();

        Ok(MigrationStatus {
            current: pointer.revision_id,
            head: timeline.head().id.clone(),
            pending,
        })
    }

    async fn load_timeline(&self) -> MigrateResult<RevisionTimeline> {
        RevisionTimeline::from_revisions(self.store.load_all().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = MigrationConfig::new()
            .dry_run(true)
            .capabilities(TenantCapabilities::new().warehouse_renames(true))
            .retry(RetryPolicy::new().max_retries(5));

        assert!(config.dry_run);
        assert!(config.capabilities.warehouse_renames);
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_status_summary() {
        let status = MigrationStatus {
            current: "r1".to_string(),
            head: "r3".to_string(),
            pending: vec!["r2".to_string(), "r3".to_string()],
        };
        assert!(!status.is_current());
        assert!(status.summary().contains("2 revision(s) behind"));

        let current = MigrationStatus {
            current: "r3".to_string(),
            head: "r3".to_string(),
            pending: vec![],
        };
        assert!(current.is_current());
    }
}
