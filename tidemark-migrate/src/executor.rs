//! The migration executor: drives a revision walk against the remote
//! platform.
//!
//! The executor is logically single-threaded per tenant. Operations run
//! strictly in sequence because later operations may depend on the visible
//! effects of earlier ones and the platform has no multi-operation
//! transaction. Progress is durable at revision boundaries: the tenant
//! pointer moves after each fully-applied revision, never mid-revision, so
//! a retry resumes from the last revision that completed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::{RemoteError, RemoteResult, TenantClient, TenantPointer};
use crate::error::{MigrateResult, MigrationError};
use crate::operation::Operation;
use crate::timeline::{Direction, RevisionWalk};

/// Bounded exponential backoff for transient remote failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on the delay between retries.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum retry attempts.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay ceiling.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before the given retry attempt (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(ms.min(self.max_delay.as_millis() as f64) as u64)
    }
}

/// Shared cancellation signal, checked between operations.
///
/// Cancellation is cooperative and never interrupts an in-flight operation;
/// the walk stops at the next operation boundary with the pointer still at
/// the last fully-applied revision.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new non-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// One revision that was fully applied during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRevision {
    /// Revision id.
    pub revision_id: String,
    /// Revision description.
    pub description: String,
    /// Number of operations it contained.
    pub operation_count: usize,
}

/// How a walk ended.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// Every revision in the walk was applied.
    Completed,
    /// An operation failed; everything before it remains applied.
    Failed {
        /// Revision the failure occurred in.
        revision_id: String,
        /// Operations of that revision that had already succeeded.
        operations_applied: usize,
        /// The operation the platform rejected. `None` means the pointer
        /// write at the revision boundary failed instead.
        failed_operation: Option<Operation>,
        /// The platform's error.
        error: RemoteError,
    },
    /// Cancellation was requested between operations.
    Cancelled {
        /// Revision that was in flight, if any.
        revision_id: Option<String>,
    },
}

/// What an executor run did, revision by revision.
///
/// Partial progress is normal: the platform has no multi-operation
/// transaction, so a failed walk leaves already-applied operations applied.
/// The report always names the last fully-applied revision (via
/// `final_pointer`) and, on failure, the exact operation that failed.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Orientation of the walk.
    pub direction: Direction,
    /// Pointer position when the walk started.
    pub started_at: String,
    /// Revisions applied in full, in order.
    pub applied: Vec<AppliedRevision>,
    /// How the walk ended.
    pub outcome: ExecutionOutcome,
    /// Pointer position after the walk: the last fully-applied revision.
    pub final_pointer: String,
}

impl ExecutionReport {
    /// Whether every revision was applied.
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Completed)
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        match &self.outcome {
            ExecutionOutcome::Completed => format!(
                "{}: {} revision(s) applied, now at '{}'",
                self.direction,
                self.applied.len(),
                self.final_pointer
            ),
            ExecutionOutcome::Failed {
                revision_id,
                operations_applied,
                failed_operation,
                error,
            } => {
                let what = failed_operation
                    .as_ref()
                    .map(|op| op.to_string())
                    .unwrap_or_else(|| "pointer write".to_string());
                format!(
                    "{}: stopped in revision '{}' after {} operation(s); {} failed ({}); pointer at '{}'",
                    self.direction,
                    revision_id,
                    operations_applied,
                    what,
                    error,
                    self.final_pointer
                )
            }
            ExecutionOutcome::Cancelled { revision_id } => format!(
                "{}: cancelled{}; pointer at '{}'",
                self.direction,
                revision_id
                    .as_ref()
                    .map(|id| format!(" during revision '{id}'"))
                    .unwrap_or_default(),
                self.final_pointer
            ),
        }
    }
}

/// Applies revision walks against a tenant.
pub struct MigrationExecutor<'a, C: TenantClient> {
    client: &'a C,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<'a, C: TenantClient> MigrationExecutor<'a, C> {
    /// Create an executor over a tenant client.
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute a walk.
    ///
    /// Reads the tenant pointer first and verifies it matches the walk's
    /// expected start; a mismatch means another operator moved the tenant,
    /// and the walk aborts before any mutation (optimistic concurrency
    /// guard). Operation failures end the walk but are reported, not
    /// propagated: the returned report carries the typed remote error
    /// alongside the partial progress.
    pub async fn execute(&self, walk: &RevisionWalk) -> MigrateResult<ExecutionReport> {
        let pointer = self
            .with_retry_loop(|| self.client.read_pointer())
            .await?
            .ok_or(MigrationError::PointerMissing)?;

        if pointer.revision_id != walk.expected_start {
            return Err(MigrationError::PointerDrift {
                expected: walk.expected_start.clone(),
                actual: pointer.revision_id,
            });
        }

        info!(
            direction = %walk.direction,
            revisions = walk.steps.len(),
            operations = walk.operation_count(),
            from = %walk.expected_start,
            "starting migration walk"
        );

        let mut report = ExecutionReport {
            direction: walk.direction,
            started_at: walk.expected_start.clone(),
            applied: Vec::new(),
            outcome: ExecutionOutcome::Completed,
            final_pointer: walk.expected_start.clone(),
        };

        for step in &walk.steps {
            if self.cancel.is_cancelled() {
                warn!(revision = %step.revision_id, "walk cancelled before revision");
                report.outcome = ExecutionOutcome::Cancelled { revision_id: None };
                return Ok(report);
            }

            debug!(revision = %step.revision_id, operations = step.operations.len(),
                "applying revision");

            for (index, operation) in step.operations.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    warn!(revision = %step.revision_id, "walk cancelled between operations");
                    report.outcome = ExecutionOutcome::Cancelled {
                        revision_id: Some(step.revision_id.clone()),
                    };
                    return Ok(report);
                }

                debug!(op = %operation, "executing operation");
                if let Err(error) = self.apply_operation(operation).await {
                    warn!(op = %operation, %error, "operation failed; stopping walk");
                    report.outcome = ExecutionOutcome::Failed {
                        revision_id: step.revision_id.clone(),
                        operations_applied: index,
                        failed_operation: Some(operation.clone()),
                        error,
                    };
                    return Ok(report);
                }
            }

            // The revision boundary is the unit of durable progress.
            let next = TenantPointer::at(step.pointer_after.clone());
            if let Err(error) = self
                .with_retry_loop(|| self.client.write_pointer(&next))
                .await
            {
                warn!(revision = %step.revision_id, %error, "pointer write failed");
                report.outcome = ExecutionOutcome::Failed {
                    revision_id: step.revision_id.clone(),
                    operations_applied: step.operations.len(),
                    failed_operation: None,
                    error,
                };
                return Ok(report);
            }

            report.final_pointer = step.pointer_after.clone();
            report.applied.push(AppliedRevision {
                revision_id: step.revision_id.clone(),
                description: step.description.clone(),
                operation_count: step.operations.len(),
            });
        }

        info!(applied = report.applied.len(), pointer = %report.final_pointer,
            "migration walk complete");
        Ok(report)
    }

    /// Dispatch one operation to the client, retrying transient failures.
    async fn apply_operation(&self, operation: &Operation) -> RemoteResult<()> {
        self.with_retry_loop(|| self.dispatch(operation)).await
    }

    async fn dispatch(&self, operation: &Operation) -> RemoteResult<()> {
        match operation {
            Operation::CreateDropdown { dropdown } => self.client.create_dropdown(dropdown).await,
            Operation::UpdateDropdown { dropdown, options } => {
                self.client
                    .replace_dropdown_options(dropdown, &options.to)
                    .await
            }
            Operation::UnarchiveDropdown { dropdown } => {
                self.client.set_dropdown_archived(dropdown, false).await
            }
            Operation::ArchiveDropdown { dropdown } => {
                self.client.set_dropdown_archived(dropdown, true).await
            }
            Operation::CreateSchema { schema } => self.client.create_schema(schema).await,
            Operation::UpdateSchema { schema, patch } => {
                self.client.update_schema(schema, patch).await
            }
            Operation::UnarchiveSchema { schema } => {
                self.client.set_schema_archived(schema, false).await
            }
            Operation::ArchiveSchema { schema } => {
                self.client.set_schema_archived(schema, true).await
            }
            Operation::CreateField {
                schema,
                field,
                position,
            } => self.client.create_field(schema, field, *position).await,
            Operation::UpdateField {
                schema,
                field,
                patch,
            } => self.client.update_field(schema, field, patch).await,
            Operation::UnarchiveField {
                schema,
                field,
                position,
            } => {
                self.client
                    .set_field_archived(schema, field, false, *position)
                    .await
            }
            Operation::ArchiveField {
                schema,
                field,
                position,
            } => {
                self.client
                    .set_field_archived(schema, field, true, *position)
                    .await
            }
            Operation::ReorderField { schema, order } => {
                self.client.reorder_fields(schema, order).await
            }
        }
    }

    /// Run a remote call, retrying transient failures with bounded backoff.
    /// Non-transient failures propagate immediately.
    async fn with_retry_loop<T, F, Fut>(&self, call: F) -> RemoteResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(%error, attempt, delay_ms = delay.as_millis() as u64,
                        "transient remote failure; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_backoff() {
        let policy = RetryPolicy::new()
            .initial_delay(Duration::from_millis(100))
            .backoff_multiplier(2.0)
            .max_delay(Duration::from_millis(300));

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        // Capped at max_delay.
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(300));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(300));
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_report_summary_completed() {
        let report = ExecutionReport {
            direction: Direction::Upgrade,
            started_at: "root".to_string(),
            applied: vec![AppliedRevision {
                revision_id: "r1".to_string(),
                description: "add dough".to_string(),
                operation_count: 1,
            }],
            outcome: ExecutionOutcome::Completed,
            final_pointer: "r1".to_string(),
        };
        assert!(report.is_complete());
        assert!(report.summary().contains("1 revision(s)"));
        assert!(report.summary().contains("r1"));
    }

    #[test]
    fn test_report_summary_failed_names_operation() {
        let report = ExecutionReport {
            direction: Direction::Upgrade,
            started_at: "root".to_string(),
            applied: vec![],
            outcome: ExecutionOutcome::Failed {
                revision_id: "r1".to_string(),
                operations_applied: 2,
                failed_operation: Some(Operation::ArchiveSchema {
                    schema: "dough".into(),
                }),
                error: RemoteError::validation("records still reference it"),
            },
            final_pointer: "root".to_string(),
        };
        let summary = report.summary();
        assert!(summary.contains("archive schema 'dough'"));
        assert!(summary.contains("2 operation(s)"));
        assert!(summary.contains("pointer at 'root'"));
    }
}
