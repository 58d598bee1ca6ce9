//! # tidemark-migrate
//!
//! Migration engine for Tidemark.
//!
//! This crate keeps a code-defined schema model (from `tidemark-schema`)
//! synchronized with a remote, mutable schema store reachable only through
//! a network API. It provides:
//! - Structural diffing between the declared model and live remote state
//! - A strictly linear, replayable revision history
//! - An upgrade/downgrade executor with revision-boundary durability
//! - An optimistic concurrency guard over the remote tenant pointer
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐    ┌──────────────────┐    ┌────────────────┐
//! │ Model Registry │───▶│  Snapshot Differ │◀───│ Remote Reader  │
//! └────────────────┘    └──────────────────┘    └────────────────┘
//!                                │                       ▲
//!                                ▼                       │
//!                       ┌────────────────┐    ┌──────────────────┐
//!                       │ Revision Chain │───▶│    Executor      │
//!                       └────────────────┘    └──────────────────┘
//!                                                        │
//!                                                        ▼
//!                                              ┌──────────────────┐
//!                                              │  TenantPointer   │
//!                                              └──────────────────┘
//! ```
//!
//! The remote platform offers no multi-operation transactions and retains
//! archived objects forever, so the engine archives instead of deleting,
//! executes strictly in sequence, and records durable progress at revision
//! boundaries via a pointer held inside the platform itself.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tidemark_migrate::{
//!     Direction, MigrationConfig, MigrationEngine, TargetDescriptor,
//! };
//! use tidemark_schema::ModelRegistry;
//!
//! async fn sync(registry: &ModelRegistry) -> Result<(), Box<dyn std::error::Error>> {
//!     let client = /* your platform client */;
//!     let store = /* your revision store */;
//!     let engine = MigrationEngine::new(MigrationConfig::new(), client, store);
//!
//!     engine.bootstrap().await?;
//!     let revision = engine.plan(registry, "add dough schema").await?;
//!     let report = engine
//!         .run(&TargetDescriptor::Head, Direction::Upgrade)
//!         .await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod memory;
pub mod operation;
pub mod revision;
pub mod timeline;

// Re-exports
pub use client::{
    RemoteError, RemoteErrorKind, RemoteResult, TenantCapabilities, TenantClient, TenantPointer,
};
pub use diff::{assigned_warehouse_name, DiffSet, SnapshotDiffer};
pub use engine::{MigrationConfig, MigrationEngine, MigrationStatus};
pub use error::{MigrateResult, MigrationError};
pub use executor::{
    AppliedRevision, CancellationToken, ExecutionOutcome, ExecutionReport, MigrationExecutor,
    RetryPolicy,
};
pub use introspect::RemoteStateReader;
pub use memory::{InMemoryRevisionStore, InMemoryTenant};
pub use operation::{Change, FieldPatch, Operation, PlannedOperation, SchemaPatch};
pub use revision::{Revision, RevisionStore};
pub use timeline::{Direction, RevisionTimeline, RevisionWalk, TargetDescriptor, WalkStep};
