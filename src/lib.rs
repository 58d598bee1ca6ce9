//! # Tidemark
//!
//! Declarative schema management and migrations for remote tenant
//! platforms.
//!
//! Tidemark keeps a code-defined schema model synchronized with a remote,
//! mutable schema store reachable only through a network API:
//! - Declare schemas, fields, and dropdowns in code
//! - Diff the declaration against the tenant's live state
//! - Persist the difference as a linear, replayable revision history
//! - Apply and revert revisions with revision-boundary durability and an
//!   optimistic concurrency guard over the remote position pointer
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tidemark::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ModelRegistry::new().with_schema(
//!         SchemaDefinition::new("dough", "Dough", "DGH", SchemaKind::Entity)
//!             .with_field(FieldDefinition::new("name", "Name", FieldValueType::Text)),
//!     );
//!
//!     let engine = MigrationEngine::new(
//!         MigrationConfig::new(),
//!         /* your TenantClient */,
//!         /* your RevisionStore */,
//!     );
//!
//!     engine.bootstrap().await?;
//!     engine.plan(&registry, "add dough schema").await?;
//!     let report = engine.run(&TargetDescriptor::Head, Direction::Upgrade).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The declarative schema model and registry.
pub mod schema {
    pub use tidemark_schema::*;
}

/// The migration engine: diffing, revisions, and execution.
pub mod migrate {
    pub use tidemark_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        Direction, MigrationConfig, MigrationEngine, RevisionStore, TargetDescriptor, TenantClient,
    };
    pub use crate::schema::{
        DropdownDefinition, FieldDefinition, FieldValueType, ModelRegistry, SchemaDefinition,
        SchemaKind,
    };
}

// Re-export key types at the crate root
pub use migrate::{MigrationEngine, MigrationError, Revision};
pub use schema::{ModelRegistry, SchemaError, Snapshot};
