//! # tidemark-schema
//!
//! The declarative schema model for Tidemark.
//!
//! This crate owns the code-first description of a tenant's schema surface:
//! schemas with ordered fields, dropdowns with ordered option lists, and the
//! identity keys (warehouse-stable names) used to match objects across
//! snapshots. The [`ModelRegistry`] collects declarations, validates them as
//! a whole, and produces a [`Snapshot`], the structure the migration engine
//! diffs against the remote platform's live state.
//!
//! ```rust
//! use tidemark_schema::{
//!     FieldDefinition, FieldValueType, ModelRegistry, SchemaDefinition, SchemaKind,
//! };
//!
//! let registry = ModelRegistry::new().with_schema(
//!     SchemaDefinition::new("dough", "Dough", "DGH", SchemaKind::Entity)
//!         .with_field(FieldDefinition::new("name", "Name", FieldValueType::Text))
//!         .with_field(
//!             FieldDefinition::new("hydration", "Hydration", FieldValueType::Decimal)
//!                 .unit("percent"),
//!         ),
//! );
//!
//! let snapshot = registry.snapshot().expect("valid model");
//! assert_eq!(snapshot.schemas.len(), 1);
//! ```
//!
//! The registry owns no persisted state: it is rebuilt from the declarations
//! on every invocation. Remote state, revisions, and execution live in the
//! `tidemark-migrate` crate.

pub mod error;
pub mod model;
pub mod registry;

// Re-exports
pub use error::{SchemaError, SchemaResult};
pub use model::{
    Constraint, DropdownDefinition, FieldDefinition, FieldValueType, NamingStrategy,
    SchemaDefinition, SchemaKind, Snapshot,
};
pub use registry::{is_valid_warehouse_name, ModelRegistry, Validator};
