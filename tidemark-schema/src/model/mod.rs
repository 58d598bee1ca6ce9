//! The declarative schema model.
//!
//! These types describe schema objects the way the remote platform stores
//! them: schemas with ordered fields, dropdowns with ordered option lists,
//! and the identity keys used to match objects across snapshots.

mod dropdown;
mod entity;
mod field;
mod snapshot;
mod types;

pub use dropdown::DropdownDefinition;
pub use entity::{Constraint, SchemaDefinition};
pub use field::FieldDefinition;
pub use snapshot::Snapshot;
pub use types::{FieldValueType, NamingStrategy, SchemaKind};
