//! The model registry: declared schemas and dropdowns, validated into a
//! snapshot.
//!
//! The registry owns no persisted state; it is rebuilt from the code-first
//! declarations on every invocation and validated as a whole before a
//! snapshot is produced:
//! - identity keys (warehouse names, prefixes, dropdown names) are unique
//! - entity and dropdown links resolve to declared objects
//! - field properties are consistent with their value type

use std::collections::{HashMap, HashSet};

use crate::error::{SchemaError, SchemaResult};
use crate::model::{DropdownDefinition, SchemaDefinition, Snapshot};

/// Whether a warehouse name is acceptable to the platform.
pub fn is_valid_warehouse_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

/// Declared schemas and dropdowns, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    schemas: Vec<SchemaDefinition>,
    dropdowns: Vec<DropdownDefinition>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a schema.
    pub fn register_schema(&mut self, schema: SchemaDefinition) -> &mut Self {
        self.schemas.push(schema);
        self
    }

    /// Declare a dropdown.
    pub fn register_dropdown(&mut self, dropdown: DropdownDefinition) -> &mut Self {
        self.dropdowns.push(dropdown);
        self
    }

    /// Builder-style [`register_schema`](Self::register_schema).
    pub fn with_schema(mut self, schema: SchemaDefinition) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Builder-style [`register_dropdown`](Self::register_dropdown).
    pub fn with_dropdown(mut self, dropdown: DropdownDefinition) -> Self {
        self.dropdowns.push(dropdown);
        self
    }

    /// Number of declared schemas.
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Number of declared dropdowns.
    pub fn dropdown_count(&self) -> usize {
        self.dropdowns.len()
    }

    /// Validate the declarations and build a snapshot.
    pub fn snapshot(&self) -> SchemaResult<Snapshot> {
        Validator::new().validate(self)?;

        let mut snapshot = Snapshot::new();
        for schema in &self.schemas {
            snapshot.add_schema(schema.clone());
        }
        for dropdown in &self.dropdowns {
            snapshot.add_dropdown(dropdown.clone());
        }
        Ok(snapshot)
    }
}

/// Error-collecting validation pass over a registry.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<SchemaError>,
}

impl Validator {
    /// Create a new validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a registry, returning all errors at once.
    pub fn validate(mut self, registry: &ModelRegistry) -> SchemaResult<()> {
        self.check_schema_identities(registry);
        self.check_dropdowns(registry);
        for schema in &registry.schemas {
            self.check_fields(schema, registry);
            self.check_constraints(schema);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::ValidationFailed {
                count: self.errors.len(),
                errors: self.errors,
            })
        }
    }

    fn check_schema_identities(&mut self, registry: &ModelRegistry) {
        let mut names = HashSet::new();
        let mut prefixes: HashMap<&str, &str> = HashMap::new();

        for schema in &registry.schemas {
            if !is_valid_warehouse_name(schema.name()) {
                self.errors.push(SchemaError::InvalidWarehouseName {
                    name: schema.name().to_string(),
                });
            }
            if !names.insert(schema.name()) {
                self.errors.push(SchemaError::DuplicateSchema {
                    name: schema.name().to_string(),
                });
            }
            if let Some(first) = prefixes.insert(schema.prefix.as_str(), schema.name()) {
                self.errors.push(SchemaError::DuplicatePrefix {
                    prefix: schema.prefix.to_string(),
                    first: first.to_string(),
                    second: schema.name().to_string(),
                });
            }
        }
    }

    fn check_dropdowns(&mut self, registry: &ModelRegistry) {
        let mut names = HashSet::new();

        for dropdown in &registry.dropdowns {
            if !names.insert(dropdown.name.as_str()) {
                self.errors.push(SchemaError::DuplicateDropdown {
                    name: dropdown.name.to_string(),
                });
            }

            let mut seen = HashSet::new();
            for option in &dropdown.options {
                if !seen.insert(option.as_str()) {
                    self.errors.push(SchemaError::DuplicateOption {
                        dropdown: dropdown.name.to_string(),
                        option: option.to_string(),
                    });
                }
            }
        }
    }

    fn check_fields(&mut self, schema: &SchemaDefinition, registry: &ModelRegistry) {
        for field in schema.fields.values() {
            let schema_name = schema.name();
            let field_name = field.name();

            if !is_valid_warehouse_name(field_name) {
                self.errors.push(SchemaError::InvalidWarehouseName {
                    name: format!("{schema_name}.{field_name}"),
                });
            }

            match &field.entity_link {
                Some(target) if !field.value_type.is_entity_link() => {
                    self.errors.push(SchemaError::invalid_field(
                        schema_name,
                        field_name,
                        format!(
                            "entity link to `{target}` requires the entity_link value type, not {}",
                            field.value_type
                        ),
                    ));
                }
                Some(target) => {
                    if !registry.schemas.iter().any(|s| s.warehouse_name == *target) {
                        self.errors.push(SchemaError::UnknownEntityLink {
                            schema: schema_name.to_string(),
                            field: field_name.to_string(),
                            target: target.to_string(),
                        });
                    }
                }
                None if field.value_type.is_entity_link() => {
                    self.errors.push(SchemaError::invalid_field(
                        schema_name,
                        field_name,
                        "entity_link fields must name a target schema",
                    ));
                }
                None => {}
            }

            match &field.dropdown_link {
                Some(target) if !field.value_type.requires_dropdown() => {
                    self.errors.push(SchemaError::invalid_field(
                        schema_name,
                        field_name,
                        format!(
                            "dropdown `{target}` requires the dropdown value type, not {}",
                            field.value_type
                        ),
                    ));
                }
                Some(target) => {
                    if !registry.dropdowns.iter().any(|d| d.name == *target) {
                        self.errors.push(SchemaError::UnknownDropdownLink {
                            schema: schema_name.to_string(),
                            field: field_name.to_string(),
                            target: target.to_string(),
                        });
                    }
                }
                None if field.value_type.requires_dropdown() => {
                    self.errors.push(SchemaError::invalid_field(
                        schema_name,
                        field_name,
                        "dropdown fields must name a dropdown",
                    ));
                }
                None => {}
            }

            if field.multi && !field.value_type.supports_multi() {
                self.errors.push(SchemaError::invalid_field(
                    schema_name,
                    field_name,
                    format!("{} fields cannot be multi-valued", field.value_type),
                ));
            }
            if field.unit.is_some() && !field.value_type.supports_unit() {
                self.errors.push(SchemaError::invalid_field(
                    schema_name,
                    field_name,
                    format!("{} fields cannot carry a unit label", field.value_type),
                ));
            }
            if field.decimal_places.is_some() && !field.value_type.supports_precision() {
                self.errors.push(SchemaError::invalid_field(
                    schema_name,
                    field_name,
                    format!("{} fields cannot carry a decimal precision", field.value_type),
                ));
            }
        }
    }

    fn check_constraints(&mut self, schema: &SchemaDefinition) {
        for constraint in &schema.constraints {
            for field in &constraint.fields {
                if !schema.fields.contains_key(field) {
                    self.errors.push(SchemaError::UnknownConstraintField {
                        schema: schema.name().to_string(),
                        field: field.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Constraint, FieldDefinition, FieldValueType, SchemaKind};

    fn dough() -> SchemaDefinition {
        SchemaDefinition::new("dough", "Dough", "DGH", SchemaKind::Entity)
            .with_field(FieldDefinition::new("name", "Name", FieldValueType::Text))
    }

    #[test]
    fn test_valid_registry() {
        let registry = ModelRegistry::new().with_schema(dough());
        let snapshot = registry.snapshot().unwrap();
        assert_eq!(snapshot.schemas.len(), 1);
    }

    #[test]
    fn test_warehouse_name_validity() {
        assert!(is_valid_warehouse_name("dough_v2"));
        assert!(!is_valid_warehouse_name("Dough"));
        assert!(!is_valid_warehouse_name("2dough"));
        assert!(!is_valid_warehouse_name(""));
    }

    #[test]
    fn test_duplicate_schema_rejected() {
        let registry = ModelRegistry::new().with_schema(dough()).with_schema(
            SchemaDefinition::new("dough", "Dough Two", "DG2", SchemaKind::Entity),
        );
        let err = registry.snapshot().unwrap_err();
        match err {
            SchemaError::ValidationFailed { count, errors } => {
                assert_eq!(count, 1);
                assert!(matches!(errors[0], SchemaError::DuplicateSchema { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_prefix_rejected() {
        let registry = ModelRegistry::new().with_schema(dough()).with_schema(
            SchemaDefinition::new("starter", "Starter", "DGH", SchemaKind::Entity),
        );
        assert!(registry.snapshot().is_err());
    }

    #[test]
    fn test_dangling_dropdown_link_rejected() {
        let registry = ModelRegistry::new().with_schema(dough().with_field(
            FieldDefinition::new("flour", "Flour", FieldValueType::Dropdown).dropdown("Flours"),
        ));
        let err = registry.snapshot().unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }

    #[test]
    fn test_dangling_entity_link_rejected() {
        let registry = ModelRegistry::new().with_schema(dough().with_field(
            FieldDefinition::new("starter", "Starter", FieldValueType::EntityLink)
                .entity_link("starter"),
        ));
        assert!(registry.snapshot().is_err());
    }

    #[test]
    fn test_multi_on_scalar_rejected() {
        let registry = ModelRegistry::new().with_schema(dough().with_field(
            FieldDefinition::new("mass", "Mass", FieldValueType::Decimal).multi(true),
        ));
        assert!(registry.snapshot().is_err());
    }

    #[test]
    fn test_constraint_over_unknown_field_rejected() {
        let registry = ModelRegistry::new()
            .with_schema(dough().with_constraint(Constraint::over(["batch_no"])));
        assert!(registry.snapshot().is_err());
    }

    #[test]
    fn test_unit_on_text_rejected() {
        let registry = ModelRegistry::new().with_schema(
            dough().with_field(FieldDefinition::new("note", "Note", FieldValueType::Text).unit("g")),
        );
        assert!(registry.snapshot().is_err());
    }
}
