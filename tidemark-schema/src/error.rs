//! Error types for model declaration and validation.

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema model operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors detected while validating the declared schema model.
///
/// These are authoring-time contradictions: they are raised before any diff
/// is computed and are never sent to the remote platform.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Two schemas declare the same warehouse name.
    #[error("duplicate schema warehouse name `{name}`")]
    #[diagnostic(code(tidemark::schema::duplicate_schema))]
    DuplicateSchema { name: String },

    /// Two schemas declare the same prefix.
    #[error("prefix `{prefix}` is used by both `{first}` and `{second}`")]
    #[diagnostic(code(tidemark::schema::duplicate_prefix))]
    DuplicatePrefix {
        prefix: String,
        first: String,
        second: String,
    },

    /// Two dropdowns declare the same name.
    #[error("duplicate dropdown name `{name}`")]
    #[diagnostic(code(tidemark::schema::duplicate_dropdown))]
    DuplicateDropdown { name: String },

    /// A dropdown lists the same option twice.
    #[error("dropdown `{dropdown}` lists option `{option}` more than once")]
    #[diagnostic(code(tidemark::schema::duplicate_option))]
    DuplicateOption { dropdown: String, option: String },

    /// A field's entity link targets an undeclared schema.
    #[error("field `{schema}.{field}` links to unknown schema `{target}`")]
    #[diagnostic(code(tidemark::schema::unknown_entity_link))]
    UnknownEntityLink {
        schema: String,
        field: String,
        target: String,
    },

    /// A field's dropdown link targets an undeclared dropdown.
    #[error("field `{schema}.{field}` uses unknown dropdown `{target}`")]
    #[diagnostic(code(tidemark::schema::unknown_dropdown_link))]
    UnknownDropdownLink {
        schema: String,
        field: String,
        target: String,
    },

    /// A warehouse name contains characters the platform rejects.
    #[error("invalid warehouse name `{name}`: only lowercase alphanumerics and underscores are allowed")]
    #[diagnostic(code(tidemark::schema::invalid_warehouse_name))]
    InvalidWarehouseName { name: String },

    /// A field definition is internally inconsistent.
    #[error("invalid field `{schema}.{field}`: {message}")]
    #[diagnostic(code(tidemark::schema::invalid_field))]
    InvalidField {
        schema: String,
        field: String,
        message: String,
    },

    /// A constraint references a field the schema does not declare.
    #[error("constraint on `{schema}` references unknown field `{field}`")]
    #[diagnostic(code(tidemark::schema::unknown_constraint_field))]
    UnknownConstraintField { schema: String, field: String },

    /// Validation finished with one or more errors.
    #[error("model validation failed with {count} error(s)")]
    #[diagnostic(code(tidemark::schema::validation_failed))]
    ValidationFailed {
        count: usize,
        #[related]
        errors: Vec<SchemaError>,
    },
}

impl SchemaError {
    /// Create an invalid-field error.
    pub fn invalid_field(
        schema: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            schema: schema.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchemaError::DuplicateSchema {
            name: "dough".to_string(),
        };
        assert!(err.to_string().contains("dough"));
    }

    #[test]
    fn test_validation_failed_count() {
        let err = SchemaError::ValidationFailed {
            count: 2,
            errors: vec![
                SchemaError::DuplicateSchema {
                    name: "a".to_string(),
                },
                SchemaError::DuplicateDropdown {
                    name: "b".to_string(),
                },
            ],
        };
        assert!(err.to_string().contains("2 error(s)"));
    }
}
