//! Row conformance checks.
//!
//! A row conforms to a schema when it has one value per field, no REQUIRED
//! field holds `Null`, and every non-null value is coercible to its field's
//! type. Checking stops at the first violation; the row itself is never
//! modified.

use serde::Serialize;
use thiserror::Error;

use crate::{
    coerce::{StandardCoercer, TypeCoercer},
    data::Value,
    schema::{LogicalType, Schema},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViolationKind {
    ArityMismatch,
    MissingRequiredField,
    TypeMismatch,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::ArityMismatch => "ArityMismatch",
            ViolationKind::MissingRequiredField => "MissingRequiredField",
            ViolationKind::TypeMismatch => "TypeMismatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("Row length {actual} does not match schema length {expected}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("Field '{field}' is required but is missing")]
    MissingRequiredField { field: String },
    #[error("Field '{field}' with value '{value}' cannot be converted to type '{expected}'")]
    TypeMismatch {
        field: String,
        value: Value,
        expected: LogicalType,
    },
}

impl SchemaViolation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            SchemaViolation::ArityMismatch { .. } => ViolationKind::ArityMismatch,
            SchemaViolation::MissingRequiredField { .. } => ViolationKind::MissingRequiredField,
            SchemaViolation::TypeMismatch { .. } => ViolationKind::TypeMismatch,
        }
    }

    /// Name of the offending field; arity violations have none.
    pub fn field(&self) -> Option<&str> {
        match self {
            SchemaViolation::ArityMismatch { .. } => None,
            SchemaViolation::MissingRequiredField { field }
            | SchemaViolation::TypeMismatch { field, .. } => Some(field),
        }
    }
}

/// Validates rows against one schema with a chosen coercion table.
#[derive(Debug, Clone)]
pub struct Validator<'s, C = StandardCoercer> {
    schema: &'s Schema,
    coercer: C,
}

impl<'s> Validator<'s, StandardCoercer> {
    pub fn new(schema: &'s Schema) -> Self {
        Self::with_coercer(schema, StandardCoercer::default())
    }
}

impl<'s, C: TypeCoercer> Validator<'s, C> {
    pub fn with_coercer(schema: &'s Schema, coercer: C) -> Self {
        Self { schema, coercer }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn coercer(&self) -> &C {
        &self.coercer
    }

    pub fn validate(&self, row: &[Value]) -> Result<(), SchemaViolation> {
        if row.len() != self.schema.len() {
            return Err(SchemaViolation::ArityMismatch {
                expected: self.schema.len(),
                actual: row.len(),
            });
        }
        for (value, field) in row.iter().zip(self.schema) {
            if value.is_null() {
                if field.is_required() {
                    return Err(SchemaViolation::MissingRequiredField {
                        field: field.name.clone(),
                    });
                }
                continue;
            }
            if !self.coercer.coerce(value, &field.field_type) {
                return Err(SchemaViolation::TypeMismatch {
                    field: field.name.clone(),
                    value: value.clone(),
                    expected: field.field_type.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Validates one parsed row with the standard coercion table.
pub fn validate_row(row: &[Value], schema: &Schema) -> Result<(), SchemaViolation> {
    Validator::new(schema).validate(row)
}
