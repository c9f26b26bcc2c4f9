//! # Record Validation
//!
//! Converts untrusted JSON into [`Record`]s that conform to an [`EntitySchema`]. Validation is
//! strict: fields the schema does not declare are rejected rather than dropped, and every
//! declared field is type-checked.
//!
//! Validation stops at the first violation. Undeclared fields are reported before declared
//! ones; declared fields are checked in schema order.
//!
//! ```rust
//! use roster::{user_schema, validate_record};
//! use serde_json::json;
//!
//! let schema = user_schema();
//! let raw = json!({
//!     "id": 1,
//!     "username": "ada",
//!     "email": "a@x.com",
//!     "dateOfBirth": "1990-01-01",
//!     "isActive": true
//! });
//! assert!(validate_record(&schema, &raw).is_ok());
//!
//! let err = validate_record(&schema, &json!({"id": 1, "nickname": "x"})).unwrap_err();
//! assert_eq!(err.field, "nickname");
//! ```

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use crate::{EntitySchema, FieldDef, FieldType, FieldValue, Filter, Record, RecordId};

/// Pseudo-field named when the request body itself is malformed.
pub const BODY_FIELD: &str = "$body";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field '{field}': {reason}")]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Why it failed.
    pub reason: String,
}

impl ValidationError {
    /// Creates a validation error for `field`.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validates a JSON object against `schema` and builds a complete record.
pub fn validate_record(schema: &EntitySchema, raw: &Value) -> Result<Record, ValidationError> {
    let Value::Object(object) = raw else {
        return Err(ValidationError::new(
            BODY_FIELD,
            format!("expected a JSON object, got {}", json_type_name(raw)),
        ));
    };

    if let Some(unknown) = object.keys().find(|key| schema.field(key).is_none()) {
        return Err(ValidationError::new(
            unknown.as_str(),
            format!("field is not declared by entity '{}'", schema.name()),
        ));
    }

    let mut record = Record::new();
    for field in schema.fields() {
        let value = match object.get(&field.name) {
            None | Some(Value::Null) if field.required => {
                return Err(ValidationError::new(&field.name, "field is required"));
            }
            None | Some(Value::Null) => FieldValue::Null,
            Some(value) => validate_value(field, value)?,
        };
        record.insert(field.name.clone(), value);
    }
    Ok(record)
}

/// Type-checks one non-null JSON value against a field declaration.
pub fn validate_value(field: &FieldDef, value: &Value) -> Result<FieldValue, ValidationError> {
    let mismatch = || {
        ValidationError::new(
            &field.name,
            format!("expected {}, got {}", field.field_type, json_type_name(value)),
        )
    };

    match field.field_type {
        FieldType::Integer => match value.as_i64() {
            Some(n) => Ok(FieldValue::Integer(n)),
            None if value.is_u64() => Err(ValidationError::new(
                &field.name,
                format!("{} is out of range for integer", value),
            )),
            None => Err(mismatch()),
        },
        FieldType::Float => value.as_f64().map(FieldValue::Float).ok_or_else(mismatch),
        FieldType::Boolean => value
            .as_bool()
            .map(FieldValue::Boolean)
            .ok_or_else(mismatch),
        FieldType::Date => {
            let text = value.as_str().ok_or_else(mismatch)?;
            parse_date(field, text)
        }
        FieldType::Text => {
            let text = value.as_str().ok_or_else(mismatch)?;
            check_text(field, text)
        }
        FieldType::Enum => {
            let text = value.as_str().ok_or_else(mismatch)?;
            check_enum(field, text)
        }
    }
}

/// Accepts only the canonical `YYYY-MM-DD` spelling, so a stored date reads back unchanged.
fn parse_date(field: &FieldDef, text: &str) -> Result<FieldValue, ValidationError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .filter(|date| date.format(DATE_FORMAT).to_string() == text)
        .map(FieldValue::Date)
        .ok_or_else(|| {
            ValidationError::new(
                &field.name,
                format!("'{}' is not a calendar date (YYYY-MM-DD)", text),
            )
        })
}

fn check_text(field: &FieldDef, text: &str) -> Result<FieldValue, ValidationError> {
    if let Some(max) = field.max_length {
        let len = text.chars().count();
        if len > max {
            return Err(ValidationError::new(
                &field.name,
                format!("length {} exceeds maximum of {}", len, max),
            ));
        }
    }
    Ok(FieldValue::Text(text.to_string()))
}

fn check_enum(field: &FieldDef, text: &str) -> Result<FieldValue, ValidationError> {
    if field.values.iter().any(|v| v == text) {
        Ok(FieldValue::Text(text.to_string()))
    } else {
        Err(ValidationError::new(
            &field.name,
            format!("'{}' is not one of {:?}", text, field.values),
        ))
    }
}

/// Coerces a textual value (URL path or query string) into a field value.
pub fn parse_field_text(field: &FieldDef, text: &str) -> Result<FieldValue, ValidationError> {
    let mismatch = || {
        ValidationError::new(
            &field.name,
            format!("'{}' is not a valid {}", text, field.field_type),
        )
    };

    match field.field_type {
        FieldType::Integer => text
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| mismatch()),
        FieldType::Float => text
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(FieldValue::Float)
            .ok_or_else(mismatch),
        FieldType::Boolean => match text {
            "true" => Ok(FieldValue::Boolean(true)),
            "false" => Ok(FieldValue::Boolean(false)),
            _ => Err(mismatch()),
        },
        FieldType::Date => parse_date(field, text),
        FieldType::Text => check_text(field, text),
        FieldType::Enum => check_enum(field, text),
    }
}

/// Parses a record identity from a URL path segment.
pub fn parse_record_id(schema: &EntitySchema, text: &str) -> Result<RecordId, ValidationError> {
    let value = parse_field_text(schema.identity(), text)?;
    identity_of(schema, &value)
}

/// Converts a JSON identity (as found in bulk-delete bodies) into a record identity.
pub fn record_id_from_json(schema: &EntitySchema, value: &Value) -> Result<RecordId, ValidationError> {
    let value = validate_value(schema.identity(), value)?;
    identity_of(schema, &value)
}

fn identity_of(schema: &EntitySchema, value: &FieldValue) -> Result<RecordId, ValidationError> {
    RecordId::from_value(value).ok_or_else(|| {
        ValidationError::new(&schema.identity().name, "identity must be integer or text")
    })
}

/// Builds an equality filter from search parameters; every key must name a declared field.
pub fn build_filter(
    schema: &EntitySchema,
    params: &HashMap<String, String>,
) -> Result<Filter, ValidationError> {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();

    let mut filter = Filter::all();
    for key in keys {
        let field = schema.field(key).ok_or_else(|| {
            ValidationError::new(
                key.as_str(),
                format!("field is not declared by entity '{}'", schema.name()),
            )
        })?;
        let value = parse_field_text(field, &params[key])?;
        filter = filter.and_eq(field.name.clone(), value);
    }
    Ok(filter)
}
