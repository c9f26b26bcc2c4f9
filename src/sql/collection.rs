//! SQL generation and row decoding for schema-defined tables.
//!
//! Every entity schema maps to one table named after the entity. Column names are the field
//! names. Identifiers are always double-quoted; schema construction already restricts them to
//! plain identifiers, so quoting never needs escaping.

use chrono::NaiveDate;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use crate::{DataStoreError, EntitySchema, FieldDef, FieldType, FieldValue, Filter, Record, RecordId};

pub(crate) type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident)
}

fn literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn column_type(field: &FieldDef) -> String {
    match (field.field_type, field.max_length) {
        (FieldType::Integer, _) => "BIGINT".to_string(),
        (FieldType::Text, Some(max)) => format!("VARCHAR({})", max),
        (FieldType::Text, None) | (FieldType::Enum, _) => "TEXT".to_string(),
        (FieldType::Boolean, _) => "BOOLEAN".to_string(),
        (FieldType::Date, _) => "DATE".to_string(),
        (FieldType::Float, _) => "DOUBLE PRECISION".to_string(),
    }
}

fn column_definition(field: &FieldDef) -> String {
    let mut column = format!("{} {}", quote(&field.name), column_type(field));
    if field.identity {
        column.push_str(" PRIMARY KEY");
    } else if field.required {
        column.push_str(" NOT NULL");
    }
    if field.field_type == FieldType::Enum {
        let allowed: Vec<String> = field.values.iter().map(|v| literal(v)).collect();
        column.push_str(&format!(
            " CHECK ({} IN ({}))",
            quote(&field.name),
            allowed.join(", ")
        ));
    }
    column
}

fn columns(schema: &EntitySchema) -> String {
    schema
        .fields()
        .iter()
        .map(|f| quote(&f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn table(schema: &EntitySchema) -> String {
    quote(schema.name())
}

fn identity(schema: &EntitySchema) -> String {
    quote(&schema.identity().name)
}

pub(crate) fn create_table_sql(schema: &EntitySchema) -> String {
    let definitions: Vec<String> = schema.fields().iter().map(column_definition).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table(schema),
        definitions.join(", ")
    )
}

pub(crate) fn insert_sql(schema: &EntitySchema) -> String {
    let placeholders: Vec<String> = (1..=schema.fields().len())
        .map(|i| format!("${}", i))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        table(schema),
        columns(schema),
        placeholders.join(", "),
        columns(schema)
    )
}

pub(crate) fn select_by_id_sql(schema: &EntitySchema) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = $1",
        columns(schema),
        table(schema),
        identity(schema)
    )
}

pub(crate) fn select_all_sql(schema: &EntitySchema) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY {}",
        columns(schema),
        table(schema),
        identity(schema)
    )
}

pub(crate) fn select_page_sql(schema: &EntitySchema) -> String {
    format!("{} LIMIT $1 OFFSET $2", select_all_sql(schema))
}

pub(crate) fn count_sql(schema: &EntitySchema) -> String {
    format!("SELECT COUNT(*) FROM {}", table(schema))
}

pub(crate) fn search_sql(schema: &EntitySchema, filter: &Filter) -> String {
    if filter.is_empty() {
        return select_all_sql(schema);
    }
    let conditions: Vec<String> = filter
        .conditions()
        .iter()
        .enumerate()
        .map(|(i, (field, _))| format!("{} = ${}", quote(field), i + 1))
        .collect();
    format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        columns(schema),
        table(schema),
        conditions.join(" AND "),
        identity(schema)
    )
}

/// `None` when the schema has no field besides its identity.
pub(crate) fn update_sql(schema: &EntitySchema) -> Option<String> {
    let assignments: Vec<String> = schema
        .fields()
        .iter()
        .filter(|f| !f.identity)
        .enumerate()
        .map(|(i, f)| format!("{} = ${}", quote(&f.name), i + 1))
        .collect();
    if assignments.is_empty() {
        return None;
    }
    Some(format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        table(schema),
        assignments.join(", "),
        identity(schema),
        assignments.len() + 1,
        columns(schema)
    ))
}

pub(crate) fn delete_sql(schema: &EntitySchema) -> String {
    format!(
        "DELETE FROM {} WHERE {} = $1 RETURNING {}",
        table(schema),
        identity(schema),
        columns(schema)
    )
}

pub(crate) fn bind_value<'q>(
    query: PgQuery<'q>,
    field_type: FieldType,
    value: &FieldValue,
) -> PgQuery<'q> {
    match value {
        FieldValue::Null => match field_type {
            FieldType::Integer => query.bind(None::<i64>),
            FieldType::Float => query.bind(None::<f64>),
            FieldType::Boolean => query.bind(None::<bool>),
            FieldType::Date => query.bind(None::<NaiveDate>),
            FieldType::Text | FieldType::Enum => query.bind(None::<String>),
        },
        FieldValue::Boolean(b) => query.bind(*b),
        FieldValue::Integer(i) => query.bind(*i),
        FieldValue::Float(x) => query.bind(*x),
        FieldValue::Date(d) => query.bind(*d),
        FieldValue::Text(s) => query.bind(s.clone()),
    }
}

pub(crate) fn bind_id<'q>(query: PgQuery<'q>, id: &RecordId) -> PgQuery<'q> {
    match id {
        RecordId::Integer(i) => query.bind(*i),
        RecordId::Text(s) => query.bind(s.clone()),
    }
}

/// Binds every field of `record` in schema order.
pub(crate) fn bind_record<'q>(
    mut query: PgQuery<'q>,
    schema: &EntitySchema,
    record: &Record,
    skip_identity: bool,
) -> PgQuery<'q> {
    for field in schema.fields() {
        if skip_identity && field.identity {
            continue;
        }
        let value = record.get(&field.name).unwrap_or(&FieldValue::Null);
        query = bind_value(query, field.field_type, value);
    }
    query
}

pub(crate) fn decode_row(schema: &EntitySchema, row: &PgRow) -> Result<Record, DataStoreError> {
    let mut record = Record::new();
    for field in schema.fields() {
        let name = field.name.as_str();
        let value = match field.field_type {
            FieldType::Integer => row.try_get::<Option<i64>, _>(name)?.map(FieldValue::Integer),
            FieldType::Float => row.try_get::<Option<f64>, _>(name)?.map(FieldValue::Float),
            FieldType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(FieldValue::Boolean),
            FieldType::Date => row.try_get::<Option<NaiveDate>, _>(name)?.map(FieldValue::Date),
            FieldType::Text | FieldType::Enum => {
                row.try_get::<Option<String>, _>(name)?.map(FieldValue::Text)
            }
        };
        record.insert(name, value.unwrap_or(FieldValue::Null));
    }
    Ok(record)
}
