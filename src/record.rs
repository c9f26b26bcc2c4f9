//! Typed records: field values, identities, and the field-name to value mapping that
//! conforms to one [`EntitySchema`](crate::EntitySchema).

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::EntitySchema;

/////////////////////////////////////////////// Values ////////////////////////////////////////////////

/// A single typed field value.
///
/// Text and enum fields both hold [`FieldValue::Text`]; the schema decides which values are
/// acceptable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Absent optional value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
    /// Calendar date, serialized as `YYYY-MM-DD`.
    Date(NaiveDate),
    /// Text or enum value.
    Text(String),
}

impl FieldValue {
    /// True for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

///////////////////////////////////////////// Identities //////////////////////////////////////////////

/// The identity of a record within its collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Identity held in an integer field.
    Integer(i64),
    /// Identity held in a text field.
    Text(String),
}

impl RecordId {
    /// The identity as a field value.
    pub fn to_value(&self) -> FieldValue {
        match self {
            RecordId::Integer(i) => FieldValue::Integer(*i),
            RecordId::Text(s) => FieldValue::Text(s.clone()),
        }
    }

    /// Converts an identity field value; only integer and text values are identities.
    pub fn from_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Integer(i) => Some(RecordId::Integer(*i)),
            FieldValue::Text(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RecordId::Integer(i) => write!(f, "{}", i),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(i: i64) -> Self {
        RecordId::Integer(i)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

////////////////////////////////////////////// Records ////////////////////////////////////////////////

/// A mapping from field name to value.
///
/// Records produced by validation or read back from a store carry every declared field of
/// their schema; optional fields without a value hold [`FieldValue::Null`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(name.into(), value)
    }

    /// Builder-style [`Record::insert`].
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Reads a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The value of the schema's identity field, if present and well typed.
    pub fn id(&self, schema: &EntitySchema) -> Option<RecordId> {
        self.get(&schema.identity().name).and_then(RecordId::from_value)
    }

    /// Converts the record to a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_schema;
    use serde_json::json;

    fn ada() -> Record {
        Record::new()
            .with("id", FieldValue::Integer(1))
            .with("username", FieldValue::Text("ada".to_string()))
            .with("email", FieldValue::Text("a@x.com".to_string()))
            .with(
                "dateOfBirth",
                FieldValue::Date(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()),
            )
            .with("isActive", FieldValue::Boolean(true))
    }

    #[test]
    fn record_serializes_as_plain_object() {
        assert_eq!(
            ada().to_json(),
            json!({
                "id": 1,
                "username": "ada",
                "email": "a@x.com",
                "dateOfBirth": "1990-01-01",
                "isActive": true
            })
        );
    }

    #[test]
    fn null_serializes_as_null() {
        let record = Record::new().with("note", FieldValue::Null);
        assert_eq!(record.to_json(), json!({"note": null}));
    }

    #[test]
    fn record_id_reads_identity_field() {
        assert_eq!(ada().id(&user_schema()), Some(RecordId::Integer(1)));
        assert_eq!(Record::new().id(&user_schema()), None);
    }

    #[test]
    fn record_id_deserializes_untagged() {
        let ids: Vec<RecordId> = serde_json::from_value(json!([3, "abc"])).unwrap();
        assert_eq!(ids, vec![RecordId::Integer(3), RecordId::Text("abc".to_string())]);
    }

    #[test]
    fn record_ids_order_integers_numerically() {
        let mut ids = vec![RecordId::from(10), RecordId::from(2), RecordId::from(-1)];
        ids.sort();
        assert_eq!(ids, vec![RecordId::from(-1), RecordId::from(2), RecordId::from(10)]);
    }

    #[test]
    fn field_value_display() {
        let date = FieldValue::Date(NaiveDate::from_ymd_opt(2001, 2, 3).unwrap());
        assert_eq!(date.to_string(), "2001-02-03");
        assert_eq!(FieldValue::Null.to_string(), "null");
        assert!(FieldValue::Null.is_null());
    }
}
