//! # Entity Schema Registry
//!
//! An [`EntitySchema`] describes one entity type: its name, its ordered fields, the semantic
//! type of each field, and which field carries the record's identity. Schemas are built once
//! at startup, either from the built-in [`user_schema`] or from the `entities:` list of a YAML
//! document, and are read-only afterwards.
//!
//! ```rust
//! use roster::{FieldType, SchemaRegistry, user_schema};
//!
//! let registry = SchemaRegistry::new(vec![user_schema()]).unwrap();
//! let schema = registry.schema_for("user").unwrap();
//! assert_eq!(schema.identity().name, "id");
//! assert_eq!(schema.field("dateOfBirth").unwrap().field_type, FieldType::Date);
//! assert!(registry.schema_for("order").is_err());
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/////////////////////////////////////////////// Fields ////////////////////////////////////////////////

/// The semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// A signed 64-bit integer.
    Integer,
    /// A UTF-8 string, optionally bounded by `max_length`.
    Text,
    /// A literal `true` or `false`.
    Boolean,
    /// A calendar date written as `YYYY-MM-DD`.
    Date,
    /// A 64-bit floating point number.
    Float,
    /// A string drawn from a fixed set of values.
    Enum,
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            FieldType::Integer => "integer",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Float => "float",
            FieldType::Enum => "enum",
        };
        f.write_str(name)
    }
}

fn default_required() -> bool {
    true
}

/// One declared field of an entity schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name; also the storage column name.
    pub name: String,
    /// Semantic type of the field.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether this field is the record identity.
    #[serde(default)]
    pub identity: bool,
    /// Whether the field must be present and non-null.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Maximum length in characters for text fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Allowed values for enum fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl FieldDef {
    fn simple(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            identity: false,
            required: true,
            max_length: None,
            values: Vec::new(),
        }
    }

    /// A required integer field.
    pub fn integer(name: &str) -> Self {
        Self::simple(name, FieldType::Integer)
    }

    /// A required text field with an optional length bound.
    pub fn text(name: &str, max_length: Option<usize>) -> Self {
        Self {
            max_length,
            ..Self::simple(name, FieldType::Text)
        }
    }

    /// A required boolean field.
    pub fn boolean(name: &str) -> Self {
        Self::simple(name, FieldType::Boolean)
    }

    /// A required date field.
    pub fn date(name: &str) -> Self {
        Self::simple(name, FieldType::Date)
    }

    /// A required float field.
    pub fn float(name: &str) -> Self {
        Self::simple(name, FieldType::Float)
    }

    /// A required enum field restricted to `values`.
    pub fn enumeration(name: &str, values: &[&str]) -> Self {
        Self {
            values: values.iter().map(|v| v.to_string()).collect(),
            ..Self::simple(name, FieldType::Enum)
        }
    }

    /// Marks this field as the identity field.
    pub fn as_identity(mut self) -> Self {
        self.identity = true;
        self.required = true;
        self
    }

    /// Marks this field as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

////////////////////////////////////////////// Schemas ////////////////////////////////////////////////

/// Errors raised while building or querying schemas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No schema is registered under this entity name.
    #[error("unknown entity '{0}'")]
    NotFound(String),
    /// Entity or field name is not a plain identifier.
    #[error("'{0}' is not a valid identifier")]
    InvalidName(String),
    /// Two entities share a name.
    #[error("entity '{0}' is declared more than once")]
    DuplicateEntity(String),
    /// Two fields of one entity share a name.
    #[error("entity '{entity}' declares field '{field}' more than once")]
    DuplicateField {
        /// The entity being declared.
        entity: String,
        /// The repeated field name.
        field: String,
    },
    /// The entity has no identity field, or more than one.
    #[error("entity '{entity}' must declare exactly one identity field, found {found}")]
    IdentityCount {
        /// The entity being declared.
        entity: String,
        /// How many identity fields were declared.
        found: usize,
    },
    /// The identity field is not an integer or text field.
    #[error("identity field '{field}' of '{entity}' must be integer or text, not {field_type}")]
    IdentityType {
        /// The entity being declared.
        entity: String,
        /// The identity field.
        field: String,
        /// Its declared type.
        field_type: FieldType,
    },
    /// A field carries a constraint that does not fit its type.
    #[error("field '{field}' of '{entity}': {reason}")]
    InvalidConstraint {
        /// The entity being declared.
        entity: String,
        /// The offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The schema document could not be read or parsed.
    #[error("cannot load schemas: {0}")]
    Load(String),
}

/// Declarative form of an entity schema, as written in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name; also the collection name and URL segment.
    pub name: String,
    /// Ordered field declarations.
    pub fields: Vec<FieldDef>,
}

/// Immutable, validated description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    name: String,
    fields: Vec<FieldDef>,
    identity: usize,
}

impl EntitySchema {
    /// Builds a schema, checking names, identity and per-field constraints.
    pub fn new(name: &str, fields: Vec<FieldDef>) -> Result<Self, SchemaError> {
        if !IDENTIFIER.is_match(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !IDENTIFIER.is_match(&field.name) {
                return Err(SchemaError::InvalidName(field.name.clone()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    entity: name.to_string(),
                    field: field.name.clone(),
                });
            }
            check_constraints(name, field)?;
        }

        let identities: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.identity)
            .map(|(i, _)| i)
            .collect();
        let &[identity] = identities.as_slice() else {
            return Err(SchemaError::IdentityCount {
                entity: name.to_string(),
                found: identities.len(),
            });
        };

        let id_field = &fields[identity];
        if !matches!(id_field.field_type, FieldType::Integer | FieldType::Text) {
            return Err(SchemaError::IdentityType {
                entity: name.to_string(),
                field: id_field.name.clone(),
                field_type: id_field.field_type,
            });
        }
        if !id_field.required {
            return Err(SchemaError::InvalidConstraint {
                entity: name.to_string(),
                field: id_field.name.clone(),
                reason: "identity field cannot be optional".to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            fields,
            identity,
        })
    }

    /// The entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// The identity field.
    pub fn identity(&self) -> &FieldDef {
        &self.fields[self.identity]
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The declarative form of this schema.
    pub fn to_def(&self) -> EntityDef {
        EntityDef {
            name: self.name.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl TryFrom<EntityDef> for EntitySchema {
    type Error = SchemaError;

    fn try_from(def: EntityDef) -> Result<Self, Self::Error> {
        EntitySchema::new(&def.name, def.fields)
    }
}

fn check_constraints(entity: &str, field: &FieldDef) -> Result<(), SchemaError> {
    let invalid = |reason: &str| SchemaError::InvalidConstraint {
        entity: entity.to_string(),
        field: field.name.clone(),
        reason: reason.to_string(),
    };

    if field.max_length.is_some() && field.field_type != FieldType::Text {
        return Err(invalid("max_length applies to text fields only"));
    }
    if field.max_length == Some(0) {
        return Err(invalid("max_length must be positive"));
    }
    match field.field_type {
        FieldType::Enum if field.values.is_empty() => {
            Err(invalid("enum fields must declare at least one value"))
        }
        FieldType::Enum => Ok(()),
        _ if !field.values.is_empty() => Err(invalid("values apply to enum fields only")),
        _ => Ok(()),
    }
}

/// The built-in `user` entity served when no schemas are configured.
pub fn user_schema() -> EntitySchema {
    EntitySchema {
        name: "user".to_string(),
        fields: vec![
            FieldDef::integer("id").as_identity(),
            FieldDef::text("username", Some(100)),
            FieldDef::text("email", Some(100)),
            FieldDef::date("dateOfBirth"),
            FieldDef::boolean("isActive"),
        ],
        identity: 0,
    }
}

////////////////////////////////////////////// Registry ///////////////////////////////////////////////

#[derive(Deserialize)]
struct SchemaDocument {
    entities: Vec<EntityDef>,
}

/// Read-only lookup of entity schemas by name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<EntitySchema>>,
}

impl SchemaRegistry {
    /// Builds a registry; entity names must be unique.
    pub fn new(schemas: Vec<EntitySchema>) -> Result<Self, SchemaError> {
        let mut map = BTreeMap::new();
        for schema in schemas {
            let name = schema.name().to_string();
            if map.insert(name.clone(), Arc::new(schema)).is_some() {
                return Err(SchemaError::DuplicateEntity(name));
            }
        }
        Ok(Self { schemas: map })
    }

    /// Builds a registry from declarative entity definitions.
    pub fn from_defs(defs: Vec<EntityDef>) -> Result<Self, SchemaError> {
        let schemas = defs
            .into_iter()
            .map(EntitySchema::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(schemas)
    }

    /// Parses a YAML document with a top-level `entities:` list.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument =
            serde_yml::from_str(yaml).map_err(|e| SchemaError::Load(e.to_string()))?;
        Self::from_defs(document.entities)
    }

    /// Reads and parses a YAML schema file.
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    /// Returns the schema registered under `entity_name`.
    pub fn schema_for(&self, entity_name: &str) -> Result<Arc<EntitySchema>, SchemaError> {
        self.schemas
            .get(entity_name)
            .cloned()
            .ok_or_else(|| SchemaError::NotFound(entity_name.to_string()))
    }

    /// Iterates over registered schemas in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntitySchema>> {
        self.schemas.values()
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// True when no schema is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
