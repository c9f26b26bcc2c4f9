//! # Entity Service
//!
//! [`EntityService`] binds one [`EntitySchema`] to an injected [`DataStore`] and exposes the
//! complete set of entity operations. Untrusted input is validated before any storage call,
//! and every storage failure is translated into an [`ApiError`].
//!
//! [`Catalog`] holds one service per registered schema and resolves them by entity name.
//!
//! ```rust
//! # #[tokio::main]
//! # async fn main() {
//! use std::sync::Arc;
//! use roster::{Catalog, ErrorKind, InMemoryDataStore, SchemaRegistry, user_schema};
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::new(vec![user_schema()]).unwrap();
//! let catalog = Catalog::new(&registry, Arc::new(InMemoryDataStore::new()));
//! let users = catalog.service("user").unwrap();
//!
//! let body = json!({"id": 1, "username": "ada", "email": "a@x.com",
//!                   "dateOfBirth": "1990-01-01", "isActive": true});
//! assert_eq!(users.create(&body).await.unwrap(), body);
//! assert_eq!(users.create(&body).await.unwrap_err().kind, ErrorKind::Conflict);
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data_store::{BulkFailure, DataStore, Page, PageRequest};
use crate::validate::{
    BODY_FIELD, build_filter, parse_record_id, record_id_from_json, validate_record,
};
use crate::{ApiError, EntitySchema, ErrorKind, Record, RecordId, SchemaRegistry};

///////////////////////////////////////////// Responses ///////////////////////////////////////////////

/// Response of a count request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    /// Number of stored records.
    pub count: u64,
}

/// Response of a successful bulk create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCreateResponse {
    /// Number of records created.
    pub created_count: usize,
    /// Identities of the created records, in submission order.
    pub created_ids: Vec<RecordId>,
    /// Summary for humans.
    pub message: String,
}

/// Response of a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteResponse {
    /// Number of records removed.
    pub deleted_count: u64,
    /// Requested identities that did not exist.
    pub not_found: Vec<RecordId>,
    /// Summary for humans.
    pub message: String,
}

////////////////////////////////////////////// Service ////////////////////////////////////////////////

/// Operations on the records of one entity type.
pub struct EntityService<S> {
    schema: Arc<EntitySchema>,
    store: Arc<S>,
}

impl<S> Clone for EntityService<S> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DataStore> EntityService<S> {
    /// Creates a service for `schema` over `store`.
    pub fn new(schema: Arc<EntitySchema>, store: Arc<S>) -> Self {
        Self { schema, store }
    }

    /// The schema this service manages.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// The entity name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    fn store_error(&self, err: crate::DataStoreError) -> ApiError {
        ApiError::from_store(self.name(), err)
    }

    /// Creates the entity's collection if needed.
    pub async fn ensure_collection(&self) -> Result<(), ApiError> {
        self.store
            .ensure_collection(&self.schema)
            .await
            .map_err(|e| self.store_error(e))
    }

    /// Validates and stores a new record; returns it as stored.
    pub async fn create(&self, raw: &Value) -> Result<Value, ApiError> {
        let record = validate_record(&self.schema, raw)?;
        let stored = self
            .store
            .insert(&self.schema, record)
            .await
            .map_err(|e| self.store_error(e))?;
        tracing::info!(entity = self.name(), id = ?stored.id(&self.schema), "record created");
        Ok(stored.to_json())
    }

    /// Reads one record by its path identity.
    pub async fn get_by_id(&self, id: &str) -> Result<Value, ApiError> {
        let id = parse_record_id(&self.schema, id)?;
        let record = self
            .store
            .get_by_id(&self.schema, &id)
            .await
            .map_err(|e| self.store_error(e))?;
        Ok(record.to_json())
    }

    /// Every record, ordered by identity.
    pub async fn list(&self) -> Result<Vec<Value>, ApiError> {
        let records = self
            .store
            .list_all(&self.schema)
            .await
            .map_err(|e| self.store_error(e))?;
        Ok(records.iter().map(Record::to_json).collect())
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<CountResponse, ApiError> {
        let count = self
            .store
            .count(&self.schema)
            .await
            .map_err(|e| self.store_error(e))?;
        Ok(CountResponse { count })
    }

    /// One window of the identity-ordered records; `skip` and `limit` are clamped.
    pub async fn list_page(&self, skip: i64, limit: i64) -> Result<Page, ApiError> {
        self.store
            .list_page(&self.schema, PageRequest::new(skip, limit))
            .await
            .map_err(|e| self.store_error(e))
    }

    /// Records whose fields equal every given parameter.
    pub async fn search(&self, params: &HashMap<String, String>) -> Result<Vec<Value>, ApiError> {
        let filter = build_filter(&self.schema, params)?;
        let records = self
            .store
            .search(&self.schema, &filter)
            .await
            .map_err(|e| self.store_error(e))?;
        Ok(records.iter().map(Record::to_json).collect())
    }

    /// Replaces every field of the record at `id`.
    ///
    /// The body must carry the same identity as the path.
    pub async fn update(&self, id: &str, raw: &Value) -> Result<Value, ApiError> {
        let id = parse_record_id(&self.schema, id)?;
        let record = validate_record(&self.schema, raw)?;
        if record.id(&self.schema).as_ref() != Some(&id) {
            return Err(ApiError::bad_request(format!(
                "identity field '{}' must equal {}",
                self.schema.identity().name,
                id
            )));
        }
        let stored = self
            .store
            .update(&self.schema, &id, record)
            .await
            .map_err(|e| self.store_error(e))?;
        tracing::info!(entity = self.name(), %id, "record updated");
        Ok(stored.to_json())
    }

    /// Removes the record at `id`; returns it as it was.
    pub async fn delete(&self, id: &str) -> Result<Value, ApiError> {
        let id = parse_record_id(&self.schema, id)?;
        let removed = self
            .store
            .delete_by_id(&self.schema, &id)
            .await
            .map_err(|e| self.store_error(e))?;
        tracing::info!(entity = self.name(), %id, "record deleted");
        Ok(removed.to_json())
    }

    /// Creates a batch of records, all or nothing.
    ///
    /// Every item is validated before storage is touched; when any item is invalid, or the
    /// store rejects any item, nothing is created and every failing index is reported.
    pub async fn bulk_create(&self, raw: &Value) -> Result<BulkCreateResponse, ApiError> {
        let Value::Array(items) = raw else {
            return Err(ApiError::bad_request(format!(
                "invalid field '{}': expected an array of records",
                BODY_FIELD
            )));
        };

        let mut records = Vec::with_capacity(items.len());
        let mut failures = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match validate_record(&self.schema, item) {
                Ok(record) => records.push(record),
                Err(e) => failures.push(BulkFailure {
                    index,
                    error: e.to_string(),
                }),
            }
        }
        if !failures.is_empty() {
            return Err(ApiError::bulk("Bulk creation failed", failures));
        }

        let result = self
            .store
            .bulk_insert(&self.schema, records)
            .await
            .map_err(|e| self.store_error(e))?;
        if !result.committed() {
            return Err(ApiError::bulk("Bulk creation failed", result.failures));
        }

        let created_count = result.inserted_ids.len();
        tracing::info!(entity = self.name(), created_count, "bulk create committed");
        Ok(BulkCreateResponse {
            created_count,
            created_ids: result.inserted_ids,
            message: format!("Successfully created {} {} entities", created_count, self.name()),
        })
    }

    /// Deletes each listed identity that exists; missing ones are reported, not fatal.
    pub async fn bulk_delete(&self, raw: &Value) -> Result<BulkDeleteResponse, ApiError> {
        let Value::Array(items) = raw else {
            return Err(ApiError::bad_request(format!(
                "invalid field '{}': expected an array of identities",
                BODY_FIELD
            )));
        };
        let ids = items
            .iter()
            .map(|item| record_id_from_json(&self.schema, item))
            .collect::<Result<Vec<_>, _>>()?;

        let result = self
            .store
            .bulk_delete(&self.schema, &ids)
            .await
            .map_err(|e| self.store_error(e))?;
        tracing::info!(
            entity = self.name(),
            deleted_count = result.deleted_count,
            not_found = result.not_found.len(),
            "bulk delete"
        );
        Ok(BulkDeleteResponse {
            deleted_count: result.deleted_count,
            not_found: result.not_found,
            message: format!(
                "Successfully deleted {} {} entities",
                result.deleted_count,
                self.name()
            ),
        })
    }
}

////////////////////////////////////////////// Catalog ////////////////////////////////////////////////

/// One [`EntityService`] per registered schema, all sharing a store.
pub struct Catalog<S> {
    services: BTreeMap<String, EntityService<S>>,
}

impl<S> Clone for Catalog<S> {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
        }
    }
}

impl<S: DataStore> Catalog<S> {
    /// Builds a service for every schema of `registry`.
    pub fn new(registry: &SchemaRegistry, store: Arc<S>) -> Self {
        let services = registry
            .iter()
            .map(|schema| {
                (
                    schema.name().to_string(),
                    EntityService::new(Arc::clone(schema), Arc::clone(&store)),
                )
            })
            .collect();
        Self { services }
    }

    /// The service for `entity`.
    pub fn service(&self, entity: &str) -> Result<&EntityService<S>, ApiError> {
        self.services.get(entity).ok_or_else(|| {
            ApiError::new(ErrorKind::NotFound, format!("unknown entity '{}'", entity))
        })
    }

    /// Iterates over services in entity name order.
    pub fn services(&self) -> impl Iterator<Item = &EntityService<S>> {
        self.services.values()
    }

    /// Creates every entity's collection.
    pub async fn ensure_collections(&self) -> Result<(), ApiError> {
        for service in self.services.values() {
            service.ensure_collection().await?;
            tracing::debug!(entity = service.name(), "collection ready");
        }
        Ok(())
    }
}
