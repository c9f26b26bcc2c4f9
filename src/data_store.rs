//! # Data Storage Abstraction
//!
//! The [`DataStore`] trait is the persistence gateway: the only place roster performs durable
//! I/O. Every method is parameterized by the [`EntitySchema`] of the collection it touches, so a
//! single store backs any number of entity types.
//!
//! ## Guarantees
//!
//! - Inserting an identity that already exists fails with [`DataStoreError::DuplicateKey`];
//!   nothing is overwritten.
//! - `list_all`, `list_page` and `search` return records ordered by identity, so a page is a
//!   contiguous slice of `list_all` for the same storage state.
//! - `bulk_insert` is all-or-nothing: when any record fails, none are stored and every failing
//!   index is reported. `bulk_delete` is per-id and may partially succeed.
//! - Each call is one storage scope (a lock acquisition or a transaction) that is released on
//!   every exit path.
//!
//! ## Implementations
//!
//! - [`InMemoryDataStore`]: `Mutex`-protected maps, for tests and single-process use.
//! - [`PostgresDataStore`](crate::sql::PostgresDataStore): one table per schema.
//!
//! ```rust
//! # #[tokio::main]
//! # async fn main() {
//! use roster::{DataStore, FieldValue, InMemoryDataStore, Record, RecordId, user_schema};
//! use chrono::NaiveDate;
//!
//! let store = InMemoryDataStore::new();
//! let schema = user_schema();
//! let record = Record::new()
//!     .with("id", FieldValue::Integer(1))
//!     .with("username", FieldValue::Text("ada".into()))
//!     .with("email", FieldValue::Text("a@x.com".into()))
//!     .with("dateOfBirth", FieldValue::Date(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()))
//!     .with("isActive", FieldValue::Boolean(true));
//!
//! store.insert(&schema, record.clone()).await.unwrap();
//! assert_eq!(store.get_by_id(&schema, &RecordId::Integer(1)).await.unwrap(), record);
//! assert!(store.insert(&schema, record).await.is_err());
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{DataStoreError, EntitySchema, FieldValue, Record, RecordId};

/// Page size used when the caller does not give one.
pub const DEFAULT_PAGE_LIMIT: u64 = 100;

/// Largest page a single request may return.
pub const MAX_PAGE_LIMIT: u64 = 1000;

//////////////////////////////////////////// Query shapes /////////////////////////////////////////////

/// A conjunction of field equality conditions. The empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, FieldValue)>,
}

impl Filter {
    /// The filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds the condition `field == value`.
    pub fn and_eq(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.conditions.push((field.into(), value));
        self
    }

    /// The conditions, in the order they were added.
    pub fn conditions(&self) -> &[(String, FieldValue)] {
        &self.conditions
    }

    /// True when the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluates the filter against a record.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| record.get(field) == Some(value))
    }
}

/// A clamped paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    offset: u64,
    limit: u64,
}

impl PageRequest {
    /// Clamps `offset` to at least zero and `limit` to `1..=MAX_PAGE_LIMIT`.
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset: offset.max(0) as u64,
            limit: limit.clamp(1, MAX_PAGE_LIMIT as i64) as u64,
        }
    }

    /// Number of records to skip.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Maximum number of records to return.
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_LIMIT as i64)
    }
}

/// One page of records together with the size of the whole collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Records in the whole collection, independent of the window.
    pub total: u64,
    /// Records skipped before this page.
    #[serde(rename = "skip")]
    pub offset: u64,
    /// Requested page size after clamping.
    pub limit: u64,
    /// The records of this page.
    #[serde(rename = "data")]
    pub records: Vec<Record>,
}

/// A record of a bulk insert that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    /// Position of the record in the submitted batch.
    pub index: usize,
    /// Why it failed.
    pub error: String,
}

/// Outcome of [`DataStore::bulk_insert`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkInsertResult {
    /// Identities stored; empty whenever `failures` is not.
    pub inserted_ids: Vec<RecordId>,
    /// Every record that failed, by batch index.
    pub failures: Vec<BulkFailure>,
}

impl BulkInsertResult {
    /// True when the batch was committed.
    pub fn committed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of [`DataStore::bulk_delete`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteResult {
    /// Number of records removed.
    pub deleted_count: u64,
    /// Requested identities that did not exist.
    pub not_found: Vec<RecordId>,
}

/////////////////////////////////////////////// Trait /////////////////////////////////////////////////

/// The persistence gateway.
///
/// Implementations must be safe to call concurrently; operations on the same identity are
/// serialized by the store's own concurrency control.
pub trait DataStore: Send + Sync + 'static {
    /// Creates the collection for `schema` if it does not exist yet.
    fn ensure_collection(
        &self,
        schema: &EntitySchema,
    ) -> impl Future<Output = Result<(), DataStoreError>> + Send;

    /// Stores a new record.
    ///
    /// # Returns
    /// * `Ok(Record)` - The stored record
    /// * `Err(DataStoreError::DuplicateKey)` - The identity is already taken
    fn insert(
        &self,
        schema: &EntitySchema,
        record: Record,
    ) -> impl Future<Output = Result<Record, DataStoreError>> + Send;

    /// Reads one record.
    ///
    /// # Returns
    /// * `Ok(Record)` - The record
    /// * `Err(DataStoreError::NotFound)` - No record has this identity
    fn get_by_id(
        &self,
        schema: &EntitySchema,
        id: &RecordId,
    ) -> impl Future<Output = Result<Record, DataStoreError>> + Send;

    /// Reads every record, ordered by identity.
    fn list_all(
        &self,
        schema: &EntitySchema,
    ) -> impl Future<Output = Result<Vec<Record>, DataStoreError>> + Send;

    /// Counts the records of the collection.
    fn count(
        &self,
        schema: &EntitySchema,
    ) -> impl Future<Output = Result<u64, DataStoreError>> + Send;

    /// Reads one window of the identity-ordered collection.
    fn list_page(
        &self,
        schema: &EntitySchema,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page, DataStoreError>> + Send;

    /// Reads the records matching `filter`, ordered by identity.
    fn search(
        &self,
        schema: &EntitySchema,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Record>, DataStoreError>> + Send;

    /// Replaces every field of an existing record.
    ///
    /// # Returns
    /// * `Ok(Record)` - The record as stored after the update
    /// * `Err(DataStoreError::NotFound)` - No record has this identity
    /// * `Err(DataStoreError::IntegrityViolation)` - The record carries a different identity
    fn update(
        &self,
        schema: &EntitySchema,
        id: &RecordId,
        record: Record,
    ) -> impl Future<Output = Result<Record, DataStoreError>> + Send;

    /// Removes a record.
    ///
    /// # Returns
    /// * `Ok(Record)` - The record as it was before deletion
    /// * `Err(DataStoreError::NotFound)` - No record has this identity
    fn delete_by_id(
        &self,
        schema: &EntitySchema,
        id: &RecordId,
    ) -> impl Future<Output = Result<Record, DataStoreError>> + Send;

    /// Stores a batch of new records, all or nothing.
    fn bulk_insert(
        &self,
        schema: &EntitySchema,
        records: Vec<Record>,
    ) -> impl Future<Output = Result<BulkInsertResult, DataStoreError>> + Send;

    /// Removes each listed identity that exists.
    fn bulk_delete(
        &self,
        schema: &EntitySchema,
        ids: &[RecordId],
    ) -> impl Future<Output = Result<BulkDeleteResult, DataStoreError>> + Send;
}

pub(crate) fn identity_mismatch(expected: &RecordId, found: Option<RecordId>) -> DataStoreError {
    let found = found.map_or_else(|| "none".to_string(), |id| id.to_string());
    DataStoreError::IntegrityViolation(format!(
        "record identity {} does not match {}",
        found, expected
    ))
}

////////////////////////////////////////// In-memory store ////////////////////////////////////////////

type Collection = BTreeMap<RecordId, Record>;

/// Thread-safe in-memory implementation of [`DataStore`].
///
/// All collections live behind a single `Mutex`; every operation takes the lock once, which
/// makes each call atomic with respect to every other call.
pub struct InMemoryDataStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl InMemoryDataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Collection>>, DataStoreError> {
        self.collections
            .lock()
            .map_err(|_| DataStoreError::Internal("in-memory store lock poisoned".to_string()))
    }

    fn read<T>(
        &self,
        schema: &EntitySchema,
        f: impl FnOnce(&Collection) -> T,
    ) -> Result<T, DataStoreError> {
        let collections = self.lock()?;
        let empty = Collection::new();
        Ok(f(collections.get(schema.name()).unwrap_or(&empty)))
    }

    fn write<T>(
        &self,
        schema: &EntitySchema,
        f: impl FnOnce(&mut Collection) -> Result<T, DataStoreError>,
    ) -> Result<T, DataStoreError> {
        let mut collections = self.lock()?;
        f(collections.entry(schema.name().to_string()).or_default())
    }
}

impl Default for InMemoryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

fn record_id(schema: &EntitySchema, record: &Record) -> Result<RecordId, DataStoreError> {
    record.id(schema).ok_or_else(|| {
        DataStoreError::IntegrityViolation(format!(
            "record has no value for identity field '{}'",
            schema.identity().name
        ))
    })
}

impl DataStore for InMemoryDataStore {
    async fn ensure_collection(&self, schema: &EntitySchema) -> Result<(), DataStoreError> {
        self.write(schema, |_| Ok(()))
    }

    async fn insert(&self, schema: &EntitySchema, record: Record) -> Result<Record, DataStoreError> {
        let id = record_id(schema, &record)?;
        self.write(schema, |collection| {
            if collection.contains_key(&id) {
                return Err(DataStoreError::DuplicateKey(id.to_string()));
            }
            collection.insert(id, record.clone());
            Ok(record)
        })
    }

    async fn get_by_id(
        &self,
        schema: &EntitySchema,
        id: &RecordId,
    ) -> Result<Record, DataStoreError> {
        self.read(schema, |collection| collection.get(id).cloned())?
            .ok_or(DataStoreError::NotFound)
    }

    async fn list_all(&self, schema: &EntitySchema) -> Result<Vec<Record>, DataStoreError> {
        self.read(schema, |collection| collection.values().cloned().collect())
    }

    async fn count(&self, schema: &EntitySchema) -> Result<u64, DataStoreError> {
        self.read(schema, |collection| collection.len() as u64)
    }

    async fn list_page(
        &self,
        schema: &EntitySchema,
        page: PageRequest,
    ) -> Result<Page, DataStoreError> {
        self.read(schema, |collection| Page {
            total: collection.len() as u64,
            offset: page.offset(),
            limit: page.limit(),
            records: collection
                .values()
                .skip(page.offset() as usize)
                .take(page.limit() as usize)
                .cloned()
                .collect(),
        })
    }

    async fn search(
        &self,
        schema: &EntitySchema,
        filter: &Filter,
    ) -> Result<Vec<Record>, DataStoreError> {
        self.read(schema, |collection| {
            collection
                .values()
                .filter(|record| filter.matches(record))
                .cloned()
                .collect()
        })
    }

    async fn update(
        &self,
        schema: &EntitySchema,
        id: &RecordId,
        record: Record,
    ) -> Result<Record, DataStoreError> {
        let found = record.id(schema);
        if found.as_ref() != Some(id) {
            return Err(identity_mismatch(id, found));
        }
        self.write(schema, |collection| match collection.get_mut(id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(record)
            }
            None => Err(DataStoreError::NotFound),
        })
    }

    async fn delete_by_id(
        &self,
        schema: &EntitySchema,
        id: &RecordId,
    ) -> Result<Record, DataStoreError> {
        self.write(schema, |collection| {
            collection.remove(id).ok_or(DataStoreError::NotFound)
        })
    }

    async fn bulk_insert(
        &self,
        schema: &EntitySchema,
        records: Vec<Record>,
    ) -> Result<BulkInsertResult, DataStoreError> {
        self.write(schema, |collection| {
            let mut staged = Collection::new();
            let mut result = BulkInsertResult::default();

            for (index, record) in records.into_iter().enumerate() {
                let id = match record_id(schema, &record) {
                    Ok(id) => id,
                    Err(e) => {
                        result.failures.push(BulkFailure {
                            index,
                            error: e.to_string(),
                        });
                        continue;
                    }
                };
                if collection.contains_key(&id) || staged.contains_key(&id) {
                    result.failures.push(BulkFailure {
                        index,
                        error: DataStoreError::DuplicateKey(id.to_string()).to_string(),
                    });
                    continue;
                }
                result.inserted_ids.push(id.clone());
                staged.insert(id, record);
            }

            if result.committed() {
                collection.extend(staged);
            } else {
                result.inserted_ids.clear();
            }
            Ok(result)
        })
    }

    async fn bulk_delete(
        &self,
        schema: &EntitySchema,
        ids: &[RecordId],
    ) -> Result<BulkDeleteResult, DataStoreError> {
        self.write(schema, |collection| {
            let mut result = BulkDeleteResult::default();
            for id in ids {
                if collection.remove(id).is_some() {
                    result.deleted_count += 1;
                } else {
                    result.not_found.push(id.clone());
                }
            }
            Ok(result)
        })
    }
}
