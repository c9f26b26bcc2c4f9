//! PostgreSQL implementation of the [`DataStore`] trait.
//!
//! Each entity schema is stored in one table whose columns are the schema's fields. Every
//! trait method runs inside its own transaction, committed on success and rolled back when the
//! transaction is dropped on any error path.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::data_store::{
    BulkDeleteResult, BulkFailure, BulkInsertResult, DataStore, Filter, Page, PageRequest,
    identity_mismatch,
};
use crate::{DataStoreError, EntitySchema, Record, RecordId};

/// SQL generation and row decoding for schema-defined tables.
pub(crate) mod collection;

use collection::{
    bind_id, bind_record, bind_value, count_sql, create_table_sql, decode_row, delete_sql,
    insert_sql, search_sql, select_all_sql, select_by_id_sql, select_page_sql, update_sql,
};

/// Result type for database operations.
pub type SqlResult<T> = Result<T, DataStoreError>;

/// A [`DataStore`] backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PostgresDataStore {
    pool: PgPool,
}

impl PostgresDataStore {
    /// Wraps an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` with a bounded pool.
    ///
    /// `acquire_timeout` bounds how long any single operation waits for a connection.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> SqlResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> SqlResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }
}

/// Attributes a unique violation to the identity being written; the database message names
/// the constraint rather than the value.
fn with_identity(err: sqlx::Error, id: &RecordId) -> DataStoreError {
    match DataStoreError::from(err) {
        DataStoreError::DuplicateKey(_) => DataStoreError::DuplicateKey(id.to_string()),
        other => other,
    }
}

/// Constraint violations are reported against their batch index; anything else aborts the
/// whole bulk insert.
fn item_failure(index: usize, err: DataStoreError) -> SqlResult<BulkFailure> {
    match err {
        DataStoreError::DuplicateKey(_) | DataStoreError::IntegrityViolation(_) => {
            Ok(BulkFailure {
                index,
                error: err.to_string(),
            })
        }
        other => Err(other),
    }
}

fn require_identity(schema: &EntitySchema, record: &Record) -> SqlResult<RecordId> {
    record.id(schema).ok_or_else(|| {
        DataStoreError::IntegrityViolation(format!(
            "record has no value for identity field '{}'",
            schema.identity().name
        ))
    })
}

impl DataStore for PostgresDataStore {
    async fn ensure_collection(&self, schema: &EntitySchema) -> SqlResult<()> {
        let mut tx = self.begin().await?;
        sqlx::query(&create_table_sql(schema))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert(&self, schema: &EntitySchema, record: Record) -> SqlResult<Record> {
        let id = require_identity(schema, &record)?;
        let sql = insert_sql(schema);
        let mut tx = self.begin().await?;
        let row = bind_record(sqlx::query(&sql), schema, &record, false)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| with_identity(e, &id))?;
        let stored = decode_row(schema, &row)?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn get_by_id(&self, schema: &EntitySchema, id: &RecordId) -> SqlResult<Record> {
        let sql = select_by_id_sql(schema);
        let mut tx = self.begin().await?;
        let row = bind_id(sqlx::query(&sql), id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DataStoreError::NotFound)?;
        let record = decode_row(schema, &row)?;
        tx.commit().await?;
        Ok(record)
    }

    async fn list_all(&self, schema: &EntitySchema) -> SqlResult<Vec<Record>> {
        let sql = select_all_sql(schema);
        let mut tx = self.begin().await?;
        let rows = sqlx::query(&sql).fetch_all(&mut *tx).await?;
        let records = rows
            .iter()
            .map(|row| decode_row(schema, row))
            .collect::<SqlResult<Vec<_>>>()?;
        tx.commit().await?;
        Ok(records)
    }

    async fn count(&self, schema: &EntitySchema) -> SqlResult<u64> {
        let sql = count_sql(schema);
        let mut tx = self.begin().await?;
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *tx).await?;
        tx.commit().await?;
        Ok(count.max(0) as u64)
    }

    async fn list_page(&self, schema: &EntitySchema, page: PageRequest) -> SqlResult<Page> {
        let count = count_sql(schema);
        let select = select_page_sql(schema);
        let mut tx = self.begin().await?;
        let total: i64 = sqlx::query_scalar(&count).fetch_one(&mut *tx).await?;
        let rows = sqlx::query(&select)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&mut *tx)
            .await?;
        let records = rows
            .iter()
            .map(|row| decode_row(schema, row))
            .collect::<SqlResult<Vec<_>>>()?;
        tx.commit().await?;
        Ok(Page {
            total: total.max(0) as u64,
            offset: page.offset(),
            limit: page.limit(),
            records,
        })
    }

    async fn search(&self, schema: &EntitySchema, filter: &Filter) -> SqlResult<Vec<Record>> {
        let sql = search_sql(schema, filter);
        let mut query = sqlx::query(&sql);
        for (name, value) in filter.conditions() {
            let field = schema.field(name).ok_or_else(|| {
                DataStoreError::IntegrityViolation(format!(
                    "'{}' is not a field of {}",
                    name,
                    schema.name()
                ))
            })?;
            query = bind_value(query, field.field_type, value);
        }
        let mut tx = self.begin().await?;
        let rows = query.fetch_all(&mut *tx).await?;
        let records = rows
            .iter()
            .map(|row| decode_row(schema, row))
            .collect::<SqlResult<Vec<_>>>()?;
        tx.commit().await?;
        Ok(records)
    }

    async fn update(
        &self,
        schema: &EntitySchema,
        id: &RecordId,
        record: Record,
    ) -> SqlResult<Record> {
        let found = record.id(schema);
        if found.as_ref() != Some(id) {
            return Err(identity_mismatch(id, found));
        }
        let Some(sql) = update_sql(schema) else {
            // Nothing but the identity to write; the update is an existence check.
            return self.get_by_id(schema, id).await;
        };
        let mut tx = self.begin().await?;
        let row = bind_id(bind_record(sqlx::query(&sql), schema, &record, true), id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DataStoreError::NotFound)?;
        let stored = decode_row(schema, &row)?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn delete_by_id(&self, schema: &EntitySchema, id: &RecordId) -> SqlResult<Record> {
        let sql = delete_sql(schema);
        let mut tx = self.begin().await?;
        let row = bind_id(sqlx::query(&sql), id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DataStoreError::NotFound)?;
        let removed = decode_row(schema, &row)?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn bulk_insert(
        &self,
        schema: &EntitySchema,
        records: Vec<Record>,
    ) -> SqlResult<BulkInsertResult> {
        let sql = insert_sql(schema);
        let mut tx = self.begin().await?;
        let mut result = BulkInsertResult::default();

        for (index, record) in records.iter().enumerate() {
            let id = match require_identity(schema, record) {
                Ok(id) => id,
                Err(e) => {
                    result.failures.push(BulkFailure {
                        index,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            sqlx::query("SAVEPOINT bulk_item")
                .execute(&mut *tx)
                .await?;
            match bind_record(sqlx::query(&sql), schema, record, false)
                .execute(&mut *tx)
                .await
            {
                Ok(_) => {
                    sqlx::query("RELEASE SAVEPOINT bulk_item")
                        .execute(&mut *tx)
                        .await?;
                    result.inserted_ids.push(id);
                }
                Err(e) => {
                    let failure = item_failure(index, with_identity(e, &id))?;
                    sqlx::query("ROLLBACK TO SAVEPOINT bulk_item")
                        .execute(&mut *tx)
                        .await?;
                    result.failures.push(failure);
                }
            }
        }

        if result.committed() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
            result.inserted_ids.clear();
        }
        Ok(result)
    }

    async fn bulk_delete(
        &self,
        schema: &EntitySchema,
        ids: &[RecordId],
    ) -> SqlResult<BulkDeleteResult> {
        let sql = delete_sql(schema);
        let mut tx = self.begin().await?;
        let mut result = BulkDeleteResult::default();
        for id in ids {
            let removed = bind_id(sqlx::query(&sql), id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if removed > 0 {
                result.deleted_count += removed;
            } else {
                result.not_found.push(id.clone());
            }
        }
        tx.commit().await?;
        Ok(result)
    }
}

#[cfg(test)]
/// Test utilities for PostgreSQL database operations.
pub mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use chrono::NaiveDate;
    use sqlx::PgPool;

    use super::*;
    use crate::{FieldValue, user_schema};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    #[test]
    fn bulk_item_failures_are_constraint_violations_only() {
        let id = RecordId::Integer(7);

        let failure = item_failure(2, DataStoreError::DuplicateKey(id.to_string())).unwrap();
        assert_eq!(failure.index, 2);
        assert_eq!(failure.error, "record with identity 7 already exists");

        let failure =
            item_failure(0, DataStoreError::IntegrityViolation("null email".into())).unwrap();
        assert_eq!(failure.error, "integrity violation: null email");

        let err = item_failure(1, with_identity(sqlx::Error::PoolTimedOut, &id)).unwrap_err();
        assert!(matches!(err, DataStoreError::Internal(_)));
        let err = item_failure(1, with_identity(sqlx::Error::RowNotFound, &id)).unwrap_err();
        assert_eq!(err, DataStoreError::NotFound);
    }

    /// Creates a unique test database for each test invocation.
    ///
    /// Returns `None` when `TEST_DATABASE_URL` is unset, in which case the calling test
    /// returns early. The database name combines the process ID, the current time, and an
    /// atomic counter so concurrent tests never share tables.
    pub async fn setup_test_db() -> Option<PgPool> {
        let base_url = std::env::var("TEST_DATABASE_URL").ok()?;

        let pid = std::process::id();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let db_name = format!("roster_test_{}_{}_{}", pid, timestamp, counter);

        let mut parsed_url = url::Url::parse(&base_url).expect("Invalid database URL");

        let admin_pool = PgPool::connect(&base_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::query(&format!("CREATE DATABASE {}", db_name))
            .execute(&admin_pool)
            .await
            .expect("Failed to create test database");

        admin_pool.close().await;

        parsed_url.set_path(&format!("/{}", db_name));

        let pool = PgPool::connect(parsed_url.as_str())
            .await
            .expect("Failed to connect to test database");
        Some(pool)
    }

    async fn user_store() -> Option<PostgresDataStore> {
        let store = PostgresDataStore::new(setup_test_db().await?);
        store.ensure_collection(&user_schema()).await.unwrap();
        Some(store)
    }

    fn user(id: i64, name: &str) -> Record {
        Record::new()
            .with("id", FieldValue::Integer(id))
            .with("username", FieldValue::Text(name.to_string()))
            .with("email", FieldValue::Text(format!("{}@x.com", name)))
            .with(
                "dateOfBirth",
                FieldValue::Date(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()),
            )
            .with("isActive", FieldValue::Boolean(true))
    }

    #[tokio::test]
    async fn insert_get_and_duplicate() {
        let Some(store) = user_store().await else {
            return;
        };
        let schema = user_schema();

        let stored = store.insert(&schema, user(1, "ada")).await.unwrap();
        assert_eq!(stored, user(1, "ada"));
        assert_eq!(
            store.get_by_id(&schema, &RecordId::Integer(1)).await.unwrap(),
            user(1, "ada")
        );
        assert_eq!(
            store.insert(&schema, user(1, "bob")).await,
            Err(DataStoreError::DuplicateKey("1".to_string()))
        );
        assert_eq!(
            store.get_by_id(&schema, &RecordId::Integer(2)).await,
            Err(DataStoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let Some(store) = user_store().await else {
            return;
        };
        store.ensure_collection(&user_schema()).await.unwrap();
        assert_eq!(store.count(&user_schema()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pages_are_ordered_slices() {
        let Some(store) = user_store().await else {
            return;
        };
        let schema = user_schema();
        for id in [5, 3, 9, 1] {
            store.insert(&schema, user(id, "u")).await.unwrap();
        }
        let page = store
            .list_page(&schema, PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        let ids: Vec<_> = page.records.iter().filter_map(|r| r.id(&schema)).collect();
        assert_eq!(ids, vec![RecordId::Integer(3), RecordId::Integer(5)]);
    }

    #[tokio::test]
    async fn search_update_and_delete() {
        let Some(store) = user_store().await else {
            return;
        };
        let schema = user_schema();
        store.insert(&schema, user(1, "ada")).await.unwrap();
        store.insert(&schema, user(2, "bob")).await.unwrap();

        let filter = Filter::all().and_eq("username", FieldValue::Text("bob".to_string()));
        let found = store.search(&schema, &filter).await.unwrap();
        assert_eq!(found, vec![user(2, "bob")]);

        let updated = store
            .update(&schema, &RecordId::Integer(2), user(2, "robert"))
            .await
            .unwrap();
        assert_eq!(updated, user(2, "robert"));
        assert_eq!(
            store
                .update(&schema, &RecordId::Integer(7), user(7, "x"))
                .await,
            Err(DataStoreError::NotFound)
        );

        let removed = store
            .delete_by_id(&schema, &RecordId::Integer(1))
            .await
            .unwrap();
        assert_eq!(removed, user(1, "ada"));
        assert_eq!(store.count(&schema).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bulk_insert_rolls_back_on_any_failure() {
        let Some(store) = user_store().await else {
            return;
        };
        let schema = user_schema();
        store.insert(&schema, user(2, "bob")).await.unwrap();

        let result = store
            .bulk_insert(&schema, vec![user(1, "ada"), user(2, "dup"), user(3, "cy")])
            .await
            .unwrap();
        assert!(!result.committed());
        assert!(result.inserted_ids.is_empty());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].index, 1);
        assert_eq!(store.count(&schema).await.unwrap(), 1);

        let result = store
            .bulk_insert(&schema, vec![user(1, "ada"), user(3, "cy")])
            .await
            .unwrap();
        assert_eq!(
            result.inserted_ids,
            vec![RecordId::Integer(1), RecordId::Integer(3)]
        );
        assert_eq!(store.count(&schema).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn bulk_delete_reports_missing() {
        let Some(store) = user_store().await else {
            return;
        };
        let schema = user_schema();
        store.insert(&schema, user(1, "ada")).await.unwrap();
        let result = store
            .bulk_delete(&schema, &[RecordId::Integer(1), RecordId::Integer(4)])
            .await
            .unwrap();
        assert_eq!(result.deleted_count, 1);
        assert_eq!(result.not_found, vec![RecordId::Integer(4)]);
    }
}
