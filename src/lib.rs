//! # Roster: Schema-Driven Entity Collections
//!
//! Roster turns a declarative entity schema (fields, types, constraints, and one identity
//! field) into a validated, persisted, paginated, and searchable resource. Nothing in the
//! core is specific to any one entity; the reference deployment serves a `user` entity with
//! `id`, `username`, `email`, `dateOfBirth`, and `isActive`.
//!
//! ## Core Concepts
//!
//! ### Schemas
//! An [`EntitySchema`] lists the fields of an entity type in order. Each field has a semantic
//! [`FieldType`] (`integer`, `text`, `boolean`, `date`, `float`, `enum`), a `required` flag,
//! and type-specific constraints. Exactly one field is the identity. A [`SchemaRegistry`]
//! holds every schema of a deployment and is read-only once built.
//!
//! ### Validation
//! Untrusted JSON becomes a [`Record`] only through [`validate_record`]. Validation is strict:
//! unknown fields, missing required fields, and ill-typed values are rejected, and the first
//! violation is reported as a [`ValidationError`].
//!
//! ### Persistence
//! The [`DataStore`] trait is the only place roster performs durable I/O. Inserting an
//! existing identity is a conflict, never an overwrite. Bulk insert is all-or-nothing; bulk
//! delete is per-id. [`InMemoryDataStore`] and [`sql::PostgresDataStore`] implement it.
//!
//! ### Services and errors
//! An [`EntityService`] binds one schema to an injected store and exposes create, read,
//! list, count, page, search, update, delete, and the bulk operations. Every failure comes
//! back as an [`ApiError`] whose [`ErrorKind`] maps onto an HTTP status.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HTTP transport (axum router)            │
//! ├─────────────────────────────────────────┤
//! │ Entity service + error mapping          │
//! ├─────────────────────────────────────────┤
//! │ Validation                              │
//! ├─────────────────────────────────────────┤
//! │ Data store (in-memory or PostgreSQL)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! # #[tokio::main]
//! # async fn main() {
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use roster::{EntityService, ErrorKind, InMemoryDataStore, user_schema};
//! use serde_json::json;
//!
//! let users = EntityService::new(Arc::new(user_schema()), Arc::new(InMemoryDataStore::new()));
//!
//! let ada = json!({"id": 1, "username": "ada", "email": "a@x.com",
//!                  "dateOfBirth": "1990-01-01", "isActive": true});
//! users.create(&ada).await.unwrap();
//! assert_eq!(users.get_by_id("1").await.unwrap(), ada);
//!
//! let query = HashMap::from([("username".to_string(), "ada".to_string())]);
//! assert_eq!(users.search(&query).await.unwrap(), vec![ada.clone()]);
//!
//! let mut bad = ada.clone();
//! bad["dateOfBirth"] = json!("yesterday");
//! assert_eq!(users.update("1", &bad).await.unwrap_err().kind, ErrorKind::BadRequest);
//!
//! let page = users.list_page(0, 10).await.unwrap();
//! assert_eq!(page.total, 1);
//! # }
//! ```

#![deny(missing_docs)]
mod api_error;
mod data_store;
mod errors;
mod record;
mod schema;
mod service;
mod validate;

/// Configuration file loading for the roster daemon.
pub mod config;

/// Structured logging setup shared by the roster binaries.
pub mod logging;

/// HTTP routes binding the entity service.
pub mod router;

/// PostgreSQL-backed data store.
pub mod sql;

// CLI utility modules

/// Command-line interface utilities for program termination and output formatting.
///
/// This module provides common CLI utilities for roster binaries, including
/// error handling, formatted output, and program termination functions.
pub mod cli_utils;

/// Command-line interface command handlers.
///
/// This module contains the command handlers for the rosterctl CLI application.
pub mod commands;

/// HTTP client utilities for interacting with roster services.
///
/// This module provides a JSON client for the roster HTTP API, handling requests,
/// responses, and error conditions.
pub mod http_utils;

pub use api_error::{ApiError, ErrorBody, ErrorKind};
pub use config::{ConfigError, RosterConfig};
pub use data_store::{
    BulkDeleteResult, BulkFailure, BulkInsertResult, DEFAULT_PAGE_LIMIT, DataStore, Filter,
    InMemoryDataStore, MAX_PAGE_LIMIT, Page, PageRequest,
};
pub use errors::DataStoreError;
pub use record::{FieldValue, Record, RecordId};
pub use router::{create_entity_router, create_router};
pub use schema::{
    EntityDef, EntitySchema, FieldDef, FieldType, SchemaError, SchemaRegistry, user_schema,
};
pub use service::{BulkCreateResponse, BulkDeleteResponse, Catalog, CountResponse, EntityService};
pub use validate::{
    BODY_FIELD, ValidationError, build_filter, parse_field_text, parse_record_id,
    record_id_from_json, validate_record, validate_value,
};
