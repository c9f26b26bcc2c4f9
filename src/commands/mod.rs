//! # Command Handlers
//!
//! This module contains the command handlers for the rosterctl CLI application.
//!
//! ## Structure
//!
//! - `record` - Record commands of one entity (create, get, list, count, page, search,
//!   update, delete, bulk-create, bulk-delete)
//! - `errors` - User-facing error types with usage hints
//! - `error_extensions` - Usage hints for foreign error types
//! - `shared` - Shared utilities and validation functions

pub mod error_extensions;
pub mod errors;
pub mod record;
pub mod shared;

pub use record::handle_record_command;
pub use shared::CommandContext;
