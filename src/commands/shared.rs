//! # Shared Command Utilities
//!
//! This module provides shared validation, parsing, and utility functions
//! used across command handlers to reduce code duplication.

use std::collections::BTreeMap;
use std::fmt::Display;

use handled::Handle;
use serde_json::Value;

use crate::cli_utils;
use crate::commands::errors::{ArgumentError, UserError};
use crate::http_utils::RosterClient;

/// Everything a record subcommand needs besides its arguments.
pub struct CommandContext<'a> {
    /// The entity the command operates on.
    pub entity: &'a str,
    /// HTTP client for API communication.
    pub client: &'a RosterClient,
    /// Print results as YAML instead of JSON.
    pub yaml: bool,
}

/// Exits with the error's message and hint.
fn exit_with_user_error<E>(error: E) -> !
where
    E: Handle<UserError> + Display,
{
    match error.handle() {
        Some(UserError {
            message,
            usage_hint: Some(hint),
        }) => cli_utils::exit_with_usage_error(&message, &hint),
        Some(UserError { message, .. }) => cli_utils::exit_with_error(&message),
        None => cli_utils::exit_with_error(&error.to_string()),
    }
}

/// Parses a JSON command argument, exiting with a hint when it is malformed.
pub fn parse_json_or_exit(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|e: serde_json::Error| exit_with_user_error(e))
}

/// Parses a paging bound, exiting with a hint when it is not a number.
pub fn parse_i64_or_exit(text: &str) -> i64 {
    text.parse()
        .unwrap_or_else(|e: std::num::ParseIntError| exit_with_user_error(e))
}

/// Splits `field=value` search terms.
///
/// Later terms for the same field replace earlier ones.
pub fn parse_search_terms(terms: &[String]) -> Result<BTreeMap<String, String>, ArgumentError> {
    let mut params = BTreeMap::new();
    for term in terms {
        match term.split_once('=') {
            Some((field, value)) if !field.is_empty() => {
                params.insert(field.to_string(), value.to_string());
            }
            _ => {
                return Err(ArgumentError {
                    argument: "search term".to_string(),
                    value: term.clone(),
                    reason: "expected field=value".to_string(),
                });
            }
        }
    }
    Ok(params)
}

/// [`parse_search_terms`], exiting on malformed terms.
pub fn parse_search_terms_or_exit(terms: &[String]) -> BTreeMap<String, String> {
    parse_search_terms(terms).unwrap_or_else(|e| exit_with_user_error(e))
}

/// Turns identity arguments into JSON values: integers where they parse, text otherwise.
pub fn identity_values(args: &[String]) -> Vec<Value> {
    args.iter()
        .map(|arg| match arg.parse::<i64>() {
            Ok(i) => Value::from(i),
            Err(_) => Value::from(arg.as_str()),
        })
        .collect()
}

/// Validates both minimum and maximum argument counts.
///
/// # Arguments
/// * `args` - The command arguments array
/// * `min_count` - The minimum number of arguments required (including subcommand)
/// * `max_count` - The maximum number of arguments allowed (including subcommand)
/// * `command` - The command name for error message
/// * `usage` - The usage string to display
pub fn validate_args_count_or_exit(
    args: &[String],
    min_count: usize,
    max_count: usize,
    command: &str,
    usage: &str,
) {
    if args.len() < min_count {
        cli_utils::exit_with_usage_error(
            &format!("{} command requires more arguments", command),
            usage,
        );
    }
    if args.len() > max_count {
        cli_utils::exit_with_usage_error(
            &format!("{} command has too many arguments", command),
            usage,
        );
    }
}

/// Macro to generate command dispatcher boilerplate.
macro_rules! dispatch_command {
    ($command_name:expr, $usage:expr, $args:expr, $context:expr, {
        $($subcommand:expr => $handler:expr),* $(,)?
    }) => {
        if $args.is_empty() {
            crate::cli_utils::exit_with_usage_error(
                &format!("{} command requires a subcommand", $command_name),
                $usage,
            );
        }

        match $args[0].as_str() {
            $(
                $subcommand => $handler($args, $context).await,
            )*
            _ => {
                let available_subcommands = vec![$($subcommand),*];
                crate::cli_utils::exit_with_error(&format!(
                    "Unknown {} subcommand '{}'. Available subcommands: {}",
                    $command_name,
                    $args[0],
                    available_subcommands.join(", ")
                ));
            }
        }
    };
}

pub(crate) use dispatch_command;
