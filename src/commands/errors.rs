//! # Command Error Handling
//!
//! This module provides error handling utilities for rosterctl CLI commands
//! using the handled crate for consistent error property extraction.

use handled::Handle;

use crate::api_error::ErrorBody;

/// User-friendly error information that can be extracted from various error types
#[derive(Debug, Clone)]
pub struct UserError {
    /// The main error message to display to the user
    pub message: String,
    /// Optional usage hint to help the user correct the error
    pub usage_hint: Option<String>,
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Implements Handle<UserError> for itself to allow extraction
impl Handle<UserError> for UserError {
    fn handle(&self) -> Option<UserError> {
        Some(self.clone())
    }
}

/// HTTP operation errors that provide user-friendly messages
#[derive(Debug)]
pub struct HttpOperationError {
    /// The name of the operation that failed
    pub operation: String,
    /// The HTTP status code if available
    pub status: Option<u16>,
    /// Detailed error information
    pub details: String,
    /// Per-item failures reported by a bulk operation
    pub item_errors: Vec<String>,
}

impl std::fmt::Display for HttpOperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(status) = self.status {
            write!(
                f,
                "{} failed (HTTP {}): {}",
                self.operation, status, self.details
            )
        } else {
            write!(f, "{} failed: {}", self.operation, self.details)
        }
    }
}

impl std::error::Error for HttpOperationError {}

impl Handle<UserError> for HttpOperationError {
    fn handle(&self) -> Option<UserError> {
        let mut message = self.to_string();
        for item in &self.item_errors {
            message.push_str(&format!("\n  {}", item));
        }

        let usage_hint = match self.status {
            Some(404) => Some(
                "The entity or record was not found. Check the entity name and ID.".to_string(),
            ),
            Some(400) => Some("Invalid request. Check your input data and try again.".to_string()),
            Some(409) => Some(
                "A record with this identity already exists. Use update to change it.".to_string(),
            ),
            Some(500..=599) => {
                Some("Server error. The service may be temporarily unavailable.".to_string())
            }
            None => Some("Could not reach the server. Is rosterd running?".to_string()),
            _ => None,
        };

        Some(UserError {
            message,
            usage_hint,
        })
    }
}

impl HttpOperationError {
    /// Creates an HttpOperationError from a reqwest Response
    ///
    /// Structured roster error bodies contribute their message and bulk item errors; any
    /// other body is reported verbatim.
    pub async fn from_response(response: reqwest::Response, operation: &str) -> Self {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let mut error = Self {
            operation: operation.to_string(),
            status: Some(status),
            details: text.clone(),
            item_errors: Vec::new(),
        };
        if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
            error.details = body.message;
            error.item_errors = body
                .errors
                .into_iter()
                .map(|failure| format!("item {}: {}", failure.index, failure.error))
                .collect();
        }
        if error.details.is_empty() {
            error.details = "No error details".to_string();
        }
        error
    }

    /// Creates an HttpOperationError with a custom message
    pub fn new(operation: &str, details: &str) -> Self {
        Self {
            operation: operation.to_string(),
            status: None,
            details: details.to_string(),
            item_errors: Vec::new(),
        }
    }
}

/// Validation error for command arguments
#[derive(Debug)]
pub struct ArgumentError {
    /// The argument name that failed validation
    pub argument: String,
    /// The value that was invalid
    pub value: String,
    /// The reason why validation failed
    pub reason: String,
}

impl std::fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid {}: '{}' - {}",
            self.argument, self.value, self.reason
        )
    }
}

impl std::error::Error for ArgumentError {}

impl Handle<UserError> for ArgumentError {
    fn handle(&self) -> Option<UserError> {
        Some(UserError {
            message: self.to_string(),
            usage_hint: Some("Search terms are written as field=value".to_string()),
        })
    }
}

/// Enhanced error formatting for CLI output
pub fn format_cli_error<E>(error: &E) -> String
where
    E: Handle<UserError> + std::fmt::Display,
{
    if let Some(user_error) = error.handle() {
        let mut output = format!("Error: {}", user_error.message);
        if let Some(hint) = user_error.usage_hint {
            output.push_str(&format!("\nHint: {}", hint));
        }
        output
    } else {
        format!("Error: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_gets_update_hint() {
        let error = HttpOperationError {
            operation: "POST http://localhost:8000/user/".to_string(),
            status: Some(409),
            details: "user with identity 1 already exists".to_string(),
            item_errors: Vec::new(),
        };
        let output = format_cli_error(&error);
        assert!(output.starts_with(
            "Error: POST http://localhost:8000/user/ failed (HTTP 409): user with identity 1"
        ));
        assert!(output.contains("Hint: A record with this identity already exists"));
    }

    #[test]
    fn bulk_item_errors_are_listed() {
        let error = HttpOperationError {
            operation: "POST bulk".to_string(),
            status: Some(400),
            details: "Bulk creation failed".to_string(),
            item_errors: vec!["item 1: invalid field 'email': required field is missing".into()],
        };
        let user_error = error.handle().unwrap();
        assert!(user_error.message.contains("\n  item 1: invalid field 'email'"));
    }

    #[test]
    fn unreachable_server_hint() {
        let error = HttpOperationError::new("GET x", "connection refused");
        assert_eq!(
            error.handle().unwrap().usage_hint.as_deref(),
            Some("Could not reach the server. Is rosterd running?")
        );
    }

    #[test]
    fn argument_error_message() {
        let error = ArgumentError {
            argument: "search term".to_string(),
            value: "username".to_string(),
            reason: "expected field=value".to_string(),
        };
        assert_eq!(
            format_cli_error(&error),
            "Error: Invalid search term: 'username' - expected field=value\n\
             Hint: Search terms are written as field=value"
        );
    }
}
