//! # Error Extensions for Handled
//!
//! This module extends foreign error types to implement Handle<UserError>
//! for consistent error property extraction.

use super::errors::UserError;
use handled::Handle;

/// Implement Handle<UserError> for serde_json::Error
impl Handle<UserError> for serde_json::Error {
    fn handle(&self) -> Option<UserError> {
        Some(UserError {
            message: format!("JSON parsing error: {}", self),
            usage_hint: Some(
                "Quote the JSON argument, e.g. '{\"id\": 1, \"username\": \"ada\"}'".to_string(),
            ),
        })
    }
}

/// Implement Handle<UserError> for std::num::ParseIntError
impl Handle<UserError> for std::num::ParseIntError {
    fn handle(&self) -> Option<UserError> {
        Some(UserError {
            message: format!("Invalid number: {}", self),
            usage_hint: Some("skip and limit must be whole numbers".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_suggest_quoting() {
        let error = serde_json::from_str::<serde_json::Value>("{id: 1}").unwrap_err();
        let user_error = error.handle().unwrap();
        assert!(user_error.message.starts_with("JSON parsing error"));
        assert!(user_error.usage_hint.unwrap().contains("Quote"));
    }

    #[test]
    fn int_errors_mention_paging() {
        let error = "ten".parse::<i64>().unwrap_err();
        assert_eq!(
            error.handle().unwrap().usage_hint.as_deref(),
            Some("skip and limit must be whole numbers")
        );
    }
}
