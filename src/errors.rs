// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! User-facing errors for the page host.
//!
//! Responses carry a friendly message and a unique reference code; the
//! full internal detail goes to the logs only. In particular, a rejected
//! key never reveals which tiers or keys exist.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;

/// Generate a unique error reference code.
/// Format: ERR-YYYYMMDD-XXXXXX (e.g., ERR-20250115-A3F8K2)
pub fn generate_reference_code() -> String {
    let date = Utc::now().format("%Y%m%d");
    let mut rng = rand::thread_rng();
    let chars: Vec<char> = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789".chars().collect();
    let random: String = (0..6)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect();
    format!("ERR-{}-{}", date, random)
}

/// User-facing error types for the page host.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error_type", rename_all = "snake_case")]
pub enum UserError {
    /// Invalid request from client (400)
    InvalidRequest { message: String, reference: String },

    /// Key submission rejected (401)
    AuthenticationRequired { message: String, reference: String },

    /// Resource not found (404)
    NotFound { message: String, reference: String },
}

impl UserError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            UserError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            UserError::AuthenticationRequired { .. } => StatusCode::UNAUTHORIZED,
            UserError::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    /// Get the user-facing message.
    pub fn message(&self) -> &str {
        match self {
            UserError::InvalidRequest { message, .. } => message,
            UserError::AuthenticationRequired { message, .. } => message,
            UserError::NotFound { message, .. } => message,
        }
    }

    /// Create an InvalidRequest error.
    pub fn invalid_request(user_message: &str) -> Self {
        let reference = generate_reference_code();
        tracing::warn!(reference = %reference, "invalid request: {user_message}");
        Self::InvalidRequest {
            message: user_message.to_string(),
            reference,
        }
    }

    /// Create the rejected-key error. The message deliberately names no
    /// tier and no key format.
    pub fn key_rejected() -> Self {
        let reference = generate_reference_code();
        tracing::info!(reference = %reference, "key submission rejected");
        Self::AuthenticationRequired {
            message: "Invalid key.".to_string(),
            reference,
        }
    }

    /// Create a NotFound error.
    pub fn not_found(resource: &str) -> Self {
        let reference = generate_reference_code();
        tracing::info!(reference = %reference, resource = %resource, "resource not found");
        Self::NotFound {
            message: format!("The requested {} was not found.", resource),
            reference,
        }
    }
}

/// User-facing error response structure (JSON format).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: UserError,
    pub status: u16,
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let response = ErrorResponse {
            status: status.as_u16(),
            error: self,
        };

        let body = serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"error":{"error_type":"invalid_request","message":"An unexpected error occurred","reference":"ERR-FALLBACK"},"status":400}"#.to_string()
        });

        (status, [("content-type", "application/json")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_reference_code() {
        let code = generate_reference_code();
        assert!(code.starts_with("ERR-"));
        assert_eq!(code.len(), 19); // ERR-YYYYMMDD-XXXXXX = 4+8+1+6

        // Should be unique
        let code2 = generate_reference_code();
        assert_ne!(code, code2);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            UserError::invalid_request("test").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UserError::key_rejected().status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            UserError::not_found("page").status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_key_rejection_reveals_nothing() {
        let error = UserError::key_rejected();
        let message = error.message().to_lowercase();
        assert!(!message.contains("free"));
        assert!(!message.contains("premium"));
        assert!(!message.contains("impoor"));
    }

    #[test]
    fn test_user_error_serialization() {
        let error = UserError::key_rejected();
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("authentication_required"));
        assert!(json.contains("reference"));
    }
}
