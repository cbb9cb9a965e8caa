// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Failures inside a single invocation.
//!
//! None of these ever reach the caller: the adapter logs them and answers
//! with the fixed 500 response.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Gateway body is not valid base64: {source}")]
    Base64 {
        #[source]
        source: base64::DecodeError,
    },

    #[error("Gateway body is not valid UTF-8")]
    Utf8,

    #[error("Gateway body is not valid JSON: {source}")]
    Body {
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected a parameter mapping, found {found}")]
    NotAMapping { found: &'static str },

    #[error("Parameters do not match the handler signature: {source}")]
    Parameters {
        #[source]
        source: serde_json::Error,
    },

    #[error("Handler failed: {message}")]
    Handler { message: String },

    #[error("Handler panicked: {message}")]
    Panicked { message: String },

    #[error("Failed to serialize handler result: {source}")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InvocationError::NotAMapping { found: "array" };
        assert_eq!(err.to_string(), "Expected a parameter mapping, found array");

        let err = InvocationError::Handler {
            message: "division by zero".to_string(),
        };
        assert!(err.to_string().contains("division by zero"));
    }
}
