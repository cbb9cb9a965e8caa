// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Envelope shape detection.
//!
//! A function is invoked either directly, with the parameter mapping as the
//! whole event, or through the HTTP gateway, with the mapping serialized into
//! a string `body` next to transport metadata. Both resolve to the same
//! [`Params`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::InvocationError;

/// Named parameters handed to a handler.
pub type Params = Map<String, Value>;

/// How an event reached the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeShape {
    /// The event is the parameter mapping.
    Direct,
    /// The event carries the mapping as a string (or null) `body`.
    Gateway,
}

impl EnvelopeShape {
    pub fn detect(event: &Value) -> Self {
        match event.get("body") {
            Some(Value::String(_)) | Some(Value::Null) => EnvelopeShape::Gateway,
            _ => EnvelopeShape::Direct,
        }
    }
}

/// Resolve an event of either shape into the handler's parameters.
pub fn resolve_params(event: Value) -> Result<Params, InvocationError> {
    match EnvelopeShape::detect(&event) {
        EnvelopeShape::Direct => into_mapping(event),
        EnvelopeShape::Gateway => {
            let encoded = event
                .get("isBase64Encoded")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            match event.get("body").and_then(Value::as_str) {
                Some(body) => parse_body(body, encoded),
                None => Ok(Params::new()),
            }
        }
    }
}

fn parse_body(body: &str, base64_encoded: bool) -> Result<Params, InvocationError> {
    let decoded;
    let text = if base64_encoded {
        let bytes = STANDARD
            .decode(body)
            .map_err(|source| InvocationError::Base64 { source })?;
        decoded = String::from_utf8(bytes).map_err(|_| InvocationError::Utf8)?;
        decoded.as_str()
    } else {
        body
    };

    if text.trim().is_empty() {
        return Ok(Params::new());
    }

    let value: Value =
        serde_json::from_str(text).map_err(|source| InvocationError::Body { source })?;
    into_mapping(value)
}

fn into_mapping(value: Value) -> Result<Params, InvocationError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Params::new()),
        other => Err(InvocationError::NotAMapping {
            found: kind(&other),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
