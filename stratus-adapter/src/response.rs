// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Invocation results in the gateway proxy format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body returned for every failed invocation.
pub const ERROR_BODY: &str = "An Error Occurred.";

/// `{statusCode, headers, body}` as understood by the gateway proxy
/// integration and by direct callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl InvocationResult {
    /// 200 with an already serialized body.
    pub fn ok(body: String) -> Self {
        Self {
            status_code: 200,
            headers: default_headers(),
            body,
        }
    }

    /// 500 with the fixed error body.
    pub fn error() -> Self {
        Self {
            status_code: 500,
            headers: default_headers(),
            body: ERROR_BODY.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        ("Access-Control-Allow-Credentials".to_string(), "true".to_string()),
    ])
}
