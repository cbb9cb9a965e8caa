// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Handler wrapping.
//!
//! A [`Handler`] takes named parameters and returns a serializable value.
//! [`InvocationAdapter`] turns it into the function the platform invokes:
//! envelope in, [`InvocationResult`] out, never an error or a panic.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::envelope::{resolve_params, EnvelopeShape, Params};
use crate::error::InvocationError;
use crate::response::InvocationResult;

/// Handler logic behind the adapter.
///
/// Implemented for every `Fn(Params) -> Result<T, E>`. The handler validates
/// its own parameters; the adapter only resolves the envelope.
pub trait Handler: Send + Sync {
    type Output: Serialize;
    type Error: fmt::Display;

    fn call(&self, params: Params) -> Result<Self::Output, Self::Error>;
}

impl<F, T, E> Handler for F
where
    F: Fn(Params) -> Result<T, E> + Send + Sync,
    T: Serialize,
    E: fmt::Display,
{
    type Output = T;
    type Error = E;

    fn call(&self, params: Params) -> Result<T, E> {
        self(params)
    }
}

/// Handler taking a typed parameter struct. See [`typed`].
pub struct Typed<F, P> {
    handler: F,
    _params: PhantomData<fn(P)>,
}

/// Deserialize the parameter mapping into `P` before calling `handler`.
/// Parameters that do not fit `P` fail the invocation like a handler error.
pub fn typed<F, P, T, E>(handler: F) -> Typed<F, P>
where
    F: Fn(P) -> Result<T, E> + Send + Sync,
    P: DeserializeOwned,
    T: Serialize,
    E: fmt::Display,
{
    Typed {
        handler,
        _params: PhantomData,
    }
}

impl<F, P, T, E> Handler for Typed<F, P>
where
    F: Fn(P) -> Result<T, E> + Send + Sync,
    P: DeserializeOwned,
    T: Serialize,
    E: fmt::Display,
{
    type Output = T;
    type Error = InvocationError;

    fn call(&self, params: Params) -> Result<T, InvocationError> {
        let params: P = serde_json::from_value(Value::Object(params))
            .map_err(|source| InvocationError::Parameters { source })?;
        (self.handler)(params).map_err(|e| InvocationError::Handler {
            message: e.to_string(),
        })
    }
}

/// Normalizes invocation envelopes and shapes responses for a handler.
pub struct InvocationAdapter<H> {
    handler: H,
}

impl<H: Handler> InvocationAdapter<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Run one invocation. Every failure, including a panic in the handler,
    /// becomes the fixed 500 response; the detail is only logged.
    pub fn call(&self, event: Value) -> InvocationResult {
        match self.try_call(event) {
            Ok(body) => InvocationResult::ok(body),
            Err(err) => {
                tracing::error!(error = %err, "Invocation failed");
                InvocationResult::error()
            }
        }
    }

    /// Like [`call`](Self::call), returning the response as a JSON value
    /// ready to hand back to the runtime.
    pub fn invoke(&self, event: Value) -> Value {
        let result = self.call(event);
        // Plain strings and a string map always serialize.
        serde_json::to_value(&result).unwrap_or(Value::Null)
    }

    fn try_call(&self, event: Value) -> Result<String, InvocationError> {
        let shape = EnvelopeShape::detect(&event);
        let params = resolve_params(event)?;
        tracing::debug!(shape = ?shape, params = params.len(), "Resolved invocation envelope");

        let output = panic::catch_unwind(AssertUnwindSafe(|| self.handler.call(params)))
            .map_err(|payload| InvocationError::Panicked {
                message: panic_message(payload.as_ref()),
            })?
            .map_err(|e| InvocationError::Handler {
                message: e.to_string(),
            })?;

        serde_json::to_string(&output).map_err(|source| InvocationError::Serialization { source })
    }
}

/// Wrap `handler` into the envelope-to-result function the platform calls.
pub fn lambda_api<H: Handler>(handler: H) -> impl Fn(Value) -> InvocationResult + Send + Sync {
    let adapter = InvocationAdapter::new(handler);
    move |event| adapter.call(event)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ERROR_BODY;
    use serde::Deserialize;
    use serde_json::json;

    fn echo(params: Params) -> Result<Params, String> {
        Ok(params)
    }

    #[test]
    fn test_success_serializes_output() {
        let adapter = InvocationAdapter::new(echo);
        let result = adapter.call(json!({"num": 7}));

        assert_eq!(result.status_code, 200);
        assert_eq!(result.body, r#"{"num":7}"#);
    }

    #[test]
    fn test_handler_error_is_masked() {
        let adapter = InvocationAdapter::new(|_: Params| -> Result<(), String> {
            Err("database password is hunter2".to_string())
        });
        let result = adapter.call(json!({}));

        assert_eq!(result.status_code, 500);
        assert_eq!(result.body, ERROR_BODY);
    }

    #[test]
    fn test_panic_is_masked() {
        let adapter = InvocationAdapter::new(|params: Params| -> Result<i64, String> {
            let num = params["num"].as_i64().unwrap_or_default();
            if num == 0 {
                panic!("attempt to divide by zero");
            }
            Ok(100 / num)
        });

        let result = adapter.call(json!({"num": 0}));
        assert_eq!(result.status_code, 500);
        assert_eq!(result.body, ERROR_BODY);

        // The adapter keeps working after a panic.
        let result = adapter.call(json!({"num": 4}));
        assert_eq!(result.status_code, 200);
        assert_eq!(result.body, "25");
    }

    #[test]
    fn test_malformed_envelope_is_masked() {
        let adapter = InvocationAdapter::new(echo);
        let result = adapter.call(json!({"body": "not json"}));
        assert_eq!(result, InvocationResult::error());
    }

    #[derive(Deserialize)]
    struct Square {
        num: i64,
    }

    #[test]
    fn test_typed_handler() {
        let adapter = InvocationAdapter::new(typed(|p: Square| -> Result<i64, String> {
            Ok(p.num * p.num)
        }));

        assert_eq!(adapter.call(json!({"num": 9})).body, "81");
        assert_eq!(adapter.call(json!({"body": "{\"num\": 3}"})).body, "9");
        // Missing field fails the invocation.
        assert_eq!(adapter.call(json!({})).status_code, 500);
    }

    #[test]
    fn test_invoke_returns_wire_value() {
        let adapter = InvocationAdapter::new(echo);
        let value = adapter.invoke(json!({"a": 1}));
        assert_eq!(value["statusCode"], json!(200));
        assert_eq!(value["body"], json!(r#"{"a":1}"#));
        assert_eq!(value["headers"]["Content-Type"], json!("application/json"));
    }

    #[test]
    fn test_lambda_api_wrapper() {
        let api = lambda_api(echo);
        let result = api(json!({"body": null}));
        assert_eq!(result.status_code, 200);
        assert_eq!(result.body, "{}");
    }
}
