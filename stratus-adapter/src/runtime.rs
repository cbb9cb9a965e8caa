// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Lambda runtime entry point.
//!
//! ```no_run
//! use stratus_adapter::Params;
//!
//! fn predict(params: Params) -> Result<Params, String> {
//!     Ok(params)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lambda_runtime::Error> {
//!     stratus_adapter::run(predict).await
//! }
//! ```

use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

use crate::adapter::{Handler, InvocationAdapter};
use crate::response::InvocationResult;

/// Serve `handler` on the Lambda runtime API until the process is stopped.
pub async fn run<H>(handler: H) -> Result<(), Error>
where
    H: Handler + 'static,
{
    let adapter = Arc::new(InvocationAdapter::new(handler));
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let adapter = adapter.clone();
        async move { handle_event(&adapter, event) }
    }))
    .await
}

/// Answer one runtime event. Never fails: handler errors are already
/// shaped into the 500 response by the adapter.
pub fn handle_event<H: Handler>(
    adapter: &InvocationAdapter<H>,
    event: LambdaEvent<Value>,
) -> Result<InvocationResult, Error> {
    tracing::debug!(request_id = %event.context.request_id, "Invocation received");
    Ok(adapter.call(event.payload))
}
