//! Stratus Invocation Adapter
//!
//! Runtime companion for functions deployed with Stratus. Wraps handler
//! logic so it receives the same named parameters whether the function is
//! invoked directly or through the HTTP gateway, and shapes every outcome
//! into a `{statusCode, headers, body}` response. Failures are answered with
//! a fixed 500 body and never leak handler details.
//!
//! Has no dependency on the deploy pipelines and can be shipped on its own.
//! With the default `runtime` feature, [`run`] serves a handler on the
//! Lambda runtime API.

pub mod adapter;
pub mod envelope;
pub mod error;
pub mod response;
#[cfg(feature = "runtime")]
pub mod runtime;

// Re-export commonly used types
pub use adapter::{lambda_api, typed, Handler, InvocationAdapter, Typed};
pub use envelope::{resolve_params, EnvelopeShape, Params};
pub use error::InvocationError;
pub use response::{InvocationResult, ERROR_BODY};
#[cfg(feature = "runtime")]
pub use runtime::{handle_event, run};
