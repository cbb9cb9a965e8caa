// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Direct and gateway invocations through the public adapter API.

use serde::Serialize;
use serde_json::{json, Value};
use stratus_adapter::{lambda_api, typed, InvocationAdapter, InvocationResult, Params, ERROR_BODY};

#[derive(Serialize)]
struct Shout {
    message: String,
}

/// Repeats `exc` `num` times, failing on a negative count.
fn shout(params: Params) -> Result<Shout, String> {
    let num = params
        .get("num")
        .and_then(Value::as_i64)
        .ok_or("num is required")?;
    let exc = params.get("exc").and_then(Value::as_str).unwrap_or("!");
    if num < 0 {
        return Err(format!("negative count {}", num));
    }
    Ok(Shout {
        message: format!("hello{}", exc.repeat(num as usize)),
    })
}

#[test]
fn test_direct_and_gateway_invocations_match() {
    let adapter = InvocationAdapter::new(shout);

    let direct = adapter.call(json!({"num": 7, "exc": "!!"}));
    let gateway = adapter.call(json!({
        "resource": "/api",
        "path": "/api/",
        "httpMethod": "POST",
        "requestContext": {"stage": "test"},
        "body": "{\"num\": 7, \"exc\": \"!!\"}",
        "isBase64Encoded": false
    }));

    assert_eq!(direct.status_code, 200);
    assert_eq!(direct, gateway);
    assert_eq!(direct.body, r#"{"message":"hello!!!!!!!!!!!!!!"}"#);
}

#[test]
fn test_handler_error_yields_fixed_response() {
    let adapter = InvocationAdapter::new(shout);

    for event in [
        json!({"num": -1}),
        json!({"exc": "?"}),
        json!({"body": "{\"num\": -3}"}),
    ] {
        let result = adapter.call(event);
        assert_eq!(result.status_code, 500);
        assert_eq!(result.body, ERROR_BODY);
        assert_eq!(result.body, "An Error Occurred.");
    }
}

#[test]
fn test_success_body_is_serialized_value() {
    let api = lambda_api(|params: Params| -> Result<Vec<i64>, String> {
        let n = params.get("n").and_then(Value::as_i64).unwrap_or(0);
        Ok((1..=n).collect())
    });

    let result = api(json!({"n": 3}));
    assert_eq!(result.status_code, 200);
    assert_eq!(result.body, serde_json::to_string(&vec![1, 2, 3]).unwrap());
    assert_eq!(result.headers["Access-Control-Allow-Origin"], "*");
}

#[test]
fn test_result_round_trips_as_gateway_response() {
    #[derive(serde::Deserialize)]
    struct Args {
        a: i64,
        b: i64,
    }

    let adapter = InvocationAdapter::new(typed(|args: Args| -> Result<i64, String> {
        args.a.checked_div(args.b).ok_or_else(|| "division by zero".to_string())
    }));

    let ok: InvocationResult =
        serde_json::from_value(adapter.invoke(json!({"body": "{\"a\": 9, \"b\": 3}"}))).unwrap();
    assert_eq!(ok.body, "3");

    let failed: InvocationResult =
        serde_json::from_value(adapter.invoke(json!({"a": 1, "b": 0}))).unwrap();
    assert_eq!(failed, InvocationResult::error());
}
