// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod delete;
pub mod deploy;
pub mod publish_layer;
pub mod update;
pub mod validate;

use std::sync::Arc;

use stratus_core::aws::AwsClients;
use stratus_core::{Config, DeployResult, FunctionDeployer, ObjectStoreClient, StratusResult};

/// AWS clients for the profile and region in the configuration defaults.
pub(crate) async fn connect(config: &Config) -> StratusResult<AwsClients> {
    AwsClients::load(
        config.defaults.profile.as_deref(),
        config.defaults.region.as_deref(),
    )
    .await
}

pub(crate) fn deployer(clients: &AwsClients) -> FunctionDeployer {
    FunctionDeployer::new(
        ObjectStoreClient::new(Arc::new(clients.object_store())),
        Arc::new(clients.platform()),
        Arc::new(clients.front_door()),
    )
}

pub(crate) fn print_result(
    verb: &str,
    name: &str,
    result: &DeployResult,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("✓ Function {} {}", name, verb);
    println!("  ARN: {}", result.function_arn);
    match &result.invocation_url {
        Some(url) => println!("  URL: {}", url),
        None => println!("  URL: (no HTTP front door)"),
    }
    Ok(())
}
