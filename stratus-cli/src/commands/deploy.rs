// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `stratus deploy` command - Create or update a function and its front door.

use stratus_core::ConfigLoader;

pub async fn execute(
    config_path: &str,
    name: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let function = config
        .function(name)
        .ok_or_else(|| format!("No function named '{}' in {}", name, config_path))?;

    let clients = super::connect(&config).await?;
    let spec = config.function_spec(function, &clients.platform()).await?;

    tracing::info!(
        function = %spec.name,
        region = %clients.region(),
        layers = spec.layers.len(),
        "Deploying function"
    );

    let result = super::deployer(&clients).deploy(&spec).await?;
    super::print_result("deployed", name, &result, json)
}
