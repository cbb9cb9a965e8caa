// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `stratus update` command - Push new code and configuration to an existing function.

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

    let result = super::deployer(&clients).update(&spec).await?;
    super::print_result("updated", name, &result, json)
}
