// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `stratus delete` command - Delete a function.
//!
//! The REST API and uploaded archives are left in place.

use stratus_core::{ConfigLoader, FunctionName};

pub async fn execute(config_path: &str, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let name = FunctionName::new(name)?;

    let clients = super::connect(&config).await?;
    super::deployer(&clients).delete(&name).await?;

    println!("✓ Function {} deleted", name);
    Ok(())
}
