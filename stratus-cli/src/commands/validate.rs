// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `stratus validate` command - Validate configuration file.

use stratus_core::{ConfigLoader, LayerRef};

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Defaults:");
            println!(
                "  Profile:       {}",
                config.defaults.profile.as_deref().unwrap_or("(environment)")
            );
            println!(
                "  Region:        {}",
                config.defaults.region.as_deref().unwrap_or("(environment)")
            );
            println!("  Build Timeout: {}s", config.defaults.build_timeout.as_secs());
            println!();
            println!("Layers ({}):", config.layers.len());
            for layer in &config.layers {
                println!(
                    "  - {} (runtime: {}, manifest: {}, bucket: {})",
                    layer.name,
                    layer.runtime,
                    layer.requirements.display(),
                    layer.bucket
                );
            }
            println!();
            println!("Functions ({}):", config.functions.len());
            for func in &config.functions {
                let layers: Vec<String> = func
                    .layers
                    .iter()
                    .map(|l| match l {
                        LayerRef::Arn(arn) => arn.clone(),
                        LayerRef::Named(name) => format!("{} (latest)", name),
                    })
                    .collect();
                println!(
                    "  - {} (runtime: {}, handler: {}, source: {})",
                    func.name,
                    func.runtime,
                    func.handler,
                    func.source.display()
                );
                if !layers.is_empty() {
                    println!("      layers: {}", layers.join(", "));
                }
                if let Some(api) = &func.api {
                    println!("      api:    {} /{}/{}/", api.name, api.stage, api.path_part);
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
