// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `stratus publish-layer` command - Build and publish a layer version.

use std::sync::Arc;

use stratus_core::{ConfigLoader, DockerRunner, IsolatedBuilder, LayerPublisher, ObjectStoreClient};

pub async fn execute(
    config_path: &str,
    name: &str,
    no_pull: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let layer = config
        .layer(name)
        .ok_or_else(|| format!("No layer named '{}' in {}", name, config_path))?;

    tracing::info!(layer = %name, config = %config_path, "Publishing layer");

    let clients = super::connect(&config).await?;

    let mut runner = DockerRunner::new();
    if no_pull {
        runner = runner.without_pull();
    }
    let builder =
        IsolatedBuilder::new(Arc::new(runner)).with_timeout(Some(config.defaults.build_timeout));

    let publisher = LayerPublisher::new(
        builder,
        ObjectStoreClient::new(Arc::new(clients.object_store())),
        Arc::new(clients.platform()),
    );

    let published = publisher.publish(&layer.build_spec(), &layer.bucket).await?;

    println!("✓ Layer {} published", published.name);
    println!("  Version: {}", published.version);
    println!("  ARN:     {}", published.arn);
    Ok(())
}
