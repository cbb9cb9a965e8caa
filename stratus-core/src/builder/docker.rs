// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Docker CLI backed container runner.

use std::process::{Command as StdCommand, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use super::{ContainerOutput, ContainerRunner, ContainerSpec};
use crate::error::BuildFailure;

/// Runs build containers through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerRunner {
    binary: String,
    pull: bool,
}

impl Default for DockerRunner {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            pull: true,
        }
    }
}

impl DockerRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different docker-compatible binary (e.g. `podman`).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Skip the explicit pull and rely on the locally cached image.
    pub fn without_pull(mut self) -> Self {
        self.pull = false;
        self
    }

    async fn pull_image(&self, image: &str) -> Result<(), BuildFailure> {
        tracing::info!(image = %image, "Pulling build image");

        let output = Command::new(&self.binary)
            .args(["pull", image])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BuildFailure::Spawn {
                reason: format!("Failed to run {} pull: {}", self.binary, e),
            })?;

        if !output.status.success() {
            return Err(BuildFailure::ImagePull {
                image: image.to_string(),
                output: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        tracing::info!(image = %image, "Image pulled");
        Ok(())
    }

    /// `docker run` arguments for a spec.
    pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            spec.name.clone(),
        ];

        for mount in &spec.mounts {
            let mut volume = format!("{}:{}", mount.host.display(), mount.container);
            if mount.read_only {
                volume.push_str(":ro");
            }
            args.push("-v".to_string());
            args.push(volume);
        }

        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        if let Some(user) = &spec.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }

        args.push("--entrypoint".to_string());
        args.push("/bin/sh".to_string());
        args.push(spec.image.clone());
        args.push("-c".to_string());
        args.push(spec.script.clone());
        args
    }
}

#[async_trait]
impl ContainerRunner for DockerRunner {
    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutput, BuildFailure> {
        if self.pull {
            self.pull_image(&spec.image).await?;
        }

        let mut guard = ContainerGuard::new(&self.binary, &spec.name);

        tracing::debug!(container = %spec.name, script = %spec.script, "Running container");

        let output = Command::new(&self.binary)
            .args(Self::run_args(spec))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BuildFailure::Spawn {
                reason: format!("Failed to run {}: {}", self.binary, e),
            })?;

        // `--rm` already removed the container once it exited.
        guard.disarm();

        Ok(ContainerOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Force-removes a named container unless disarmed.
///
/// Covers spawn errors, timeouts and cancellation, where the docker client
/// process is killed but the container itself would keep running.
struct ContainerGuard {
    binary: String,
    name: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(binary: &str, name: &str) -> Self {
        Self {
            binary: binary.to_string(),
            name: name.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        tracing::warn!(container = %self.name, "Tearing down build container");
        let binary = std::mem::take(&mut self.binary);
        let name = std::mem::take(&mut self.name);
        let teardown = move || remove_container(&binary, &name);

        // Keep the blocking `rm -f` off the async worker threads.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(teardown);
            }
            Err(_) => teardown(),
        }
    }
}

fn remove_container(binary: &str, name: &str) {
    let status = StdCommand::new(binary)
        .args(["rm", "-f", name])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => {
            tracing::debug!(container = %name, "Container removed");
        }
        Ok(status) => {
            tracing::error!(container = %name, status = %status, "Failed to remove container");
        }
        Err(e) => {
            tracing::error!(container = %name, error = %e, "Failed to remove container");
        }
    }
}
