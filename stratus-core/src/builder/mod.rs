// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Isolated dependency builds.
//!
//! Dependencies are installed inside a container that mirrors the execution
//! environment, so compiled extensions match the platform rather than the
//! developer machine. The container runtime sits behind [`ContainerRunner`]
//! so the pipeline can be exercised with a canned runner.

mod docker;

pub use docker::DockerRunner;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::error::BuildFailure;
use crate::model::BuildSpec;
use crate::types::{Runtime, RuntimeFamily};

/// Where the manifest directory is mounted inside the build container.
pub const MANIFEST_MOUNT: &str = "/var/manifest";
/// Where the layer output directory is mounted inside the build container.
pub const OUTPUT_MOUNT: &str = "/var/layer";

/// A host directory bound into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

/// One container invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Unique container name, used for teardown.
    pub name: String,
    pub image: String,
    pub mounts: Vec<Mount>,
    pub env: Vec<(String, String)>,
    /// `uid:gid` to run as, so output files stay owned by the caller.
    pub user: Option<String>,
    /// Shell script run with `/bin/sh -c`.
    pub script: String,
}

/// Exit status and captured output of a finished container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ContainerOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run-and-capture capability of a container runtime.
///
/// Implementations must tear the container down on every exit path,
/// including when the returned future is dropped.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutput, BuildFailure>;
}

/// A finished build. The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct BuiltLayer {
    dir: TempDir,
    library_root: &'static str,
}

impl BuiltLayer {
    /// Directory to package: contains exactly the library root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Runtime-specific directory holding the installed dependencies.
    pub fn library_dir(&self) -> PathBuf {
        self.dir.path().join(self.library_root)
    }

    pub fn library_root(&self) -> &'static str {
        self.library_root
    }
}

/// Builds layer contents inside an ephemeral container.
#[derive(Clone)]
pub struct IsolatedBuilder {
    runner: Arc<dyn ContainerRunner>,
    timeout: Option<Duration>,
}

impl IsolatedBuilder {
    pub fn new(runner: Arc<dyn ContainerRunner>) -> Self {
        Self {
            runner,
            timeout: None,
        }
    }

    /// Bound the container invocation. The container is torn down on expiry.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Install the dependencies named in the manifest into a fresh directory.
    pub async fn build(&self, spec: &BuildSpec) -> Result<BuiltLayer, BuildFailure> {
        let library_root =
            spec.runtime
                .library_root()
                .ok_or_else(|| BuildFailure::UnsupportedRuntime {
                    runtime: spec.runtime.to_string(),
                })?;

        let manifest = std::fs::canonicalize(&spec.manifest).map_err(|e| {
            BuildFailure::ManifestUnreadable {
                path: spec.manifest.clone(),
                reason: e.to_string(),
            }
        })?;
        if !manifest.is_file() {
            return Err(BuildFailure::ManifestUnreadable {
                path: spec.manifest.clone(),
                reason: "not a regular file".to_string(),
            });
        }
        std::fs::File::open(&manifest).map_err(|e| BuildFailure::ManifestUnreadable {
            path: spec.manifest.clone(),
            reason: e.to_string(),
        })?;

        let (manifest_dir, manifest_file) = match (manifest.parent(), manifest.file_name()) {
            (Some(dir), Some(file)) => (dir.to_path_buf(), file.to_string_lossy().into_owned()),
            _ => {
                return Err(BuildFailure::ManifestUnreadable {
                    path: spec.manifest.clone(),
                    reason: "manifest has no parent directory".to_string(),
                })
            }
        };

        let dir = TempDir::new().map_err(|e| BuildFailure::Workspace {
            reason: e.to_string(),
        })?;
        let library_dir = dir.path().join(library_root);
        std::fs::create_dir_all(&library_dir).map_err(|e| BuildFailure::Workspace {
            reason: e.to_string(),
        })?;

        let container = ContainerSpec {
            name: format!("stratus-build-{}-{}", spec.layer_name, uuid::Uuid::new_v4().simple()),
            image: spec.runtime.build_image(),
            mounts: vec![
                Mount {
                    host: manifest_dir,
                    container: MANIFEST_MOUNT.to_string(),
                    read_only: true,
                },
                Mount {
                    host: dir.path().to_path_buf(),
                    container: OUTPUT_MOUNT.to_string(),
                    read_only: false,
                },
            ],
            env: vec![("HOME".to_string(), "/tmp".to_string())],
            user: current_user(),
            script: install_script(spec.runtime, &manifest_file, library_root),
        };

        tracing::info!(
            layer = %spec.layer_name,
            runtime = %spec.runtime,
            image = %container.image,
            container = %container.name,
            "Starting isolated build"
        );

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.runner.run(&container))
                .await
                .map_err(|_| BuildFailure::TimedOut {
                    secs: limit.as_secs(),
                })??,
            None => self.runner.run(&container).await?,
        };

        if !output.success() {
            tracing::error!(
                layer = %spec.layer_name,
                exit_code = ?output.exit_code,
                "Isolated build failed"
            );
            return Err(BuildFailure::NonZeroExit {
                code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        let produced = std::fs::read_dir(installed_dir(spec.runtime, &library_dir))
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if !produced {
            return Err(BuildFailure::EmptyOutput {
                library_root: library_root.to_string(),
            });
        }

        tracing::info!(layer = %spec.layer_name, "Isolated build finished");
        tracing::debug!(stdout = %output.stdout, "Installer output");

        Ok(BuiltLayer { dir, library_root })
    }
}

/// Directory the installer populates with packages. The Node manifest copied
/// next to `node_modules` does not count as installed output.
fn installed_dir(runtime: Runtime, library_dir: &Path) -> PathBuf {
    match runtime.family() {
        RuntimeFamily::Node => library_dir.join("node_modules"),
        RuntimeFamily::Python | RuntimeFamily::Custom => library_dir.to_path_buf(),
    }
}

/// Installer invocation for a runtime family, run inside the container.
pub fn install_script(runtime: Runtime, manifest_file: &str, library_root: &str) -> String {
    let target = format!("{}/{}", OUTPUT_MOUNT, library_root);
    let manifest = format!("{}/{}", MANIFEST_MOUNT, manifest_file);

    match runtime.family() {
        RuntimeFamily::Python => format!(
            "set -e\npip install --no-cache-dir -r {manifest} --target {target}\n",
        ),
        RuntimeFamily::Node => format!(
            "set -e\ncp {manifest} {target}/package.json\ncd {target}\nnpm install --omit=dev --no-audit --no-fund\n",
        ),
        RuntimeFamily::Custom => String::new(),
    }
}

#[cfg(unix)]
fn current_user() -> Option<String> {
    Some(format!(
        "{}:{}",
        nix::unistd::getuid(),
        nix::unistd::getgid()
    ))
}

#[cfg(not(unix))]
fn current_user() -> Option<String> {
    None
}
