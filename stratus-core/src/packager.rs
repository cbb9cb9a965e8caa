// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Directory to zip archive packaging.
//!
//! Archives are byte-for-byte reproducible: entries are sorted by relative
//! path and carry a fixed timestamp and normalized permissions, so the
//! content hash only changes when file contents or names change.

use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::PackagingError;
use crate::model::Artifact;

/// Directory names never shipped to the platform.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    ".venv",
    ".idea",
    ".vscode",
    "target",
];

/// File names never shipped to the platform.
const EXCLUDED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// Packages directories into deployable archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactPackager;

impl ArtifactPackager {
    pub fn new() -> Self {
        Self
    }

    /// Package every file under `source_dir`, preserving relative paths.
    pub fn package(&self, source_dir: impl AsRef<Path>) -> Result<Artifact, PackagingError> {
        let source_dir = source_dir.as_ref();

        if !source_dir.exists() {
            return Err(PackagingError::SourceNotFound {
                path: source_dir.to_path_buf(),
            });
        }
        if !source_dir.is_dir() {
            return Err(PackagingError::NotADirectory {
                path: source_dir.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        collect_files(source_dir, source_dir, &mut HashSet::new(), &mut files)?;
        files.sort_by(|a, b| a.0.cmp(&b.0));

        if files.is_empty() {
            return Err(PackagingError::EmptySource {
                path: source_dir.to_path_buf(),
            });
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        let mut entries = Vec::with_capacity(files.len());
        for (name, path) in &files {
            let contents = fs::read(path).map_err(|e| PackagingError::Read {
                path: path.clone(),
                source: e,
            })?;
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(DateTime::default())
                .unix_permissions(entry_mode(path));

            writer
                .start_file(name.as_str(), options)
                .map_err(archive_error)?;
            writer
                .write_all(&contents)
                .map_err(|e| PackagingError::Archive {
                    reason: e.to_string(),
                })?;
            entries.push(name.clone());
        }

        let bytes = writer.finish().map_err(archive_error)?.into_inner();
        let sha256 = hex::encode(Sha256::digest(&bytes));

        tracing::debug!(
            source = %source_dir.display(),
            files = entries.len(),
            bytes = bytes.len(),
            sha256 = %sha256,
            "Packaged artifact"
        );

        Ok(Artifact::new(source_dir.to_path_buf(), bytes, sha256, entries))
    }
}

fn archive_error(e: zip::result::ZipError) -> PackagingError {
    PackagingError::Archive {
        reason: e.to_string(),
    }
}

/// Walk `dir`, pushing `(archive path, absolute path)` for each regular file.
///
/// Symlinked directories are followed, but each real directory is walked at
/// most once, so a link cycle cannot nest the tree into itself.
fn collect_files(
    root: &Path,
    dir: &Path,
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<(String, PathBuf)>,
) -> Result<(), PackagingError> {
    let read_err = |e| PackagingError::Read {
        path: dir.to_path_buf(),
        source: e,
    };

    if !visited.insert(fs::canonicalize(dir).map_err(read_err)?) {
        tracing::debug!(dir = %dir.display(), "Skipping already packaged directory");
        return Ok(());
    }

    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(read_err)?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if file_type.is_dir() || (file_type.is_symlink() && path.is_dir()) {
            if EXCLUDED_DIRS.iter().any(|d| name == *d) {
                continue;
            }
            collect_files(root, &path, visited, out)?;
        } else if path.is_file() {
            if EXCLUDED_FILES.iter().any(|f| name == *f) || name.ends_with(".pyc") {
                continue;
            }
            out.push((archive_name(root, &path), path));
        }
    }

    Ok(())
}

/// Forward-slash relative path, regardless of host separator.
fn archive_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn entry_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    match fs::metadata(path) {
        Ok(meta) if meta.permissions().mode() & 0o111 != 0 => 0o755,
        _ => 0o644,
    }
}

#[cfg(not(unix))]
fn entry_mode(_path: &Path) -> u32 {
    0o644
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_package_preserves_relative_paths() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "lambda_function.py", "def handler(): pass");
        write(dir.path(), "lib/helpers.py", "X = 1");

        let artifact = ArtifactPackager::new().package(dir.path()).unwrap();
        assert_eq!(artifact.entries(), ["lambda_function.py", "lib/helpers.py"]);

        let mut archive = zip::ZipArchive::new(Cursor::new(artifact.bytes())).unwrap();
        let mut contents = String::new();
        archive
            .by_name("lib/helpers.py")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "X = 1");
    }

    #[test]
    fn test_package_excludes_metadata() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "print('hi')");
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main");
        write(dir.path(), "__pycache__/app.cpython-312.pyc", "bytecode");
        write(dir.path(), "pkg/.DS_Store", "junk");

        let artifact = ArtifactPackager::new().package(dir.path()).unwrap();
        assert_eq!(artifact.entries(), ["app.py"]);
    }

    #[test]
    fn test_package_is_deterministic() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        // Same content, created in a different order.
        write(first.path(), "a.py", "a");
        write(first.path(), "b/c.py", "c");
        write(second.path(), "b/c.py", "c");
        write(second.path(), "a.py", "a");

        let packager = ArtifactPackager::new();
        let a = packager.package(first.path()).unwrap();
        let b = packager.package(second.path()).unwrap();
        assert_eq!(a.sha256(), b.sha256());
        assert_eq!(a.bytes(), b.bytes());
    }

    #[test]
    fn test_package_hash_tracks_content() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.py", "one");
        let before = ArtifactPackager::new().package(dir.path()).unwrap();
        write(dir.path(), "a.py", "two");
        let after = ArtifactPackager::new().package(dir.path()).unwrap();
        assert_ne!(before.sha256(), after.sha256());
    }

    #[test]
    fn test_package_missing_source() {
        let dir = TempDir::new().unwrap();
        let result = ArtifactPackager::new().package(dir.path().join("nope"));
        assert!(matches!(result, Err(PackagingError::SourceNotFound { .. })));
    }

    #[test]
    fn test_package_empty_source() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        write(dir.path(), ".git/config", "[core]");
        let result = ArtifactPackager::new().package(dir.path());
        assert!(matches!(result, Err(PackagingError::EmptySource { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_package_ignores_symlink_cycles() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "print('hi')");
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let artifact = ArtifactPackager::new().package(dir.path()).unwrap();
        assert_eq!(artifact.entries(), ["app.py"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_package_follows_symlinked_directory() {
        let shared = TempDir::new().unwrap();
        write(shared.path(), "util.py", "x = 1");
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "import util");
        std::os::unix::fs::symlink(shared.path(), dir.path().join("lib")).unwrap();

        let artifact = ArtifactPackager::new().package(dir.path()).unwrap();
        assert_eq!(artifact.entries(), ["app.py", "lib/util.py"]);
    }

    #[test]
    fn test_package_rejects_file_source() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "single.py", "x");
        let result = ArtifactPackager::new().package(dir.path().join("single.py"));
        assert!(matches!(result, Err(PackagingError::NotADirectory { .. })));
    }
}
