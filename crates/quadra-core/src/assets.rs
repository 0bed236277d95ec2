// SPDX-License-Identifier: CEPL-1.0
//! Read-only asset access.
//!
//! The renderer never touches a platform asset manager directly; it asks an
//! [`AssetProvider`] for whole files by relative path (`shaders/shader.vert.spv`,
//! `textures/sample_tex.png`, ...).

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("asset path escapes the asset root: {0}")]
    InvalidPath(String),
    #[error("failed to read asset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Whole-file, read-only byte provider.
pub trait AssetProvider {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError>;
}

impl<T: AssetProvider + ?Sized> AssetProvider for &T {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        (**self).read(path)
    }
}

impl<T: AssetProvider + ?Sized> AssetProvider for Box<T> {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        (**self).read(path)
    }
}

/// Assets rooted at a directory on the filesystem.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AssetError> {
        let rel = Path::new(path);
        // only plain relative components; no "..", no absolute paths
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AssetError::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(rel))
    }
}

impl AssetProvider for DirAssets {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let full = self.resolve(path)?;
        match std::fs::read(&full) {
            Ok(bytes) => {
                debug!("asset {} ({} bytes) from {}", path, bytes.len(), full.display());
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetError::NotFound(path.to_owned()))
            }
            Err(source) => Err(AssetError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }
}

/// In-memory assets, keyed by relative path. Used for bundled data.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetProvider for MemoryAssets {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_owned()))
    }
}

/// Tries `primary` first and falls back to `fallback` when the asset is missing.
/// Any other error from `primary` is returned as-is.
#[derive(Debug, Clone)]
pub struct Layered<A, B> {
    primary: A,
    fallback: B,
}

impl<A, B> Layered<A, B> {
    pub fn new(primary: A, fallback: B) -> Self {
        Self { primary, fallback }
    }
}

impl<A: AssetProvider, B: AssetProvider> AssetProvider for Layered<A, B> {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        match self.primary.read(path) {
            Err(AssetError::NotFound(_)) => self.fallback.read(path),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "quadra-assets-{}-{}",
            tag,
            std::process::id()
        ));
        std::fs::create_dir_all(dir.join("shaders")).unwrap();
        dir
    }

    #[test]
    fn dir_assets_reads_nested_files() {
        let dir = scratch_dir("nested");
        std::fs::write(dir.join("shaders/a.spv"), [1u8, 2, 3]).unwrap();

        let assets = DirAssets::new(&dir);
        assert_eq!(assets.read("shaders/a.spv").unwrap(), vec![1, 2, 3]);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn dir_assets_reports_missing_as_not_found() {
        let dir = scratch_dir("missing");
        let assets = DirAssets::new(&dir);
        assert!(matches!(
            assets.read("textures/nope.png"),
            Err(AssetError::NotFound(p)) if p == "textures/nope.png"
        ));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn dir_assets_rejects_parent_components() {
        let assets = DirAssets::new("/tmp");
        assert!(matches!(
            assets.read("../etc/passwd"),
            Err(AssetError::InvalidPath(_))
        ));
        assert!(matches!(
            assets.read("/etc/passwd"),
            Err(AssetError::InvalidPath(_))
        ));
    }

    #[test]
    fn layered_falls_back_only_on_not_found() {
        let primary = MemoryAssets::new().with("a", vec![1u8]);
        let fallback = MemoryAssets::new().with("a", vec![9u8]).with("b", vec![2u8]);
        let layered = Layered::new(primary, fallback);

        assert_eq!(layered.read("a").unwrap(), vec![1]);
        assert_eq!(layered.read("b").unwrap(), vec![2]);
        assert!(matches!(layered.read("c"), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn layered_does_not_mask_invalid_paths() {
        let layered = Layered::new(
            DirAssets::new("/tmp"),
            MemoryAssets::new().with("../x", vec![0u8]),
        );
        assert!(matches!(layered.read("../x"), Err(AssetError::InvalidPath(_))));
    }
}
