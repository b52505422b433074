//! Mesh caching with SHA-based deduplication
//!
//! Converted meshes are stored by the SHA256 of the sanitized SVG they were
//! generated from, so re-running the pipeline on unchanged icons skips the
//! external tools entirely.
//!
//! Mesh files are stored with SHA-prefixed names: `meshes/{short_sha}-{name}.glb`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Cache index entry for one converted mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMesh {
    /// SHA256 of the sanitized SVG source
    pub sha: String,
    /// Mesh file name without the SHA prefix
    pub name: String,
    /// Path relative to the cache directory
    pub path: String,
    /// Where the source icon was read from
    pub source: String,
    /// When the conversion ran (RFC 3339)
    pub converted_at: String,
}

/// The cache index tracks every cached mesh by source SHA
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheIndex {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub meshes: HashMap<String, CachedMesh>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl CacheIndex {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            meshes: HashMap::new(),
        }
    }

    /// Load the index or start a new one if the file doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self, CacheError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Cache directory manager
#[derive(Debug, Clone)]
pub struct MeshCache {
    pub base_dir: PathBuf,
    pub index_path: PathBuf,
    pub index: CacheIndex,
}

impl MeshCache {
    /// Open (or create) a mesh cache at the given directory
    pub fn new(base_dir: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&base_dir)?;
        let index_path = base_dir.join("index.json");
        let index = CacheIndex::load_or_create(&index_path)?;
        Ok(Self {
            base_dir,
            index_path,
            index,
        })
    }

    pub fn meshes_dir(&self) -> PathBuf {
        self.base_dir.join("meshes")
    }

    /// Get short SHA (first 8 characters) from a full SHA
    pub fn short_sha(sha: &str) -> String {
        sha[..8.min(sha.len())].to_string()
    }

    /// Absolute path of the cached mesh for a source SHA, if present on disk
    pub fn mesh_path(&self, sha: &str) -> Option<PathBuf> {
        self.index
            .meshes
            .get(sha)
            .map(|entry| self.base_dir.join(&entry.path))
            .filter(|path| path.is_file())
    }

    pub fn has_mesh(&self, sha: &str) -> bool {
        self.mesh_path(sha).is_some()
    }

    /// Copy a freshly converted mesh into the cache and record it
    pub fn store_mesh(&mut self, sha: &str, source: &Path, mesh: &Path) -> Result<PathBuf, CacheError> {
        let meshes_dir = self.meshes_dir();
        std::fs::create_dir_all(&meshes_dir)?;

        let name = mesh
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mesh.glb".to_string());
        let prefixed = format!("{}-{}", Self::short_sha(sha), name);
        let path = meshes_dir.join(&prefixed);
        std::fs::copy(mesh, &path)?;

        self.index.meshes.insert(
            sha.to_string(),
            CachedMesh {
                sha: sha.to_string(),
                name,
                path: format!("meshes/{}", prefixed),
                source: source.display().to_string(),
                converted_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        Ok(path)
    }

    pub fn save(&self) -> Result<(), CacheError> {
        self.index.save(&self.index_path)
    }
}

/// Compute SHA256 hash of data and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
