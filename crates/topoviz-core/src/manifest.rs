//! Topology manifest assembly and persistence
//!
//! The manifest is the single artifact handed to the 3D viewer:
//! `{ "nodes": [...], "edges": [...] }`. It is rebuilt wholesale on every run
//! and replaced atomically, so a failed write never leaves a truncated file.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::device::{Device, DeviceId, DeviceType};
use crate::edges::Edge;
use crate::layout::Position;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Device with empty id (label: {0:?})")]
    EmptyId(String),
    #[error("Duplicate device id: {0}")]
    DuplicateId(DeviceId),
    #[error("Failed to serialize manifest: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Failed to parse manifest {}: {}", .path.display(), .source)]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to read manifest {}: {}", .path.display(), .source)]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write manifest {}: {}", .path.display(), .source)]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A flattened, positioned device record as consumed by the viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub vendor: String,
    #[serde(default = "default_zone")]
    pub zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model3d: Option<String>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

fn default_zone() -> String {
    crate::device::DEFAULT_ZONE.to_string()
}

impl Node {
    fn from_device(device: &Device, position: Option<&Position>) -> Self {
        let [x, y, z] = position
            .map(|p| [p.x, p.y, p.z])
            .unwrap_or_else(|| device.position());
        Self {
            id: device.id.clone(),
            mac: device.mac.clone(),
            label: device.label.clone(),
            device_type: device.device_type,
            vendor: device.vendor.clone(),
            zone: device.zone.clone(),
            icon: device.icon.clone(),
            model3d: device.model3d.clone(),
            x,
            y,
            z,
        }
    }
}

/// The topology manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Manifest {
    /// Build a manifest from devices and edges, without touching disk.
    ///
    /// Empty or duplicate ids are rejected. Edges naming unknown devices and
    /// self-loops are dropped with a warning; repeated edges collapse.
    pub fn build(
        devices: &[Device],
        edges: &[Edge],
        positions: &BTreeMap<DeviceId, Position>,
    ) -> Result<(Self, usize), ManifestError> {
        let mut ids: HashSet<&DeviceId> = HashSet::with_capacity(devices.len());
        let mut nodes = Vec::with_capacity(devices.len());

        for device in devices {
            if device.id.is_empty() {
                return Err(ManifestError::EmptyId(device.label.clone()));
            }
            if !ids.insert(&device.id) {
                return Err(ManifestError::DuplicateId(device.id.clone()));
            }
            nodes.push(Node::from_device(device, positions.get(&device.id)));
        }

        let mut seen = BTreeSet::new();
        let mut kept = Vec::with_capacity(edges.len());
        let mut dropped = 0;

        for edge in edges {
            if !ids.contains(&edge.source) || !ids.contains(&edge.target) {
                warn!(
                    source = %edge.source,
                    target = %edge.target,
                    "Dropping edge that references an unknown device"
                );
                dropped += 1;
                continue;
            }
            if edge.is_self_loop() {
                warn!(device = %edge.source, "Dropping self-loop edge");
                dropped += 1;
                continue;
            }
            if seen.insert(edge.key()) {
                kept.push(edge.clone());
            }
        }

        Ok((Self { nodes, edges: kept }, dropped))
    }

    /// Load a manifest from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ManifestError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the manifest as pretty JSON, replacing any previous file atomically
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let content = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &content)
    }

    pub fn node(&self, id: &DeviceId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

/// Write to a temp file next to `path` and rename it into place
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), ManifestError> {
    let write_err = |source| ManifestError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Summary of a manifest build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub generated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_type: BTreeMap<DeviceType, usize>,
    pub default_classifications: usize,
    pub dropped_edges: usize,
    pub asset_fallbacks: usize,
}

impl BuildReport {
    pub fn for_manifest(manifest: &Manifest) -> Self {
        let mut nodes_by_type = BTreeMap::new();
        for node in &manifest.nodes {
            *nodes_by_type.entry(node.device_type).or_insert(0) += 1;
        }
        Self {
            generated_at: Some(chrono::Utc::now()),
            nodes: manifest.nodes.len(),
            edges: manifest.edges.len(),
            nodes_by_type,
            ..Default::default()
        }
    }

    pub fn log(&self) {
        info!(
            nodes = self.nodes,
            edges = self.edges,
            defaults = self.default_classifications,
            dropped_edges = self.dropped_edges,
            asset_fallbacks = self.asset_fallbacks,
            "Manifest built"
        );
    }
}

/// Merge devices, edges and positions into a manifest and write it to `output_path`
pub fn assemble(
    devices: &[Device],
    edges: &[Edge],
    positions: &BTreeMap<DeviceId, Position>,
    output_path: &Path,
) -> Result<(Manifest, BuildReport), ManifestError> {
    let (manifest, dropped) = Manifest::build(devices, edges, positions)?;
    manifest.save(output_path)?;
    info!(path = %output_path.display(), "Wrote topology manifest");

    let mut report = BuildReport::for_manifest(&manifest);
    report.dropped_edges = dropped;
    Ok((manifest, report))
}
