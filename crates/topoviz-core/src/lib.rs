//! topoviz Core - Device classification and topology manifest assembly
//!
//! This crate provides the in-memory pipeline that turns a network inventory
//! into the manifest consumed by the 3D viewer:
//! - MAC normalization and OUI extraction
//! - Ordered classification rules with a default fallback
//! - Zone annotation from VLAN/subnet membership
//! - Edge inference from neighbor reports or explicit links
//! - Layered grid layout
//! - Manifest assembly with atomic writes

pub mod classify;
pub mod device;
pub mod edges;
pub mod inventory;
pub mod layout;
pub mod mac;
pub mod manifest;
pub mod rules;
pub mod topology;
pub mod zone;

pub use classify::{ClassificationResult, Classifier, MatchKind};
pub use device::{Device, DeviceId, DeviceType, VlanInfo, DEFAULT_ZONE};
pub use edges::{infer_edges, Edge, Link, NeighborData};
pub use inventory::{load_devices, load_neighbor_data, InventoryError, InventoryRecord};
pub use layout::{default_layer_order, layout, Position, Spacing};
pub use mac::{normalize_mac, oui_prefix};
pub use manifest::{assemble, write_atomic, BuildReport, Manifest, ManifestError, Node};
pub use rules::{ClassificationRule, DefaultRule, RuleError, RuleSet};
pub use topology::{Topology, TopologyBuilder};
pub use zone::{assign_zone, assign_zones, ZoneMap};
