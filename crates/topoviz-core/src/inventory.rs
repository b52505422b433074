//! Inventory adapter for already-parsed FortiGate / Meraki device exports
//!
//! Field names differ between sources (`serial` vs `id`, `hostname` vs `name`,
//! `vlan` vs `vlanId`), so records are read through serde aliases and folded
//! into [`Device`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::device::{Device, DeviceId, VlanInfo};
use crate::edges::NeighborData;
use crate::mac::normalize_mac;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Failed to read {}: {}", .path.display(), .source)]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {}", .path.display(), .source)]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// VLAN id as reported: some APIs send numbers, others strings.
///
/// Numbers outside the `u16` range and values of any other JSON type are
/// kept so the record still loads; they carry no VLAN id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VlanId {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl VlanId {
    fn as_number(&self) -> Option<u16> {
        match self {
            VlanId::Number(n) => u16::try_from(*n).ok(),
            VlanId::Text(s) => s.trim().parse().ok(),
            VlanId::Other(_) => None,
        }
    }

    /// Non-numeric text is a VLAN name
    fn as_name(&self) -> Option<&str> {
        match self {
            VlanId::Text(s) if s.trim().parse::<i64>().is_err() => {
                Some(s.trim()).filter(|s| !s.is_empty())
            }
            _ => None,
        }
    }
}

/// A raw device record from an inventory export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    #[serde(default, alias = "serial", alias = "device_id", alias = "deviceId")]
    pub id: Option<String>,
    #[serde(default, alias = "macAddress", alias = "mac_address")]
    pub mac: Option<String>,
    #[serde(default, alias = "name", alias = "host")]
    pub hostname: Option<String>,
    #[serde(default, alias = "productType", alias = "os_name")]
    pub model: Option<String>,
    #[serde(default, alias = "vlan", alias = "vlanId")]
    pub vlan_id: Option<VlanId>,
    #[serde(default, alias = "vlanName")]
    pub vlan_name: Option<String>,
    #[serde(default, alias = "subnet_label", alias = "subnetLabel")]
    pub subnet: Option<String>,
    #[serde(default, alias = "lldp_neighbors", alias = "neighbours")]
    pub neighbors: Vec<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl InventoryRecord {
    /// Normalize into a device.
    ///
    /// The id falls back to the canonical MAC, then the hostname, then a
    /// generated temporary id.
    pub fn into_device(self) -> Device {
        let mac = self.mac.as_deref().and_then(normalize_mac);
        if mac.is_none() {
            if let Some(raw) = non_empty(&self.mac) {
                debug!(mac = %raw, "Ignoring malformed MAC");
            }
        }

        let label = non_empty(&self.hostname)
            .or_else(|| non_empty(&self.model))
            .unwrap_or_default()
            .to_string();

        let id = non_empty(&self.id)
            .map(DeviceId::new)
            .or_else(|| mac.clone().map(DeviceId))
            .or_else(|| non_empty(&self.hostname).map(DeviceId::new))
            .unwrap_or_else(|| {
                let id = DeviceId::temporary();
                warn!(id = %id, "Inventory record has no identity, assigned temporary id");
                id
            });

        let (vlan_id, vlan_name) = match &self.vlan_id {
            Some(v) => match v.as_number() {
                Some(n) => (Some(n), non_empty(&self.vlan_name).map(str::to_string)),
                None => {
                    if v.as_name().is_none() && !matches!(v, VlanId::Text(s) if s.trim().is_empty()) {
                        debug!(vlan = ?v, "Ignoring out-of-range VLAN id");
                    }
                    (
                        None,
                        non_empty(&self.vlan_name)
                            .or_else(|| v.as_name())
                            .map(str::to_string),
                    )
                }
            },
            None => (None, non_empty(&self.vlan_name).map(str::to_string)),
        };

        let mut device = Device::new(id, None, label);
        device.mac = mac;
        device.model = non_empty(&self.model).map(str::to_string);
        device.vlan = VlanInfo {
            vlan_id,
            vlan_name,
            subnet: non_empty(&self.subnet).map(str::to_string),
        };
        device.neighbors = self.neighbors;
        device
    }
}

/// Devices file: a bare array of records or `{"devices": [...]}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DevicesFile {
    List(Vec<InventoryRecord>),
    Wrapped { devices: Vec<InventoryRecord> },
}

fn read(path: &Path) -> Result<String, InventoryError> {
    std::fs::read_to_string(path).map_err(|source| InventoryError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a devices JSON document
pub fn parse_devices(content: &str) -> Result<Vec<Device>, serde_json::Error> {
    let file: DevicesFile = serde_json::from_str(content)?;
    let records = match file {
        DevicesFile::List(records) => records,
        DevicesFile::Wrapped { devices } => devices,
    };
    Ok(records.into_iter().map(InventoryRecord::into_device).collect())
}

/// Load and normalize a devices file
pub fn load_devices(path: &Path) -> Result<Vec<Device>, InventoryError> {
    let content = read(path)?;
    parse_devices(&content).map_err(|source| InventoryError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a links/neighbor file
pub fn load_neighbor_data(path: &Path) -> Result<NeighborData, InventoryError> {
    let content = read(path)?;
    serde_json::from_str(&content).map_err(|source| InventoryError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}
