//! Device types for classified and positioned network entities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mac::normalize_mac;

/// Zone assigned when no VLAN/subnet mapping applies
pub const DEFAULT_ZONE: &str = "default";

/// Unique identifier for a device within a manifest
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a temporary ID for devices the inventory gave no identity for
    pub fn temporary() -> Self {
        Self(format!("temp-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Role of a device, which also selects its layout tier
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Internet,
    Firewall,
    Switch,
    AccessPoint,
    #[default]
    Client,
    Unknown,
}

impl DeviceType {
    pub const ALL: [DeviceType; 6] = [
        DeviceType::Internet,
        DeviceType::Firewall,
        DeviceType::Switch,
        DeviceType::AccessPoint,
        DeviceType::Client,
        DeviceType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Internet => "internet",
            DeviceType::Firewall => "firewall",
            DeviceType::Switch => "switch",
            DeviceType::AccessPoint => "access_point",
            DeviceType::Client => "client",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown device type: {}", s))
    }
}

/// VLAN/subnet membership as reported by the inventory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanInfo {
    pub vlan_id: Option<u16>,
    pub vlan_name: Option<String>,
    pub subnet: Option<String>,
}

impl VlanInfo {
    /// The identifier used for zone lookup: VLAN id, then VLAN name, then subnet label
    pub fn zone_key(&self) -> Option<String> {
        if let Some(id) = self.vlan_id {
            return Some(id.to_string());
        }
        let populated = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        populated(&self.vlan_name).or_else(|| populated(&self.subnet))
    }
}

/// A discovered network entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique identifier within the manifest
    pub id: DeviceId,
    /// Canonical MAC address (uppercase, colon-separated)
    pub mac: Option<String>,
    /// Hostname or model string
    pub label: String,
    /// Model name reported by the inventory, used as a classification hint
    pub model: Option<String>,
    pub device_type: DeviceType,
    pub vendor: String,
    pub zone: String,
    pub icon: Option<String>,
    pub model3d: Option<String>,
    pub vlan: VlanInfo,
    /// Neighbor MACs reported by link-layer discovery
    pub neighbors: Vec<String>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Device {
    /// Create an unclassified device; the MAC is canonicalized, malformed MACs are dropped
    pub fn new(id: DeviceId, mac: Option<&str>, label: impl Into<String>) -> Self {
        Self {
            id,
            mac: mac.and_then(normalize_mac),
            label: label.into(),
            model: None,
            device_type: DeviceType::default(),
            vendor: String::new(),
            zone: DEFAULT_ZONE.to_string(),
            icon: None,
            model3d: None,
            vlan: VlanInfo::default(),
            neighbors: Vec::new(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Free-text hints for model-based classification, model name before label
    pub fn classification_hints(&self) -> Vec<&str> {
        [self.model.as_deref(), Some(self.label.as_str())]
            .into_iter()
            .flatten()
            .filter(|hint| !hint.trim().is_empty())
            .collect()
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}
