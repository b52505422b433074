//! Zone annotation from VLAN/subnet membership

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::device::{Device, DEFAULT_ZONE};

/// Static VLAN/subnet identifier to zone name mapping
///
/// Keys are VLAN ids (as decimal strings), VLAN names or subnet labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneMap(pub BTreeMap<String, String>);

impl ZoneMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, zone: impl Into<String>) {
        self.0.insert(key.into(), zone.into());
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.0.get(key.trim()).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ZoneMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Assign the device's zone and return it.
///
/// Only the first populated identifier (VLAN id, VLAN name, subnet) is looked up;
/// anything unmapped lands in the default zone.
pub fn assign_zone<'a>(device: &'a mut Device, zones: &ZoneMap) -> &'a str {
    device.zone = device
        .vlan
        .zone_key()
        .and_then(|key| zones.lookup(&key).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_ZONE.to_string());
    &device.zone
}

/// Annotate every device in the list
pub fn assign_zones(devices: &mut [Device], zones: &ZoneMap) {
    for device in devices.iter_mut() {
        assign_zone(device, zones);
    }
}
