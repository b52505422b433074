//! Edge inference from link-layer neighbor reports or explicit link lists

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::device::{Device, DeviceId};
use crate::mac::normalize_mac;

/// An unordered connection between two devices
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: DeviceId,
    pub target: DeviceId,
}

impl Edge {
    pub fn new(source: impl Into<DeviceId>, target: impl Into<DeviceId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Orientation-independent key, smaller id first
    pub fn key(&self) -> (DeviceId, DeviceId) {
        if self.source <= self.target {
            (self.source.clone(), self.target.clone())
        } else {
            (self.target.clone(), self.source.clone())
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// An explicitly listed link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(alias = "source", alias = "src")]
    pub src_id: String,
    #[serde(alias = "target", alias = "dst")]
    pub dst_id: String,
}

/// Neighbor information as found in a links file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NeighborData {
    /// Device id to the MACs it reports as link-layer neighbors
    Neighbors(BTreeMap<String, Vec<String>>),
    /// Explicit `{src_id, dst_id}` pairs
    Links(Vec<Link>),
}

impl NeighborData {
    /// Neighbor reports carried inline by the device records
    pub fn from_devices(devices: &[Device]) -> Self {
        NeighborData::Neighbors(
            devices
                .iter()
                .filter(|d| !d.neighbors.is_empty())
                .map(|d| (d.id.0.clone(), d.neighbors.clone()))
                .collect(),
        )
    }
}

/// Infer edges between devices.
///
/// In neighbor mode symmetric reports collapse into one edge with the
/// lexicographically smaller id as `source`; neighbors missing from the
/// inventory are skipped with a warning. Explicit links pass through untouched.
pub fn infer_edges(devices: &[Device], neighbor_data: &NeighborData) -> Vec<Edge> {
    match neighbor_data {
        NeighborData::Links(links) => links
            .iter()
            .map(|link| Edge::new(link.src_id.clone(), link.dst_id.clone()))
            .collect(),
        NeighborData::Neighbors(reports) => infer_from_neighbors(devices, reports),
    }
}

fn infer_from_neighbors(devices: &[Device], reports: &BTreeMap<String, Vec<String>>) -> Vec<Edge> {
    let mac_index: HashMap<String, &DeviceId> = devices
        .iter()
        .filter_map(|d| d.mac.as_deref().and_then(normalize_mac).map(|mac| (mac, &d.id)))
        .collect();

    let mut pairs: BTreeSet<(DeviceId, DeviceId)> = BTreeSet::new();

    for (src, neighbor_macs) in reports {
        let src = DeviceId(src.clone());
        for raw in neighbor_macs {
            let Some(mac) = normalize_mac(raw) else {
                warn!(device = %src, neighbor = %raw, "Ignoring malformed neighbor MAC");
                continue;
            };
            let Some(&dst) = mac_index.get(&mac) else {
                warn!(device = %src, neighbor = %mac, "Neighbor MAC not in inventory, edge dropped");
                continue;
            };
            if *dst == src {
                continue;
            }
            let edge = Edge::new(src.clone(), dst.clone());
            pairs.insert(edge.key());
        }
    }

    debug!("Inferred {} edges from neighbor reports", pairs.len());
    pairs
        .into_iter()
        .map(|(source, target)| Edge { source, target })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, mac: &str, neighbors: &[&str]) -> Device {
        let mut d = Device::new(DeviceId::new(id), Some(mac), id);
        d.neighbors = neighbors.iter().map(|s| s.to_string()).collect();
        d
    }

    #[test]
    fn test_symmetric_reports_dedup() {
        let devices = vec![
            device("a", "00:00:00:00:00:0a", &["00:00:00:00:00:0b"]),
            device("b", "00:00:00:00:00:0b", &["00-00-00-00-00-0A"]),
        ];
        let edges = infer_edges(&devices, &NeighborData::from_devices(&devices));
        assert_eq!(edges, vec![Edge::new("a", "b")]);
    }

    #[test]
    fn test_unknown_neighbor_dropped() {
        let devices = vec![
            device("sw1", "00:09:1a:00:00:01", &["aa:aa:aa:aa:aa:aa", "00:09:18:00:00:01"]),
            device("fw1", "00:09:18:00:00:01", &[]),
        ];
        let edges = infer_edges(&devices, &NeighborData::from_devices(&devices));
        assert_eq!(edges, vec![Edge::new("fw1", "sw1")]);
    }

    #[test]
    fn test_self_report_ignored() {
        let devices = vec![device("a", "00:00:00:00:00:0a", &["00:00:00:00:00:0a"])];
        let edges = infer_edges(&devices, &NeighborData::from_devices(&devices));
        assert!(edges.is_empty());
    }

    #[test]
    fn test_devices_without_mac_not_indexed() {
        let mut nomac = Device::new(DeviceId::new("n"), None, "n");
        nomac.neighbors = vec!["00:00:00:00:00:0a".to_string()];
        let devices = vec![nomac, device("a", "00:00:00:00:00:0a", &[])];
        let edges = infer_edges(&devices, &NeighborData::from_devices(&devices));
        assert_eq!(edges, vec![Edge::new("a", "n")]);
    }

    #[test]
    fn test_explicit_links_pass_through() {
        let links: NeighborData = serde_json::from_str(
            r#"[{"src_id": "b", "dst_id": "a"}, {"src_id": "b", "dst_id": "a"}, {"src_id": "x", "dst_id": "ghost"}]"#,
        )
        .unwrap();
        let edges = infer_edges(&[], &links);
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[0], Edge::new("b", "a"));
    }

    #[test]
    fn test_neighbor_map_parses() {
        let data: NeighborData =
            serde_json::from_str(r#"{"fw1": ["00:09:1a:00:00:01"]}"#).unwrap();
        assert!(matches!(data, NeighborData::Neighbors(ref m) if m.len() == 1));
    }

    #[test]
    fn test_no_self_loops_or_duplicates() {
        let devices: Vec<Device> = (0..6u8)
            .map(|i| {
                let neighbors: Vec<String> = (0..6u8)
                    .map(|j| format!("00:00:00:00:00:{:02x}", j))
                    .collect();
                let mut d = Device::new(
                    DeviceId::new(format!("d{}", i)),
                    Some(format!("00:00:00:00:00:{:02x}", i).as_str()),
                    "",
                );
                d.neighbors = neighbors;
                d
            })
            .collect();
        let edges = infer_edges(&devices, &NeighborData::from_devices(&devices));
        assert_eq!(edges.len(), 15);
        let keys: BTreeSet<_> = edges.iter().map(Edge::key).collect();
        assert_eq!(keys.len(), edges.len());
        assert!(edges.iter().all(|e| !e.is_self_loop()));
    }
}
