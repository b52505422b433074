//! Topology build: classification, zoning, edge inference and layout in one pass

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::classify::Classifier;
use crate::device::{Device, DeviceId, DeviceType};
use crate::edges::{infer_edges, Edge, NeighborData};
use crate::layout::{default_layer_order, layout, Position, Spacing};
use crate::manifest::{assemble, BuildReport, Manifest, ManifestError};
use crate::zone::{assign_zones, ZoneMap};

/// Settings for a topology build
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    classifier: Classifier,
    zones: ZoneMap,
    layer_order: Vec<DeviceType>,
    spacing: Spacing,
}

/// Classified, zoned and positioned devices plus their edges
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub devices: Vec<Device>,
    pub edges: Vec<Edge>,
    pub positions: BTreeMap<DeviceId, Position>,
    pub default_classifications: usize,
}

impl TopologyBuilder {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            zones: ZoneMap::new(),
            layer_order: default_layer_order(),
            spacing: Spacing::default(),
        }
    }

    pub fn with_zones(mut self, zones: ZoneMap) -> Self {
        self.zones = zones;
        self
    }

    pub fn with_layout(mut self, layer_order: Vec<DeviceType>, spacing: Spacing) -> Self {
        self.layer_order = layer_order;
        self.spacing = spacing;
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Run the pipeline over an inventory.
    ///
    /// Edges come from the devices' own neighbor reports plus every extra
    /// neighbor source, merged in order.
    pub fn build(&self, mut devices: Vec<Device>, extra: &[NeighborData]) -> Topology {
        let mut default_classifications = 0;
        for device in devices.iter_mut() {
            if self.classifier.classify_device(device).is_default() {
                default_classifications += 1;
            }
        }

        assign_zones(&mut devices, &self.zones);

        let mut edges = infer_edges(&devices, &NeighborData::from_devices(&devices));
        for data in extra {
            edges.extend(infer_edges(&devices, data));
        }
        debug!("Collected {} candidate edges", edges.len());

        let positions = layout(&mut devices, &self.layer_order, self.spacing);

        info!(
            devices = devices.len(),
            edges = edges.len(),
            defaults = default_classifications,
            "Topology built"
        );

        Topology {
            devices,
            edges,
            positions,
            default_classifications,
        }
    }
}

impl Topology {
    /// Build the manifest in memory
    pub fn to_manifest(&self) -> Result<(Manifest, usize), ManifestError> {
        Manifest::build(&self.devices, &self.edges, &self.positions)
    }

    /// Write the manifest to `output_path`
    pub fn assemble(&self, output_path: &Path) -> Result<(Manifest, BuildReport), ManifestError> {
        let (manifest, mut report) =
            assemble(&self.devices, &self.edges, &self.positions, output_path)?;
        report.default_classifications = self.default_classifications;
        Ok((manifest, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::Link;
    use crate::inventory::parse_devices;
    use crate::rules::RuleSet;
    use tempfile::TempDir;

    fn builder() -> TopologyBuilder {
        let rules = RuleSet::from_json(
            r#"{"rules": [
                {"ouis": ["00:09:18"], "vendor": "Fortinet", "device_type": "firewall", "model3d": "models/fortigate.glb"},
                {"ouis": ["00:09:1A"], "vendor": "Fortinet", "device_type": "switch", "model3d": "models/fortiswitch.glb"}
            ]}"#,
        )
        .unwrap();
        let zones: ZoneMap = [("10", "corp")].into_iter().collect();
        TopologyBuilder::new(Classifier::new(rules))
            .with_zones(zones)
            .with_layout(default_layer_order(), Spacing::new(5.0, 0.0, 5.0))
    }

    #[test]
    fn test_end_to_end() {
        let devices = parse_devices(
            r#"[
                {"id": "fw1", "mac": "00:09:18:AA:BB:CC", "neighbors": ["00:09:1a:11:22:33"]},
                {"id": "sw1", "mac": "00:09:1A:11:22:33", "vlan": 10, "neighbors": ["00:09:18:aa:bb:cc"]},
                {"id": "pc1", "name": "Unknown Gadget 9000"}
            ]"#,
        )
        .unwrap();
        let extra = vec![NeighborData::Links(vec![
            Link {
                src_id: "sw1".to_string(),
                dst_id: "pc1".to_string(),
            },
            Link {
                src_id: "sw1".to_string(),
                dst_id: "ghost".to_string(),
            },
        ])];

        let topology = builder().build(devices, &extra);
        assert_eq!(topology.default_classifications, 1);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("topology_manifest.json");
        let (manifest, report) = topology.assemble(&path).unwrap();

        assert_eq!(report.dropped_edges, 1);
        assert_eq!(report.default_classifications, 1);
        assert_eq!(manifest.edges, vec![Edge::new("fw1", "sw1"), Edge::new("sw1", "pc1")]);

        let fw = manifest.node(&DeviceId::new("fw1")).unwrap();
        assert_eq!(fw.device_type, DeviceType::Firewall);
        assert_eq!((fw.x, fw.y, fw.z), (0.0, 0.0, -5.0));

        let sw = manifest.node(&DeviceId::new("sw1")).unwrap();
        assert_eq!(sw.zone, "corp");
        assert_eq!(sw.z, -10.0);

        let pc = manifest.node(&DeviceId::new("pc1")).unwrap();
        assert_eq!(pc.device_type, DeviceType::Client);
        assert_eq!(pc.zone, "default");
    }
}
