//! Layered grid layout
//!
//! Devices are grouped into tiers by device type and spread along X within
//! their tier; tiers recede along -Z. The result is deterministic for a given
//! device order, tier order and spacing. There is no crossing minimization, so
//! it is only meant for networks of tens of devices.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::device::{Device, DeviceId, DeviceType};

/// Grid spacing: X step between siblings, fixed Y, Z step between tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spacing {
    #[serde(default = "default_x_step")]
    pub x_step: f64,
    #[serde(default)]
    pub y_fixed: f64,
    #[serde(default = "default_z_step")]
    pub z_step: f64,
}

fn default_x_step() -> f64 {
    4.0
}

fn default_z_step() -> f64 {
    6.0
}

impl Spacing {
    pub fn new(x_step: f64, y_fixed: f64, z_step: f64) -> Self {
        Self {
            x_step,
            y_fixed,
            z_step,
        }
    }
}

impl Default for Spacing {
    fn default() -> Self {
        Self::new(default_x_step(), 0.0, default_z_step())
    }
}

/// Position assigned to a device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Default tier order, top to bottom
pub fn default_layer_order() -> Vec<DeviceType> {
    vec![
        DeviceType::Internet,
        DeviceType::Firewall,
        DeviceType::Switch,
        DeviceType::AccessPoint,
        DeviceType::Client,
    ]
}

/// Tier index for a device type.
///
/// Types not named in `layer_order` go to the client tier, or to an extra
/// tier after the last one when `client` is not named either.
fn tier_index(device_type: DeviceType, layer_order: &[DeviceType]) -> usize {
    layer_order
        .iter()
        .position(|t| *t == device_type)
        .or_else(|| layer_order.iter().position(|t| *t == DeviceType::Client))
        .unwrap_or(layer_order.len())
}

/// Lay out devices in tiers, writing `x`, `y`, `z` onto each device and
/// returning the same positions keyed by id.
pub fn layout(
    devices: &mut [Device],
    layer_order: &[DeviceType],
    spacing: Spacing,
) -> BTreeMap<DeviceId, Position> {
    let mut tier_fill: BTreeMap<usize, usize> = BTreeMap::new();
    let mut positions = BTreeMap::new();

    for device in devices.iter_mut() {
        let tier = tier_index(device.device_type, layer_order);
        let slot = tier_fill.entry(tier).or_insert(0);

        let position = Position::new(
            *slot as f64 * spacing.x_step,
            spacing.y_fixed,
            0.0 - tier as f64 * spacing.z_step,
        );
        *slot += 1;

        device.x = position.x;
        device.y = position.y;
        device.z = position.z;
        positions.insert(device.id.clone(), position);
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, device_type: DeviceType) -> Device {
        let mut d = Device::new(DeviceId::new(id), None, id);
        d.device_type = device_type;
        d
    }

    #[test]
    fn test_layered_layout() {
        let mut devices = vec![
            device("a", DeviceType::Firewall),
            device("b", DeviceType::Switch),
            device("c", DeviceType::Switch),
        ];
        let positions = layout(
            &mut devices,
            &[DeviceType::Firewall, DeviceType::Switch],
            Spacing::new(5.0, 0.0, 5.0),
        );

        assert_eq!(positions[&DeviceId::new("a")], Position::new(0.0, 0.0, 0.0));
        assert_eq!(positions[&DeviceId::new("b")], Position::new(0.0, 0.0, -5.0));
        assert_eq!(positions[&DeviceId::new("c")], Position::new(5.0, 0.0, -5.0));
        assert_eq!(devices[2].position(), [5.0, 0.0, -5.0]);
    }

    #[test]
    fn test_unlisted_types_go_to_client_tier() {
        let mut devices = vec![
            device("u", DeviceType::Unknown),
            device("c", DeviceType::Client),
        ];
        layout(&mut devices, &default_layer_order(), Spacing::new(2.0, 1.0, 3.0));
        assert_eq!(devices[0].position(), [0.0, 1.0, -12.0]);
        assert_eq!(devices[1].position(), [2.0, 1.0, -12.0]);
    }

    #[test]
    fn test_extra_tier_without_client() {
        let mut devices = vec![device("ap", DeviceType::AccessPoint)];
        layout(&mut devices, &[DeviceType::Firewall], Spacing::new(1.0, 0.0, 1.0));
        assert_eq!(devices[0].position(), [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_deterministic() {
        let make = || {
            vec![
                device("sw2", DeviceType::Switch),
                device("fw", DeviceType::Firewall),
                device("sw1", DeviceType::Switch),
                device("pc", DeviceType::Client),
            ]
        };
        let mut first = make();
        let mut second = make();
        let p1 = layout(&mut first, &default_layer_order(), Spacing::default());
        let p2 = layout(&mut second, &default_layer_order(), Spacing::default());
        assert_eq!(p1, p2);
        assert_eq!(first, second);
    }
}
