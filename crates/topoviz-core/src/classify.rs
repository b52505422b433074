//! Device classifier - resolves vendor, device type and assets from MAC and model name
//!
//! Lookup order:
//! 1. OUI prefix of the MAC address, first rule in list order
//! 2. Case-insensitive model-name substring, first rule in list order
//! 3. The default rule
//!
//! Classification never fails; malformed MACs are treated as absent.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::{Device, DeviceType};
use crate::mac::oui_prefix;
use crate::rules::{ClassificationRule, DefaultRule, RuleSet};

/// Which lookup produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Oui,
    ModelHint,
    Default,
}

/// Result of classifying a single device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub vendor: String,
    pub device_type: DeviceType,
    pub icon: Option<String>,
    pub model3d: Option<String>,
    pub matched: MatchKind,
}

impl ClassificationResult {
    fn from_rule(rule: &ClassificationRule, matched: MatchKind) -> Self {
        Self {
            vendor: rule.vendor.clone(),
            device_type: rule.device_type,
            icon: rule.icon.clone(),
            model3d: rule.model3d.clone(),
            matched,
        }
    }

    fn from_default(rule: &DefaultRule) -> Self {
        Self {
            vendor: rule.vendor.clone(),
            device_type: rule.device_type,
            icon: rule.icon.clone(),
            model3d: rule.model3d.clone(),
            matched: MatchKind::Default,
        }
    }

    pub fn is_default(&self) -> bool {
        self.matched == MatchKind::Default
    }
}

/// Classifier over an immutable, injected rule set
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: RuleSet,
}

impl Classifier {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Classify from an optional MAC and an optional model name
    pub fn classify(&self, mac: Option<&str>, model_name: Option<&str>) -> ClassificationResult {
        if let Some(oui) = mac.and_then(oui_prefix) {
            if let Some(rule) = self.rules.match_oui(&oui) {
                return ClassificationResult::from_rule(rule, MatchKind::Oui);
            }
        }

        if let Some(name) = model_name.filter(|n| !n.trim().is_empty()) {
            if let Some(rule) = self.rules.match_model(name) {
                return ClassificationResult::from_rule(rule, MatchKind::ModelHint);
            }
        }

        ClassificationResult::from_default(&self.rules.default)
    }

    /// Classify a device record in place, trying its model name before its label
    pub fn classify_device(&self, device: &mut Device) -> ClassificationResult {
        let mut result = self.classify(device.mac.as_deref(), None);
        if result.is_default() {
            for hint in device.classification_hints() {
                result = self.classify(None, Some(hint));
                if !result.is_default() {
                    break;
                }
            }
        }

        if result.is_default() {
            debug!(
                id = %device.id,
                mac = ?device.mac,
                label = %device.label,
                "No classification rule matched, using default"
            );
        }

        device.vendor = result.vendor.clone();
        device.device_type = result.device_type;
        device.icon = result.icon.clone();
        device.model3d = result.model3d.clone();
        result
    }

    /// The default rule's placeholder mesh, used when a device mesh is unavailable
    pub fn placeholder_model3d(&self) -> Option<&str> {
        self.rules.default.model3d.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use proptest::prelude::*;

    fn rules() -> RuleSet {
        RuleSet::from_json(
            r#"{
            "rules": [
                {
                    "ouis": ["00:09:18"],
                    "vendor": "Fortinet",
                    "device_type": "firewall",
                    "model_hint": ["fortigate"],
                    "icon": "icons/fortigate.svg",
                    "model3d": "models/fortigate.glb"
                },
                {
                    "ouis": ["00:09:1A"],
                    "vendor": "Fortinet",
                    "device_type": "switch",
                    "model_hint": ["fortiswitch"],
                    "icon": "icons/fortiswitch.svg",
                    "model3d": "models/fortiswitch.glb"
                },
                {
                    "vendor": "Cisco Meraki",
                    "device_type": "access_point",
                    "model_hint": ["MR46"],
                    "icon": "icons/meraki_mr.svg",
                    "model3d": "models/meraki_mr.glb"
                }
            ],
            "default": {
                "vendor": "Unknown",
                "device_type": "client",
                "icon": "icons/generic.svg",
                "model3d": "models/generic.glb"
            }
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_classify_by_oui() {
        let classifier = Classifier::new(rules());
        let mut fw1 = Device::new(DeviceId::new("fw1"), Some("00:09:18:AA:BB:CC"), "fw1");
        let mut sw1 = Device::new(DeviceId::new("sw1"), Some("00:09:1A:11:22:33"), "sw1");

        classifier.classify_device(&mut fw1);
        classifier.classify_device(&mut sw1);

        assert_eq!(fw1.device_type, DeviceType::Firewall);
        assert_eq!(sw1.device_type, DeviceType::Switch);
        assert_eq!(fw1.model3d.as_deref(), Some("models/fortigate.glb"));
    }

    #[test]
    fn test_unknown_label_uses_default() {
        let classifier = Classifier::new(rules());
        let result = classifier.classify(None, Some("Unknown Gadget 9000"));
        assert_eq!(result.device_type, DeviceType::Client);
        assert_eq!(result.icon.as_deref(), Some("icons/generic.svg"));
        assert_eq!(result.model3d.as_deref(), Some("models/generic.glb"));
        assert!(result.is_default());
    }

    #[test]
    fn test_mac_beats_label() {
        let classifier = Classifier::new(rules());
        // MAC matches the firewall rule, label matches the switch rule
        let result = classifier.classify(Some("00:09:18:00:00:01"), Some("FortiSwitch-248E"));
        assert_eq!(result.device_type, DeviceType::Firewall);
        assert_eq!(result.matched, MatchKind::Oui);
    }

    #[test]
    fn test_label_case_insensitive() {
        let classifier = Classifier::new(rules());
        let result = classifier.classify(Some("AA:BB:CC:00:00:01"), Some("lobby mr46 ap"));
        assert_eq!(result.device_type, DeviceType::AccessPoint);
        assert_eq!(result.matched, MatchKind::ModelHint);
    }

    #[test]
    fn test_malformed_mac_falls_through_to_label() {
        let classifier = Classifier::new(rules());
        let result = classifier.classify(Some("not-a-mac"), Some("FortiGate-60F"));
        assert_eq!(result.device_type, DeviceType::Firewall);
        assert_eq!(result.matched, MatchKind::ModelHint);
    }

    #[test]
    fn test_nothing_resolves_to_default() {
        let classifier = Classifier::new(rules());
        assert!(classifier.classify(None, None).is_default());
        assert!(classifier.classify(Some(""), Some("")).is_default());
    }

    #[test]
    fn test_classify_device_falls_back_to_label() {
        let classifier = Classifier::new(rules());
        let mut device = Device::new(DeviceId::new("ap1"), None, "MR46-lobby");
        device.model = Some("unrecognized".to_string());
        let result = classifier.classify_device(&mut device);
        assert_eq!(result.matched, MatchKind::ModelHint);
        assert_eq!(device.device_type, DeviceType::AccessPoint);
        assert_eq!(device.vendor, "Cisco Meraki");
    }

    proptest! {
        #[test]
        fn prop_classify_is_total_and_idempotent(
            mac in proptest::option::of(".{0,24}"),
            label in proptest::option::of(".{0,24}"),
        ) {
            let classifier = Classifier::new(rules());
            let first = classifier.classify(mac.as_deref(), label.as_deref());
            let second = classifier.classify(mac.as_deref(), label.as_deref());
            prop_assert!(DeviceType::ALL.contains(&first.device_type));
            prop_assert_eq!(first, second);
        }
    }
}
