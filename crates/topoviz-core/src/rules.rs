//! Classification rule store - maps MAC OUIs and model names to device templates
//!
//! Rules provide vendor, device type and asset paths for discovered devices.
//! They are matched in file order, so the rule list is kept as a `Vec` and
//! never re-keyed into a map.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::device::DeviceType;
use crate::mac::oui_prefix;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to read rules file {}: {}", .path.display(), .source)]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse rules file {}: {}", .path.display(), .source)]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to parse rules: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Rule {index} has an invalid OUI: {oui}")]
    InvalidOui { index: usize, oui: String },
}

/// A single classification rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// OUI prefixes (first three MAC octets) matched by this rule
    #[serde(default)]
    pub ouis: Vec<String>,
    pub vendor: String,
    pub device_type: DeviceType,
    /// Model-name substrings, matched case-insensitively
    #[serde(default)]
    pub model_hint: Vec<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub model3d: Option<String>,
}

/// Fallback applied when no rule matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultRule {
    #[serde(default = "default_vendor")]
    pub vendor: String,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default = "default_icon")]
    pub icon: Option<String>,
    #[serde(default = "default_model3d")]
    pub model3d: Option<String>,
}

fn default_vendor() -> String {
    "Unknown".to_string()
}

fn default_icon() -> Option<String> {
    Some("icons/generic_device.svg".to_string())
}

fn default_model3d() -> Option<String> {
    Some("models/generic_device.glb".to_string())
}

impl Default for DefaultRule {
    fn default() -> Self {
        Self {
            vendor: default_vendor(),
            device_type: DeviceType::Client,
            icon: default_icon(),
            model3d: default_model3d(),
        }
    }
}

/// The ordered rule list plus its default, as stored in the rules file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<ClassificationRule>,
    #[serde(default)]
    pub default: DefaultRule,
}

impl RuleSet {
    /// Create a rule set, canonicalizing every OUI
    pub fn new(rules: Vec<ClassificationRule>, default: DefaultRule) -> Result<Self, RuleError> {
        let mut set = Self { rules, default };
        set.normalize()?;
        Ok(set)
    }

    /// Load rules from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, RuleError> {
        let content = std::fs::read_to_string(path).map_err(|source| RuleError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut set: RuleSet =
            serde_json::from_str(&content).map_err(|source| RuleError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;
        set.normalize()?;
        Ok(set)
    }

    /// Load rules from a JSON string
    pub fn from_json(content: &str) -> Result<Self, RuleError> {
        let mut set: RuleSet = serde_json::from_str(content)?;
        set.normalize()?;
        Ok(set)
    }

    /// Save the rule set as pretty JSON
    pub fn to_file(&self, path: &Path) -> Result<(), RuleError> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RuleError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| RuleError::IoError {
            path: path.to_path_buf(),
            source,
        })
    }

    fn normalize(&mut self) -> Result<(), RuleError> {
        for (index, rule) in self.rules.iter_mut().enumerate() {
            for oui in rule.ouis.iter_mut() {
                *oui = oui_prefix(oui).ok_or_else(|| RuleError::InvalidOui {
                    index,
                    oui: oui.clone(),
                })?;
            }
        }
        Ok(())
    }

    /// First rule (in list order) listing the given canonical OUI
    pub fn match_oui(&self, oui: &str) -> Option<&ClassificationRule> {
        self.rules.iter().find(|rule| rule.ouis.iter().any(|o| o == oui))
    }

    /// First rule (in list order) with a model hint contained in `model_name`
    pub fn match_model(&self, model_name: &str) -> Option<&ClassificationRule> {
        let haystack = model_name.to_lowercase();
        self.rules.iter().find(|rule| {
            rule.model_hint
                .iter()
                .map(|hint| hint.trim())
                .filter(|hint| !hint.is_empty())
                .any(|hint| haystack.contains(&hint.to_lowercase()))
        })
    }

    /// Rules shipped with `init-config`
    pub fn builtin() -> Self {
        let rule = |ouis: &[&str], vendor: &str, device_type, hints: &[&str], asset: &str| {
            ClassificationRule {
                ouis: ouis.iter().map(|s| s.to_string()).collect(),
                vendor: vendor.to_string(),
                device_type,
                model_hint: hints.iter().map(|s| s.to_string()).collect(),
                icon: Some(format!("icons/{}.svg", asset)),
                model3d: Some(format!("models/{}.glb", asset)),
            }
        };

        Self {
            rules: vec![
                rule(
                    &["00:09:0F", "00:09:18", "04:D5:90", "70:4C:A5", "90:6C:AC", "E8:1C:BA"],
                    "Fortinet",
                    DeviceType::Firewall,
                    &["fortigate", "fgt", "fwf"],
                    "fortigate",
                ),
                rule(
                    &["00:09:1A", "08:5B:0E", "E0:23:FF"],
                    "Fortinet",
                    DeviceType::Switch,
                    &["fortiswitch", "fsw"],
                    "fortiswitch",
                ),
                rule(
                    &["00:09:0B", "34:E1:D1", "D4:76:A0"],
                    "Fortinet",
                    DeviceType::AccessPoint,
                    &["fortiap", "fap"],
                    "fortiap",
                ),
                rule(
                    &[],
                    "Cisco Meraki",
                    DeviceType::Firewall,
                    &["mx6", "mx7", "mx8", "mx10", "mx25", "mx45", "mx250", "mx450", "z3", "z4"],
                    "meraki_mx",
                ),
                rule(&[], "Cisco Meraki", DeviceType::Switch, &["ms1", "ms2", "ms3", "ms4"], "meraki_ms"),
                rule(
                    &["00:18:0A", "0C:8D:DB", "88:15:44", "E0:55:3D", "AC:17:C8"],
                    "Cisco Meraki",
                    DeviceType::AccessPoint,
                    &["mr3", "mr4", "mr5", "mr7", "cw91"],
                    "meraki_mr",
                ),
                rule(
                    &["24:5A:4C", "74:83:C2", "F0:9F:C2", "FC:EC:DA"],
                    "Ubiquiti",
                    DeviceType::AccessPoint,
                    &["unifi", "uap"],
                    "unifi_ap",
                ),
                rule(&[], "ISP", DeviceType::Internet, &["internet", "isp"], "cloud"),
            ],
            default: DefaultRule::default(),
        }
    }
}
