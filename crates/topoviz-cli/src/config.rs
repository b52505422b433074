//! Configuration loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use topoviz_assets::{AssetPipeline, BlenderConverter, LibreOfficeConverter, MeshCache};
use topoviz_core::{default_layer_order, DeviceType, Spacing, ZoneMap};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    /// VLAN id, VLAN name or subnet label -> zone name
    #[serde(default)]
    pub zones: ZoneMap,
    #[serde(default)]
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Classification rules file
    #[serde(default = "default_rules_path")]
    pub rules: PathBuf,
    /// Manifest output path
    #[serde(default = "default_output_path")]
    pub output: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            rules: default_rules_path(),
            output: default_output_path(),
        }
    }
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("./device_model_rules.json")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./topology_manifest.json")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Tiers from top to bottom
    #[serde(default = "default_layer_order")]
    pub layer_order: Vec<DeviceType>,
    #[serde(default = "default_x_step")]
    pub x_step: f64,
    #[serde(default)]
    pub y_fixed: f64,
    #[serde(default = "default_z_step")]
    pub z_step: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let spacing = Spacing::default();
        Self {
            layer_order: default_layer_order(),
            x_step: spacing.x_step,
            y_fixed: spacing.y_fixed,
            z_step: spacing.z_step,
        }
    }
}

fn default_x_step() -> f64 {
    Spacing::default().x_step
}

fn default_z_step() -> f64 {
    Spacing::default().z_step
}

impl LayoutConfig {
    pub fn spacing(&self) -> Spacing {
        Spacing::new(self.x_step, self.y_fixed, self.z_step)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Blender executable
    #[serde(default = "default_blender")]
    pub blender: PathBuf,
    /// LibreOffice executable; stencils are skipped when unset
    #[serde(default)]
    pub libreoffice: Option<PathBuf>,
    /// Per-conversion timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Concurrent conversions
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Icon and mesh paths from the rules are relative to this directory
    #[serde(default = "default_assets_root")]
    pub root: PathBuf,
    /// Intermediate SVGs
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            blender: default_blender(),
            libreoffice: None,
            timeout_secs: default_timeout(),
            workers: default_workers(),
            root: default_assets_root(),
            work_dir: default_work_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_blender() -> PathBuf {
    PathBuf::from("blender")
}

fn default_timeout() -> u64 {
    120
}

fn default_workers() -> usize {
    2
}

fn default_assets_root() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./assets/work")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./assets/cache")
}

impl AssetsConfig {
    /// Build the conversion pipeline these settings describe
    pub fn pipeline(&self) -> Result<AssetPipeline> {
        let timeout = Duration::from_secs(self.timeout_secs);
        let blender = BlenderConverter {
            program: self.blender.clone(),
            timeout,
            ..Default::default()
        };
        let cache = MeshCache::new(self.cache_dir.clone()).with_context(|| {
            format!("Failed to open mesh cache at {}", self.cache_dir.display())
        })?;

        let mut pipeline = AssetPipeline::new(Arc::new(blender), self.work_dir.clone())
            .with_cache(cache)
            .with_workers(self.workers);
        if let Some(program) = &self.libreoffice {
            pipeline = pipeline.with_stencil(Arc::new(LibreOfficeConverter {
                program: program.clone(),
                timeout,
            }));
        }
        Ok(pipeline)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let mut config = Config::default();
    config.zones.insert("10", "corp");
    config.zones.insert("guest", "guest");
    config.assets.libreoffice = Some(PathBuf::from("soffice"));

    let content = toml::to_string_pretty(&config)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config {}", path.display()))?;
    Ok(())
}
