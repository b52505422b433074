//! topoviz - Network topology manifest builder
//!
//! Classifies an inventory, lays it out and writes the manifest consumed by
//! the 3D viewer. Optionally converts device icons into placeholder meshes.

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use topoviz_assets::resolve_meshes;
use topoviz_core::{load_devices, load_neighbor_data, Classifier, RuleSet, TopologyBuilder};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "topoviz")]
#[command(about = "Build 3D network topology manifests from device inventories")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "topoviz.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the topology manifest from an inventory
    Build {
        /// Devices JSON (array of records or {"devices": [...]})
        #[arg(short, long)]
        devices: PathBuf,
        /// Explicit links or neighbor map JSON
        #[arg(long)]
        links: Option<PathBuf>,
        /// Manifest output path (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Classification rules file (overrides config)
        #[arg(short, long)]
        rules: Option<PathBuf>,
        /// Convert missing meshes from device icons before writing
        #[arg(long)]
        convert_assets: bool,
    },
    /// Classify a single MAC and/or label and print the result
    Classify {
        #[arg(long)]
        mac: Option<String>,
        /// Model name or hostname used for hint matching
        #[arg(long)]
        label: Option<String>,
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
    /// Convert a directory of SVG icons (and stencils) into meshes
    Assets {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Write a default configuration and built-in rules file
    InitConfig {
        #[arg(short, long, default_value = "topoviz.toml")]
        path: PathBuf,
        #[arg(short, long, default_value = "device_model_rules.json")]
        rules: PathBuf,
        /// Replace existing files
        #[arg(long)]
        force: bool,
    },
}

/// Load rules from `--rules` or the configured path; a missing file is fatal
fn load_rules(explicit: Option<&Path>, config: &Config) -> Result<RuleSet> {
    let path = explicit.unwrap_or(config.build.rules.as_path());
    let rules = RuleSet::from_file(path).with_context(|| {
        format!(
            "Failed to load rules from {} (run `topoviz init-config` to create one)",
            path.display()
        )
    })?;
    info!(path = %path.display(), rules = rules.rules.len(), "Loaded classification rules");
    Ok(rules)
}

async fn build(
    config: &Config,
    devices: &Path,
    links: Option<&Path>,
    output: Option<&Path>,
    rules: Option<&Path>,
    convert_assets: bool,
) -> Result<()> {
    // Configuration errors surface before any device is touched
    let rules = load_rules(rules, config)?;
    let output = output.unwrap_or(config.build.output.as_path());

    let inventory = load_devices(devices)
        .with_context(|| format!("Failed to load devices from {}", devices.display()))?;
    let mut extra = Vec::new();
    if let Some(links) = links {
        extra.push(
            load_neighbor_data(links)
                .with_context(|| format!("Failed to load links from {}", links.display()))?,
        );
    }
    info!(devices = inventory.len(), "Loaded inventory");

    let builder = TopologyBuilder::new(Classifier::new(rules))
        .with_zones(config.zones.clone())
        .with_layout(config.layout.layer_order.clone(), config.layout.spacing());
    let mut topology = builder.build(inventory, &extra);

    let mut asset_fallbacks = 0;
    if convert_assets {
        match builder.classifier().placeholder_model3d() {
            Some(placeholder) => {
                let placeholder = placeholder.to_string();
                let mut pipeline = config.assets.pipeline()?;
                asset_fallbacks = resolve_meshes(
                    &mut topology.devices,
                    &mut pipeline,
                    &config.assets.root,
                    &placeholder,
                )
                .await;
            }
            None => warn!("Default rule has no placeholder mesh, skipping asset conversion"),
        }
    }

    let (_, mut report) = topology
        .assemble(output)
        .with_context(|| format!("Failed to write manifest {}", output.display()))?;
    report.asset_fallbacks = asset_fallbacks;
    report.log();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn classify(
    config: &Config,
    mac: Option<&str>,
    label: Option<&str>,
    rules: Option<&Path>,
) -> Result<()> {
    if mac.is_none() && label.is_none() {
        bail!("Nothing to classify: pass --mac and/or --label");
    }
    let classifier = Classifier::new(load_rules(rules, config)?);
    let result = classifier.classify(mac, label);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn assets(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let mut pipeline = config.assets.pipeline()?;
    let outcomes = pipeline
        .convert_dir(input, output)
        .await
        .with_context(|| format!("Failed to read asset directory {}", input.display()))?;

    for outcome in &outcomes {
        match &outcome.result {
            Ok(mesh) => println!("{} -> {}", outcome.job.input.display(), mesh.display()),
            Err(e) => println!("{} FAILED: {}", outcome.job.input.display(), e),
        }
    }
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    info!(
        total = outcomes.len(),
        failed = failed,
        "Asset directory processed"
    );
    Ok(())
}

fn init_config(path: &Path, rules: &Path, force: bool) -> Result<()> {
    for target in [path, rules] {
        if target.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", target.display());
        }
    }

    config::save_default_config(path)?;
    info!(path = %path.display(), "Wrote default configuration");

    RuleSet::builtin()
        .to_file(rules)
        .with_context(|| format!("Failed to write rules {}", rules.display()))?;
    info!(path = %rules.display(), "Wrote built-in classification rules");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so command output stays machine-readable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("topoviz v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::InitConfig { path, rules, force } => init_config(&path, &rules, force),
        command => {
            let config = config::load_config(&args.config)?;
            match command {
                Command::Build {
                    devices,
                    links,
                    output,
                    rules,
                    convert_assets,
                } => {
                    build(
                        &config,
                        &devices,
                        links.as_deref(),
                        output.as_deref(),
                        rules.as_deref(),
                        convert_assets,
                    )
                    .await
                }
                Command::Classify { mac, label, rules } => {
                    classify(&config, mac.as_deref(), label.as_deref(), rules.as_deref())
                }
                Command::Assets { input, output } => assets(&config, &input, &output).await,
                Command::InitConfig { .. } => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_config_writes_loadable_files() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("topoviz.toml");
        let rules_path = temp_dir.path().join("rules.json");

        init_config(&config_path, &rules_path, false).unwrap();
        let config = config::load_config(&config_path).unwrap();
        let rules = load_rules(Some(rules_path.as_path()), &config).unwrap();
        assert_eq!(rules, RuleSet::builtin());

        // Existing files are kept unless forced
        assert!(init_config(&config_path, &rules_path, false).is_err());
        init_config(&config_path, &rules_path, true).unwrap();
    }

    #[test]
    fn test_missing_rules_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.build.rules = temp_dir.path().join("absent.json");

        let err = load_rules(None, &config).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
        assert!(load_rules(Some(config.build.rules.as_path()), &config).is_err());
    }

    #[tokio::test]
    async fn test_build_without_rules_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let devices = temp_dir.path().join("devices.json");
        let output = temp_dir.path().join("topology_manifest.json");
        std::fs::write(&devices, r#"[{"id": "fw1"}]"#).unwrap();
        let mut config = Config::default();
        config.build.rules = temp_dir.path().join("device_model_rules.json");

        let err = build(&config, &devices, None, Some(output.as_path()), None, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("device_model_rules.json"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_build_writes_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let devices = temp_dir.path().join("devices.json");
        let output = temp_dir.path().join("out/topology_manifest.json");
        std::fs::create_dir_all(temp_dir.path().join("out")).unwrap();
        std::fs::write(
            &devices,
            r#"[
                {"id": "fw1", "mac": "00:09:0F:AA:BB:CC", "hostname": "edge-fw"},
                {"id": "ap1", "mac": "E0:55:3D:00:00:01", "model": "MR46", "neighbors": ["00:09:0f:aa:bb:cc"]}
            ]"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.build.rules = temp_dir.path().join("rules.json");
        RuleSet::builtin().to_file(&config.build.rules).unwrap();

        build(&config, &devices, None, Some(output.as_path()), None, false)
            .await
            .unwrap();

        let manifest = topoviz_core::Manifest::from_file(&output).unwrap();
        assert_eq!(manifest.nodes.len(), 2);
        assert_eq!(manifest.edges.len(), 1);
    }
}
