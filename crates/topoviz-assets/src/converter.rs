//! External converters (Blender, LibreOffice) behind a narrow capability trait
//!
//! Each conversion is one subprocess with an explicit timeout. The child is
//! spawned with `kill_on_drop`, so hitting the timeout also kills it.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::svg::SanitizeError;

/// Default per-conversion timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Keep this much of a failing tool's stderr in the error
const STDERR_TAIL: usize = 2000;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{} exited with {} converting {}: {}", .tool, .status, .input.display(), .stderr)]
    Failed {
        tool: String,
        input: PathBuf,
        status: String,
        stderr: String,
    },
    #[error("{} timed out after {}s converting {}", .tool, .secs, .input.display())]
    Timeout {
        tool: String,
        input: PathBuf,
        secs: u64,
    },
    #[error("{} reported success but produced no file at {}", .tool, .path.display())]
    MissingOutput { tool: String, path: PathBuf },
    #[error("Invalid SVG {}: {}", .path.display(), .source)]
    InvalidSvg {
        path: PathBuf,
        #[source]
        source: SanitizeError,
    },
    #[error("Unsupported input {}", .0.display())]
    Unsupported(PathBuf),
    #[error("IO error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A tool that turns one input file into one output file
#[async_trait]
pub trait MeshConverter: Send + Sync {
    /// Tool name used in logs and errors
    fn name(&self) -> &str;

    /// Convert `input` into `output`, returning the path actually written
    async fn convert(&self, input: &Path, output: &Path) -> Result<PathBuf, ConversionError>;
}

/// Run an external program to completion under a timeout
pub async fn run_tool(
    tool: &str,
    program: &Path,
    args: &[OsString],
    input: &Path,
    timeout: Duration,
) -> Result<(), ConversionError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(tool = %tool, program = %program.display(), ?args, "Running external converter");

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => {
            return Err(ConversionError::Timeout {
                tool: tool.to_string(),
                input: input.to_path_buf(),
                secs: timeout.as_secs(),
            })
        }
        Ok(Err(source)) => {
            return Err(ConversionError::Spawn {
                tool: tool.to_string(),
                source,
            })
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_TAIL)
            .map(|(i, _)| i)
            .unwrap_or(0);
        return Err(ConversionError::Failed {
            tool: tool.to_string(),
            input: input.to_path_buf(),
            status: output.status.to_string(),
            stderr: stderr[start..].trim().to_string(),
        });
    }

    Ok(())
}

fn ensure_output(tool: &str, output: &Path) -> Result<PathBuf, ConversionError> {
    if output.is_file() {
        Ok(output.to_path_buf())
    } else {
        Err(ConversionError::MissingOutput {
            tool: tool.to_string(),
            path: output.to_path_buf(),
        })
    }
}

async fn ensure_parent(output: &Path) -> Result<(), ConversionError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ConversionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

/// Blender script: import an SVG, extrude its curves and export GLB.
/// Arguments after `--`: input, output, extrude depth.
const BLENDER_SVG_TO_GLB: &str = r#"
import sys
import bpy

src, dst, depth = sys.argv[sys.argv.index("--") + 1:][:3]
bpy.ops.wm.read_factory_settings(use_empty=True)
bpy.ops.import_curve.svg(filepath=src)
for obj in bpy.context.scene.objects:
    if obj.type == "CURVE":
        obj.data.extrude = float(depth)
bpy.ops.export_scene.gltf(filepath=dst, export_format="GLB")
"#;

/// SVG to GLB placeholder mesh via headless Blender
#[derive(Debug, Clone)]
pub struct BlenderConverter {
    pub program: PathBuf,
    pub timeout: Duration,
    /// Curve extrusion depth in scene units
    pub extrude: f64,
}

impl Default for BlenderConverter {
    fn default() -> Self {
        Self {
            program: PathBuf::from("blender"),
            timeout: DEFAULT_TIMEOUT,
            extrude: 0.05,
        }
    }
}

#[async_trait]
impl MeshConverter for BlenderConverter {
    fn name(&self) -> &str {
        "blender"
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<PathBuf, ConversionError> {
        ensure_parent(output).await?;
        let args: Vec<OsString> = vec![
            "--background".into(),
            "--factory-startup".into(),
            "--python-expr".into(),
            BLENDER_SVG_TO_GLB.into(),
            "--".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
            self.extrude.to_string().into(),
        ];
        run_tool(self.name(), &self.program, &args, input, self.timeout).await?;
        let path = ensure_output(self.name(), output)?;
        info!(input = %input.display(), output = %path.display(), "Converted SVG to mesh");
        Ok(path)
    }
}

/// Visio stencil (VSS/VSD) to SVG via headless LibreOffice
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    pub program: PathBuf,
    pub timeout: Duration,
}

impl Default for LibreOfficeConverter {
    fn default() -> Self {
        Self {
            program: PathBuf::from("soffice"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[async_trait]
impl MeshConverter for LibreOfficeConverter {
    fn name(&self) -> &str {
        "libreoffice"
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<PathBuf, ConversionError> {
        ensure_parent(output).await?;
        let outdir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let args: Vec<OsString> = vec![
            "--headless".into(),
            "--convert-to".into(),
            "svg".into(),
            "--outdir".into(),
            outdir.as_os_str().to_owned(),
            input.as_os_str().to_owned(),
        ];
        run_tool(self.name(), &self.program, &args, input, self.timeout).await?;

        // LibreOffice always names the result after the input stem
        let stem = input
            .file_stem()
            .ok_or_else(|| ConversionError::Unsupported(input.to_path_buf()))?;
        let produced = outdir.join(format!("{}.svg", stem.to_string_lossy()));
        let produced = ensure_output(self.name(), &produced)?;
        if produced != output {
            tokio::fs::rename(&produced, output)
                .await
                .map_err(|source| ConversionError::Io {
                    path: produced.clone(),
                    source,
                })?;
        }
        info!(input = %input.display(), output = %output.display(), "Converted stencil to SVG");
        Ok(output.to_path_buf())
    }
}
