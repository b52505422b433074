//! Bounded-parallel asset conversion
//!
//! Each job turns one icon (SVG, or a Visio stencil when a stencil converter
//! is configured) into one mesh. Jobs run on a `JoinSet` limited by a
//! semaphore; the mesh cache is only read through a snapshot by workers and
//! is updated on the coordinating task once all jobs finish.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use topoviz_core::Device;

use crate::cache::{sha256_hex, MeshCache};
use crate::converter::{ConversionError, MeshConverter};
use crate::svg::{sanitize_svg, validate_svg};

/// Extension written by the mesh converter
pub const MESH_EXTENSION: &str = "glb";

/// One conversion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl AssetJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Result of one job
#[derive(Debug)]
pub struct AssetOutcome {
    pub job: AssetJob,
    pub result: Result<PathBuf, ConversionError>,
    /// Mesh was copied from the cache instead of converted
    pub from_cache: bool,
}

impl AssetOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Svg,
    Stencil,
}

fn input_kind(path: &Path) -> Option<InputKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "svg" => Some(InputKind::Svg),
        "vss" | "vsd" => Some(InputKind::Stencil),
        _ => None,
    }
}

/// State shared read-only by workers
struct WorkerContext {
    mesh: Arc<dyn MeshConverter>,
    stencil: Option<Arc<dyn MeshConverter>>,
    work_dir: PathBuf,
    cached: HashMap<String, PathBuf>,
}

/// Worker output before the coordinator touches the cache
struct Converted {
    path: PathBuf,
    /// Set for fresh conversions, which must be stored in the cache
    sha: Option<String>,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ConversionError + '_ {
    move |source| ConversionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl WorkerContext {
    async fn run(&self, index: usize, job: &AssetJob) -> Result<Converted, ConversionError> {
        let stem = job
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| ConversionError::Unsupported(job.input.clone()))?;

        let svg_path = match input_kind(&job.input) {
            Some(InputKind::Svg) => job.input.clone(),
            Some(InputKind::Stencil) => {
                let stencil = self
                    .stencil
                    .as_ref()
                    .ok_or_else(|| ConversionError::Unsupported(job.input.clone()))?;
                let target = self.work_dir.join(format!("{}-{}.svg", index, stem));
                stencil.convert(&job.input, &target).await?
            }
            None => return Err(ConversionError::Unsupported(job.input.clone())),
        };

        let raw = tokio::fs::read_to_string(&svg_path)
            .await
            .map_err(io_error(&svg_path))?;
        let sanitized = sanitize_svg(&raw);
        if sanitized.removed > 0 {
            debug!(
                path = %svg_path.display(),
                removed = sanitized.removed,
                "Removed duplicate SVG attributes"
            );
        }
        validate_svg(&sanitized.svg).map_err(|source| ConversionError::InvalidSvg {
            path: svg_path.clone(),
            source,
        })?;

        let sha = sha256_hex(sanitized.svg.as_bytes());

        if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_error(parent))?;
        }

        if let Some(cached) = self.cached.get(&sha) {
            tokio::fs::copy(cached, &job.output)
                .await
                .map_err(io_error(cached))?;
            debug!(input = %job.input.display(), sha = %MeshCache::short_sha(&sha), "Mesh cache hit");
            return Ok(Converted {
                path: job.output.clone(),
                sha: None,
            });
        }

        let clean = self.work_dir.join(format!("{}-{}.clean.svg", index, stem));
        tokio::fs::write(&clean, sanitized.svg.as_bytes())
            .await
            .map_err(io_error(&clean))?;
        let path = self.mesh.convert(&clean, &job.output).await?;
        Ok(Converted {
            path,
            sha: Some(sha),
        })
    }
}

/// Converter set plus worker pool settings
pub struct AssetPipeline {
    mesh: Arc<dyn MeshConverter>,
    stencil: Option<Arc<dyn MeshConverter>>,
    cache: Option<MeshCache>,
    work_dir: PathBuf,
    workers: usize,
}

impl AssetPipeline {
    /// `work_dir` receives intermediate SVGs; it is created on first use
    pub fn new(mesh: Arc<dyn MeshConverter>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            mesh,
            stencil: None,
            cache: None,
            work_dir: work_dir.into(),
            workers: 1,
        }
    }

    pub fn with_stencil(mut self, stencil: Arc<dyn MeshConverter>) -> Self {
        self.stencil = Some(stencil);
        self
    }

    pub fn with_cache(mut self, cache: MeshCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Maximum concurrent conversions (at least one)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn cache(&self) -> Option<&MeshCache> {
        self.cache.as_ref()
    }

    /// Whether a file with this extension can be converted
    pub fn accepts(&self, path: &Path) -> bool {
        match input_kind(path) {
            Some(InputKind::Svg) => true,
            Some(InputKind::Stencil) => self.stencil.is_some(),
            None => false,
        }
    }

    fn snapshot(&self) -> HashMap<String, PathBuf> {
        let Some(cache) = &self.cache else {
            return HashMap::new();
        };
        cache
            .index
            .meshes
            .keys()
            .filter_map(|sha| cache.mesh_path(sha).map(|path| (sha.clone(), path)))
            .collect()
    }

    /// Run every job, returning outcomes in job order.
    ///
    /// Failures are reported per job; one failing conversion never stops
    /// the others.
    pub async fn convert_all(&mut self, jobs: Vec<AssetJob>) -> Vec<AssetOutcome> {
        if jobs.is_empty() {
            return Vec::new();
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.work_dir).await {
            warn!(path = %self.work_dir.display(), error = %e, "Failed to create asset work directory");
        }

        let ctx = Arc::new(WorkerContext {
            mesh: Arc::clone(&self.mesh),
            stencil: self.stencil.clone(),
            work_dir: self.work_dir.clone(),
            cached: self.snapshot(),
        });
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        info!(jobs = jobs.len(), workers = self.workers, "Converting assets");

        for (index, job) in jobs.into_iter().enumerate() {
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = ctx.run(index, &job).await;
                (index, job, result)
            });
        }

        let mut finished = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, job, result)) => {
                    finished.insert(index, (job, result));
                }
                Err(e) => warn!(error = %e, "Asset conversion task aborted"),
            }
        }

        let mut outcomes = Vec::with_capacity(finished.len());
        let mut stored = 0;
        for (job, result) in finished.into_values() {
            let outcome = match result {
                Ok(Converted { path, sha }) => {
                    let from_cache = sha.is_none();
                    if let (Some(sha), Some(cache)) = (sha, self.cache.as_mut()) {
                        match cache.store_mesh(&sha, &job.input, &path) {
                            Ok(_) => stored += 1,
                            Err(e) => warn!(path = %path.display(), error = %e, "Failed to cache mesh"),
                        }
                    }
                    AssetOutcome {
                        job,
                        result: Ok(path),
                        from_cache,
                    }
                }
                Err(e) => {
                    warn!(input = %job.input.display(), error = %e, "Asset conversion failed");
                    AssetOutcome {
                        job,
                        result: Err(e),
                        from_cache: false,
                    }
                }
            };
            outcomes.push(outcome);
        }

        if stored > 0 {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.save() {
                    warn!(path = %cache.index_path.display(), error = %e, "Failed to save mesh cache index");
                }
            }
        }

        let converted = outcomes.iter().filter(|o| o.is_ok()).count();
        let cached = outcomes.iter().filter(|o| o.from_cache).count();
        info!(
            converted = converted,
            cached = cached,
            failed = outcomes.len() - converted,
            "Asset conversion finished"
        );
        outcomes
    }

    /// Convert every supported file in `input_dir` to `output_dir/<stem>.glb`
    pub async fn convert_dir(
        &mut self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<Vec<AssetOutcome>, ConversionError> {
        let mut entries = tokio::fs::read_dir(input_dir)
            .await
            .map_err(io_error(input_dir))?;

        let mut inputs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(input_dir))? {
            let path = entry.path();
            if path.is_file() && self.accepts(&path) {
                inputs.push(path);
            } else {
                debug!(path = %path.display(), "Skipping unsupported asset");
            }
        }
        inputs.sort();

        let jobs = inputs
            .into_iter()
            .filter_map(|input| {
                let stem = input.file_stem()?.to_string_lossy().into_owned();
                let output = output_dir.join(format!("{}.{}", stem, MESH_EXTENSION));
                Some(AssetJob::new(input, output))
            })
            .collect();

        Ok(self.convert_all(jobs).await)
    }
}

/// Make sure every device's mesh exists under `asset_root`.
///
/// Missing meshes are converted from the device icon when one is on disk.
/// Devices whose mesh is still unavailable are pointed at `placeholder`.
/// Returns the number of devices that fell back.
pub async fn resolve_meshes(
    devices: &mut [Device],
    pipeline: &mut AssetPipeline,
    asset_root: &Path,
    placeholder: &str,
) -> usize {
    let mut fallback = vec![false; devices.len()];
    let mut job_for_output: BTreeMap<PathBuf, AssetJob> = BTreeMap::new();
    let mut waiting: Vec<(usize, PathBuf)> = Vec::new();

    for (i, device) in devices.iter().enumerate() {
        let Some(model3d) = device.model3d.as_deref() else {
            continue;
        };
        if model3d == placeholder {
            continue;
        }
        let mesh = asset_root.join(model3d);
        if mesh.is_file() {
            continue;
        }

        let icon = device
            .icon
            .as_deref()
            .map(|icon| asset_root.join(icon))
            .filter(|icon| icon.is_file() && pipeline.accepts(icon));
        match icon {
            Some(icon) => {
                job_for_output
                    .entry(mesh.clone())
                    .or_insert_with(|| AssetJob::new(icon, mesh.clone()));
                waiting.push((i, mesh));
            }
            None => {
                warn!(
                    device = %device.id,
                    mesh = %mesh.display(),
                    "Mesh missing and no convertible icon, using placeholder"
                );
                fallback[i] = true;
            }
        }
    }

    if !job_for_output.is_empty() {
        let outcomes = pipeline
            .convert_all(job_for_output.into_values().collect())
            .await;
        let converted: HashMap<&Path, bool> = outcomes
            .iter()
            .map(|o| (o.job.output.as_path(), o.is_ok()))
            .collect();

        // Jobs lost to an aborted task have no outcome at all
        for (i, mesh) in waiting {
            let ok = converted.get(mesh.as_path()).copied().unwrap_or(false);
            if !ok || !mesh.is_file() {
                warn!(
                    device = %devices[i].id,
                    mesh = %mesh.display(),
                    "Mesh conversion produced no file, using placeholder"
                );
                fallback[i] = true;
            }
        }
    }

    let mut count = 0;
    for (device, fell_back) in devices.iter_mut().zip(fallback) {
        if fell_back {
            device.model3d = Some(placeholder.to_string());
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use topoviz_core::DeviceId;

    const ICON: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect fill="red" fill="blue"/></svg>"#;

    /// Writes the input text to the output, or fails every call
    struct FakeConverter {
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeConverter {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MeshConverter for FakeConverter {
        fn name(&self) -> &str {
            "fake"
        }

        async fn convert(&self, input: &Path, output: &Path) -> Result<PathBuf, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ConversionError::Failed {
                    tool: "fake".to_string(),
                    input: input.to_path_buf(),
                    status: "exit status: 1".to_string(),
                    stderr: String::new(),
                });
            }
            let text = tokio::fs::read_to_string(input).await.unwrap();
            tokio::fs::write(output, format!("mesh:{}", text)).await.unwrap();
            Ok(output.to_path_buf())
        }
    }

    #[tokio::test]
    async fn test_converts_sanitized_svg() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("fw.svg");
        std::fs::write(&input, ICON).unwrap();

        let fake = FakeConverter::new(false);
        let mut pipeline = AssetPipeline::new(fake.clone(), dir.path().join("work"));
        let outcomes = pipeline
            .convert_all(vec![AssetJob::new(&input, dir.path().join("out/fw.glb"))])
            .await;

        assert_eq!(outcomes.len(), 1);
        let mesh = outcomes[0].result.as_ref().unwrap();
        let content = std::fs::read_to_string(mesh).unwrap();
        assert!(content.contains(r#"<rect fill="red"/>"#));
        assert!(!content.contains("blue"));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_skips_second_conversion() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("fw.svg");
        std::fs::write(&input, ICON).unwrap();
        let cache_dir = dir.path().join("cache");

        let fake = FakeConverter::new(false);
        let mut pipeline = AssetPipeline::new(fake.clone(), dir.path().join("work"))
            .with_cache(MeshCache::new(cache_dir.clone()).unwrap());
        let first = pipeline
            .convert_all(vec![AssetJob::new(&input, dir.path().join("a.glb"))])
            .await;
        assert!(!first[0].from_cache);

        // Fresh pipeline, same cache directory on disk
        let mut pipeline = AssetPipeline::new(fake.clone(), dir.path().join("work"))
            .with_cache(MeshCache::new(cache_dir).unwrap());
        let second = pipeline
            .convert_all(vec![AssetJob::new(&input, dir.path().join("b.glb"))])
            .await;

        assert!(second[0].from_cache);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            std::fs::read(dir.path().join("a.glb")).unwrap(),
            std::fs::read(dir.path().join("b.glb")).unwrap()
        );
    }

    #[tokio::test]
    async fn test_failures_are_per_job() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.svg");
        let bad = dir.path().join("bad.svg");
        std::fs::write(&good, ICON).unwrap();
        std::fs::write(&bad, "<html><body/></html>").unwrap();

        let mut pipeline =
            AssetPipeline::new(FakeConverter::new(false), dir.path().join("work")).with_workers(4);
        let outcomes = pipeline
            .convert_all(vec![
                AssetJob::new(&bad, dir.path().join("bad.glb")),
                AssetJob::new(&good, dir.path().join("good.glb")),
                AssetJob::new(dir.path().join("x.vss"), dir.path().join("x.glb")),
            ])
            .await;

        assert!(matches!(outcomes[0].result, Err(ConversionError::InvalidSvg { .. })));
        assert!(outcomes[1].is_ok());
        // No stencil converter configured
        assert!(matches!(outcomes[2].result, Err(ConversionError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_convert_dir() {
        let dir = TempDir::new().unwrap();
        let icons = dir.path().join("icons");
        std::fs::create_dir_all(&icons).unwrap();
        std::fs::write(icons.join("a.svg"), ICON).unwrap();
        std::fs::write(icons.join("b.SVG"), ICON).unwrap();
        std::fs::write(icons.join("notes.txt"), "skip").unwrap();
        std::fs::write(icons.join("c.vss"), "stencil").unwrap();

        let mut pipeline = AssetPipeline::new(FakeConverter::new(false), dir.path().join("work"));
        let outcomes = pipeline
            .convert_dir(&icons, &dir.path().join("models"))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(AssetOutcome::is_ok));
        assert!(dir.path().join("models/a.glb").is_file());
        assert!(dir.path().join("models/b.glb").is_file());
    }

    #[tokio::test]
    async fn test_resolve_meshes_fallbacks() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("icons")).unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("icons/fortigate.svg"), ICON).unwrap();
        std::fs::write(dir.path().join("models/present.glb"), "mesh").unwrap();

        let device = |id: &str, icon: Option<&str>, model3d: &str| {
            let mut d = Device::new(DeviceId::new(id), None, id);
            d.icon = icon.map(str::to_string);
            d.model3d = Some(model3d.to_string());
            d
        };
        let mut devices = vec![
            device("fw1", Some("icons/fortigate.svg"), "models/fortigate.glb"),
            device("fw2", Some("icons/fortigate.svg"), "models/fortigate.glb"),
            device("sw1", None, "models/present.glb"),
            device("ap1", Some("icons/missing.svg"), "models/ap.glb"),
        ];

        let placeholder = "models/generic_device.glb";
        let fake = FakeConverter::new(false);
        let mut pipeline = AssetPipeline::new(fake.clone(), dir.path().join("work"));
        let fallbacks = resolve_meshes(&mut devices, &mut pipeline, dir.path(), placeholder).await;

        assert_eq!(fallbacks, 1);
        // Two devices share one mesh: converted once
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("models/fortigate.glb").is_file());
        assert_eq!(devices[0].model3d.as_deref(), Some("models/fortigate.glb"));
        assert_eq!(devices[2].model3d.as_deref(), Some("models/present.glb"));
        assert_eq!(devices[3].model3d.as_deref(), Some(placeholder));
    }

    struct CrashingConverter;

    #[async_trait]
    impl MeshConverter for CrashingConverter {
        fn name(&self) -> &str {
            "crashing"
        }

        async fn convert(&self, _input: &Path, _output: &Path) -> Result<PathBuf, ConversionError> {
            panic!("converter crashed");
        }
    }

    #[tokio::test]
    async fn test_resolve_meshes_aborted_task_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fw.svg"), ICON).unwrap();
        let mut d = Device::new(DeviceId::new("fw1"), None, "fw");
        d.icon = Some("fw.svg".to_string());
        d.model3d = Some("fw.glb".to_string());
        let mut devices = vec![d];

        let mut pipeline = AssetPipeline::new(Arc::new(CrashingConverter), dir.path().join("work"));
        let fallbacks = resolve_meshes(&mut devices, &mut pipeline, dir.path(), "generic.glb").await;

        assert_eq!(fallbacks, 1);
        assert_eq!(devices[0].model3d.as_deref(), Some("generic.glb"));
        assert!(!dir.path().join("fw.glb").exists());
    }

    #[tokio::test]
    async fn test_resolve_meshes_conversion_failure() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fw.svg"), ICON).unwrap();
        let mut d = Device::new(DeviceId::new("fw1"), None, "fw");
        d.icon = Some("fw.svg".to_string());
        d.model3d = Some("fw.glb".to_string());
        let mut devices = vec![d];

        let mut pipeline = AssetPipeline::new(FakeConverter::new(true), dir.path().join("work"));
        let fallbacks = resolve_meshes(&mut devices, &mut pipeline, dir.path(), "generic.glb").await;

        assert_eq!(fallbacks, 1);
        assert_eq!(devices[0].model3d.as_deref(), Some("generic.glb"));
    }
}
