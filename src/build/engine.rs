//! Build engine.
//!
//! Runs one pass over a set of asset definitions:
//!
//! 1. Expand definitions into assets (sequential).
//! 2. Resolve importer, processor, writer and output path for every asset
//!    and fail assets whose outputs collide (sequential).
//! 3. Build the remaining assets on a bounded worker pool, each one either
//!    carried forward from the previous manifest or run through
//!    import → process → write.
//!
//! Items are collected in expansion order whatever the worker count.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use assetforge::build::BuildEngine;
//! use assetforge::config::AssetDefinition;
//! use assetforge::content::{BuiltinComponents, DescriptorRegistry};
//! use assetforge::fs::MemoryFileSystem;
//!
//! let fs = Arc::new(MemoryFileSystem::new().with_file("/p/content/hello.txt", "HELLO WORLD"));
//! let registry = DescriptorRegistry::from_source(&BuiltinComponents).unwrap();
//! let engine = BuildEngine::new(registry, fs.clone())
//!     .with_input_dir("/p/content")
//!     .with_output_dir("/p/build")
//!     .with_unix(true);
//!
//! let result = engine.run(&[AssetDefinition::new("*.txt").with_processor("reverse")], None).unwrap();
//! assert!(result.is_success());
//! assert_eq!(fs.read_to_string("/p/build/hello.txt").as_deref(), Some("DLROW OLLEH"));
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use thiserror::Error;

use crate::build::{
    discover_assets, Asset, BuildContext, BuildError, BuildEvent, BuildLog, BuildManifest,
    BuildManifestItem, BuildResult, ComponentChain, Decision, NullLog, PlannedBuild, StalenessCheck,
};
use crate::config::AssetDefinition;
use crate::content::{ContentError, DescriptorRegistry, ImporterEntry, ProcessorEntry, WriterEntry};
use crate::fs::{normalize, path_key, split_root, to_slash, FileSystem};
use crate::hash::{HashComputer, HashError};

/// Error building a single asset. Recorded as a failed item; never aborts
/// the pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssetError {
    #[error("no importer handles '{asset}'")]
    MissingImporter { asset: String },
    #[error("no processor for '{asset}'{}", .requested.as_ref().map(|n| format!(" (requested '{}')", n)).unwrap_or_default())]
    MissingProcessor { asset: String, requested: Option<String> },
    #[error("no writer accepts values of type '{type_id}'")]
    MissingWriter { type_id: String },
    #[error("importer '{importer}' produces '{produced}' but processor '{processor}' expects '{expected}'")]
    TypeMismatch { importer: String, produced: String, processor: String, expected: String },
    #[error("output path collision: '{output}' is also produced by {others}")]
    OutputCollision { output: String, others: String },
    #[error("import failed: {0}")]
    Import(#[source] ContentError),
    #[error("process failed: {0}")]
    Process(#[source] ContentError),
    #[error("write failed: {0}")]
    Write(#[source] ContentError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Cooperative cancellation signal, checked before each asset starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Assets already running finish normally.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Default number of parallel jobs (uses available parallelism).
pub(crate) fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Components and output chosen for one asset.
struct Work<'r> {
    importer: &'r ImporterEntry,
    processor: &'r ProcessorEntry,
    writer: &'r WriterEntry,
    output: PathBuf,
}

impl Work<'_> {
    fn chain(&self) -> ComponentChain {
        ComponentChain {
            importer: self.importer.descriptor.name.clone(),
            processor: self.processor.descriptor.name.clone(),
            writer: self.writer.descriptor.name.clone(),
        }
    }
}

struct Planned<'r> {
    asset: Asset,
    /// `/`-separated source path
    key: String,
    work: Result<Work<'r>, AssetError>,
}

/// Executes build passes.
pub struct BuildEngine {
    registry: DescriptorRegistry,
    fs: Arc<dyn FileSystem>,
    log: Arc<dyn BuildLog>,
    hasher: HashComputer,
    input_dir: PathBuf,
    output_dir: PathBuf,
    incremental: bool,
    jobs: usize,
    unix: bool,
    cancel: CancellationToken,
}

impl BuildEngine {
    /// Create an engine reading and writing through `fs`.
    pub fn new(registry: DescriptorRegistry, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            registry,
            fs,
            log: Arc::new(NullLog),
            hasher: HashComputer::new(),
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("build"),
            incremental: true,
            jobs: default_jobs(),
            unix: cfg!(unix),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_log(mut self, log: Arc<dyn BuildLog>) -> Self {
        self.log = log;
        self
    }

    /// Directory patterns are resolved against.
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Whether unchanged assets are skipped.
    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Pattern root rules: Unix-like or drive-letter.
    pub fn with_unix(mut self, unix: bool) -> Self {
        self.unix = unix;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    pub fn hasher(&self) -> &HashComputer {
        &self.hasher
    }

    /// Token that cancels passes run by this engine.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one pass. `previous` is the manifest of the last pass, if any;
    /// it is only read.
    pub fn run(
        &self,
        definitions: &[AssetDefinition],
        previous: Option<&BuildManifest>,
    ) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let case_sensitive = self.fs.is_case_sensitive();

        let previous = match previous {
            Some(manifest) if manifest.case_sensitive != case_sensitive => {
                tracing::debug!("previous manifest used a different case policy; rebuilding everything");
                None
            }
            other if self.incremental => other,
            _ => None,
        };

        let discovery = discover_assets(definitions, &self.input_dir, &self.output_dir, self.fs.as_ref(), self.unix);
        self.log.log(BuildEvent::BuildStarted { assets: discovery.assets.len() });

        let mut ordered: Vec<(usize, BuildManifestItem)> = Vec::new();
        for failure in discovery.failures {
            let message = failure.error.to_string();
            self.log.log(BuildEvent::AssetFailed { asset: failure.pattern.clone(), message: message.clone() });
            ordered.push((failure.definition, BuildManifestItem::failed(failure.pattern, message)));
        }

        let planned = self.plan(discovery.assets);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build()?;
        let outcomes: Vec<(usize, Option<BuildManifestItem>)> = pool.install(|| {
            planned
                .into_par_iter()
                .map(|p| (p.asset.definition, self.build_asset(p, previous)))
                .collect()
        });

        let mut cancelled = 0;
        for (definition, outcome) in outcomes {
            match outcome {
                Some(item) => ordered.push((definition, item)),
                None => cancelled += 1,
            }
        }
        ordered.sort_by_key(|(definition, _)| *definition);

        let items = ordered.into_iter().map(|(_, item)| item).collect();
        let result = BuildResult::new(items, case_sensitive)
            .with_cancelled(cancelled)
            .with_duration(start.elapsed());

        self.log.log(BuildEvent::BuildCompleted {
            succeeded: result.success_count(),
            skipped: result.skipped_count(),
            failed: result.failed_count(),
            cancelled,
        });
        Ok(result)
    }

    /// Resolve every asset and fail those whose outputs collide.
    fn plan(&self, assets: Vec<Asset>) -> Vec<Planned<'_>> {
        let case_sensitive = self.fs.is_case_sensitive();
        let mut planned: Vec<Planned<'_>> = assets
            .into_iter()
            .map(|asset| {
                let work = self.resolve(&asset);
                Planned { key: asset.key_path(), asset, work }
            })
            .collect();

        let mut by_output: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, p) in planned.iter().enumerate() {
            if let Ok(work) = &p.work {
                by_output.entry(path_key(&to_slash(&work.output), case_sensitive)).or_default().push(i);
            }
        }

        for indices in by_output.into_values().filter(|v| v.len() > 1) {
            let keys: Vec<String> = indices.iter().map(|&i| planned[i].key.clone()).collect();
            for &i in &indices {
                let output = match &planned[i].work {
                    Ok(work) => to_slash(&work.output),
                    Err(_) => continue,
                };
                let others = keys
                    .iter()
                    .filter(|k| **k != planned[i].key)
                    .map(|k| format!("'{}'", k))
                    .collect::<Vec<_>>()
                    .join(", ");
                planned[i].work = Err(AssetError::OutputCollision { output, others });
            }
        }

        planned
    }

    fn resolve(&self, asset: &Asset) -> Result<Work<'_>, AssetError> {
        let importer = self
            .registry
            .importer_for(asset)
            .ok_or_else(|| AssetError::MissingImporter { asset: asset.key_path() })?;

        let processor = self.registry.processor_for(asset).ok_or_else(|| AssetError::MissingProcessor {
            asset: asset.key_path(),
            requested: asset.processor.clone(),
        })?;

        if let Some(produced) = &importer.descriptor.output_type {
            if produced != processor.source_type() {
                return Err(AssetError::TypeMismatch {
                    importer: importer.descriptor.name.clone(),
                    produced: produced.clone(),
                    processor: processor.descriptor.name.clone(),
                    expected: processor.source_type().to_string(),
                });
            }
        }

        let writer = self
            .registry
            .writer_for(processor.target_type())
            .ok_or_else(|| AssetError::MissingWriter { type_id: processor.target_type().to_string() })?;

        let extension = processor
            .descriptor
            .output_extension
            .as_deref()
            .or(importer.descriptor.output_extension.as_deref());
        let output = self.output_path(&asset.path, extension);

        Ok(Work { importer, processor, writer, output })
    }

    /// Output location of a source file: its path relative to the input
    /// directory, placed under the output directory. Sources outside the
    /// input directory keep only their file name.
    pub fn output_path(&self, source: &Path, extension: Option<&str>) -> PathBuf {
        let case_sensitive = self.fs.is_case_sensitive();
        let source_text = normalize(&to_slash(source));
        let input = normalize(&to_slash(&self.input_dir));

        let relative = if input == "." && split_root(&source_text).0.is_empty() {
            Some(source_text.clone())
        } else {
            let prefix = if input.ends_with('/') { input } else { format!("{}/", input) };
            path_key(&source_text, case_sensitive)
                .starts_with(&path_key(&prefix, case_sensitive))
                .then(|| source_text[prefix.len()..].to_string())
        };
        let relative = relative
            .filter(|r| !r.is_empty() && !r.starts_with("../"))
            .unwrap_or_else(|| source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());

        let mut output = self.output_dir.join(relative);
        if let Some(extension) = extension {
            output.set_extension(extension.trim_start_matches('.'));
        }
        output
    }

    fn build_asset(&self, planned: Planned<'_>, previous: Option<&BuildManifest>) -> Option<BuildManifestItem> {
        if self.cancel.is_cancelled() {
            tracing::debug!(asset = %planned.key, "cancelled before start");
            return None;
        }

        let Planned { asset, key, work } = planned;
        let outcome = work.and_then(|work| self.execute(&asset, &key, work, previous));
        Some(match outcome {
            Ok(item) => item,
            Err(e) => {
                let message = e.to_string();
                self.log.log(BuildEvent::AssetFailed { asset: key.clone(), message: message.clone() });
                BuildManifestItem::failed(key, message)
            }
        })
    }

    fn execute(
        &self,
        asset: &Asset,
        key: &str,
        work: Work<'_>,
        previous: Option<&BuildManifest>,
    ) -> Result<BuildManifestItem, AssetError> {
        let chain = work.chain();
        let mut source = None;
        if let Some(prior) = previous.and_then(|m| m.get(key)) {
            let planned = PlannedBuild { source: &asset.path, output: &work.output, chain: &chain };
            let staleness = StalenessCheck::new(self.fs.as_ref(), &self.hasher).check(&planned, Some(prior));
            source = staleness.source;
            match staleness.decision {
                Decision::Skip => {
                    self.log.log(BuildEvent::AssetSkipped { asset: key.to_string() });
                    return Ok(prior.skipped());
                }
                Decision::Rebuild(reason) => {
                    tracing::debug!(asset = %key, reason = ?reason, "rebuilding");
                    if let Some(event) = reason.event(key) {
                        self.log.log(event);
                    }
                }
            }
        }

        let fingerprint = match source {
            Some(fingerprint) => fingerprint,
            None => self.hasher.hash_file(self.fs.as_ref(), &asset.path)?,
        };

        let mut ctx = BuildContext::new(&asset.path, self.fs.as_ref(), self.log.as_ref(), &self.hasher);
        let value = work.importer.component.import(&mut ctx, &asset.path).map_err(AssetError::Import)?;
        let value = work.processor.component.process(&mut ctx, value).map_err(AssetError::Process)?;
        work.writer.component.write(&mut ctx, &work.output, value).map_err(AssetError::Write)?;

        let output = to_slash(&work.output);
        self.log.log(BuildEvent::AssetBuilt { asset: key.to_string(), output: output.clone() });
        Ok(BuildManifestItem::success(
            key.to_string(),
            fingerprint.checksum,
            fingerprint.length,
            ctx.into_dependencies(),
            output,
        )
        .with_chain(chain))
    }
}
