//! Build manifest for tracking build state and enabling incremental builds.
//!
//! The manifest records one item per asset: its status, the length and
//! checksum of its source, every dependency its importer consulted and the
//! output it produced. The next pass reads it to skip unchanged assets.
//!
//! # Manifest Format
//!
//! The manifest is stored as JSON next to the build configuration, at
//! `<config>.manifest`:
//!
//! ```json
//! {
//!   "version": 1,
//!   "case_sensitive": true,
//!   "items": {
//!     "/project/content/hello.txt": {
//!       "asset_path": "/project/content/hello.txt",
//!       "status": "success",
//!       "checksum": "a591a6d4...",
//!       "length": 11,
//!       "dependencies": [
//!         { "path": "/project/content/hello.txt.meta", "length": 9, "checksum": "2c26b46b..." }
//!       ],
//!       "output_path": "/project/build/hello.txt"
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fs::{path_key, FileSystem};

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Suffix appended to the configuration path to locate the manifest.
pub const MANIFEST_SUFFIX: &str = ".manifest";

/// Error during manifest operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Version mismatch
    #[error("Manifest version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Location of the manifest belonging to a build configuration.
pub fn manifest_path(config_path: &Path) -> PathBuf {
    let mut path = config_path.as_os_str().to_owned();
    path.push(MANIFEST_SUFFIX);
    PathBuf::from(path)
}

/// Outcome of one asset in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    /// Built in this pass
    Success,
    /// Unchanged since a previous successful build
    Skipped,
    /// Could not be built
    Failed,
}

impl AssetStatus {
    /// Whether the item carries usable build data.
    pub fn is_built(&self) -> bool {
        matches!(self, AssetStatus::Success | AssetStatus::Skipped)
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetStatus::Success => write!(f, "success"),
            AssetStatus::Skipped => write!(f, "skipped"),
            AssetStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A secondary file an importer consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// `/`-separated path
    pub path: String,
    /// Size in bytes at import time
    pub length: u64,
    /// Fingerprint at import time
    pub checksum: String,
    /// The file did not exist at import time; creating it forces a rebuild
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub absent: bool,
}

impl Dependency {
    /// A dependency on a file that existed when it was recorded.
    pub fn present(path: String, length: u64, checksum: String) -> Self {
        Self { path, length, checksum, absent: false }
    }

    /// A dependency on a file that did not exist when it was recorded.
    pub fn absent(path: String) -> Self {
        Self { path, length: 0, checksum: String::new(), absent: true }
    }
}

/// Components an asset was built with, by display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentChain {
    pub importer: String,
    pub processor: String,
    pub writer: String,
}

impl std::fmt::Display for ComponentChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} -> {}", self.importer, self.processor, self.writer)
    }
}

/// Manifest entry for a single asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifestItem {
    /// Source path, or the pattern text for a definition that failed to compile
    pub asset_path: String,
    pub status: AssetStatus,
    /// Fingerprint of the source when it was built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Source size in bytes when it was built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    /// Error text for failed items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Components that produced the output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ComponentChain>,
}

impl BuildManifestItem {
    /// Item for an asset built in this pass.
    pub fn success(
        asset_path: String,
        checksum: String,
        length: u64,
        dependencies: Vec<Dependency>,
        output_path: String,
    ) -> Self {
        Self {
            asset_path,
            status: AssetStatus::Success,
            checksum: Some(checksum),
            length: Some(length),
            message: None,
            dependencies,
            output_path: Some(output_path),
            chain: None,
        }
    }

    /// Record the components the asset was built with.
    pub fn with_chain(mut self, chain: ComponentChain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Item for an asset that could not be built.
    pub fn failed(asset_path: String, message: String) -> Self {
        Self {
            asset_path,
            status: AssetStatus::Failed,
            checksum: None,
            length: None,
            message: Some(message),
            dependencies: Vec::new(),
            output_path: None,
            chain: None,
        }
    }

    /// Item carrying this item's data forward unchanged, marked skipped.
    pub fn skipped(&self) -> Self {
        Self { status: AssetStatus::Skipped, ..self.clone() }
    }

    /// Whether both items describe the same build output, ignoring whether
    /// it was produced or carried forward.
    pub fn same_build(&self, other: &Self) -> bool {
        self.status.is_built() == other.status.is_built()
            && self.asset_path == other.asset_path
            && self.checksum == other.checksum
            && self.length == other.length
            && self.dependencies == other.dependencies
            && self.output_path == other.output_path
            && self.chain == other.chain
    }
}

/// All items of one build pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Manifest format version
    pub version: u32,
    /// Case policy of the file system the keys were folded with
    pub case_sensitive: bool,
    /// Items keyed by asset path, case-folded when `case_sensitive` is false
    pub items: BTreeMap<String, BuildManifestItem>,
}

impl BuildManifest {
    /// Create a new empty manifest.
    pub fn new(case_sensitive: bool) -> Self {
        Self { version: MANIFEST_VERSION, case_sensitive, items: BTreeMap::new() }
    }

    /// Add an item, replacing any item for the same asset.
    pub fn insert(&mut self, item: BuildManifestItem) {
        self.items.insert(path_key(&item.asset_path, self.case_sensitive), item);
    }

    /// Item for an asset path.
    pub fn get(&self, asset_path: &str) -> Option<&BuildManifestItem> {
        self.items.get(&path_key(asset_path, self.case_sensitive))
    }

    pub fn contains(&self, asset_path: &str) -> bool {
        self.get(asset_path).is_some()
    }

    pub fn items(&self) -> impl Iterator<Item = &BuildManifestItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether both manifests describe the same outputs, ignoring
    /// success/skipped distinctions.
    pub fn same_build(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .all(|(key, item)| other.items.get(key).is_some_and(|o| item.same_build(o)))
    }
}

impl FromIterator<BuildManifestItem> for BuildManifest {
    /// Collects into a case-sensitive manifest.
    fn from_iter<I: IntoIterator<Item = BuildManifestItem>>(iter: I) -> Self {
        let mut manifest = Self::new(true);
        for item in iter {
            manifest.insert(item);
        }
        manifest
    }
}

/// Persistence of manifests between passes.
pub trait ManifestStore: Send + Sync {
    /// Load a manifest. Returns `Ok(None)` if none has been saved.
    fn load(&self, path: &Path) -> Result<Option<BuildManifest>, ManifestError>;

    fn save(&self, path: &Path, manifest: &BuildManifest) -> Result<(), ManifestError>;
}

/// Stores manifests as pretty-printed JSON.
pub struct JsonManifestStore {
    fs: Arc<dyn FileSystem>,
}

impl JsonManifestStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl ManifestStore for JsonManifestStore {
    fn load(&self, path: &Path) -> Result<Option<BuildManifest>, ManifestError> {
        if !self.fs.file_exists(path) {
            return Ok(None);
        }

        let reader = self.fs.open_read(path)?;
        let manifest: BuildManifest = serde_json::from_reader(std::io::BufReader::new(reader))?;

        // Check version compatibility
        if manifest.version != MANIFEST_VERSION {
            return Err(ManifestError::VersionMismatch {
                expected: MANIFEST_VERSION,
                found: manifest.version,
            });
        }

        Ok(Some(manifest))
    }

    fn save(&self, path: &Path, manifest: &BuildManifest) -> Result<(), ManifestError> {
        let mut writer = std::io::BufWriter::new(self.fs.create(path)?);
        serde_json::to_writer_pretty(&mut writer, manifest)?;
        std::io::Write::flush(&mut writer)?;
        Ok(())
    }
}
