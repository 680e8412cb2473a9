//! Asset discovery.
//!
//! Expands the asset definitions of a build configuration into concrete
//! source files using the glob engine. Definitions are expanded in order and
//! a file matched by several definitions belongs to the first one. Files
//! under an output directory nested in the input directory are never assets.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::AssetDefinition;
use crate::fs::{normalize, path_key, to_slash, FileSystem};
use crate::glob::{Glob, GlobEnvironment, GlobError};

/// One concrete source file to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    /// Processor named by the asset's definition, if any
    pub processor: Option<String>,
    /// Index of the definition that produced the asset
    pub definition: usize,
}

impl Asset {
    /// `/`-separated source path, used as the manifest key.
    pub fn key_path(&self) -> String {
        to_slash(&self.path)
    }
}

/// A definition whose pattern could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionFailure {
    pub definition: usize,
    pub pattern: String,
    pub error: GlobError,
}

/// Result of expanding all definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Assets in expansion order
    pub assets: Vec<Asset>,
    pub failures: Vec<DefinitionFailure>,
}

/// Folded `dir/` prefix of a path, for prefix tests under a case policy.
fn dir_prefix(dir: &Path, case_sensitive: bool) -> String {
    let dir = normalize(&to_slash(dir));
    let dir = if dir.ends_with('/') { dir } else { format!("{}/", dir) };
    path_key(&dir, case_sensitive)
}

/// Expand `definitions` against `input_dir`, leaving out anything written
/// to `output_dir`.
///
/// `unix` selects the pattern root rules (see [`GlobEnvironment`]).
pub fn discover_assets(
    definitions: &[AssetDefinition],
    input_dir: &Path,
    output_dir: &Path,
    fs: &dyn FileSystem,
    unix: bool,
) -> Discovery {
    let env = GlobEnvironment::new(input_dir, unix);
    let case_sensitive = fs.is_case_sensitive();
    // Only an output directory strictly inside the input directory is
    // excluded; one that contains the input would swallow every source.
    let input_prefix = dir_prefix(input_dir, case_sensitive);
    let output_prefix = Some(dir_prefix(output_dir, case_sensitive))
        .filter(|output| output.len() > input_prefix.len() && output.starts_with(&input_prefix));
    let mut seen = HashSet::new();
    let mut discovery = Discovery::default();

    for (index, definition) in definitions.iter().enumerate() {
        let glob = match Glob::new(&definition.path, &env) {
            Ok(glob) => glob,
            Err(error) => {
                tracing::warn!(pattern = %definition.path, error = %error, "invalid asset pattern");
                discovery.failures.push(DefinitionFailure {
                    definition: index,
                    pattern: definition.path.clone(),
                    error,
                });
                continue;
            }
        };

        let matches = glob.matches(fs);
        if matches.is_empty() {
            tracing::warn!(pattern = %definition.path, "asset definition matched no files");
        }

        for path in matches {
            let key = path_key(&normalize(&to_slash(&path)), case_sensitive);
            if output_prefix.as_deref().is_some_and(|prefix| key.starts_with(prefix)) {
                tracing::debug!(path = %path.display(), "inside the output directory; not an asset");
                continue;
            }
            if !seen.insert(key) {
                tracing::debug!(path = %path.display(), "already claimed by an earlier definition");
                continue;
            }
            discovery.assets.push(Asset {
                path,
                processor: definition.processor.clone(),
                definition: index,
            });
        }
    }

    discovery
}
