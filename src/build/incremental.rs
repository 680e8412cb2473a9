//! Incremental build decisions.
//!
//! Compares what an asset is about to be built with and from against the
//! item a previous pass stored for it. Anything that cannot be confirmed as
//! unchanged forces a rebuild.

use std::path::Path;

use crate::build::{BuildEvent, BuildManifestItem, ComponentChain, FileChange};
use crate::fs::{normalize, path_key, to_slash, FileSystem};
use crate::hash::{FileFingerprint, HashComputer};

/// Why an asset must be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    /// No item from a previous pass
    NoPriorBuild,
    /// The previous pass did not build it
    PriorFailed,
    /// Previous item lacks a checksum, length, output or component chain
    IncompleteRecord,
    /// The asset resolves to a different importer, processor or writer
    ComponentsChanged { previous: ComponentChain, current: ComponentChain },
    /// The asset is now written somewhere else
    OutputMoved { previous: String, current: String },
    Source(FileChange),
    Dependency { path: String, change: FileChange },
    OutputMissing { path: String },
}

impl RebuildReason {
    /// Log event describing the reason, when it is worth reporting.
    pub fn event(&self, asset: &str) -> Option<BuildEvent> {
        let asset = asset.to_string();
        match self {
            RebuildReason::ComponentsChanged { previous, current } => Some(BuildEvent::ComponentsChanged {
                asset,
                previous: previous.to_string(),
                current: current.to_string(),
            }),
            RebuildReason::OutputMoved { previous, current } => {
                Some(BuildEvent::OutputMoved { asset, previous: previous.clone(), current: current.clone() })
            }
            RebuildReason::Source(change) => Some(BuildEvent::SourceChanged { asset, change: *change }),
            RebuildReason::Dependency { path, change } => {
                Some(BuildEvent::DependencyChanged { asset, dependency: path.clone(), change: *change })
            }
            RebuildReason::OutputMissing { path } => Some(BuildEvent::OutputMissing { asset, output: path.clone() }),
            _ => None,
        }
    }
}

/// Outcome of a staleness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Unchanged; the previous item can be carried forward
    Skip,
    Rebuild(RebuildReason),
}

/// What the current pass would do with an asset.
#[derive(Debug, Clone, Copy)]
pub struct PlannedBuild<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub chain: &'a ComponentChain,
}

/// Decision plus the source fingerprint, when the check had to compute it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staleness {
    pub decision: Decision,
    /// Current fingerprint of the source; `None` if it was not hashed
    pub source: Option<FileFingerprint>,
}

impl Staleness {
    fn rebuild(reason: RebuildReason) -> Self {
        Self { decision: Decision::Rebuild(reason), source: None }
    }
}

/// Decides whether assets are up to date.
pub struct StalenessCheck<'a> {
    fs: &'a dyn FileSystem,
    hasher: &'a HashComputer,
}

impl<'a> StalenessCheck<'a> {
    pub fn new(fs: &'a dyn FileSystem, hasher: &'a HashComputer) -> Self {
        Self { fs, hasher }
    }

    /// Check a planned build against the item recorded for it by a previous
    /// pass.
    ///
    /// Component chain and output path are compared first, then source size
    /// and fingerprint, then each dependency's size and, only when the size
    /// matches, its fingerprint. A dependency recorded as absent is stale once
    /// it exists. Last, the previous output must still exist.
    pub fn check(&self, planned: &PlannedBuild<'_>, prior: Option<&BuildManifestItem>) -> Staleness {
        let Some(prior) = prior else {
            return Staleness::rebuild(RebuildReason::NoPriorBuild);
        };
        if !prior.status.is_built() {
            return Staleness::rebuild(RebuildReason::PriorFailed);
        }
        let (Some(length), Some(checksum), Some(output), Some(chain)) =
            (prior.length, prior.checksum.as_deref(), prior.output_path.as_deref(), prior.chain.as_ref())
        else {
            return Staleness::rebuild(RebuildReason::IncompleteRecord);
        };

        if chain != planned.chain {
            return Staleness::rebuild(RebuildReason::ComponentsChanged {
                previous: chain.clone(),
                current: planned.chain.clone(),
            });
        }

        let current_output = to_slash(planned.output);
        if !self.same_path(output, &current_output) {
            return Staleness::rebuild(RebuildReason::OutputMoved {
                previous: output.to_string(),
                current: current_output,
            });
        }

        let source = match self.hasher.file_len(self.fs, planned.source) {
            Ok(current) if current != length => return Staleness::rebuild(RebuildReason::Source(FileChange::Size)),
            Ok(_) => match self.hasher.hash_file(self.fs, planned.source) {
                Ok(fingerprint) => fingerprint,
                Err(_) => return Staleness::rebuild(RebuildReason::Source(FileChange::Unreadable)),
            },
            Err(_) => return Staleness::rebuild(RebuildReason::Source(FileChange::Unreadable)),
        };
        let rebuild = |reason| Staleness { decision: Decision::Rebuild(reason), source: Some(source.clone()) };
        if source.checksum != checksum {
            return rebuild(RebuildReason::Source(FileChange::Contents));
        }

        for dependency in &prior.dependencies {
            let path = Path::new(&dependency.path);
            let change = if dependency.absent {
                self.fs.file_exists(path).then_some(FileChange::Appeared)
            } else {
                self.compare(path, dependency.length, &dependency.checksum)
            };
            if let Some(change) = change {
                return rebuild(RebuildReason::Dependency { path: dependency.path.clone(), change });
            }
        }

        if !self.fs.file_exists(Path::new(output)) {
            return rebuild(RebuildReason::OutputMissing { path: output.to_string() });
        }

        Staleness { decision: Decision::Skip, source: Some(source) }
    }

    fn same_path(&self, a: &str, b: &str) -> bool {
        let case_sensitive = self.fs.is_case_sensitive();
        path_key(&normalize(a), case_sensitive) == path_key(&normalize(b), case_sensitive)
    }

    fn compare(&self, path: &Path, length: u64, checksum: &str) -> Option<FileChange> {
        match self.hasher.file_len(self.fs, path) {
            Ok(current) if current != length => return Some(FileChange::Size),
            Ok(_) => {}
            Err(_) => return Some(FileChange::Unreadable),
        }
        match self.hasher.hash_file(self.fs, path) {
            Ok(current) if current.checksum != checksum => Some(FileChange::Contents),
            Ok(_) => None,
            Err(_) => Some(FileChange::Unreadable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::Dependency;
    use crate::fs::MemoryFileSystem;

    fn chain(processor: &str) -> ComponentChain {
        ComponentChain {
            importer: "Text Importer".to_string(),
            processor: processor.to_string(),
            writer: "Text Writer".to_string(),
        }
    }

    fn recorded(fs: &MemoryFileSystem, hasher: &HashComputer) -> BuildManifestItem {
        let source = hasher.hash_file(fs, Path::new("/in/a.txt")).unwrap();
        let meta = hasher.hash_file(fs, Path::new("/in/a.txt.meta")).unwrap();
        BuildManifestItem::success(
            "/in/a.txt".to_string(),
            source.checksum,
            source.length,
            vec![
                Dependency::present("/in/a.txt.meta".to_string(), meta.length, meta.checksum),
                Dependency::absent("/in/shared.meta".to_string()),
            ],
            "/out/a.txt".to_string(),
        )
        .with_chain(chain("Pass Through"))
    }

    fn fixture() -> MemoryFileSystem {
        MemoryFileSystem::new()
            .with_file("/in/a.txt", "HELLO")
            .with_file("/in/a.txt.meta", "one")
            .with_file("/out/a.txt", "HELLO")
    }

    fn decide(fs: &MemoryFileSystem, hasher: &HashComputer, prior: Option<&BuildManifestItem>) -> Decision {
        let chain = chain("Pass Through");
        let planned = PlannedBuild { source: Path::new("/in/a.txt"), output: Path::new("/out/a.txt"), chain: &chain };
        StalenessCheck::new(fs, hasher).check(&planned, prior).decision
    }

    #[test]
    fn test_unchanged_is_skipped() {
        let fs = fixture();
        let hasher = HashComputer::new();
        let prior = recorded(&fs, &hasher);

        assert_eq!(decide(&fs, &hasher, Some(&prior)), Decision::Skip);
        assert_eq!(decide(&fs, &hasher, Some(&prior.skipped())), Decision::Skip);
    }

    #[test]
    fn test_skip_returns_source_fingerprint() {
        let fs = fixture();
        let hasher = HashComputer::new();
        let prior = recorded(&fs, &hasher);
        let chain = chain("Pass Through");
        let planned = PlannedBuild { source: Path::new("/in/a.txt"), output: Path::new("/out/a.txt"), chain: &chain };

        let staleness = StalenessCheck::new(&fs, &hasher).check(&planned, Some(&prior));
        assert_eq!(staleness.source.map(|f| f.length), Some(5));

        fs.insert("/in/a.txt", "JELLO");
        let staleness = StalenessCheck::new(&fs, &hasher).check(&planned, Some(&prior));
        assert_eq!(staleness.decision, Decision::Rebuild(RebuildReason::Source(FileChange::Contents)));
        assert_eq!(staleness.source, Some(hasher.hash_file(&fs, Path::new("/in/a.txt")).unwrap()));
    }

    #[test]
    fn test_missing_or_failed_prior_rebuilds() {
        let fs = fixture();
        let hasher = HashComputer::new();
        let failed = BuildManifestItem::failed("/in/a.txt".to_string(), "boom".to_string());

        assert_eq!(decide(&fs, &hasher, None), Decision::Rebuild(RebuildReason::NoPriorBuild));
        assert_eq!(decide(&fs, &hasher, Some(&failed)), Decision::Rebuild(RebuildReason::PriorFailed));
    }

    #[test]
    fn test_item_without_chain_is_incomplete() {
        let fs = fixture();
        let hasher = HashComputer::new();
        let mut prior = recorded(&fs, &hasher);
        prior.chain = None;

        assert_eq!(decide(&fs, &hasher, Some(&prior)), Decision::Rebuild(RebuildReason::IncompleteRecord));
    }

    #[test]
    fn test_changed_components_rebuild() {
        let fs = fixture();
        let hasher = HashComputer::new();
        let prior = recorded(&fs, &hasher);
        let reversed = chain("Reverse");
        let planned =
            PlannedBuild { source: Path::new("/in/a.txt"), output: Path::new("/out/a.txt"), chain: &reversed };

        let staleness = StalenessCheck::new(&fs, &hasher).check(&planned, Some(&prior));
        assert_eq!(
            staleness.decision,
            Decision::Rebuild(RebuildReason::ComponentsChanged { previous: chain("Pass Through"), current: reversed })
        );
    }

    #[test]
    fn test_moved_output_rebuilds() {
        let fs = fixture().with_file("/dist/a.txt", "HELLO");
        let hasher = HashComputer::new();
        let prior = recorded(&fs, &hasher);
        let chain = chain("Pass Through");
        let planned = PlannedBuild { source: Path::new("/in/a.txt"), output: Path::new("/dist/a.txt"), chain: &chain };

        let staleness = StalenessCheck::new(&fs, &hasher).check(&planned, Some(&prior));
        assert_eq!(
            staleness.decision,
            Decision::Rebuild(RebuildReason::OutputMoved {
                previous: "/out/a.txt".to_string(),
                current: "/dist/a.txt".to_string()
            })
        );
    }

    #[test]
    fn test_output_compared_under_case_policy() {
        let fs = fixture().with_case_sensitive(false);
        let hasher = HashComputer::new();
        let prior = recorded(&fs, &hasher);
        let chain = chain("Pass Through");
        let planned = PlannedBuild { source: Path::new("/in/a.txt"), output: Path::new("/OUT/a.txt"), chain: &chain };

        let staleness = StalenessCheck::new(&fs, &hasher).check(&planned, Some(&prior));
        assert_eq!(staleness.decision, Decision::Skip);
    }

    #[test]
    fn test_source_changes() {
        let fs = fixture();
        let hasher = HashComputer::new();
        let prior = recorded(&fs, &hasher);

        fs.insert("/in/a.txt", "HELLO WORLD");
        assert_eq!(decide(&fs, &hasher, Some(&prior)), Decision::Rebuild(RebuildReason::Source(FileChange::Size)));

        fs.insert("/in/a.txt", "JELLO");
        assert_eq!(
            decide(&fs, &hasher, Some(&prior)),
            Decision::Rebuild(RebuildReason::Source(FileChange::Contents))
        );
    }

    #[test]
    fn test_dependency_changes() {
        let fs = fixture();
        let hasher = HashComputer::new();
        let prior = recorded(&fs, &hasher);

        fs.insert("/in/a.txt.meta", "three");
        assert_eq!(
            decide(&fs, &hasher, Some(&prior)),
            Decision::Rebuild(RebuildReason::Dependency {
                path: "/in/a.txt.meta".to_string(),
                change: FileChange::Size
            })
        );

        fs.insert("/in/a.txt.meta", "two");
        assert!(matches!(
            decide(&fs, &hasher, Some(&prior)),
            Decision::Rebuild(RebuildReason::Dependency { change: FileChange::Contents, .. })
        ));

        fs.remove("/in/a.txt.meta");
        assert!(matches!(
            decide(&fs, &hasher, Some(&prior)),
            Decision::Rebuild(RebuildReason::Dependency { change: FileChange::Unreadable, .. })
        ));
    }

    #[test]
    fn test_absent_dependency_appearing_rebuilds() {
        let fs = fixture();
        let hasher = HashComputer::new();
        let prior = recorded(&fs, &hasher);
        assert_eq!(decide(&fs, &hasher, Some(&prior)), Decision::Skip);

        fs.insert("/in/shared.meta", "");
        assert_eq!(
            decide(&fs, &hasher, Some(&prior)),
            Decision::Rebuild(RebuildReason::Dependency {
                path: "/in/shared.meta".to_string(),
                change: FileChange::Appeared
            })
        );
    }

    #[test]
    fn test_missing_output_rebuilds() {
        let fs = fixture();
        let hasher = HashComputer::new();
        let prior = recorded(&fs, &hasher);
        fs.remove("/out/a.txt");

        assert_eq!(
            decide(&fs, &hasher, Some(&prior)),
            Decision::Rebuild(RebuildReason::OutputMissing { path: "/out/a.txt".to_string() })
        );
    }

    #[test]
    fn test_reason_events() {
        let reason = RebuildReason::Dependency { path: "/in/a.txt.meta".to_string(), change: FileChange::Size };
        let event = reason.event("/in/a.txt").unwrap();
        assert_eq!(event.message(), "The file size of dependency '/in/a.txt.meta' has changed. Rebuilding asset.");
        assert!(RebuildReason::NoPriorBuild.event("/in/a.txt").is_none());

        let reason = RebuildReason::ComponentsChanged { previous: chain("Pass Through"), current: chain("Reverse") };
        assert_eq!(
            reason.event("/in/a.txt").unwrap().message(),
            "The components have changed from 'Text Importer -> Pass Through -> Text Writer' to \
             'Text Importer -> Reverse -> Text Writer'. Rebuilding asset."
        );
    }
}
