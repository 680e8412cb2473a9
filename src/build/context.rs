//! Per-asset build context.
//!
//! A fresh context is created for every asset that is (re)built and passed
//! mutably through import, process and write. It owns the dependency list
//! the importer fills and borrows the shared collaborators.

use std::path::Path;

use crate::build::{BuildLog, Dependency};
use crate::content::ContentError;
use crate::fs::{to_slash, FileSystem};
use crate::hash::HashComputer;

/// State for building one asset.
pub struct BuildContext<'a> {
    asset: &'a Path,
    fs: &'a dyn FileSystem,
    log: &'a dyn BuildLog,
    hasher: &'a HashComputer,
    dependencies: Vec<Dependency>,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        asset: &'a Path,
        fs: &'a dyn FileSystem,
        log: &'a dyn BuildLog,
        hasher: &'a HashComputer,
    ) -> Self {
        Self { asset, fs, log, hasher, dependencies: Vec::new() }
    }

    /// Source path of the asset being built.
    pub fn asset_path(&self) -> &'a Path {
        self.asset
    }

    pub fn fs(&self) -> &'a dyn FileSystem {
        self.fs
    }

    pub fn log(&self) -> &'a dyn BuildLog {
        self.log
    }

    /// Record a file the asset's output depends on. Its current length and
    /// fingerprint are captured now; a later change forces a rebuild.
    /// Recording the same path twice keeps the first record.
    pub fn add_dependency(&mut self, path: &Path) -> Result<(), ContentError> {
        let path_text = to_slash(path);
        if self.is_recorded(&path_text) {
            return Ok(());
        }

        let fingerprint = self.hasher.hash_file(self.fs, path)?;
        tracing::trace!(asset = %self.asset.display(), dependency = %path_text, "recorded dependency");
        self.dependencies.push(Dependency::present(path_text, fingerprint.length, fingerprint.checksum));
        Ok(())
    }

    /// Record a file that would change the output if it existed. A missing
    /// file is recorded as absent, so creating it later forces a rebuild.
    pub fn add_optional_dependency(&mut self, path: &Path) -> Result<(), ContentError> {
        if self.fs.file_exists(path) {
            return self.add_dependency(path);
        }

        let path_text = to_slash(path);
        if !self.is_recorded(&path_text) {
            tracing::trace!(asset = %self.asset.display(), dependency = %path_text, "recorded absent dependency");
            self.dependencies.push(Dependency::absent(path_text));
        }
        Ok(())
    }

    fn is_recorded(&self, path_text: &str) -> bool {
        let case_sensitive = self.fs.is_case_sensitive();
        let key = crate::fs::path_key(path_text, case_sensitive);
        self.dependencies.iter().any(|d| crate::fs::path_key(&d.path, case_sensitive) == key)
    }

    /// Dependencies recorded so far.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Consume the context, returning the recorded dependencies.
    pub fn into_dependencies(self) -> Vec<Dependency> {
        self.dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::NullLog;
    use crate::fs::MemoryFileSystem;

    #[test]
    fn test_add_dependency_captures_fingerprint() {
        let fs = MemoryFileSystem::new().with_file("/in/shared.cfg", "abc");
        let hasher = HashComputer::new();
        let log = NullLog;
        let mut ctx = BuildContext::new(Path::new("/in/a.txt"), &fs, &log, &hasher);

        ctx.add_dependency(Path::new("/in/shared.cfg")).unwrap();
        ctx.add_dependency(Path::new("/in/shared.cfg")).unwrap();

        let deps = ctx.into_dependencies();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].length, 3);
        assert_eq!(deps[0].checksum, HashComputer::new().hash_bytes(b"abc").unwrap());
        assert!(!deps[0].absent);
    }

    #[test]
    fn test_optional_dependency_records_absence() {
        let fs = MemoryFileSystem::new().with_file("/in/present.cfg", "abc");
        let hasher = HashComputer::new();
        let log = NullLog;
        let mut ctx = BuildContext::new(Path::new("/in/a.txt"), &fs, &log, &hasher);

        ctx.add_optional_dependency(Path::new("/in/missing.cfg")).unwrap();
        ctx.add_optional_dependency(Path::new("/in/missing.cfg")).unwrap();
        ctx.add_optional_dependency(Path::new("/in/present.cfg")).unwrap();

        let deps = ctx.dependencies();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0], Dependency::absent("/in/missing.cfg".to_string()));
        assert!(!deps[1].absent);
        assert_eq!(deps[1].length, 3);
    }

    #[test]
    fn test_add_missing_dependency_fails() {
        let fs = MemoryFileSystem::new();
        let hasher = HashComputer::new();
        let log = NullLog;
        let mut ctx = BuildContext::new(Path::new("/in/a.txt"), &fs, &log, &hasher);

        assert!(ctx.add_dependency(Path::new("/in/none.cfg")).is_err());
        assert!(ctx.dependencies().is_empty());
    }

    #[test]
    fn test_dependency_dedup_follows_case_policy() {
        let fs = MemoryFileSystem::new().with_case_sensitive(false).with_file("/in/Shared.cfg", "x");
        let hasher = HashComputer::new();
        let log = NullLog;
        let mut ctx = BuildContext::new(Path::new("/in/a.txt"), &fs, &log, &hasher);

        ctx.add_dependency(Path::new("/in/Shared.cfg")).unwrap();
        ctx.add_dependency(Path::new("/in/shared.CFG")).unwrap();
        assert_eq!(ctx.dependencies().len(), 1);
        assert_eq!(ctx.asset_path(), Path::new("/in/a.txt"));
    }
}
