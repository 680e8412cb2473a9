//! Build result types.
//!
//! Contains types for representing the outcome of a build pass.

use std::time::Duration;

use crate::build::{AssetStatus, BuildManifest, BuildManifestItem};

/// Result of a complete build pass.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Items in expansion order
    pub items: Vec<BuildManifestItem>,
    /// The manifest produced by the pass
    pub manifest: BuildManifest,
    /// Assets left unstarted because the pass was cancelled
    pub cancelled: usize,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a result from the items of a pass.
    pub fn new(items: Vec<BuildManifestItem>, case_sensitive: bool) -> Self {
        let mut manifest = BuildManifest::new(case_sensitive);
        for item in &items {
            manifest.insert(item.clone());
        }
        Self { items, manifest, cancelled: 0, total_duration: Duration::ZERO }
    }

    /// Set the number of cancelled assets.
    pub fn with_cancelled(mut self, cancelled: usize) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    fn count(&self, status: AssetStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// Get the number of assets built in this pass.
    pub fn success_count(&self) -> usize {
        self.count(AssetStatus::Success)
    }

    /// Get the number of skipped assets.
    pub fn skipped_count(&self) -> usize {
        self.count(AssetStatus::Skipped)
    }

    /// Get the number of failed assets.
    pub fn failed_count(&self) -> usize {
        self.count(AssetStatus::Failed)
    }

    /// Check if the overall build succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Item for an asset path.
    pub fn item(&self, asset_path: &str) -> Option<&BuildManifestItem> {
        self.manifest.get(asset_path)
    }

    /// Get failed items.
    pub fn failures(&self) -> Vec<&BuildManifestItem> {
        self.items.iter().filter(|i| i.status == AssetStatus::Failed).collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.items.len();

        if failed > 0 {
            lines.push(format!(
                "Build failed: {} succeeded, {} skipped, {} failed ({} total)",
                success, skipped, failed, total
            ));
            for item in self.failures() {
                lines.push(format!("  - {}: {}", item.asset_path, item.message.as_deref().unwrap_or("failed")));
            }
        } else {
            lines.push(format!(
                "Build succeeded: {} succeeded, {} skipped, {} failed ({} total) in {:?}",
                success, skipped, failed, total, self.total_duration
            ));
        }

        if self.cancelled > 0 {
            lines.push(format!("Cancelled before {} asset(s) started", self.cancelled));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<BuildManifestItem> {
        let ok = BuildManifestItem::success("/a".into(), "c".into(), 1, vec![], "/o/a".into());
        vec![
            ok.clone(),
            BuildManifestItem { asset_path: "/b".into(), ..ok }.skipped(),
            BuildManifestItem::failed("/c".into(), "no importer".into()),
        ]
    }

    #[test]
    fn test_counts() {
        let result = BuildResult::new(items(), true);
        assert_eq!(result.success_count(), 1);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert!(!result.is_success());
        assert_eq!(result.manifest.len(), 3);
        assert_eq!(result.item("/b").unwrap().status, AssetStatus::Skipped);
    }

    #[test]
    fn test_summary_failed() {
        let result = BuildResult::new(items(), true).with_cancelled(2);
        let summary = result.summary();
        assert!(summary.starts_with("Build failed: 1 succeeded, 1 skipped, 1 failed (3 total)"));
        assert!(summary.contains("  - /c: no importer"));
        assert!(summary.contains("Cancelled before 2 asset(s) started"));
    }

    #[test]
    fn test_summary_success() {
        let result = BuildResult::new(items().into_iter().take(2).collect(), true);
        assert!(result.is_success());
        assert!(result.summary().starts_with("Build succeeded: 1 succeeded, 1 skipped, 0 failed (2 total)"));
    }
}
