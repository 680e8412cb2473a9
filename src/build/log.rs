//! Build log sinks.
//!
//! The engine reports what it does as [`BuildEvent`]s; a [`BuildLog`] decides
//! how to present them. Every event has a [`Verbosity`] level and sinks drop
//! events above their configured level.
//!
//! # Example
//!
//! ```
//! use assetforge::build::{BuildEvent, BuildLog, MemoryLog, Verbosity};
//!
//! let log = MemoryLog::new(Verbosity::Normal);
//! log.log(BuildEvent::AssetSkipped { asset: "/in/a.txt".to_string() });
//! assert_eq!(log.lines(), vec!["Skipped /in/a.txt (no change)"]);
//! ```

use std::str::FromStr;
use std::sync::Mutex;

use crate::fs::lock;

/// How much a log shows. Ordered from least to most output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Verbosity {
    Quiet,
    Minimal,
    #[default]
    Normal,
    Detailed,
    Diagnostic,
}

impl Verbosity {
    /// Equivalent `tracing` filter directive.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Minimal => "warn",
            Verbosity::Normal => "info",
            Verbosity::Detailed => "debug",
            Verbosity::Diagnostic => "trace",
        }
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "q" | "quiet" => Ok(Verbosity::Quiet),
            "m" | "minimal" => Ok(Verbosity::Minimal),
            "n" | "normal" => Ok(Verbosity::Normal),
            "d" | "detailed" => Ok(Verbosity::Detailed),
            "diag" | "diagnostic" => Ok(Verbosity::Diagnostic),
            other => Err(format!(
                "unknown verbosity '{}' (expected quiet, minimal, normal, detailed or diagnostic)",
                other
            )),
        }
    }
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Minimal => "minimal",
            Verbosity::Normal => "normal",
            Verbosity::Detailed => "detailed",
            Verbosity::Diagnostic => "diagnostic",
        };
        f.write_str(name)
    }
}

/// What changed about a file since its last build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Size,
    Contents,
    Unreadable,
    /// Recorded as absent and now exists
    Appeared,
}

/// Events reported during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// Pass started
    BuildStarted { assets: usize },
    /// Asset is unchanged and was not rebuilt
    AssetSkipped { asset: String },
    /// Asset source changed since its last build
    SourceChanged { asset: String, change: FileChange },
    /// A recorded dependency changed since the asset's last build
    DependencyChanged { asset: String, dependency: String, change: FileChange },
    /// The previously written output is gone
    OutputMissing { asset: String, output: String },
    /// The asset now builds to a different output path
    OutputMoved { asset: String, previous: String, current: String },
    /// The asset now resolves to different components
    ComponentsChanged { asset: String, previous: String, current: String },
    /// Asset was built
    AssetBuilt { asset: String, output: String },
    /// Asset could not be built
    AssetFailed { asset: String, message: String },
    /// Pass finished
    BuildCompleted { succeeded: usize, skipped: usize, failed: usize, cancelled: usize },
}

impl BuildEvent {
    /// Lowest verbosity at which the event is shown.
    pub fn verbosity(&self) -> Verbosity {
        match self {
            BuildEvent::AssetFailed { .. } => Verbosity::Quiet,
            BuildEvent::BuildCompleted { .. } => Verbosity::Minimal,
            BuildEvent::AssetSkipped { .. }
            | BuildEvent::AssetBuilt { .. }
            | BuildEvent::DependencyChanged { .. }
            | BuildEvent::OutputMoved { .. }
            | BuildEvent::ComponentsChanged { .. } => Verbosity::Normal,
            BuildEvent::BuildStarted { .. }
            | BuildEvent::SourceChanged { .. }
            | BuildEvent::OutputMissing { .. } => Verbosity::Detailed,
        }
    }

    /// Human-readable line for the event.
    pub fn message(&self) -> String {
        match self {
            BuildEvent::BuildStarted { assets } => format!("Building {} asset(s)", assets),
            BuildEvent::AssetSkipped { asset } => format!("Skipped {} (no change)", asset),
            BuildEvent::SourceChanged { asset, change } => match change {
                FileChange::Size => format!("The file size of '{}' has changed. Rebuilding asset.", asset),
                FileChange::Contents => format!("The contents of '{}' have changed. Rebuilding asset.", asset),
                FileChange::Unreadable => format!("Cannot read '{}'. Rebuilding asset.", asset),
                FileChange::Appeared => format!("'{}' has appeared. Rebuilding asset.", asset),
            },
            BuildEvent::DependencyChanged { dependency, change, .. } => match change {
                FileChange::Size => {
                    format!("The file size of dependency '{}' has changed. Rebuilding asset.", dependency)
                }
                FileChange::Contents => {
                    format!("The contents of dependency '{}' have changed. Rebuilding asset.", dependency)
                }
                FileChange::Unreadable => {
                    format!("Cannot read dependency '{}'. Rebuilding asset.", dependency)
                }
                FileChange::Appeared => {
                    format!("Dependency '{}' has appeared. Rebuilding asset.", dependency)
                }
            },
            BuildEvent::OutputMissing { output, .. } => {
                format!("The output '{}' is missing. Rebuilding asset.", output)
            }
            BuildEvent::OutputMoved { previous, current, .. } => {
                format!("The output has moved from '{}' to '{}'. Rebuilding asset.", previous, current)
            }
            BuildEvent::ComponentsChanged { previous, current, .. } => {
                format!("The components have changed from '{}' to '{}'. Rebuilding asset.", previous, current)
            }
            BuildEvent::AssetBuilt { asset, output } => format!("Built {} -> {}", asset, output),
            BuildEvent::AssetFailed { asset, message } => format!("Failed {}: {}", asset, message),
            BuildEvent::BuildCompleted { succeeded, skipped, failed, cancelled } => {
                let mut line =
                    format!("Build finished: {} succeeded, {} skipped, {} failed", succeeded, skipped, failed);
                if *cancelled > 0 {
                    line.push_str(&format!(", {} cancelled", cancelled));
                }
                line
            }
        }
    }
}

/// Trait for build log sinks.
pub trait BuildLog: Send + Sync {
    /// Report an event. Sinks filter by their own verbosity.
    fn log(&self, event: BuildEvent);

    /// Most detailed level this sink shows.
    fn verbosity(&self) -> Verbosity {
        Verbosity::Normal
    }

    /// Whether an event at `level` would be shown.
    fn enabled(&self, level: Verbosity) -> bool {
        level <= self.verbosity()
    }
}

/// A log that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl BuildLog for NullLog {
    fn log(&self, _event: BuildEvent) {}

    fn verbosity(&self) -> Verbosity {
        Verbosity::Quiet
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog {
    verbosity: Verbosity,
}

impl TracingLog {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

impl BuildLog for TracingLog {
    fn log(&self, event: BuildEvent) {
        if !self.enabled(event.verbosity()) {
            return;
        }
        let message = event.message();
        match event {
            BuildEvent::AssetFailed { asset, .. } => tracing::error!(asset = %asset, "{}", message),
            BuildEvent::DependencyChanged { asset, .. }
            | BuildEvent::SourceChanged { asset, .. }
            | BuildEvent::OutputMoved { asset, .. }
            | BuildEvent::ComponentsChanged { asset, .. } => {
                tracing::info!(asset = %asset, "{}", message)
            }
            BuildEvent::BuildStarted { .. } | BuildEvent::OutputMissing { .. } => {
                tracing::debug!("{}", message)
            }
            _ => tracing::info!("{}", message),
        }
    }

    fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

/// Captures event lines in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    verbosity: Verbosity,
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity, lines: Mutex::new(Vec::new()) }
    }

    /// Lines captured so far, in arrival order.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }

    /// Whether any captured line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    pub fn clear(&self) {
        lock(&self.lines).clear();
    }
}

impl BuildLog for MemoryLog {
    fn log(&self, event: BuildEvent) {
        if !self.enabled(event.verbosity()) {
            return;
        }
        lock(&self.lines).push(event.message());
    }

    fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_parse() {
        assert_eq!("quiet".parse::<Verbosity>().unwrap(), Verbosity::Quiet);
        assert_eq!("Detailed".parse::<Verbosity>().unwrap(), Verbosity::Detailed);
        assert_eq!("diag".parse::<Verbosity>().unwrap(), Verbosity::Diagnostic);
        assert!("loud".parse::<Verbosity>().is_err());
    }

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Diagnostic > Verbosity::Detailed);
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }

    #[test]
    fn test_message_shapes() {
        let skipped = BuildEvent::AssetSkipped { asset: "/in/a.txt".to_string() };
        assert_eq!(skipped.message(), "Skipped /in/a.txt (no change)");

        let changed = BuildEvent::DependencyChanged {
            asset: "/in/a.txt".to_string(),
            dependency: "/in/a.txt.meta".to_string(),
            change: FileChange::Size,
        };
        assert_eq!(
            changed.message(),
            "The file size of dependency '/in/a.txt.meta' has changed. Rebuilding asset."
        );
    }

    #[test]
    fn test_memory_log_filters_by_verbosity() {
        let log = MemoryLog::new(Verbosity::Minimal);
        log.log(BuildEvent::AssetSkipped { asset: "a".to_string() });
        log.log(BuildEvent::AssetFailed { asset: "b".to_string(), message: "boom".to_string() });
        log.log(BuildEvent::BuildStarted { assets: 2 });

        assert_eq!(log.lines(), vec!["Failed b: boom"]);
        assert!(log.contains("boom"));
        log.clear();
        assert!(log.lines().is_empty());
    }

    #[test]
    fn test_memory_log_survives_poisoned_lock() {
        let log = std::sync::Arc::new(MemoryLog::new(Verbosity::Normal));
        log.log(BuildEvent::AssetSkipped { asset: "a".to_string() });

        let holder = log.clone();
        let panicked = std::thread::spawn(move || {
            let _guard = holder.lines.lock().unwrap();
            panic!("worker panicked while logging");
        })
        .join();
        assert!(panicked.is_err());
        assert!(log.lines.is_poisoned());

        log.log(BuildEvent::AssetSkipped { asset: "b".to_string() });
        assert_eq!(log.lines(), vec!["Skipped a (no change)", "Skipped b (no change)"]);
        log.clear();
        assert!(log.lines().is_empty());
    }

    #[test]
    fn test_rebuild_reason_messages() {
        let appeared = BuildEvent::DependencyChanged {
            asset: "/in/a.txt".to_string(),
            dependency: "/in/a.txt.meta".to_string(),
            change: FileChange::Appeared,
        };
        assert_eq!(appeared.message(), "Dependency '/in/a.txt.meta' has appeared. Rebuilding asset.");

        let moved = BuildEvent::OutputMoved {
            asset: "/in/a.txt".to_string(),
            previous: "/build/a.txt".to_string(),
            current: "/dist/a.txt".to_string(),
        };
        assert_eq!(moved.verbosity(), Verbosity::Normal);
        assert_eq!(moved.message(), "The output has moved from '/build/a.txt' to '/dist/a.txt'. Rebuilding asset.");
    }

    #[test]
    fn test_completed_mentions_cancelled() {
        let event = BuildEvent::BuildCompleted { succeeded: 1, skipped: 2, failed: 0, cancelled: 3 };
        assert_eq!(event.message(), "Build finished: 1 succeeded, 2 skipped, 0 failed, 3 cancelled");
    }
}
