//! assetforge - Incremental content build pipeline
//!
//! This library provides functionality to:
//! - Expand glob patterns into source files
//! - Run each source through an importer, a processor and a writer
//! - Skip assets whose source, dependencies and output are unchanged

pub mod build;
pub mod cli;
pub mod config;
pub mod content;
pub mod fs;
pub mod glob;
pub mod hash;
