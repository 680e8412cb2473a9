//! Build system for assetforge
//!
//! Turns source files into output files through pluggable importers,
//! processors and writers, skipping assets whose inputs have not changed
//! since the previous pass.
//!
//! # Overview
//!
//! A build pass consists of:
//! - **Discovery**: Expand asset definitions into source files with glob patterns
//! - **Planning**: Resolve components and output paths for each asset
//! - **Execution**: Skip unchanged assets, run import → process → write for the rest
//! - **Manifest**: Record what was built so the next pass can skip it
//!
//! # Example
//!
//! ```no_run
//! use assetforge::build::BuildPipeline;
//!
//! let result = BuildPipeline::new("forge.toml").build()?;
//! println!("{}", result.summary());
//! # Ok::<(), assetforge::build::BuildError>(())
//! ```

pub mod context;
pub mod discovery;
pub mod engine;
pub mod incremental;
pub mod log;
pub mod manifest;
pub mod pipeline;
pub mod result;

pub use context::*;
pub use discovery::*;
pub use engine::*;
pub use incremental::*;
pub use log::*;
pub use manifest::*;
pub use pipeline::*;
pub use result::*;
