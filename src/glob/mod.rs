//! Glob pattern engine.
//!
//! A pattern goes through three stages:
//! - **Scanner**: characters → tokens
//! - **Parser**: tokens → root + path segments
//! - **Matcher**: segments + a directory tree → matching files
//!
//! # Example
//!
//! ```
//! use assetforge::fs::MemoryFileSystem;
//! use assetforge::glob::{Glob, GlobEnvironment};
//!
//! let fs = MemoryFileSystem::new()
//!     .with_file("/Temp/Hello/World/Text.txt", "")
//!     .with_file("/Temp/Goodbye/OtherText.txt", "")
//!     .with_file("/Temp/Image.png", "");
//! let env = GlobEnvironment::unix("/Temp");
//!
//! let glob = Glob::new("**/*.txt", &env).unwrap();
//! let found: Vec<_> = glob.matches(&fs).into_iter().map(|p| p.display().to_string()).collect();
//! assert_eq!(found, vec!["/Temp/Goodbye/OtherText.txt", "/Temp/Hello/World/Text.txt"]);
//! ```

pub mod matcher;
pub mod parser;
pub mod scanner;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::fs::{join, normalize, split_root, to_slash, FileSystem};
use matcher::{match_components, TreeMatcher};
use parser::{Parser, Root, Segment};
use scanner::TokenKind;

/// Error compiling a glob pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum GlobError {
    /// A character that cannot appear in a pattern
    #[error("unexpected character '{ch}' at position {position} in pattern '{pattern}'")]
    UnexpectedCharacter { pattern: String, ch: char, position: usize },
    /// A token in a place the grammar does not allow
    #[error("unexpected {found} at position {position} in pattern '{pattern}'")]
    UnexpectedToken { pattern: String, found: TokenKind, position: usize },
    /// A drive root that is not a single letter
    #[error("invalid drive '{drive}' in pattern '{pattern}'")]
    InvalidDrive { pattern: String, drive: String },
    /// A `//server/share` style root
    #[error("UNC paths are not supported: '{pattern}'")]
    UncNotSupported { pattern: String },
}

/// Platform facts a pattern is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobEnvironment {
    working_directory: String,
    unix: bool,
}

impl GlobEnvironment {
    /// Create an environment from a working directory and path convention.
    pub fn new(working_directory: impl AsRef<Path>, unix: bool) -> Self {
        Self { working_directory: normalize(&to_slash(working_directory.as_ref())), unix }
    }

    /// Unix-like environment rooted at `working_directory`.
    pub fn unix(working_directory: impl AsRef<Path>) -> Self {
        Self::new(working_directory, true)
    }

    /// Windows-like environment rooted at `working_directory`.
    pub fn windows(working_directory: impl AsRef<Path>) -> Self {
        Self::new(working_directory, false)
    }

    /// Environment of the running process with `working_directory` as base.
    pub fn host(working_directory: impl AsRef<Path>) -> Self {
        Self::new(working_directory, cfg!(unix))
    }

    /// The working directory in `/`-separated form.
    pub fn working_directory(&self) -> &str {
        &self.working_directory
    }

    /// Whether Unix path conventions apply.
    pub fn is_unix(&self) -> bool {
        self.unix
    }
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    /// Resolved starting directory, `/`-separated and normalized
    base: String,
    working_directory: String,
    segments: Vec<Segment>,
}

impl Glob {
    /// Compile a pattern. Errors are reported here and nowhere else.
    pub fn new(pattern: &str, env: &GlobEnvironment) -> Result<Self, GlobError> {
        let ast = Parser::parse(pattern, env.is_unix())?.simplified();

        let mut base = match ast.root {
            Root::Absolute => "/".to_string(),
            Root::Drive(letter) => format!("{}:/", letter),
            Root::Rootless => {
                let (root, _) = split_root(env.working_directory());
                if root.is_empty() {
                    "/".to_string()
                } else {
                    format!("{}/", root.trim_end_matches('/'))
                }
            }
            Root::Relative => env.working_directory().to_string(),
        };

        let mut segments = ast.segments;
        let leading_parents = segments.iter().take_while(|s| **s == Segment::Parent).count();
        for _ in 0..leading_parents {
            base = normalize(&join(&base, ".."));
        }
        segments.drain(..leading_parents);

        Ok(Self {
            pattern: pattern.to_string(),
            base,
            working_directory: env.working_directory().to_string(),
            segments,
        })
    }

    /// The pattern text this glob was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Directory the pattern is anchored at.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// All files in `fs` matched by the pattern, sorted.
    pub fn matches(&self, fs: &dyn FileSystem) -> Vec<PathBuf> {
        if self.segments.is_empty() {
            return Vec::new();
        }
        TreeMatcher::new(fs).collect(&self.base, &self.segments).into_iter().map(PathBuf::from).collect()
    }

    /// Whether a concrete path is matched by the pattern.
    ///
    /// Relative paths are resolved against the working directory the glob
    /// was compiled with; `./` and `../` are normalized away before comparing.
    pub fn is_match(&self, path: &str, case_sensitive: bool) -> bool {
        let unified = path.replace('\\', "/");
        let absolute = if split_root(&unified).0.is_empty() {
            normalize(&join(&self.working_directory, &unified))
        } else {
            normalize(&unified)
        };

        let base = self.base.trim_end_matches('/');
        let prefix = if base.is_empty() { "/".to_string() } else { format!("{}/", base) };
        let fold = |s: &str| crate::fs::path_key(s, case_sensitive);
        if !fold(&absolute).starts_with(&fold(&prefix)) {
            return false;
        }

        let rest = &absolute[prefix.len()..];
        let components: Vec<&str> = rest.split('/').filter(|c| !c.is_empty()).collect();
        match_components(&self.segments, &components, case_sensitive)
    }
}

/// Compile `pattern` and return the sorted files it matches.
pub fn glob(
    pattern: &str,
    env: &GlobEnvironment,
    fs: &dyn FileSystem,
) -> Result<Vec<PathBuf>, GlobError> {
    Ok(Glob::new(pattern, env)?.matches(fs))
}
