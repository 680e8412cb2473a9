//! File-system access used by the glob engine and the build engine.
//!
//! Everything that touches disk goes through [`FileSystem`] so the core can
//! be exercised against [`MemoryFileSystem`] with either case policy and
//! either path convention.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A single entry returned by [`FileSystem::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File or directory name (no separators)
    pub name: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// File-system collaborator.
pub trait FileSystem: Send + Sync {
    /// Whether path comparisons must respect case.
    fn is_case_sensitive(&self) -> bool;

    /// Whether a regular file exists at `path`.
    fn file_exists(&self, path: &Path) -> bool;

    /// Whether a directory exists at `path`.
    fn dir_exists(&self, path: &Path) -> bool;

    /// List the direct children of a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Open a file for reading.
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Create (or truncate) a file for writing, creating parent directories.
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    /// Length of a file in bytes.
    fn file_len(&self, path: &Path) -> io::Result<u64>;

    /// Read a whole file into memory.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut reader = self.open_read(path)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Write a whole file, replacing any previous content.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut writer = self.create(path)?;
        writer.write_all(contents)?;
        writer.flush()
    }
}

/// The real file system, backed by `std::fs`.
#[derive(Debug, Clone)]
pub struct PhysicalFileSystem {
    case_sensitive: bool,
}

impl PhysicalFileSystem {
    /// Create a file system using the host's default case policy.
    pub fn new() -> Self {
        Self { case_sensitive: !cfg!(any(windows, target_os = "macos")) }
    }

    /// Override the case policy.
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }
}

impl Default for PhysicalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for PhysicalFileSystem {
    fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let is_dir = entry.file_type()?.is_dir();
            entries.push(DirEntry { name: entry.file_name().to_string_lossy().into_owned(), is_dir });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(io::BufReader::new(File::open(path)?)))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(io::BufWriter::new(File::create(path)?)))
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }
}

/// In-memory file system.
///
/// Paths are stored with `/` separators, so Windows-style paths such as
/// `C:\Work\a.txt` and Unix paths can be modelled on any host. Directories
/// are implied by the files below them and can also be added explicitly.
/// Stored names keep their original spelling; lookups fold case when the
/// store is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    case_sensitive: bool,
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    dirs: Arc<Mutex<BTreeMap<String, ()>>>,
}

impl MemoryFileSystem {
    /// Create an empty, case-sensitive file system.
    pub fn new() -> Self {
        Self { case_sensitive: true, ..Default::default() }
    }

    /// Set the case policy.
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Add a file with the given contents.
    pub fn with_file(self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Add or replace a file.
    pub fn insert(&self, path: &str, contents: impl Into<Vec<u8>>) {
        let path = clean(path);
        let mut files = lock(&self.files);
        let key = self.find(&files, &path).unwrap_or(path);
        files.insert(key, contents.into());
    }

    /// Add an empty directory.
    pub fn insert_dir(&self, path: &str) {
        lock(&self.dirs).insert(clean(path), ());
    }

    /// Remove a file, returning whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        let mut files = lock(&self.files);
        match self.find(&files, &clean(path)) {
            Some(key) => files.remove(&key).is_some(),
            None => false,
        }
    }

    /// Contents of a file as UTF-8 text.
    pub fn read_to_string(&self, path: &str) -> Option<String> {
        let files = lock(&self.files);
        let key = self.find(&files, &clean(path))?;
        files.get(&key).map(|b| String::from_utf8_lossy(b).into_owned())
    }

    fn fold(&self, path: &str) -> String {
        path_key(path, self.case_sensitive)
    }

    fn find<V>(&self, map: &BTreeMap<String, V>, path: &str) -> Option<String> {
        if map.contains_key(path) {
            return Some(path.to_string());
        }
        if self.case_sensitive {
            return None;
        }
        let wanted = self.fold(path);
        map.keys().find(|k| self.fold(k) == wanted).cloned()
    }

    fn children(&self, dir: &str) -> Vec<DirEntry> {
        let prefix = self.fold(&if dir.ends_with('/') { dir.to_string() } else { format!("{}/", dir) });
        let mut seen: BTreeMap<String, (String, bool)> = BTreeMap::new();

        let files = lock(&self.files);
        let dirs = lock(&self.dirs);
        let all = files.keys().map(|k| (k, false)).chain(dirs.keys().map(|k| (k, true)));
        for (key, explicit_dir) in all {
            let folded = self.fold(key);
            if !folded.starts_with(&prefix) || folded.len() == prefix.len() {
                continue;
            }
            let rest = &key[prefix.len()..];
            let (name, is_dir) = match rest.split_once('/') {
                Some((name, _)) => (name, true),
                None => (rest, explicit_dir),
            };
            let entry = seen.entry(self.fold(name)).or_insert_with(|| (name.to_string(), is_dir));
            entry.1 |= is_dir;
        }

        let mut entries: Vec<_> =
            seen.into_values().map(|(name, is_dir)| DirEntry { name, is_dir }).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

/// Unify separators and drop a trailing separator.
fn clean(path: &str) -> String {
    let unified = path.replace('\\', "/");
    if unified.len() > 1 && unified.ends_with('/') && !unified.ends_with(":/") {
        unified.trim_end_matches('/').to_string()
    } else {
        unified
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FileSystem for MemoryFileSystem {
    fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn file_exists(&self, path: &Path) -> bool {
        let files = lock(&self.files);
        self.find(&files, &clean(&path.to_string_lossy())).is_some()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        let path = clean(&path.to_string_lossy());
        if self.find(&lock(&self.dirs), &path).is_some() {
            return true;
        }
        let prefix = self.fold(&if path.ends_with('/') { path } else { format!("{}/", path) });
        let under = |k: &String| self.fold(k).starts_with(&prefix);
        lock(&self.files).keys().any(under) || lock(&self.dirs).keys().any(under)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        if !self.dir_exists(path) {
            return Err(not_found(path));
        }
        Ok(self.children(&clean(&path.to_string_lossy())))
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let files = lock(&self.files);
        let key = self.find(&files, &clean(&path.to_string_lossy())).ok_or_else(|| not_found(path))?;
        let data = files.get(&key).cloned().unwrap_or_default();
        Ok(Box::new(Cursor::new(data)))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let path = clean(&path.to_string_lossy());
        let key = self.find(&lock(&self.files), &path).unwrap_or(path);
        Ok(Box::new(MemoryWriter { key, buf: Vec::new(), files: Arc::clone(&self.files) }))
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        let files = lock(&self.files);
        let key = self.find(&files, &clean(&path.to_string_lossy())).ok_or_else(|| not_found(path))?;
        Ok(files.get(&key).map(|b| b.len() as u64).unwrap_or(0))
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
}

/// Buffers writes and commits them to the store on flush/drop.
struct MemoryWriter {
    key: String,
    buf: Vec<u8>,
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.files).insert(self.key.clone(), self.buf.clone());
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Lexically normalize a `/`-separated path: drop `.` segments and resolve
/// `..` against the preceding segment. A `..` that would climb above the
/// root is discarded.
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let (root, rest) = split_root(&unified);

    let mut parts: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if root.is_empty() {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if root.is_empty() {
        if joined.is_empty() {
            ".".to_string()
        } else {
            joined
        }
    } else {
        format!("{}{}", root, joined)
    }
}

/// Split a normalized path into its root (`/`, `C:/`, or empty) and the rest.
pub(crate) fn split_root(path: &str) -> (&str, &str) {
    if path.starts_with('/') {
        return ("/", &path[1..]);
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        if bytes.len() >= 3 && bytes[2] == b'/' {
            return (&path[..3], &path[3..]);
        }
        return (&path[..2], &path[2..]);
    }
    ("", path)
}

/// Join a `/`-separated directory and a child name.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Convert a path to the `/`-separated string form used for comparisons.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Case-fold a path for use as a lookup key under the given policy.
///
/// Folding is ASCII-only so byte offsets stay valid between a path and its key.
pub fn path_key(path: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        path.to_string()
    } else {
        path.to_ascii_lowercase()
    }
}
