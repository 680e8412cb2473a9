//! Matching of parsed segments against names, paths and directory trees.

use std::collections::BTreeSet;
use std::path::Path;

use super::parser::{Part, Segment};
use crate::fs::{join, normalize, FileSystem};

/// Whether a single file or directory name matches a pattern segment.
///
/// `*` matches any run of characters, `?` exactly one, literals compare
/// exactly or case-folded.
pub fn match_name(parts: &[Part], name: &str, case_sensitive: bool) -> bool {
    enum Atom {
        Char(char),
        One,
        Any,
    }

    let atoms: Vec<Atom> = parts
        .iter()
        .flat_map(|part| match part {
            Part::Literal(text) => text.chars().map(Atom::Char).collect::<Vec<_>>(),
            Part::Wildcard => vec![Atom::Any],
            Part::Character => vec![Atom::One],
        })
        .collect();
    let name: Vec<char> = name.chars().collect();

    let chars_equal = |a: char, b: char| {
        a == b || (!case_sensitive && a.to_lowercase().eq(b.to_lowercase()))
    };

    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match atoms.get(p) {
            Some(Atom::Char(c)) if chars_equal(*c, name[n]) => {
                p += 1;
                n += 1;
            }
            Some(Atom::One) => {
                p += 1;
                n += 1;
            }
            Some(Atom::Any) => {
                backtrack = Some((p, n));
                p += 1;
            }
            _ => match backtrack {
                Some((star, mark)) => {
                    p = star + 1;
                    n = mark + 1;
                    backtrack = Some((star, mark + 1));
                }
                None => return false,
            },
        }
    }

    while matches!(atoms.get(p), Some(Atom::Any)) {
        p += 1;
    }
    p == atoms.len()
}

/// Whether the path components `components` match `segments`.
///
/// Both sides are relative to the same root. `..` in the pattern steps back
/// one level (never above the root) and `.` is ignored.
pub fn match_components(segments: &[Segment], components: &[&str], case_sensitive: bool) -> bool {
    fn walk(segments: &[Segment], components: &[&str], at: usize, case_sensitive: bool) -> bool {
        let Some((segment, rest)) = segments.split_first() else {
            return at == components.len();
        };

        match segment {
            Segment::Current => walk(rest, components, at, case_sensitive),
            Segment::Parent => walk(rest, components, at.saturating_sub(1), case_sensitive),
            Segment::DirectoryWildcard => {
                (at..=components.len()).any(|next| walk(rest, components, next, case_sensitive))
            }
            Segment::Pattern(parts) => {
                at < components.len()
                    && match_name(parts, components[at], case_sensitive)
                    && walk(rest, components, at + 1, case_sensitive)
            }
        }
    }

    walk(segments, components, 0, case_sensitive)
}

/// Walks a directory tree collecting files that match a segment list.
pub struct TreeMatcher<'a> {
    fs: &'a dyn FileSystem,
    case_sensitive: bool,
}

impl<'a> TreeMatcher<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs, case_sensitive: fs.is_case_sensitive() }
    }

    /// Collect every file under `start` matched by `segments`, sorted and
    /// without duplicates.
    pub fn collect(&self, start: &str, segments: &[Segment]) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        self.walk(start, segments, &mut found);
        found
    }

    fn walk(&self, dir: &str, segments: &[Segment], found: &mut BTreeSet<String>) {
        let Some((segment, rest)) = segments.split_first() else {
            return;
        };

        match segment {
            Segment::Current => self.walk(dir, rest, found),
            Segment::Parent => self.walk(&normalize(&join(dir, "..")), rest, found),
            Segment::DirectoryWildcard => {
                if rest.is_empty() {
                    self.collect_all(dir, found);
                    return;
                }
                self.walk(dir, rest, found);
                for entry in self.entries(dir) {
                    if entry.is_dir {
                        self.walk(&join(dir, &entry.name), segments, found);
                    }
                }
            }
            Segment::Pattern(parts) => {
                let last = rest.is_empty();
                for entry in self.entries(dir) {
                    if entry.is_dir == last || !match_name(parts, &entry.name, self.case_sensitive) {
                        continue;
                    }
                    let path = join(dir, &entry.name);
                    if last {
                        found.insert(path);
                    } else {
                        self.walk(&path, rest, found);
                    }
                }
            }
        }
    }

    fn collect_all(&self, dir: &str, found: &mut BTreeSet<String>) {
        for entry in self.entries(dir) {
            let path = join(dir, &entry.name);
            if entry.is_dir {
                self.collect_all(&path, found);
            } else {
                found.insert(path);
            }
        }
    }

    fn entries(&self, dir: &str) -> Vec<crate::fs::DirEntry> {
        let path = Path::new(dir);
        if !self.fs.dir_exists(path) {
            return Vec::new();
        }
        match self.fs.read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(directory = %dir, error = %e, "skipping unreadable directory");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::glob::parser::Parser;

    fn parts(pattern: &str) -> Vec<Part> {
        match Parser::parse(pattern, true).unwrap().segments.remove(0) {
            Segment::Pattern(parts) => parts,
            other => panic!("expected a pattern segment, got {:?}", other),
        }
    }

    #[test]
    fn test_match_name_wildcards() {
        assert!(match_name(&parts("*.txt"), "Text.txt", true));
        assert!(match_name(&parts("*.txt"), ".txt", true));
        assert!(!match_name(&parts("*.txt"), "Text.md", true));
        assert!(match_name(&parts("a?c"), "abc", true));
        assert!(!match_name(&parts("a?c"), "ac", true));
        assert!(match_name(&parts("*a*b*"), "xxaxxbxx", true));
        assert!(!match_name(&parts("*a*b"), "xxbxxa", true));
    }

    #[test]
    fn test_match_name_case_policy() {
        assert!(!match_name(&parts("TEXT.txt"), "text.txt", true));
        assert!(match_name(&parts("TEXT.txt"), "text.TXT", false));
    }

    #[test]
    fn test_match_components_directory_wildcard() {
        let ast = Parser::parse("**/*.txt", true).unwrap();
        assert!(match_components(&ast.segments, &["a.txt"], true));
        assert!(match_components(&ast.segments, &["x", "y", "a.txt"], true));
        assert!(!match_components(&ast.segments, &["x", "a.md"], true));
    }

    #[test]
    fn test_match_components_parent() {
        let ast = Parser::parse("a/../b/c.txt", true).unwrap().simplified();
        assert!(match_components(&ast.segments, &["b", "c.txt"], true));
        assert!(!match_components(&ast.segments, &["a", "b", "c.txt"], true));

        let ast = Parser::parse("*/../c.txt", true).unwrap().simplified();
        assert!(match_components(&ast.segments, &["c.txt"], true));
    }

    #[test]
    fn test_tree_matcher_skips_directories_for_last_segment() {
        let fs = MemoryFileSystem::new()
            .with_file("/root/data.txt/inner.bin", "x")
            .with_file("/root/notes.txt", "y");
        let ast = Parser::parse("*.txt", true).unwrap();

        let found = TreeMatcher::new(&fs).collect("/root", &ast.segments);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["/root/notes.txt".to_string()]);
    }

    #[test]
    fn test_tree_matcher_trailing_directory_wildcard() {
        let fs = MemoryFileSystem::new()
            .with_file("/r/a/b/c.txt", "1")
            .with_file("/r/d.md", "2")
            .with_file("/other/e.txt", "3");
        let ast = Parser::parse("**", true).unwrap();

        let found = TreeMatcher::new(&fs).collect("/r", &ast.segments);
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["/r/a/b/c.txt".to_string(), "/r/d.md".to_string()]
        );
    }
}
