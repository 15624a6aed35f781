//! Shell-style glob matching over a pluggable backend.
//!
//! The algorithm never touches a filesystem API directly; directory
//! listings and stats go through the backend trait, so the same code
//! serves both sides of the session.

use crate::error::{Result, SkiffError};
use crate::shell::backend::Backend;
use crate::shell::path;

/// True when the pattern contains glob metacharacters.
pub fn has_magic(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Match a single name against a single-segment pattern.
///
/// Supports `*`, `?` and `[...]` classes with ranges and `^`/`!` negation.
/// A malformed class is a `BadPattern` error.
pub fn pattern_match(pattern: &str, name: &str) -> Result<bool> {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    match_here(&p, &n)
}

fn match_here(p: &[char], n: &[char]) -> Result<bool> {
    if p.is_empty() {
        return Ok(n.is_empty());
    }
    match p[0] {
        '*' => {
            let rest = &p[1..];
            for i in 0..=n.len() {
                if match_here(rest, &n[i..])? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        '?' => {
            if n.is_empty() {
                Ok(false)
            } else {
                match_here(&p[1..], &n[1..])
            }
        }
        '[' => {
            let (consumed, matched) = match_class(p, n.first().copied())?;
            if n.is_empty() || !matched {
                Ok(false)
            } else {
                match_here(&p[consumed..], &n[1..])
            }
        }
        c => {
            if n.first() == Some(&c) {
                match_here(&p[1..], &n[1..])
            } else {
                Ok(false)
            }
        }
    }
}

/// Parse a `[...]` class starting at `p[0] == '['`. Returns the number of
/// pattern chars consumed and whether `ch` is in the class.
fn match_class(p: &[char], ch: Option<char>) -> Result<(usize, bool)> {
    let bad = || SkiffError::BadPattern(p.iter().collect());

    let mut i = 1;
    let mut negated = false;
    if i < p.len() && (p[i] == '^' || p[i] == '!') {
        negated = true;
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    while i < p.len() {
        if p[i] == ']' && !first {
            let hit = matched != negated;
            return Ok((i + 1, ch.is_some() && hit));
        }
        first = false;

        let lo = if p[i] == '\\' {
            i += 1;
            *p.get(i).ok_or_else(bad)?
        } else {
            p[i]
        };
        i += 1;

        let hi = if i + 1 < p.len() && p[i] == '-' && p[i + 1] != ']' {
            let h = p[i + 1];
            i += 2;
            h
        } else {
            lo
        };

        if hi < lo {
            return Err(bad());
        }
        if let Some(c) = ch {
            if c >= lo && c <= hi {
                matched = true;
            }
        }
    }
    Err(bad())
}

/// Resolve a pattern against one backend, relative to `wd`.
///
/// Matches come back in the shape the pattern was written (relative stays
/// relative); callers join them to `wd`. A literal pattern naming nothing
/// yields zero matches, not an error; so does a magic pattern matching
/// nothing. Listings are consumed sorted, so results are deterministic.
pub fn glob(wd: &str, pattern: &str, backend: &dyn Backend) -> Result<Vec<String>> {
    // A trailing slash restricts matches to directories.
    if pattern != "/" && pattern.ends_with('/') {
        let stripped = pattern.trim_end_matches('/');
        let mut out = Vec::new();
        for m in glob(wd, stripped, backend)? {
            if backend.stat(&path::join(wd, &m))?.is_dir() {
                out.push(format!("{}/", m));
            }
        }
        return Ok(out);
    }

    if !has_magic(pattern) {
        let abs = path::join(wd, pattern);
        return match backend.stat(&abs) {
            Ok(_) => Ok(vec![pattern.to_string()]),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        };
    }

    let (dir, file) = path::split_dir_file(pattern);
    if !has_magic(dir) {
        return glob_dir(wd, dir, file, backend);
    }

    // A prefix that does not shrink would recurse forever.
    if dir == pattern {
        return Err(SkiffError::BadPattern(pattern.to_string()));
    }

    let mut out = Vec::new();
    for resolved in glob(wd, dir, backend)? {
        out.extend(glob_dir(wd, &resolved, file, backend)?);
    }
    Ok(out)
}

/// Match the final pattern segment against the entries of one directory.
/// Hidden entries never participate in glob expansion. A directory that
/// cannot be listed contributes no matches.
fn glob_dir(
    wd: &str,
    dir: &str,
    file_pattern: &str,
    backend: &dyn Backend,
) -> Result<Vec<String>> {
    let list_path = if dir.is_empty() {
        wd.to_string()
    } else {
        path::join(wd, dir)
    };

    let entries = match backend.read_dir(&list_path) {
        Ok(entries) => entries,
        Err(_) => return Ok(Vec::new()),
    };

    let mut out = Vec::new();
    for entry in entries {
        if entry.name.starts_with('.') {
            continue;
        }
        if pattern_match(file_pattern, &entry.name)? {
            let joined = if dir.is_empty() {
                entry.name.clone()
            } else if dir == "/" {
                format!("/{}", entry.name)
            } else {
                format!("{}/{}", dir, entry.name)
            };
            out.push(joined);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::backend::LocalBackend;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.log", ".hidden.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("x.txt"), b"x").unwrap();
        dir
    }

    #[test]
    fn test_pattern_match_basics() {
        assert!(pattern_match("*.txt", "a.txt").unwrap());
        assert!(!pattern_match("*.txt", "a.log").unwrap());
        assert!(pattern_match("a?c", "abc").unwrap());
        assert!(!pattern_match("a?c", "ac").unwrap());
        assert!(pattern_match("[a-c].txt", "b.txt").unwrap());
        assert!(!pattern_match("[!a-c].txt", "b.txt").unwrap());
        assert!(pattern_match("[^x]y", "ay").unwrap());
    }

    #[test]
    fn test_pattern_match_bad_class() {
        assert!(pattern_match("[abc", "a").is_err());
        assert!(pattern_match("[z-a]", "q").is_err());
    }

    #[test]
    fn test_glob_magic() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let matches = glob(wd, "*.txt", &LocalBackend).unwrap();
        assert_eq!(matches, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_glob_hidden_excluded() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let matches = glob(wd, "*", &LocalBackend).unwrap();
        assert!(!matches.iter().any(|m| m.starts_with('.')));
    }

    #[test]
    fn test_glob_literal_tolerance() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        assert!(glob(wd, "missing.txt", &LocalBackend).unwrap().is_empty());
        assert!(glob(wd, "*.zip", &LocalBackend).unwrap().is_empty());
    }

    #[test]
    fn test_glob_literal_hit() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        assert_eq!(glob(wd, "a.txt", &LocalBackend).unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn test_glob_multi_segment() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let matches = glob(wd, "s*/*.txt", &LocalBackend).unwrap();
        assert_eq!(matches, vec!["sub/x.txt"]);
    }

    #[test]
    fn test_glob_trailing_slash_dirs_only() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let matches = glob(wd, "*/", &LocalBackend).unwrap();
        assert_eq!(matches, vec!["sub/"]);
    }

    #[test]
    fn test_glob_deterministic() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let first = glob(wd, "*", &LocalBackend).unwrap();
        let second = glob(wd, "*", &LocalBackend).unwrap();
        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted);
    }
}
