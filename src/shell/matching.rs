//! Match resolution: turning argument patterns into absolute path sets.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::shell::backend::Backend;
use crate::shell::glob;
use crate::shell::path;

/// Constraint applied to resolved matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Any,
    FilesOnly,
    DirsOnly,
}

/// Resolve a list of patterns into a deduplicated set of absolute paths.
///
/// Every glob match is joined against `wd`. With `FilesOnly` or `DirsOnly`
/// each candidate is stat-checked; a stat failure at this point propagates,
/// since the glob step already confirmed the name exists.
pub fn find_matches(
    patterns: &[String],
    wd: &str,
    backend: &dyn Backend,
    filter: Filter,
) -> Result<BTreeSet<String>> {
    let mut out = BTreeSet::new();

    for pattern in patterns {
        for m in glob::glob(wd, pattern, backend)? {
            let abs = path::join(wd, &m);
            if filter != Filter::Any {
                let info = backend.stat(&abs)?;
                let keep = match filter {
                    Filter::FilesOnly => !info.is_dir(),
                    Filter::DirsOnly => info.is_dir(),
                    Filter::Any => true,
                };
                if !keep {
                    continue;
                }
            }
            out.insert(abs);
        }
    }
    Ok(out)
}

/// Collect the literal (non-glob) patterns that name nothing yet.
///
/// `edit` uses this to decide which targets to touch before launching the
/// editor. A glob with zero matches is not a request to create a file, so
/// magic patterns never land here.
pub fn non_existing_files(
    patterns: &[String],
    wd: &str,
    backend: &dyn Backend,
) -> BTreeSet<String> {
    let mut out = BTreeSet::new();

    for pattern in patterns {
        if glob::has_magic(pattern) {
            continue;
        }
        let abs = path::join(wd, pattern);
        match backend.stat(&abs) {
            Err(e) if e.is_not_found() => {
                out.insert(abs);
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::backend::LocalBackend;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        dir
    }

    fn strs(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_find_matches_absolute_and_deduplicated() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let patterns = vec!["*.txt".to_string(), "a.txt".to_string()];
        let matches = find_matches(&patterns, wd, &LocalBackend, Filter::Any).unwrap();
        assert_eq!(
            strs(&matches),
            vec![
                format!("{}/a.txt", wd).as_str(),
                format!("{}/b.txt", wd).as_str()
            ]
        );
    }

    #[test]
    fn test_find_matches_dirs_only() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let patterns = vec!["*".to_string()];
        let matches = find_matches(&patterns, wd, &LocalBackend, Filter::DirsOnly).unwrap();
        assert_eq!(strs(&matches), vec![format!("{}/docs", wd).as_str()]);
    }

    #[test]
    fn test_find_matches_files_only() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let patterns = vec!["*".to_string()];
        let matches = find_matches(&patterns, wd, &LocalBackend, Filter::FilesOnly).unwrap();
        assert!(!matches.iter().any(|m| m.ends_with("docs")));
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_non_existing_files_skips_globs() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let patterns = vec![
            "new.txt".to_string(),
            "a.txt".to_string(),
            "*.zip".to_string(),
        ];
        let missing = non_existing_files(&patterns, wd, &LocalBackend);
        assert_eq!(strs(&missing), vec![format!("{}/new.txt", wd).as_str()]);
    }
}
