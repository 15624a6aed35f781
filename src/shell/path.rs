//! Slash-path utilities shared by both backends.
//!
//! Working directories and every path handed to a backend are absolute,
//! slash-separated strings; these helpers never touch the filesystem.

/// Lexically clean a slash path: collapse `//`, resolve `.` and `..`.
pub fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
                // ".." above the root collapses into the root
            }
            s => parts.push(s),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Join `name` onto `base`.
///
/// Absolute names pass through untouched. A trailing slash on `name` is a
/// directory reference and survives the join.
pub fn join(base: &str, name: &str) -> String {
    if name.starts_with('/') {
        return name.to_string();
    }
    let joined = clean(&format!("{}/{}", base, name));
    if name.ends_with('/') && !joined.ends_with('/') {
        format!("{}/", joined)
    } else {
        joined
    }
}

/// Last path segment. The root's base name is the empty string, which is
/// what recursive copy of `/` relies on when building destination names.
pub fn base(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) => trimmed[i + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Best-effort relative path from `base` to `path`.
///
/// Falls back to returning `path` unchanged whenever the result would
/// escape upward, so completion output never appears to leave the working
/// directory implicitly.
pub fn rel(base: &str, path: &str) -> String {
    let base = clean(base);
    let path_clean = clean(path);

    if path_clean == base {
        return ".".to_string();
    }
    if base == "/" {
        return path_clean[1..].to_string();
    }
    if let Some(rest) = path_clean.strip_prefix(&base) {
        if let Some(rest) = rest.strip_prefix('/') {
            return rest.to_string();
        }
    }
    path.to_string()
}

/// Split a pattern into its directory prefix and final segment.
pub fn split_dir_file(pattern: &str) -> (&str, &str) {
    match pattern.rfind('/') {
        None => ("", pattern),
        Some(0) => ("/", &pattern[1..]),
        Some(i) => (&pattern[..i], &pattern[i + 1..]),
    }
}

/// Quote a completion candidate for shell-safe re-parsing.
pub fn quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, ' ' | '\t' | '\'' | '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Collapse every non-leading segment of an absolute path to its first
/// letter for the prompt: `/home/alice/project` -> `/h/a/project`.
pub fn shorten(wd: &str) -> String {
    if wd == "/" || wd.is_empty() {
        return "/".to_string();
    }
    let segs: Vec<&str> = wd.trim_start_matches('/').split('/').collect();
    let mut out = String::new();
    for (i, seg) in segs.iter().enumerate() {
        out.push('/');
        if i + 1 == segs.len() {
            out.push_str(seg);
        } else if let Some(first) = seg.chars().next() {
            out.push(first);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean("/a/b/../c"), "/a/c");
        assert_eq!(clean("/a//b/./c/"), "/a/b/c");
        assert_eq!(clean("/../x"), "/x");
        assert_eq!(clean("a/.."), ".");
        assert_eq!(clean("/"), "/");
    }

    #[test]
    fn test_join_absolute_passthrough() {
        assert_eq!(join("/home/u", "/etc/hosts"), "/etc/hosts");
    }

    #[test]
    fn test_join_trailing_slash_preserved() {
        assert_eq!(join("/home/u", "dir/"), "/home/u/dir/");
        assert_eq!(join("/home/u", "file"), "/home/u/file");
    }

    #[test]
    fn test_base_root_is_empty() {
        assert_eq!(base("/"), "");
    }

    #[test]
    fn test_base_last_segment() {
        assert_eq!(base("/a/b/c"), "c");
        assert_eq!(base("/a/b/"), "b");
        assert_eq!(base("name"), "name");
    }

    #[test]
    fn test_join_base_idempotence() {
        let wd = "/srv/app";
        let once = join(wd, "x");
        assert_eq!(join(wd, &base(&once)), once);
    }

    #[test]
    fn test_rel_inside_base() {
        assert_eq!(rel("/home/u", "/home/u/docs/a.txt"), "docs/a.txt");
        assert_eq!(rel("/home/u", "/home/u"), ".");
    }

    #[test]
    fn test_rel_escaping_falls_back_to_absolute() {
        assert_eq!(rel("/home/u/docs", "/home/u/music"), "/home/u/music");
        assert_eq!(rel("/a/b", "/x/y"), "/x/y");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("with space"), "with\\ space");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("/home/alice/project"), "/h/a/project");
        assert_eq!(shorten("/"), "/");
        assert_eq!(shorten("/tmp"), "/tmp");
    }
}
