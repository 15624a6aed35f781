//! Tab completion.
//!
//! A pure candidate engine plus the rustyline helper that feeds it. The
//! helper shares the live session state so candidates always reflect the
//! current working directories.

use std::cell::RefCell;
use std::rc::Rc;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::error::Result;
use crate::shell::backend::Backend;
use crate::shell::matching::Filter;
use crate::shell::{glob, parser, path, ShellState};

/// One completion candidate: what the user sees and what gets inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub display: String,
    pub replacement: String,
}

/// Complete one path argument against a backend.
///
/// `partial` is the token under the cursor (empty when the cursor follows
/// whitespace). Directory candidates get a `/` suffix and never a trailing
/// space; a single unambiguous non-directory candidate gets exactly one
/// trailing space. A token containing glob metacharacters expands in place
/// into the quoted match list.
pub fn complete_argument(
    wd: &str,
    backend: &dyn Backend,
    filter: Filter,
    partial: &str,
    last_space: bool,
) -> Result<Vec<Candidate>> {
    if !last_space && glob::has_magic(partial) {
        let matches = glob::glob(wd, partial, backend)?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }
        let joined = matches
            .iter()
            .map(|m| path::quote(m))
            .collect::<Vec<_>>()
            .join(" ");
        return Ok(vec![Candidate {
            display: joined.clone(),
            replacement: format!("{} ", joined),
        }]);
    }

    let partial = if last_space { "" } else { partial };
    let (dir_prefix, base) = match partial.rfind('/') {
        Some(i) => (&partial[..=i], &partial[i + 1..]),
        None => ("", partial),
    };

    let list_dir = if dir_prefix.is_empty() {
        wd.to_string()
    } else {
        path::join(wd, dir_prefix)
    };

    let entries = match backend.read_dir(&list_dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(Vec::new()),
    };

    let show_hidden = base.starts_with('.');
    let mut found: Vec<(String, bool)> = Vec::new();

    for entry in entries {
        if entry.name.starts_with('.') && !show_hidden {
            continue;
        }
        if !entry.name.starts_with(base) {
            continue;
        }

        // A symlink completes as whatever it points at.
        let is_dir = if entry.is_symlink() {
            backend
                .stat(&path::join(&list_dir, &entry.name))
                .map(|info| info.is_dir())
                .unwrap_or(false)
        } else {
            entry.is_dir()
        };

        if filter == Filter::DirsOnly && !is_dir {
            continue;
        }
        found.push((entry.name, is_dir));
    }

    let lone_file = found.len() == 1 && !found[0].1;
    let candidates = found
        .into_iter()
        .map(|(name, is_dir)| {
            let typed = format!("{}{}", dir_prefix, name);
            let mut replacement = path::quote(&typed);
            let display = if is_dir {
                replacement.push('/');
                format!("{}/", name)
            } else {
                if lone_file {
                    replacement.push(' ');
                }
                name
            };
            Candidate {
                display,
                replacement,
            }
        })
        .collect();
    Ok(candidates)
}

/// Byte offset where the token under the cursor starts, quote-aware.
/// Returns `line.len()` when the cursor follows unconsumed whitespace.
fn last_token_start(line: &str) -> usize {
    let mut start = line.len();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                if !in_word {
                    in_word = true;
                    start = i;
                }
                escaped = true;
            }
            '\'' | '"' => {
                match quote {
                    Some(q) if q == c => quote = None,
                    Some(_) => {}
                    None => quote = Some(c),
                }
                if !in_word {
                    in_word = true;
                    start = i;
                }
            }
            ' ' | '\t' if quote.is_none() => {
                in_word = false;
                start = line.len();
            }
            _ => {
                if !in_word {
                    in_word = true;
                    start = i;
                }
            }
        }
    }
    start
}

/// rustyline helper bound to the shared session state.
pub struct ShellHelper {
    pub state: Rc<RefCell<ShellState>>,
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let state = self.state.borrow();
        let typed = &line[..pos];
        let ctx = parser::completion_context(typed, &state.environ);
        let start = last_token_start(typed);

        // First token: complete command names.
        if ctx.words.is_empty() || (ctx.words.len() == 1 && !ctx.last_space) {
            let partial = ctx.words.first().map(String::as_str).unwrap_or("");
            let pairs = state
                .command_names()
                .into_iter()
                .filter(|name| name.starts_with(partial))
                .map(|name| Pair {
                    display: name.clone(),
                    replacement: format!("{} ", name),
                })
                .collect();
            return Ok((start, pairs));
        }

        let cmd = ctx.words[0].to_lowercase();
        let Some((side, filter)) = state.completion_target(&cmd) else {
            return Ok((pos, Vec::new()));
        };

        let partial = if ctx.last_space {
            ""
        } else {
            ctx.words.last().map(String::as_str).unwrap_or("")
        };
        let wd = state.wd(side).to_string();
        let backend = state.backend(side);

        let candidates =
            complete_argument(&wd, backend.as_ref(), filter, partial, ctx.last_space)
                .unwrap_or_default();

        let pairs = candidates
            .into_iter()
            .map(|c| Pair {
                display: c.display,
                replacement: c.replacement,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::backend::LocalBackend;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("readme.md"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join(".secret"), b"x").unwrap();
        dir
    }

    #[test]
    fn test_single_file_gets_trailing_space() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let c = complete_argument(wd, &LocalBackend, Filter::Any, "rep", false).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].replacement, "report.txt ");
    }

    #[test]
    fn test_directory_gets_slash_not_space() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let c = complete_argument(wd, &LocalBackend, Filter::Any, "do", false).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].replacement, "docs/");
    }

    #[test]
    fn test_ambiguous_matches_get_neither() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let c = complete_argument(wd, &LocalBackend, Filter::Any, "re", false).unwrap();
        assert_eq!(c.len(), 2);
        assert!(c.iter().all(|x| !x.replacement.ends_with(' ')));
    }

    #[test]
    fn test_hidden_needs_dot_prefix() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let all = complete_argument(wd, &LocalBackend, Filter::Any, "", true).unwrap();
        assert!(!all.iter().any(|c| c.display.starts_with('.')));

        let dotted = complete_argument(wd, &LocalBackend, Filter::Any, ".s", false).unwrap();
        assert_eq!(dotted.len(), 1);
        assert!(dotted[0].display.starts_with(".secret"));
    }

    #[test]
    fn test_dirs_only_filter() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let c = complete_argument(wd, &LocalBackend, Filter::DirsOnly, "", true).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].display, "docs/");
    }

    #[test]
    fn test_glob_expands_in_place() {
        let dir = fixture();
        let wd = dir.path().to_str().unwrap();
        let c = complete_argument(wd, &LocalBackend, Filter::Any, "re*", false).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].replacement, "readme.md report.txt ");
    }

    #[test]
    fn test_last_token_start() {
        assert_eq!(last_token_start("ls doc"), 3);
        assert_eq!(last_token_start("ls "), 3);
        assert_eq!(last_token_start("rm 'a b"), 3);
        assert_eq!(last_token_start(""), 0);
    }
}
