//! Shell-word tokenization for the interactive loop.
//!
//! Variable expansion draws from the session's own environment map, not the
//! process environment, so `set`/`unset` visibly change what `$VAR` means.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SkiffError};

/// Tokenize one input line into shell words.
///
/// Single quotes are literal, double quotes group but still expand `$VAR`
/// and `${VAR}`, backslash escapes the next character. An unterminated
/// quote is a parse error.
pub fn split_words(line: &str, environ: &BTreeMap<String, String>) -> Result<Vec<String>> {
    tokenize(line, environ, true).map(|t| t.words)
}

/// Tokenization outcome used by completion: the words seen so far plus
/// whether the cursor sits after unconsumed whitespace.
pub struct LineContext {
    pub words: Vec<String>,
    pub last_space: bool,
}

/// Tolerant tokenization for completion requests. Unterminated quotes are
/// treated as extending to end of line instead of failing, since the user
/// is still typing.
pub fn completion_context(line: &str, environ: &BTreeMap<String, String>) -> LineContext {
    // strict=false never returns Err
    tokenize(line, environ, false).unwrap_or(LineContext {
        words: Vec::new(),
        last_space: true,
    })
}

fn tokenize(
    line: &str,
    environ: &BTreeMap<String, String>,
    strict: bool,
) -> Result<LineContext> {
    let chars: Vec<char> = line.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
                i += 1;
            }
            '\\' => {
                in_word = true;
                i += 1;
                if i < chars.len() {
                    current.push(chars[i]);
                    i += 1;
                }
            }
            '\'' => {
                in_word = true;
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == '\'' {
                        closed = true;
                        i += 1;
                        break;
                    }
                    current.push(chars[i]);
                    i += 1;
                }
                if !closed && strict {
                    return Err(SkiffError::Parse("unterminated single quote".to_string()));
                }
            }
            '"' => {
                in_word = true;
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    match chars[i] {
                        '"' => {
                            closed = true;
                            i += 1;
                            break;
                        }
                        '\\' => {
                            i += 1;
                            if i < chars.len() {
                                current.push(chars[i]);
                                i += 1;
                            }
                        }
                        '$' => {
                            i += 1;
                            i = expand_var(&chars, i, environ, &mut current);
                        }
                        other => {
                            current.push(other);
                            i += 1;
                        }
                    }
                }
                if !closed && strict {
                    return Err(SkiffError::Parse("unterminated double quote".to_string()));
                }
            }
            '$' => {
                in_word = true;
                i += 1;
                i = expand_var(&chars, i, environ, &mut current);
            }
            other => {
                in_word = true;
                current.push(other);
                i += 1;
            }
        }
    }

    let last_space = !in_word;
    if in_word {
        words.push(current);
    }
    Ok(LineContext { words, last_space })
}

/// Expand a variable reference starting just past the `$`. Unknown names
/// expand to the empty string; a lone `$` stays literal.
fn expand_var(
    chars: &[char],
    mut i: usize,
    environ: &BTreeMap<String, String>,
    out: &mut String,
) -> usize {
    let braced = chars.get(i) == Some(&'{');
    if braced {
        i += 1;
    }

    let start = i;
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
        i += 1;
    }
    let name: String = chars[start..i].iter().collect();

    if braced {
        if chars.get(i) == Some(&'}') {
            i += 1;
        }
    }

    if name.is_empty() {
        out.push('$');
        if braced {
            out.push('{');
        }
        return i;
    }

    if let Some(value) = environ.get(&name) {
        out.push_str(value);
    }
    i
}

/// Partition tokens into positional arguments and a presence-set of flags.
/// A flag is any token with a `-` prefix; the stored name has the leading
/// dashes stripped.
pub fn split_flags(tokens: &[String]) -> (Vec<String>, BTreeSet<String>) {
    let mut args = Vec::new();
    let mut flags = BTreeSet::new();

    for token in tokens {
        let stripped = token.trim_start_matches('-');
        if token.starts_with('-') && !stripped.is_empty() {
            flags.insert(stripped.to_string());
        } else {
            args.push(token.clone());
        }
    }
    (args, flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("HOME".to_string(), "/home/u".to_string());
        m.insert("NAME".to_string(), "report".to_string());
        m
    }

    #[test]
    fn test_split_words_basic() {
        let words = split_words("cp a.txt b.txt", &env()).unwrap();
        assert_eq!(words, vec!["cp", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_split_words_quotes() {
        let words = split_words("rm 'a file.txt' \"b file\"", &env()).unwrap();
        assert_eq!(words, vec!["rm", "a file.txt", "b file"]);
    }

    #[test]
    fn test_split_words_backslash_escape() {
        let words = split_words("rm a\\ file.txt", &env()).unwrap();
        assert_eq!(words, vec!["rm", "a file.txt"]);
    }

    #[test]
    fn test_split_words_expansion() {
        let words = split_words("cd $HOME/docs", &env()).unwrap();
        assert_eq!(words, vec!["cd", "/home/u/docs"]);
        let words = split_words("less ${NAME}.txt", &env()).unwrap();
        assert_eq!(words, vec!["less", "report.txt"]);
    }

    #[test]
    fn test_split_words_single_quote_suppresses_expansion() {
        let words = split_words("echo '$HOME'", &env()).unwrap();
        assert_eq!(words, vec!["echo", "$HOME"]);
    }

    #[test]
    fn test_split_words_unknown_var_is_empty() {
        let words = split_words("ls $NOPE.txt", &env()).unwrap();
        assert_eq!(words, vec!["ls", ".txt"]);
    }

    #[test]
    fn test_split_words_unterminated_quote() {
        assert!(split_words("rm 'oops", &env()).is_err());
        assert!(split_words("rm \"oops", &env()).is_err());
    }

    #[test]
    fn test_completion_context_last_space() {
        let ctx = completion_context("ls ", &env());
        assert_eq!(ctx.words, vec!["ls"]);
        assert!(ctx.last_space);

        let ctx = completion_context("ls doc", &env());
        assert_eq!(ctx.words, vec!["ls", "doc"]);
        assert!(!ctx.last_space);
    }

    #[test]
    fn test_completion_context_tolerates_open_quote() {
        let ctx = completion_context("rm 'a fi", &env());
        assert_eq!(ctx.words, vec!["rm", "a fi"]);
        assert!(!ctx.last_space);
    }

    #[test]
    fn test_split_flags() {
        let tokens: Vec<String> = ["-r", "a.txt", "--force", "b.txt"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (args, flags) = split_flags(&tokens);
        assert_eq!(args, vec!["a.txt", "b.txt"]);
        assert!(flags.contains("r"));
        assert!(flags.contains("force"));
    }
}
