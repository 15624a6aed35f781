//! The interactive dual-filesystem shell.
//!
//! One session tracks two working directories, one per backend, and runs a
//! synchronous command loop on a blocking thread. Commands follow a strict
//! naming rule: the bare verb targets the remote side, the `l`-prefixed
//! twin targets the local side.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::Arc;

use console::style;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config;
use crate::error::{Result, SkiffError};

pub mod backend;
pub mod browse;
pub mod commands;
pub mod complete;
pub mod glob;
pub mod matching;
pub mod ops;
pub mod parser;
pub mod path;
pub mod transfer;

use backend::Backend;
use matching::Filter;

/// Which filesystem a command verb targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

pub type Handler = fn(&mut ShellState, Side, &[String], &BTreeSet<String>) -> Result<Outcome>;

/// How a command's arguments complete.
#[derive(Debug, Clone, Copy)]
pub enum Completes {
    None,
    Paths(Filter),
}

pub struct CommandSpec {
    pub handler: Handler,
    pub side: Side,
    pub completes: Completes,
    pub usage: &'static str,
}

/// User-facing output channel: info lines and counted error lines.
#[derive(Default)]
pub struct Report {
    pub quiet: bool,
    pub errors: usize,
}

impl Report {
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{} {}", style("->").green(), msg);
        }
    }

    pub fn error(&mut self, msg: &str) {
        self.errors += 1;
        if !self.quiet {
            eprintln!("{} {}", style("===>").red().bold(), msg);
        }
    }
}

pub struct ShellState {
    pub local: Arc<dyn Backend>,
    pub remote: Arc<dyn Backend>,
    pub local_wd: String,
    pub remote_wd: String,
    pub init_local_wd: String,
    pub init_remote_wd: String,
    pub environ: BTreeMap<String, String>,
    pub commands: BTreeMap<String, CommandSpec>,
    pub report: Report,
    pub runtime: Handle,
    /// Scratch directories from `open`; cleaned up at session end so the
    /// spawned viewer has time to read its file.
    pub tempdirs: Vec<tempfile::TempDir>,
    pub browsers: Vec<browse::BrowseServer>,
}

impl ShellState {
    pub fn new(
        local: Arc<dyn Backend>,
        remote: Arc<dyn Backend>,
        remote_wd: String,
        runtime: Handle,
    ) -> Result<Self> {
        let local_wd = std::env::current_dir()?
            .to_str()
            .ok_or_else(|| SkiffError::Config("working directory is not valid UTF-8".to_string()))?
            .to_string();

        // Entries that are not valid UTF-8 are dropped rather than
        // aborting session construction.
        let environ: BTreeMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();

        Ok(Self {
            local,
            remote,
            init_local_wd: local_wd.clone(),
            init_remote_wd: remote_wd.clone(),
            local_wd,
            remote_wd,
            environ,
            commands: commands::registry(),
            report: Report::default(),
            runtime,
            tempdirs: Vec::new(),
            browsers: Vec::new(),
        })
    }

    pub fn backend(&self, side: Side) -> Arc<dyn Backend> {
        match side {
            Side::Local => self.local.clone(),
            Side::Remote => self.remote.clone(),
        }
    }

    pub fn wd(&self, side: Side) -> &str {
        match side {
            Side::Local => &self.local_wd,
            Side::Remote => &self.remote_wd,
        }
    }

    pub fn set_wd(&mut self, side: Side, wd: String) {
        match side {
            Side::Local => self.local_wd = wd,
            Side::Remote => self.remote_wd = wd,
        }
    }

    pub fn init_wd(&self, side: Side) -> &str {
        match side {
            Side::Local => &self.init_local_wd,
            Side::Remote => &self.init_remote_wd,
        }
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    /// What the given command completes, if it takes path arguments.
    pub fn completion_target(&self, cmd: &str) -> Option<(Side, Filter)> {
        let spec = self.commands.get(cmd)?;
        match spec.completes {
            Completes::Paths(filter) => Some((spec.side, filter)),
            Completes::None => None,
        }
    }

    /// A value from the session environment, falling back to a default.
    pub fn env_or(&self, key: &str, default: &str) -> String {
        self.environ
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn prompt(&self) -> String {
        format!(
            "{} : {} > ",
            path::shorten(&self.local_wd),
            self.remote_wd
        )
    }

    fn teardown(&mut self) {
        for browser in &mut self.browsers {
            browser.stop();
        }
        self.browsers.clear();
        self.tempdirs.clear();
    }
}

/// Parse and execute one input line.
pub fn dispatch(state: &mut ShellState, line: &str) -> Result<Outcome> {
    let trimmed = line.trim_start();

    // Literal escape: hand the rest of the line to the OS shell, running
    // in the local working directory with the session environment.
    if let Some(rest) = trimmed.strip_prefix('!') {
        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(rest)
            .current_dir(&state.local_wd)
            .env_clear()
            .envs(&state.environ)
            .status()?;
        if !status.success() {
            debug!("subprocess exited with {}", status);
        }
        return Ok(Outcome::Continue);
    }

    let words = parser::split_words(line, &state.environ)?;
    let Some(first) = words.first() else {
        return Ok(Outcome::Continue);
    };

    let cmd = first.to_lowercase();
    let Some(spec) = state.commands.get(&cmd) else {
        return Err(SkiffError::Usage(format!("unknown command: {}", cmd)));
    };
    let (handler, side) = (spec.handler, spec.side);

    let (args, flags) = parser::split_flags(&words[1..]);
    handler(state, side, &args, &flags)
}

/// Run the interactive loop until exit or end of input.
///
/// The state is shared with the completion helper, which only borrows it
/// while the line editor is waiting for input.
pub fn run(state: Rc<RefCell<ShellState>>) -> Result<()> {
    let mut rl: Editor<complete::ShellHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(complete::ShellHelper {
        state: state.clone(),
    }));

    let history = config::AppConfig::history_path().ok();
    if let Some(h) = &history {
        if rl.load_history(h).is_err() {
            debug!("no history at {}", h.display());
        }
    }

    loop {
        let prompt = state.borrow().prompt();
        match rl.readline(&prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                let outcome = dispatch(&mut state.borrow_mut(), &line);
                match outcome {
                    Ok(Outcome::Exit) => break,
                    Ok(Outcome::Continue) => {}
                    Err(e) => state.borrow_mut().report.error(&e.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(h) = &history {
        if let Some(parent) = h.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = rl.save_history(h) {
            warn!("could not save history: {}", e);
        }
    }
    state.borrow_mut().teardown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_has_a_local_twin_or_is_side_free() {
        let commands = commands::registry();
        for (name, spec) in &commands {
            if let Some(bare) = name.strip_prefix('l') {
                if let Some(twin) = commands.get(bare) {
                    // l-prefix means local; the bare form means remote.
                    if twin.side == Side::Remote {
                        assert_eq!(spec.side, Side::Local, "{} must target local", name);
                    }
                }
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_state_construction_skips_non_utf8_env() {
        use std::os::unix::ffi::OsStrExt;
        std::env::set_var(
            "SKIFF_BAD_ENV",
            std::ffi::OsStr::from_bytes(&[0x66, 0xff, 0x6f]),
        );

        let rt = tokio::runtime::Runtime::new().unwrap();
        let state = ShellState::new(
            Arc::new(backend::LocalBackend),
            Arc::new(backend::LocalBackend),
            "/".to_string(),
            rt.handle().clone(),
        )
        .unwrap();

        assert!(!state.environ.contains_key("SKIFF_BAD_ENV"));
        std::env::remove_var("SKIFF_BAD_ENV");
    }

    #[test]
    fn test_exit_synonyms_registered() {
        let commands = commands::registry();
        for name in ["exit", "logout", "q", ":q"] {
            assert!(commands.contains_key(name), "missing {}", name);
        }
    }
}
