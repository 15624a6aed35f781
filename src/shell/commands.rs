//! Command table and handlers.
//!
//! Every verb that touches a filesystem comes in a pair: the bare name
//! works on the remote side, the `l`-prefixed twin on the local side. Both
//! entries share one handler; the registered side is passed in at dispatch.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use chrono::{Local, TimeZone};
use console::style;
use dialoguer::Confirm;
use sha2::{Digest, Sha256};

use crate::error::{Result, SkiffError};
use crate::shell::backend::{format_mode, Backend, LocalBackend};
use crate::shell::matching::{self, Filter};
use crate::shell::{browse, ops, path, transfer};
use crate::shell::{CommandSpec, Completes, Outcome, ShellState, Side};

pub fn registry() -> BTreeMap<String, CommandSpec> {
    let mut map = BTreeMap::new();

    pair(&mut map, "ls", cmd_ls, paths(Filter::Any), "ls [-a] [-l] [PATTERN...]");
    pair(&mut map, "ll", cmd_ll, paths(Filter::Any), "ll [PATTERN...]");
    pair(&mut map, "cd", cmd_cd, paths(Filter::DirsOnly), "cd [DIR]");
    pair(&mut map, "pwd", cmd_pwd, Completes::None, "pwd");
    pair(&mut map, "rm", cmd_rm, paths(Filter::Any), "rm [-r] [-f] PATTERN...");
    pair(&mut map, "rmdir", cmd_rmdir, paths(Filter::DirsOnly), "rmdir PATTERN...");
    pair(&mut map, "mkdir", cmd_mkdir, paths(Filter::DirsOnly), "mkdir DIR...");
    pair(
        &mut map,
        "mkdirall",
        cmd_mkdirall,
        paths(Filter::DirsOnly),
        "mkdirall DIR...",
    );
    pair(&mut map, "mv", cmd_mv, paths(Filter::Any), "mv SOURCE... DEST");
    pair(&mut map, "cp", cmd_cp, paths(Filter::Any), "cp SOURCE... DEST");
    pair(&mut map, "edit", cmd_edit, paths(Filter::FilesOnly), "edit FILE...");
    pair(&mut map, "open", cmd_open, paths(Filter::FilesOnly), "open FILE...");
    pair(&mut map, "less", cmd_less, paths(Filter::FilesOnly), "less FILE");
    pair(&mut map, "browse", cmd_browse, paths(Filter::DirsOnly), "browse [DIR|stop]");

    single(&mut map, "get", Side::Remote, cmd_get, paths(Filter::Any), "get [PATTERN...]");
    single(&mut map, "put", Side::Local, cmd_put, paths(Filter::Any), "put [PATTERN...]");

    single(&mut map, "env", Side::Local, cmd_env, Completes::None, "env");
    single(&mut map, "set", Side::Local, cmd_set, Completes::None, "set KEY VALUE");
    single(&mut map, "unset", Side::Local, cmd_unset, Completes::None, "unset KEY...");
    single(&mut map, "cowsay", Side::Local, cmd_cowsay, Completes::None, "cowsay [TEXT]");
    single(&mut map, "help", Side::Local, cmd_help, Completes::None, "help");

    for name in ["exit", "logout", "q", ":q"] {
        single(&mut map, name, Side::Local, cmd_exit, Completes::None, name);
    }

    map
}

fn paths(filter: Filter) -> Completes {
    Completes::Paths(filter)
}

fn pair(
    map: &mut BTreeMap<String, CommandSpec>,
    name: &str,
    handler: crate::shell::Handler,
    completes: Completes,
    usage: &'static str,
) {
    map.insert(
        name.to_string(),
        CommandSpec {
            handler,
            side: Side::Remote,
            completes,
            usage,
        },
    );
    map.insert(
        format!("l{}", name),
        CommandSpec {
            handler,
            side: Side::Local,
            completes,
            usage,
        },
    );
}

fn single(
    map: &mut BTreeMap<String, CommandSpec>,
    name: &str,
    side: Side,
    handler: crate::shell::Handler,
    completes: Completes,
    usage: &'static str,
) {
    map.insert(
        name.to_string(),
        CommandSpec {
            handler,
            side,
            completes,
            usage,
        },
    );
}

// ---------------------------------------------------------------------------
// Listing and navigation
// ---------------------------------------------------------------------------

fn cmd_ls(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    flags: &BTreeSet<String>,
) -> Result<Outcome> {
    let backend = state.backend(side);
    let wd = state.wd(side).to_string();

    // (absolute, display-name) pairs
    let targets: Vec<(String, String)> = if args.is_empty() {
        let show_hidden = flags.contains("a");
        backend
            .read_dir(&wd)?
            .into_iter()
            .filter(|e| show_hidden || !e.name.starts_with('.'))
            .map(|e| (path::join(&wd, &e.name), e.name))
            .collect()
    } else {
        matching::find_matches(args, &wd, backend.as_ref(), Filter::Any)?
            .into_iter()
            .map(|m| {
                let rel = path::rel(&wd, &m);
                (m, rel)
            })
            .collect()
    };

    let long = flags.contains("l");
    for (abs, name) in targets {
        if long {
            match backend.lstat(&abs) {
                Ok(info) => println!("{}", long_row(&info, &name)),
                Err(e) => state.report.error(&format!("{}: {}", abs, e)),
            }
        } else {
            match is_dir_resolved(backend.as_ref(), &abs) {
                Ok(true) => println!("{}/", style(name).cyan()),
                Ok(false) => println!("{}", name),
                Err(e) => state.report.error(&format!("{}: {}", abs, e)),
            }
        }
    }
    Ok(Outcome::Continue)
}

/// Whether the entry resolves to a directory. A dangling symlink fails
/// `stat` but still lists; its lstat kind decides.
fn is_dir_resolved(backend: &dyn Backend, path: &str) -> Result<bool> {
    match backend.stat(path) {
        Ok(info) => Ok(info.is_dir()),
        Err(_) => backend.lstat(path).map(|info| info.is_dir()),
    }
}

fn long_row(info: &crate::shell::backend::FileInfo, name: &str) -> String {
    let mtime = info
        .mtime
        .and_then(|t| Local.timestamp_opt(t, 0).single())
        .map(|t| t.format("%b %e %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {:>6} {:>6} {:>10} {} {}",
        format_mode(info.kind, info.mode),
        info.uid.map(|u| u.to_string()).unwrap_or_else(|| "-".into()),
        info.gid.map(|g| g.to_string()).unwrap_or_else(|| "-".into()),
        info.size,
        mtime,
        name,
    )
}

fn cmd_ll(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    let backend = state.backend(side);
    let wd = state.wd(side).to_string();

    let targets: Vec<String> = if args.is_empty() {
        backend
            .read_dir(&wd)?
            .into_iter()
            .map(|e| path::join(&wd, &e.name))
            .collect()
    } else {
        matching::find_matches(args, &wd, backend.as_ref(), Filter::Any)?
            .into_iter()
            .collect()
    };

    let mut table = String::new();
    for target in targets {
        match backend.lstat(&target) {
            Ok(info) => {
                table.push_str(&long_row(&info, &path::rel(&wd, &target)));
                table.push('\n');
            }
            Err(e) => state.report.error(&format!("{}: {}", target, e)),
        }
    }

    page(state, &table)?;
    Ok(Outcome::Continue)
}

/// Pipe text through the session's pager.
fn page(state: &mut ShellState, text: &str) -> Result<()> {
    let pager = state.env_or("PAGER", "less");
    let tmp = tempfile::NamedTempFile::new()?;
    std::fs::write(tmp.path(), text)?;

    // The pager owns the terminal until it exits.
    state.report.quiet = true;
    let status = std::process::Command::new(&pager).arg(tmp.path()).status();
    state.report.quiet = false;

    match status {
        Ok(_) => Ok(()),
        Err(e) => Err(SkiffError::Usage(format!("{}: {}", pager, e))),
    }
}

fn cmd_cd(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.is_empty() {
        let home = state.init_wd(side).to_string();
        state.set_wd(side, home);
        return Ok(Outcome::Continue);
    }
    if args.len() > 1 {
        return Err(SkiffError::Usage("cd takes at most one directory".to_string()));
    }

    let backend = state.backend(side);
    let wd = state.wd(side).to_string();
    let target = resolve_single_dir(backend.as_ref(), &wd, &args[0])?;
    state.set_wd(side, path::clean(&target));
    Ok(Outcome::Continue)
}

fn resolve_single_dir(backend: &dyn Backend, wd: &str, arg: &str) -> Result<String> {
    let patterns = vec![arg.to_string()];
    let matches = matching::find_matches(&patterns, wd, backend, Filter::DirsOnly)?;
    let n = matches.len();
    match matches.into_iter().next() {
        Some(only) if n == 1 => Ok(only),
        Some(_) => Err(SkiffError::Usage(format!(
            "{}: ambiguous ({} matches)",
            arg, n
        ))),
        None => {
            let literal = path::join(wd, arg);
            match backend.stat(&literal) {
                Ok(info) if !info.is_dir() => {
                    Err(SkiffError::Usage(format!("{}: not a directory", arg)))
                }
                _ => Err(SkiffError::NotFound(arg.to_string())),
            }
        }
    }
}

fn cmd_pwd(
    state: &mut ShellState,
    side: Side,
    _args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    println!("{}", state.wd(side));
    Ok(Outcome::Continue)
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

fn cmd_rm(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.is_empty() {
        return Err(SkiffError::Usage("rm needs at least one pattern".to_string()));
    }
    let backend = state.backend(side);
    let wd = state.wd(side).to_string();
    let recursive = flags.contains("r");
    let force = flags.contains("f");

    for arg in args {
        let patterns = vec![arg.clone()];
        let matches = match matching::find_matches(&patterns, &wd, backend.as_ref(), Filter::Any) {
            Ok(m) => m,
            Err(e) => {
                state.report.error(&e.to_string());
                continue;
            }
        };
        if matches.is_empty() {
            state
                .report
                .error(&SkiffError::NotFound(arg.clone()).to_string());
            continue;
        }

        for target in matches {
            let result = remove_one(backend.as_ref(), &target, recursive, force);
            if let Err(e) = result {
                state.report.error(&format!("{}: {}", target, e));
            }
        }
    }
    Ok(Outcome::Continue)
}

fn remove_one(backend: &dyn Backend, target: &str, recursive: bool, force: bool) -> Result<()> {
    let info = backend.lstat(target)?;
    if !info.is_dir() {
        return backend.remove_file(target);
    }
    if !recursive {
        return Err(SkiffError::Usage("is a directory (use -r)".to_string()));
    }
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "  {} Recursively delete {}?",
                style("?").cyan().bold(),
                target
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            return Ok(());
        }
    }
    ops::remove_tree(backend, target)
}

fn cmd_rmdir(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.is_empty() {
        return Err(SkiffError::Usage("rmdir needs at least one pattern".to_string()));
    }
    let backend = state.backend(side);
    let wd = state.wd(side).to_string();

    for arg in args {
        let patterns = vec![arg.clone()];
        let matches =
            match matching::find_matches(&patterns, &wd, backend.as_ref(), Filter::DirsOnly) {
                Ok(m) => m,
                Err(e) => {
                    state.report.error(&e.to_string());
                    continue;
                }
            };
        if matches.is_empty() {
            state
                .report
                .error(&SkiffError::NotFound(arg.clone()).to_string());
            continue;
        }
        for target in matches {
            if let Err(e) = backend.remove_dir(&target) {
                state.report.error(&format!("{}: {}", target, e));
            }
        }
    }
    Ok(Outcome::Continue)
}

fn cmd_mkdir(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.is_empty() {
        return Err(SkiffError::Usage("mkdir needs at least one directory".to_string()));
    }
    let backend = state.backend(side);
    let wd = state.wd(side).to_string();

    for arg in args {
        let target = path::join(&wd, arg);
        if let Err(e) = backend.mkdir(&target) {
            state
                .report
                .error(&format!("mkdir failed for {}: {}", target, e));
        }
    }
    Ok(Outcome::Continue)
}

fn cmd_mkdirall(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.is_empty() {
        return Err(SkiffError::Usage("mkdirall needs at least one directory".to_string()));
    }
    let backend = state.backend(side);
    let wd = state.wd(side).to_string();

    for arg in args {
        let target = path::join(&wd, arg);
        if let Err(e) = ops::mkdir_all(backend.as_ref(), &target) {
            state
                .report
                .error(&format!("mkdir failed for {}: {}", target, e));
        }
    }
    Ok(Outcome::Continue)
}

fn cmd_mv(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    copy_or_move(state, side, args, true)
}

fn cmd_cp(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    copy_or_move(state, side, args, false)
}

fn copy_or_move(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    is_move: bool,
) -> Result<Outcome> {
    let verb = if is_move { "mv" } else { "cp" };
    if args.len() < 2 {
        return Err(SkiffError::Usage(format!("usage: {} SOURCE... DEST", verb)));
    }

    let backend = state.backend(side);
    let wd = state.wd(side).to_string();
    let (sources_args, dest_arg) = args.split_at(args.len() - 1);

    let sources = matching::find_matches(sources_args, &wd, backend.as_ref(), Filter::Any)?;
    if sources.is_empty() {
        return Err(SkiffError::Usage(format!("{}: no source matched", verb)));
    }

    let dest = path::join(&wd, &dest_arg[0]);
    let dest_is_dir = backend.stat(&dest).map(|i| i.is_dir()).unwrap_or(false);
    if sources.len() > 1 && !dest_is_dir {
        return Err(SkiffError::Usage(format!(
            "{}: {} is not a directory",
            verb, dest_arg[0]
        )));
    }

    for src in sources {
        let target = if dest_is_dir {
            path::join(&dest, &path::base(&src))
        } else {
            dest.clone()
        };
        let result = if is_move {
            ops::move_path(backend.as_ref(), &src, &target)
        } else {
            ops::copy_path(backend.as_ref(), &src, &target)
        };
        if let Err(e) = result {
            state.report.error(&format!("{}: {}", src, e));
        }
    }
    Ok(Outcome::Continue)
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

fn cmd_get(
    state: &mut ShellState,
    _side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    let src = state.remote.clone();
    let dst = state.local.clone();
    let src_wd = state.remote_wd.clone();
    let dst_wd = state.local_wd.clone();
    transfer::transfer_batch(
        src.as_ref(),
        &src_wd,
        dst.as_ref(),
        &dst_wd,
        args,
        &mut state.report,
    )?;
    Ok(Outcome::Continue)
}

fn cmd_put(
    state: &mut ShellState,
    _side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    let src = state.local.clone();
    let dst = state.remote.clone();
    let src_wd = state.local_wd.clone();
    let dst_wd = state.remote_wd.clone();
    transfer::transfer_batch(
        src.as_ref(),
        &src_wd,
        dst.as_ref(),
        &dst_wd,
        args,
        &mut state.report,
    )?;
    Ok(Outcome::Continue)
}

// ---------------------------------------------------------------------------
// Editing and viewing
// ---------------------------------------------------------------------------

fn cmd_edit(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.is_empty() {
        return Err(SkiffError::Usage("edit needs at least one file".to_string()));
    }
    let backend = state.backend(side);
    let wd = state.wd(side).to_string();

    // Literal names that do not exist yet are created empty first, so the
    // editor opens them like any other target.
    for missing in matching::non_existing_files(args, &wd, backend.as_ref()) {
        if let Err(e) = ops::touch(backend.as_ref(), &missing) {
            state.report.error(&format!("{}: {}", missing, e));
        }
    }

    let matches = matching::find_matches(args, &wd, backend.as_ref(), Filter::FilesOnly)?;
    if matches.is_empty() {
        return Err(SkiffError::Usage("nothing to edit".to_string()));
    }

    let editor = state.env_or("EDITOR", "vi");

    if side == Side::Local {
        let status = std::process::Command::new(&editor).args(&matches).status()?;
        if !status.success() {
            return Err(SkiffError::Usage(format!("{} exited with failure", editor)));
        }
        return Ok(Outcome::Continue);
    }

    // Remote edit: fetch to scratch space, edit, upload whatever changed.
    let mut staged: Vec<(String, tempfile::TempDir, std::path::PathBuf, Vec<u8>)> = Vec::new();
    for remote_path in matches {
        let scratch = tempfile::tempdir()?;
        let local_path = scratch.path().join(path::base(&remote_path));
        let local_str = local_path
            .to_str()
            .ok_or_else(|| SkiffError::Config("scratch path is not valid UTF-8".to_string()))?
            .to_string();
        copy_between(backend.as_ref(), &remote_path, &LocalBackend, &local_str)?;
        let digest = sha256_file(&local_str)?;
        staged.push((remote_path, scratch, local_path, digest));
    }

    let status = std::process::Command::new(&editor)
        .args(staged.iter().map(|(_, _, p, _)| p.as_os_str()))
        .status()?;
    if !status.success() {
        return Err(SkiffError::Usage(format!("{} exited with failure", editor)));
    }

    for (remote_path, _scratch, local_path, before) in &staged {
        let local_str = local_path.to_str().unwrap_or_default().to_string();
        match sha256_file(&local_str) {
            Ok(after) if &after != before => {
                match copy_between(&LocalBackend, &local_str, backend.as_ref(), remote_path) {
                    Ok(()) => state.report.info(&format!("{} updated", remote_path)),
                    Err(e) => state.report.error(&format!("{}: {}", remote_path, e)),
                }
            }
            Ok(_) => {}
            Err(e) => state.report.error(&format!("{}: {}", local_str, e)),
        }
    }
    Ok(Outcome::Continue)
}

fn cmd_open(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.is_empty() {
        return Err(SkiffError::Usage("open needs at least one file".to_string()));
    }
    let backend = state.backend(side);
    let wd = state.wd(side).to_string();
    let opener = state.env_or("OPENER", "xdg-open");

    let matches = matching::find_matches(args, &wd, backend.as_ref(), Filter::FilesOnly)?;
    if matches.is_empty() {
        return Err(SkiffError::NotFound(args.join(" ")));
    }

    for target in matches {
        let viewable = if side == Side::Local {
            target.clone()
        } else {
            // Each file gets its own scratch directory so name collisions
            // between targets cannot happen. Cleanup waits for session end.
            let scratch = tempfile::tempdir()?;
            let local_path = scratch.path().join(path::base(&target));
            let local_str = local_path
                .to_str()
                .ok_or_else(|| SkiffError::Config("scratch path is not valid UTF-8".to_string()))?
                .to_string();
            copy_between(backend.as_ref(), &target, &LocalBackend, &local_str)?;
            state.tempdirs.push(scratch);
            local_str
        };

        if let Err(e) = std::process::Command::new(&opener).arg(&viewable).spawn() {
            state.report.error(&format!("{}: {}", opener, e));
        }
    }
    Ok(Outcome::Continue)
}

fn cmd_less(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.len() != 1 {
        return Err(SkiffError::Usage("less takes exactly one file".to_string()));
    }
    let backend = state.backend(side);
    let wd = state.wd(side).to_string();

    let patterns = vec![args[0].clone()];
    let matches = matching::find_matches(&patterns, &wd, backend.as_ref(), Filter::FilesOnly)?;
    if matches.len() > 1 {
        return Err(SkiffError::Usage(format!(
            "{}: ambiguous ({} matches)",
            args[0],
            matches.len()
        )));
    }
    let Some(target) = matches.into_iter().next() else {
        return Err(SkiffError::NotFound(args[0].clone()));
    };

    let pager = state.env_or("PAGER", "less");
    let _scratch;
    let viewable = if side == Side::Local {
        target
    } else {
        let scratch = tempfile::tempdir()?;
        let local_path = scratch.path().join(path::base(&target));
        let local_str = local_path
            .to_str()
            .ok_or_else(|| SkiffError::Config("scratch path is not valid UTF-8".to_string()))?
            .to_string();
        copy_between(backend.as_ref(), &target, &LocalBackend, &local_str)?;
        _scratch = scratch;
        local_str
    };

    std::process::Command::new(&pager).arg(&viewable).status()?;
    Ok(Outcome::Continue)
}

fn cmd_browse(
    state: &mut ShellState,
    side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.first().map(String::as_str) == Some("stop") {
        let n = state.browsers.len();
        for browser in &mut state.browsers {
            browser.stop();
        }
        state.browsers.clear();
        state.report.info(&format!("stopped {} server(s)", n));
        return Ok(Outcome::Continue);
    }

    let backend = state.backend(side);
    let wd = state.wd(side).to_string();

    let root = match args.first() {
        Some(arg) => path::clean(&resolve_single_dir(backend.as_ref(), &wd, arg)?),
        None => wd,
    };

    let runtime = state.runtime.clone();
    let server = browse::spawn(&runtime, backend, root.clone())?;
    state
        .report
        .info(&format!("serving {} at {}", root, server.url));
    state.browsers.push(server);
    Ok(Outcome::Continue)
}

// ---------------------------------------------------------------------------
// Session environment and misc
// ---------------------------------------------------------------------------

fn cmd_env(
    state: &mut ShellState,
    _side: Side,
    _args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    for (key, value) in &state.environ {
        println!("{}={}", key, value);
    }
    Ok(Outcome::Continue)
}

fn cmd_set(
    state: &mut ShellState,
    _side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.len() < 2 {
        return Err(SkiffError::Usage("usage: set KEY VALUE".to_string()));
    }
    state
        .environ
        .insert(args[0].clone(), args[1..].join(" "));
    Ok(Outcome::Continue)
}

fn cmd_unset(
    state: &mut ShellState,
    _side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    if args.is_empty() {
        return Err(SkiffError::Usage("usage: unset KEY...".to_string()));
    }
    for key in args {
        state.environ.remove(key);
    }
    Ok(Outcome::Continue)
}

fn cmd_cowsay(
    _state: &mut ShellState,
    _side: Side,
    args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    let text = if args.is_empty() {
        "moo".to_string()
    } else {
        args.join(" ")
    };
    let width = text.chars().count();
    println!(" {}", "_".repeat(width + 2));
    println!("< {} >", text);
    println!(" {}", "-".repeat(width + 2));
    println!("        \\   ^__^");
    println!("         \\  (oo)\\_______");
    println!("            (__)\\       )\\/\\");
    println!("                ||----w |");
    println!("                ||     ||");
    Ok(Outcome::Continue)
}

fn cmd_help(
    state: &mut ShellState,
    _side: Side,
    _args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    println!("commands (l-prefix targets the local side):");
    let mut seen = BTreeSet::new();
    for spec in state.commands.values() {
        if seen.insert(spec.usage) {
            println!("  {}", spec.usage);
        }
    }
    println!("  !CMD runs CMD in the local working directory");
    Ok(Outcome::Continue)
}

fn cmd_exit(
    _state: &mut ShellState,
    _side: Side,
    _args: &[String],
    _flags: &BTreeSet<String>,
) -> Result<Outcome> {
    Ok(Outcome::Exit)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Stream one file between backends, carrying the mode bits along.
fn copy_between(
    src: &dyn Backend,
    src_path: &str,
    dst: &dyn Backend,
    dst_path: &str,
) -> Result<()> {
    let info = src.stat(src_path)?;
    let mut reader = src.open_read(src_path)?;
    let mut writer = dst.create_write(dst_path)?;
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    drop(writer);
    let _ = dst.chmod(dst_path, info.mode);
    Ok(())
}

fn sha256_file(path: &str) -> Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::dispatch;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn test_state(runtime: &tokio::runtime::Runtime) -> (tempfile::TempDir, ShellState) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"c").unwrap();
        std::fs::create_dir(dir.path().join("logs")).unwrap();

        let mut state = ShellState::new(
            Arc::new(LocalBackend),
            Arc::new(LocalBackend),
            root.clone(),
            runtime.handle().clone(),
        )
        .unwrap();
        state.local_wd = root.clone();
        state.init_local_wd = root;
        state.report.quiet = true;
        (dir, state)
    }

    #[test]
    fn test_cd_and_bare_cd_restore() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (_dir, mut state) = test_state(&rt);
        let home = state.remote_wd.clone();

        dispatch(&mut state, "cd logs").unwrap();
        assert_eq!(state.remote_wd, format!("{}/logs", home));

        dispatch(&mut state, "cd").unwrap();
        assert_eq!(state.remote_wd, home);
    }

    #[test]
    fn test_cd_rejects_files() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (_dir, mut state) = test_state(&rt);
        let err = dispatch(&mut state, "cd a.txt").unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_unknown_command_is_reported_not_fatal() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (_dir, mut state) = test_state(&rt);
        let err = dispatch(&mut state, "frobnicate now").unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn test_rm_continues_past_missing_target() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (dir, mut state) = test_state(&rt);

        dispatch(&mut state, "rm a.txt missing.txt c.txt").unwrap();
        assert_eq!(state.report.errors, 1);
        assert!(!dir.path().join("a.txt").exists());
        assert!(!dir.path().join("c.txt").exists());
    }

    #[test]
    fn test_mkdir_reports_existing_path() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (_dir, mut state) = test_state(&rt);

        dispatch(&mut state, "mkdir logs").unwrap();
        assert_eq!(state.report.errors, 1);
    }

    #[test]
    fn test_cp_refuses_existing_directory_destination() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (dir, mut state) = test_state(&rt);
        // a.txt lands inside logs/, then doing it again collides
        dispatch(&mut state, "cp a.txt logs").unwrap();
        assert!(dir.path().join("logs/a.txt").exists());

        dispatch(&mut state, "cp a.txt logs").unwrap();
        assert_eq!(state.report.errors, 1);
    }

    #[test]
    fn test_set_affects_expansion() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (dir, mut state) = test_state(&rt);

        dispatch(&mut state, "set TARGET a.txt").unwrap();
        dispatch(&mut state, "rm $TARGET").unwrap();
        assert_eq!(state.report.errors, 0);
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_less_rejects_ambiguous_pattern() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (_dir, mut state) = test_state(&rt);
        let err = dispatch(&mut state, "less *.txt").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[cfg(unix)]
    #[test]
    fn test_ls_tolerates_dangling_symlink() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (dir, mut state) = test_state(&rt);
        std::os::unix::fs::symlink("nowhere", dir.path().join("dangling")).unwrap();
        dispatch(&mut state, "ls").unwrap();
        assert_eq!(state.report.errors, 0);
    }

    #[test]
    fn test_dispatch_lowercases_command() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (_dir, mut state) = test_state(&rt);
        assert_eq!(dispatch(&mut state, "PWD").unwrap(), Outcome::Continue);
    }

    #[test]
    fn test_exit_synonyms() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (_dir, mut state) = test_state(&rt);
        for line in ["exit", "logout", "q", ":q"] {
            assert_eq!(dispatch(&mut state, line).unwrap(), Outcome::Exit);
        }
    }

    #[test]
    fn test_state_sharing_with_helper_compiles() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (_dir, state) = test_state(&rt);
        let shared = Rc::new(RefCell::new(state));
        let _helper = crate::shell::complete::ShellHelper {
            state: shared.clone(),
        };
        assert!(shared.borrow().commands.contains_key("ls"));
    }
}
