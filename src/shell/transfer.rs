//! Cross-backend transfer: the engine behind `get` and `put`.
//!
//! Sources come from glob resolution, or from an interactive multi-select
//! when no arguments were given. Transfers are sequential and best-effort:
//! a failed entry is reported and the batch moves on.

use std::io::{Read, Write};

use console::style;
use dialoguer::MultiSelect;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::error::Result;
use crate::shell::backend::Backend;
use crate::shell::matching::{self, Filter};
use crate::shell::path;
use crate::shell::Report;

const CHUNK: usize = 32 * 1024;

/// Transfer every source matched by `patterns` from one backend's working
/// directory into the other's. With no patterns, the user picks sources
/// interactively. Per-source failures are reported and skipped.
pub fn transfer_batch(
    src: &dyn Backend,
    src_wd: &str,
    dst: &dyn Backend,
    dst_wd: &str,
    patterns: &[String],
    report: &mut Report,
) -> Result<()> {
    let sources: Vec<String> = if patterns.is_empty() {
        pick_sources(src, src_wd)?
            .into_iter()
            .map(|rel| path::join(src_wd, &rel))
            .collect()
    } else {
        matching::find_matches(patterns, src_wd, src, Filter::Any)?
            .into_iter()
            .collect()
    };

    if sources.is_empty() {
        report.info("nothing to transfer");
        return Ok(());
    }

    for source in sources {
        let target = path::join(dst_wd, &path::base(&source));
        transfer_path(src, &source, dst, &target, report);
    }
    Ok(())
}

/// Interactive source selection, seeded by a recursive listing of `wd`
/// with hidden entries pruned. Returns paths relative to `wd`.
fn pick_sources(backend: &dyn Backend, wd: &str) -> Result<Vec<String>> {
    let mut items = Vec::new();
    collect_visible(backend, wd, "", &mut items);
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let picked = MultiSelect::new()
        .with_prompt(format!(
            "  {} Select sources (space to toggle, enter to confirm)",
            style("?").cyan().bold()
        ))
        .items(&items)
        .interact()?;

    Ok(picked.into_iter().map(|i| items[i].clone()).collect())
}

fn collect_visible(backend: &dyn Backend, wd: &str, prefix: &str, out: &mut Vec<String>) {
    let dir = path::join(wd, &format!("{}.", prefix));
    let entries = match backend.read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir, "listing failed: {}", e);
            return;
        }
    };

    for entry in entries {
        if entry.name.starts_with('.') {
            continue;
        }
        let rel = format!("{}{}", prefix, entry.name);
        if entry.is_dir() {
            out.push(format!("{}/", rel));
            collect_visible(backend, wd, &format!("{}/", rel), out);
        } else {
            out.push(rel);
        }
    }
}

/// Transfer one path, recursing into directories. Errors are reported, not
/// propagated, so siblings still get their turn.
fn transfer_path(
    src: &dyn Backend,
    src_path: &str,
    dst: &dyn Backend,
    dst_path: &str,
    report: &mut Report,
) {
    let info = match src.lstat(src_path) {
        Ok(info) => info,
        Err(e) => {
            report.error(&format!("{}: {}", src_path, e));
            return;
        }
    };

    if info.is_dir() {
        match dst.stat(dst_path) {
            Ok(existing) if existing.is_dir() => {}
            Ok(_) => {
                report.error(&format!("{}: destination exists and is not a directory", dst_path));
                return;
            }
            Err(e) if e.is_not_found() => {
                if let Err(e) = dst.mkdir(dst_path) {
                    report.error(&format!("{}: {}", dst_path, e));
                    return;
                }
            }
            Err(e) => {
                report.error(&format!("{}: {}", dst_path, e));
                return;
            }
        }

        let entries = match src.read_dir(src_path) {
            Ok(entries) => entries,
            Err(e) => {
                report.error(&format!("{}: {}", src_path, e));
                return;
            }
        };
        for entry in entries {
            transfer_path(
                src,
                &path::join(src_path, &entry.name),
                dst,
                &path::join(dst_path, &entry.name),
                report,
            );
        }
        return;
    }

    if info.is_symlink() {
        let result = src
            .read_link(src_path)
            .and_then(|target| dst.symlink(&target, dst_path));
        if let Err(e) = result {
            report.error(&format!("{}: {}", src_path, e));
        }
        return;
    }

    if let Err(e) = transfer_file(src, src_path, dst, dst_path, info.size, info.mode) {
        report.error(&format!("{}: {}", src_path, e));
    }
}

fn transfer_file(
    src: &dyn Backend,
    src_path: &str,
    dst: &dyn Backend,
    dst_path: &str,
    size: u64,
    mode: u32,
) -> Result<()> {
    let mut reader = src.open_read(src_path)?;
    let mut writer = dst.create_write(dst_path)?;

    let pb = ProgressBar::new(size);
    pb.set_style(
        ProgressStyle::with_template("{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes}")
            .unwrap()
            .progress_chars("=> "),
    );
    pb.set_message(path::base(src_path));

    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        pb.inc(n as u64);
    }
    writer.flush()?;
    drop(writer);
    pb.finish_and_clear();

    // Mode bits travel with the file; ownership never does across backends.
    if let Err(e) = dst.chmod(dst_path, mode) {
        warn!(path = %dst_path, "chmod failed: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::backend::LocalBackend;

    fn fixture() -> (tempfile::TempDir, String, String) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::create_dir_all(src.join("logs")).unwrap();
        std::fs::create_dir(&dst).unwrap();
        std::fs::write(src.join("a.log"), b"aaa").unwrap();
        std::fs::write(src.join("b.log"), b"bbb").unwrap();
        std::fs::write(src.join("c.log"), b"ccc").unwrap();
        std::fs::write(src.join("logs").join("inner.log"), b"inner").unwrap();
        (
            dir,
            src.to_str().unwrap().to_string(),
            dst.to_str().unwrap().to_string(),
        )
    }

    #[test]
    fn test_transfer_glob_batch() {
        let (_dir, src_wd, dst_wd) = fixture();
        let mut report = Report::default();
        transfer_batch(
            &LocalBackend,
            &src_wd,
            &LocalBackend,
            &dst_wd,
            &["?.log".to_string()],
            &mut report,
        )
        .unwrap();

        assert_eq!(report.errors, 0);
        assert_eq!(std::fs::read(format!("{}/a.log", dst_wd)).unwrap(), b"aaa");
        assert_eq!(std::fs::read(format!("{}/c.log", dst_wd)).unwrap(), b"ccc");
    }

    #[test]
    fn test_transfer_recurses_directories() {
        let (_dir, src_wd, dst_wd) = fixture();
        let mut report = Report::default();
        transfer_batch(
            &LocalBackend,
            &src_wd,
            &LocalBackend,
            &dst_wd,
            &["logs".to_string()],
            &mut report,
        )
        .unwrap();

        assert_eq!(report.errors, 0);
        let inner = std::fs::read(format!("{}/logs/inner.log", dst_wd)).unwrap();
        assert_eq!(inner, b"inner");
    }

    #[test]
    fn test_transfer_continues_after_failure() {
        let (_dir, src_wd, dst_wd) = fixture();
        // A directory squatting on b.log's destination makes that one
        // transfer fail while the others proceed.
        std::fs::create_dir(format!("{}/b.log", dst_wd)).unwrap();

        let mut report = Report::default();
        report.quiet = true;
        transfer_batch(
            &LocalBackend,
            &src_wd,
            &LocalBackend,
            &dst_wd,
            &["?.log".to_string()],
            &mut report,
        )
        .unwrap();

        assert_eq!(report.errors, 1);
        assert_eq!(std::fs::read(format!("{}/a.log", dst_wd)).unwrap(), b"aaa");
        assert_eq!(std::fs::read(format!("{}/c.log", dst_wd)).unwrap(), b"ccc");
    }
}
