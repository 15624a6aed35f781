//! Same-backend file operations: copy, move, remove, mkdir.
//!
//! Recursive copy is transactional in structure: any failure during the
//! walk tears the partial destination down before the error surfaces.
//! Permission and ownership propagation runs as a second pass and is
//! best-effort only.

use std::io::{self, Write};

use tracing::warn;

use crate::error::{Result, SkiffError};
use crate::shell::backend::{Backend, FileKind};
use crate::shell::path;

/// Removes the destination tree on drop unless disarmed.
struct Rollback<'a> {
    backend: &'a dyn Backend,
    path: &'a str,
    armed: bool,
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = remove_tree(self.backend, self.path) {
            warn!(path = %self.path, "rollback failed: {}", e);
        }
    }
}

/// Copy `src` to `dst` on one backend. The destination must not exist.
///
/// Directories are walked pre-order; files are streamed; symlinks are
/// re-created from their targets, never followed. Ownership and mode bits
/// are replicated after the structural copy succeeds.
pub fn copy_path(backend: &dyn Backend, src: &str, dst: &str) -> Result<()> {
    if backend.stat(dst).is_ok() {
        return Err(SkiffError::Usage(format!(
            "{}: destination already exists",
            dst
        )));
    }

    let info = backend.lstat(src)?;
    match info.kind {
        FileKind::Dir => {
            backend.mkdir(dst)?;
            let mut guard = Rollback {
                backend,
                path: dst,
                armed: true,
            };
            copy_tree(backend, src, dst)?;
            guard.armed = false;
        }
        FileKind::Symlink => {
            let target = backend.read_link(src)?;
            backend.symlink(&target, dst)?;
        }
        _ => {
            copy_file(backend, src, dst)?;
        }
    }

    propagate_attrs(backend, src, dst);
    Ok(())
}

fn copy_tree(backend: &dyn Backend, src: &str, dst: &str) -> Result<()> {
    for entry in backend.read_dir(src)? {
        let s = path::join(src, &entry.name);
        let d = path::join(dst, &entry.name);
        match entry.kind {
            FileKind::Dir => {
                backend.mkdir(&d)?;
                copy_tree(backend, &s, &d)?;
            }
            FileKind::Symlink => {
                let target = backend.read_link(&s)?;
                backend.symlink(&target, &d)?;
            }
            _ => {
                copy_file(backend, &s, &d)?;
            }
        }
    }
    Ok(())
}

fn copy_file(backend: &dyn Backend, src: &str, dst: &str) -> Result<()> {
    let result = stream_file(backend, src, dst);
    if result.is_err() {
        // Close happened when the writer dropped; now take the partial
        // file with us.
        if let Err(e) = backend.remove_file(dst) {
            if !e.is_not_found() {
                warn!(path = %dst, "cleanup of partial file failed: {}", e);
            }
        }
    }
    result
}

fn stream_file(backend: &dyn Backend, src: &str, dst: &str) -> Result<()> {
    let mut reader = backend.open_read(src)?;
    let mut writer = backend.create_write(dst)?;
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Replicate mode bits and ownership from `src` onto `dst`, recursing into
/// directories. Failures are logged and swallowed: structure is the hard
/// requirement, attributes are not.
fn propagate_attrs(backend: &dyn Backend, src: &str, dst: &str) {
    let info = match backend.lstat(src) {
        Ok(info) => info,
        Err(e) => {
            warn!(path = %src, "attribute pass skipped: {}", e);
            return;
        }
    };
    if info.is_symlink() {
        return;
    }

    if let Err(e) = backend.chmod(dst, info.mode) {
        warn!(path = %dst, "chmod failed: {}", e);
    }
    if let (Some(uid), Some(gid)) = (info.uid, info.gid) {
        if let Err(e) = backend.chown(dst, uid, gid) {
            warn!(path = %dst, "chown failed: {}", e);
        }
    }

    if info.is_dir() {
        match backend.read_dir(src) {
            Ok(entries) => {
                for entry in entries {
                    propagate_attrs(
                        backend,
                        &path::join(src, &entry.name),
                        &path::join(dst, &entry.name),
                    );
                }
            }
            Err(e) => warn!(path = %src, "attribute pass skipped: {}", e),
        }
    }
}

/// Move `src` to `dst`: atomic rename first, copy-then-delete on a
/// cross-device error. Any other rename failure propagates untouched.
pub fn move_path(backend: &dyn Backend, src: &str, dst: &str) -> Result<()> {
    if backend.stat(dst).is_ok() {
        return Err(SkiffError::Usage(format!(
            "{}: destination already exists",
            dst
        )));
    }

    match backend.rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.is_cross_device() => {
            copy_path(backend, src, dst)?;
            remove_path(backend, src)
        }
        Err(e) => Err(e),
    }
}

/// Remove a file, symlink, or directory tree.
pub fn remove_path(backend: &dyn Backend, path: &str) -> Result<()> {
    let info = backend.lstat(path)?;
    if info.is_dir() {
        remove_tree(backend, path)
    } else {
        backend.remove_file(path)
    }
}

/// Recursively delete a directory. Entries are classified by the listing's
/// lstat view, so a symlink to a directory is unlinked, not descended into.
pub fn remove_tree(backend: &dyn Backend, path: &str) -> Result<()> {
    for entry in backend.read_dir(path)? {
        let child = path::join(path, &entry.name);
        if entry.kind == FileKind::Dir {
            remove_tree(backend, &child)?;
        } else {
            backend.remove_file(&child)?;
        }
    }
    backend.remove_dir(path)
}

/// Create a directory and any missing parents, like `mkdir -p`.
pub fn mkdir_all(backend: &dyn Backend, path: &str) -> Result<()> {
    let cleaned = path::clean(path);
    if cleaned == "/" {
        return Ok(());
    }

    let mut prefix = String::new();
    for seg in cleaned.trim_start_matches('/').split('/') {
        prefix.push('/');
        prefix.push_str(seg);
        match backend.stat(&prefix) {
            Ok(info) if info.is_dir() => {}
            Ok(_) => {
                return Err(SkiffError::Usage(format!("{}: not a directory", prefix)));
            }
            Err(e) if e.is_not_found() => backend.mkdir(&prefix)?,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Create an empty file.
pub fn touch(backend: &dyn Backend, path: &str) -> Result<()> {
    let mut writer = backend.create_write(path)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::backend::{FileInfo, LocalBackend};
    use std::io::{Read, Write};

    fn fixture() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        std::fs::create_dir_all(dir.path().join("tree/sub")).unwrap();
        std::fs::write(dir.path().join("tree/a.txt"), b"alpha").unwrap();
        std::fs::write(dir.path().join("tree/sub/b.txt"), b"beta").unwrap();
        (dir, root)
    }

    /// Delegates to the local filesystem but fails selected calls, for
    /// exercising rollback and fallback paths.
    struct FaultyBackend {
        fail_create_on: Option<String>,
        rename_cross_device: bool,
    }

    impl Backend for FaultyBackend {
        fn label(&self) -> &'static str {
            "faulty"
        }
        fn stat(&self, path: &str) -> Result<FileInfo> {
            LocalBackend.stat(path)
        }
        fn lstat(&self, path: &str) -> Result<FileInfo> {
            LocalBackend.lstat(path)
        }
        fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>> {
            LocalBackend.read_dir(path)
        }
        fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
            LocalBackend.open_read(path)
        }
        fn create_write(&self, path: &str) -> Result<Box<dyn Write + Send>> {
            if let Some(name) = &self.fail_create_on {
                if path.ends_with(name.as_str()) {
                    return Err(SkiffError::Io(io::Error::other("simulated write failure")));
                }
            }
            LocalBackend.create_write(path)
        }
        fn mkdir(&self, path: &str) -> Result<()> {
            LocalBackend.mkdir(path)
        }
        fn remove_file(&self, path: &str) -> Result<()> {
            LocalBackend.remove_file(path)
        }
        fn remove_dir(&self, path: &str) -> Result<()> {
            LocalBackend.remove_dir(path)
        }
        fn rename(&self, from: &str, to: &str) -> Result<()> {
            if self.rename_cross_device {
                return Err(SkiffError::CrossDevice(format!("{} -> {}", from, to)));
            }
            LocalBackend.rename(from, to)
        }
        fn symlink(&self, target: &str, link: &str) -> Result<()> {
            LocalBackend.symlink(target, link)
        }
        fn read_link(&self, path: &str) -> Result<String> {
            LocalBackend.read_link(path)
        }
        fn chmod(&self, path: &str, mode: u32) -> Result<()> {
            LocalBackend.chmod(path, mode)
        }
        fn chown(&self, path: &str, uid: u32, gid: u32) -> Result<()> {
            LocalBackend.chown(path, uid, gid)
        }
    }

    #[test]
    fn test_copy_tree() {
        let (_dir, root) = fixture();
        let src = format!("{}/tree", root);
        let dst = format!("{}/copy", root);
        copy_path(&LocalBackend, &src, &dst).unwrap();

        let copied = std::fs::read(format!("{}/sub/b.txt", dst)).unwrap();
        assert_eq!(copied, b"beta");
    }

    #[test]
    fn test_copy_refuses_existing_destination() {
        let (_dir, root) = fixture();
        let src = format!("{}/tree", root);
        let dst = format!("{}/tree/sub", root);
        let err = copy_path(&LocalBackend, &src, &dst).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_copy_rollback_removes_partial_tree() {
        let (_dir, root) = fixture();
        let src = format!("{}/tree", root);
        let dst = format!("{}/copy", root);
        let backend = FaultyBackend {
            fail_create_on: Some("b.txt".to_string()),
            rename_cross_device: false,
        };

        assert!(copy_path(&backend, &src, &dst).is_err());
        let stat = LocalBackend.stat(&dst);
        assert!(stat.unwrap_err().is_not_found());
    }

    #[test]
    fn test_move_rename_fast_path() {
        let (_dir, root) = fixture();
        let src = format!("{}/tree/a.txt", root);
        let dst = format!("{}/moved.txt", root);
        move_path(&LocalBackend, &src, &dst).unwrap();
        assert!(LocalBackend.stat(&src).unwrap_err().is_not_found());
        assert_eq!(std::fs::read(&dst).unwrap(), b"alpha");
    }

    #[test]
    fn test_move_cross_device_fallback() {
        let (_dir, root) = fixture();
        let src = format!("{}/tree", root);
        let dst = format!("{}/moved", root);
        let backend = FaultyBackend {
            fail_create_on: None,
            rename_cross_device: true,
        };

        move_path(&backend, &src, &dst).unwrap();
        assert!(LocalBackend.stat(&src).unwrap_err().is_not_found());
        let copied = std::fs::read(format!("{}/sub/b.txt", dst)).unwrap();
        assert_eq!(copied, b"beta");
    }

    #[test]
    fn test_remove_tree() {
        let (_dir, root) = fixture();
        let target = format!("{}/tree", root);
        remove_tree(&LocalBackend, &target).unwrap();
        assert!(LocalBackend.stat(&target).unwrap_err().is_not_found());
    }

    #[test]
    fn test_mkdir_all() {
        let (_dir, root) = fixture();
        let target = format!("{}/x/y/z", root);
        mkdir_all(&LocalBackend, &target).unwrap();
        assert!(LocalBackend.stat(&target).unwrap().is_dir());
        // idempotent
        mkdir_all(&LocalBackend, &target).unwrap();
    }

    #[test]
    fn test_mkdir_all_file_in_the_way() {
        let (_dir, root) = fixture();
        let target = format!("{}/tree/a.txt/deeper", root);
        assert!(mkdir_all(&LocalBackend, &target).is_err());
    }

    #[test]
    fn test_touch() {
        let (_dir, root) = fixture();
        let target = format!("{}/empty.txt", root);
        touch(&LocalBackend, &target).unwrap();
        let info = LocalBackend.stat(&target).unwrap();
        assert!(info.is_file());
        assert_eq!(info.size, 0);
    }
}
