//! Filesystem backend abstraction.
//!
//! Every shell algorithm (glob, match resolution, completion, copy/move)
//! runs against this capability set. Two implementations exist per session:
//! the native filesystem and the open SFTP session. The remote backend is a
//! blocking facade: the shell loop lives on a blocking thread and re-enters
//! the runtime through a captured handle for each SFTP call.

use std::io::{self, Read, Write};
use std::sync::Arc;

use russh_sftp::client::SftpSession;
use russh_sftp::protocol::FileAttributes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Handle;

use crate::error::{Result, SkiffError};

/// What a directory entry is, after the backend's own classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
    Symlink,
    Other,
}

/// Stat result, normalized across backends.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: String,
    pub kind: FileKind,
    pub size: u64,
    /// Permission bits only (no file-type bits).
    pub mode: u32,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// Seconds since the epoch.
    pub mtime: Option<i64>,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// The capability set both filesystems satisfy.
///
/// `read_dir` returns entries sorted by name (hidden entries included;
/// callers decide visibility) with lstat-style classification, so symlinks
/// show up as symlinks until a caller re-resolves them via `stat`.
pub trait Backend: Send + Sync {
    fn label(&self) -> &'static str;
    fn stat(&self, path: &str) -> Result<FileInfo>;
    fn lstat(&self, path: &str) -> Result<FileInfo>;
    fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>>;
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>>;
    fn create_write(&self, path: &str) -> Result<Box<dyn Write + Send>>;
    fn mkdir(&self, path: &str) -> Result<()>;
    fn remove_file(&self, path: &str) -> Result<()>;
    fn remove_dir(&self, path: &str) -> Result<()>;
    fn rename(&self, from: &str, to: &str) -> Result<()>;
    fn symlink(&self, target: &str, link: &str) -> Result<()>;
    fn read_link(&self, path: &str) -> Result<String>;
    fn chmod(&self, path: &str, mode: u32) -> Result<()>;
    fn chown(&self, path: &str, uid: u32, gid: u32) -> Result<()>;
}

/// Render permission bits as the conventional `rwxrwxrwx` string.
pub fn format_mode(kind: FileKind, mode: u32) -> String {
    let type_ch = match kind {
        FileKind::Dir => 'd',
        FileKind::Symlink => 'l',
        FileKind::File => '-',
        FileKind::Other => '?',
    };
    let mut out = String::with_capacity(10);
    out.push(type_ch);
    let flags = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    for (bit, ch) in &flags {
        out.push(if mode & bit != 0 { *ch } else { '-' });
    }
    out
}

// ---------------------------------------------------------------------------
// Local backend
// ---------------------------------------------------------------------------

/// Native filesystem backend.
pub struct LocalBackend;

impl LocalBackend {
    fn info_from_metadata(name: String, meta: &std::fs::Metadata) -> FileInfo {
        let kind = if meta.file_type().is_symlink() {
            FileKind::Symlink
        } else if meta.is_dir() {
            FileKind::Dir
        } else if meta.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        };

        #[cfg(unix)]
        let (mode, uid, gid) = {
            use std::os::unix::fs::MetadataExt;
            (meta.mode() & 0o7777, Some(meta.uid()), Some(meta.gid()))
        };
        #[cfg(not(unix))]
        let (mode, uid, gid) = (0o644u32, None, None);

        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);

        FileInfo {
            name,
            kind,
            size: meta.len(),
            mode,
            uid,
            gid,
            mtime,
        }
    }

    fn wrap(path: &str, e: io::Error) -> SkiffError {
        if e.kind() == io::ErrorKind::NotFound {
            SkiffError::NotFound(path.to_string())
        } else {
            SkiffError::Io(e)
        }
    }
}

#[cfg(unix)]
fn is_exdev(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_exdev(_e: &io::Error) -> bool {
    false
}

impl Backend for LocalBackend {
    fn label(&self) -> &'static str {
        "local"
    }

    fn stat(&self, path: &str) -> Result<FileInfo> {
        let meta = std::fs::metadata(path).map_err(|e| Self::wrap(path, e))?;
        Ok(Self::info_from_metadata(crate::shell::path::base(path), &meta))
    }

    fn lstat(&self, path: &str) -> Result<FileInfo> {
        let meta = std::fs::symlink_metadata(path).map_err(|e| Self::wrap(path, e))?;
        Ok(Self::info_from_metadata(crate::shell::path::base(path), &meta))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path).map_err(|e| Self::wrap(path, e))? {
            let entry = entry.map_err(|e| Self::wrap(path, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let meta = entry.path().symlink_metadata().map_err(|e| Self::wrap(path, e))?;
            entries.push(Self::info_from_metadata(name, &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let file = std::fs::File::open(path).map_err(|e| Self::wrap(path, e))?;
        Ok(Box::new(file))
    }

    fn create_write(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        let file = std::fs::File::create(path).map_err(|e| Self::wrap(path, e))?;
        Ok(Box::new(file))
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        std::fs::create_dir(path).map_err(|e| Self::wrap(path, e))
    }

    fn remove_file(&self, path: &str) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| Self::wrap(path, e))
    }

    fn remove_dir(&self, path: &str) -> Result<()> {
        std::fs::remove_dir(path).map_err(|e| Self::wrap(path, e))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        std::fs::rename(from, to).map_err(|e| {
            if is_exdev(&e) {
                SkiffError::CrossDevice(format!("{} -> {}", from, to))
            } else {
                Self::wrap(from, e)
            }
        })
    }

    fn symlink(&self, target: &str, link: &str) -> Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link).map_err(|e| Self::wrap(link, e))
        }
        #[cfg(not(unix))]
        {
            let _ = (target, link);
            Err(SkiffError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "symlinks not supported on this platform",
            )))
        }
    }

    fn read_link(&self, path: &str) -> Result<String> {
        let target = std::fs::read_link(path).map_err(|e| Self::wrap(path, e))?;
        Ok(target.to_string_lossy().to_string())
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .map_err(|e| Self::wrap(path, e))
        }
        #[cfg(not(unix))]
        {
            let _ = (path, mode);
            Ok(())
        }
    }

    fn chown(&self, path: &str, uid: u32, gid: u32) -> Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::chown(path, Some(uid), Some(gid)).map_err(|e| Self::wrap(path, e))
        }
        #[cfg(not(unix))]
        {
            let _ = (path, uid, gid);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Remote backend
// ---------------------------------------------------------------------------

/// SFTP-session backend: a blocking facade over russh-sftp.
pub struct RemoteBackend {
    handle: Handle,
    sftp: Arc<SftpSession>,
}

impl RemoteBackend {
    pub fn new(handle: Handle, sftp: Arc<SftpSession>) -> Self {
        Self { handle, sftp }
    }

    fn info_from_attrs(name: String, attrs: &FileAttributes) -> FileInfo {
        let kind = if attrs.is_symlink() {
            FileKind::Symlink
        } else if attrs.is_dir() {
            FileKind::Dir
        } else if attrs.is_regular() {
            FileKind::File
        } else {
            FileKind::Other
        };

        FileInfo {
            name,
            kind,
            size: attrs.size.unwrap_or(0),
            mode: attrs.permissions.unwrap_or(0) & 0o7777,
            uid: attrs.uid,
            gid: attrs.gid,
            mtime: attrs.mtime.map(|t| t as i64),
        }
    }

    /// Classify an SFTP error by its message; the protocol error type does
    /// not distinguish not-found from other failures for us.
    fn wrap(path: &str, e: russh_sftp::client::error::Error) -> SkiffError {
        let msg = e.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("no such file") || lower.contains("not found") {
            SkiffError::NotFound(path.to_string())
        } else {
            SkiffError::Sftp(format!("{}: {}", path, msg))
        }
    }
}

impl Backend for RemoteBackend {
    fn label(&self) -> &'static str {
        "remote"
    }

    fn stat(&self, path: &str) -> Result<FileInfo> {
        let attrs = self
            .handle
            .block_on(self.sftp.metadata(path))
            .map_err(|e| Self::wrap(path, e))?;
        Ok(Self::info_from_attrs(crate::shell::path::base(path), &attrs))
    }

    fn lstat(&self, path: &str) -> Result<FileInfo> {
        let attrs = self
            .handle
            .block_on(self.sftp.symlink_metadata(path))
            .map_err(|e| Self::wrap(path, e))?;
        Ok(Self::info_from_attrs(crate::shell::path::base(path), &attrs))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>> {
        let dir = self
            .handle
            .block_on(self.sftp.read_dir(path))
            .map_err(|e| Self::wrap(path, e))?;

        let mut entries = Vec::new();
        for entry in dir {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            entries.push(Self::info_from_attrs(name, &entry.metadata()));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let file = self
            .handle
            .block_on(self.sftp.open(path))
            .map_err(|e| Self::wrap(path, e))?;
        Ok(Box::new(RemoteFile {
            handle: self.handle.clone(),
            file: Some(file),
        }))
    }

    fn create_write(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        let file = self
            .handle
            .block_on(self.sftp.create(path))
            .map_err(|e| Self::wrap(path, e))?;
        Ok(Box::new(RemoteFile {
            handle: self.handle.clone(),
            file: Some(file),
        }))
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        self.handle
            .block_on(self.sftp.create_dir(path))
            .map_err(|e| Self::wrap(path, e))
    }

    fn remove_file(&self, path: &str) -> Result<()> {
        self.handle
            .block_on(self.sftp.remove_file(path))
            .map_err(|e| Self::wrap(path, e))
    }

    fn remove_dir(&self, path: &str) -> Result<()> {
        self.handle
            .block_on(self.sftp.remove_dir(path))
            .map_err(|e| Self::wrap(path, e))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.handle
            .block_on(self.sftp.rename(from, to))
            .map_err(|e| {
                // SFTP has no EXDEV: servers answer a cross-filesystem
                // rename with the generic failure status.
                let lower = e.to_string().to_lowercase();
                if lower.contains("failure") {
                    SkiffError::CrossDevice(format!("{} -> {}", from, to))
                } else {
                    Self::wrap(from, e)
                }
            })
    }

    fn symlink(&self, target: &str, link: &str) -> Result<()> {
        self.handle
            .block_on(self.sftp.symlink(link, target))
            .map_err(|e| Self::wrap(link, e))
    }

    fn read_link(&self, path: &str) -> Result<String> {
        self.handle
            .block_on(self.sftp.read_link(path))
            .map_err(|e| Self::wrap(path, e))
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        let attrs = FileAttributes {
            permissions: Some(mode),
            ..Default::default()
        };
        self.handle
            .block_on(self.sftp.set_metadata(path, attrs))
            .map_err(|e| Self::wrap(path, e))
    }

    fn chown(&self, path: &str, uid: u32, gid: u32) -> Result<()> {
        let attrs = FileAttributes {
            uid: Some(uid),
            gid: Some(gid),
            ..Default::default()
        };
        self.handle
            .block_on(self.sftp.set_metadata(path, attrs))
            .map_err(|e| Self::wrap(path, e))
    }
}

/// Blocking Read/Write adapter over an open SFTP file.
struct RemoteFile {
    handle: Handle,
    file: Option<russh_sftp::client::fs::File>,
}

impl Read for RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "file closed"))?;
        self.handle.block_on(file.read(buf))
    }
}

impl Write for RemoteFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "file closed"))?;
        self.handle.block_on(file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "file closed"))?;
        self.handle.block_on(file.flush())
    }
}

impl Drop for RemoteFile {
    fn drop(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = self.handle.block_on(file.shutdown());
        }
    }
}
