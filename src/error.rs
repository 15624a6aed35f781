use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkiffError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SSH connection error: {0}")]
    Ssh(String),

    #[error("SFTP error: {0}")]
    Sftp(String),

    #[error("{0}: no such file or directory")]
    NotFound(String),

    #[error("{0}: cross-device rename")]
    CrossDevice(String),

    #[error("syntax error: {0}")]
    Parse(String),

    #[error("bad glob pattern: {0}")]
    BadPattern(String),

    #[error("{0}")]
    Usage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH protocol error: {0}")]
    SshProtocol(#[from] russh::Error),

    #[error("Dialog error: {0}")]
    Dialog(#[from] dialoguer::Error),

    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SkiffError {
    /// True when the error means "the path does not exist" on either backend.
    pub fn is_not_found(&self) -> bool {
        match self {
            SkiffError::NotFound(_) => true,
            SkiffError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// True when a rename failed because source and destination live on
    /// different underlying filesystems.
    pub fn is_cross_device(&self) -> bool {
        matches!(self, SkiffError::CrossDevice(_))
    }
}

pub type Result<T> = std::result::Result<T, SkiffError>;
