//! SFTP subsystem handle.
//!
//! Opens the SFTP channel on an authenticated session. The shell's remote
//! backend wraps the returned session behind a blocking facade.

use std::sync::Arc;

use russh::client::Handle;
use russh_sftp::client::SftpSession;

use crate::error::{Result, SkiffError};
use crate::ssh::client::ClientHandler;

/// An open SFTP session plus its server-side starting directory.
pub struct SftpHandle {
    pub session: Arc<SftpSession>,
    pub initial_dir: String,
}

impl SftpHandle {
    /// Open the SFTP subsystem on a new channel.
    pub async fn new(ssh_session: &Handle<ClientHandler>) -> Result<Self> {
        let channel = ssh_session
            .channel_open_session()
            .await
            .map_err(|e| SkiffError::Ssh(format!("Failed to open SFTP channel: {}", e)))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| SkiffError::Ssh(format!("Failed to request SFTP subsystem: {}", e)))?;

        let session = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SkiffError::Ssh(format!("Failed to initialize SFTP: {}", e)))?;

        let initial_dir = session
            .canonicalize(".")
            .await
            .map_err(|e| SkiffError::Sftp(format!("Failed to resolve remote home: {}", e)))?;

        Ok(Self {
            session: Arc::new(session),
            initial_dir,
        })
    }
}
