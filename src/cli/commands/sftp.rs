//! The `sftp` subcommand: connect, open SFTP, run the interactive loop.
//!
//! The loop itself is synchronous and lives on a blocking thread; remote
//! filesystem calls re-enter the runtime through the captured handle. A
//! SIGTERM watcher closes the connection, which any in-flight remote call
//! observes as a transport error.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{Result, SkiffError};
use crate::shell::backend::{LocalBackend, RemoteBackend};
use crate::shell::{self, ShellState};

pub async fn execute(
    config: &AppConfig,
    destination: &str,
    port: Option<u16>,
    login: Option<String>,
    identity: Option<String>,
    password: bool,
) -> Result<()> {
    let client = super::connect(config, destination, port, login, identity, password).await?;
    let sftp = client.sftp().await?;
    info!("connected, remote directory {}", sftp.initial_dir);

    let handle = Handle::current();
    let local = Arc::new(LocalBackend);
    let remote = Arc::new(RemoteBackend::new(handle.clone(), sftp.session.clone()));
    let remote_wd = sftp.initial_dir.clone();

    let watcher = {
        let client = client.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                let mut term = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(term) => term,
                    Err(e) => {
                        debug!("signal watcher unavailable: {}", e);
                        return;
                    }
                };
                term.recv().await;
                client.disconnect().await;
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
                client.disconnect().await;
            }
        })
    };

    let result = tokio::task::spawn_blocking(move || -> Result<()> {
        let state = ShellState::new(local, remote, remote_wd, handle)?;
        shell::run(Rc::new(RefCell::new(state)))
    })
    .await
    .map_err(|e| SkiffError::Ssh(format!("shell task failed: {}", e)))?;

    watcher.abort();
    client.disconnect().await;
    result
}
