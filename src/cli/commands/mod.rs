pub mod exec;
pub mod sftp;

use crate::config::AppConfig;
use crate::creds;
use crate::error::{Result, SkiffError};
use crate::ssh::{self, SshClient};

/// Resolve the destination, build the credential list, connect and
/// authenticate. Shared by every subcommand that talks to a host.
pub async fn connect(
    config: &AppConfig,
    destination: &str,
    port: Option<u16>,
    login: Option<String>,
    identity: Option<String>,
    password: bool,
) -> Result<SshClient> {
    let dest = ssh::parse_destination(destination)
        .ok_or_else(|| SkiffError::Usage(format!("invalid destination: {}", destination)))?;

    let user = login
        .or(dest.user)
        .unwrap_or_else(|| config.login.clone());
    let port = port.unwrap_or(dest.port);
    let methods = creds::auth_methods(config, identity.as_deref(), password)?;

    SshClient::connect(&dest.host, port, &user, &methods).await
}
