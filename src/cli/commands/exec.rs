//! The `exec` subcommand: one-shot remote command execution.

use std::io::Write;

use crate::config::AppConfig;
use crate::error::{Result, SkiffError};

pub async fn execute(
    config: &AppConfig,
    destination: &str,
    command: &str,
    login: Option<String>,
    identity: Option<String>,
    password: bool,
) -> Result<()> {
    let client = super::connect(config, destination, None, login, identity, password).await?;

    let output = client.exec(command).await?;
    client.disconnect().await;

    print!("{}", output.stdout);
    if !output.stderr.is_empty() {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{}", output.stderr);
    }

    if !output.success {
        return Err(SkiffError::Ssh(format!(
            "remote command exited with failure: {}",
            command
        )));
    }
    Ok(())
}
