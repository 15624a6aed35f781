//! SSH client implementation using russh.
//!
//! Walks the credential provider's method list in order until one succeeds.

use std::net::ToSocketAddrs;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::Disconnect;
use tokio::net::UnixStream;
use tokio::sync::Mutex;

use crate::creds::AuthMethod;
use crate::error::{Result, SkiffError};
use crate::ssh::exec::CommandOutput;
use crate::ssh::sftp::SftpHandle;

/// SSH client wrapper over russh.
#[derive(Clone)]
pub struct SshClient {
    session: Arc<Mutex<Handle<ClientHandler>>>,
    host: String,
}

impl SshClient {
    /// Connect to an SSH server and authenticate.
    pub async fn connect(host: &str, port: u16, user: &str, methods: &[AuthMethod]) -> Result<Self> {
        let russh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(std::time::Duration::from_secs(15)),
            keepalive_max: 4,
            ..Default::default()
        });

        let addr = format!("{}:{}", host, port)
            .to_socket_addrs()
            .map_err(|e| SkiffError::Ssh(format!("Failed to resolve {}: {}", host, e)))?
            .next()
            .ok_or_else(|| SkiffError::Ssh(format!("No address found for {}", host)))?;

        let mut session = client::connect(russh_config, addr, ClientHandler)
            .await
            .map_err(|e| SkiffError::Ssh(format!("Connection failed: {}", e)))?;

        Self::authenticate(&mut session, user, methods).await?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            host: host.to_string(),
        })
    }

    /// Try each authentication method in order.
    async fn authenticate(
        session: &mut Handle<ClientHandler>,
        user: &str,
        methods: &[AuthMethod],
    ) -> Result<()> {
        for method in methods {
            match method {
                AuthMethod::Agent => match Self::auth_with_agent(session, user).await {
                    Ok(true) => return Ok(()),
                    Ok(false) => {
                        tracing::debug!("Agent authentication: server rejected all keys");
                    }
                    Err(e) => {
                        tracing::debug!("Agent authentication failed: {}", e);
                    }
                },
                AuthMethod::KeyFile { path } => {
                    match Self::auth_with_key_file(session, user, path).await {
                        Ok(true) => return Ok(()),
                        Ok(false) => {
                            tracing::debug!("Server rejected key {}", path.display());
                        }
                        Err(e) => {
                            tracing::debug!("Key file authentication failed: {}", e);
                        }
                    }
                }
                AuthMethod::Password => {
                    let password = dialoguer::Password::new()
                        .with_prompt(format!("{}'s password", user))
                        .interact()?;
                    let ok = session
                        .authenticate_password(user, &password)
                        .await
                        .map_err(|e| SkiffError::Ssh(format!("Password auth failed: {}", e)))?;
                    if ok {
                        return Ok(());
                    }
                    tracing::debug!("Server rejected password");
                }
            }
        }

        Err(SkiffError::Ssh(
            "authentication failed: server rejected every offered method".to_string(),
        ))
    }

    /// Authenticate using the SSH agent.
    async fn auth_with_agent(session: &mut Handle<ClientHandler>, user: &str) -> Result<bool> {
        let socket_path = std::env::var("SSH_AUTH_SOCK")
            .map_err(|_| SkiffError::Ssh("SSH_AUTH_SOCK not set".to_string()))?;

        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| SkiffError::Ssh(format!("Failed to connect to agent: {}", e)))?;

        let mut agent = russh_keys::agent::client::AgentClient::connect(stream);

        let identities = agent
            .request_identities()
            .await
            .map_err(|e| SkiffError::Ssh(format!("Failed to get agent identities: {}", e)))?;

        tracing::debug!("Agent has {} identities", identities.len());

        for identity in identities {
            let auth_result = session
                .authenticate_publickey_with(user, identity, &mut agent)
                .await;

            match auth_result {
                Ok(true) => return Ok(true),
                Ok(false) => continue,
                Err(e) => {
                    tracing::debug!("Agent auth error: {}", e);
                    continue;
                }
            }
        }

        Ok(false)
    }

    /// Authenticate using a key file on disk.
    async fn auth_with_key_file(
        session: &mut Handle<ClientHandler>,
        user: &str,
        path: &std::path::Path,
    ) -> Result<bool> {
        let key = russh_keys::load_secret_key(path, None)
            .map_err(|e| SkiffError::Ssh(format!("Failed to load key: {}", e)))?;

        let ok = session
            .authenticate_publickey(user, Arc::new(key))
            .await
            .map_err(|e| SkiffError::Ssh(format!("Authentication failed: {}", e)))?;

        Ok(ok)
    }

    /// Execute a command on the remote host (non-interactive).
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let session = self.session.lock().await;
        crate::ssh::exec::exec_command(&session, command).await
    }

    /// Open the SFTP subsystem.
    pub async fn sftp(&self) -> Result<SftpHandle> {
        let session = self.session.lock().await;
        SftpHandle::new(&session).await
    }

    /// Close the connection. In-flight channel operations observe a
    /// transport error once this completes.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await;
        let _ = session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;
        tracing::debug!("Disconnected from {}", self.host);
    }
}

/// Client handler for russh connection callbacks.
pub struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = SkiffError;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        // StrictHostKeyChecking=no equivalent; pinning lives above this layer.
        Ok(true)
    }
}
