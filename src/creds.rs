//! Credential provider boundary.
//!
//! Produces the ordered list of authentication methods to try for a login.
//! The transport layer walks the list in order and fails fast when the list
//! is empty. Short-lived certificate issuance would plug in here; the
//! current provider enumerates agent, key file, and prompted password.

use std::path::PathBuf;

use crate::config::AppConfig;
use crate::error::{Result, SkiffError};

/// One usable authentication method, in the order it should be attempted.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Every identity currently held by the SSH agent.
    Agent,

    /// A private key file on disk.
    KeyFile { path: PathBuf },

    /// Interactive password prompt at connect time.
    Password,
}

/// Assemble the method list for a login.
///
/// `identity` overrides the configured key path when given. An explicit
/// `--password` skips straight to the prompt.
pub fn auth_methods(
    config: &AppConfig,
    identity: Option<&str>,
    password_only: bool,
) -> Result<Vec<AuthMethod>> {
    if password_only {
        return Ok(vec![AuthMethod::Password]);
    }

    let mut methods = Vec::new();

    if std::env::var("SSH_AUTH_SOCK").is_ok() {
        methods.push(AuthMethod::Agent);
    }

    let key_path = identity
        .map(|p| shellexpand::tilde(p).to_string())
        .unwrap_or_else(|| config.identity_file.clone());
    let key_path = PathBuf::from(key_path);
    if key_path.exists() {
        methods.push(AuthMethod::KeyFile { path: key_path });
    }

    if config.password_fallback {
        methods.push(AuthMethod::Password);
    }

    if methods.is_empty() {
        return Err(SkiffError::Ssh(
            "no usable authentication method: no agent, no key file, password disabled"
                .to_string(),
        ));
    }

    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_only_short_circuits() {
        let config = AppConfig::default();
        let methods = auth_methods(&config, None, true).unwrap();
        assert_eq!(methods.len(), 1);
        assert!(matches!(methods[0], AuthMethod::Password));
    }

    #[test]
    fn test_password_fallback_always_present() {
        let config = AppConfig::default();
        let methods = auth_methods(&config, Some("/nonexistent/key"), false).unwrap();
        assert!(methods
            .iter()
            .any(|m| matches!(m, AuthMethod::Password)));
    }
}
