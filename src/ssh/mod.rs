//! SSH transport: connection, authentication, exec channel, SFTP subsystem.

pub mod client;
pub mod exec;
pub mod sftp;

pub use client::SshClient;

/// Parsed `[user@]host[:port]` destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub user: Option<String>,
    pub host: String,
    pub port: u16,
}

/// Parse a destination string. Port defaults to 22.
pub fn parse_destination(input: &str) -> Option<Destination> {
    let (user, rest) = match input.split_once('@') {
        Some((u, r)) => {
            if u.is_empty() {
                return None;
            }
            (Some(u.to_string()), r)
        }
        None => (None, input),
    };

    let (host, port) = match rest.rsplit_once(':') {
        Some((h, p)) => (h, p.parse::<u16>().ok()?),
        None => (rest, 22),
    };

    if host.is_empty() {
        return None;
    }

    Some(Destination {
        user,
        host: host.to_string(),
        port,
    })
}
