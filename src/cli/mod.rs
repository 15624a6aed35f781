pub mod commands;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(version)]
#[command(about = "Interactive SFTP shell with a local and a remote side")]
#[command(
    long_about = "Connects over SSH and drops into a dual-filesystem shell.\n\nEvery command has an l-prefixed twin: `ls` lists the remote directory, `lls` the local one."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect and start the interactive shell
    Sftp {
        /// Destination as [user@]host[:port]
        destination: String,

        /// Port (overrides the destination suffix)
        #[arg(short, long)]
        port: Option<u16>,

        /// Login name (overrides destination and config)
        #[arg(short, long)]
        login: Option<String>,

        /// Identity file for public-key authentication
        #[arg(short, long)]
        identity: Option<String>,

        /// Skip keys and agent, prompt for a password
        #[arg(long)]
        password: bool,
    },

    /// Execute a single command on the remote host
    Exec {
        /// Destination as [user@]host[:port]
        destination: String,

        /// Command to execute
        command: String,

        /// Login name (overrides destination and config)
        #[arg(short, long)]
        login: Option<String>,

        /// Identity file for public-key authentication
        #[arg(short, long)]
        identity: Option<String>,

        /// Skip keys and agent, prompt for a password
        #[arg(long)]
        password: bool,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Sftp {
                destination,
                port,
                login,
                identity,
                password,
            } => {
                let config = AppConfig::load()?;
                commands::sftp::execute(&config, &destination, port, login, identity, password)
                    .await
            }
            Commands::Exec {
                destination,
                command,
                login,
                identity,
                password,
            } => {
                let config = AppConfig::load()?;
                commands::exec::execute(&config, &destination, &command, login, identity, password)
                    .await
            }
        }
    }
}
