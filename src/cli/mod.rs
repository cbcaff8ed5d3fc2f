//! Command-line entry points
//!
//! - `serve`: run the HTTP server (default)
//! - `migrate`: apply database migrations and exit

pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

/// Users API - REST service for user accounts
#[derive(Parser)]
#[command(name = "users-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Apply pending database migrations
    Migrate,
}

impl Cli {
    pub fn resolved_command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::parse_from(["users-api"]);
        assert_eq!(cli.resolved_command(), &Command::Serve);
    }

    #[test]
    fn test_migrate_subcommand() {
        let cli = Cli::parse_from(["users-api", "migrate"]);
        assert_eq!(cli.resolved_command(), &Command::Migrate);
    }
}
