//! command-line interface.

mod backbones;
mod invitations;
mod serve;
mod vans;

pub use backbones::BackbonesCommand;
pub use invitations::InvitationsCommand;
pub use serve::ServeCommand;
pub use vans::VansCommand;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, bail};

use skyway_types::DatabaseConfig;

/// skyway - VAN fabric management controller.
#[derive(Parser, Debug)]
#[command(name = "skyway", version, about)]
pub struct Cli {
    /// the subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// run the management controller.
    Serve(ServeCommand),
    /// manage backbones.
    Backbones(BackbonesCommand),
    /// manage application networks.
    Vans(VansCommand),
    /// manage member invitations.
    Invitations(InvitationsCommand),
}

/// parse a `sqlite://` or `postgres://` database url into config.
pub(crate) fn database_config(url: Option<String>) -> Result<DatabaseConfig> {
    let Some(url) = url else {
        return Ok(DatabaseConfig::default());
    };
    if url.starts_with("postgres://") {
        Ok(DatabaseConfig {
            db_type: "postgres".to_string(),
            connection_string: url,
        })
    } else if let Some(path) = url.strip_prefix("sqlite://") {
        Ok(DatabaseConfig {
            db_type: "sqlite".to_string(),
            connection_string: path.to_string(),
        })
    } else {
        bail!("database URL must start with sqlite:// or postgres://");
    }
}
