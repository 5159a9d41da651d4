//! skyway - management controller for a multi-site VAN fabric.
//!
//! the controller reconciles a relational model of backbones, interior
//! routers, application networks, invitations, and credentials against a
//! certificate authority and the population of live router peers.

use clap::Parser;
use color_eyre::eyre::Result;
use skyway::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(cmd) => cmd.run().await,
        Command::Backbones(cmd) => cmd.run().await,
        Command::Vans(cmd) => cmd.run().await,
        Command::Invitations(cmd) => cmd.run().await,
    }
}
