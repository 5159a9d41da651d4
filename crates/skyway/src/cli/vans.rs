//! the `vans` subcommand.

use clap::{Args, Subcommand};
use color_eyre::eyre::Result;

use skyway_db::{SkywayDb, ops};
use skyway_types::{BackboneId, Config, VanId};

use crate::admin::Admin;

/// manage application networks.
#[derive(Args, Debug)]
pub struct VansCommand {
    /// database url (sqlite:// or postgres://)
    #[arg(long, env = "SKYWAY_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    action: VansAction,
}

#[derive(Subcommand, Debug)]
enum VansAction {
    /// create an application network on a backbone
    Create {
        /// backbone id
        backbone: i64,
        /// network name
        name: String,
    },
    /// list a backbone's application networks
    List {
        /// backbone id
        backbone: i64,
    },
    /// delete an application network
    Delete {
        /// network id
        id: i64,
    },
}

impl VansCommand {
    /// run the vans command.
    pub async fn run(self) -> Result<()> {
        let mut config = Config::default();
        config.database = super::database_config(self.database_url)?;
        let db = SkywayDb::new(&config).await?;

        match self.action {
            VansAction::Create { backbone, name } => {
                let van = Admin::new(db).create_van(BackboneId(backbone), &name).await?;
                println!("created network {} ({}) van-id {}", van.id, van.name, van.van_id);
            }
            VansAction::List { backbone } => {
                for van in ops::list_vans(db.conn(), BackboneId(backbone)).await? {
                    println!("{}\t{}\t{}\t{}", van.id, van.name, van.van_id, van.lifecycle);
                }
            }
            VansAction::Delete { id } => {
                Admin::new(db).delete_van(VanId(id)).await?;
                println!("deleted network {id}");
            }
        }
        Ok(())
    }
}
