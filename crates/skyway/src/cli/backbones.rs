//! the `backbones` subcommand.

use clap::{Args, Subcommand};
use color_eyre::eyre::Result;

use skyway_db::{SkywayDb, ops};
use skyway_types::{BackboneId, Config};

use crate::admin::Admin;

/// manage backbones.
#[derive(Args, Debug)]
pub struct BackbonesCommand {
    /// database url (sqlite:// or postgres://)
    #[arg(long, env = "SKYWAY_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    action: BackbonesAction,
}

#[derive(Subcommand, Debug)]
enum BackbonesAction {
    /// create a backbone
    Create {
        /// backbone name
        name: String,
        /// mark as the management backbone
        #[arg(long)]
        management: bool,
    },
    /// list backbones
    List,
    /// delete a backbone
    Delete {
        /// backbone id
        id: i64,
    },
}

impl BackbonesCommand {
    /// run the backbones command.
    pub async fn run(self) -> Result<()> {
        let mut config = Config::default();
        config.database = super::database_config(self.database_url)?;
        let db = SkywayDb::new(&config).await?;

        match self.action {
            BackbonesAction::Create { name, management } => {
                let backbone = Admin::new(db).create_backbone(&name, management).await?;
                println!("created backbone {} ({})", backbone.id, backbone.name);
            }
            BackbonesAction::List => {
                for backbone in ops::list_backbones(db.conn()).await? {
                    println!(
                        "{}\t{}\t{}{}",
                        backbone.id,
                        backbone.name,
                        backbone.lifecycle,
                        if backbone.management { "\t(management)" } else { "" },
                    );
                }
            }
            BackbonesAction::Delete { id } => {
                Admin::new(db).delete_backbone(BackboneId(id)).await?;
                println!("deleted backbone {id}");
            }
        }
        Ok(())
    }
}
