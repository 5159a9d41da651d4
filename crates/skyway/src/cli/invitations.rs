//! the `invitations` subcommand.

use clap::{Args, Subcommand};
use color_eyre::eyre::Result;

use skyway_db::{SkywayDb, ops};
use skyway_types::{AccessPointId, Config, InvitationId, VanId};

use crate::admin::Admin;

/// manage member invitations.
#[derive(Args, Debug)]
pub struct InvitationsCommand {
    /// database url (sqlite:// or postgres://)
    #[arg(long, env = "SKYWAY_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    action: InvitationsAction,
}

#[derive(Subcommand, Debug)]
enum InvitationsAction {
    /// create an invitation
    Create {
        /// application network id
        van: i64,
        /// invitation name
        name: String,
        /// claim access point id
        #[arg(long)]
        claim_access: i64,
        /// member access point ids, highest priority first
        #[arg(long = "member-access", required = true)]
        member_access: Vec<i64>,
        /// maximum redeemable instances
        #[arg(long)]
        instance_limit: Option<i64>,
        /// member site classes
        #[arg(long = "class")]
        classes: Vec<String>,
        /// member name prefix for unnamed claims
        #[arg(long)]
        name_prefix: Option<String>,
    },
    /// list a network's invitations
    List {
        /// application network id
        van: i64,
    },
    /// delete an invitation
    Delete {
        /// invitation id
        id: i64,
    },
}

impl InvitationsCommand {
    /// run the invitations command.
    pub async fn run(self) -> Result<()> {
        let mut config = Config::default();
        config.database = super::database_config(self.database_url)?;
        let db = SkywayDb::new(&config).await?;

        match self.action {
            InvitationsAction::Create {
                van,
                name,
                claim_access,
                member_access,
                instance_limit,
                classes,
                name_prefix,
            } => {
                let member_access: Vec<(AccessPointId, i64)> = member_access
                    .into_iter()
                    .enumerate()
                    .map(|(priority, id)| (AccessPointId(id), priority as i64))
                    .collect();
                let (invitation, edges) = Admin::new(db)
                    .create_invitation(
                        VanId(van),
                        &name,
                        AccessPointId(claim_access),
                        &member_access,
                        None,
                        classes,
                        instance_limit,
                        name_prefix,
                    )
                    .await?;
                println!(
                    "created invitation {} with {} edge links\nclaim token: {}",
                    invitation.id,
                    edges.len(),
                    invitation.claim_token,
                );
            }
            InvitationsAction::List { van } => {
                for invitation in ops::list_invitations(db.conn(), VanId(van)).await? {
                    println!(
                        "{}\t{}\t{}\t{}/{}",
                        invitation.id,
                        invitation.name,
                        invitation.lifecycle,
                        invitation.instance_count,
                        invitation
                            .instance_limit
                            .map(|l| l.to_string())
                            .unwrap_or_else(|| "∞".to_string()),
                    );
                }
            }
            InvitationsAction::Delete { id } => {
                Admin::new(db).delete_invitation(InvitationId(id)).await?;
                println!("deleted invitation {id}");
            }
        }
        Ok(())
    }
}
