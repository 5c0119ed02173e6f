//! `jobgrid command`: command inventory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use jobgrid_registry::CommandRegistry;
use jobgrid_state::{ClusterStatus, Command, CommandFilter};

use super::{ConfigAction, Context, PageArgs, TagAction, print_json, read_json};

#[derive(Subcommand, Debug)]
pub enum CommandAction {
    /// Register a command from a JSON file
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Show one command
    Get { id: String },
    /// List commands, most recently updated first
    List {
        #[arg(long)]
        name: Option<String>,
        /// Repeatable. Commands must carry every tag given.
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Replace a command's fields from a JSON file
    Update {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete a command and detach it from every cluster
    Delete { id: String },
    /// Delete every command
    DeleteAll,
    /// Manage the command's tags
    Tags {
        #[command(subcommand)]
        action: TagAction,
    },
    /// Manage the command's config references
    Configs {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List the clusters that offer a command
    Clusters {
        id: String,
        /// Repeatable. Only clusters in one of these statuses.
        #[arg(long = "status")]
        statuses: Vec<ClusterStatus>,
    },
}

pub fn run(ctx: &Context, action: CommandAction) -> Result<()> {
    let registry = CommandRegistry::new(ctx.state.clone());

    match action {
        CommandAction::Create { file } => {
            let command: Command = read_json(&file)?;
            print_json(&registry.create(command)?)
        }
        CommandAction::Get { id } => print_json(&registry.get(&id)?),
        CommandAction::List { name, tags, page } => {
            let filter = CommandFilter {
                name,
                tags: tags.into_iter().collect(),
                ..Default::default()
            };
            print_json(&registry.list(&filter, &page.page(&ctx.config))?)
        }
        CommandAction::Update { id, file } => {
            let patch: Command = read_json(&file)?;
            print_json(&registry.update(&id, patch)?)
        }
        CommandAction::Delete { id } => print_json(&registry.delete(&id)?),
        CommandAction::DeleteAll => print_json(&registry.delete_all()?),
        CommandAction::Tags { action } => match action {
            TagAction::Add { id, tags } => {
                print_json(&registry.add_tags(&id, tags.into_iter().collect())?)
            }
            TagAction::Get { id } => print_json(&registry.get_tags(&id)?),
            TagAction::Set { id, tags } => {
                print_json(&registry.update_tags(&id, tags.into_iter().collect())?)
            }
            TagAction::Clear { id } => print_json(&registry.remove_all_tags(&id)?),
            TagAction::Remove { id, tag } => print_json(&registry.remove_tag(&id, &tag)?),
        },
        CommandAction::Configs { action } => match action {
            ConfigAction::Add { id, configs } => {
                print_json(&registry.add_configs(&id, configs.into_iter().collect())?)
            }
            ConfigAction::Get { id } => print_json(&registry.get_configs(&id)?),
            ConfigAction::Set { id, configs } => {
                print_json(&registry.update_configs(&id, configs.into_iter().collect())?)
            }
            ConfigAction::Clear { id } => print_json(&registry.remove_all_configs(&id)?),
        },
        CommandAction::Clusters { id, statuses } => {
            let statuses = statuses.into_iter().collect();
            print_json(&registry.clusters_for_command(&id, &statuses)?)
        }
    }
}
