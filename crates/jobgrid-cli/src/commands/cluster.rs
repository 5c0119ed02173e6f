//! `jobgrid cluster`: cluster inventory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use jobgrid_registry::ClusterRegistry;
use jobgrid_state::{Cluster, ClusterFilter, ClusterStatus};

use super::{ConfigAction, Context, PageArgs, TagAction, print_json, read_json};

#[derive(Subcommand, Debug)]
pub enum ClusterAction {
    /// Register a cluster from a JSON file
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Show one cluster
    Get { id: String },
    /// List clusters, most recently updated first
    List {
        #[arg(long)]
        name: Option<String>,
        /// Repeatable: UP, OUT_OF_SERVICE, TERMINATED.
        #[arg(long = "status")]
        statuses: Vec<ClusterStatus>,
        /// Repeatable. Clusters must carry every tag given.
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Replace a cluster's fields from a JSON file
    Update {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete one cluster
    Delete { id: String },
    /// Delete every cluster
    DeleteAll,
    /// Manage the cluster's tags
    Tags {
        #[command(subcommand)]
        action: TagAction,
    },
    /// Manage the cluster's config references
    Configs {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage the cluster's ordered command list
    Commands {
        #[command(subcommand)]
        action: CommandListAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CommandListAction {
    /// Append commands to the end of the list
    Add {
        id: String,
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// Show the commands in list order
    Get { id: String },
    /// Replace the whole list
    Set {
        id: String,
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// Detach every command
    Clear { id: String },
    /// Detach one command
    Remove { id: String, command: String },
}

pub fn run(ctx: &Context, action: ClusterAction) -> Result<()> {
    let registry = ClusterRegistry::new(ctx.state.clone());

    match action {
        ClusterAction::Create { file } => {
            let cluster: Cluster = read_json(&file)?;
            print_json(&registry.create(cluster)?)
        }
        ClusterAction::Get { id } => print_json(&registry.get(&id)?),
        ClusterAction::List {
            name,
            statuses,
            tags,
            page,
        } => {
            let filter = ClusterFilter {
                name,
                statuses: statuses.into_iter().collect(),
                tags: tags.into_iter().collect(),
                ..Default::default()
            };
            print_json(&registry.list(&filter, &page.page(&ctx.config))?)
        }
        ClusterAction::Update { id, file } => {
            let patch: Cluster = read_json(&file)?;
            print_json(&registry.update(&id, patch)?)
        }
        ClusterAction::Delete { id } => print_json(&registry.delete(&id)?),
        ClusterAction::DeleteAll => print_json(&registry.delete_all()?),
        ClusterAction::Tags { action } => match action {
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
        ClusterAction::Configs { action } => match action {
            ConfigAction::Add { id, configs } => {
                print_json(&registry.add_configs(&id, configs.into_iter().collect())?)
            }
            ConfigAction::Get { id } => print_json(&registry.get_configs(&id)?),
            ConfigAction::Set { id, configs } => {
                print_json(&registry.update_configs(&id, configs.into_iter().collect())?)
            }
            ConfigAction::Clear { id } => print_json(&registry.remove_all_configs(&id)?),
        },
        ClusterAction::Commands { action } => match action {
            CommandListAction::Add { id, commands } => {
                print_json(&registry.add_commands(&id, &commands)?)
            }
            CommandListAction::Get { id } => print_json(&registry.get_commands(&id)?),
            CommandListAction::Set { id, commands } => {
                print_json(&registry.update_commands(&id, &commands)?)
            }
            CommandListAction::Clear { id } => print_json(&registry.remove_all_commands(&id)?),
            CommandListAction::Remove { id, command } => {
                print_json(&registry.remove_command(&id, &command)?)
            }
        },
    }
}
