//! Subcommand implementations and the helpers they share.

pub mod cluster;
pub mod command;
pub mod job;
pub mod resolve;
pub mod serve;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use jobgrid_core::JobGridConfig;
use jobgrid_state::{PageRequest, SortDirection, StateStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const DB_FILE: &str = "jobgrid.redb";

/// Everything a subcommand needs: the opened store and the loaded config.
pub struct Context {
    pub state: StateStore,
    pub config: JobGridConfig,
}

impl Context {
    pub fn open(data_dir: &Path, config: Option<&Path>) -> Result<Self> {
        let config = JobGridConfig::load(config)
            .with_context(|| format!("failed to load config {:?}", config))?;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
        let db_path = data_dir.join(DB_FILE);
        let state = StateStore::open(&db_path)?;
        debug!(path = ?db_path, "state store opened");
        Ok(Self { state, config })
    }
}

pub fn print_config(path: Option<&Path>) -> Result<()> {
    let config = JobGridConfig::load(path)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Split a comma-separated tag list, dropping empty entries.
pub fn parse_tags(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Offset, limit, and direction flags shared by every `list` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct PageArgs {
    /// Number of matches to skip.
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
    /// Maximum matches to return. Negative means unbounded. Defaults to
    /// [query].default_limit.
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
    /// Oldest first instead of newest first.
    #[arg(long)]
    pub asc: bool,
}

impl PageArgs {
    pub fn page(&self, config: &JobGridConfig) -> PageRequest {
        let direction = if self.asc {
            SortDirection::Ascending
        } else {
            SortDirection::Descending
        };
        PageRequest::new(self.offset, self.limit.unwrap_or(config.query.default_limit))
            .with_direction(direction)
    }
}

/// Tag set operations, shared by clusters and commands.
#[derive(Subcommand, Debug)]
pub enum TagAction {
    /// Add tags to the existing set
    Add {
        id: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Show the tag set
    Get { id: String },
    /// Replace the tag set
    Set {
        id: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Remove every tag
    Clear { id: String },
    /// Remove a single tag
    Remove { id: String, tag: String },
}

/// Config reference operations, shared by clusters and commands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Add config references to the existing set
    Add {
        id: String,
        #[arg(required = true)]
        configs: Vec<String>,
    },
    /// Show the config references
    Get { id: String },
    /// Replace the config references
    Set {
        id: String,
        #[arg(required = true)]
        configs: Vec<String>,
    },
    /// Remove every config reference
    Clear { id: String },
}
