//! `jobgrid resolve`: dry-run criteria resolution.

use anyhow::Result;
use jobgrid_resolver::Resolver;
use jobgrid_state::ClusterCriteria;

use super::{Context, parse_tags, print_json};

pub fn run(ctx: &Context, tiers: &[String], command_criteria: &str) -> Result<()> {
    let tiers: Vec<ClusterCriteria> = tiers
        .iter()
        .map(|raw| ClusterCriteria {
            tags: parse_tags(raw),
        })
        .collect();
    let resolution =
        Resolver::new(ctx.state.clone()).resolve(&tiers, &parse_tags(command_criteria))?;
    print_json(&resolution)
}
