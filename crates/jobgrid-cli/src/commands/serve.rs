//! `jobgrid serve`: long-running admission loop.

use std::time::Duration;

use anyhow::Result;
use jobgrid_lifecycle::{Admitter, JobService};
use jobgrid_resolver::Resolver;
use tokio::sync::watch;
use tracing::info;

use super::Context;

pub fn run(ctx: Context, interval: Option<u64>) -> Result<()> {
    let interval = match interval {
        Some(secs) => Duration::from_secs(secs.max(1)),
        None => ctx.config.admission.interval(),
    };
    let host = ctx.config.host.name.clone();

    let jobs = JobService::new(ctx.state.clone(), ctx.config);
    let admitter = Admitter::new(jobs, Resolver::new(ctx.state));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        info!(%host, interval_secs = interval.as_secs(), "jobgrid admission service starting");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            admitter.run(interval, shutdown_rx).await;
        });

        tokio::signal::ctrl_c().await?;
        info!("shutdown signal received");

        // The loop may already have exited and dropped its receiver.
        let _ = shutdown_tx.send(true);
        handle.await?;

        info!("jobgrid admission service stopped");
        Ok::<(), anyhow::Error>(())
    })
}
