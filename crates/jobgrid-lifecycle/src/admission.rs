//! Admitter: places INIT jobs onto clusters.
//!
//! Admission resolves a job's criteria against the inventory and records
//! the outcome on the job:
//! - a match attaches cluster and command info and moves the job to RUNNING
//! - no match moves the job to FAILED with the resolver's diagnostic
//!
//! The placement write re-checks the stored status, so a job killed while
//! it was being resolved stays KILLED.

use std::time::Duration;

use jobgrid_resolver::{ResolveError, Resolution, Resolver};
use jobgrid_state::{Job, JobQuery, JobStatus, PageRequest};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::job_service::JobService;
use crate::transition::check_transition;

/// Shortest period the admission loop will tick at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one [`Admitter::admit_pending`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionReport {
    pub admitted: Vec<String>,
    pub failed: Vec<String>,
    /// Jobs skipped because of a storage error or a concurrent transition.
    pub skipped: Vec<String>,
}

impl AdmissionReport {
    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty() && self.failed.is_empty() && self.skipped.is_empty()
    }
}

#[derive(Clone)]
pub struct Admitter {
    jobs: JobService,
    resolver: Resolver,
}

impl Admitter {
    pub fn new(jobs: JobService, resolver: Resolver) -> Self {
        Self { jobs, resolver }
    }

    /// Resolve one INIT job and start it.
    ///
    /// On `NoMatchingResource` the job is marked FAILED and the resolution
    /// error is returned.
    pub fn admit(&self, id: &str) -> LifecycleResult<Job> {
        let job = self.jobs.get_job(id)?;
        check_transition(id, job.status, JobStatus::Running)?;

        match self.resolver.resolve(&job.cluster_criterias, &job.command_criteria) {
            Ok(resolution) => self.place(id, &resolution),
            Err(ResolveError::NoMatchingResource(reason)) => {
                let message = format!("No cluster/command combination found: {reason}");
                self.jobs.set_job_status(id, JobStatus::Failed, Some(&message))?;
                warn!(%id, %reason, "job admission failed");
                Err(ResolveError::NoMatchingResource(reason).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn place(&self, id: &str, resolution: &Resolution) -> LifecycleResult<Job> {
        let job = self.jobs.update(id, |job| {
            check_transition(id, job.status, JobStatus::Running)?;
            job.execution_cluster_id = Some(resolution.cluster_id.clone());
            job.execution_cluster_name = Some(resolution.cluster_name.clone());
            job.command_id = Some(resolution.command_id.clone());
            job.command_name = Some(resolution.command_name.clone());
            job.status = JobStatus::Running;
            job.status_msg = Some(format!(
                "Job placed on cluster {} running command {}",
                resolution.cluster_name, resolution.command_name
            ));
            Ok(())
        })?;

        info!(
            %id,
            cluster = %resolution.cluster_id,
            command = %resolution.command_id,
            tier = resolution.tier,
            "job admitted"
        );
        Ok(job)
    }

    /// Admit every INIT job that has no cluster yet, oldest first.
    pub fn admit_pending(&self) -> LifecycleResult<AdmissionReport> {
        let query = JobQuery {
            statuses: [JobStatus::Init].into_iter().collect(),
            ..Default::default()
        };
        let page = PageRequest::unbounded().ascending();
        let pending: Vec<Job> = self
            .jobs
            .get_jobs(&query, &page, &["created"])?
            .into_iter()
            .filter(|job| job.execution_cluster_id.is_none())
            .collect();

        let mut report = AdmissionReport::default();
        for job in pending {
            match self.admit(&job.id) {
                Ok(_) => report.admitted.push(job.id),
                Err(LifecycleError::Resolve(ResolveError::NoMatchingResource(_))) => {
                    report.failed.push(job.id)
                }
                Err(e) => {
                    warn!(id = %job.id, error = %e, "job skipped during admission");
                    report.skipped.push(job.id);
                }
            }
        }

        if !report.is_empty() {
            info!(
                admitted = report.admitted.len(),
                failed = report.failed.len(),
                skipped = report.skipped.len(),
                "admission pass complete"
            );
        }
        Ok(report)
    }

    /// Run admission passes every `interval` until `shutdown` fires.
    ///
    /// A zero `interval` is raised to [`MIN_INTERVAL`].
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let interval = interval.max(MIN_INTERVAL);
        info!(interval_ms = interval.as_millis() as u64, "admission loop started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.admit_pending() {
                        Ok(report) => debug!(?report, "admission tick"),
                        Err(e) => error!(error = %e, "admission pass failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("admission loop shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobgrid_core::JobGridConfig;
    use jobgrid_state::{Cluster, ClusterCriteria, ClusterStatus, Command, StateStore};

    fn setup() -> (StateStore, Admitter) {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put(
                &Command::new("pig_13_prod", "tgianos", "0.13")
                    .with_id("command1")
                    .with_tags(["type:pig"]),
            )
            .unwrap();
        store
            .put(
                &Cluster::new("h2prod", "tgianos", "2.4.0")
                    .with_id("cluster1")
                    .with_tags(["sched:sla", "type:yarn"])
                    .with_commands(["command1"]),
            )
            .unwrap();

        let jobs = JobService::new(store.clone(), JobGridConfig::default());
        let admitter = Admitter::new(jobs, Resolver::new(store.clone()));
        (store, admitter)
    }

    fn submit(admitter: &Admitter, tier: &[&str], command: &str) -> Job {
        let job = Job::new(
            "tgianos",
            "testPigJob",
            "2.4",
            "-f -j",
            [command.to_string()].into_iter().collect(),
            vec![ClusterCriteria::new(tier.iter().copied())],
        );
        admitter.jobs.create_job(job).unwrap()
    }

    #[test]
    fn admit_places_and_starts_job() {
        let (_, admitter) = setup();
        let job = submit(&admitter, &["sched:sla"], "type:pig");

        let admitted = admitter.admit(&job.id).unwrap();
        assert_eq!(admitted.status, JobStatus::Running);
        assert_eq!(admitted.execution_cluster_id.as_deref(), Some("cluster1"));
        assert_eq!(admitted.execution_cluster_name.as_deref(), Some("h2prod"));
        assert_eq!(admitted.command_name.as_deref(), Some("pig_13_prod"));
        assert!(admitted.status_msg.unwrap().contains("h2prod"));
    }

    #[test]
    fn admit_without_match_fails_job() {
        let (_, admitter) = setup();
        let job = submit(&admitter, &["sched:adhoc"], "type:pig");

        let err = admitter.admit(&job.id).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Resolve(ResolveError::NoMatchingResource(_))
        ));

        let failed = admitter.jobs.get_job(&job.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.execution_cluster_id.is_none());
        assert!(failed.status_msg.is_some());
    }

    #[test]
    fn admit_rejects_non_init_jobs() {
        let (_, admitter) = setup();
        let job = submit(&admitter, &["sched:sla"], "type:pig");
        admitter.jobs.kill_job(&job.id, None).unwrap();

        assert!(matches!(
            admitter.admit(&job.id),
            Err(LifecycleError::IllegalTransition { from: JobStatus::Killed, .. })
        ));
    }

    #[test]
    fn admit_pending_handles_every_init_job() {
        let (store, admitter) = setup();
        let good = submit(&admitter, &["type:yarn"], "type:pig");
        let bad = submit(&admitter, &["type:yarn"], "type:spark");
        let done = submit(&admitter, &["type:yarn"], "type:pig");
        admitter.jobs.kill_job(&done.id, None).unwrap();

        let report = admitter.admit_pending().unwrap();
        assert_eq!(report.admitted, vec![good.id.clone()]);
        assert_eq!(report.failed, vec![bad.id.clone()]);
        assert!(report.skipped.is_empty());

        // A second pass has nothing left to do.
        assert!(admitter.admit_pending().unwrap().is_empty());

        // Taking the cluster out of service does not affect running jobs.
        let mut cluster: Cluster = store.get("cluster1").unwrap().unwrap();
        cluster.status = ClusterStatus::OutOfService;
        store.put(&cluster).unwrap();
        assert_eq!(admitter.jobs.get_job_status(&good.id).unwrap(), JobStatus::Running);
    }

    #[tokio::test]
    async fn run_admits_until_shutdown() {
        let (_, admitter) = setup();
        let job = submit(&admitter, &["sched:sla"], "type:pig");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let admitter = admitter.clone();
            tokio::spawn(async move {
                admitter.run(Duration::from_millis(10), shutdown_rx).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(admitter.jobs.get_job_status(&job.id).unwrap(), JobStatus::Running);
    }

    #[tokio::test]
    async fn run_with_zero_interval_still_ticks() {
        let (_, admitter) = setup();
        let job = submit(&admitter, &["sched:sla"], "type:pig");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let admitter = admitter.clone();
            tokio::spawn(async move {
                admitter.run(Duration::ZERO, shutdown_rx).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(admitter.jobs.get_job_status(&job.id).unwrap(), JobStatus::Running);
    }
}
