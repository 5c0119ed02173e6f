//! JobService: persistence and status management for job records.
//!
//! Every mutation loads, checks, and writes the job inside one write
//! transaction. redb admits a single writer at a time, so a status change
//! is a compare-and-set against the status stored at commit time: when two
//! callers race, the loser observes the winner's status and is rejected.

use std::collections::BTreeSet;

use jobgrid_core::JobGridConfig;
use jobgrid_state::{
    Job, JobQuery, JobSortField, JobStatus, PageRequest, StateStore, UNSET_PROCESS_HANDLE,
    WriteTxn, epoch_millis, next_stamp,
};
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::transition::check_transition;

/// Status message attached to every freshly created job.
pub const INIT_MESSAGE: &str = "Job accepted and in initialization phase.";

/// Status message used by [`JobService::kill_job`] when the caller gives none.
pub const KILL_MESSAGE: &str = "Job killed on user request.";

/// Job record service.
#[derive(Clone)]
pub struct JobService {
    state: StateStore,
    config: JobGridConfig,
}

impl JobService {
    pub fn new(state: StateStore, config: JobGridConfig) -> Self {
        Self { state, config }
    }

    /// Persist a new job in INIT. Does not resolve it.
    pub fn create_job(&self, mut job: Job) -> LifecycleResult<Job> {
        validate_new_job(&job)?;
        if job.id.trim().is_empty() {
            job.id = uuid::Uuid::new_v4().to_string();
        }

        job.status = JobStatus::Init;
        job.status_msg = Some(INIT_MESSAGE.to_string());
        job.execution_cluster_id = None;
        job.execution_cluster_name = None;
        job.command_id = None;
        job.command_name = None;
        job.application_id = None;
        job.application_name = None;
        job.process_handle = UNSET_PROCESS_HANDLE;
        job.host_name = self.config.host.name.clone();
        job.output_uri = self.config.output_uri(&job.id);
        job.kill_uri = self.config.kill_uri(&job.id);
        job.command_criteria_string = job.joined_command_criteria();
        let criteria_tags = job.criteria_tags();
        job.tags.extend(criteria_tags);

        let job = self.state.write(|tx| -> LifecycleResult<Job> {
            if tx.contains::<Job>(&job.id)? {
                return Err(LifecycleError::Conflict(job.id.clone()));
            }
            let now = epoch_millis();
            job.created_at = now;
            job.updated_at = now;
            tx.put(&job)?;
            Ok(job)
        })?;

        info!(id = %job.id, user = %job.user, name = %job.name, "job created");
        Ok(job)
    }

    pub fn get_job(&self, id: &str) -> LifecycleResult<Job> {
        require_id(id)?;
        self.state
            .get::<Job>(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    /// Query jobs. `order_by` names outside the sortable set are skipped;
    /// when none remain, jobs are ordered by update time.
    pub fn get_jobs<S: AsRef<str>>(
        &self,
        query: &JobQuery,
        page: &PageRequest,
        order_by: &[S],
    ) -> LifecycleResult<Vec<Job>> {
        let order = JobSortField::resolve(order_by);
        let jobs = self.state.read(|tx| tx.find_jobs(query, &order, page))?;
        debug!(count = jobs.len(), ?order, "jobs queried");
        Ok(jobs)
    }

    pub fn get_job_status(&self, id: &str) -> LifecycleResult<JobStatus> {
        Ok(self.get_job(id)?.status)
    }

    /// Move a job to `status`, replacing its status message. A `None`
    /// message clears any earlier one.
    pub fn set_job_status(
        &self,
        id: &str,
        status: JobStatus,
        message: Option<&str>,
    ) -> LifecycleResult<Job> {
        require_id(id)?;
        let result = self.update(id, |job| {
            check_transition(id, job.status, status)?;
            job.status = status;
            job.status_msg = message.map(str::to_string);
            Ok(())
        });

        match &result {
            Ok(job) => info!(%id, status = %job.status, "job status changed"),
            Err(LifecycleError::IllegalTransition { from, to, .. }) => {
                warn!(%id, %from, %to, "job status change rejected")
            }
            Err(_) => {}
        }
        result
    }

    /// Touch the job's update time and return the new stamp.
    pub fn set_update_time(&self, id: &str) -> LifecycleResult<u64> {
        require_id(id)?;
        let job = self.update(id, |_| Ok(()))?;
        Ok(job.updated_at)
    }

    pub fn set_process_id_for_job(&self, id: &str, pid: i32) -> LifecycleResult<Job> {
        require_id(id)?;
        self.update(id, |job| {
            job.process_handle = pid;
            Ok(())
        })
    }

    pub fn set_command_info_for_job(
        &self,
        id: &str,
        command_id: &str,
        command_name: &str,
    ) -> LifecycleResult<Job> {
        require_id(id)?;
        self.update(id, |job| {
            job.command_id = Some(command_id.to_string());
            job.command_name = Some(command_name.to_string());
            Ok(())
        })
    }

    pub fn set_application_info_for_job(
        &self,
        id: &str,
        application_id: &str,
        application_name: &str,
    ) -> LifecycleResult<Job> {
        require_id(id)?;
        self.update(id, |job| {
            job.application_id = Some(application_id.to_string());
            job.application_name = Some(application_name.to_string());
            Ok(())
        })
    }

    pub fn set_cluster_info_for_job(
        &self,
        id: &str,
        cluster_id: &str,
        cluster_name: &str,
    ) -> LifecycleResult<Job> {
        require_id(id)?;
        self.update(id, |job| {
            job.execution_cluster_id = Some(cluster_id.to_string());
            job.execution_cluster_name = Some(cluster_name.to_string());
            Ok(())
        })
    }

    /// Kill an INIT or RUNNING job.
    pub fn kill_job(&self, id: &str, message: Option<&str>) -> LifecycleResult<Job> {
        self.set_job_status(id, JobStatus::Killed, Some(message.unwrap_or(KILL_MESSAGE)))
    }

    /// Load a job, apply `f`, touch its update time, and store it, all in
    /// one write transaction. Nothing is written if `f` fails.
    pub(crate) fn update<F>(&self, id: &str, f: F) -> LifecycleResult<Job>
    where
        F: FnOnce(&mut Job) -> LifecycleResult<()>,
    {
        self.state.write(|tx| -> LifecycleResult<Job> {
            let mut job = load(tx, id)?;
            f(&mut job)?;
            job.updated_at = next_stamp(job.updated_at);
            tx.put(&job)?;
            Ok(job)
        })
    }
}

fn load(tx: &WriteTxn, id: &str) -> LifecycleResult<Job> {
    tx.get::<Job>(id)?
        .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
}

fn require_id(id: &str) -> LifecycleResult<()> {
    if id.trim().is_empty() {
        return Err(LifecycleError::InvalidArgument(
            "no job id entered, unable to continue".to_string(),
        ));
    }
    Ok(())
}

fn require_field(field: &str, value: &str) -> LifecycleResult<()> {
    if value.trim().is_empty() {
        return Err(LifecycleError::InvalidArgument(format!("job {field} is required")));
    }
    Ok(())
}

fn require_tags(label: &str, tags: &BTreeSet<String>) -> LifecycleResult<()> {
    if tags.is_empty() || tags.iter().any(|t| t.trim().is_empty()) {
        return Err(LifecycleError::InvalidArgument(format!(
            "{label} must contain at least one non-blank tag"
        )));
    }
    Ok(())
}

fn validate_new_job(job: &Job) -> LifecycleResult<()> {
    require_field("user", &job.user)?;
    require_field("name", &job.name)?;
    require_field("version", &job.version)?;
    require_tags("command criteria", &job.command_criteria)?;
    if job.cluster_criterias.is_empty() {
        return Err(LifecycleError::InvalidArgument(
            "at least one cluster criteria is required".to_string(),
        ));
    }
    for (index, tier) in job.cluster_criterias.iter().enumerate() {
        require_tags(&format!("cluster criteria {index}"), &tier.tags)?;
    }
    Ok(())
}
