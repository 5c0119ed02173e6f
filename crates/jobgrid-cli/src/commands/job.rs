//! `jobgrid job`: job submission, queries, and status changes.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use jobgrid_lifecycle::{Admitter, JobService};
use jobgrid_resolver::Resolver;
use jobgrid_state::{Job, JobQuery, JobStatus};
use serde::Serialize;

use super::{Context, PageArgs, print_json, read_json};

#[derive(Subcommand, Debug)]
pub enum JobAction {
    /// Submit a job from a JSON file. The job starts in INIT.
    Submit {
        #[arg(short, long)]
        file: PathBuf,
        /// Admit the job right away instead of waiting for `serve`.
        #[arg(long)]
        admit: bool,
    },
    /// Show one job
    Get { id: String },
    /// Query jobs
    List {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        user: Option<String>,
        /// Repeatable: INIT, RUNNING, SUCCEEDED, FAILED, KILLED.
        #[arg(long = "status")]
        statuses: Vec<JobStatus>,
        /// Repeatable. Jobs must carry every tag given.
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        cluster_name: Option<String>,
        #[arg(long)]
        cluster_id: Option<String>,
        #[arg(long)]
        command_name: Option<String>,
        #[arg(long)]
        command_id: Option<String>,
        /// Sort fields: id, created, updated, name, user, version, status,
        /// cluster_name, command_name. Unknown names are ignored.
        #[arg(long = "order-by", value_delimiter = ',')]
        order_by: Vec<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show a job's status, or change it with --set
    Status {
        id: String,
        #[arg(long)]
        set: Option<JobStatus>,
        /// Status message. Omitting it clears the previous message.
        #[arg(long)]
        message: Option<String>,
    },
    /// Kill an INIT or RUNNING job
    Kill {
        id: String,
        #[arg(long)]
        message: Option<String>,
    },
    /// Resolve and start one job, or every pending job when no id is given
    Admit { id: Option<String> },
    /// Record the launched process id
    Pid { id: String, pid: i32 },
    /// Record the application the job runs
    Application {
        id: String,
        application_id: String,
        application_name: String,
    },
    /// Bump the job's update time
    Touch { id: String },
}

#[derive(Serialize)]
struct StatusView<'a> {
    id: &'a str,
    status: JobStatus,
}

pub fn run(ctx: &Context, action: JobAction) -> Result<()> {
    let jobs = JobService::new(ctx.state.clone(), ctx.config.clone());

    match action {
        JobAction::Submit { file, admit } => {
            let job: Job = read_json(&file)?;
            let created = jobs.create_job(job)?;
            if admit {
                let admitter = Admitter::new(jobs, Resolver::new(ctx.state.clone()));
                print_json(&admitter.admit(&created.id)?)
            } else {
                print_json(&created)
            }
        }
        JobAction::Get { id } => print_json(&jobs.get_job(&id)?),
        JobAction::List {
            id,
            name,
            user,
            statuses,
            tags,
            cluster_name,
            cluster_id,
            command_name,
            command_id,
            order_by,
            page,
        } => {
            let query = JobQuery {
                id,
                name,
                user,
                statuses: statuses.into_iter().collect(),
                tags: tags.into_iter().collect(),
                cluster_name,
                cluster_id,
                command_name,
                command_id,
            };
            print_json(&jobs.get_jobs(&query, &page.page(&ctx.config), order_by.as_slice())?)
        }
        JobAction::Status { id, set, message } => match set {
            Some(status) => print_json(&jobs.set_job_status(&id, status, message.as_deref())?),
            None => {
                let status = jobs.get_job_status(&id)?;
                print_json(&StatusView { id: &id, status })
            }
        },
        JobAction::Kill { id, message } => print_json(&jobs.kill_job(&id, message.as_deref())?),
        JobAction::Admit { id } => {
            let admitter = Admitter::new(jobs, Resolver::new(ctx.state.clone()));
            match id {
                Some(id) => print_json(&admitter.admit(&id)?),
                None => {
                    let report = admitter.admit_pending()?;
                    print_json(&serde_json::json!({
                        "admitted": report.admitted,
                        "failed": report.failed,
                        "skipped": report.skipped,
                    }))
                }
            }
        }
        JobAction::Pid { id, pid } => print_json(&jobs.set_process_id_for_job(&id, pid)?),
        JobAction::Application {
            id,
            application_id,
            application_name,
        } => print_json(&jobs.set_application_info_for_job(
            &id,
            &application_id,
            &application_name,
        )?),
        JobAction::Touch { id } => {
            let updated_at = jobs.set_update_time(&id)?;
            print_json(&serde_json::json!({ "id": id, "updated_at": updated_at }))
        }
    }
}
