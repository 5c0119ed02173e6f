//! Domain types for the JobGrid entity store.
//!
//! These types represent the persisted state of clusters, commands, and
//! jobs. All types are serializable to/from JSON for storage in redb tables.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Unique identifier for a cluster.
pub type ClusterId = String;

/// Unique identifier for a command.
pub type CommandId = String;

/// Unique identifier for a job.
pub type JobId = String;

/// Process handle value meaning "no process launched yet".
pub const UNSET_PROCESS_HANDLE: i32 = -1;

// ── Cluster ───────────────────────────────────────────────────────

/// Operational status of a cluster. Only `Up` clusters receive jobs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterStatus {
    #[default]
    Up,
    OutOfService,
    Terminated,
}

/// An execution cluster and its inventory associations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cluster {
    /// Blank until the registry assigns one.
    #[serde(default)]
    pub id: ClusterId,
    pub name: String,
    pub user: String,
    pub version: String,
    #[serde(default)]
    pub status: ClusterStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Configuration file references (paths or URIs).
    #[serde(default)]
    pub configs: BTreeSet<String>,
    /// Ordered command references. Position is the command tie-break
    /// during resolution, so this is a list and never a set.
    #[serde(default)]
    pub commands: Vec<CommandId>,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub created_at: u64,
    /// Unix epoch milliseconds, strictly increasing per mutation.
    #[serde(default)]
    pub updated_at: u64,
}

impl Cluster {
    pub fn new(name: &str, user: &str, version: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            user: user.to_string(),
            version: version.to_string(),
            status: ClusterStatus::Up,
            tags: BTreeSet::new(),
            configs: BTreeSet::new(),
            commands: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_status(mut self, status: ClusterStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }
}

// ── Command ───────────────────────────────────────────────────────

/// A command that can run on any cluster listing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Command {
    #[serde(default)]
    pub id: CommandId,
    pub name: String,
    pub user: String,
    pub version: String,
    /// Executable path or launcher invoked by the process collaborator.
    #[serde(default)]
    pub executable: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub configs: BTreeSet<String>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

impl Command {
    pub fn new(name: &str, user: &str, version: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            user: user.to_string(),
            version: version.to_string(),
            executable: String::new(),
            tags: BTreeSet::new(),
            configs: BTreeSet::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_executable(mut self, executable: &str) -> Self {
        self.executable = executable.to_string();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

// ── Job ───────────────────────────────────────────────────────────

/// Lifecycle status of a job.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Init,
    Running,
    Succeeded,
    Failed,
    Killed,
}

impl JobStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Killed)
    }
}

/// One tier of a job's cluster criteria: the tags a cluster must carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterCriteria {
    pub tags: BTreeSet<String>,
}

impl ClusterCriteria {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// A submitted job and everything attached to it during its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    /// Caller-supplied or generated on creation; never changes afterwards.
    #[serde(default)]
    pub id: JobId,
    pub user: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub command_args: String,
    pub command_criteria: BTreeSet<String>,
    /// Comma-joined `command_criteria`, kept for equality lookups.
    #[serde(default)]
    pub command_criteria_string: String,
    /// Ordered tiers, most preferred first.
    pub cluster_criterias: Vec<ClusterCriteria>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub status_msg: Option<String>,
    #[serde(default)]
    pub host_name: String,
    #[serde(default = "unset_process_handle")]
    pub process_handle: i32,
    #[serde(default)]
    pub output_uri: String,
    #[serde(default)]
    pub kill_uri: String,
    #[serde(default)]
    pub execution_cluster_id: Option<ClusterId>,
    #[serde(default)]
    pub execution_cluster_name: Option<String>,
    #[serde(default)]
    pub command_id: Option<CommandId>,
    #[serde(default)]
    pub command_name: Option<String>,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub application_name: Option<String>,
    /// Searchable tags: every criteria tag plus any caller-supplied tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

fn unset_process_handle() -> i32 {
    UNSET_PROCESS_HANDLE
}

impl Job {
    pub fn new(
        user: &str,
        name: &str,
        version: &str,
        command_args: &str,
        command_criteria: BTreeSet<String>,
        cluster_criterias: Vec<ClusterCriteria>,
    ) -> Self {
        Self {
            id: String::new(),
            user: user.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            command_args: command_args.to_string(),
            command_criteria,
            command_criteria_string: String::new(),
            cluster_criterias,
            status: JobStatus::Init,
            status_msg: None,
            host_name: String::new(),
            process_handle: UNSET_PROCESS_HANDLE,
            output_uri: String::new(),
            kill_uri: String::new(),
            execution_cluster_id: None,
            execution_cluster_name: None,
            command_id: None,
            command_name: None,
            application_id: None,
            application_name: None,
            tags: BTreeSet::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Union of every tag named by the cluster and command criteria.
    pub fn criteria_tags(&self) -> BTreeSet<String> {
        self.cluster_criterias
            .iter()
            .flat_map(|c| c.tags.iter())
            .chain(self.command_criteria.iter())
            .cloned()
            .collect()
    }

    /// Comma-joined command criteria in sorted order.
    pub fn joined_command_criteria(&self) -> String {
        self.command_criteria
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

// ── Status parsing ────────────────────────────────────────────────

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::OutOfService => write!(f, "OUT_OF_SERVICE"),
            Self::Terminated => write!(f, "TERMINATED"),
        }
    }
}

impl FromStr for ClusterStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UP" => Ok(Self::Up),
            "OUT_OF_SERVICE" => Ok(Self::OutOfService),
            "TERMINATED" => Ok(Self::Terminated),
            other => Err(format!("unknown cluster status: {other}")),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Killed => write!(f, "KILLED"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INIT" => Ok(Self::Init),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "KILLED" => Ok(Self::Killed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

// ── Timestamps ────────────────────────────────────────────────────

/// Current unix time in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Next update stamp for a record last stamped at `previous`.
///
/// Always strictly greater than `previous`, even when the wall clock has
/// not advanced or has stepped backwards.
pub fn next_stamp(previous: u64) -> u64 {
    epoch_millis().max(previous.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_stamp_is_strictly_increasing() {
        let far_future = epoch_millis() + 60_000;
        assert_eq!(next_stamp(far_future), far_future + 1);

        let first = next_stamp(0);
        let second = next_stamp(first);
        assert!(second > first);
    }

    #[test]
    fn criteria_tags_union_all_tiers() {
        let job = Job::new(
            "tgianos",
            "pig",
            "2.4",
            "-f -j",
            ["type:pig".to_string()].into_iter().collect(),
            vec![
                ClusterCriteria::new(["sched:adhoc", "type:yarn"]),
                ClusterCriteria::new(["type:yarn"]),
            ],
        );
        let tags = job.criteria_tags();
        assert_eq!(tags.len(), 3);
        assert!(tags.contains("sched:adhoc"));
        assert!(tags.contains("type:pig"));
    }

    #[test]
    fn command_criteria_joined_in_sorted_order() {
        let job = Job::new(
            "u",
            "n",
            "v",
            "",
            ["b".to_string(), "a".to_string()].into_iter().collect(),
            vec![ClusterCriteria::new(["x"])],
        );
        assert_eq!(job.joined_command_criteria(), "a,b");
    }

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!("running".parse::<JobStatus>(), Ok(JobStatus::Running));
        assert_eq!("out_of_service".parse::<ClusterStatus>(), Ok(ClusterStatus::OutOfService));
        assert!("sleeping".parse::<JobStatus>().is_err());
    }

    #[test]
    fn job_defaults_from_minimal_json() {
        let json = r#"{
            "user": "amsharma",
            "name": "spark",
            "version": "2.4.3",
            "command_criteria": ["type:spark"],
            "cluster_criterias": [{"tags": ["type:yarn"]}]
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::Init);
        assert_eq!(job.process_handle, UNSET_PROCESS_HANDLE);
        assert!(job.id.is_empty());
    }
}
