//! jobgrid.toml configuration parser.
//!
//! Every section is optional. A missing file section, or a missing key
//! inside a section, takes the default below.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JobGridConfig {
    pub host: HostConfig,
    pub jobs: JobsConfig,
    pub query: QueryConfig,
    pub admission: AdmissionConfig,
}

/// Identity of the node that admits jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostConfig {
    pub name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
        }
    }
}

/// Templates for the per-job locations handed to the process collaborator.
///
/// `{id}` is replaced with the job id and `{host}` with the host name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JobsConfig {
    pub output_uri_template: String,
    pub kill_uri_template: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            output_uri_template: "file:///var/lib/jobgrid/jobs/{id}/output".to_string(),
            kill_uri_template: "jobgrid://{host}/jobs/{id}/kill".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size used when a caller does not ask for one.
    pub default_limit: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_limit: 1024 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Seconds between admission passes in `serve` mode.
    pub interval_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl AdmissionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl JobGridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: JobGridConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn output_uri(&self, job_id: &str) -> String {
        self.expand(&self.jobs.output_uri_template, job_id)
    }

    pub fn kill_uri(&self, job_id: &str) -> String {
        self.expand(&self.jobs.kill_uri_template, job_id)
    }

    fn expand(&self, template: &str, job_id: &str) -> String {
        template
            .replace("{id}", job_id)
            .replace("{host}", &self.host.name)
    }
}
