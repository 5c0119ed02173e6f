//! Filter, sort, and pagination for record queries.
//!
//! Every filter field is optional: `None` or an empty set means "do not
//! filter on this axis". Set-valued tag filters use superset semantics, so a
//! record matches when its own tags contain every requested tag.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Cluster, ClusterStatus, Command, Job, JobStatus};

// ── Pagination ────────────────────────────────────────────────────

/// Sort direction applied to the whole sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    /// Most recent first.
    #[default]
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Offset + limit window over a sorted result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    /// `None` returns every match past `offset`.
    pub limit: Option<usize>,
    pub direction: SortDirection,
}

impl PageRequest {
    /// Build a page from raw caller values. A negative limit is unbounded.
    pub fn new(offset: usize, limit: i64) -> Self {
        Self {
            offset,
            limit: usize::try_from(limit).ok(),
            direction: SortDirection::default(),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn ascending(self) -> Self {
        self.with_direction(SortDirection::Ascending)
    }

    /// Cut the window out of an already sorted list.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

fn contains_all(have: &BTreeSet<String>, wanted: &BTreeSet<String>) -> bool {
    wanted.is_subset(have)
}

fn in_range(value: u64, min: Option<u64>, max: Option<u64>) -> bool {
    min.is_none_or(|m| value >= m) && max.is_none_or(|m| value <= m)
}

fn eq_opt(filter: &Option<String>, value: &str) -> bool {
    filter.as_deref().is_none_or(|f| f == value)
}

fn eq_opt_field(filter: &Option<String>, value: &Option<String>) -> bool {
    match filter {
        None => true,
        Some(f) => value.as_deref() == Some(f.as_str()),
    }
}

/// Sort by `updated_at` then id, in the page direction, and cut the page.
fn select_by_update<T>(
    mut items: Vec<T>,
    page: &PageRequest,
    key: impl Fn(&T) -> (u64, &str),
) -> Vec<T> {
    items.sort_by(|a, b| page.direction.apply(key(a).cmp(&key(b))));
    page.apply(items)
}

// ── Clusters ──────────────────────────────────────────────────────

/// Filters for listing clusters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterFilter {
    pub name: Option<String>,
    pub statuses: BTreeSet<ClusterStatus>,
    pub tags: BTreeSet<String>,
    pub min_updated: Option<u64>,
    pub max_updated: Option<u64>,
}

impl ClusterFilter {
    pub fn matches(&self, cluster: &Cluster) -> bool {
        eq_opt(&self.name, &cluster.name)
            && (self.statuses.is_empty() || self.statuses.contains(&cluster.status))
            && contains_all(&cluster.tags, &self.tags)
            && in_range(cluster.updated_at, self.min_updated, self.max_updated)
    }

    /// Filter, sort by update time, and paginate.
    pub fn select(&self, clusters: Vec<Cluster>, page: &PageRequest) -> Vec<Cluster> {
        let matched = clusters.into_iter().filter(|c| self.matches(c)).collect();
        select_by_update(matched, page, |c| (c.updated_at, c.id.as_str()))
    }
}

// ── Commands ──────────────────────────────────────────────────────

/// Filters for listing commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandFilter {
    pub name: Option<String>,
    pub tags: BTreeSet<String>,
    pub min_updated: Option<u64>,
    pub max_updated: Option<u64>,
}

impl CommandFilter {
    pub fn matches(&self, command: &Command) -> bool {
        eq_opt(&self.name, &command.name)
            && contains_all(&command.tags, &self.tags)
            && in_range(command.updated_at, self.min_updated, self.max_updated)
    }

    pub fn select(&self, commands: Vec<Command>, page: &PageRequest) -> Vec<Command> {
        let matched = commands.into_iter().filter(|c| self.matches(c)).collect();
        select_by_update(matched, page, |c| (c.updated_at, c.id.as_str()))
    }
}

// ── Jobs ──────────────────────────────────────────────────────────

/// Every recognised job filter. Filters intersect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub id: Option<String>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub statuses: BTreeSet<JobStatus>,
    pub tags: BTreeSet<String>,
    pub cluster_name: Option<String>,
    pub cluster_id: Option<String>,
    pub command_name: Option<String>,
    pub command_id: Option<String>,
}

impl JobQuery {
    pub fn matches(&self, job: &Job) -> bool {
        eq_opt(&self.id, &job.id)
            && eq_opt(&self.name, &job.name)
            && eq_opt(&self.user, &job.user)
            && (self.statuses.is_empty() || self.statuses.contains(&job.status))
            && contains_all(&job.tags, &self.tags)
            && eq_opt_field(&self.cluster_name, &job.execution_cluster_name)
            && eq_opt_field(&self.cluster_id, &job.execution_cluster_id)
            && eq_opt_field(&self.command_name, &job.command_name)
            && eq_opt_field(&self.command_id, &job.command_id)
    }

    /// Filter, sort by `order`, and paginate.
    pub fn select(&self, jobs: Vec<Job>, order: &[JobSortField], page: &PageRequest) -> Vec<Job> {
        let mut matched: Vec<Job> = jobs.into_iter().filter(|j| self.matches(j)).collect();
        matched.sort_by(|a, b| {
            let ordering = order
                .iter()
                .fold(Ordering::Equal, |acc, field| acc.then_with(|| field.compare(a, b)))
                .then_with(|| a.id.cmp(&b.id));
            page.direction.apply(ordering)
        });
        page.apply(matched)
    }
}

/// Scalar job fields that can be sorted on.
///
/// Collection fields such as `tags` are deliberately absent: asking to sort
/// by one falls back to [`JobSortField::DEFAULT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobSortField {
    Id,
    Created,
    Updated,
    Name,
    User,
    Version,
    Status,
    ClusterName,
    CommandName,
}

impl JobSortField {
    pub const DEFAULT: JobSortField = JobSortField::Updated;

    /// Look up a field by its snake_case or camelCase name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "id" => Some(Self::Id),
            "created" | "created_at" | "createdAt" => Some(Self::Created),
            "updated" | "updated_at" | "updatedAt" => Some(Self::Updated),
            "name" => Some(Self::Name),
            "user" => Some(Self::User),
            "version" => Some(Self::Version),
            "status" => Some(Self::Status),
            "cluster_name" | "executionClusterName" => Some(Self::ClusterName),
            "command_name" | "commandName" => Some(Self::CommandName),
            _ => None,
        }
    }

    /// Map requested names to sort fields, skipping anything unrecognised.
    /// An empty result becomes the default field.
    pub fn resolve<S: AsRef<str>>(names: &[S]) -> Vec<Self> {
        let mut fields: Vec<Self> = Vec::new();
        for field in names.iter().filter_map(|n| Self::from_name(n.as_ref())) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        if fields.is_empty() {
            fields.push(Self::DEFAULT);
        }
        fields
    }

    pub fn compare(self, a: &Job, b: &Job) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Created => a.created_at.cmp(&b.created_at),
            Self::Updated => a.updated_at.cmp(&b.updated_at),
            Self::Name => a.name.cmp(&b.name),
            Self::User => a.user.cmp(&b.user),
            Self::Version => a.version.cmp(&b.version),
            Self::Status => a.status.cmp(&b.status),
            Self::ClusterName => a.execution_cluster_name.cmp(&b.execution_cluster_name),
            Self::CommandName => a.command_name.cmp(&b.command_name),
        }
    }
}
