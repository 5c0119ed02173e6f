//! jobgrid-lifecycle: job records, status transitions, and admission.
//!
//! Jobs enter as INIT, are admitted onto a cluster by resolving their
//! criteria, and finish in one of the terminal statuses:
//!
//! ```text
//! INIT ──► RUNNING ──► SUCCEEDED
//!   │         ├──────► FAILED
//!   │         └──────► KILLED
//!   ├──► FAILED
//!   └──► KILLED
//! ```
//!
//! # Architecture
//!
//! ```text
//! Admitter
//!   ├── Resolver (read-only snapshot of clusters and commands)
//!   └── JobService
//!         └── StateStore (jobs table, compare-and-set status writes)
//! ```

pub mod admission;
pub mod error;
pub mod job_service;
pub mod transition;

pub use admission::{AdmissionReport, Admitter};
pub use error::{LifecycleError, LifecycleResult};
pub use job_service::JobService;
pub use transition::{can_transition, check_transition};
