//! jobgrid-core: configuration shared by the JobGrid services and CLI.

pub mod config;

pub use config::{AdmissionConfig, HostConfig, JobGridConfig, JobsConfig, QueryConfig};
