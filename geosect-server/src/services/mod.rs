//! Import/export services
//!
//! - `spreadsheet`: xlsx codec
//! - `job_registry`: in-memory job status map
//! - `file_jobs`: background import/export orchestration

pub mod file_jobs;
pub mod job_registry;
pub mod spreadsheet;

pub use file_jobs::{ArtifactError, FileJobs, JobError, SubmittedJob};
pub use job_registry::JobRegistry;
