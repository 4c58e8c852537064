//! Background import/export jobs
//!
//! Each submission registers an IN_PROGRESS job, spawns one task and returns
//! immediately. The task drives the spreadsheet codec and the section store
//! and always ends by registering DONE or ERROR; failures are never propagated
//! to the submitter, who only polls the registry.
//!
//! Import is all-or-nothing: the workbook is fully decoded before the single
//! `save_all` transaction, so a bad row writes nothing.
//!
//! Every export writes its own `<job_id>.xlsx`, so concurrent exports never
//! share an output file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use geosect_common::{JobKind, JobState, JobStatus};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::job_registry::JobRegistry;
use super::spreadsheet::{decode_sections, encode_sections, CodecError};
use crate::db::SectionStore;

/// Failure of one background job; recorded on the job, never returned to a caller
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Spreadsheet decode failed: {0}")]
    Decode(#[source] CodecError),

    #[error("Spreadsheet encode failed: {0}")]
    Encode(#[source] CodecError),

    #[error("Store operation failed: {0}")]
    Store(#[from] geosect_common::Error),

    #[error("Export file write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Why an export artifact cannot be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// No job with this id
    UnknownJob,
    /// The job is an import and has no artifact
    NotAnExport,
    /// The export has not reached DONE
    NotReady(JobState),
}

/// A submitted job: its initial status and the background task
///
/// Dropping `completion` does not cancel the job.
pub struct SubmittedJob {
    pub status: JobStatus,
    pub completion: JoinHandle<JobStatus>,
}

/// Orchestrates import/export jobs over a store and a job registry
#[derive(Clone)]
pub struct FileJobs {
    registry: JobRegistry,
    store: Arc<dyn SectionStore>,
    export_dir: PathBuf,
    last_error: Arc<RwLock<Option<String>>>,
}

impl FileJobs {
    pub fn new(store: Arc<dyn SectionStore>, registry: JobRegistry, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            store,
            export_dir: export_dir.into(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Latest job failure message, for diagnostics
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Register and spawn an import of `payload` (xlsx bytes)
    pub async fn submit_import(&self, payload: Vec<u8>) -> SubmittedJob {
        let status = self.registry.start(JobKind::Import).await;
        info!(job_id = %status.job_id, bytes = payload.len(), "Import job submitted");

        let jobs = self.clone();
        let job = status.clone();
        let completion = tokio::spawn(async move { jobs.run_import(job, payload).await });

        SubmittedJob { status, completion }
    }

    /// Register and spawn an export of all sections
    pub async fn submit_export(&self) -> SubmittedJob {
        let status = self.registry.start(JobKind::Export).await;
        info!(job_id = %status.job_id, "Export job submitted");

        let jobs = self.clone();
        let job = status.clone();
        let completion = tokio::spawn(async move { jobs.run_export(job).await });

        SubmittedJob { status, completion }
    }

    /// Run an already-registered import to completion
    pub async fn run_import(&self, job: JobStatus, payload: Vec<u8>) -> JobStatus {
        let outcome = self.import_sections(payload).await;
        if let Ok(count) = &outcome {
            info!(job_id = %job.job_id, sections = count, "Import stored sections");
        }
        self.finish(&job, outcome).await
    }

    /// Run an already-registered export to completion
    pub async fn run_export(&self, job: JobStatus) -> JobStatus {
        let outcome = self.export_sections(&job.job_id).await;
        if let Ok(path) = &outcome {
            info!(job_id = %job.job_id, path = %path.display(), "Export written");
        }
        self.finish(&job, outcome).await
    }

    async fn import_sections(&self, payload: Vec<u8>) -> Result<usize, JobError> {
        let sections = tokio::task::spawn_blocking(move || decode_sections(&payload))
            .await?
            .map_err(JobError::Decode)?;

        let saved = self.store.save_all(sections).await?;
        Ok(saved.len())
    }

    async fn export_sections(&self, job_id: &str) -> Result<PathBuf, JobError> {
        let sections = self.store.find_all().await?;

        let bytes = tokio::task::spawn_blocking(move || encode_sections(&sections))
            .await?
            .map_err(JobError::Encode)?;

        tokio::fs::create_dir_all(&self.export_dir).await?;

        // Readers only ever see a complete file
        let path = self.artifact_path(job_id);
        let partial = self.export_dir.join(format!("{}.xlsx.part", job_id));
        let written = async {
            tokio::fs::write(&partial, &bytes).await?;
            tokio::fs::rename(&partial, &path).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(job_id = %job_id, error = %cleanup, "Failed to remove partial export");
                }
            }
            return Err(e.into());
        }

        Ok(path)
    }

    /// Register the terminal status for `job`
    async fn finish<T>(&self, job: &JobStatus, outcome: Result<T, JobError>) -> JobStatus {
        let outcome = match outcome {
            Ok(_) => {
                info!(job_id = %job.job_id, kind = ?job.kind, "Job completed");
                Ok(())
            }
            Err(e) => {
                error!(job_id = %job.job_id, kind = ?job.kind, error = %e, "Job failed");
                *self.last_error.write().await = Some(format!("{:?} job {}: {}", job.kind, job.job_id, e));
                Err(e.to_string())
            }
        };

        self.registry.finish(job, outcome).await
    }

    /// Status of `job_id`, if it was ever submitted
    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.registry.get(job_id).await
    }

    /// Path of a finished export's workbook
    pub async fn export_artifact(&self, job_id: &str) -> Result<PathBuf, ArtifactError> {
        let status = self.registry.get(job_id).await.ok_or(ArtifactError::UnknownJob)?;

        if status.kind != JobKind::Export {
            return Err(ArtifactError::NotAnExport);
        }
        if status.status != JobState::Done {
            return Err(ArtifactError::NotReady(status.status));
        }

        Ok(self.artifact_path(&status.job_id))
    }

    // Only called with registry-issued ids (UUIDs), never raw user input
    fn artifact_path(&self, job_id: &str) -> PathBuf {
        self.export_dir.join(format!("{}.xlsx", job_id))
    }
}
