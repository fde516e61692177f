//! Per-job run: scratch directory, download, detection, conversion and the
//! single terminal write.

use crate::config::ArchivePolicy;
use crate::db::Job;
use crate::detect::detect_artifact;
use crate::dispatch::JobPerformer;
use crate::error::{Error, ErrorDescriptor, Result};
use crate::types::{Event, JobId, SbomFormat};
use async_trait::async_trait;

use super::SbomService;

/// Prefix of per-job scratch directories
const SCRATCH_PREFIX: &str = "sbom-job-";

/// Result of a successful run, written with `status = complete`
#[derive(Debug)]
struct Converted {
    results: serde_json::Value,
    sha256: String,
    skipped: bool,
}

/// Failure of a run; `sha256` is set when the artifact had been downloaded
#[derive(Debug)]
struct Failed {
    error: Error,
    sha256: Option<String>,
}

impl Failed {
    fn before_download(error: impl Into<Error>) -> Self {
        Self {
            error: error.into(),
            sha256: None,
        }
    }
}

impl SbomService {
    /// Run a job to its terminal state
    ///
    /// Downloads the artifact into a private scratch directory, inspects it,
    /// converts it and records either `complete` (results and digest) or
    /// `error` (error descriptor, plus the digest when the download had
    /// succeeded). The scratch directory is removed on every path.
    ///
    /// Never returns an error: failures end up on the job record. Only a
    /// failure to write that record is logged instead.
    pub async fn run(&self, job_id: JobId) {
        if let Err(e) = self.run_job(job_id).await {
            tracing::error!(job_id = %job_id, error = %e, "failed to record job outcome");
        }
    }

    async fn run_job(&self, job_id: JobId) -> Result<()> {
        let job = self
            .db
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;

        if job.has_outcome() {
            tracing::warn!(job_id = %job_id, status = %job.status(), "job already finished, not running again");
            return Ok(());
        }
        if job.sweep_closed {
            tracing::info!(job_id = %job_id, "job was closed by the status sweep, running it anyway");
        }

        tracing::info!(job_id = %job_id, url = %job.url, "job started");
        self.emit_event(Event::JobStarted { id: job_id });

        // Own task so a panic inside the pipeline still ends in a terminal write
        let service = self.clone();
        let outcome = match tokio::spawn(async move { service.execute(job).await }).await {
            Ok(outcome) => outcome,
            Err(e) => Err(Failed::before_download(Error::Other(format!(
                "job run aborted: {}",
                e
            )))),
        };

        match outcome {
            Ok(converted) => self.record_success(job_id, converted).await,
            Err(failed) => self.record_failure(job_id, failed).await,
        }
    }

    async fn execute(&self, job: Job) -> std::result::Result<Converted, Failed> {
        let format: SbomFormat = job.format.parse().map_err(Failed::before_download)?;
        let scratch = self.scratch_dir().map_err(Failed::before_download)?;

        let downloaded = self
            .downloader
            .download(&job.url, scratch.path())
            .await
            .map_err(Failed::before_download)?;

        tracing::debug!(
            job_id = job.id,
            sha256 = %downloaded.sha256,
            size = downloaded.size,
            "artifact downloaded"
        );

        let converted = async {
            let kind = detect_artifact(&downloaded.path).await?;

            if kind.is_archive() && self.config.converter.archive_policy == ArchivePolicy::Skip {
                tracing::warn!(job_id = job.id, artifact = %kind, "archive artifact not converted");
                return Ok(Converted {
                    results: serde_json::json!({
                        "skipped": "archive artifacts are not converted",
                        "artifact": kind.label(),
                    }),
                    sha256: downloaded.sha256.clone(),
                    skipped: true,
                });
            }

            let document = self.converter.convert(&downloaded.path, format).await?;
            Ok::<_, Error>(Converted {
                results: document,
                sha256: downloaded.sha256.clone(),
                skipped: false,
            })
        }
        .await;

        // scratch is dropped here, removing the artifact
        converted.map_err(|error| Failed {
            error,
            sha256: Some(downloaded.sha256),
        })
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);

        match &self.config.download.scratch_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                Ok(builder.tempdir_in(parent)?)
            }
            None => Ok(builder.tempdir()?),
        }
    }

    async fn record_success(&self, job_id: JobId, converted: Converted) -> Result<()> {
        let written = self
            .db
            .complete_job(job_id, &converted.results, &converted.sha256)
            .await?;

        if !written {
            tracing::warn!(job_id = %job_id, "job already has an outcome, result discarded");
            return Ok(());
        }

        tracing::info!(job_id = %job_id, sha256 = %converted.sha256, skipped = converted.skipped, "job complete");
        self.emit_event(Event::JobCompleted {
            id: job_id,
            sha256: converted.sha256,
            skipped: converted.skipped,
        });
        Ok(())
    }

    async fn record_failure(&self, job_id: JobId, failed: Failed) -> Result<()> {
        let descriptor = ErrorDescriptor::from(&failed.error);
        let written = self
            .db
            .fail_job(job_id, &descriptor.to_value(), failed.sha256.as_deref())
            .await?;

        if !written {
            tracing::warn!(job_id = %job_id, error = %failed.error, "job already has an outcome, failure discarded");
            return Ok(());
        }

        tracing::warn!(job_id = %job_id, code = %descriptor.code, error = %descriptor.error, "job failed");
        self.emit_event(Event::JobFailed {
            id: job_id,
            error: descriptor.error,
        });
        Ok(())
    }
}

#[async_trait]
impl JobPerformer for SbomService {
    async fn perform(&self, job_id: JobId) -> Result<()> {
        self.run_job(job_id).await
    }
}
