//! Job detail fetching, rerun attempt numbering, and job history appends.

use std::time::Instant;

use uuid::Uuid;

use super::github_service::{JobSource, RemoteJob, RemoteStep};
use super::timestamps::parse_timestamp;
use crate::models::job_step::{JobKind, NewJobStep};
use crate::store::{PipelineStore, StoreError};

/// Failures of the job-detail fetch. None of them fail the webhook.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("transport: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("upstream: {0}")]
    Upstream(String),
    #[error("attempt lookup: {0}")]
    Store(#[from] StoreError),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Configuration(_) => "configuration",
            FetchError::Transport(_) => "transport",
            FetchError::Upstream(_) => "upstream",
            FetchError::Store(_) => "store",
        }
    }
}

/// Fetch the jobs of `run_id` and turn them into records for `pipeline_id`.
///
/// Each job gets `attempt = highest stored attempt + 1` (or 1), so a rerun
/// is detected purely from what is already stored. Every job record is
/// followed by one record per step, sharing the job's id and attempt.
pub async fn fetch_jobs(
    source: &dyn JobSource,
    store: &dyn PipelineStore,
    owner: &str,
    repo: &str,
    run_id: i64,
    pipeline_id: Uuid,
) -> Result<Vec<NewJobStep>, FetchError> {
    let started = Instant::now();
    let result = fetch_jobs_inner(source, store, owner, repo, run_id, pipeline_id).await;
    crate::metrics::job_fetch_duration(started.elapsed());
    if let Err(e) = &result {
        crate::metrics::job_fetch_failed(e.kind());
    }
    result
}

async fn fetch_jobs_inner(
    source: &dyn JobSource,
    store: &dyn PipelineStore,
    owner: &str,
    repo: &str,
    run_id: i64,
    pipeline_id: Uuid,
) -> Result<Vec<NewJobStep>, FetchError> {
    let jobs = source.run_jobs(owner, repo, run_id).await?;

    let mut out = Vec::with_capacity(jobs.len());
    for job in jobs {
        let job_id = job.id.to_string();
        let attempt = match store.latest_attempt(pipeline_id, &job_id).await? {
            Some(previous) => previous + 1,
            None => 1,
        };

        tracing::debug!(
            run_id,
            job_id = %job_id,
            attempt,
            steps = job.steps.len(),
            "Job detail fetched"
        );

        let mut steps = job.steps.clone();
        steps.sort_by_key(|s| s.number);

        out.push(job_record(pipeline_id, &job_id, attempt, &job));
        out.extend(
            steps
                .iter()
                .map(|step| step_record(pipeline_id, &job_id, attempt, step)),
        );
    }

    Ok(out)
}

fn job_record(pipeline_id: Uuid, job_id: &str, attempt: i32, job: &RemoteJob) -> NewJobStep {
    let started_at = job.started_at.as_deref().and_then(parse_timestamp);
    let completed_at = job.completed_at.as_deref().and_then(parse_timestamp);
    NewJobStep {
        id: None,
        pipeline_id,
        job_id: job_id.to_string(),
        name: job.name.clone(),
        kind: JobKind::Job.as_str().to_string(),
        status: job.status.clone(),
        conclusion: job.conclusion.clone().unwrap_or_default(),
        started_at,
        completed_at,
        duration_sec: duration_secs(started_at, completed_at),
        attempt,
    }
}

fn step_record(pipeline_id: Uuid, job_id: &str, attempt: i32, step: &RemoteStep) -> NewJobStep {
    let started_at = step.started_at.as_deref().and_then(parse_timestamp);
    let completed_at = step.completed_at.as_deref().and_then(parse_timestamp);
    NewJobStep {
        id: None,
        pipeline_id,
        job_id: job_id.to_string(),
        name: step.name.clone(),
        kind: JobKind::Step.as_str().to_string(),
        status: step.status.clone(),
        conclusion: step.conclusion.clone().unwrap_or_default(),
        started_at,
        completed_at,
        duration_sec: duration_secs(started_at, completed_at),
        attempt,
    }
}

/// Whole seconds between two timestamps; zero unless both are known.
pub fn duration_secs(
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
) -> i64 {
    match (started_at, completed_at) {
        (Some(start), Some(end)) => (end - start).num_seconds(),
        _ => 0,
    }
}

/// Append job records. Records without an id get a fresh one.
///
/// No deduplication happens here; attempt numbering already made each
/// delivery's records distinct.
pub async fn insert_jobs(
    store: &dyn PipelineStore,
    mut records: Vec<NewJobStep>,
) -> Result<usize, StoreError> {
    if records.is_empty() {
        return Ok(0);
    }

    for record in records.iter_mut() {
        if record.id.is_none() {
            record.id = Some(Uuid::new_v4());
        }
    }

    store.insert_job_steps(&records).await?;

    crate::metrics::job_records_appended(records.len());
    tracing::info!(count = records.len(), "Job records appended");
    Ok(records.len())
}
