//! Read API: pipeline list and nested pipeline detail views.
//!
//! The async functions do the datastore round-trips; everything that
//! shapes records into JSON is a plain function over fetched rows.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::models::commit::CommitInfo;
use crate::models::job_step::JobStep;
use crate::models::pipeline::PipelineRun;
use crate::store::{PipelineStore, StoreError};

/// One row of `GET /api/pipelines`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineListItem {
    pub run_id: i64,
    pub status: String,
    pub branch: String,
    pub commit_sha: String,
    pub started_at: String,
    pub duration: String,
}

/// Body of `GET /api/pipelines/details`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineDetail {
    pub pipeline: PipelineSummary,
    pub git_info: Option<GitInfoJson>,
    pub jobs: Vec<JobJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub run_id: i64,
    pub run_number: i32,
    pub workflow: String,
    pub status: String,
    pub conclusion: String,
    pub branch: String,
    pub commit_sha: String,
    pub started_at: String,
    pub completed_at: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitInfoJson {
    pub repo_name: String,
    pub branch: String,
    pub commit_sha: String,
    pub commit_message: String,
    pub author: AuthorJson,
    pub committed_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorJson {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobJson {
    pub id: String,
    pub name: String,
    pub status: String,
    pub conclusion: String,
    pub attempt: i32,
    pub started_at: String,
    pub completed_at: String,
    pub duration: String,
    pub steps: Vec<StepJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepJson {
    pub name: String,
    pub status: String,
    pub conclusion: String,
    pub attempt: i32,
    pub duration: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DetailError {
    #[error("pipeline with run id {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Elapsed time as `95s`, `1m35s` or `2h0m5s`.
pub fn format_elapsed(total_secs: i64) -> String {
    let sign = if total_secs < 0 { "-" } else { "" };
    let secs = total_secs.unsigned_abs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{sign}{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{sign}{minutes}m{seconds}s")
    } else {
        format!("{sign}{seconds}s")
    }
}

/// Elapsed run time, or an empty string unless both ends are known.
pub fn run_duration(
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
) -> String {
    match (started_at, completed_at) {
        (Some(start), Some(end)) => format_elapsed((end - start).num_seconds()),
        _ => String::new(),
    }
}

/// RFC3339 with second precision; empty when unknown.
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

pub fn list_item(pipeline: &PipelineRun, commit: Option<&CommitInfo>) -> PipelineListItem {
    PipelineListItem {
        run_id: pipeline.run_id,
        status: pipeline.status.clone(),
        branch: commit.map(|c| c.branch.clone()).unwrap_or_default(),
        commit_sha: commit.map(|c| c.commit_sha.clone()).unwrap_or_default(),
        started_at: format_timestamp(pipeline.started_at),
        duration: run_duration(pipeline.started_at, pipeline.completed_at),
    }
}

pub fn detail_view(
    pipeline: &PipelineRun,
    commit: Option<&CommitInfo>,
    records: &[JobStep],
) -> PipelineDetail {
    PipelineDetail {
        pipeline: PipelineSummary {
            run_id: pipeline.run_id,
            run_number: pipeline.run_number,
            workflow: pipeline.workflow_name.clone(),
            status: pipeline.status.clone(),
            conclusion: pipeline.conclusion.clone(),
            branch: commit.map(|c| c.branch.clone()).unwrap_or_default(),
            commit_sha: commit.map(|c| c.commit_sha.clone()).unwrap_or_default(),
            started_at: format_timestamp(pipeline.started_at),
            completed_at: format_timestamp(pipeline.completed_at),
            duration: run_duration(pipeline.started_at, pipeline.completed_at),
        },
        git_info: commit.map(|c| GitInfoJson {
            repo_name: c.repo_name.clone(),
            branch: c.branch.clone(),
            commit_sha: c.commit_sha.clone(),
            commit_message: c.commit_message.clone(),
            author: AuthorJson {
                name: c.author_name.clone(),
                email: c.author_email.clone(),
            },
            committed_at: format_timestamp(c.committed_at),
        }),
        jobs: group_jobs(records),
    }
}

struct JobGroup<'a> {
    first: &'a JobStep,
    latest_job: Option<&'a JobStep>,
    steps: Vec<&'a JobStep>,
}

/// Group records by job id in first-seen order.
///
/// The job header comes from the highest-attempt `job` record. Only the
/// `step` records of that same attempt are listed under it, in record order.
pub fn group_jobs(records: &[JobStep]) -> Vec<JobJson> {
    let mut groups: IndexMap<&str, JobGroup<'_>> = IndexMap::new();

    for record in records {
        let group = groups.entry(record.job_id.as_str()).or_insert(JobGroup {
            first: record,
            latest_job: None,
            steps: Vec::new(),
        });
        if record.is_step() {
            group.steps.push(record);
        } else if group
            .latest_job
            .map_or(true, |current| record.attempt >= current.attempt)
        {
            group.latest_job = Some(record);
        }
    }

    groups
        .into_iter()
        .map(|(job_id, group)| {
            let header = group.latest_job.unwrap_or(group.first);
            let attempt = match group.latest_job {
                Some(job) => job.attempt,
                None => group
                    .steps
                    .iter()
                    .map(|s| s.attempt)
                    .max()
                    .unwrap_or(header.attempt),
            };
            JobJson {
                id: job_id.to_string(),
                name: header.name.clone(),
                status: header.status.clone(),
                conclusion: header.conclusion.clone(),
                attempt,
                started_at: format_timestamp(header.started_at),
                completed_at: format_timestamp(header.completed_at),
                duration: format_elapsed(header.duration_sec),
                steps: group
                    .steps
                    .into_iter()
                    .filter(|s| s.attempt == attempt)
                    .map(|s| StepJson {
                        name: s.name.clone(),
                        status: s.status.clone(),
                        conclusion: s.conclusion.clone(),
                        attempt: s.attempt,
                        duration: format_elapsed(s.duration_sec),
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Commit lookup that degrades to `None` on error.
async fn lookup_commit(store: &dyn PipelineStore, id: Option<Uuid>) -> Option<CommitInfo> {
    let id = id?;
    match store.find_commit(id).await {
        Ok(commit) => commit,
        Err(e) => {
            tracing::warn!(commit_id = %id, "Commit lookup failed: {e}");
            None
        }
    }
}

/// List every pipeline, newest first, with its branch and commit hash.
pub async fn list_pipelines(store: &dyn PipelineStore) -> Result<Vec<PipelineListItem>, StoreError> {
    let pipelines = store.list_pipelines().await?;

    let mut commits: HashMap<Uuid, Option<CommitInfo>> = HashMap::new();
    let mut items = Vec::with_capacity(pipelines.len());
    for pipeline in &pipelines {
        let commit = match pipeline.git_info_id {
            Some(id) => {
                if !commits.contains_key(&id) {
                    let found = lookup_commit(store, Some(id)).await;
                    commits.insert(id, found);
                }
                commits.get(&id).and_then(Option::as_ref)
            }
            None => None,
        };
        items.push(list_item(pipeline, commit));
    }

    Ok(items)
}

/// Assemble the nested detail view of the pipeline with `run_id`.
pub async fn get_pipeline_detail(
    store: &dyn PipelineStore,
    run_id: i64,
) -> Result<PipelineDetail, DetailError> {
    let pipeline = store
        .find_pipeline_by_run_id(run_id)
        .await?
        .ok_or(DetailError::NotFound(run_id))?;

    let commit = lookup_commit(store, pipeline.git_info_id).await;

    let records = store
        .list_job_steps(pipeline.id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(pipeline_id = %pipeline.id, "Job lookup failed: {e}");
            Vec::new()
        });

    Ok(detail_view(&pipeline, commit.as_ref(), &records))
}
