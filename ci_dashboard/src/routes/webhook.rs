//! GitHub webhook handler — receives workflow_run events and reconciles
//! commits, pipelines and job history.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::models::commit::CommitCandidate;
use crate::models::pipeline::PipelineCandidate;
use crate::services::github_service::{self, JobSource};
use crate::services::timestamps::{normalize_run_timestamps, parse_timestamp};
use crate::services::{commit_service, job_service, pipeline_service};
use crate::store::{PipelineStore, StoreError};

use super::DashboardState;

/// Missing and `null` both decode to the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowRunEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub workflow: Workflow,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repository: Repository,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender: Account,
    #[serde(default, deserialize_with = "null_as_default")]
    pub workflow_run: WorkflowRun,
}

#[derive(Debug, Default, Deserialize)]
pub struct Workflow {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Repository {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner: Account,
}

#[derive(Debug, Default, Deserialize)]
pub struct Account {
    #[serde(default, deserialize_with = "null_as_default")]
    pub login: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowRun {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub run_number: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub head_branch: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub head_sha: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conclusion: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HeadCommit {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: CommitAuthor,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitAuthor {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
}

/// Why a delivery was rejected.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("invalid signature")]
    Unauthorized,
    #[error("invalid json payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("failed to upsert pipeline: {0}")]
    Reconciliation(#[source] StoreError),
    #[error("webhook processing aborted")]
    Aborted,
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::Reconciliation(_) | WebhookError::Aborted => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            WebhookError::Unauthorized => "unauthorized",
            WebhookError::MalformedPayload(_) => "malformed",
            WebhookError::Reconciliation(_) => "reconciliation_failed",
            WebhookError::Aborted => "aborted",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = match &self {
            WebhookError::Unauthorized => "invalid signature",
            WebhookError::MalformedPayload(_) => "invalid json payload",
            WebhookError::Reconciliation(_) => "failed to upsert pipeline",
            WebhookError::Aborted => "webhook processing aborted",
        };
        (self.status(), body).into_response()
    }
}

/// What a successful delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    NoRunId,
    Processed {
        pipeline_id: Uuid,
        jobs_recorded: usize,
    },
}

impl WebhookOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            WebhookOutcome::NoRunId => "no workflow run id",
            WebhookOutcome::Processed { .. } => "webhook processed",
        }
    }
}

/// Handle an incoming GitHub webhook delivery.
///
/// Nothing in `body` is decoded before the signature is verified.
pub async fn handle_webhook(
    state: &DashboardState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WebhookOutcome, WebhookError> {
    let event_type = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let result = verify_and_process(state, headers, body).await;

    let outcome = match &result {
        Ok(WebhookOutcome::NoRunId) => "no_run_id",
        Ok(WebhookOutcome::Processed { .. }) => "processed",
        Err(e) => e.label(),
    };
    crate::metrics::webhook_received(&event_type, outcome);
    result
}

async fn verify_and_process(
    state: &DashboardState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WebhookOutcome, WebhookError> {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !github_service::validate_signature(&state.config.github_webhook_secret, body, signature) {
        tracing::warn!("Webhook signature validation failed");
        return Err(WebhookError::Unauthorized);
    }

    let event: WorkflowRunEvent = serde_json::from_slice(body)?;

    // Reconcile in its own task so a client disconnect does not cut it short.
    let store = state.store.clone();
    let jobs = state.jobs.clone();
    tokio::spawn(async move { process_workflow_run(store.as_ref(), jobs.as_ref(), event).await })
        .await
        .map_err(|e| {
            tracing::error!("Webhook task failed: {e}");
            WebhookError::Aborted
        })?
}

/// Reconcile one decoded `workflow_run` delivery against stored state.
///
/// Commit and job-detail failures are logged and skipped; only a failed
/// pipeline upsert aborts the delivery.
pub async fn process_workflow_run(
    store: &dyn PipelineStore,
    jobs: &dyn JobSource,
    event: WorkflowRunEvent,
) -> Result<WebhookOutcome, WebhookError> {
    let run = &event.workflow_run;
    if run.id == 0 {
        tracing::debug!("Delivery carries no workflow run id");
        return Ok(WebhookOutcome::NoRunId);
    }

    let (created_at, updated_at) = normalize_run_timestamps(&run.created_at, &run.updated_at);

    let git_info_id = if run.head_sha.is_empty() {
        tracing::debug!(run_id = run.id, "Delivery has no head commit hash");
        None
    } else {
        match commit_service::upsert_commit(store, commit_candidate(&event)).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(
                    run_id = run.id,
                    commit_sha = %run.head_sha,
                    "Commit upsert failed, continuing without commit link: {e}"
                );
                None
            }
        }
    };

    let candidate = PipelineCandidate {
        run_id: run.id,
        run_number: run.run_number,
        workflow_name: event.workflow.name.clone(),
        status: run.status.clone(),
        conclusion: run.conclusion.clone(),
        started_at: Some(created_at),
        completed_at: Some(updated_at),
        git_info_id,
    };

    let (pipeline_id, _) = pipeline_service::upsert_pipeline(store, candidate)
        .await
        .map_err(|e| {
            tracing::error!(run_id = run.id, "Pipeline upsert failed: {e}");
            WebhookError::Reconciliation(e)
        })?;

    let owner = &event.repository.owner.login;
    let repo = &event.repository.name;
    let jobs_recorded =
        match job_service::fetch_jobs(jobs, store, owner, repo, run.id, pipeline_id).await {
            Ok(records) => match job_service::insert_jobs(store, records).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(%pipeline_id, "Job records not stored: {e}");
                    0
                }
            },
            Err(e) => {
                tracing::warn!(
                    %pipeline_id,
                    run_id = run.id,
                    kind = e.kind(),
                    "Job detail fetch failed: {e}"
                );
                0
            }
        };

    tracing::info!(
        run_id = run.id,
        %pipeline_id,
        jobs_recorded,
        "Workflow run processed"
    );
    Ok(WebhookOutcome::Processed {
        pipeline_id,
        jobs_recorded,
    })
}

fn commit_candidate(event: &WorkflowRunEvent) -> CommitCandidate {
    let run = &event.workflow_run;
    let head = run.head_commit.as_ref();
    let author_name = head
        .map(|h| h.author.name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| event.sender.login.clone());

    CommitCandidate {
        repo_name: event.repository.name.clone(),
        branch: run.head_branch.clone(),
        commit_sha: run.head_sha.clone(),
        author_name,
        author_email: head.map(|h| h.author.email.clone()).unwrap_or_default(),
        commit_message: head.map(|h| h.message.clone()).unwrap_or_default(),
        committed_at: head.and_then(|h| parse_timestamp(&h.timestamp)),
    }
}
