//! Test doubles shared by the route and ingestion tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::commit::{CommitInfo, NewCommitInfo};
use crate::models::job_step::{JobStep, NewJobStep};
use crate::models::pipeline::{NewPipelineRun, PipelineRun, PipelineStateUpdate};
use crate::services::github_service::{JobSource, RemoteJob};
use crate::services::job_service::FetchError;
use crate::store::{MemoryStore, PipelineStore, StoreError};

/// `MemoryStore` wrapper that can fail selected operations and counts calls.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_commits: bool,
    pub fail_pipelines: bool,
    pub fail_job_inserts: bool,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_commits() -> Self {
        Self {
            fail_commits: true,
            ..Self::default()
        }
    }

    pub fn failing_pipelines() -> Self {
        Self {
            fail_pipelines: true,
            ..Self::default()
        }
    }

    pub fn failing_job_inserts() -> Self {
        Self {
            fail_job_inserts: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn injected() -> StoreError {
    StoreError::Pool("injected failure".to_string())
}

#[async_trait]
impl PipelineStore for FlakyStore {
    async fn find_commit_by_sha(&self, commit_sha: &str) -> Result<Option<CommitInfo>, StoreError> {
        self.touch();
        if self.fail_commits {
            return Err(injected());
        }
        self.inner.find_commit_by_sha(commit_sha).await
    }

    async fn find_commit(&self, id: Uuid) -> Result<Option<CommitInfo>, StoreError> {
        self.touch();
        if self.fail_commits {
            return Err(injected());
        }
        self.inner.find_commit(id).await
    }

    async fn insert_commit(&self, commit: &NewCommitInfo) -> Result<(), StoreError> {
        self.touch();
        if self.fail_commits {
            return Err(injected());
        }
        self.inner.insert_commit(commit).await
    }

    async fn find_pipeline_by_run_id(
        &self,
        run_id: i64,
    ) -> Result<Option<PipelineRun>, StoreError> {
        self.touch();
        if self.fail_pipelines {
            return Err(injected());
        }
        self.inner.find_pipeline_by_run_id(run_id).await
    }

    async fn update_pipeline(
        &self,
        id: Uuid,
        update: &PipelineStateUpdate,
    ) -> Result<(), StoreError> {
        self.touch();
        if self.fail_pipelines {
            return Err(injected());
        }
        self.inner.update_pipeline(id, update).await
    }

    async fn insert_pipeline(&self, pipeline: &NewPipelineRun) -> Result<(), StoreError> {
        self.touch();
        if self.fail_pipelines {
            return Err(injected());
        }
        self.inner.insert_pipeline(pipeline).await
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineRun>, StoreError> {
        self.touch();
        if self.fail_pipelines {
            return Err(injected());
        }
        self.inner.list_pipelines().await
    }

    async fn latest_attempt(
        &self,
        pipeline_id: Uuid,
        job_id: &str,
    ) -> Result<Option<i32>, StoreError> {
        self.touch();
        self.inner.latest_attempt(pipeline_id, job_id).await
    }

    async fn insert_job_steps(&self, records: &[NewJobStep]) -> Result<(), StoreError> {
        self.touch();
        if self.fail_job_inserts {
            return Err(injected());
        }
        self.inner.insert_job_steps(records).await
    }

    async fn list_job_steps(&self, pipeline_id: Uuid) -> Result<Vec<JobStep>, StoreError> {
        self.touch();
        self.inner.list_job_steps(pipeline_id).await
    }
}

/// Job source returning canned jobs, or an upstream error when `jobs` is `None`.
#[derive(Default)]
pub struct StubJobs {
    pub jobs: Option<Vec<RemoteJob>>,
    requests: Mutex<Vec<(String, String, i64)>>,
}

impl StubJobs {
    pub fn with_jobs(jobs: Vec<RemoteJob>) -> Self {
        Self {
            jobs: Some(jobs),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<(String, String, i64)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobSource for StubJobs {
    async fn run_jobs(
        &self,
        owner: &str,
        repo: &str,
        run_id: i64,
    ) -> Result<Vec<RemoteJob>, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((owner.to_string(), repo.to_string(), run_id));
        match &self.jobs {
            Some(jobs) => Ok(jobs.clone()),
            None => Err(FetchError::Upstream("status 500: boom".to_string())),
        }
    }
}

pub fn remote_job(id: i64, name: &str) -> RemoteJob {
    RemoteJob {
        id,
        name: name.to_string(),
        status: "completed".to_string(),
        conclusion: Some("success".to_string()),
        started_at: Some("2024-05-01T10:00:00Z".to_string()),
        completed_at: Some("2024-05-01T10:01:35Z".to_string()),
        steps: Vec::new(),
    }
}

/// A `workflow_run` delivery as GitHub sends it (trimmed to the fields we read).
pub fn workflow_run_payload(run_id: i64, status: &str, conclusion: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "action": "completed",
        "workflow": { "name": "CI" },
        "repository": {
            "name": "widgets",
            "full_name": "octo/widgets",
            "owner": { "login": "octo" }
        },
        "sender": { "login": "alice" },
        "workflow_run": {
            "id": run_id,
            "run_number": 17,
            "head_branch": "main",
            "head_sha": "0123456789abcdef0123456789abcdef01234567",
            "status": status,
            "conclusion": conclusion,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:01:35Z",
            "head_commit": {
                "message": "Fix flaky test",
                "timestamp": "2024-05-01T09:58:00Z",
                "author": { "name": "Alice", "email": "alice@example.com" }
            }
        }
    })
}
