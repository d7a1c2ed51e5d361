//! Datastore port for the reconcilers and the view assembler.
//!
//! `PipelineStore` is the only way the rest of the crate touches stored
//! records. The PostgreSQL adapter serves production; the in-memory
//! adapter backs `--in-memory` runs and the test suite.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::commit::{CommitInfo, NewCommitInfo};
use crate::models::job_step::{JobStep, NewJobStep};
use crate::models::pipeline::{NewPipelineRun, PipelineRun, PipelineStateUpdate};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection pool: {0}")]
    Pool(String),
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("record not found: {0}")]
    Missing(String),
}

/// Generic lookup/insert/update interface over the three record kinds.
///
/// No operation spans more than one statement, so callers get no
/// transactional guarantees across calls.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn find_commit_by_sha(&self, commit_sha: &str) -> Result<Option<CommitInfo>, StoreError>;

    async fn find_commit(&self, id: Uuid) -> Result<Option<CommitInfo>, StoreError>;

    async fn insert_commit(&self, commit: &NewCommitInfo) -> Result<(), StoreError>;

    async fn find_pipeline_by_run_id(&self, run_id: i64)
        -> Result<Option<PipelineRun>, StoreError>;

    /// Overwrite the mutable state of an existing pipeline row.
    async fn update_pipeline(
        &self,
        id: Uuid,
        update: &PipelineStateUpdate,
    ) -> Result<(), StoreError>;

    async fn insert_pipeline(&self, pipeline: &NewPipelineRun) -> Result<(), StoreError>;

    /// All pipelines, newest `created_at` first.
    async fn list_pipelines(&self) -> Result<Vec<PipelineRun>, StoreError>;

    /// Highest attempt recorded for `(pipeline_id, job_id)`, if any.
    async fn latest_attempt(
        &self,
        pipeline_id: Uuid,
        job_id: &str,
    ) -> Result<Option<i32>, StoreError>;

    /// Append records in one batch. Every record must carry an id.
    async fn insert_job_steps(&self, records: &[NewJobStep]) -> Result<(), StoreError>;

    /// All job/step records of a pipeline in insertion order.
    async fn list_job_steps(&self, pipeline_id: Uuid) -> Result<Vec<JobStep>, StoreError>;
}
