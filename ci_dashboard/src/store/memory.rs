//! In-memory implementation of `PipelineStore`.
//!
//! Mirrors the PostgreSQL adapter's ordering rules. All records are
//! lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PipelineStore, StoreError};
use crate::models::commit::{CommitInfo, NewCommitInfo};
use crate::models::job_step::{JobStep, NewJobStep};
use crate::models::pipeline::{NewPipelineRun, PipelineRun, PipelineStateUpdate};

#[derive(Default)]
struct Tables {
    commits: Vec<CommitInfo>,
    pipelines: Vec<PipelineRun>,
    job_steps: Vec<JobStep>,
    next_seq: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn commit_count(&self) -> usize {
        self.tables.read().await.commits.len()
    }

    #[cfg(test)]
    pub async fn pipeline_count(&self) -> usize {
        self.tables.read().await.pipelines.len()
    }

    #[cfg(test)]
    pub async fn job_step_count(&self) -> usize {
        self.tables.read().await.job_steps.len()
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn find_commit_by_sha(&self, commit_sha: &str) -> Result<Option<CommitInfo>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .commits
            .iter()
            .find(|c| c.commit_sha == commit_sha)
            .cloned())
    }

    async fn find_commit(&self, id: Uuid) -> Result<Option<CommitInfo>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.commits.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_commit(&self, commit: &NewCommitInfo) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.commits.push(CommitInfo {
            id: commit.id,
            repo_name: commit.repo_name.clone(),
            branch: commit.branch.clone(),
            commit_sha: commit.commit_sha.clone(),
            author_name: commit.author_name.clone(),
            author_email: commit.author_email.clone(),
            commit_message: commit.commit_message.clone(),
            committed_at: commit.committed_at,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn find_pipeline_by_run_id(
        &self,
        run_id: i64,
    ) -> Result<Option<PipelineRun>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.pipelines.iter().find(|p| p.run_id == run_id).cloned())
    }

    async fn update_pipeline(
        &self,
        id: Uuid,
        update: &PipelineStateUpdate,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let pipeline = tables
            .pipelines
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::Missing(format!("pipeline {id}")))?;
        pipeline.status = update.status.clone();
        pipeline.conclusion = update.conclusion.clone();
        pipeline.started_at = update.started_at;
        pipeline.completed_at = update.completed_at;
        Ok(())
    }

    async fn insert_pipeline(&self, pipeline: &NewPipelineRun) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.pipelines.push(PipelineRun {
            id: pipeline.id,
            run_id: pipeline.run_id,
            run_number: pipeline.run_number,
            workflow_name: pipeline.workflow_name.clone(),
            status: pipeline.status.clone(),
            conclusion: pipeline.conclusion.clone(),
            started_at: pipeline.started_at,
            completed_at: pipeline.completed_at,
            git_info_id: pipeline.git_info_id,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineRun>, StoreError> {
        let tables = self.tables.read().await;
        // Same order as the PostgreSQL adapter: created_at desc, then run_id desc.
        let mut pipelines = tables.pipelines.clone();
        pipelines.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.run_id.cmp(&a.run_id))
        });
        Ok(pipelines)
    }

    async fn latest_attempt(
        &self,
        pipeline_id: Uuid,
        job_id: &str,
    ) -> Result<Option<i32>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .job_steps
            .iter()
            .filter(|j| j.pipeline_id == pipeline_id && j.job_id == job_id)
            .map(|j| j.attempt)
            .max())
    }

    async fn insert_job_steps(&self, records: &[NewJobStep]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        for record in records {
            tables.next_seq += 1;
            let seq = tables.next_seq;
            tables.job_steps.push(JobStep {
                id: record.id.unwrap_or_else(Uuid::new_v4),
                seq,
                pipeline_id: record.pipeline_id,
                job_id: record.job_id.clone(),
                name: record.name.clone(),
                kind: record.kind.clone(),
                status: record.status.clone(),
                conclusion: record.conclusion.clone(),
                started_at: record.started_at,
                completed_at: record.completed_at,
                duration_sec: record.duration_sec,
                attempt: record.attempt,
                created_at: now,
            });
        }
        Ok(())
    }

    async fn list_job_steps(&self, pipeline_id: Uuid) -> Result<Vec<JobStep>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .job_steps
            .iter()
            .filter(|j| j.pipeline_id == pipeline_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job_step::JobKind;

    fn new_pipeline(run_id: i64) -> NewPipelineRun {
        NewPipelineRun {
            id: Uuid::new_v4(),
            run_id,
            run_number: 1,
            workflow_name: "CI".to_string(),
            status: "queued".to_string(),
            conclusion: String::new(),
            started_at: None,
            completed_at: None,
            git_info_id: None,
        }
    }

    fn record(pipeline_id: Uuid, job_id: &str, attempt: i32) -> NewJobStep {
        NewJobStep {
            id: None,
            pipeline_id,
            job_id: job_id.to_string(),
            name: "build".to_string(),
            kind: JobKind::Job.as_str().to_string(),
            status: "completed".to_string(),
            conclusion: "success".to_string(),
            started_at: None,
            completed_at: None,
            duration_sec: 0,
            attempt,
        }
    }

    #[tokio::test]
    async fn list_pipelines_returns_newest_first() {
        let store = MemoryStore::new();
        store.insert_pipeline(&new_pipeline(1)).await.unwrap();
        store.insert_pipeline(&new_pipeline(2)).await.unwrap();
        store.insert_pipeline(&new_pipeline(3)).await.unwrap();

        let run_ids: Vec<i64> = store
            .list_pipelines()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.run_id)
            .collect();
        assert_eq!(run_ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn created_at_ties_break_on_run_id() {
        let store = MemoryStore::new();
        store.insert_pipeline(&new_pipeline(5)).await.unwrap();
        store.insert_pipeline(&new_pipeline(9)).await.unwrap();
        store.insert_pipeline(&new_pipeline(2)).await.unwrap();
        {
            let mut tables = store.tables.write().await;
            let stamp = tables.pipelines[0].created_at;
            for p in tables.pipelines.iter_mut() {
                p.created_at = stamp;
            }
        }

        let run_ids: Vec<i64> = store
            .list_pipelines()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.run_id)
            .collect();
        assert_eq!(run_ids, vec![9, 5, 2]);
    }

    #[tokio::test]
    async fn update_of_unknown_pipeline_is_an_error() {
        let store = MemoryStore::new();
        let update = PipelineStateUpdate {
            status: "completed".to_string(),
            conclusion: "success".to_string(),
            started_at: None,
            completed_at: None,
        };
        let err = store.update_pipeline(Uuid::new_v4(), &update).await.unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)));
    }

    #[tokio::test]
    async fn latest_attempt_is_scoped_to_pipeline_and_job() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store
            .insert_job_steps(&[record(a, "7", 1), record(a, "7", 2), record(b, "7", 5)])
            .await
            .unwrap();

        assert_eq!(store.latest_attempt(a, "7").await.unwrap(), Some(2));
        assert_eq!(store.latest_attempt(b, "7").await.unwrap(), Some(5));
        assert_eq!(store.latest_attempt(a, "8").await.unwrap(), None);
    }

    #[tokio::test]
    async fn job_steps_keep_insertion_order() {
        let store = MemoryStore::new();
        let p = Uuid::new_v4();
        store
            .insert_job_steps(&[record(p, "2", 1), record(p, "1", 1)])
            .await
            .unwrap();
        store.insert_job_steps(&[record(p, "3", 1)]).await.unwrap();

        let steps = store.list_job_steps(p).await.unwrap();
        let ids: Vec<&str> = steps.iter().map(|s| s.job_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
        assert!(steps.windows(2).all(|w| w[0].seq < w[1].seq));
    }
}
