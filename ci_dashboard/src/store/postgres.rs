//! PostgreSQL implementation of `PipelineStore` on diesel-async.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use super::{PipelineStore, StoreError};
use crate::models::commit::{CommitInfo, NewCommitInfo};
use crate::models::job_step::{JobStep, NewJobStep};
use crate::models::pipeline::{NewPipelineRun, PipelineRun, PipelineStateUpdate};
use crate::schema::{git_info, jobs_steps, pipelines};

pub type PgPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Build a connection pool for `database_url`. Connections are opened lazily.
    pub fn connect(database_url: &str, max_connections: usize) -> Result<Self, StoreError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager)
            .max_size(max_connections)
            .build()
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn conn(&self) -> Result<Object<AsyncPgConnection>, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl PipelineStore for PgStore {
    async fn find_commit_by_sha(&self, commit_sha: &str) -> Result<Option<CommitInfo>, StoreError> {
        let mut conn = self.conn().await?;
        let result = git_info::table
            .filter(git_info::commit_sha.eq(commit_sha))
            .select(CommitInfo::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(result)
    }

    async fn find_commit(&self, id: Uuid) -> Result<Option<CommitInfo>, StoreError> {
        let mut conn = self.conn().await?;
        let result = git_info::table
            .find(id)
            .select(CommitInfo::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(result)
    }

    async fn insert_commit(&self, commit: &NewCommitInfo) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        diesel::insert_into(git_info::table)
            .values(commit)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn find_pipeline_by_run_id(
        &self,
        run_id: i64,
    ) -> Result<Option<PipelineRun>, StoreError> {
        let mut conn = self.conn().await?;
        let result = pipelines::table
            .filter(pipelines::run_id.eq(run_id))
            .select(PipelineRun::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(result)
    }

    async fn update_pipeline(
        &self,
        id: Uuid,
        update: &PipelineStateUpdate,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(pipelines::table.find(id))
            .set(update)
            .execute(&mut conn)
            .await?;
        if updated == 0 {
            return Err(StoreError::Missing(format!("pipeline {id}")));
        }
        Ok(())
    }

    async fn insert_pipeline(&self, pipeline: &NewPipelineRun) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        diesel::insert_into(pipelines::table)
            .values(pipeline)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineRun>, StoreError> {
        let mut conn = self.conn().await?;
        let results = pipelines::table
            .order((pipelines::created_at.desc(), pipelines::run_id.desc()))
            .select(PipelineRun::as_select())
            .load(&mut conn)
            .await?;
        Ok(results)
    }

    async fn latest_attempt(
        &self,
        pipeline_id: Uuid,
        job_id: &str,
    ) -> Result<Option<i32>, StoreError> {
        use diesel::dsl::max;

        let mut conn = self.conn().await?;
        let result: Option<i32> = jobs_steps::table
            .filter(jobs_steps::pipeline_id.eq(pipeline_id))
            .filter(jobs_steps::job_id.eq(job_id))
            .select(max(jobs_steps::attempt))
            .get_result(&mut conn)
            .await?;
        Ok(result)
    }

    async fn insert_job_steps(&self, records: &[NewJobStep]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        diesel::insert_into(jobs_steps::table)
            .values(records)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_job_steps(&self, pipeline_id: Uuid) -> Result<Vec<JobStep>, StoreError> {
        let mut conn = self.conn().await?;
        let results = jobs_steps::table
            .filter(jobs_steps::pipeline_id.eq(pipeline_id))
            .order(jobs_steps::seq.asc())
            .select(JobStep::as_select())
            .load(&mut conn)
            .await?;
        Ok(results)
    }
}
