//! Startup migration for the dashboard tables.

use diesel_async::{AsyncPgConnection, SimpleAsyncConnection};

/// SQL migration for dashboard tables.
///
/// Safe to run on every boot; every statement is idempotent.
pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS git_info (
    id              UUID PRIMARY KEY,
    repo_name       VARCHAR(255) NOT NULL DEFAULT '',
    branch          VARCHAR(255) NOT NULL DEFAULT '',
    commit_sha      VARCHAR(64) NOT NULL,
    author_name     VARCHAR(255) NOT NULL DEFAULT '',
    author_email    VARCHAR(255) NOT NULL DEFAULT '',
    commit_message  TEXT NOT NULL DEFAULT '',
    committed_at    TIMESTAMPTZ,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_git_info_commit_sha ON git_info (commit_sha);

CREATE TABLE IF NOT EXISTS pipelines (
    id              UUID PRIMARY KEY,
    run_id          BIGINT NOT NULL,
    run_number      INTEGER NOT NULL DEFAULT 0,
    workflow_name   VARCHAR(255) NOT NULL DEFAULT '',
    status          VARCHAR(32) NOT NULL DEFAULT '',
    conclusion      VARCHAR(32) NOT NULL DEFAULT '',
    started_at      TIMESTAMPTZ,
    completed_at    TIMESTAMPTZ,
    git_info_id     UUID REFERENCES git_info(id),
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_pipelines_run_id ON pipelines (run_id);
CREATE INDEX IF NOT EXISTS idx_pipelines_created ON pipelines (created_at DESC);

CREATE TABLE IF NOT EXISTS jobs_steps (
    id              UUID PRIMARY KEY,
    seq             BIGSERIAL NOT NULL,
    pipeline_id     UUID NOT NULL REFERENCES pipelines(id),
    job_id          VARCHAR(64) NOT NULL,
    name            VARCHAR(255) NOT NULL DEFAULT '',
    kind            VARCHAR(8) NOT NULL CHECK (kind IN ('job', 'step')),
    status          VARCHAR(32) NOT NULL DEFAULT '',
    conclusion      VARCHAR(32) NOT NULL DEFAULT '',
    started_at      TIMESTAMPTZ,
    completed_at    TIMESTAMPTZ,
    duration_sec    BIGINT NOT NULL DEFAULT 0,
    attempt         INTEGER NOT NULL DEFAULT 1,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_jobs_steps_pipeline_job ON jobs_steps (pipeline_id, job_id);
CREATE INDEX IF NOT EXISTS idx_jobs_steps_seq ON jobs_steps (pipeline_id, seq);
"#;

/// Run the dashboard migration (idempotent).
pub async fn run_migration(conn: &mut AsyncPgConnection) -> anyhow::Result<()> {
    conn.batch_execute(MIGRATION_SQL)
        .await
        .map_err(|e| anyhow::anyhow!("dashboard migration failed: {e}"))?;
    Ok(())
}
