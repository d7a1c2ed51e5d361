//! Diesel table definitions for the pipeline dashboard.
//!
//! Tables: git_info, pipelines, jobs_steps.
//! Rows are linked by nullable foreign references only; the reconcilers
//! own uniqueness through lookup-then-insert.

diesel::table! {
    git_info (id) {
        id -> Uuid,
        repo_name -> Varchar,
        branch -> Varchar,
        commit_sha -> Varchar,
        author_name -> Varchar,
        author_email -> Varchar,
        commit_message -> Text,
        committed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pipelines (id) {
        id -> Uuid,
        run_id -> Int8,
        run_number -> Int4,
        workflow_name -> Varchar,
        status -> Varchar,
        conclusion -> Varchar,
        started_at -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
        git_info_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    jobs_steps (id) {
        id -> Uuid,
        seq -> Int8,
        pipeline_id -> Uuid,
        job_id -> Varchar,
        name -> Varchar,
        kind -> Varchar,
        status -> Varchar,
        conclusion -> Varchar,
        started_at -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
        duration_sec -> Int8,
        attempt -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(pipelines -> git_info (git_info_id));
diesel::joinable!(jobs_steps -> pipelines (pipeline_id));

diesel::allow_tables_to_appear_in_same_query!(git_info, pipelines, jobs_steps);
