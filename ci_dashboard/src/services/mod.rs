//! Ingestion services: signature checks, timestamp parsing, and the
//! commit/pipeline/job reconcilers.

pub mod commit_service;
pub mod github_service;
pub mod job_service;
pub mod pipeline_service;
pub mod timestamps;
