//! pipelines — One workflow run, keyed by the platform's run id.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::pipelines;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = pipelines)]
pub struct PipelineRun {
    pub id: Uuid,
    pub run_id: i64,
    pub run_number: i32,
    pub workflow_name: String,
    pub status: String,
    pub conclusion: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub git_info_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Candidate pipeline decoded from a webhook delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineCandidate {
    pub run_id: i64,
    pub run_number: i32,
    pub workflow_name: String,
    pub status: String,
    pub conclusion: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub git_info_id: Option<Uuid>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pipelines)]
pub struct NewPipelineRun {
    pub id: Uuid,
    pub run_id: i64,
    pub run_number: i32,
    pub workflow_name: String,
    pub status: String,
    pub conclusion: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub git_info_id: Option<Uuid>,
}

impl NewPipelineRun {
    pub fn from_candidate(id: Uuid, candidate: PipelineCandidate) -> Self {
        Self {
            id,
            run_id: candidate.run_id,
            run_number: candidate.run_number,
            workflow_name: candidate.workflow_name,
            status: candidate.status,
            conclusion: candidate.conclusion,
            started_at: candidate.started_at,
            completed_at: candidate.completed_at,
            git_info_id: candidate.git_info_id,
        }
    }
}

/// Fields overwritten when a known run is delivered again.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = pipelines, treat_none_as_null = true)]
pub struct PipelineStateUpdate {
    pub status: String,
    pub conclusion: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&PipelineCandidate> for PipelineStateUpdate {
    fn from(candidate: &PipelineCandidate) -> Self {
        Self {
            status: candidate.status.clone(),
            conclusion: candidate.conclusion.clone(),
            started_at: candidate.started_at,
            completed_at: candidate.completed_at,
        }
    }
}
