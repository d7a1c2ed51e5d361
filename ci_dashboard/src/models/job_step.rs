//! jobs_steps — Append-only history of jobs and their steps per attempt.

use std::fmt;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::jobs_steps;

/// Whether a record describes a whole job or one of its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Job,
    Step,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Job => "job",
            JobKind::Step => "step",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = jobs_steps)]
pub struct JobStep {
    pub id: Uuid,
    pub seq: i64,
    pub pipeline_id: Uuid,
    pub job_id: String,
    pub name: String,
    pub kind: String,
    pub status: String,
    pub conclusion: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_sec: i64,
    pub attempt: i32,
    pub created_at: DateTime<Utc>,
}

impl JobStep {
    pub fn is_step(&self) -> bool {
        self.kind == JobKind::Step.as_str()
    }
}

/// A record to append. `id` is filled in by the job reconciler when absent.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = jobs_steps)]
pub struct NewJobStep {
    pub id: Option<Uuid>,
    pub pipeline_id: Uuid,
    pub job_id: String,
    pub name: String,
    pub kind: String,
    pub status: String,
    pub conclusion: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_sec: i64,
    pub attempt: i32,
}
