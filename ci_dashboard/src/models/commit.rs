//! git_info — The commit a pipeline run was triggered for.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::git_info;

/// Stored commit record. At most one row per `commit_sha`; never updated.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = git_info)]
pub struct CommitInfo {
    pub id: Uuid,
    pub repo_name: String,
    pub branch: String,
    pub commit_sha: String,
    pub author_name: String,
    pub author_email: String,
    pub commit_message: String,
    pub committed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Candidate commit decoded from a webhook delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitCandidate {
    pub repo_name: String,
    pub branch: String,
    pub commit_sha: String,
    pub author_name: String,
    pub author_email: String,
    pub commit_message: String,
    pub committed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = git_info)]
pub struct NewCommitInfo {
    pub id: Uuid,
    pub repo_name: String,
    pub branch: String,
    pub commit_sha: String,
    pub author_name: String,
    pub author_email: String,
    pub commit_message: String,
    pub committed_at: Option<DateTime<Utc>>,
}

impl NewCommitInfo {
    pub fn from_candidate(id: Uuid, candidate: CommitCandidate) -> Self {
        Self {
            id,
            repo_name: candidate.repo_name,
            branch: candidate.branch,
            commit_sha: candidate.commit_sha,
            author_name: candidate.author_name,
            author_email: candidate.author_email,
            commit_message: candidate.commit_message,
            committed_at: candidate.committed_at,
        }
    }
}
