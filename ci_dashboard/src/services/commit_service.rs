//! Commit reconciliation: one `git_info` row per commit hash.

use uuid::Uuid;

use crate::models::commit::{CommitCandidate, NewCommitInfo};
use crate::store::{PipelineStore, StoreError};

/// Return the id of the commit with `candidate.commit_sha`, inserting it
/// first if it is unknown. Existing rows are never rewritten.
pub async fn upsert_commit(
    store: &dyn PipelineStore,
    candidate: CommitCandidate,
) -> Result<Uuid, StoreError> {
    if let Some(existing) = store.find_commit_by_sha(&candidate.commit_sha).await? {
        tracing::debug!(
            commit_id = %existing.id,
            commit_sha = %existing.commit_sha,
            "Commit already recorded"
        );
        return Ok(existing.id);
    }

    let id = Uuid::new_v4();
    let new_commit = NewCommitInfo::from_candidate(id, candidate);
    store.insert_commit(&new_commit).await?;

    tracing::info!(
        commit_id = %id,
        commit_sha = %new_commit.commit_sha,
        branch = %new_commit.branch,
        "Commit recorded"
    );
    Ok(id)
}
