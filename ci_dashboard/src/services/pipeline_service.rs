//! Pipeline reconciliation: one `pipelines` row per workflow run id.

use uuid::Uuid;

use crate::models::pipeline::{NewPipelineRun, PipelineCandidate, PipelineStateUpdate};
use crate::store::{PipelineStore, StoreError};

/// Whether an upsert created the row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Created,
    Updated,
}

impl UpsertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UpsertKind::Created => "created",
            UpsertKind::Updated => "updated",
        }
    }
}

/// Insert the run, or overwrite status/conclusion/timestamps of the
/// row already stored for `candidate.run_id`. Returns the row id.
///
/// The commit reference is only written on insert.
pub async fn upsert_pipeline(
    store: &dyn PipelineStore,
    candidate: PipelineCandidate,
) -> Result<(Uuid, UpsertKind), StoreError> {
    if let Some(existing) = store.find_pipeline_by_run_id(candidate.run_id).await? {
        let update = PipelineStateUpdate::from(&candidate);
        store.update_pipeline(existing.id, &update).await?;

        crate::metrics::pipeline_upserted(UpsertKind::Updated.as_str());
        tracing::info!(
            pipeline_id = %existing.id,
            run_id = candidate.run_id,
            status = %update.status,
            conclusion = %update.conclusion,
            "Pipeline updated"
        );
        return Ok((existing.id, UpsertKind::Updated));
    }

    let id = Uuid::new_v4();
    let new_pipeline = NewPipelineRun::from_candidate(id, candidate);
    store.insert_pipeline(&new_pipeline).await?;

    crate::metrics::pipeline_upserted(UpsertKind::Created.as_str());
    tracing::info!(
        pipeline_id = %id,
        run_id = new_pipeline.run_id,
        workflow = %new_pipeline.workflow_name,
        "Pipeline created"
    );
    Ok((id, UpsertKind::Created))
}
