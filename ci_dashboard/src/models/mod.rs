//! Dashboard data models: commits, pipeline runs, job/step history.

pub mod commit;
pub mod job_step;
pub mod pipeline;
