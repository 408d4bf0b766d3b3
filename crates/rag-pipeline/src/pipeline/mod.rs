//! End-to-end pipeline orchestration

mod orchestrator;

pub use orchestrator::{new_run_id, PipelineOrchestrator, Providers};
