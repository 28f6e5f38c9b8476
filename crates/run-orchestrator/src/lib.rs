//! Run orchestration: one owned browser session per execution, steps
//! classified and dispatched sequentially, fail-fast on the first error,
//! with per-step screenshot artifacts and live progress on the bus.

mod orchestrator;
mod screencast;

pub use orchestrator::{OrchestratorConfig, RunOrchestrator, StepError};
