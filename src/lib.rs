//! StepPilot: a natural-language web test automation engine.
//!
//! Test cases are lists of plain-English steps ("Navigate to example.com",
//! "Search for laptop", "Select 2nd product"). The engine classifies each
//! step into a typed action, resolves the target element through layered
//! selector heuristics (with an optional AI-backed suggester as a
//! fallback), drives a real browser through a narrow adapter port, and
//! records a screenshot artifact per step. Runs are fail-fast and
//! sequential; progress and live screencast frames stream over a
//! broadcast bus while a bounded in-memory ledger keeps the most recent
//! execution records. One-shot and cron schedules launch stored test
//! cases unattended.
//!
//! ```no_run
//! use steppilot::{Engine, EngineConfig, TestCase};
//! # use steppilot::browser::fake::{ScriptedDriver, ScriptedPage};
//!
//! # async fn demo() {
//! # let driver = ScriptedDriver::new(ScriptedPage::new());
//! let engine = Engine::new(driver, None, EngineConfig::default());
//! let mut events = engine.subscribe();
//!
//! let case = TestCase::new(
//!     "shopping smoke",
//!     vec![
//!         "Open browser".into(),
//!         "Navigate to example.com".into(),
//!         "Search for \"laptop\"".into(),
//!     ],
//! );
//! let id = engine.run_test_case(case);
//! while let Ok(_event) = events.recv().await {
//!     // step progress, live frames, the final record
//! }
//! # let _ = id;
//! # }
//! ```

mod config;
mod engine;
mod registry;
mod telemetry;

pub use config::EngineConfig;
pub use engine::Engine;
pub use registry::TestCaseRegistry;
pub use telemetry::init_tracing;

pub use steppilot_core_types::{
    EngineError, ExecutionId, ExecutionRecord, RunStatus, Schedule, ScheduleId, StepResult,
    StepStatus, TestCase, TestCaseId, Trigger,
};

pub use progress_bus::{
    LiveFrame, ProgressBus, RunEvent, ScheduleTriggered, StepPhase, StepProgress,
};
pub use run_history::{ExecutionSummary, StepSummary};
pub use run_orchestrator::OrchestratorConfig;
pub use run_scheduler::ScheduleError;

pub use step_classifier::{classify, normalize_steps, ActionIntent};

/// Browser adapter ports and the scripted in-memory implementation.
pub mod browser {
    pub use browser_port::*;
}

/// Element resolution: selector plans, scoring, the suggester bridge.
pub mod resolve {
    pub use element_resolver::*;
}

/// Artifact persistence backends.
pub mod artifacts {
    pub use artifact_store::*;
}
