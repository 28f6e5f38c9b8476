//! The engine facade: wires the browser driver, artifact store, bus,
//! history, orchestrator and scheduler into one handle.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use artifact_store::{ArtifactStore, FsArtifactStore, InMemoryArtifactStore};
use browser_port::BrowserDriver;
use element_resolver::SelectorSuggester;
use progress_bus::{ProgressBus, RunEvent};
use run_history::{ExecutionSummary, RunLedger};
use run_orchestrator::RunOrchestrator;
use run_scheduler::{RunLauncher, RunScheduler, ScheduleError};
use steppilot_core_types::{
    ExecutionId, ExecutionRecord, Schedule, ScheduleId, TestCase, TestCaseId,
};

use crate::config::EngineConfig;
use crate::registry::TestCaseRegistry;

/// Bridges the scheduler's launch port onto the orchestrator.
struct OrchestratorLauncher(Arc<RunOrchestrator>);

impl RunLauncher for OrchestratorLauncher {
    fn launch(&self, case: TestCase) -> ExecutionId {
        self.0.run_test_case(case)
    }
}

pub struct Engine {
    registry: Arc<TestCaseRegistry>,
    orchestrator: Arc<RunOrchestrator>,
    scheduler: Arc<RunScheduler>,
    bus: Arc<ProgressBus>,
    ledger: Arc<RunLedger>,
}

impl Engine {
    /// Assemble an engine over the given browser driver. The artifact
    /// store follows the configuration: filesystem when a directory is
    /// configured, in-memory otherwise.
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        suggester: Option<Arc<dyn SelectorSuggester>>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let artifacts: Arc<dyn ArtifactStore> = match &config.artifact_dir {
            Some(dir) => FsArtifactStore::new(dir.clone()),
            None => InMemoryArtifactStore::new(),
        };
        Self::with_artifact_store(driver, artifacts, suggester, config)
    }

    pub fn with_artifact_store(
        driver: Arc<dyn BrowserDriver>,
        artifacts: Arc<dyn ArtifactStore>,
        suggester: Option<Arc<dyn SelectorSuggester>>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let bus = ProgressBus::new(256);
        let ledger = Arc::new(RunLedger::new(config.history_cap));
        let registry = TestCaseRegistry::new();

        info!(history_cap = ledger.cap(), "assembling engine");

        let orchestrator = RunOrchestrator::new(
            driver,
            artifacts,
            Arc::clone(&bus),
            Arc::clone(&ledger),
            suggester,
            config.orchestrator,
        );

        let scheduler = RunScheduler::new(
            Arc::clone(&registry) as _,
            Arc::new(OrchestratorLauncher(Arc::clone(&orchestrator))) as _,
            Arc::clone(&bus),
        );

        Arc::new(Self {
            registry,
            orchestrator,
            scheduler,
            bus,
            ledger,
        })
    }

    pub fn test_cases(&self) -> &TestCaseRegistry {
        &self.registry
    }

    /// Start a run and return its id; progress arrives on the bus.
    pub fn run_test_case(&self, case: TestCase) -> ExecutionId {
        self.orchestrator.run_test_case(case)
    }

    /// Start a run for a stored test case.
    pub fn run_stored(&self, id: &TestCaseId) -> Option<ExecutionId> {
        self.registry
            .get(id)
            .map(|case| self.orchestrator.run_test_case(case))
    }

    pub fn stop_execution(&self, id: &ExecutionId) -> bool {
        self.orchestrator.stop(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        use progress_bus::EventBus;
        self.bus.subscribe()
    }

    /// Newest-first history summaries (artifacts as presence flags).
    pub fn execution_history(&self, limit: usize) -> Vec<ExecutionSummary> {
        self.ledger.summaries(limit)
    }

    /// Full record of a finished execution.
    pub fn execution(&self, id: &ExecutionId) -> Option<ExecutionRecord> {
        self.ledger.get(id)
    }

    pub fn add_schedule(&self, schedule: Schedule) -> Result<ScheduleId, ScheduleError> {
        self.scheduler.add_schedule(schedule)
    }

    pub fn remove_schedule(&self, id: &ScheduleId) -> bool {
        self.scheduler.remove_schedule(id)
    }

    pub fn schedules(&self) -> Vec<Schedule> {
        self.scheduler.schedules()
    }
}
