//! The run state machine.
//!
//! Each execution owns exactly one browser session for its whole
//! lifetime. Steps run strictly in order and the first failure ends the
//! run; cleanup (stream stop, session close, registry removal) happens on
//! every exit path, and the completion event is published exactly once,
//! after the record has been persisted to history.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use artifact_store::ArtifactStore;
use browser_port::{BrowserDriver, BrowserError, FrameStreamConfig, PagePort};
use element_resolver::{
    infer_freeform_action, ElementResolver, FreeformAction, ResolveError, ResolverConfig,
    SelectorSuggester,
};
use progress_bus::{EventBus, ProgressBus, RunEvent, StepPhase, StepProgress};
use run_history::RunLedger;
use step_classifier::{classify, ActionIntent};
use steppilot_core_types::{ExecutionId, ExecutionRecord, RunStatus, StepResult, TestCase};

use crate::screencast;

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Execution stopped by user")]
    Stopped,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub navigation_timeout_ms: u64,
    /// Window for the post-action network-idle wait.
    pub settle_timeout_ms: u64,
    /// Longer window after submitting a search, result pages are slow.
    pub search_settle_timeout_ms: u64,
    /// Fixed pause before each network-idle wait.
    pub post_action_delay_ms: u64,
    pub frame_throttle_ms: u64,
    pub frame_stream: FrameStreamConfig,
    pub resolver: ResolverConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            settle_timeout_ms: 10_000,
            search_settle_timeout_ms: 15_000,
            post_action_delay_ms: 1_000,
            frame_throttle_ms: 200,
            frame_stream: FrameStreamConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

pub struct RunOrchestrator {
    driver: Arc<dyn BrowserDriver>,
    resolver: ElementResolver,
    artifacts: Arc<dyn ArtifactStore>,
    bus: Arc<ProgressBus>,
    ledger: Arc<RunLedger>,
    config: OrchestratorConfig,
    active: DashMap<ExecutionId, CancellationToken>,
}

impl RunOrchestrator {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        artifacts: Arc<dyn ArtifactStore>,
        bus: Arc<ProgressBus>,
        ledger: Arc<RunLedger>,
        suggester: Option<Arc<dyn SelectorSuggester>>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        let resolver = ElementResolver::new(config.resolver.clone(), suggester);
        Arc::new(Self {
            driver,
            resolver,
            artifacts,
            bus,
            ledger,
            config,
            active: DashMap::new(),
        })
    }

    /// Launch a run and return its id immediately; the run proceeds on a
    /// background task and reports through the bus and the ledger.
    pub fn run_test_case(self: &Arc<Self>, case: TestCase) -> ExecutionId {
        let id = ExecutionId::new();
        let cancel = CancellationToken::new();
        self.active.insert(id.clone(), cancel.clone());

        info!(execution = %id, case = %case.name, "run launched");
        let this = Arc::clone(self);
        let run_id = id.clone();
        tokio::spawn(async move {
            this.execute(run_id, case, cancel).await;
        });
        id
    }

    /// Request a stop. Returns whether the id named an active run; the
    /// stop lands as a failed step on the record, not as a vanished run.
    pub fn stop(&self, id: &ExecutionId) -> bool {
        match self.active.get(id) {
            Some(entry) => {
                info!(execution = %id, "stop requested");
                entry.value().cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: &ExecutionId) -> bool {
        self.active.contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    async fn execute(self: Arc<Self>, id: ExecutionId, case: TestCase, cancel: CancellationToken) {
        let mut record = ExecutionRecord::started(id.clone(), &case);
        let total = case.steps.len();

        self.progress(
            &record,
            total,
            0,
            "Browser Initialization",
            StepPhase::Running,
            "Starting browser",
            None,
        )
        .await;

        let session = match self.driver.launch().await {
            Ok(session) => session,
            Err(err) => {
                let message = format!("Browser launch failed: {err}");
                record
                    .steps
                    .push(StepResult::failed(0, "Browser Initialization", message.as_str(), None));
                self.progress(
                    &record,
                    total,
                    0,
                    "Browser Initialization",
                    StepPhase::Failed,
                    &message,
                    None,
                )
                .await;
                self.finish(record, RunStatus::Failed).await;
                return;
            }
        };

        let page = match session.new_page().await {
            Ok(page) => page,
            Err(err) => {
                let message = format!("Browser launch failed: {err}");
                record
                    .steps
                    .push(StepResult::failed(0, "Browser Initialization", message.as_str(), None));
                self.progress(
                    &record,
                    total,
                    0,
                    "Browser Initialization",
                    StepPhase::Failed,
                    &message,
                    None,
                )
                .await;
                let _ = session.close().await;
                self.finish(record, RunStatus::Failed).await;
                return;
            }
        };

        screencast::start(
            &page,
            &self.config.frame_stream,
            Duration::from_millis(self.config.frame_throttle_ms),
            Arc::clone(&self.bus),
            id.clone(),
        )
        .await;

        let init_artifact = self.capture(&page).await;
        record.steps.push(StepResult::completed(
            0,
            "Browser Initialization",
            "Browser started successfully",
            init_artifact.clone(),
        ));
        self.progress(
            &record,
            total,
            0,
            "Browser Initialization",
            StepPhase::Completed,
            "Browser started successfully",
            init_artifact,
        )
        .await;

        let mut status = RunStatus::Passed;
        let mut last_artifact = None;

        for (index, step) in case.steps.iter().enumerate() {
            let step = step.as_str();
            let step_number = index + 1;

            self.progress(
                &record,
                total,
                step_number,
                step,
                StepPhase::Running,
                "",
                None,
            )
            .await;

            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(StepError::Stopped),
                result = self.dispatch(&page, step) => result,
            };

            let artifact = self.capture(&page).await;
            last_artifact = artifact.clone();

            match outcome {
                Ok(message) => {
                    record.steps.push(StepResult::completed(
                        step_number,
                        step,
                        message.as_str(),
                        artifact.clone(),
                    ));
                    self.progress(
                        &record,
                        total,
                        step_number,
                        step,
                        StepPhase::Completed,
                        &message,
                        artifact,
                    )
                    .await;
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(execution = %id, step = step_number, "step failed: {message}");
                    record.steps.push(StepResult::failed(
                        step_number,
                        step,
                        message.as_str(),
                        artifact.clone(),
                    ));
                    self.progress(
                        &record,
                        total,
                        step_number,
                        step,
                        StepPhase::Failed,
                        &message,
                        artifact,
                    )
                    .await;
                    status = RunStatus::Failed;
                    break;
                }
            }
        }

        if status == RunStatus::Passed {
            self.progress(
                &record,
                total,
                total,
                "Test case passed",
                StepPhase::Passed,
                "All steps completed successfully",
                last_artifact,
            )
            .await;
        }

        page.stop_frame_stream().await;
        if let Err(err) = session.close().await {
            warn!(execution = %id, "session close failed: {err}");
        }

        self.finish(record, status).await;
    }

    /// Persist, publish the completion event, and drop the run from the
    /// active registry, in that order.
    async fn finish(&self, mut record: ExecutionRecord, status: RunStatus) {
        record.status = status;
        record.completed_at = Some(Utc::now());
        record.duration_ms = (Utc::now() - record.started_at)
            .num_milliseconds()
            .max(0) as u64;

        info!(
            execution = %record.id,
            status = ?record.status,
            steps = record.steps.len(),
            duration_ms = record.duration_ms,
            "run finished"
        );

        self.ledger.push(record.clone());
        let id = record.id.clone();
        let _ = self.bus.publish(RunEvent::Completed(record)).await;
        self.active.remove(&id);
    }

    async fn dispatch(&self, page: &Arc<dyn PagePort>, step: &str) -> Result<String, StepError> {
        match classify(step) {
            ActionIntent::OpenBrowser => Ok("Browser already running".into()),

            ActionIntent::Navigate { url } => {
                let url = normalize_url(&url);
                page.navigate(&url, Duration::from_millis(self.config.navigation_timeout_ms))
                    .await?;
                self.settle(page, self.config.settle_timeout_ms).await;
                Ok(format!("Navigated to {url}"))
            }

            ActionIntent::Click { target } => {
                let resolved = self.resolver.resolve_click(page, &target).await?;
                resolved.locator.click().await?;
                self.settle(page, self.config.settle_timeout_ms).await;
                Ok(format!("Clicked on '{target}'"))
            }

            ActionIntent::TypeText { target, value } => {
                let resolved = self.resolver.resolve_input(page, &target).await?;
                resolved.locator.fill(&value).await?;
                Ok(format!("Entered '{value}' into {target}"))
            }

            ActionIntent::Search { query } => {
                let resolved = self.resolver.resolve_search(page).await?;
                resolved.locator.fill(&query).await?;
                page.press_key("Enter").await?;
                self.settle(page, self.config.search_settle_timeout_ms).await;
                Ok(format!("Searched for '{query}'"))
            }

            ActionIntent::SelectItem { ordinal } => {
                let resolved = self.resolver.resolve_item(page, ordinal).await?;
                resolved.locator.click().await?;
                self.settle(page, self.config.settle_timeout_ms).await;
                Ok(format!("Selected product #{ordinal}"))
            }

            ActionIntent::AddToCollection => {
                let resolved = self.resolver.resolve_collect(page).await?;
                resolved.locator.click().await?;
                self.settle(page, self.config.settle_timeout_ms).await;
                Ok("Added product to cart".into())
            }

            ActionIntent::Wait { duration_ms } => {
                tokio::time::sleep(Duration::from_millis(duration_ms)).await;
                Ok(format!("Waited {duration_ms}ms"))
            }

            ActionIntent::Scroll => {
                page.scroll_by(500).await?;
                Ok("Scrolled down".into())
            }

            ActionIntent::PressKey { key } => {
                page.press_key(&key).await?;
                Ok(format!("Pressed {key}"))
            }

            ActionIntent::Unclassified { raw } => {
                let resolved = self.resolver.resolve_freeform(page, &raw).await?;
                match infer_freeform_action(&raw) {
                    FreeformAction::Click => resolved.locator.click().await?,
                    FreeformAction::Fill { value } => resolved.locator.fill(&value).await?,
                    FreeformAction::SearchSubmit { query } => {
                        resolved.locator.fill(&query).await?;
                        page.press_key("Enter").await?;
                        self.settle(page, self.config.search_settle_timeout_ms).await;
                    }
                }
                Ok(format!("Performed action: {raw}"))
            }
        }
    }

    /// Fixed pause then a bounded network-idle wait. Never fails a step;
    /// a page that keeps loading is the next step's problem.
    async fn settle(&self, page: &Arc<dyn PagePort>, timeout_ms: u64) {
        if self.config.post_action_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.post_action_delay_ms)).await;
        }
        if !page
            .wait_network_idle(Duration::from_millis(timeout_ms))
            .await
        {
            debug!("page still loading when the settle window closed");
        }
    }

    /// Best-effort screenshot into the artifact store.
    async fn capture(&self, page: &Arc<dyn PagePort>) -> Option<String> {
        let bytes = match page.screenshot().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("screenshot failed: {err}");
                return None;
            }
        };
        match self.artifacts.save(bytes).await {
            Ok(reference) => Some(reference),
            Err(err) => {
                warn!("artifact save failed: {err}");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn progress(
        &self,
        record: &ExecutionRecord,
        total_steps: usize,
        current_step: usize,
        description: &str,
        status: StepPhase,
        message: &str,
        artifact: Option<String>,
    ) {
        let event = RunEvent::StepProgress(StepProgress {
            execution_id: record.id.clone(),
            test_case_id: record.test_case_id.clone(),
            test_case_name: record.test_case_name.clone(),
            current_step,
            total_steps,
            step_description: description.to_string(),
            status,
            message: message.to_string(),
            artifact,
            timestamp: Utc::now(),
        });
        let _ = self.bus.publish(event).await;
    }
}

/// Bare hostnames get a scheme so the adapter always sees a full URL.
fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}
