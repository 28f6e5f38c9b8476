//! Lightweight broadcast bus for run lifecycle events.
//!
//! Multicast to all current subscribers with no per-subscriber queuing
//! guarantees beyond "send what you have at emit time": slow subscribers
//! may observe lag on the broadcast channel, which is acceptable for the
//! live view (frames are lossy by design) while the execution record
//! remains the source of truth.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use steppilot_core_types::{EngineError, ExecutionId, ExecutionRecord, ScheduleId, TestCaseId};

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), EngineError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// Step phase carried on progress events. `Passed` is the final
/// run-level progress snapshot emitted once all steps completed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Running,
    Completed,
    Failed,
    Passed,
}

/// Point-in-time snapshot of run progress. One per state-machine
/// transition; step indexes may repeat (running then completed), each
/// event stands on its own.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepProgress {
    pub execution_id: ExecutionId,
    pub test_case_id: TestCaseId,
    pub test_case_name: String,
    pub current_step: usize,
    pub total_steps: usize,
    pub step_description: String,
    pub status: StepPhase,
    pub message: String,
    pub artifact: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One live screencast frame, already encoded as a `data:image/jpeg`
/// URL. Best-effort and lossy; never required for correctness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiveFrame {
    pub execution_id: ExecutionId,
    pub frame: String,
    pub timestamp: DateTime<Utc>,
}

/// Notification that a schedule fired and a run was launched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleTriggered {
    pub schedule_id: ScheduleId,
    pub execution_id: ExecutionId,
    pub test_case_id: TestCaseId,
    pub test_case_name: String,
    pub started_at: DateTime<Utc>,
}

/// Everything subscribers can observe about runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    StepProgress(StepProgress),
    Frame(LiveFrame),
    Completed(ExecutionRecord),
    ScheduleTriggered(ScheduleTriggered),
}

impl RunEvent {
    pub fn execution_id(&self) -> &ExecutionId {
        match self {
            RunEvent::StepProgress(p) => &p.execution_id,
            RunEvent::Frame(f) => &f.execution_id,
            RunEvent::Completed(r) => &r.id,
            RunEvent::ScheduleTriggered(s) => &s.execution_id,
        }
    }
}

/// Simple in-memory bus over a tokio broadcast channel.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), EngineError> {
        // A send error only means there is no subscriber right now; the
        // run must not care whether anyone is watching.
        let _ = self.sender.send(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// The engine's run event bus.
pub type ProgressBus = InMemoryBus<RunEvent>;

/// Helper to materialise an mpsc receiver from the bus subscription so
/// callers can await events without handling broadcast semantics
/// directly.
pub fn to_mpsc<E>(bus: Arc<InMemoryBus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        while let Ok(ev) = rx.recv().await {
            if tx.send(ev).await.is_err() {
                break;
            }
        }
    });
    out_rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(step: usize, status: StepPhase) -> RunEvent {
        RunEvent::StepProgress(StepProgress {
            execution_id: ExecutionId("run-1".into()),
            test_case_id: TestCaseId("case-1".into()),
            test_case_name: "smoke".into(),
            current_step: step,
            total_steps: 3,
            step_description: format!("step {step}"),
            status,
            message: String::new(),
            artifact: None,
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn subscribers_see_events_in_publish_order() {
        let bus = ProgressBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(progress(1, StepPhase::Running)).await.unwrap();
        bus.publish(progress(1, StepPhase::Completed)).await.unwrap();
        bus.publish(progress(2, StepPhase::Running)).await.unwrap();

        for expected in [1usize, 1, 2] {
            match rx.recv().await.unwrap() {
                RunEvent::StepProgress(p) => assert_eq!(p.current_step, expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let bus = ProgressBus::new(4);
        bus.publish(progress(1, StepPhase::Running)).await.unwrap();
    }

    #[tokio::test]
    async fn to_mpsc_bridges_the_subscription() {
        let bus = ProgressBus::new(8);
        let mut rx = to_mpsc(Arc::clone(&bus), 8);

        bus.publish(progress(1, StepPhase::Running)).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.execution_id().0, "run-1");
    }
}
