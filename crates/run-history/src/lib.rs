//! Bounded, append-only ledger of completed executions.
//!
//! Insertion order is preserved in a ring under a mutex while a
//! concurrent map gives O(1) lookup by id. Once the cap is exceeded the
//! oldest record is evicted (FIFO).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use steppilot_core_types::{ExecutionId, ExecutionRecord, RunStatus, StepStatus, TestCaseId};

pub const DEFAULT_HISTORY_CAP: usize = 100;

/// List-view projection of a step result: the artifact payload is
/// reduced to a presence flag so history lists stay light.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepSummary {
    pub step_number: usize,
    pub description: String,
    pub status: StepStatus,
    pub message: String,
    pub has_artifact: bool,
    pub timestamp: DateTime<Utc>,
}

/// List-view projection of an execution record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub id: ExecutionId,
    pub test_case_id: TestCaseId,
    pub test_case_name: String,
    pub status: RunStatus,
    pub steps: Vec<StepSummary>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&ExecutionRecord> for ExecutionSummary {
    fn from(record: &ExecutionRecord) -> Self {
        Self {
            id: record.id.clone(),
            test_case_id: record.test_case_id.clone(),
            test_case_name: record.test_case_name.clone(),
            status: record.status,
            steps: record
                .steps
                .iter()
                .map(|s| StepSummary {
                    step_number: s.step_number,
                    description: s.description.clone(),
                    status: s.status,
                    message: s.message.clone(),
                    has_artifact: s.artifact.is_some(),
                    timestamp: s.timestamp,
                })
                .collect(),
            started_at: record.started_at,
            duration_ms: record.duration_ms,
            completed_at: record.completed_at,
        }
    }
}

#[derive(Debug)]
pub struct RunLedger {
    cap: usize,
    order: Mutex<VecDeque<ExecutionId>>,
    records: DashMap<ExecutionId, ExecutionRecord>,
}

impl RunLedger {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            order: Mutex::new(VecDeque::with_capacity(cap)),
            records: DashMap::new(),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.order.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.lock().is_empty()
    }

    /// Append a finished record, evicting the oldest entry once the cap
    /// is exceeded. The order lock spans both structures so concurrent
    /// appends keep the ring and the index consistent.
    pub fn push(&self, record: ExecutionRecord) {
        let mut order = self.order.lock();
        if order.len() >= self.cap {
            if let Some(evicted) = order.pop_front() {
                self.records.remove(&evicted);
            }
        }
        order.push_back(record.id.clone());
        self.records.insert(record.id.clone(), record);
    }

    /// Full record by id.
    pub fn get(&self, id: &ExecutionId) -> Option<ExecutionRecord> {
        self.records.get(id).map(|r| r.clone())
    }

    /// Newest-first summaries with artifact payloads stripped to
    /// presence flags.
    pub fn summaries(&self, limit: usize) -> Vec<ExecutionSummary> {
        let order = self.order.lock();
        order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| self.records.get(id).map(|r| ExecutionSummary::from(&*r)))
            .collect()
    }

    /// Ids in insertion order (oldest first).
    pub fn ids(&self) -> Vec<ExecutionId> {
        self.order.lock().iter().cloned().collect()
    }
}

impl Default for RunLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steppilot_core_types::{StepResult, TestCase};

    fn record(tag: usize) -> ExecutionRecord {
        let case = TestCase::new(format!("case-{tag}"), vec!["Open browser".into()]);
        let mut record = ExecutionRecord::started(ExecutionId(format!("run-{tag}")), &case);
        record.status = RunStatus::Passed;
        record.steps.push(StepResult::completed(
            0,
            "Browser Initialization",
            "Browser started successfully",
            Some("/artifacts/init.png".into()),
        ));
        record
    }

    #[test]
    fn cap_evicts_oldest_first() {
        let ledger = RunLedger::new(100);
        for i in 0..101 {
            ledger.push(record(i));
        }
        assert_eq!(ledger.len(), 100);
        assert!(ledger.get(&ExecutionId("run-0".into())).is_none());
        assert!(ledger.get(&ExecutionId("run-1".into())).is_some());
        assert!(ledger.get(&ExecutionId("run-100".into())).is_some());

        let ids = ledger.ids();
        assert_eq!(ids.first().unwrap().0, "run-1");
        assert_eq!(ids.last().unwrap().0, "run-100");
    }

    #[test]
    fn summaries_are_newest_first_with_presence_flags() {
        let ledger = RunLedger::default();
        ledger.push(record(1));
        ledger.push(record(2));

        let summaries = ledger.summaries(50);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id.0, "run-2");
        assert_eq!(summaries[1].id.0, "run-1");
        assert!(summaries[0].steps[0].has_artifact);
    }

    #[test]
    fn get_returns_the_full_record() {
        let ledger = RunLedger::default();
        ledger.push(record(7));
        let full = ledger.get(&ExecutionId("run-7".into())).unwrap();
        assert_eq!(
            full.steps[0].artifact.as_deref(),
            Some("/artifacts/init.png")
        );
    }

    #[test]
    fn concurrent_appends_respect_the_cap() {
        use std::sync::Arc;
        let ledger = Arc::new(RunLedger::new(10));
        let mut handles = Vec::new();
        for t in 0..4 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    ledger.push(record(t * 100 + i));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ledger.len(), 10);
        assert_eq!(ledger.ids().len(), 10);
    }
}
