//! Shared primitives for the StepPilot execution engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Message-style error for facade-level plumbing where a structured
/// component error has already been rendered.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("{message}")]
    Message { message: String },
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TestCaseId(pub String);

impl TestCaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TestCaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ScheduleId(pub String);

impl ScheduleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ScheduleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A test case as read from the external record store. The engine never
/// mutates it; steps are frozen for the lifetime of a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCase {
    pub id: TestCaseId,
    pub name: String,
    pub steps: Vec<String>,
    /// Id of the ticket/test-management record these steps were imported
    /// from, when any.
    pub external_ref: Option<String>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            id: TestCaseId::new(),
            name: name.into(),
            steps,
            external_ref: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Passed,
    Failed,
}

/// Outcome of a single step. Step number 0 is the browser initialization
/// step; user steps are numbered from 1. Immutable once appended to a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub step_number: usize,
    pub description: String,
    pub status: StepStatus,
    pub message: String,
    /// Reference into the artifact store (URL-like), when a screenshot
    /// was captured for this step.
    pub artifact: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StepResult {
    pub fn completed(
        step_number: usize,
        description: impl Into<String>,
        message: impl Into<String>,
        artifact: Option<String>,
    ) -> Self {
        Self {
            step_number,
            description: description.into(),
            status: StepStatus::Completed,
            message: message.into(),
            artifact,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(
        step_number: usize,
        description: impl Into<String>,
        message: impl Into<String>,
        artifact: Option<String>,
    ) -> Self {
        Self {
            step_number,
            description: description.into(),
            status: StepStatus::Failed,
            message: message.into(),
            artifact,
            timestamp: Utc::now(),
        }
    }
}

/// Full record of one run. Owned exclusively by the orchestrator instance
/// driving the run; frozen once persisted to history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub test_case_id: TestCaseId,
    pub test_case_name: String,
    pub status: RunStatus,
    pub steps: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    pub fn started(id: ExecutionId, case: &TestCase) -> Self {
        Self {
            id,
            test_case_id: case.id.clone(),
            test_case_name: case.name.clone(),
            status: RunStatus::Running,
            steps: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
            completed_at: None,
        }
    }
}

/// Trigger condition for a scheduled run. A sum type, so a schedule can
/// never carry both an absolute time and a cron expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    OneShot(DateTime<Utc>),
    Recurring(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub test_case_id: TestCaseId,
    pub trigger: Trigger,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn one_shot(test_case_id: TestCaseId, at: DateTime<Utc>) -> Self {
        Self {
            id: ScheduleId::new(),
            test_case_id,
            trigger: Trigger::OneShot(at),
            enabled: true,
            last_run: None,
        }
    }

    pub fn recurring(test_case_id: TestCaseId, cron_expr: impl Into<String>) -> Self {
        Self {
            id: ScheduleId::new(),
            test_case_id,
            trigger: Trigger::Recurring(cron_expr.into()),
            enabled: true,
            last_run: None,
        }
    }
}
