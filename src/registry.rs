//! In-memory test case store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use run_scheduler::TestCaseSource;
use step_classifier::normalize_steps;
use steppilot_core_types::{TestCase, TestCaseId};

/// Holds the test cases the engine can run. Steps are frozen at insert
/// time; editing means replacing the whole case.
#[derive(Default)]
pub struct TestCaseRegistry {
    cases: DashMap<TestCaseId, TestCase>,
}

impl TestCaseRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Build a test case from a pasted block of step text, one canonical
    /// step per line.
    pub fn create(&self, name: impl Into<String>, raw_steps: &str) -> TestCase {
        let case = TestCase::new(name, normalize_steps(raw_steps));
        self.insert(case.clone());
        case
    }

    pub fn insert(&self, case: TestCase) {
        self.cases.insert(case.id.clone(), case);
    }

    pub fn get(&self, id: &TestCaseId) -> Option<TestCase> {
        self.cases.get(id).map(|e| e.value().clone())
    }

    pub fn remove(&self, id: &TestCaseId) -> Option<TestCase> {
        self.cases.remove(id).map(|(_, case)| case)
    }

    pub fn list(&self) -> Vec<TestCase> {
        self.cases.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[async_trait]
impl TestCaseSource for TestCaseRegistry {
    async fn test_case(&self, id: &TestCaseId) -> Option<TestCase> {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_normalizes_pasted_steps() {
        let registry = TestCaseRegistry::new();
        let case = registry.create(
            "shopping",
            "1. Open the browser\n2. Go to example.com\n3. Search for shoes",
        );
        assert_eq!(
            case.steps,
            vec![
                "Open browser",
                "Navigate to \"example.com\"",
                "Search for \"shoes\"",
            ]
        );
        assert_eq!(registry.get(&case.id).unwrap().name, "shopping");
    }

    #[test]
    fn remove_forgets_the_case() {
        let registry = TestCaseRegistry::new();
        let case = registry.create("temp", "Open browser");
        assert!(registry.remove(&case.id).is_some());
        assert!(registry.get(&case.id).is_none());
        assert!(registry.is_empty());
    }
}
