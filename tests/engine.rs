//! End-to-end engine tests over the scripted browser adapter.

use std::sync::Arc;
use std::time::Duration;

use steppilot::browser::fake::{ScriptedDriver, ScriptedPage};
use steppilot::{
    Engine, EngineConfig, ExecutionRecord, OrchestratorConfig, RunEvent, RunStatus, Schedule,
    ScheduleError, StepStatus, TestCase,
};
use tokio::sync::broadcast;
use tokio::time::timeout;

fn fast_config() -> EngineConfig {
    EngineConfig {
        orchestrator: OrchestratorConfig {
            navigation_timeout_ms: 100,
            settle_timeout_ms: 10,
            search_settle_timeout_ms: 10,
            post_action_delay_ms: 0,
            resolver: steppilot::resolve::ResolverConfig {
                probe_timeout_ms: 10,
                ..steppilot::resolve::ResolverConfig::default()
            },
            ..OrchestratorConfig::default()
        },
        ..EngineConfig::default()
    }
}

fn engine_over(page: &Arc<ScriptedPage>) -> Arc<Engine> {
    Engine::new(ScriptedDriver::new(Arc::clone(page)), None, fast_config())
}

async fn wait_for_completion(events: &mut broadcast::Receiver<RunEvent>) -> ExecutionRecord {
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("bus timed out")
            .expect("bus closed");
        if let RunEvent::Completed(record) = event {
            return record;
        }
    }
}

#[tokio::test]
async fn shopping_test_case_passes_end_to_end() {
    let page = ScriptedPage::new();
    page.add_target("input[name=\"q\"]", 1);
    page.add_target(".product-card", 3);
    page.add_target("#add-to-cart-button", 1);

    let engine = engine_over(&page);
    let mut events = engine.subscribe();

    let case = engine.test_cases().create(
        "shopping smoke",
        "1. Open the browser\n2. Go to example.com\n3. Search for laptop\n4. Select the 2nd product\n5. Add it to the cart",
    );
    let id = engine.run_test_case(case);
    let record = wait_for_completion(&mut events).await;

    assert_eq!(record.id, id);
    assert_eq!(record.status, RunStatus::Passed);
    // Init step plus five user steps.
    assert_eq!(record.steps.len(), 6);
    assert!(record
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Completed && s.artifact.is_some()));

    let actions = page.actions();
    assert!(actions.contains(&"navigate https://example.com".to_string()));
    assert!(actions.contains(&"fill input[name=\"q\"]=laptop".to_string()));
    assert!(actions.contains(&"click .product-card[1]".to_string()));
    assert!(actions.contains(&"click #add-to-cart-button".to_string()));

    // History holds the run and the page was released.
    assert_eq!(engine.execution(&id).unwrap().status, RunStatus::Passed);
    assert_eq!(engine.execution_history(10).len(), 1);
    assert!(page.is_closed());
}

#[tokio::test]
async fn missing_element_fails_fast_with_the_target_in_the_message() {
    let page = ScriptedPage::new();
    let engine = engine_over(&page);
    let mut events = engine.subscribe();

    let case = TestCase::new(
        "broken click",
        vec![
            "Open browser".into(),
            "Click \"Nonexistent Button\"".into(),
            "Scroll down".into(),
        ],
    );
    engine.run_test_case(case);
    let record = wait_for_completion(&mut events).await;

    assert_eq!(record.status, RunStatus::Failed);
    // Init, open-browser, failed click; the scroll never ran.
    assert_eq!(record.steps.len(), 3);
    let failed = record.steps.last().unwrap();
    assert_eq!(failed.status, StepStatus::Failed);
    assert!(failed.message.contains("Nonexistent Button"));
    assert!(!page.actions().iter().any(|a| a.starts_with("scroll")));
    assert!(page.is_closed());
}

#[tokio::test]
async fn progress_events_precede_the_completion_event() {
    let page = ScriptedPage::new();
    let engine = engine_over(&page);
    let mut events = engine.subscribe();

    let case = TestCase::new("one step", vec!["Open browser".into()]);
    engine.run_test_case(case);

    let mut saw_progress = false;
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            RunEvent::StepProgress(_) => saw_progress = true,
            RunEvent::Completed(_) => break,
            _ => {}
        }
    }
    assert!(saw_progress);
}

#[tokio::test]
async fn run_events_serialize_with_a_tagged_shape() {
    let page = ScriptedPage::new();
    let engine = engine_over(&page);
    let mut events = engine.subscribe();

    engine.run_test_case(TestCase::new("one step", vec!["Open browser".into()]));
    let record = wait_for_completion(&mut events).await;

    let json = serde_json::to_value(RunEvent::Completed(record)).unwrap();
    assert_eq!(json["event"], "completed");
    assert_eq!(json["status"], "passed");
}

#[tokio::test]
async fn invalid_cron_expressions_never_register() {
    let page = ScriptedPage::new();
    let engine = engine_over(&page);

    let case = engine.test_cases().create("nightly", "Open browser");
    let schedule = Schedule::recurring(case.id.clone(), "not-a-cron");
    let err = engine.add_schedule(schedule).unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidCron { .. }));
    assert!(engine.schedules().is_empty());
}

#[tokio::test]
async fn scheduled_run_fires_and_lands_in_history() {
    let page = ScriptedPage::new();
    let engine = engine_over(&page);
    let mut events = engine.subscribe();

    let case = engine.test_cases().create("scheduled", "Open browser");
    let schedule = Schedule::one_shot(
        case.id.clone(),
        chrono::Utc::now() + chrono::Duration::milliseconds(30),
    );
    engine.add_schedule(schedule).unwrap();

    let mut triggered = false;
    let record = loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            RunEvent::ScheduleTriggered(t) => {
                assert_eq!(t.test_case_name, "scheduled");
                triggered = true;
            }
            RunEvent::Completed(record) => break record,
            _ => {}
        }
    };
    assert!(triggered);
    assert_eq!(record.status, RunStatus::Passed);
    assert_eq!(engine.execution_history(10).len(), 1);
    // One-shot schedules consume themselves after firing.
    assert!(engine.schedules().is_empty());
}

#[tokio::test]
async fn stopping_a_run_records_a_failed_execution() {
    let page = ScriptedPage::new();
    let engine = engine_over(&page);
    let mut events = engine.subscribe();

    let case = TestCase::new(
        "long wait",
        vec!["Open browser".into(), "Wait for 30 seconds".into()],
    );
    let id = engine.run_test_case(case);

    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        if let RunEvent::StepProgress(p) = &event {
            if p.current_step == 2 && p.status == steppilot::StepPhase::Running {
                break;
            }
        }
    }
    assert!(engine.stop_execution(&id));

    let record = wait_for_completion(&mut events).await;
    assert_eq!(record.status, RunStatus::Failed);
    assert!(record.steps.last().unwrap().message.contains("stopped"));
    assert!(page.is_closed());
}
