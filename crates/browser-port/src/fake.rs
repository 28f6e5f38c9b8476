//! Scripted in-memory adapter for tests and local development.
//!
//! A [`ScriptedPage`] is seeded with selector -> visible-match-count
//! entries and replays them; every interaction is appended to an action
//! log so tests can assert which selector won and in what order actions
//! ran. Failure injection covers launch, navigation and screenshots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    BrowserDriver, BrowserError, BrowserSession, ElementSummary, FramePayload, FrameStreamConfig,
    LocatorPort, PagePort, PageSnapshot,
};

#[derive(Default)]
struct PageState {
    targets: HashMap<String, usize>,
    log: Vec<String>,
    url: String,
    snapshot: PageSnapshot,
    fail_navigation: Option<String>,
    fail_screenshot: bool,
    settled: bool,
}

/// Replayable page with a scripted element table.
pub struct ScriptedPage {
    state: Mutex<PageState>,
    closed: AtomicBool,
    streaming: Arc<AtomicBool>,
    screenshots: AtomicUsize,
}

impl ScriptedPage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PageState {
                settled: true,
                ..PageState::default()
            }),
            closed: AtomicBool::new(false),
            streaming: Arc::new(AtomicBool::new(false)),
            screenshots: AtomicUsize::new(0),
        })
    }

    /// Seed a selector with the number of visible matches it yields.
    pub fn add_target(self: &Arc<Self>, selector: &str, visible_matches: usize) -> Arc<Self> {
        self.state
            .lock()
            .targets
            .insert(selector.to_string(), visible_matches);
        Arc::clone(self)
    }

    pub fn remove_target(&self, selector: &str) {
        self.state.lock().targets.remove(selector);
    }

    pub fn set_snapshot(self: &Arc<Self>, snapshot: PageSnapshot) -> Arc<Self> {
        self.state.lock().snapshot = snapshot;
        Arc::clone(self)
    }

    /// Make every navigation fail with the given reason.
    pub fn fail_navigation(self: &Arc<Self>, reason: &str) -> Arc<Self> {
        self.state.lock().fail_navigation = Some(reason.to_string());
        Arc::clone(self)
    }

    pub fn fail_screenshots(self: &Arc<Self>) -> Arc<Self> {
        self.state.lock().fail_screenshot = true;
        Arc::clone(self)
    }

    pub fn set_settled(&self, settled: bool) {
        self.state.lock().settled = settled;
    }

    /// Ordered interaction log: `navigate`, `click`, `fill`, `press`,
    /// `scroll` entries.
    pub fn actions(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn current_url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn screenshot_count(&self) -> usize {
        self.screenshots.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), BrowserError> {
        if self.is_closed() {
            Err(BrowserError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn record(&self, entry: String) {
        self.state.lock().log.push(entry);
    }

    fn visible_count(&self, selector: &str) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.state
            .lock()
            .targets
            .get(selector)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PagePort for ScriptedPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.ensure_open()?;
        if let Some(reason) = self.state.lock().fail_navigation.clone() {
            return Err(BrowserError::NavigationFailed {
                url: url.to_string(),
                reason,
            });
        }
        {
            let mut state = self.state.lock();
            state.url = url.to_string();
            state.log.push(format!("navigate {url}"));
        }
        Ok(())
    }

    fn locate(self: Arc<Self>, selector: &str) -> Arc<dyn LocatorPort> {
        Arc::new(ScriptedLocator {
            page: self,
            selector: selector.to_string(),
            index: None,
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.ensure_open()?;
        if self.state.lock().fail_screenshot {
            return Err(BrowserError::Adapter("screenshot unavailable".into()));
        }
        let n = self.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(format!("png-frame-{n}").into_bytes())
    }

    async fn wait_network_idle(&self, _timeout: Duration) -> bool {
        self.state.lock().settled
    }

    async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.record(format!("press {key}"));
        Ok(())
    }

    async fn scroll_by(&self, delta_y: i64) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.record(format!("scroll {delta_y}"));
        Ok(())
    }

    async fn snapshot(&self, max_elements: usize) -> Result<PageSnapshot, BrowserError> {
        self.ensure_open()?;
        let mut snapshot = self.state.lock().snapshot.clone();
        snapshot.elements.truncate(max_elements);
        Ok(snapshot)
    }

    async fn start_frame_stream(
        &self,
        _config: &FrameStreamConfig,
        sink: mpsc::Sender<FramePayload>,
    ) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.streaming.store(true, Ordering::SeqCst);
        let streaming = Arc::clone(&self.streaming);
        tokio::spawn(async move {
            let mut n = 0u32;
            while streaming.load(Ordering::SeqCst) && n < 1_000 {
                let payload = FramePayload {
                    data: format!("jpeg-{n}").into_bytes(),
                };
                if sink.send(payload).await.is_err() {
                    break;
                }
                n += 1;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });
        Ok(())
    }

    async fn stop_frame_stream(&self) {
        self.streaming.store(false, Ordering::SeqCst);
    }
}

struct ScriptedLocator {
    page: Arc<ScriptedPage>,
    selector: String,
    index: Option<usize>,
}

impl ScriptedLocator {
    fn label(&self) -> String {
        match self.index {
            Some(i) => format!("{}[{i}]", self.selector),
            None => self.selector.clone(),
        }
    }

    fn is_present(&self) -> bool {
        let count = self.page.visible_count(&self.selector);
        match self.index {
            Some(i) => count > i,
            None => count > 0,
        }
    }
}

#[async_trait]
impl LocatorPort for ScriptedLocator {
    async fn is_visible(&self, _timeout: Duration) -> bool {
        self.is_present()
    }

    async fn click(&self) -> Result<(), BrowserError> {
        self.page.ensure_open()?;
        if !self.is_present() {
            return Err(BrowserError::Adapter(format!(
                "no visible element for '{}'",
                self.selector
            )));
        }
        self.page.record(format!("click {}", self.label()));
        Ok(())
    }

    async fn fill(&self, value: &str) -> Result<(), BrowserError> {
        self.page.ensure_open()?;
        if !self.is_present() {
            return Err(BrowserError::Adapter(format!(
                "no visible element for '{}'",
                self.selector
            )));
        }
        self.page.record(format!("fill {}={value}", self.label()));
        Ok(())
    }

    async fn visible_matches(
        &self,
        limit: usize,
    ) -> Result<Vec<Arc<dyn LocatorPort>>, BrowserError> {
        self.page.ensure_open()?;
        let count = self.page.visible_count(&self.selector).min(limit);
        let matches = (0..count)
            .map(|i| {
                Arc::new(ScriptedLocator {
                    page: Arc::clone(&self.page),
                    selector: self.selector.clone(),
                    index: Some(i),
                }) as Arc<dyn LocatorPort>
            })
            .collect();
        Ok(matches)
    }
}

/// Session over a single scripted page.
pub struct ScriptedSession {
    page: Arc<ScriptedPage>,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn new_page(&self) -> Result<Arc<dyn PagePort>, BrowserError> {
        self.page.ensure_open()?;
        Ok(Arc::clone(&self.page) as Arc<dyn PagePort>)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page.closed.store(true, Ordering::SeqCst);
        self.page.streaming.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Driver handing out sessions over one scripted page.
pub struct ScriptedDriver {
    page: Arc<ScriptedPage>,
    fail_launch: Option<String>,
    launches: AtomicUsize,
}

impl ScriptedDriver {
    pub fn new(page: Arc<ScriptedPage>) -> Arc<Self> {
        Arc::new(Self {
            page,
            fail_launch: None,
            launches: AtomicUsize::new(0),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            page: ScriptedPage::new(),
            fail_launch: Some(reason.to_string()),
            launches: AtomicUsize::new(0),
        })
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        if let Some(reason) = &self.fail_launch {
            return Err(BrowserError::LaunchFailed(reason.clone()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedSession {
            page: Arc::clone(&self.page),
        }))
    }
}

#[derive(Clone, Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: PageSnapshot,
}

impl SnapshotBuilder {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            snapshot: PageSnapshot {
                url: url.to_string(),
                title: title.to_string(),
                elements: Vec::new(),
            },
        }
    }

    pub fn element(mut self, summary: ElementSummary) -> Self {
        self.snapshot.elements.push(summary);
        self
    }

    pub fn build(self) -> PageSnapshot {
        self.snapshot
    }
}
