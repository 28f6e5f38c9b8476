//! Capability traits for the external browser-control adapter.
//!
//! The engine never owns a browser; it drives one through these narrow
//! ports. Selector strings are passed through verbatim, so the dialect
//! (CSS plus `text=` / `:has-text()` conveniences) is the adapter's
//! contract, not ours.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod fake;

#[derive(Debug, Error, Clone)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("navigation to '{url}' failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("action timed out after {0:?}")]
    ActionTimeout(Duration),

    #[error("session closed")]
    SessionClosed,

    #[error("adapter error: {0}")]
    Adapter(String),
}

/// Summary of one interactive element, as sampled for freeform
/// resolution. Field set mirrors what a page-side probe can cheaply read.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElementSummary {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Option<String>,
    pub text: Option<String>,
    pub placeholder: Option<String>,
    pub name: Option<String>,
    pub input_type: Option<String>,
    pub href: Option<String>,
    pub aria_label: Option<String>,
    pub role: Option<String>,
    pub value: Option<String>,
}

/// Bounded snapshot of a live page: url, title and up to the requested
/// number of interactive elements in DOM order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub elements: Vec<ElementSummary>,
}

/// Screencast tuning knobs. Defaults match a low-bandwidth live preview:
/// small JPEG frames, every third frame only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameStreamConfig {
    pub quality: u8,
    pub max_width: u32,
    pub max_height: u32,
    pub every_nth_frame: u32,
}

impl Default for FrameStreamConfig {
    fn default() -> Self {
        Self {
            quality: 30,
            max_width: 1024,
            max_height: 576,
            every_nth_frame: 3,
        }
    }
}

/// One captured screencast frame (encoded image bytes).
#[derive(Clone, Debug)]
pub struct FramePayload {
    pub data: Vec<u8>,
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Allocate a fresh browser session. Each run owns exactly one.
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Arc<dyn PagePort>, BrowserError>;

    /// Close the session and abort any in-flight operation on its pages.
    async fn close(&self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait PagePort: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Build a locator handle for a selector. Cheap; nothing is probed
    /// until the handle is used.
    fn locate(self: Arc<Self>, selector: &str) -> Arc<dyn LocatorPort>;

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    /// Best-effort wait for network quiescence. Returns whether the page
    /// settled within the window; a timeout is an answer, not an error.
    async fn wait_network_idle(&self, timeout: Duration) -> bool;

    async fn press_key(&self, key: &str) -> Result<(), BrowserError>;

    async fn scroll_by(&self, delta_y: i64) -> Result<(), BrowserError>;

    /// Sample up to `max_elements` interactive elements in DOM order.
    async fn snapshot(&self, max_elements: usize) -> Result<PageSnapshot, BrowserError>;

    /// Start pushing screencast frames into `sink`. Best-effort: adapters
    /// without screencast support may return an error, which callers
    /// treat as "no live view".
    async fn start_frame_stream(
        &self,
        config: &FrameStreamConfig,
        sink: mpsc::Sender<FramePayload>,
    ) -> Result<(), BrowserError>;

    async fn stop_frame_stream(&self);
}

#[async_trait]
pub trait LocatorPort: Send + Sync {
    /// Probe visibility within a bounded window.
    async fn is_visible(&self, timeout: Duration) -> bool;

    async fn click(&self) -> Result<(), BrowserError>;

    async fn fill(&self, value: &str) -> Result<(), BrowserError>;

    /// All currently visible matches for this locator, in DOM order,
    /// capped at `limit`.
    async fn visible_matches(
        &self,
        limit: usize,
    ) -> Result<Vec<Arc<dyn LocatorPort>>, BrowserError>;
}
