//! Best-effort live view: screencast frames pumped from the adapter into
//! the progress bus as data-URL encoded JPEG events.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use browser_port::{FramePayload, FrameStreamConfig, PagePort};
use chrono::Utc;
use progress_bus::{EventBus, LiveFrame, ProgressBus, RunEvent};
use steppilot_core_types::ExecutionId;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Start streaming frames for a run. Returns whether the adapter accepted
/// the stream; a refusal means "no live view", never a run failure. The
/// pump exits on its own once the adapter stops producing frames.
pub(crate) async fn start(
    page: &Arc<dyn PagePort>,
    config: &FrameStreamConfig,
    throttle: Duration,
    bus: Arc<ProgressBus>,
    execution_id: ExecutionId,
) -> bool {
    let (tx, rx) = mpsc::channel::<FramePayload>(16);
    if let Err(err) = page.start_frame_stream(config, tx).await {
        warn!(%execution_id, "live view unavailable: {err}");
        return false;
    }
    tokio::spawn(pump(rx, throttle, bus, execution_id));
    true
}

async fn pump(
    mut rx: mpsc::Receiver<FramePayload>,
    throttle: Duration,
    bus: Arc<ProgressBus>,
    execution_id: ExecutionId,
) {
    let mut last_emit: Option<Instant> = None;
    while let Some(payload) = rx.recv().await {
        // Frames inside the throttle window are dropped, not queued.
        if let Some(at) = last_emit {
            if at.elapsed() < throttle {
                continue;
            }
        }
        last_emit = Some(Instant::now());

        let frame = format!("data:image/jpeg;base64,{}", STANDARD.encode(&payload.data));
        let event = RunEvent::Frame(LiveFrame {
            execution_id: execution_id.clone(),
            frame,
            timestamp: Utc::now(),
        });
        if bus.publish(event).await.is_err() {
            break;
        }
    }
    debug!(%execution_id, "frame pump stopped");
}
