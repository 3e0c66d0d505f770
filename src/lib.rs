// Pipeliner - streaming media pipeline lifecycle coordinator
// Main library entry point

pub mod config;
pub mod engine;
pub mod host;
pub mod library;
pub mod notify;
pub mod poller;
pub mod session;

pub use engine::{BusMessage, EngineError, MediaEngine, PlaybackState};
pub use host::PipelineHost;
pub use notify::{Notification, UiCallbacks};
pub use session::{DescriptionSlot, DisplaySurface, PipelineSession, SessionOptions};

use std::sync::Arc;

/// Engine selected for this build: GStreamer when compiled in and usable,
/// otherwise the headless dry-run engine
pub fn default_engine(headless: bool) -> Arc<dyn MediaEngine> {
    if headless {
        return Arc::new(engine::HeadlessEngine::new());
    }

    #[cfg(feature = "gstreamer")]
    {
        match engine::gst_backend::GstEngine::new() {
            Ok(engine) => return Arc::new(engine),
            Err(e) => log::warn!("GStreamer engine unavailable ({}) - using headless engine", e),
        }
    }
    #[cfg(not(feature = "gstreamer"))]
    {
        log::warn!("Built without the gstreamer feature - using headless engine");
    }
    Arc::new(engine::HeadlessEngine::new())
}
