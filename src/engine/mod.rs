//! Media engine capability interface
//!
//! The coordinator never talks to a media framework directly. It consumes an
//! engine through the traits in this module: build a pipeline from a launch
//! description, change its state, look up the video sink, and observe the bus.
//!
//! Two engines are provided:
//! - [`headless::HeadlessEngine`]: a dry-run engine with no native dependencies
//! - `gst_backend::GstEngine`: GStreamer, behind the `gstreamer` feature

pub mod headless;

#[cfg(feature = "gstreamer")]
pub mod gst_backend;
#[cfg(feature = "gstreamer")]
pub mod gstreamer_init;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::session::event_loop::BusSender;
use crate::session::surface::RawSurfaceHandle;

pub use headless::{HeadlessEngine, HeadlessSink, PipelineProbe};

/// Error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The launch description could not be turned into a pipeline
    #[error("{0}")]
    Parse(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("State change to {0} failed")]
    StateChange(PlaybackState),

    #[cfg(feature = "gstreamer")]
    #[error("{0}")]
    Gst(#[from] gstreamer::glib::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Pipeline playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No pending state (only appears as the `pending` field of a transition)
    VoidPending,
    Null,
    Ready,
    Paused,
    Playing,
}

impl PlaybackState {
    /// Canonical upper-case name, as reported to the UI
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackState::VoidPending => "VOID_PENDING",
            PlaybackState::Null => "NULL",
            PlaybackState::Ready => "READY",
            PlaybackState::Paused => "PAUSED",
            PlaybackState::Playing => "PLAYING",
        }
    }

    /// The state one step closer to `target`, or `None` if already there
    pub fn step_towards(self, target: PlaybackState) -> Option<PlaybackState> {
        use PlaybackState::*;
        let ladder = [Null, Ready, Paused, Playing];
        let from = ladder.iter().position(|s| *s == self)?;
        let to = ladder.iter().position(|s| *s == target)?;
        if from < to {
            Some(ladder[from + 1])
        } else if from > to {
            Some(ladder[from - 1])
        } else {
            None
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Asynchronous pipeline event delivered through the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    Error {
        /// Name of the element that posted the error
        source: String,
        message: String,
        debug: Option<String>,
    },
    StateChanged {
        /// Name of the object whose state changed (pipeline or child element)
        source: String,
        /// Posted by the pipeline object itself. Names are not unique across
        /// the hierarchy; a child may carry the pipeline's name.
        from_pipeline: bool,
        old: PlaybackState,
        current: PlaybackState,
        pending: PlaybackState,
    },
}

/// Builds pipelines from launch descriptions.
///
/// Shared between the control thread and the worker thread.
pub trait MediaEngine: Send + Sync + 'static {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Construct a pipeline from a launch description
    fn build_pipeline(&self, description: &str) -> Result<Box<dyn EnginePipeline>>;
}

/// A constructed pipeline.
///
/// Owned exclusively by the worker thread that built it.
pub trait EnginePipeline {
    /// Object name of the pipeline itself; state-changed messages whose
    /// source matches this name are pipeline-level transitions.
    fn name(&self) -> String;

    /// Request a state transition
    fn set_state(&self, state: PlaybackState) -> Result<()>;

    /// Locate the element able to render into a display surface
    fn video_sink(&self) -> Option<Arc<dyn VideoSink>>;

    /// Route error and state-changed messages into `bus`. Messages posted
    /// before this call are delivered first, in order.
    fn watch_bus(&self, bus: BusSender);

    /// Stop routing bus messages
    fn unwatch_bus(&self);
}

/// Video sink capable of rendering into a native display surface.
///
/// The simple setters here are safe to call from any thread.
pub trait VideoSink: Send + Sync {
    /// Bind the sink to a surface, or detach it with `None`
    fn bind_display(&self, handle: Option<RawSurfaceHandle>);

    /// Ask the sink to redraw the last frame
    fn expose(&self);
}

#[cfg(test)]
mod tests {
    use super::PlaybackState::*;

    #[test]
    fn step_towards_walks_intermediate_states() {
        assert_eq!(Null.step_towards(Playing), Some(Ready));
        assert_eq!(Ready.step_towards(Playing), Some(Paused));
        assert_eq!(Playing.step_towards(Ready), Some(Paused));
        assert_eq!(Paused.step_towards(Paused), None);
        assert_eq!(VoidPending.step_towards(Playing), None);
    }

    #[test]
    fn names_match_engine_conventions() {
        assert_eq!(Playing.to_string(), "PLAYING");
        assert_eq!(Null.name(), "NULL");
    }
}
