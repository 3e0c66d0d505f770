// Pipeline session: one worker thread plus the state it shares with the
// control thread

pub mod controller;
pub mod error_channel;
pub mod event_loop;
pub mod observer;
pub mod shared;
pub mod surface;
mod worker;

pub use controller::PipelineSession;
pub use error_channel::ErrorChannel;
pub use shared::SharedState;
pub use surface::{DisplaySurface, RawSurfaceHandle};

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::config::Config;
use crate::engine::PlaybackState;

/// Always-constructible pipeline used when no description has been set
pub const DEFAULT_FALLBACK_PIPELINE: &str =
    "videotestsrc pattern=ball ! videoconvert ! textoverlay text=FALLBACK font-desc=28 ! autovideosink";

static PROCESS_DESCRIPTION: OnceLock<DescriptionSlot> = OnceLock::new();

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Pending pipeline description, read once at the start of each worker run.
///
/// Clones share the same slot. [`DescriptionSlot::process_wide`] hands out
/// the single process-lifetime slot; sessions built with [`DescriptionSlot::new`]
/// get a private one.
#[derive(Debug, Clone, Default)]
pub struct DescriptionSlot {
    inner: Arc<RwLock<Option<String>>>,
}

impl DescriptionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot shared by every session that asks for it, for the life of the process
    pub fn process_wide() -> Self {
        PROCESS_DESCRIPTION.get_or_init(DescriptionSlot::new).clone()
    }

    /// Replace the description used by the next build
    pub fn set(&self, text: &str) {
        *self.inner.write() = Some(text.to_string());
        log::debug!("Saved custom pipeline: {}", text);
    }

    pub fn clear(&self) {
        self.inner.write().take();
    }

    /// The stored description, unless it is empty
    pub fn get(&self) -> Option<String> {
        self.inner
            .read()
            .as_ref()
            .filter(|text| !text.trim().is_empty())
            .cloned()
    }
}

/// Per-session settings fixed at construction
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Built when no description is pending
    pub fallback_description: String,
    /// Requested as soon as each run's loop is up
    pub initial_state: Option<PlaybackState>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            fallback_description: DEFAULT_FALLBACK_PIPELINE.to_string(),
            initial_state: None,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fallback_description: config.fallback_pipeline.clone(),
            initial_state: config.auto_play.then_some(PlaybackState::Playing),
        }
    }
}
