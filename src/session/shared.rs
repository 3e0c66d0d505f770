//! State shared between the control thread and the worker thread
//!
//! Ownership rules:
//! - the pipeline object itself never lives here; the worker owns it on its
//!   own stack and publishes only a [`RunningPipeline`] record (loop handle,
//!   pipeline name, weak sink reference) once both pipeline and loop exist
//! - the display surface is owned here, moved in by the control thread
//! - `initialized` and the error slot are written by both sides under their
//!   own locks

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::engine::{PlaybackState, VideoSink};
use crate::notify::UiCallbacks;

use super::error_channel::ErrorChannel;
use super::event_loop::LoopHandle;
use super::surface::{DisplaySurface, RawSurfaceHandle};

/// What the worker publishes while its pipeline and loop are both alive
pub(crate) struct RunningPipeline {
    pub(crate) loop_handle: LoopHandle,
    pub(crate) pipeline_name: String,
    /// Non-owning: the worker's pipeline holds the only strong reference
    pub(crate) video_sink: Option<Weak<dyn VideoSink>>,
}

impl RunningPipeline {
    pub(crate) fn new(
        loop_handle: LoopHandle,
        pipeline_name: String,
        video_sink: Option<&Arc<dyn VideoSink>>,
    ) -> Self {
        Self {
            loop_handle,
            pipeline_name,
            video_sink: video_sink.map(Arc::downgrade),
        }
    }

    fn video_sink(&self) -> Option<Arc<dyn VideoSink>> {
        self.video_sink.as_ref().and_then(Weak::upgrade)
    }
}

pub(crate) struct Slots {
    pub(crate) running: Option<RunningPipeline>,
    pub(crate) surface: Option<DisplaySurface>,
    pub(crate) initialized: bool,
    pub(crate) ui: Option<Arc<dyn UiCallbacks>>,
    pub(crate) pipeline_state: PlaybackState,
}

impl Slots {
    pub(crate) fn video_sink(&self) -> Option<Arc<dyn VideoSink>> {
        self.running.as_ref().and_then(RunningPipeline::video_sink)
    }

    pub(crate) fn loop_handle(&self) -> Option<LoopHandle> {
        self.running.as_ref().map(|r| r.loop_handle.clone())
    }
}

/// Mutable record shared by one session's control and worker threads
pub struct SharedState {
    slots: Mutex<Slots>,
    errors: ErrorChannel,
}

impl SharedState {
    pub fn new(ui: Option<Arc<dyn UiCallbacks>>) -> Self {
        Self {
            slots: Mutex::new(Slots {
                running: None,
                surface: None,
                initialized: false,
                ui,
                pipeline_state: PlaybackState::Null,
            }),
            errors: ErrorChannel::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock()
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    pub fn set_ui_target(&self, ui: Arc<dyn UiCallbacks>) {
        self.slots.lock().ui = Some(ui);
    }

    /// Detach the UI target so late callbacks from the worker are dropped
    pub fn clear_ui_target(&self) {
        if self.slots.lock().ui.take().is_some() {
            log::debug!("UI callback target cleared");
        }
    }

    pub fn has_ui_target(&self) -> bool {
        self.slots.lock().ui.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.slots.lock().initialized
    }

    pub(crate) fn clear_initialized(&self) {
        self.slots.lock().initialized = false;
    }

    pub fn surface_handle(&self) -> Option<RawSurfaceHandle> {
        self.slots.lock().surface.as_ref().map(DisplaySurface::handle)
    }

    /// True while a worker has both a pipeline and a running loop
    pub fn has_event_loop(&self) -> bool {
        self.slots.lock().running.is_some()
    }

    pub fn pipeline_name(&self) -> Option<String> {
        self.slots
            .lock()
            .running
            .as_ref()
            .map(|r| r.pipeline_name.clone())
    }

    /// Last pipeline-level state reported on the bus
    pub fn pipeline_state(&self) -> PlaybackState {
        self.slots.lock().pipeline_state
    }

    pub fn video_sink(&self) -> Option<Arc<dyn VideoSink>> {
        self.slots.lock().video_sink()
    }

    pub(crate) fn loop_handle(&self) -> Option<LoopHandle> {
        self.slots.lock().loop_handle()
    }

    pub(crate) fn publish_running(&self, running: RunningPipeline) {
        let mut slots = self.slots.lock();
        if slots.running.is_some() {
            log::warn!("Replacing a running pipeline record that was never retracted");
        }
        slots.running = Some(running);
    }

    /// Withdraw the running record; the session's readiness resets with it
    pub(crate) fn retract_running(&self) -> Option<RunningPipeline> {
        let mut slots = self.slots.lock();
        slots.initialized = false;
        slots.pipeline_state = PlaybackState::Null;
        slots.running.take()
    }

    pub(crate) fn record_pipeline_state(&self, state: PlaybackState) {
        self.slots.lock().pipeline_state = state;
    }

    /// Invoke the UI target outside the lock, if one is attached.
    ///
    /// Returns false when the target has been cleared.
    pub(crate) fn notify<F>(&self, deliver: F) -> bool
    where
        F: FnOnce(&dyn UiCallbacks),
    {
        let ui = self.slots.lock().ui.clone();
        match ui {
            Some(ui) => {
                deliver(ui.as_ref());
                true
            }
            None => {
                log::warn!("No UI callback target - notification dropped");
                false
            }
        }
    }
}

impl Drop for SharedState {
    fn drop(&mut self) {
        let slots = self.slots.get_mut();
        if slots.running.is_some() {
            log::error!("Shared state dropped while a pipeline is still published");
        }
        // The surface, if any, is released when `slots` drops
        if let Some(surface) = slots.surface.as_ref() {
            log::debug!("Releasing display surface {:#x} at session teardown", surface.handle());
        }
    }
}
