//! Control-facing session operations
//!
//! [`PipelineSession`] is what a UI or control thread drives: start and stop
//! the worker, request state changes, swap the pipeline description, attach
//! a display surface and poll for errors. It never touches the pipeline
//! directly; requests that need the pipeline are posted into the worker's
//! event loop.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::engine::{MediaEngine, PlaybackState};
use crate::notify::UiCallbacks;

use super::event_loop::{LoopCommand, LoopContext, LoopHandle};
use super::shared::SharedState;
use super::surface::DisplaySurface;
use super::worker::{self, WorkerContext};
use super::{DescriptionSlot, Result, SessionOptions};

impl SharedState {
    /// Fire `on_initialized` once all of surface, loop, video sink and UI
    /// target are present, binding the surface to the sink first.
    ///
    /// Fires at most once until the surface is detached or the pipeline is
    /// rebuilt. Returns true if it fired.
    pub(crate) fn check_initialization_complete(&self) -> bool {
        let ui = {
            let mut slots = self.lock();
            if slots.initialized {
                return false;
            }
            let Some(handle) = slots.surface.as_ref().map(DisplaySurface::handle) else {
                return false;
            };
            if slots.running.is_none() {
                return false;
            }
            let Some(sink) = slots.video_sink() else {
                log::debug!("No video sink yet - initialization deferred");
                return false;
            };
            let Some(ui) = slots.ui.clone() else {
                log::debug!("No UI callback target - initialization deferred");
                return false;
            };

            sink.bind_display(Some(handle));
            slots.initialized = true;
            ui
        };

        log::debug!("Initialization complete, notifying UI");
        ui.on_initialized();
        true
    }
}

struct WorkerHandle {
    quit: LoopHandle,
    thread: JoinHandle<()>,
}

/// One pipeline session, driven from the control thread
pub struct PipelineSession {
    engine: Arc<dyn MediaEngine>,
    shared: Arc<SharedState>,
    description: DescriptionSlot,
    fallback: String,
    initial_state: Mutex<Option<PlaybackState>>,
    /// Serializes start, stop and reinit
    lifecycle: Mutex<()>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl PipelineSession {
    /// Session with a private description slot and default options
    pub fn new(engine: Arc<dyn MediaEngine>, ui: Arc<dyn UiCallbacks>) -> Self {
        Self::with_options(engine, Some(ui), DescriptionSlot::new(), SessionOptions::default())
    }

    pub fn with_options(
        engine: Arc<dyn MediaEngine>,
        ui: Option<Arc<dyn UiCallbacks>>,
        description: DescriptionSlot,
        options: SessionOptions,
    ) -> Self {
        Self {
            engine,
            shared: Arc::new(SharedState::new(ui)),
            description,
            fallback: options.fallback_description,
            initial_state: Mutex::new(options.initial_state),
            lifecycle: Mutex::new(()),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the worker thread. No-op if one is already running; a worker
    /// that exited on its own (build failure) is reaped first.
    pub fn start(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        self.start_worker()
    }

    fn start_worker(&self) -> Result<()> {
        let finished = {
            let mut worker = self.worker.lock();
            match worker.as_ref() {
                Some(existing) if !existing.thread.is_finished() => {
                    log::warn!("Worker thread already running - start ignored");
                    return Ok(());
                }
                _ => worker.take(),
            }
        };
        if let Some(finished) = finished {
            Self::join(finished, &self.shared);
        }

        let (loop_context, quit) = LoopContext::new();
        let ctx = WorkerContext {
            engine: self.engine.clone(),
            shared: self.shared.clone(),
            description: self.description.clone(),
            fallback: self.fallback.clone(),
            initial_state: *self.initial_state.lock(),
            loop_context,
        };

        log::debug!("Starting pipeline worker thread...");
        let thread = std::thread::Builder::new()
            .name("pipeliner-worker".into())
            .spawn(move || worker::run(ctx))?;

        *self.worker.lock() = Some(WorkerHandle { quit, thread });
        Ok(())
    }

    /// Signal the loop to quit and block until the worker has joined.
    ///
    /// There is no timeout: a teardown that hangs in the engine hangs here.
    /// Must not be called from a UI callback, which runs on the worker itself.
    pub fn stop(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.stop_worker();
    }

    fn stop_worker(&self) {
        // The worker slot is only held long enough to take the handle; the
        // worker may query it from a callback while we wait on the join
        let Some(handle) = self.worker.lock().take() else {
            log::debug!("No worker thread to stop");
            return;
        };

        log::debug!("Stopping pipeline worker thread...");
        handle.quit.quit();
        log::debug!("Waiting on thread clean up...");
        Self::join(handle, &self.shared);
    }

    fn join(handle: WorkerHandle, shared: &SharedState) {
        if handle.thread.join().is_err() {
            log::error!("Pipeline worker thread panicked");
            // A panicking worker never reached its own teardown
            shared.retract_running();
        }
    }

    /// Request a pipeline state transition; no-op without a pipeline
    pub fn set_state(&self, state: PlaybackState) {
        match self.shared.loop_handle() {
            Some(loop_handle) => {
                log::debug!("Requesting pipeline state {}", state);
                loop_handle.post(LoopCommand::SetState(state));
            }
            None => log::debug!("No pipeline - state request {} ignored", state),
        }
    }

    pub fn play(&self) {
        self.set_state(PlaybackState::Playing);
    }

    pub fn pause(&self) {
        self.set_state(PlaybackState::Paused);
    }

    /// Replace the description used by the next start or reinit
    pub fn set_pipeline_description(&self, text: &str) {
        self.description.set(text);
    }

    pub fn pipeline_description(&self) -> Option<String> {
        self.description.get()
    }

    /// State requested automatically once each run's loop is up
    pub fn set_initial_state(&self, state: Option<PlaybackState>) {
        *self.initial_state.lock() = state;
    }

    /// Stop, forget readiness and pending errors, start again
    pub fn reinit(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        self.stop_worker();
        self.shared.clear_initialized();
        self.shared.errors().clear();
        self.start_worker()?;
        log::debug!("Reinitialized with new pipeline");
        Ok(())
    }

    /// Read and clear the most recent error
    pub fn poll_error(&self) -> Option<String> {
        self.shared.errors().take()
    }

    /// Hand a display surface to the session. Call from the control thread.
    pub fn attach_surface(&self, surface: DisplaySurface) {
        self.shared.set_window(surface);
    }

    pub fn detach_surface(&self) {
        self.shared.release_window();
    }

    /// True while the worker thread is alive
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.thread.is_finished())
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.is_initialized()
    }

    pub fn pipeline_state(&self) -> PlaybackState {
        self.shared.pipeline_state()
    }

    pub fn set_ui_target(&self, ui: Arc<dyn UiCallbacks>) {
        self.shared.set_ui_target(ui);
    }

    pub fn clear_ui_target(&self) {
        self.shared.clear_ui_target();
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.engine
    }
}

impl Drop for PipelineSession {
    fn drop(&mut self) {
        self.clear_ui_target();
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HeadlessEngine;
    use crate::notify::{notification_channel, Notification};
    use std::time::Duration;

    #[test]
    fn readiness_needs_every_precondition() {
        let (ui, rx) = notification_channel();
        let shared = SharedState::new(Some(ui));
        assert!(!shared.check_initialization_complete());

        shared.set_window(DisplaySurface::unmanaged(0x1));
        assert!(!shared.is_initialized());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stop_without_start_is_safe() {
        let (ui, _rx) = notification_channel();
        let session = PipelineSession::new(Arc::new(HeadlessEngine::new()), ui);
        session.stop();
        session.stop();
        assert!(!session.is_running());
    }

    #[test]
    fn set_state_without_pipeline_is_ignored() {
        let engine = HeadlessEngine::new();
        let (ui, rx) = notification_channel();
        let session = PipelineSession::new(Arc::new(engine.clone()), ui);
        session.play();
        assert_eq!(engine.built_pipelines(), 0);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn start_is_ignored_while_running() {
        let engine = HeadlessEngine::new();
        let (ui, rx) = notification_channel();
        let session = PipelineSession::new(Arc::new(engine.clone()), ui);
        session.set_pipeline_description("videotestsrc ! fakesink");
        session.start().unwrap();
        let ready = Notification::StateChanged("State changed to READY".into());
        while rx.recv_timeout(Duration::from_secs(5)).unwrap() != ready {}

        session.start().unwrap();
        assert_eq!(engine.built_pipelines(), 1);
        session.stop();
        assert_eq!(engine.live_pipelines(), 0);
    }
}
