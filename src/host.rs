//! Host-facing lifecycle bridge
//!
//! [`PipelineHost`] is the surface a host application (UI shell, activity,
//! window) calls into: one `init` per host lifetime, one `finalize` at the
//! end, and everything in between routed to the live [`PipelineSession`].
//! Calls that arrive before `init` or after `finalize` are logged and
//! ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{MediaEngine, PlaybackState};
use crate::notify::UiCallbacks;
use crate::session::{self, DescriptionSlot, DisplaySurface, PipelineSession, SessionOptions};

pub struct PipelineHost {
    engine: Arc<dyn MediaEngine>,
    description: DescriptionSlot,
    options: SessionOptions,
    session: Mutex<Option<Arc<PipelineSession>>>,
    playing_desired: AtomicBool,
}

impl PipelineHost {
    /// Host bound to the process-wide description slot
    pub fn new(engine: Arc<dyn MediaEngine>, options: SessionOptions) -> Self {
        Self::with_description(engine, DescriptionSlot::process_wide(), options)
    }

    pub fn with_description(
        engine: Arc<dyn MediaEngine>,
        description: DescriptionSlot,
        options: SessionOptions,
    ) -> Self {
        let playing_desired = options.initial_state == Some(PlaybackState::Playing);
        Self {
            engine,
            description,
            options,
            session: Mutex::new(None),
            playing_desired: AtomicBool::new(playing_desired),
        }
    }

    /// Create the session and start its worker
    pub fn init(&self, ui: Arc<dyn UiCallbacks>) -> session::Result<()> {
        let mut slot = self.session.lock();
        if slot.is_some() {
            log::warn!("init called twice - ignored");
            return Ok(());
        }

        let session = PipelineSession::with_options(
            self.engine.clone(),
            Some(ui),
            self.description.clone(),
            self.options.clone(),
        );
        session.start()?;
        log::debug!("Host initialized and worker started");
        *slot = Some(Arc::new(session));
        Ok(())
    }

    /// Detach the UI, stop the worker and release everything the session owns
    pub fn finalize(&self) {
        let Some(session) = self.session.lock().take() else {
            log::warn!("finalize called without init - ignored");
            return;
        };
        // No callback may reach the UI once it has asked to go away
        session.clear_ui_target();
        session.stop();
        drop(session);
        log::debug!("Host finalized");
    }

    /// Run `f` against the live session with the host lock released, so a UI
    /// callback fired from inside `f` may call back into the host.
    fn with_session<R>(&self, call: &str, f: impl FnOnce(&PipelineSession) -> R) -> Option<R> {
        let session = self.session.lock().clone();
        match session {
            Some(session) => Some(f(session.as_ref())),
            None => {
                log::warn!("{} called without a live session - ignored", call);
                None
            }
        }
    }

    pub fn play(&self) {
        self.playing_desired.store(true, Ordering::Relaxed);
        self.with_session("play", PipelineSession::play);
    }

    pub fn pause(&self) {
        self.playing_desired.store(false, Ordering::Relaxed);
        self.with_session("pause", PipelineSession::pause);
    }

    pub fn surface_init(&self, surface: DisplaySurface) {
        let mut surface = Some(surface);
        self.with_session("surface_init", |s| {
            if let Some(surface) = surface.take() {
                s.attach_surface(surface);
            }
        });
        // Without a session the surface is released right here
        drop(surface);
    }

    pub fn surface_finalize(&self) {
        self.with_session("surface_finalize", PipelineSession::detach_surface);
    }

    /// Store the description for the next build. Valid before `init` too.
    pub fn set_pipeline(&self, text: &str) {
        self.description.set(text);
    }

    pub fn reinit(&self) -> session::Result<()> {
        self.with_session("reinit", PipelineSession::reinit)
            .unwrap_or(Ok(()))
    }

    /// Read and clear the most recent error
    pub fn get_error(&self) -> Option<String> {
        self.with_session("get_error", PipelineSession::poll_error)
            .flatten()
    }

    /// Replace the running pipeline, keeping the play/pause choice the user
    /// last made.
    ///
    /// The choice is handed to the new worker as its initial state; a request
    /// posted right after reinit could arrive before the new loop exists.
    pub fn switch_pipeline(&self, text: &str) -> session::Result<()> {
        log::info!("Switching pipeline: {}", text);
        self.set_pipeline(text);
        let desired = if self.playing_desired.load(Ordering::Relaxed) {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
        self.with_session("switch_pipeline", |s| {
            s.set_initial_state(Some(desired));
            s.reinit()
        })
        .unwrap_or(Ok(()))
    }

    pub fn is_initialized(&self) -> bool {
        self.with_session("is_initialized", PipelineSession::is_initialized)
            .unwrap_or(false)
    }

    pub fn is_live(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn pipeline_state(&self) -> PlaybackState {
        self.session
            .lock()
            .as_deref()
            .map_or(PlaybackState::Null, PipelineSession::pipeline_state)
    }

    pub fn playing_desired(&self) -> bool {
        self.playing_desired.load(Ordering::Relaxed)
    }
}

impl Drop for PipelineHost {
    fn drop(&mut self) {
        if self.session.get_mut().is_some() {
            log::debug!("Host dropped without finalize - finalizing now");
            self.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HeadlessEngine;
    use crate::notify::notification_channel;
    use std::sync::atomic::AtomicUsize;

    fn host(engine: &HeadlessEngine) -> PipelineHost {
        PipelineHost::with_description(
            Arc::new(engine.clone()),
            DescriptionSlot::new(),
            SessionOptions::default(),
        )
    }

    #[test]
    fn calls_before_init_are_ignored() {
        let engine = HeadlessEngine::new();
        let host = host(&engine);
        host.play();
        host.pause();
        host.surface_finalize();
        host.reinit().unwrap();
        assert_eq!(host.get_error(), None);
        host.finalize();
        assert_eq!(engine.built_pipelines(), 0);
    }

    #[test]
    fn surface_without_session_is_released() {
        let engine = HeadlessEngine::new();
        let host = host(&engine);
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        host.surface_init(DisplaySurface::new(0x10, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finalize_ends_the_session() {
        let engine = HeadlessEngine::new();
        let host = host(&engine);
        let (ui, _rx) = notification_channel();
        host.set_pipeline("videotestsrc ! fakesink");
        host.init(ui).unwrap();
        assert!(host.is_live());

        host.finalize();
        assert!(!host.is_live());
        assert_eq!(engine.live_pipelines(), 0);
        host.play();
    }

    #[test]
    fn play_and_pause_track_the_desired_state() {
        let engine = HeadlessEngine::new();
        let host = host(&engine);
        assert!(!host.playing_desired());
        host.play();
        assert!(host.playing_desired());
        host.pause();
        assert!(!host.playing_desired());
    }
}
