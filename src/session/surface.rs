//! Display surface ownership and binding
//!
//! A [`DisplaySurface`] is a move-only owner of one reference to a native
//! window handle. Its release hook runs exactly once, when the value drops,
//! so handing a surface to the session transfers ownership and replacing or
//! detaching it releases it.

use std::fmt;

use crate::engine::PlaybackState;

use super::event_loop::LoopCommand;
use super::shared::SharedState;

/// Raw native window handle as understood by the video sink
pub type RawSurfaceHandle = usize;

type ReleaseFn = Box<dyn FnOnce(RawSurfaceHandle) + Send>;

/// Owned reference to a native display surface
pub struct DisplaySurface {
    handle: RawSurfaceHandle,
    release: Option<ReleaseFn>,
}

impl DisplaySurface {
    /// Take ownership of a surface reference; `release` runs once on drop
    pub fn new<F>(handle: RawSurfaceHandle, release: F) -> Self
    where
        F: FnOnce(RawSurfaceHandle) + Send + 'static,
    {
        Self {
            handle,
            release: Some(Box::new(release)),
        }
    }

    /// Wrap a handle whose lifetime is managed elsewhere
    pub fn unmanaged(handle: RawSurfaceHandle) -> Self {
        Self {
            handle,
            release: None,
        }
    }

    pub fn handle(&self) -> RawSurfaceHandle {
        self.handle
    }
}

impl PartialEq for DisplaySurface {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl fmt::Debug for DisplaySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplaySurface")
            .field("handle", &format_args!("{:#x}", self.handle))
            .field("managed", &self.release.is_some())
            .finish()
    }
}

impl Drop for DisplaySurface {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            log::debug!("Releasing native window {:#x}", self.handle);
            release(self.handle);
        }
    }
}

impl SharedState {
    /// Attach a display surface, taking ownership of it.
    ///
    /// Must be called from the control thread: the readiness check that
    /// follows may invoke the UI target synchronously.
    pub fn set_window(&self, surface: DisplaySurface) {
        log::debug!("Received surface {:#x}", surface.handle());

        let mut slots = self.lock();
        let previous = match slots.surface.as_ref() {
            Some(current) if *current == surface => {
                log::debug!(
                    "New native window is the same as the previous one {:#x}",
                    current.handle()
                );
                let sink = slots.video_sink();
                drop(slots);
                // Release the caller's duplicate reference; the stored one stays
                drop(surface);
                if let Some(sink) = sink {
                    sink.expose();
                    sink.expose();
                }
                return;
            }
            Some(current) => {
                log::debug!("Released previous native window {:#x}", current.handle());
                slots.initialized = false;
                slots.surface.replace(surface)
            }
            None => slots.surface.replace(surface),
        };
        drop(slots);
        drop(previous);

        self.check_initialization_complete();
    }

    /// Detach and release the current display surface
    pub fn release_window(&self) {
        let (surface, sink, loop_handle) = {
            let mut slots = self.lock();
            slots.initialized = false;
            (slots.surface.take(), slots.video_sink(), slots.loop_handle())
        };

        match surface.as_ref() {
            Some(surface) => log::debug!("Finalizing native window {:#x}", surface.handle()),
            None => log::debug!("Finalizing native window (none attached)"),
        }

        if let Some(sink) = sink {
            sink.bind_display(None);
            if let Some(loop_handle) = loop_handle {
                loop_handle.post(LoopCommand::SetState(PlaybackState::Ready));
            }
        }

        drop(surface);
    }
}
