//! Bus event handling on the worker thread
//!
//! Handlers run synchronously inside the worker's event loop, one message at
//! a time, so error and state-changed handling never overlap.

use crate::engine::{BusMessage, EnginePipeline, PlaybackState};

use super::shared::SharedState;

/// Reacts to bus messages for one worker run
pub struct BusObserver<'a> {
    shared: Option<&'a SharedState>,
}

impl<'a> BusObserver<'a> {
    pub fn new(shared: Option<&'a SharedState>) -> Self {
        Self { shared }
    }

    pub fn handle(&self, pipeline: Option<&dyn EnginePipeline>, message: &BusMessage) {
        match message {
            BusMessage::Error {
                source,
                message,
                debug,
            } => self.on_error(pipeline, source, message, debug.as_deref()),
            BusMessage::StateChanged {
                from_pipeline,
                current,
                ..
            } => self.on_state_changed(pipeline, *from_pipeline, *current),
        }
    }

    /// Every error is fatal to the current run: report it, then stop the
    /// pipeline. The loop keeps running; the control side decides whether
    /// to reinitialize.
    fn on_error(
        &self,
        pipeline: Option<&dyn EnginePipeline>,
        source: &str,
        message: &str,
        debug: Option<&str>,
    ) {
        let Some(shared) = self.shared else {
            log::error!("NULL shared state in error handler");
            return;
        };

        let text = format!("Error received from element {}: {}", source, message);
        log::error!("{}", text);
        if let Some(debug) = debug {
            log::error!("Debug info: {}", debug);
        }

        shared.errors().publish(text.clone());
        shared.notify(|ui| {
            ui.on_message(&text);
            ui.on_error(&text);
        });

        if let Some(pipeline) = pipeline {
            if let Err(e) = pipeline.set_state(PlaybackState::Null) {
                log::warn!("Failed to stop pipeline after error: {}", e);
            }
        }
    }

    fn on_state_changed(
        &self,
        pipeline: Option<&dyn EnginePipeline>,
        from_pipeline: bool,
        current: PlaybackState,
    ) {
        let (Some(shared), Some(_)) = (self.shared, pipeline) else {
            log::error!("NULL shared state or pipeline in state-changed handler");
            return;
        };

        // Only pipeline-level transitions are reported, not its children
        if !from_pipeline {
            return;
        }

        shared.record_pipeline_state(current);
        let text = format!("State changed to {}", current.name());
        log::info!("{}", text);
        shared.notify(|ui| {
            ui.on_message(&text);
            ui.on_state_changed(&text);
        });
    }
}
