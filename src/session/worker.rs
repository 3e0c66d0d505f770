//! Worker thread body
//!
//! The only code that constructs or destroys a pipeline. Runs on the
//! dedicated thread spawned by [`super::PipelineSession::start`] and returns
//! only when its loop is told to quit, or right away if the build fails.

use std::sync::Arc;

use crate::engine::{MediaEngine, PlaybackState};

use super::event_loop::{LoopCommand, LoopContext, LoopEvent};
use super::observer::BusObserver;
use super::shared::{RunningPipeline, SharedState};
use super::DescriptionSlot;

/// Everything a worker run needs, moved into the thread
pub(crate) struct WorkerContext {
    pub(crate) engine: Arc<dyn MediaEngine>,
    pub(crate) shared: Arc<SharedState>,
    pub(crate) description: DescriptionSlot,
    pub(crate) fallback: String,
    pub(crate) initial_state: Option<PlaybackState>,
    pub(crate) loop_context: LoopContext,
}

pub(crate) fn run(ctx: WorkerContext) {
    let WorkerContext {
        engine,
        shared,
        description,
        fallback,
        initial_state,
        loop_context,
    } = ctx;

    log::debug!("Worker thread started ({} engine)", engine.name());

    let launch = match description.get() {
        Some(custom) => {
            log::info!("Using custom pipeline {}", custom);
            custom
        }
        None => {
            log::info!("Using default fallback pipeline {}", fallback);
            fallback
        }
    };

    let pipeline = match engine.build_pipeline(&launch) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            let message = format!("Unable to build pipeline: {}", e);
            log::error!("{}", message);
            shared.errors().publish(message.clone());
            shared.notify(|ui| {
                ui.on_message(&message);
                ui.on_error(&message);
            });
            // The loop context drops here without ever running
            return;
        }
    };

    if let Err(e) = pipeline.set_state(PlaybackState::Ready) {
        log::warn!("Failed to set pipeline {} to READY: {}", pipeline.name(), e);
    }

    let video_sink = pipeline.video_sink();
    match video_sink.as_ref() {
        None => log::warn!(
            "Could not find video sink in pipeline {} - continuing without display",
            pipeline.name()
        ),
        Some(sink) => {
            // Reinitialization: the surface outlives the previous pipeline
            if let Some(handle) = shared.surface_handle() {
                log::debug!("Applying existing native window {:#x} to new pipeline", handle);
                sink.bind_display(Some(handle));
            }
        }
    }

    pipeline.watch_bus(loop_context.bus_sender());
    shared.publish_running(RunningPipeline::new(
        loop_context.handle(),
        pipeline.name(),
        video_sink.as_ref(),
    ));

    // Readiness and auto-play run from inside the loop, not from construction
    let loop_handle = loop_context.handle();
    loop_handle.post(LoopCommand::CheckReady);
    if let Some(state) = initial_state {
        loop_handle.post(LoopCommand::SetState(state));
    }
    drop(loop_handle);

    log::debug!("Entering main loop... ({})", pipeline.name());
    let observer = BusObserver::new(Some(shared.as_ref()));
    let dispatched = loop_context.run(|event| match event {
        LoopEvent::Bus(message) => observer.handle(Some(pipeline.as_ref()), &message),
        LoopEvent::Command(LoopCommand::SetState(state)) => {
            log::debug!("Setting pipeline state to {}", state);
            if let Err(e) = pipeline.set_state(state) {
                log::warn!("{}", e);
            }
        }
        LoopEvent::Command(LoopCommand::CheckReady) => {
            shared.check_initialization_complete();
        }
        LoopEvent::Quit => {}
    });
    log::debug!(
        "Exiting main loop... ({}, {} events dispatched)",
        pipeline.name(),
        dispatched
    );

    // The control side stops seeing the loop and sink before anything is torn down
    shared.retract_running();

    // Stopped before any element reference goes away
    if let Err(e) = pipeline.set_state(PlaybackState::Null) {
        log::warn!("Failed to stop pipeline {}: {}", pipeline.name(), e);
    }
    drop(video_sink);
    pipeline.unwatch_bus();
    drop(pipeline);

    // Outlives every bus observer registered on it
    drop(loop_context);

    shared.errors().clear();
    log::debug!("Worker thread finished");
}
