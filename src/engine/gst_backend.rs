//! GStreamer engine
//!
//! Pipelines come from `gst::parse::launch`. The bus is observed through a
//! sync handler that translates the two message classes the coordinator cares
//! about and posts them into the worker's event loop; every other message is
//! dropped at the handler.

use std::sync::Arc;

use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;
use parking_lot::Mutex;

use super::gstreamer_init;
use super::{BusMessage, EngineError, EnginePipeline, MediaEngine, PlaybackState, Result, VideoSink};
use crate::session::event_loop::BusSender;
use crate::session::surface::RawSurfaceHandle;

/// Engine backed by the system GStreamer installation
#[derive(Debug)]
pub struct GstEngine {
    _private: (),
}

impl GstEngine {
    pub fn new() -> Result<Self> {
        gstreamer_init::init_gstreamer_env().map_err(EngineError::Pipeline)?;
        Ok(Self { _private: () })
    }
}

impl MediaEngine for GstEngine {
    fn name(&self) -> &str {
        "gstreamer"
    }

    fn build_pipeline(&self, description: &str) -> Result<Box<dyn EnginePipeline>> {
        let element = gst::parse::launch(description)?;

        // A lone element description does not produce a pipeline
        let pipeline = match element.downcast::<gst::Pipeline>() {
            Ok(pipeline) => pipeline,
            Err(element) => {
                let pipeline = gst::Pipeline::new();
                pipeline
                    .add(&element)
                    .map_err(|e| EngineError::Pipeline(e.to_string()))?;
                pipeline
            }
        };

        log::debug!("Built GStreamer pipeline {}", pipeline.name());
        Ok(Box::new(GstPipeline { pipeline }))
    }
}

struct GstPipeline {
    pipeline: gst::Pipeline,
}

impl EnginePipeline for GstPipeline {
    fn name(&self) -> String {
        self.pipeline.name().to_string()
    }

    fn set_state(&self, state: PlaybackState) -> Result<()> {
        let target = match state {
            PlaybackState::Null => gst::State::Null,
            PlaybackState::Ready => gst::State::Ready,
            PlaybackState::Paused => gst::State::Paused,
            PlaybackState::Playing => gst::State::Playing,
            PlaybackState::VoidPending => return Err(EngineError::StateChange(state)),
        };
        self.pipeline
            .set_state(target)
            .map(|_| ())
            .map_err(|_| EngineError::StateChange(state))
    }

    fn video_sink(&self) -> Option<Arc<dyn VideoSink>> {
        self.pipeline
            .by_interface(gst_video::VideoOverlay::static_type())
            .map(|element| Arc::new(GstVideoSink { element }) as Arc<dyn VideoSink>)
    }

    fn watch_bus(&self, bus_sender: BusSender) {
        let Some(bus) = self.pipeline.bus() else {
            log::warn!("Pipeline {} has no bus", self.pipeline.name());
            return;
        };

        let forwarder = Arc::new(BusForwarder {
            sender: bus_sender,
            pipeline: self.pipeline.downgrade(),
            order: Mutex::new(()),
        });
        let handler = forwarder.clone();
        bus.set_sync_handler(move |bus, msg| {
            let _order = handler.order.lock();
            // Anything still queued from before the handler was installed goes first
            handler.drain_queued(bus);
            handler.forward(msg);
            gst::BusSyncReply::Drop
        });

        // Messages posted during construction are already queued on the bus
        let _order = forwarder.order.lock();
        forwarder.drain_queued(&bus);
    }

    fn unwatch_bus(&self) {
        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        }
    }
}

impl Drop for GstPipeline {
    fn drop(&mut self) {
        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        }
        self.pipeline.set_state(gst::State::Null).ok();
    }
}

/// Moves translated bus messages into the worker loop in posting order.
///
/// The sync handler only sees messages posted after it was installed; older
/// ones sit in the bus queue. Both paths go through `order`, and the handler
/// drains the queue before forwarding its own message.
struct BusForwarder {
    sender: BusSender,
    pipeline: glib::WeakRef<gst::Pipeline>,
    order: Mutex<()>,
}

impl BusForwarder {
    fn drain_queued(&self, bus: &gst::Bus) {
        while let Some(msg) = bus.pop() {
            self.forward(&msg);
        }
    }

    fn forward(&self, msg: &gst::Message) {
        let pipeline = self.pipeline.upgrade();
        if let Some(message) = translate(msg, pipeline.as_ref()) {
            self.sender.post(message);
        }
    }
}

fn source_name(msg: &gst::Message) -> String {
    msg.src()
        .map(|src| src.name().to_string())
        .unwrap_or_default()
}

fn translate(msg: &gst::Message, pipeline: Option<&gst::Pipeline>) -> Option<BusMessage> {
    match msg.view() {
        gst::MessageView::Error(err) => Some(BusMessage::Error {
            source: source_name(msg),
            message: err.error().to_string(),
            debug: err.debug().map(|d| d.to_string()),
        }),
        gst::MessageView::StateChanged(sc) => Some(BusMessage::StateChanged {
            source: source_name(msg),
            // Compared by object, a child may be named like the pipeline
            from_pipeline: pipeline
                .is_some_and(|p| msg.src() == Some(p.upcast_ref::<gst::Object>())),
            old: from_gst(sc.old()),
            current: from_gst(sc.current()),
            pending: from_gst(sc.pending()),
        }),
        _ => None,
    }
}

fn from_gst(state: gst::State) -> PlaybackState {
    match state {
        gst::State::Null => PlaybackState::Null,
        gst::State::Ready => PlaybackState::Ready,
        gst::State::Paused => PlaybackState::Paused,
        gst::State::Playing => PlaybackState::Playing,
        _ => PlaybackState::VoidPending,
    }
}

/// The element implementing `GstVideoOverlay`
struct GstVideoSink {
    element: gst::Element,
}

impl GstVideoSink {
    fn overlay(&self) -> Option<&gst_video::VideoOverlay> {
        self.element.dynamic_cast_ref::<gst_video::VideoOverlay>()
    }
}

impl VideoSink for GstVideoSink {
    fn bind_display(&self, handle: Option<RawSurfaceHandle>) {
        let Some(overlay) = self.overlay() else {
            return;
        };
        log::debug!("{}: window handle set to {:?}", self.element.name(), handle);
        // SAFETY: the handle belongs to a DisplaySurface that stays owned by
        // the session for as long as it is bound here; 0 detaches
        unsafe {
            overlay.set_window_handle(handle.unwrap_or(0));
        }
    }

    fn expose(&self) {
        if let Some(overlay) = self.overlay() {
            overlay.expose();
        }
    }
}
